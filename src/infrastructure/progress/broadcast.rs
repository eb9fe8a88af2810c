use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::workflow::{ProgressEvent, ProgressHub};
use crate::domain::DomainError;

const DEFAULT_CAPACITY: usize = 1000;

/// Fans progress events out to any number of subscribers.
///
/// Publishing never waits on subscribers. A slow subscriber lags and misses
/// events; having no subscriber at all is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastProgressHub {
    tx: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgressHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressHub for BroadcastProgressHub {
    async fn publish(&self, event: ProgressEvent) -> Result<(), DomainError> {
        // Err only means nobody is listening right now
        let _ = self.tx.send(event);
        Ok(())
    }
}

/// Publishes every event to each inner hub, reporting the first failure
/// after all hubs have been tried
#[derive(Debug, Clone, Default)]
pub struct CompositeProgressHub {
    hubs: Vec<Arc<dyn ProgressHub>>,
}

impl CompositeProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hub: Arc<dyn ProgressHub>) -> Self {
        self.hubs.push(hub);
        self
    }
}

#[async_trait]
impl ProgressHub for CompositeProgressHub {
    async fn publish(&self, event: ProgressEvent) -> Result<(), DomainError> {
        let mut first_error = None;

        for hub in &self.hubs {
            if let Err(e) = hub.publish(event.clone()).await {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{FailingProgressHub, RecordingProgressHub, RunId};

    fn started(run_id: RunId) -> ProgressEvent {
        ProgressEvent::StepStarted {
            run_id,
            step_name: "summarize".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let hub = BroadcastProgressHub::new();
        assert_eq!(hub.subscriber_count(), 0);
        assert!(hub.publish(started(RunId::generate())).await.is_ok());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let hub = BroadcastProgressHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        let run_id = RunId::generate();

        hub.publish(started(run_id)).await.unwrap();

        assert_eq!(first.recv().await.unwrap(), started(run_id));
        assert_eq!(second.recv().await.unwrap().run_id(), run_id);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_does_not_fail_publish() {
        let hub = BroadcastProgressHub::with_capacity(2);
        let mut rx = hub.subscribe();
        let run_id = RunId::generate();

        for _ in 0..5 {
            hub.publish(started(run_id)).await.unwrap();
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[tokio::test]
    async fn test_composite_reaches_all_hubs_despite_failure() {
        let recording = Arc::new(RecordingProgressHub::new());
        let hub = CompositeProgressHub::new()
            .with(Arc::new(FailingProgressHub))
            .with(recording.clone());

        let result = hub.publish(started(RunId::generate())).await;

        assert!(result.is_err());
        assert_eq!(recording.kinds(), vec!["step_started"]);
    }
}
