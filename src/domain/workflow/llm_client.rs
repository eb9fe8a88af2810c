//! Text-generation collaborator used by the LLM-backed steps

use std::fmt::Debug;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{stream, Stream};

use super::cancellation::CancellationSignal;
use crate::domain::DomainError;

/// Incremental text deltas from a streamed completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, DomainError>> + Send>>;

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// Free-text completion. A signal that already fired is
    /// `DomainError::Cancelled`.
    async fn invoke(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        cancel: &CancellationSignal,
    ) -> Result<String, DomainError>;

    /// Completion constrained to a single JSON document. An answer that does
    /// not parse is `DomainError::InvalidResponse`; callers still check its
    /// shape.
    async fn invoke_for_json(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        cancel: &CancellationSignal,
    ) -> Result<String, DomainError>;

    /// Streamed free-text completion
    async fn invoke_stream(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        cancel: &CancellationSignal,
    ) -> Result<TextStream, DomainError> {
        let text = self.invoke(prompt, system_message, cancel).await?;
        Ok(Box::pin(stream::once(async move { Ok(text) })))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum Reply {
        Text(String),
        Error(String),
    }

    /// Answers by matching a fragment of the system message.
    ///
    /// Unmatched text calls echo the prompt back; unmatched JSON calls return
    /// `{}`.
    #[derive(Debug, Default)]
    pub struct ScriptedLlmClient {
        rules: Vec<(String, Reply)>,
        calls: Mutex<HashMap<String, usize>>,
        total_calls: Mutex<usize>,
    }

    impl ScriptedLlmClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(mut self, system_fragment: impl Into<String>, reply: impl Into<String>) -> Self {
            self.rules
                .push((system_fragment.into(), Reply::Text(reply.into())));
            self
        }

        pub fn fail_on(
            mut self,
            system_fragment: impl Into<String>,
            error: impl Into<String>,
        ) -> Self {
            self.rules
                .push((system_fragment.into(), Reply::Error(error.into())));
            self
        }

        /// Calls whose system message contained `system_fragment`
        pub fn calls_matching(&self, system_fragment: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .get(system_fragment)
                .copied()
                .unwrap_or(0)
        }

        pub fn total_calls(&self) -> usize {
            *self.total_calls.lock().unwrap()
        }

        fn answer(
            &self,
            prompt: &str,
            system_message: Option<&str>,
            json: bool,
            cancel: &CancellationSignal,
        ) -> Result<String, DomainError> {
            if cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }
            *self.total_calls.lock().unwrap() += 1;
            let system = system_message.unwrap_or_default();

            for (fragment, reply) in &self.rules {
                if system.contains(fragment.as_str()) {
                    *self
                        .calls
                        .lock()
                        .unwrap()
                        .entry(fragment.clone())
                        .or_default() += 1;

                    return match reply {
                        Reply::Text(text) if json => {
                            serde_json::from_str::<serde_json::Value>(text).map_err(|e| {
                                DomainError::invalid_response("scripted", e.to_string())
                            })?;
                            Ok(text.clone())
                        }
                        Reply::Text(text) => Ok(text.clone()),
                        Reply::Error(error) => Err(DomainError::provider("scripted", error)),
                    };
                }
            }

            if json {
                Ok("{}".to_string())
            } else {
                Ok(prompt.to_string())
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn invoke(
            &self,
            prompt: &str,
            system_message: Option<&str>,
            cancel: &CancellationSignal,
        ) -> Result<String, DomainError> {
            self.answer(prompt, system_message, false, cancel)
        }

        async fn invoke_for_json(
            &self,
            prompt: &str,
            system_message: Option<&str>,
            cancel: &CancellationSignal,
        ) -> Result<String, DomainError> {
            self.answer(prompt, system_message, true, cancel)
        }

        async fn invoke_stream(
            &self,
            prompt: &str,
            system_message: Option<&str>,
            cancel: &CancellationSignal,
        ) -> Result<TextStream, DomainError> {
            let text = self.answer(prompt, system_message, false, cancel)?;
            let words: Vec<Result<String, DomainError>> = text
                .split_inclusive(' ')
                .map(|w| Ok(w.to_string()))
                .collect();
            Ok(Box::pin(stream::iter(words)))
        }
    }
}
