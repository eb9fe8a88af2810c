//! Observability infrastructure - metrics recorded through the `metrics` facade

mod metrics;

pub use metrics::{
    record_llm_request, record_run, record_step, register_build_info, LlmRequestMetricParams,
};
