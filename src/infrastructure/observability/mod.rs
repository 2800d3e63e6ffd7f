//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_cache_lookup, record_fail_open,
    record_rate_limit_rejection, record_security_event, PrometheusMetrics,
};
