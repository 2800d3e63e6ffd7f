//! Security event sinks

mod in_memory;
mod tracing_sink;

pub use in_memory::InMemoryEventSink;
pub use tracing_sink::TracingEventSink;
