//! Security event domain

mod event;
mod sink;

pub use event::{SecurityEvent, SecurityEventType, Severity};
pub use sink::SecurityEventSink;
