//! Rate limiting infrastructure

mod guard;
mod violations;

pub use guard::{RateLimitGuard, DEFAULT_NAMESPACE};
pub use violations::ViolationTracker;
