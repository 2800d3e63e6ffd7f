//! Rate limiting and abuse-blocking domain

mod config;
mod decision;
mod identity;

pub use config::RateLimitConfig;
pub use decision::{RateLimitDecision, RateLimitInfo, RateLimitScope, RateLimitStatus, ViolationRecord};
pub use identity::RequestIdentity;
