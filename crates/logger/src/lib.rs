//! Shared tracing setup for the agent and the stub backend.

mod tracing;

pub use self::tracing::{LogFormat, init, init_tracing, init_with_level};
