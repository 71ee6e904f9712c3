//! Leash agent — the bounded tool-calling loop.
//!
//! The loop alternates chat turns and tool dispatch under two independent
//! ceilings: a tool-call budget (a normal stop) and a hard iteration limit
//! (a fatal error signaling non-convergence). Everything recoverable is
//! absorbed into the conversation as messages; the caller only ever sees an
//! error when the loop itself failed to converge.

pub mod dispatch;
pub mod executor;
pub mod loop_runner;
pub mod policy;

pub use dispatch::dispatch;
pub use executor::TurnExecutor;
pub use loop_runner::AgentLoop;
pub use policy::{ContinuationPolicy, Decision};
