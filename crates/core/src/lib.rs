//! # Leash Core
//!
//! Domain types, traits, and error definitions for the Leash bounded
//! tool-calling agent runtime. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! The model service and every tool are defined as traits here;
//! implementations live in their respective crates. This enables:
//! - Swapping the model backend via configuration
//! - Testing the loop with mock providers and tools
//! - A clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, LoopError, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
