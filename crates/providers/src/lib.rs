//! LLM provider implementations for CodeClaw.
//!
//! All providers implement the `codeclaw_core::Provider` trait. The
//! supported set is closed: [`kind::ProviderKind`] maps configuration tags
//! to concrete clients, and [`cache::ProviderClientCache`] memoizes one
//! client per option tuple.

pub mod anthropic;
pub mod cache;
pub mod kind;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use cache::ProviderClientCache;
pub use kind::ProviderKind;
pub use openai_compat::OpenAiCompatProvider;
