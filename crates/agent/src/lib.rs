//! The agentic work loop — the heart of CodeClaw.
//!
//! One turn follows a **stream → execute → observe** cycle:
//!
//! 1. **Prepare** the history (trim to budget, fold provider quirks in)
//! 2. **Stream** a model reply, surfacing text and call placeholders live
//! 3. **If tool calls**: gate each by tool mode, execute in order, append
//!    the results, loop back to step 2
//! 4. **If text only**: the turn is complete
//!
//! Destructive calls under confirm mode suspend the cycle instead of
//! executing; [`WorkLoop::run_turn`] re-entered after the user decides
//! resumes the suspended batch where it left off.

pub mod event;
pub mod prepare;
pub mod prompt;
pub mod stream;
pub mod token;
pub mod work_loop;

pub use event::WorkEvent;
pub use prepare::{PrepareOptions, prepare};
pub use prompt::PromptBuilder;
pub use stream::{CallPreview, PartialAiMessage, accumulate};
pub use token::{estimate_message_tokens, estimate_messages_tokens, estimate_tokens};
pub use work_loop::{TurnOutcome, WorkLoop};
