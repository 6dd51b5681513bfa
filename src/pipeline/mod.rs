//! Chat pipeline.
//!
//! Every chat message flows through:
//! 1. `Secretary::process()`: record the message, keyword classification
//! 2. Local responder for low-value turns (no LLM)
//! 3. `Brain::analyze()`: LLM decision with task type and instructions
//! 4. `SmartCore::coordinate()`: hand code/design/development work to a bot

pub mod bots;
pub mod brain;
pub mod classifier;
pub mod responder;
pub mod secretary;
pub mod smart_core;

pub use brain::Brain;
pub use secretary::{ChatInput, ChatReply, Secretary};
pub use smart_core::SmartCore;
