// LLM chains: intent detection ahead of the tool-calling reasoning loop
pub mod intent;
pub mod reasoning;

pub use intent::{Intent, IntentClassifier};
pub use reasoning::{ReasoningChain, ReasoningEvent, ReasoningOutcome, ToolStatus, ToolUsage};
