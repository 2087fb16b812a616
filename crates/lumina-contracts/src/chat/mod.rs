mod command_registry;
mod intent_parser;
mod message;

pub use command_registry::CHAT_HELP_COMMANDS;
pub use intent_parser::{parse_intent, Intent};
pub use message::{ChatMessage, ChatRole};
