use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, EDIT_COMMAND, ID_COMMANDS, LOGO_COMMAND, NO_ARG_COMMANDS, PROMPT_COMMANDS,
    QUALITY_PRESET_COMMANDS, RATIO_COMMAND, THINK_COMMAND,
};
use crate::ratio::AspectRatio;

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub settings_update: BTreeMap<String, Value>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            settings_update: BTreeMap::new(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_prompt(mut self, prompt: &str) -> Self {
        let prompt = prompt.trim();
        if !prompt.is_empty() {
            self.prompt = Some(prompt.to_string());
        }
        self
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args.get(key).and_then(Value::as_str)
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_words(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

/// `<path> <prompt...>`; the path may be quoted.
fn parse_edit_args(arg: &str) -> (String, String) {
    let mut parts = split_words(arg).into_iter();
    let path = parts.next().unwrap_or_default();
    let prompt = parts.collect::<Vec<_>>().join(" ");
    (path, prompt)
}

/// `<brand> [-- <style>]`.
fn parse_logo_args(arg: &str) -> (String, Option<String>) {
    match arg.split_once("--") {
        Some((brand, style)) => {
            let style = style.trim();
            (
                brand.trim().to_string(),
                (!style.is_empty()).then(|| style.to_string()),
            )
        }
        None => (arg.trim().to_string(), None),
    }
}

fn parse_toggle(arg: &str) -> Option<bool> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, PROMPT_COMMANDS) {
                return Intent::new(action, text).with_prompt(arg);
            }

            if QUALITY_PRESET_COMMANDS
                .iter()
                .any(|value| *value == command)
            {
                let mut intent = Intent::new("set_quality", text);
                intent
                    .settings_update
                    .insert("quality_preset".to_string(), Value::String(command));
                return intent;
            }

            if let Some(action) = find_action(&command, ID_COMMANDS) {
                let mut intent = Intent::new(action, text);
                let id = split_words(arg).into_iter().next().unwrap_or_default();
                intent
                    .command_args
                    .insert("id".to_string(), Value::String(id));
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == EDIT_COMMAND.command {
                let (path, prompt) = parse_edit_args(arg);
                let mut intent = Intent::new(EDIT_COMMAND.action, text).with_prompt(&prompt);
                intent
                    .command_args
                    .insert("path".to_string(), Value::String(path));
                return intent;
            }

            if command == LOGO_COMMAND.command {
                let (brand, style) = parse_logo_args(arg);
                let mut intent = Intent::new(LOGO_COMMAND.action, text);
                intent
                    .command_args
                    .insert("brand".to_string(), Value::String(brand));
                intent.command_args.insert(
                    "style".to_string(),
                    style.map(Value::String).unwrap_or(Value::Null),
                );
                return intent;
            }

            if command == RATIO_COMMAND.command {
                let mut intent = Intent::new(RATIO_COMMAND.action, text);
                intent
                    .command_args
                    .insert("value".to_string(), Value::String(arg.to_string()));
                if let Ok(ratio) = arg.parse::<AspectRatio>() {
                    intent.settings_update.insert(
                        "aspect_ratio".to_string(),
                        Value::String(ratio.as_str().to_string()),
                    );
                }
                return intent;
            }

            if command == THINK_COMMAND.command {
                let mut intent = Intent::new(THINK_COMMAND.action, text);
                let update = match parse_toggle(arg) {
                    Some(enabled) => Value::Bool(enabled),
                    None => Value::String("toggle".to_string()),
                };
                intent
                    .settings_update
                    .insert("extended_reasoning".to_string(), update);
                return intent;
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    Intent::new("chat", text).with_prompt(raw_trimmed)
}
