#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole argument is free prompt text.
pub(crate) const PROMPT_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image",
        action: "generate",
    },
    CommandSpec {
        command: "enhance",
        action: "enhance",
    },
    CommandSpec {
        command: "save",
        action: "save_prompt",
    },
];

pub(crate) const QUALITY_PRESET_COMMANDS: &[&str] = &["fast", "pro"];

pub(crate) const ID_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "delete",
        action: "delete_artifact",
    },
    CommandSpec {
        command: "unsave",
        action: "delete_prompt",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "prompts",
        action: "list_prompts",
    },
    CommandSpec {
        command: "history",
        action: "list_history",
    },
    CommandSpec {
        command: "clear",
        action: "clear_history",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const EDIT_COMMAND: CommandSpec = CommandSpec {
    command: "edit",
    action: "edit",
};

pub(crate) const LOGO_COMMAND: CommandSpec = CommandSpec {
    command: "logo",
    action: "logo",
};

pub(crate) const RATIO_COMMAND: CommandSpec = CommandSpec {
    command: "ratio",
    action: "set_ratio",
};

pub(crate) const THINK_COMMAND: CommandSpec = CommandSpec {
    command: "think",
    action: "set_thinking",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/image <prompt>",
    "/edit <path> <prompt>",
    "/logo <brand> [-- <style>]",
    "/enhance <prompt>",
    "/save <prompt>",
    "/unsave <id>",
    "/prompts",
    "/history",
    "/delete <id>",
    "/clear",
    "/ratio <1:1|3:4|4:3|9:16|16:9>",
    "/fast",
    "/pro",
    "/think [on|off]",
    "/help",
    "/quit",
];
