//! Slash-command parsing.

use std::sync::LazyLock;

use regex::Regex;

static COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^/([A-Za-z_]+)(?:@([A-Za-z0-9_]+))?(?:\s+(.*))?$")
        .expect("command pattern is valid")
});

/// Commands understood by the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    SetFaq,
    SetMap,
    SetMenu,
    SetProgram,
    SetDirectorate,
    AddInfo,
    AddAdmin(Option<String>),
    Admins,
    Appeals(Option<String>),
    Done,
    Skip,
    Cancel,
    Shutdown,
}

/// Name and localization key of every command, in help order
pub const COMMAND_DESCRIPTIONS: &[(&str, &str, bool)] = &[
    ("start", "cmd-start", false),
    ("help", "cmd-help", false),
    ("cancel", "cmd-cancel", false),
    ("setfaq", "cmd-setfaq", true),
    ("setmenu", "cmd-setmenu", true),
    ("setmap", "cmd-setmap", true),
    ("setprogram", "cmd-setprogram", true),
    ("setdirectorate", "cmd-setdirectorate", true),
    ("addinfo", "cmd-addinfo", true),
    ("done", "cmd-done", true),
    ("skip", "cmd-skip", true),
    ("addadmin", "cmd-addadmin", true),
    ("admins", "cmd-admins", true),
    ("appeals", "cmd-appeals", true),
    ("shutdown", "cmd-shutdown", true),
];

impl Command {
    /// Parse `/name[@bot] [args]`
    ///
    /// Commands addressed to another bot are ignored. An empty `bot_username`
    /// accepts any addressee.
    pub fn parse(text: &str, bot_username: &str) -> Option<Self> {
        let captures = COMMAND_PATTERN.captures(text.trim())?;
        if let Some(addressee) = captures.get(2) {
            if !bot_username.is_empty() && !addressee.as_str().eq_ignore_ascii_case(bot_username) {
                return None;
            }
        }

        let args = captures
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .filter(|args| !args.is_empty());

        let command = match captures[1].to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "setfaq" => Command::SetFaq,
            "setmap" => Command::SetMap,
            "setmenu" => Command::SetMenu,
            "setprogram" => Command::SetProgram,
            "setdirectorate" => Command::SetDirectorate,
            "addinfo" => Command::AddInfo,
            "addadmin" => Command::AddAdmin(args),
            "admins" => Command::Admins,
            "appeals" => Command::Appeals(args),
            "done" => Command::Done,
            "skip" => Command::Skip,
            "cancel" => Command::Cancel,
            "shutdown" => Command::Shutdown,
            _ => return None,
        };
        Some(command)
    }

    /// Returns `true` for commands only admins may run
    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Command::Start | Command::Help | Command::Cancel | Command::Done | Command::Skip
        )
    }
}
