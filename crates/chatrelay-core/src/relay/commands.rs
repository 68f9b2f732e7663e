//! Chat command parsing.
//!
//! Commands start with the configured prefix (default `!`). They act on the
//! channel they were sent in and are never recorded as turns.

/// Turns shown by `history` when no count is given.
pub const DEFAULT_HISTORY_COUNT: usize = 5;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Forget this channel's history and session.
    Reset,
    /// Show the last `count` turns.
    History { count: usize },
    /// Show (`None`) or change the log filter.
    LogLevel { directive: Option<String> },
    Help,
    /// Prefixed but not recognized.
    Unknown(String),
}

impl Command {
    /// Parse `content` as a command. Returns `None` for ordinary messages.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        if prefix.is_empty() {
            return None;
        }
        let body = content.trim_start().strip_prefix(prefix)?;
        let mut words = body.split_whitespace();
        let name = words.next()?.to_lowercase();

        let command = match name.as_str() {
            "reset" => Command::Reset,
            "history" => {
                let count = words
                    .next()
                    .and_then(|w| w.parse::<usize>().ok())
                    .unwrap_or(DEFAULT_HISTORY_COUNT);
                Command::History { count }
            }
            "loglevel" => Command::LogLevel {
                directive: words.next().map(str::to_string),
            },
            "help" => Command::Help,
            _ => Command::Unknown(name),
        };
        Some(command)
    }
}

/// Help text listing the commands under `prefix`.
pub fn help_text(prefix: &str) -> String {
    format!(
        "Commands:\n\
         {prefix}reset - forget this channel's conversation\n\
         {prefix}history [n] - show the last n turns\n\
         {prefix}loglevel [level] - show or change log verbosity\n\
         {prefix}help - show this message"
    )
}
