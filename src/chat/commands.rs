//! Slash command parsing for the chat application.
//!
//! Commands stand in for the sidebar and the upload widget; anything that does not start
//! with `/` is a prompt.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Start a new chat.
    NewChat,

    /// Select a model from the table.
    Model(String),

    /// List the models in the table.
    Models,

    /// Set the system prompt; `None` empties it.
    System(Option<String>),

    /// Set the sampling temperature.
    Temperature(f32),

    /// Set the top-p value.
    TopP(f32),

    /// Set the top-k value.
    TopK(u32),

    /// Set the maximum tokens per response.
    MaxTokens(u32),

    /// Set how many prior exchanges the model sees.
    Memory(usize),

    /// Add files to the upload widget.
    Attach(Vec<String>),

    /// Remove an upload by its one-based position.
    Detach(usize),

    /// List the uploads.
    Uploads,

    /// Save the transcript to a file.
    SaveTranscript(String),

    /// Load conversation history from a file.
    LoadTranscript(String),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a prompt.
///
/// # Examples
///
/// ```
/// # use chatwindow::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model claude-haiku-4-5").is_some());
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" | "clear" => ChatCommand::NewChat,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "models" => ChatCommand::Models,
        "system" => ChatCommand::System(argument.map(|s| s.to_string())),
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        "temperature" => parse_unit_command(argument, ChatCommand::Temperature, "/temperature"),
        "top_p" => parse_unit_command(argument, ChatCommand::TopP, "/top_p"),
        "top_k" => parse_int_command(argument, ChatCommand::TopK, "/top_k"),
        "max_tokens" => parse_int_command(argument, ChatCommand::MaxTokens, "/max_tokens"),
        "memory" => parse_int_command(argument, ChatCommand::Memory, "/memory"),
        "attach" => match argument {
            Some(paths) => {
                ChatCommand::Attach(paths.split_whitespace().map(str::to_string).collect())
            }
            None => ChatCommand::Invalid("/attach requires one or more file paths".to_string()),
        },
        "detach" => match argument.map(str::parse::<usize>) {
            Some(Ok(position)) if position > 0 => ChatCommand::Detach(position),
            Some(_) => ChatCommand::Invalid("/detach expects a position from /uploads".to_string()),
            None => ChatCommand::Invalid("/detach requires a position".to_string()),
        },
        "uploads" => ChatCommand::Uploads,
        "save" => match argument {
            Some(arg) => ChatCommand::SaveTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        "load" => match argument {
            Some(arg) => ChatCommand::LoadTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/load requires a file path".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_int_command<T, F>(argument: Option<&str>, constructor: F, name: &str) -> ChatCommand
where
    T: std::str::FromStr,
    F: Fn(T) -> ChatCommand,
{
    match argument {
        Some(arg) => match arg.parse::<T>() {
            Ok(value) => constructor(value),
            Err(_) => ChatCommand::Invalid(format!("{name} expects a non-negative integer")),
        },
        None => ChatCommand::Invalid(format!("{name} requires a value")),
    }
}

fn parse_unit_command<F>(argument: Option<&str>, constructor: F, name: &str) -> ChatCommand
where
    F: Fn(f32) -> ChatCommand,
{
    match argument {
        Some(arg) => match parse_f32_in_range(arg, 0.0, 1.0) {
            Ok(value) => constructor(value),
            Err(err) => ChatCommand::Invalid(format!("{name} {err}")),
        },
        None => ChatCommand::Invalid(format!("{name} requires a value")),
    }
}

fn parse_f32_in_range(value: &str, min: f32, max: f32) -> Result<f32, String> {
    let parsed: f32 = value
        .parse()
        .map_err(|_| format!("expects a value between {min} and {max}"))?;
    if parsed.is_finite() && parsed >= min && parsed <= max {
        Ok(parsed)
    } else {
        Err(format!("expects a value between {min} and {max}"))
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new chat (Ctrl+C while streaming does the same)
  /model <name>          Select a model from the table
  /models                List the models in the table
  /system [prompt]       Set system prompt (no argument empties it)
  /temperature <v>       Set temperature 0.0-1.0
  /top_p <v>             Set top-p 0.0-1.0
  /top_k <n>             Set top-k
  /max_tokens <n>        Set maximum response tokens
  /memory <n>            Set how many prior exchanges the model sees
  /attach <file>...      Upload images for the next message
  /detach <n>            Remove an upload (see /uploads)
  /uploads               List uploads and what the next message will carry
  /save <file>           Save the transcript
  /load <file>           Load a transcript, starting a new chat
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_new_chat() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::NewChat));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::NewChat));
    }

    #[test]
    fn parse_model() {
        assert_eq!(
            parse_command("/model   claude-haiku-4-5  "),
            Some(ChatCommand::Model("claude-haiku-4-5".to_string()))
        );
        assert_eq!(
            parse_command("/model"),
            Some(ChatCommand::Invalid(
                "/model requires a model name".to_string()
            ))
        );
        assert_eq!(parse_command("/models"), Some(ChatCommand::Models));
    }

    #[test]
    fn parse_system() {
        assert_eq!(
            parse_command("/system You are a helpful assistant"),
            Some(ChatCommand::System(Some(
                "You are a helpful assistant".to_string()
            )))
        );
        assert_eq!(parse_command("/system"), Some(ChatCommand::System(None)));
    }

    #[test]
    fn parse_sampling_values() {
        assert_eq!(
            parse_command("/temperature 0.5"),
            Some(ChatCommand::Temperature(0.5))
        );
        assert_eq!(parse_command("/top_p 1"), Some(ChatCommand::TopP(1.0)));
        assert_eq!(parse_command("/top_k 40"), Some(ChatCommand::TopK(40)));
        assert_eq!(
            parse_command("/max_tokens 512"),
            Some(ChatCommand::MaxTokens(512))
        );
        assert_eq!(parse_command("/memory 0"), Some(ChatCommand::Memory(0)));
        assert!(matches!(
            parse_command("/temperature 1.5"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("between")
        ));
        assert!(matches!(
            parse_command("/top_k -3"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("non-negative")
        ));
        assert!(matches!(
            parse_command("/memory"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_upload_commands() {
        assert_eq!(
            parse_command("/attach cat.png  dog.jpg"),
            Some(ChatCommand::Attach(vec![
                "cat.png".to_string(),
                "dog.jpg".to_string()
            ]))
        );
        assert_eq!(parse_command("/detach 2"), Some(ChatCommand::Detach(2)));
        assert!(matches!(
            parse_command("/detach 0"),
            Some(ChatCommand::Invalid(_))
        ));
        assert_eq!(parse_command("/uploads"), Some(ChatCommand::Uploads));
    }

    #[test]
    fn parse_transcript_commands() {
        assert_eq!(
            parse_command("/save session.json"),
            Some(ChatCommand::SaveTranscript("session.json".to_string()))
        );
        assert_eq!(
            parse_command("/load session.json"),
            Some(ChatCommand::LoadTranscript("session.json".to_string()))
        );
        assert!(matches!(
            parse_command("/save"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_stats_and_config() {
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/new"));
        assert!(help.contains("/attach"));
        assert!(help.contains("/memory"));
    }
}
