//! Slash commands for the terminal chat client
//!
//! Lines starting with `/` manage local conversations instead of being
//! sent to the server. Matching is case-insensitive; `exit` and `quit`
//! work with or without the slash.

use thiserror::Error;

/// Errors from parsing a slash command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an argument it cannot use
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// A parsed line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start a new conversation and make it active
    New,
    /// List conversations, most recently updated first
    List,
    /// Make the n-th listed conversation active (1-based)
    Switch(usize),
    /// Delete the n-th listed conversation, or the active one
    Delete(Option<usize>),
    /// Show the server-side transcript of the active conversation
    History,
    /// Delete all local conversations
    Clear,
    /// Show session status
    Status,
    /// Show available commands
    Help,
    /// Leave the client
    Exit,
    /// Plain text to send as a chat turn
    Message(String),
}

/// Parses one input line
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands or bad arguments.
///
/// # Examples
///
/// ```
/// use chatrelay::client::commands::{parse_command, ChatCommand};
///
/// assert_eq!(parse_command("/switch 2").unwrap(), ChatCommand::Switch(2));
/// assert_eq!(parse_command("quit").unwrap(), ChatCommand::Exit);
/// assert_eq!(
///     parse_command("hello").unwrap(),
///     ChatCommand::Message("hello".to_string())
/// );
/// assert!(parse_command("/bogus").is_err());
/// ```
pub fn parse_command(input: &str) -> Result<ChatCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') {
        return match lower.as_str() {
            "exit" | "quit" => Ok(ChatCommand::Exit),
            _ => Ok(ChatCommand::Message(trimmed.to_string())),
        };
    }

    let mut parts = lower.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let arg = parts.next();
    if let Some(extra) = parts.next() {
        return Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: extra.to_string(),
        });
    }

    match (command, arg) {
        ("/new", None) => Ok(ChatCommand::New),
        ("/list" | "/ls", None) => Ok(ChatCommand::List),
        ("/switch", None) => Err(CommandError::MissingArgument {
            command: "/switch".to_string(),
            usage: "/switch <number>".to_string(),
        }),
        ("/switch", Some(n)) => parse_index("/switch", n).map(ChatCommand::Switch),
        ("/delete", None) => Ok(ChatCommand::Delete(None)),
        ("/delete", Some(n)) => parse_index("/delete", n).map(|n| ChatCommand::Delete(Some(n))),
        ("/history", None) => Ok(ChatCommand::History),
        ("/clear", None) => Ok(ChatCommand::Clear),
        ("/status", None) => Ok(ChatCommand::Status),
        ("/help" | "/?", None) => Ok(ChatCommand::Help),
        ("/exit" | "/quit", None) => Ok(ChatCommand::Exit),
        (
            "/new" | "/list" | "/ls" | "/history" | "/clear" | "/status" | "/help" | "/?"
            | "/exit" | "/quit",
            Some(arg),
        ) => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn parse_index(command: &str, arg: &str) -> Result<usize, CommandError> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
    }
}

/// Prints the command reference
pub fn print_help() {
    println!(
        r#"
Chat Commands
=============

CONVERSATIONS:
  /new            - Start a new conversation
  /list, /ls      - List conversations (newest first)
  /switch <n>     - Switch to conversation n from /list
  /delete [n]     - Delete conversation n, or the current one
  /clear          - Delete all conversations

SESSION:
  /history        - Show the server copy of the current conversation
  /status         - Show server, conversation and streaming status
  /help, /?       - Show this help
  exit, quit      - Leave the chat

Anything else is sent as a message in the current conversation.
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            parse_command("  Tell me a joke  ").unwrap(),
            ChatCommand::Message("Tell me a joke".to_string())
        );
    }

    #[test]
    fn test_commands_are_case_insensitive() {
        assert_eq!(parse_command("/NEW").unwrap(), ChatCommand::New);
        assert_eq!(parse_command("/Ls").unwrap(), ChatCommand::List);
        assert_eq!(parse_command("EXIT").unwrap(), ChatCommand::Exit);
        assert_eq!(parse_command("/quit").unwrap(), ChatCommand::Exit);
    }

    #[test]
    fn test_delete_with_and_without_index() {
        assert_eq!(parse_command("/delete").unwrap(), ChatCommand::Delete(None));
        assert_eq!(
            parse_command("/delete 3").unwrap(),
            ChatCommand::Delete(Some(3))
        );
    }

    #[test]
    fn test_switch_requires_positive_index() {
        assert!(matches!(
            parse_command("/switch"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse_command("/switch 0"),
            Err(CommandError::UnsupportedArgument { .. })
        ));
        assert!(matches!(
            parse_command("/switch two"),
            Err(CommandError::UnsupportedArgument { .. })
        ));
    }

    #[test]
    fn test_extra_arguments_rejected() {
        assert_eq!(
            parse_command("/new now"),
            Err(CommandError::UnsupportedArgument {
                command: "/new".to_string(),
                arg: "now".to_string(),
            })
        );
        assert!(parse_command("/switch 1 2").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_command("/teleport"),
            Err(CommandError::UnknownCommand("/teleport".to_string()))
        );
    }
}
