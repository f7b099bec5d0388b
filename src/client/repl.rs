//! Interactive terminal chat
//!
//! Reads lines with rustyline, routes slash commands to local state and
//! sends everything else to the chat server. Streamed replies are printed
//! as they grow.

use std::io::Write;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::client::api::ChatClient;
use crate::client::commands::{parse_command, print_help, ChatCommand};
use crate::client::session::{ChatSession, FAILURE_TEXT};
use crate::client::state::ClientConversation;
use crate::config::Config;
use crate::error::Result;

/// Runs the interactive chat loop until `exit`, Ctrl-C or Ctrl-D
///
/// # Errors
///
/// Returns error if the HTTP client or the line editor cannot be created.
pub async fn run_chat(config: Config, no_stream: bool, system: Option<String>) -> Result<()> {
    let client = ChatClient::new(&config.client)?;
    let mut session = ChatSession::new(client, &config.client)
        .with_streaming(!no_stream)
        .with_system_prompt(system);

    let mut rl = DefaultEditor::new()?;
    print_welcome_banner(session.client().base_url(), !no_stream);

    loop {
        match rl.readline(&format!("{} ", ">>".green().bold())) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let command = match parse_command(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{}\n", e.to_string().red());
                        continue;
                    }
                };

                match command {
                    ChatCommand::Exit => break,
                    ChatCommand::Message(text) => send_and_print(&mut session, &text).await,
                    other => handle_command(&mut session, other).await,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn send_and_print(session: &mut ChatSession, text: &str) {
    let mut shown = String::new();
    println!();
    let result = session
        .send(text, |total| {
            let suffix = total.strip_prefix(shown.as_str()).unwrap_or(total);
            print!("{}", suffix);
            let _ = std::io::stdout().flush();
            shown = total.to_string();
        })
        .await;

    match result {
        Ok(report) if report.succeeded => println!("\n"),
        Ok(_) => {
            if !shown.is_empty() {
                println!();
            }
            println!("{}\n", FAILURE_TEXT.red());
        }
        Err(e) => eprintln!("{}\n", e.to_string().red()),
    }
}

async fn handle_command(session: &mut ChatSession, command: ChatCommand) {
    match command {
        ChatCommand::New => {
            let id = session.state_mut().create_conversation();
            println!("Started conversation {}\n", short_id(&id).cyan());
        }
        ChatCommand::List => print_conversations(session),
        ChatCommand::Switch(n) => match nth_conversation_id(session, n) {
            Some(id) => {
                session.state_mut().set_current_conversation(Some(&id));
                if let Some(conversation) = session.state().current_conversation() {
                    println!("Switched to {}\n", conversation.title.bold());
                    print_transcript(conversation);
                }
            }
            None => eprintln!("{}\n", format!("No conversation {}", n).red()),
        },
        ChatCommand::Delete(n) => {
            let id = match n {
                Some(n) => nth_conversation_id(session, n),
                None => session.state().current_conversation_id().map(str::to_string),
            };
            match id {
                Some(id) => {
                    let server_id = session
                        .state()
                        .conversation(&id)
                        .and_then(|c| c.server_conversation_id.clone());
                    if let Some(server_id) = server_id {
                        if let Err(e) = session.client().delete_conversation(&server_id).await {
                            tracing::warn!("Failed to delete server conversation: {:#}", e);
                        }
                    }
                    session.state_mut().delete_conversation(&id);
                    println!("Deleted conversation {}\n", short_id(&id).cyan());
                }
                None => eprintln!("{}\n", "No conversation to delete".red()),
            }
        }
        ChatCommand::History => show_server_history(session).await,
        ChatCommand::Clear => {
            session.state_mut().clear_all_conversations();
            println!("Cleared all conversations\n");
        }
        ChatCommand::Status => print_status(session),
        ChatCommand::Help => print_help(),
        ChatCommand::Exit | ChatCommand::Message(_) => {}
    }
}

async fn show_server_history(session: &ChatSession) {
    let Some(server_id) = session
        .state()
        .current_conversation()
        .and_then(|c| c.server_conversation_id.clone())
    else {
        println!("The server has no copy of this conversation yet\n");
        return;
    };

    match session.client().get_conversation_history(&server_id).await {
        Ok(Some(remote)) => {
            println!(
                "Server conversation {} ({} messages, updated {})\n",
                short_id(&remote.id).cyan(),
                remote.messages.len(),
                remote.updated_at.format("%H:%M:%S")
            );
            for message in &remote.messages {
                println!("{}: {}", message.role.as_str().bold(), message.content);
            }
            println!();
        }
        Ok(None) => println!("The server conversation has expired\n"),
        Err(e) => eprintln!("{}\n", e.to_string().red()),
    }
}

fn nth_conversation_id(session: &ChatSession, n: usize) -> Option<String> {
    session
        .state()
        .list_conversations()
        .get(n.checked_sub(1)?)
        .map(|c| c.id.clone())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn print_conversations(session: &ChatSession) {
    let conversations = session.state().list_conversations();
    if conversations.is_empty() {
        println!("No conversations yet\n");
        return;
    }

    let current = session.state().current_conversation_id();
    for (i, conversation) in conversations.iter().enumerate() {
        let marker = if current == Some(conversation.id.as_str()) {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!(
            "{} {:>2}. {} ({} messages, {})",
            marker,
            i + 1,
            conversation.title,
            conversation.messages.len(),
            conversation
                .updated_at
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S")
        );
    }
    println!();
}

fn print_transcript(conversation: &ClientConversation) {
    for entry in &conversation.messages {
        println!(
            "{}: {}",
            entry.message.role.as_str().bold(),
            entry.message.content
        );
    }
    if !conversation.messages.is_empty() {
        println!();
    }
}

fn print_status(session: &ChatSession) {
    let state = session.state();
    println!("Server:        {}", session.client().base_url().cyan());
    println!("Conversations: {}", state.len());
    match state.current_conversation() {
        Some(c) => {
            println!("Current:       {} ({} messages)", c.title, c.messages.len());
            println!(
                "Server id:     {}",
                c.server_conversation_id.as_deref().unwrap_or("-")
            );
        }
        None => println!("Current:       -"),
    }
    println!();
}

fn print_welcome_banner(server_url: &str, streaming: bool) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║              ChatRelay Terminal Chat - Welcome!              ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Server:    {}", server_url.cyan());
    println!(
        "Streaming: {}\n",
        if streaming { "on".green() } else { "off".yellow() }
    );
    println!("Type '/help' for available commands, 'exit' to quit\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_truncates() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_nth_conversation_is_one_based() {
        let config = Config::default();
        let client = ChatClient::new(&config.client).unwrap();
        let mut session = ChatSession::new(client, &config.client);
        let only = session.state_mut().create_conversation();

        assert_eq!(nth_conversation_id(&session, 1), Some(only));
        assert_eq!(nth_conversation_id(&session, 0), None);
        assert_eq!(nth_conversation_id(&session, 2), None);
    }
}
