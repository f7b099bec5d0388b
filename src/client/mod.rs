//! Terminal chat client
//!
//! - `api`: HTTP calls against a running server
//! - `state`: local conversations and busy flags
//! - `consumer`: reads streamed replies
//! - `session`: ties the three together for one send
//! - `commands` and `repl`: the interactive front end

pub mod api;
pub mod commands;
pub mod consumer;
pub mod repl;
pub mod session;
pub mod state;

pub use api::ChatClient;
pub use consumer::{ConsumerState, StreamConsumer, StreamEvent};
pub use session::{ChatSession, SendReport, FAILURE_TEXT};
pub use state::{ClientConversation, ClientState, MessageId};
