//! Client-side conversation state
//!
//! [`ClientState`] holds every conversation the terminal client knows
//! about, the active conversation, and two busy flags. It is a local
//! mirror for rendering; the server keeps its own transcript, and the two
//! are allowed to diverge (titles, ordering, and trimming are independent).
//!
//! Messages carry a stable [`MessageId`] so a streaming reply can be
//! updated by identity rather than by position. Every mutation bumps a
//! revision counter that views can watch to know when to redraw.

use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::providers::{Message, Role};

/// Title given to a conversation before its first message
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// Maximum characters of the first user message used as a title
pub const TITLE_MAX_CHARS: usize = 50;

/// Stable identity of a message within the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// A message as held by the client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    /// Stable identity
    pub id: MessageId,
    /// Role and content
    pub message: Message,
}

/// A conversation as held by the client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConversation {
    /// Client-local id
    pub id: String,
    /// Messages in display order
    pub messages: Vec<ClientMessage>,
    /// Display title, derived from the first message
    pub title: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation last changed
    pub updated_at: DateTime<Utc>,
    /// Id the server issued for this conversation, once known
    pub server_conversation_id: Option<String>,
    touched: u64,
}

impl ClientConversation {
    /// Messages without client identities, as sent on the wire
    pub fn history(&self) -> Vec<Message> {
        self.messages.iter().map(|m| m.message.clone()).collect()
    }

    /// Position of a message by identity
    pub fn position(&self, message_id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }
}

/// Derives a conversation title from its messages
///
/// Uses the first user message, cut to [`TITLE_MAX_CHARS`] characters with
/// `...` appended when longer. Without a user message the title is
/// `Chat HH:MM:SS` in local time.
///
/// # Examples
///
/// ```
/// use chatrelay::client::state::derive_title;
/// use chatrelay::providers::Message;
///
/// assert_eq!(derive_title(&[Message::user("Hello there")]), "Hello there");
/// assert!(derive_title(&[Message::system("be brief")]).starts_with("Chat "));
/// ```
pub fn derive_title(messages: &[Message]) -> String {
    match messages.iter().find(|m| m.role == Role::User) {
        Some(first) => {
            let mut title: String = first.content.chars().take(TITLE_MAX_CHARS).collect();
            if first.content.chars().count() > TITLE_MAX_CHARS {
                title.push_str("...");
            }
            title
        }
        None => format!("Chat {}", Local::now().format("%H:%M:%S")),
    }
}

/// All conversations known to the client plus UI flags
#[derive(Debug)]
pub struct ClientState {
    conversations: HashMap<String, ClientConversation>,
    current: Option<String>,
    loading: bool,
    streaming: bool,
    clock: u64,
    revision: watch::Sender<u64>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientState {
    /// Creates an empty state
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            conversations: HashMap::new(),
            current: None,
            loading: false,
            streaming: false,
            clock: 0,
            revision,
        }
    }

    /// Watches the revision counter, which changes on every mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Creates an empty conversation, makes it active, and returns its id
    pub fn create_conversation(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let touched = self.tick();
        self.conversations.insert(
            id.clone(),
            ClientConversation {
                id: id.clone(),
                messages: Vec::new(),
                title: NEW_CHAT_TITLE.to_string(),
                created_at: now,
                updated_at: now,
                server_conversation_id: None,
                touched,
            },
        );
        self.current = Some(id.clone());
        tracing::debug!(conversation_id = %id, "Created client conversation");
        self.changed();
        id
    }

    /// Makes a conversation active, or clears the selection with `None`
    ///
    /// Unknown ids are ignored.
    pub fn set_current_conversation(&mut self, id: Option<&str>) {
        match id {
            Some(id) if !self.conversations.contains_key(id) => return,
            Some(id) => self.current = Some(id.to_string()),
            None => self.current = None,
        }
        self.changed();
    }

    /// Id of the active conversation
    pub fn current_conversation_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The active conversation
    pub fn current_conversation(&self) -> Option<&ClientConversation> {
        self.current
            .as_deref()
            .and_then(|id| self.conversations.get(id))
    }

    /// Looks up a conversation by id
    pub fn conversation(&self, id: &str) -> Option<&ClientConversation> {
        self.conversations.get(id)
    }

    /// Appends a message and returns its identity
    ///
    /// The title is derived when the conversation was empty before this
    /// call. Returns `None` if the conversation does not exist.
    pub fn add_message(&mut self, conversation_id: &str, message: Message) -> Option<MessageId> {
        let touched = self.tick();
        let conversation = self.conversations.get_mut(conversation_id)?;

        let was_empty = conversation.messages.is_empty();
        let id = MessageId::new();
        conversation.messages.push(ClientMessage { id, message });
        if was_empty {
            conversation.title = derive_title(&conversation.history());
        }
        conversation.updated_at = Utc::now();
        conversation.touched = touched;

        self.changed();
        Some(id)
    }

    /// Replaces the content of a message identified by `message_id`
    ///
    /// Returns false, changing nothing, if either id is unknown.
    pub fn update_message(&mut self, conversation_id: &str, message_id: MessageId, content: &str) -> bool {
        let index = match self
            .conversations
            .get(conversation_id)
            .and_then(|c| c.position(message_id))
        {
            Some(index) => index,
            None => return false,
        };
        self.update_message_at(conversation_id, index, content)
    }

    /// Replaces the content of the message at `index`
    ///
    /// Returns false, changing nothing, if the conversation or index does
    /// not exist.
    pub fn update_message_at(&mut self, conversation_id: &str, index: usize, content: &str) -> bool {
        let touched = self.tick();
        let Some(conversation) = self.conversations.get_mut(conversation_id) else {
            return false;
        };
        let Some(entry) = conversation.messages.get_mut(index) else {
            return false;
        };

        entry.message.content = content.to_string();
        conversation.updated_at = Utc::now();
        conversation.touched = touched;

        self.changed();
        true
    }

    /// Remembers the id the server issued for a conversation
    pub fn set_server_conversation_id(&mut self, conversation_id: &str, server_id: &str) {
        if let Some(conversation) = self.conversations.get_mut(conversation_id) {
            if conversation.server_conversation_id.as_deref() != Some(server_id) {
                conversation.server_conversation_id = Some(server_id.to_string());
                self.changed();
            }
        }
    }

    /// Removes a conversation; clears the selection if it was active
    pub fn delete_conversation(&mut self, id: &str) {
        if self.conversations.remove(id).is_none() {
            return;
        }
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        self.changed();
    }

    /// Removes every conversation and clears the selection
    pub fn clear_all_conversations(&mut self) {
        self.conversations.clear();
        self.current = None;
        self.changed();
    }

    /// Conversations, most recently active first
    pub fn list_conversations(&self) -> Vec<&ClientConversation> {
        let mut list: Vec<&ClientConversation> = self.conversations.values().collect();
        list.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.touched.cmp(&a.touched))
        });
        list
    }

    /// Number of conversations
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Returns true if there are no conversations
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Sets the general loading flag
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.changed();
    }

    /// Sets the streaming-in-progress flag
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
        self.changed();
    }

    /// General loading flag
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Streaming-in-progress flag
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Input should be disabled while either flag is set
    pub fn is_busy(&self) -> bool {
        self.loading || self.streaming
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn changed(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}
