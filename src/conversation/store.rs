//! In-memory conversation store
//!
//! The store is the server's authoritative transcript of each conversation.
//! Records are capped at a maximum length (oldest entries evicted first) and
//! expire once they have not been updated for the configured window. Expiry
//! is checked lazily on every read and proactively by a periodic sweep task.
//!
//! The store is an owned value shared by handle (`Arc<ConversationStore>`);
//! independent instances never see each other's data.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::providers::Message;

/// Source of "now" for timestamps and expiry checks
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// # Examples
///
/// ```
/// use chatrelay::conversation::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let before = clock.now();
/// clock.advance(Duration::from_secs(60));
/// assert_eq!((clock.now() - before).num_seconds(), 60);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current time
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    /// Moves the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        *now += step;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A message plus the time it was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationEntry {
    /// The stored message
    #[serde(flatten)]
    pub message: Message,
    /// When the message was appended
    pub timestamp: DateTime<Utc>,
}

/// Server-side transcript of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Store-issued identifier
    pub id: String,
    /// Entries in insertion order, capped at the store maximum
    pub messages: Vec<ConversationEntry>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last appended to
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Messages without their timestamps
    pub fn history(&self) -> Vec<Message> {
        self.messages.iter().map(|e| e.message.clone()).collect()
    }
}

/// Result of [`ConversationStore::upsert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    /// Resolved conversation id, possibly freshly issued
    pub id: String,
    /// Full history after the append
    pub history: Vec<Message>,
}

/// Snapshot of store occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Live and not-yet-swept records
    pub total_conversations: usize,
    /// Serialized size of all records
    pub approximate_bytes: usize,
}

/// Conversation store shared by all request handlers
#[derive(Debug)]
pub struct ConversationStore {
    records: Mutex<HashMap<String, ConversationRecord>>,
    max_messages: usize,
    expiry: Duration,
    clock: Arc<dyn Clock>,
}

impl ConversationStore {
    /// Creates a store on the system clock
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a store with an explicit clock
    pub fn with_clock(config: &StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            max_messages: config.max_messages.max(1),
            expiry: config.expiry(),
            clock,
        }
    }

    /// Maximum entries kept per conversation
    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Creates a conversation seeded with `initial` messages
    pub fn create(&self, initial: Vec<Message>) -> ConversationRecord {
        let now = self.clock.now();
        let mut records = self.lock();
        let record = self.insert_new(&mut records, initial, now);
        record.clone()
    }

    /// Returns the record unless it is missing or expired
    ///
    /// An expired record is deleted as a side effect.
    pub fn get(&self, id: &str) -> Option<ConversationRecord> {
        let now = self.clock.now();
        let mut records = self.lock();
        self.live(&mut records, id, now).map(|r| r.clone())
    }

    /// Message history of a live conversation, empty if absent
    pub fn history(&self, id: &str) -> Vec<Message> {
        self.get(id).map(|r| r.history()).unwrap_or_default()
    }

    /// Appends a message, evicting the oldest entries beyond the cap
    ///
    /// Returns `None` without side effects if the record is missing or
    /// expired.
    pub fn append(&self, id: &str, message: Message) -> Option<ConversationRecord> {
        let now = self.clock.now();
        let max = self.max_messages;
        let mut records = self.lock();
        let record = self.live(&mut records, id, now)?;
        push_entry(record, message, now, max);
        Some(record.clone())
    }

    /// Resolves a conversation for an incoming turn
    ///
    /// A missing or unknown `id` yields a freshly issued id; the caller's id
    /// is never adopted. `user_message`, if given, is appended before the
    /// history is returned.
    pub fn upsert(&self, id: Option<&str>, user_message: Option<Message>) -> Upserted {
        let now = self.clock.now();
        let max = self.max_messages;
        let mut records = self.lock();

        let existing = match id {
            Some(id) if self.live(&mut records, id, now).is_some() => Some(id.to_string()),
            Some(id) => {
                tracing::debug!(conversation_id = %id, "Unknown conversation, issuing a new id");
                None
            }
            None => None,
        };

        let resolved = match existing {
            Some(id) => id,
            None => self.insert_new(&mut records, Vec::new(), now).id.clone(),
        };

        let history = match records.get_mut(&resolved) {
            Some(record) => {
                if let Some(message) = user_message {
                    push_entry(record, message, now, max);
                }
                record.history()
            }
            None => Vec::new(),
        };

        Upserted {
            id: resolved,
            history,
        }
    }

    /// Deletes a conversation, returning whether it was live
    pub fn remove(&self, id: &str) -> bool {
        let now = self.clock.now();
        let mut records = self.lock();
        match records.remove(id) {
            Some(record) => !self.is_expired(&record, now),
            None => false,
        }
    }

    /// Deletes every expired record and returns how many were removed
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| !self.is_expired(record, now));
        let pruned = before - records.len();

        if pruned > 0 {
            tracing::info!(pruned_count = pruned, "Pruned expired conversations");
        }
        pruned
    }

    /// Number of records currently held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupancy snapshot
    pub fn stats(&self) -> StoreStats {
        let records = self.lock();
        let approximate_bytes = records
            .values()
            .map(|r| serde_json::to_vec(r).map(|v| v.len()).unwrap_or(0))
            .sum();
        StoreStats {
            total_conversations: records.len(),
            approximate_bytes,
        }
    }

    /// Spawns the periodic expiry sweep
    ///
    /// The task runs until `shutdown` is cancelled. The first sweep happens
    /// one full `interval` after spawning.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            tracing::debug!(interval_secs = interval.as_secs(), "Conversation sweeper started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Conversation sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let pruned = store.prune_expired();
                        crate::metrics::record_pruned(pruned);
                    }
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConversationRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, record: &ConversationRecord, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(record.updated_at)
            .to_std()
            .map(|age| age > self.expiry)
            .unwrap_or(false)
    }

    fn live<'a>(
        &self,
        records: &'a mut HashMap<String, ConversationRecord>,
        id: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut ConversationRecord> {
        let expired = self.is_expired(records.get(id)?, now);
        if expired {
            records.remove(id);
            tracing::debug!(conversation_id = %id, "Conversation expired, removing");
            return None;
        }
        records.get_mut(id)
    }

    fn insert_new<'a>(
        &self,
        records: &'a mut HashMap<String, ConversationRecord>,
        initial: Vec<Message>,
        now: DateTime<Utc>,
    ) -> &'a mut ConversationRecord {
        let id = Uuid::new_v4().to_string();
        let mut messages: Vec<ConversationEntry> = initial
            .into_iter()
            .map(|message| ConversationEntry {
                message,
                timestamp: now,
            })
            .collect();
        trim_to(&mut messages, self.max_messages);

        tracing::debug!(
            conversation_id = %id,
            message_count = messages.len(),
            "Created new conversation"
        );

        records.entry(id.clone()).or_insert(ConversationRecord {
            id,
            messages,
            created_at: now,
            updated_at: now,
        })
    }
}

fn push_entry(record: &mut ConversationRecord, message: Message, now: DateTime<Utc>, max: usize) {
    let role = message.role;
    record.messages.push(ConversationEntry {
        message,
        timestamp: now,
    });
    record.updated_at = now;

    let removed = trim_to(&mut record.messages, max);
    if removed > 0 {
        tracing::debug!(
            conversation_id = %record.id,
            removed_messages = removed,
            "Trimmed old messages"
        );
    }

    tracing::debug!(
        conversation_id = %record.id,
        role = %role,
        message_count = record.messages.len(),
        "Appended message to conversation"
    );
}

fn trim_to(messages: &mut Vec<ConversationEntry>, max: usize) -> usize {
    if messages.len() <= max {
        return 0;
    }
    let excess = messages.len() - max;
    messages.drain(..excess);
    excess
}
