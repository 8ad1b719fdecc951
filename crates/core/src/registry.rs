//! Process-wide conversation state, bounded and exclusively checked out.
//!
//! One inbound message holds its conversation's lock for the whole turn, so
//! no two updates to the same chat's draft/wizard state can interleave.
//! Different chat ids take different locks and proceed concurrently.
//!
//! Retention is bounded on purpose: entries idle past the TTL are dropped on
//! the next checkout, and when the map grows past capacity the least
//! recently active conversations are evicted first. Entries whose turn is
//! still in flight are never evicted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::conversation::Conversation;

struct Entry {
    conversation: Arc<Mutex<Conversation>>,
    last_seen: DateTime<Utc>,
}

impl Entry {
    /// A turn in flight still holds a clone of the conversation `Arc`.
    /// Evicting such an entry would detach it: the turn's end-of-turn
    /// mutations would land on state no later checkout can see.
    fn checked_out(&self) -> bool {
        Arc::strong_count(&self.conversation) > 1
    }
}

pub struct ConversationRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    capacity: usize,
    ttl: Duration,
    history_capacity: usize,
}

impl ConversationRegistry {
    pub fn new(capacity: usize, ttl_secs: u64, history_capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl: Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64),
            history_capacity,
        }
    }

    /// Returns the conversation for `chat_id`, creating it on first contact.
    /// The caller locks the returned mutex for the duration of one turn.
    pub async fn checkout(&self, chat_id: &str) -> Arc<Mutex<Conversation>> {
        self.checkout_at(chat_id, Utc::now()).await
    }

    pub(crate) async fn checkout_at(
        &self,
        chat_id: &str,
        now: DateTime<Utc>,
    ) -> Arc<Mutex<Conversation>> {
        let mut entries = self.entries.lock().await;

        let deadline = now - self.ttl;
        entries.retain(|key, entry| {
            key == chat_id || entry.last_seen > deadline || entry.checked_out()
        });

        if !entries.contains_key(chat_id) && entries.len() >= self.capacity {
            let overflow = entries.len() + 1 - self.capacity;
            evict_least_recent(&mut entries, overflow);
        }

        let entry = entries.entry(chat_id.to_string()).or_insert_with(|| Entry {
            conversation: Arc::new(Mutex::new(Conversation::new(chat_id, self.history_capacity))),
            last_seen: now,
        });
        entry.last_seen = now;
        Arc::clone(&entry.conversation)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn evict_least_recent(entries: &mut HashMap<String, Entry>, count: usize) {
    let mut by_age: Vec<(String, DateTime<Utc>)> = entries
        .iter()
        .filter(|(_, entry)| !entry.checked_out())
        .map(|(key, entry)| (key.clone(), entry.last_seen))
        .collect();
    by_age.sort_by_key(|(_, last_seen)| *last_seen);
    for (key, _) in by_age.into_iter().take(count) {
        entries.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::ConversationRegistry;

    #[tokio::test]
    async fn checkout_creates_and_reuses_conversations() {
        let registry = ConversationRegistry::new(8, 3600, 10);

        let first = registry.checkout("chat-1").await;
        first.lock().await.history.push(crate::domain::conversation::Role::User, "hi");

        let again = registry.checkout("chat-1").await;
        assert_eq!(again.lock().await.history.len(), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_active() {
        let registry = ConversationRegistry::new(2, 3600, 10);
        let base = Utc::now();

        registry.checkout_at("chat-1", base).await;
        registry.checkout_at("chat-2", base + Duration::seconds(1)).await;
        registry.checkout_at("chat-3", base + Duration::seconds(2)).await;

        assert_eq!(registry.len().await, 2);
        // chat-1 was the coldest entry and must be gone; its state restarts.
        let revived = registry.checkout_at("chat-1", base + Duration::seconds(3)).await;
        assert!(revived.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn eviction_never_detaches_a_conversation_mid_turn() {
        let registry = ConversationRegistry::new(2, 3600, 10);
        let base = Utc::now();

        // chat-1 is the coldest entry but its turn is still running.
        let in_flight = registry.checkout_at("chat-1", base).await;
        registry.checkout_at("chat-2", base + Duration::seconds(1)).await;
        registry.checkout_at("chat-3", base + Duration::seconds(2)).await;

        in_flight.lock().await.history.push(crate::domain::conversation::Role::User, "hi");
        drop(in_flight);

        // The mid-turn mutation must be visible on the next checkout.
        let again = registry.checkout_at("chat-1", base + Duration::seconds(3)).await;
        assert_eq!(again.lock().await.history.len(), 1);
        // chat-2 took the eviction instead.
        let revived = registry.checkout_at("chat-2", base + Duration::seconds(4)).await;
        assert!(revived.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn ttl_spares_a_conversation_mid_turn() {
        let registry = ConversationRegistry::new(8, 60, 10);
        let base = Utc::now();

        let held = registry.checkout_at("chat-1", base).await;
        registry.checkout_at("chat-2", base + Duration::seconds(120)).await;

        assert_eq!(registry.len().await, 2);
        drop(held);
    }

    #[tokio::test]
    async fn ttl_expires_idle_conversations() {
        let registry = ConversationRegistry::new(8, 60, 10);
        let base = Utc::now();

        registry.checkout_at("chat-1", base).await;
        registry.checkout_at("chat-2", base + Duration::seconds(120)).await;

        assert_eq!(registry.len().await, 1);
    }
}
