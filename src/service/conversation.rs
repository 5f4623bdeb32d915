//! Where to reach each user proactively.
//!
//! The chat service records a reference on every inbound message; scheduled prompts and
//! reminders look it up. The default store is process-local.

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::base::types::{Res, Void};

/// How to address a user outside of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReference {
    pub tenant_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub service_url: String,
    pub bot_id: String,
}

// Traits.

/// Generic conversation-reference store trait that stores must implement.
#[async_trait]
pub trait GenericConversationStore: Send + Sync + 'static {
    async fn get(&self, tenant_id: &str, user_id: &str) -> Res<Option<ConversationReference>>;

    /// Stores a reference, replacing any earlier one for the same user.
    async fn put(&self, reference: ConversationReference) -> Void;
}

// Structs.

/// Conversation store for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<dyn GenericConversationStore>,
}

impl Deref for ConversationStore {
    type Target = dyn GenericConversationStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ConversationStore {
    pub fn new(inner: Arc<dyn GenericConversationStore>) -> Self {
        Self { inner }
    }

    /// A process-local store.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryConversationStore::default()))
    }
}

/// In-memory conversation store implementation.
#[derive(Default)]
pub struct MemoryConversationStore {
    references: DashMap<(String, String), ConversationReference>,
}

#[async_trait]
impl GenericConversationStore for MemoryConversationStore {
    async fn get(&self, tenant_id: &str, user_id: &str) -> Res<Option<ConversationReference>> {
        let key = (tenant_id.to_string(), user_id.to_string());
        Ok(self.references.get(&key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, reference: ConversationReference) -> Void {
        let key = (reference.tenant_id.clone(), reference.user_id.clone());
        self.references.insert(key, reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(tenant_id: &str, conversation_id: &str) -> ConversationReference {
        ConversationReference {
            tenant_id: tenant_id.to_string(),
            user_id: "u1".to_string(),
            conversation_id: conversation_id.to_string(),
            service_url: "https://smba.example.com/".to_string(),
            bot_id: "bot".to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_replaces_and_is_tenant_scoped() {
        let store = ConversationStore::memory();

        store.put(reference("t1", "c1")).await.unwrap();
        store.put(reference("t1", "c2")).await.unwrap();

        assert_eq!(store.get("t1", "u1").await.unwrap().unwrap().conversation_id, "c2");
        assert!(store.get("t2", "u1").await.unwrap().is_none());
    }
}
