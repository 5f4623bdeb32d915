//! Messaging channel integration.
//!
//! Outbound delivery goes through the `GenericChatClient` trait; the Teams implementation
//! also provides the inbound `/api/messages` route.

pub mod teams;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{
    base::types::{Outbound, Res, Void},
    service::conversation::ConversationReference,
};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the core functionality for interacting with chat platforms
/// like Microsoft Teams. Implementing this trait allows different chat services to be used
/// with the checkin-bot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Sends a payload to a user outside of a reply (daily prompts and reminders).
    ///
    /// Fails when there is no known way to reach the user.
    async fn send_to_user(&self, tenant_id: &str, user_id: &str, payload: &Outbound) -> Void;

    /// Replies in a conversation, optionally threaded under an inbound activity.
    async fn reply(&self, reference: &ConversationReference, reply_to_id: Option<String>, payload: &Outbound) -> Void;

    /// Looks up the email address of a conversation member.
    async fn get_member_email(&self, reference: &ConversationReference, user_id: &str) -> Res<Option<String>>;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
