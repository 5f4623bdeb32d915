//! Language model backed intent classification.
//!
//! The classifier only ever consults this service for inconclusive messages, and treats
//! every error as "no opinion".

pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{AiClassification, Res};

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// Implementing this trait allows different LLM providers to back the AI tier of the
/// intent classifier.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Classifies a single chat message.
    ///
    /// Implementations return an error for transport failures, refusals and output that
    /// does not match the expected structure.
    async fn classify_intent(&self, message: &str) -> Res<AiClassification>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}
