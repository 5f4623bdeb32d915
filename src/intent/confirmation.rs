//! Confidence-gated confirmation.
//!
//! Inferred intents that would write to the store are parked here, keyed by
//! (tenant, user, conversation), until the user accepts or rejects them. Entries
//! expire after the configured TTL.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::base::{cards, types::Card};

use super::ClassifiedIntent;

/// Identifies one conversation with one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfirmationKey {
    pub tenant_id: String,
    pub user_id: String,
    pub conversation_id: String,
}

impl ConfirmationKey {
    pub fn new(tenant_id: &str, user_id: &str, conversation_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
        }
    }
}

/// An inferred intent waiting for an answer.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub intent: ClassifiedIntent,
    pub created_at: DateTime<Utc>,
}

/// What to do with an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    /// Accepted: run the original intent.
    Execute(ClassifiedIntent),
    /// Rejected: show the location card again.
    Reprompt,
    /// The confirmation outlived its TTL.
    Expired,
    /// Nothing was waiting.
    NothingPending,
}

/// Pending confirmations with a TTL.
///
/// This is trivially cloneable; clones share the same entries.
#[derive(Clone)]
pub struct ConfirmationGate {
    entries: Arc<DashMap<ConfirmationKey, PendingConfirmation>>,
    ttl: chrono::Duration,
}

impl ConfirmationGate {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1)),
        }
    }

    /// Whether acting on the intent needs the user's confirmation first.
    pub fn needs_confirmation(intent: &ClassifiedIntent) -> bool {
        intent.source.is_inferred() && intent.category.is_mutating()
    }

    /// The confirmation prompt for an intent.
    pub fn render(intent: &ClassifiedIntent) -> Card {
        cards::confirmation_card(intent)
    }

    /// Parks an intent until the user answers, replacing any earlier one.
    pub fn hold(&self, key: ConfirmationKey, intent: ClassifiedIntent) {
        self.hold_at(key, intent, Utc::now());
    }

    pub fn hold_at(&self, key: ConfirmationKey, intent: ClassifiedIntent, now: DateTime<Utc>) {
        self.entries.insert(key, PendingConfirmation { intent, created_at: now });
    }

    /// Drops a pending confirmation, e.g. when a fresh action supersedes it.
    pub fn cancel(&self, key: &ConfirmationKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether an unexpired confirmation is waiting.
    pub fn is_pending(&self, key: &ConfirmationKey) -> bool {
        self.is_pending_at(key, Utc::now())
    }

    pub fn is_pending_at(&self, key: &ConfirmationKey, now: DateTime<Utc>) -> bool {
        self.entries.get(key).is_some_and(|entry| !self.is_expired(&entry, now))
    }

    /// Resolves the pending confirmation with the user's answer.
    pub fn resolve(&self, key: &ConfirmationKey, accepted: bool) -> ConfirmationOutcome {
        self.resolve_at(key, accepted, Utc::now())
    }

    pub fn resolve_at(&self, key: &ConfirmationKey, accepted: bool, now: DateTime<Utc>) -> ConfirmationOutcome {
        let Some((_, pending)) = self.entries.remove(key) else {
            return ConfirmationOutcome::NothingPending;
        };

        if self.is_expired(&pending, now) {
            return ConfirmationOutcome::Expired;
        }

        if accepted { ConfirmationOutcome::Execute(pending.intent) } else { ConfirmationOutcome::Reprompt }
    }

    /// Removes expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, pending| !self.is_expired(pending, now));
        let purged = before.saturating_sub(self.entries.len());

        if purged > 0 {
            debug!("Purged {purged} expired confirmations.");
        }

        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, pending: &PendingConfirmation, now: DateTime<Utc>) -> bool {
        now - pending.created_at >= self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Command, IntentCategory, IntentSource};

    fn key() -> ConfirmationKey {
        ConfirmationKey::new("t1", "u1", "c1")
    }

    fn inferred_remote() -> ClassifiedIntent {
        ClassifiedIntent::new(IntentCategory::SetRemote, 0.8, IntentSource::Rule, "working from home", "Said they are working remotely.")
    }

    #[test]
    fn test_needs_confirmation() {
        assert!(ConfirmationGate::needs_confirmation(&inferred_remote()));

        let alias = ClassifiedIntent::new(IntentCategory::SetRemote, 1.0, IntentSource::Alias, "wfh", "");
        assert!(!ConfirmationGate::needs_confirmation(&alias));

        let query = ClassifiedIntent::new(IntentCategory::TeamQuery, 0.9, IntentSource::Ai, "who's in", "");
        assert!(!ConfirmationGate::needs_confirmation(&query));

        let command = ClassifiedIntent::new(IntentCategory::Command(Command::Status), 1.0, IntentSource::Command, "status", "");
        assert!(!ConfirmationGate::needs_confirmation(&command));
    }

    #[test]
    fn test_accept_executes_original_intent() {
        let gate = ConfirmationGate::new(Duration::from_secs(3600));
        gate.hold(key(), inferred_remote());

        assert_eq!(gate.resolve(&key(), true), ConfirmationOutcome::Execute(inferred_remote()));
        assert_eq!(gate.resolve(&key(), true), ConfirmationOutcome::NothingPending);
    }

    #[test]
    fn test_reject_reprompts() {
        let gate = ConfirmationGate::new(Duration::from_secs(3600));
        gate.hold(key(), inferred_remote());

        assert_eq!(gate.resolve(&key(), false), ConfirmationOutcome::Reprompt);
        assert!(gate.is_empty());
    }

    #[test]
    fn test_keys_are_isolated() {
        let gate = ConfirmationGate::new(Duration::from_secs(3600));
        gate.hold(key(), inferred_remote());

        let other = ConfirmationKey::new("t2", "u1", "c1");
        assert_eq!(gate.resolve(&other, true), ConfirmationOutcome::NothingPending);
        assert!(gate.is_pending(&key()));
    }

    #[test]
    fn test_expiry() {
        let gate = ConfirmationGate::new(Duration::from_secs(3600));
        let start = Utc::now();

        gate.hold_at(key(), inferred_remote(), start);
        gate.hold_at(ConfirmationKey::new("t1", "u2", "c2"), inferred_remote(), start + chrono::Duration::minutes(30));

        let later = start + chrono::Duration::minutes(61);
        assert!(!gate.is_pending_at(&key(), later));
        assert_eq!(gate.purge_expired_at(later), 1);
        assert_eq!(gate.len(), 1);

        gate.hold_at(key(), inferred_remote(), start);
        assert_eq!(gate.resolve_at(&key(), true, later), ConfirmationOutcome::Expired);
    }
}
