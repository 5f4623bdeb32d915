//! The message orchestrator.
//!
//! Every inbound message, text or card submission, goes through [`Bot::handle`], which
//! returns the payloads to send back. Delivery is left to the caller.

use std::{ops::Deref, sync::Arc};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::{
    base::{
        cards,
        types::{InboundBody, InboundMessage, Outbound, Res},
    },
    intent::{
        ClassifiedIntent, Command, IntentCategory,
        classifier::IntentClassifier,
        command::COMMAND_HELP,
        confirmation::{ConfirmationGate, ConfirmationKey, ConfirmationOutcome},
    },
    schedule::calendar::WorkingDayService,
    service::{
        db::{DbClient, LocationEntry, User},
        directory::DirectoryClient,
    },
};

use super::{
    actions,
    dedup::DedupCache,
    queries,
    submission::{self, Submission},
};

/// Sent when handling fails; details only go to the log.
pub const APOLOGY: &str = "Sorry, something went wrong on my side. Please try again in a moment.";

/// Everything the orchestrator needs.
pub struct BotInner {
    pub db: DbClient,
    pub calendar: WorkingDayService,
    pub classifier: IntentClassifier,
    pub gate: ConfirmationGate,
    pub dedup: DedupCache,
    pub directory: Option<DirectoryClient>,
}

/// The check-in bot.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl Deref for Bot {
    type Target = BotInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<BotInner> for Bot {
    fn from(inner: BotInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

impl Bot {
    /// Handles one inbound message and returns the replies.
    ///
    /// Never fails: errors are logged and answered with [`APOLOGY`].
    #[instrument(name = "Bot::handle", skip_all, fields(tenant = %message.tenant_id, user = %message.user_id))]
    pub async fn handle(&self, message: &InboundMessage) -> Vec<Outbound> {
        let body = match &message.body {
            InboundBody::Text(text) => text.clone(),
            InboundBody::Submission(value) => value.to_string(),
        };

        if self.dedup.check_and_record(&message.tenant_id, &message.user_id, &body) {
            debug!("Dropping duplicate message.");
            return Vec::new();
        }

        match self.handle_internal(message).await {
            Ok(replies) => replies,
            Err(err) => {
                error!("Error while handling message: {:#}", err);
                // A failed message must not block the user's retry.
                self.dedup.forget(&message.tenant_id, &message.user_id, &body);
                vec![Outbound::text(APOLOGY)]
            }
        }
    }

    async fn handle_internal(&self, message: &InboundMessage) -> Res<Vec<Outbound>> {
        let user = self
            .db
            .get_or_create_user(&message.tenant_id, &message.user_id, &message.display_name, None, message.email.as_deref())
            .await?;

        let date = self.calendar.date_of(message.timestamp);
        let key = ConfirmationKey::new(&message.tenant_id, &message.user_id, &message.conversation_id);

        match &message.body {
            InboundBody::Text(text) => self.handle_text(text, &user, date, key).await,
            InboundBody::Submission(value) => self.handle_submission(value, &user, date, key).await,
        }
    }

    async fn handle_text(&self, text: &str, user: &User, date: NaiveDate, key: ConfirmationKey) -> Res<Vec<Outbound>> {
        let intent = self.classifier.classify(text).await;

        info!(
            category = ?intent.category,
            source = intent.source.label(),
            confidence = intent.confidence,
            "Classified message."
        );

        let category = intent.category;

        match category {
            IntentCategory::Command(Command::Yes) => self.resolve_confirmation(&key, true, user, date).await,
            IntentCategory::Command(Command::No) => self.resolve_confirmation(&key, false, user, date).await,
            _ if ConfirmationGate::needs_confirmation(&intent) => {
                let card = ConfirmationGate::render(&intent);
                self.gate.hold(key, intent);

                Ok(vec![Outbound::Card(card)])
            }
            _ => {
                if category.is_mutating() {
                    self.gate.cancel(&key);
                }

                self.dispatch(&intent, user, date).await
            }
        }
    }

    async fn handle_submission(&self, value: &Value, user: &User, date: NaiveDate, key: ConfirmationKey) -> Res<Vec<Outbound>> {
        let submission = match submission::parse(value) {
            Ok(submission) => submission,
            Err(err) => {
                debug!("Rejected submission: {err:?}");
                return Ok(vec![Outbound::text(err.to_string())]);
            }
        };

        if let Submission::Confirm(accepted) = submission {
            return self.resolve_confirmation(&key, accepted, user, date).await;
        }

        // A card action supersedes anything still waiting for confirmation.
        self.gate.cancel(&key);

        match submission {
            Submission::SetLocation(location) => self.record(user, date, LocationEntry::full_day(location)?).await,
            Submission::SetHybrid { morning, afternoon } => self.record(user, date, actions::hybrid_entry(morning, afternoon)?).await,
            Submission::Clear => self.clear(user, date).await,
            Submission::Confirm(_) => Ok(Vec::new()),
        }
    }

    async fn resolve_confirmation(&self, key: &ConfirmationKey, accepted: bool, user: &User, date: NaiveDate) -> Res<Vec<Outbound>> {
        match self.gate.resolve(key, accepted) {
            ConfirmationOutcome::Execute(intent) => self.dispatch(&intent, user, date).await,
            ConfirmationOutcome::Reprompt => Ok(vec![
                Outbound::text("No problem. Where are you working today?"),
                Outbound::Card(cards::location_card(date)),
            ]),
            ConfirmationOutcome::Expired => Ok(vec![Outbound::text(
                "That confirmation has expired, so I didn't change anything. Please tell me again where you're working.",
            )]),
            ConfirmationOutcome::NothingPending => Ok(vec![Outbound::text("There's nothing waiting for confirmation.")]),
        }
    }

    /// Acts on an intent that needs no (further) confirmation.
    async fn dispatch(&self, intent: &ClassifiedIntent, user: &User, date: NaiveDate) -> Res<Vec<Outbound>> {
        let tenant_id = user.tenant_id.as_str();

        let reply = match intent.category {
            IntentCategory::SetOffice | IntentCategory::SetRemote => {
                let location = intent.category.location().ok_or_else(|| anyhow::anyhow!("Location intent without a location."))?;
                return self.record(user, date, LocationEntry::full_day(location)?).await;
            }
            IntentCategory::NotWorking => return self.clear(user, date).await,
            IntentCategory::StatusQuery | IntentCategory::Command(Command::Status) => queries::status(&self.db, &self.calendar, user, date).await?,
            IntentCategory::Command(Command::History) => queries::history(&self.db, &self.calendar, user, date).await?,
            IntentCategory::TeamQuery | IntentCategory::Command(Command::Team) => queries::team(&self.db, tenant_id, date).await?,
            IntentCategory::PersonQuery => match intent.extracted_entity.as_deref() {
                Some(name) => queries::person(&self.db, tenant_id, name, date).await?,
                None => queries::team(&self.db, tenant_id, date).await?,
            },
            IntentCategory::Command(Command::Stats) => queries::stats(&self.db, tenant_id, date).await?,
            IntentCategory::HolidayQuery | IntentCategory::Command(Command::Holidays) => queries::holidays(&self.calendar, date).await,
            IntentCategory::Command(Command::Help) => format!("Here's what I can do:\n\n{COMMAND_HELP}"),
            IntentCategory::Command(Command::CheckIn) => return Ok(vec![Outbound::Card(cards::location_card(date))]),
            IntentCategory::Command(Command::Yes | Command::No) => "There's nothing waiting for confirmation.".to_string(),
            IntentCategory::Unclear if intent.prompt_for_location => {
                return Ok(vec![
                    Outbound::text("Thanks! Where are you working today?"),
                    Outbound::Card(cards::location_card(date)),
                ]);
            }
            IntentCategory::Unclear => format!("Sorry, I didn't understand that. Here's what I can do:\n\n{COMMAND_HELP}"),
        };

        Ok(vec![Outbound::text(reply)])
    }

    async fn record(&self, user: &User, date: NaiveDate, entry: LocationEntry) -> Res<Vec<Outbound>> {
        let outcome = actions::set_location(&self.db, self.directory.as_ref(), user, date, entry).await?;

        Ok(vec![Outbound::text(actions::describe_outcome(&outcome, date))])
    }

    async fn clear(&self, user: &User, date: NaiveDate) -> Res<Vec<Outbound>> {
        actions::clear_location(&self.db, user, date).await?;

        Ok(vec![Outbound::text("Got it, you're not working today. I've cleared today's location.")])
    }
}
