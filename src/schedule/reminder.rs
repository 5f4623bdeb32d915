//! The daily prompt, reminder and reset triggers.
//!
//! Per (user, date) the state lives in the store: no pending row and no record means
//! nobody was prompted, a pending row means prompted or reminded (its count tells how
//! often), and records without a pending row mean the user responded. Every trigger is
//! a no-op on non-working days and only ever acts on users without a response, so
//! re-running one for the same day is safe.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    base::{
        cards::{self, REMINDER_TIERS},
        types::{Outbound, Res},
    },
    service::{
        chat::ChatClient,
        db::{DailyStatistics, DbClient, PendingReminder, User},
    },
};

use super::calendar::WorkingDayService;

/// What a prompt or reminder trigger did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    pub working_day: bool,
    pub tenants: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TriggerReport {
    fn absorb(&mut self, other: TriggerReport) {
        self.sent += other.sent;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// One tenant's end-of-day summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub tenant_id: String,
    pub date: NaiveDate,
    pub statistics: DailyStatistics,
    pub cleared_reminders: usize,
}

/// What the daily reset did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub working_day: bool,
    pub summaries: Vec<DailySummary>,
    pub failed_tenants: usize,
}

/// Drives the per-tenant reminder cycle.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ReminderScheduler {
    db: DbClient,
    chat: ChatClient,
    calendar: WorkingDayService,
}

impl ReminderScheduler {
    pub fn new(db: DbClient, chat: ChatClient, calendar: WorkingDayService) -> Self {
        Self { db, chat, calendar }
    }

    /// Registered users grouped by tenant.
    async fn users_by_tenant(&self) -> Res<BTreeMap<String, Vec<User>>> {
        let mut tenants: BTreeMap<String, Vec<User>> = BTreeMap::new();

        for user in self.db.get_all_users(None).await? {
            tenants.entry(user.tenant_id.clone()).or_default().push(user);
        }

        Ok(tenants)
    }

    // Daily prompt.

    /// Sends today's location card to everyone who has not responded.
    pub async fn trigger_daily_prompts(&self) -> Res<TriggerReport> {
        self.trigger_daily_prompts_on(self.calendar.today()).await
    }

    #[instrument(skip(self))]
    pub async fn trigger_daily_prompts_on(&self, date: NaiveDate) -> Res<TriggerReport> {
        if !self.calendar.is_working_day(date).await {
            info!("Skipping daily prompts: {date} is not a working day.");
            return Ok(TriggerReport::default());
        }

        let tenants = self.users_by_tenant().await?;
        let mut report = TriggerReport {
            working_day: true,
            tenants: tenants.len(),
            ..Default::default()
        };

        for (tenant_id, users) in &tenants {
            let tenant_report = self.prompt_tenant(tenant_id, users, date).await;
            info!(tenant = %tenant_id, sent = tenant_report.sent, skipped = tenant_report.skipped, failed = tenant_report.failed, "Daily prompts done.");
            report.absorb(tenant_report);
        }

        Ok(report)
    }

    async fn prompt_tenant(&self, tenant_id: &str, users: &[User], date: NaiveDate) -> TriggerReport {
        let mut report = TriggerReport::default();

        for user in users {
            match self.prompt_user(user, date).await {
                Ok(true) => report.sent += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    warn!(tenant = %tenant_id, user = %user.external_id, "Daily prompt failed: {:#}", err);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Returns whether a prompt was sent.
    async fn prompt_user(&self, user: &User, date: NaiveDate) -> Res<bool> {
        let (tenant_id, user_id) = (user.tenant_id.as_str(), user.external_id.as_str());

        if self.db.get_pending_reminder(tenant_id, user_id, date).await?.is_some() {
            return Ok(false);
        }

        if self.db.get_latest_location_for_user(tenant_id, user_id, date).await?.is_some() {
            return Ok(false);
        }

        self.chat.send_to_user(tenant_id, user_id, &Outbound::Card(cards::location_card(date))).await?;
        self.db.add_pending_reminder(tenant_id, user_id, date).await?;

        Ok(true)
    }

    // Reminders.

    /// Sends reminder `tier` to everyone still pending below that tier.
    pub async fn trigger_reminders(&self, tier: u32) -> Res<TriggerReport> {
        self.trigger_reminders_on(self.calendar.today(), tier).await
    }

    #[instrument(skip(self))]
    pub async fn trigger_reminders_on(&self, date: NaiveDate, tier: u32) -> Res<TriggerReport> {
        if !(1..=REMINDER_TIERS).contains(&tier) {
            return Err(anyhow::anyhow!("Reminder tier must be between 1 and {REMINDER_TIERS}, got {tier}."));
        }

        if !self.calendar.is_working_day(date).await {
            info!("Skipping reminder {tier}: {date} is not a working day.");
            return Ok(TriggerReport::default());
        }

        let tenants = self.users_by_tenant().await?;
        let mut report = TriggerReport {
            working_day: true,
            tenants: tenants.len(),
            ..Default::default()
        };

        for tenant_id in tenants.keys() {
            match self.remind_tenant(tenant_id, date, tier).await {
                Ok(tenant_report) => {
                    info!(tenant = %tenant_id, sent = tenant_report.sent, skipped = tenant_report.skipped, failed = tenant_report.failed, "Reminder {tier} done.");
                    report.absorb(tenant_report);
                }
                Err(err) => {
                    warn!(tenant = %tenant_id, "Reminder {tier} failed for tenant: {:#}", err);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn remind_tenant(&self, tenant_id: &str, date: NaiveDate, tier: u32) -> Res<TriggerReport> {
        let mut report = TriggerReport::default();

        for pending in self.db.get_pending_reminders(tenant_id, date).await? {
            match self.remind_user(&pending, tier).await {
                Ok(true) => report.sent += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    warn!(tenant = %tenant_id, user = %pending.user_id, "Reminder {tier} failed: {:#}", err);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Returns whether a reminder was sent.
    async fn remind_user(&self, pending: &PendingReminder, tier: u32) -> Res<bool> {
        let (tenant_id, user_id, date) = (pending.tenant_id.as_str(), pending.user_id.as_str(), pending.date);

        if pending.reminder_count >= tier {
            return Ok(false);
        }

        // A response that raced the pending-row removal.
        if self.db.get_latest_location_for_user(tenant_id, user_id, date).await?.is_some() {
            self.db.remove_pending_reminder(tenant_id, user_id, date).await?;
            return Ok(false);
        }

        self.chat.send_to_user(tenant_id, user_id, &Outbound::Card(cards::reminder_card(date, tier))).await?;
        self.db.update_reminder_count(tenant_id, user_id, date, tier).await?;

        Ok(true)
    }

    // Daily reset.

    /// Summarizes the day per tenant and drops every pending reminder.
    pub async fn trigger_daily_reset(&self) -> Res<ResetReport> {
        self.trigger_daily_reset_on(self.calendar.today()).await
    }

    #[instrument(skip(self))]
    pub async fn trigger_daily_reset_on(&self, date: NaiveDate) -> Res<ResetReport> {
        if !self.calendar.is_working_day(date).await {
            info!("Skipping daily reset: {date} is not a working day.");
            return Ok(ResetReport::default());
        }

        let tenants = self.users_by_tenant().await?;
        let mut report = ResetReport {
            working_day: true,
            ..Default::default()
        };

        for tenant_id in tenants.keys() {
            match self.reset_tenant(tenant_id, date).await {
                Ok(summary) => {
                    let stats = &summary.statistics;
                    info!(
                        tenant = %tenant_id,
                        responded = stats.responded_users,
                        total = stats.total_users,
                        remote = stats.remote_count,
                        office = stats.office_count,
                        hybrid = stats.hybrid_count,
                        cleared = summary.cleared_reminders,
                        "Daily reset done."
                    );
                    report.summaries.push(summary);
                }
                Err(err) => {
                    warn!(tenant = %tenant_id, "Daily reset failed for tenant: {:#}", err);
                    report.failed_tenants += 1;
                }
            }
        }

        Ok(report)
    }

    async fn reset_tenant(&self, tenant_id: &str, date: NaiveDate) -> Res<DailySummary> {
        let statistics = self.db.get_daily_statistics(tenant_id, date).await?;
        let cleared_reminders = self.db.clear_all_pending_reminders(tenant_id, date).await?;

        Ok(DailySummary {
            tenant_id: tenant_id.to_string(),
            date,
            statistics,
            cleared_reminders,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        base::{
            config::{Config, ConfigInner},
            types::{Void, WorkLocation},
        },
        service::{chat::GenericChatClient, conversation::ConversationReference, db::LocationEntry},
    };

    /// Records deliveries; fails for users listed in `unreachable`.
    #[derive(Default)]
    struct RecordingChat {
        sent: Mutex<Vec<(String, String, Outbound)>>,
        unreachable: Vec<String>,
    }

    #[async_trait]
    impl GenericChatClient for RecordingChat {
        async fn send_to_user(&self, tenant_id: &str, user_id: &str, payload: &Outbound) -> Void {
            if self.unreachable.iter().any(|id| id == user_id) {
                return Err(anyhow::anyhow!("no conversation for {user_id}"));
            }

            self.sent.lock().unwrap().push((tenant_id.to_string(), user_id.to_string(), payload.clone()));
            Ok(())
        }

        async fn reply(&self, _reference: &ConversationReference, _reply_to_id: Option<String>, _payload: &Outbound) -> Void {
            Ok(())
        }

        async fn get_member_email(&self, _reference: &ConversationReference, _user_id: &str) -> Res<Option<String>> {
            Ok(None)
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup(unreachable: &[&str]) -> (ReminderScheduler, DbClient, Arc<RecordingChat>) {
        let config = Config::from(ConfigInner::default());
        let db = DbClient::surreal_memory().await.unwrap();
        let chat = Arc::new(RecordingChat {
            unreachable: unreachable.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        });

        db.get_or_create_user("t1", "u1", "Alice", None, None).await.unwrap();
        db.get_or_create_user("t1", "u2", "Bob", None, None).await.unwrap();
        db.get_or_create_user("t2", "u3", "Carol", None, None).await.unwrap();

        let scheduler = ReminderScheduler::new(db.clone(), ChatClient::new(chat.clone()), WorkingDayService::new(&config, None));

        (scheduler, db, chat)
    }

    #[tokio::test]
    async fn test_daily_prompt_skips_responders_and_is_idempotent() {
        let (scheduler, db, chat) = setup(&[]).await;
        let monday = date(2025, 6, 2);

        db.save_location_record("t1", "u2", monday, LocationEntry::full_day(WorkLocation::Office).unwrap(), 0).await.unwrap();

        let report = scheduler.trigger_daily_prompts_on(monday).await.unwrap();
        assert_eq!(report.tenants, 2);
        assert_eq!(report.sent, 2);
        assert_eq!(report.skipped, 1);

        let pending = db.get_pending_reminder("t1", "u1", monday).await.unwrap().unwrap();
        assert_eq!(pending.reminder_count, 0);
        assert!(db.get_pending_reminder("t1", "u2", monday).await.unwrap().is_none());

        let again = scheduler.trigger_daily_prompts_on(monday).await.unwrap();
        assert_eq!(again.sent, 0);
        assert_eq!(chat.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_others() {
        let (scheduler, db, _chat) = setup(&["u1"]).await;
        let monday = date(2025, 6, 2);

        let report = scheduler.trigger_daily_prompts_on(monday).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 2);
        assert!(db.get_pending_reminder("t1", "u1", monday).await.unwrap().is_none());
        assert!(db.get_pending_reminder("t1", "u2", monday).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_triggers_are_noops_on_non_working_days() {
        let (scheduler, db, chat) = setup(&[]).await;
        let saturday = date(2025, 6, 7);
        let christmas = date(2025, 12, 25);

        for day in [saturday, christmas] {
            assert!(!scheduler.trigger_daily_prompts_on(day).await.unwrap().working_day);
            assert!(!scheduler.trigger_reminders_on(day, 1).await.unwrap().working_day);
            assert!(!scheduler.trigger_daily_reset_on(day).await.unwrap().working_day);
        }

        db.add_pending_reminder("t1", "u1", saturday).await.unwrap();
        scheduler.trigger_daily_reset_on(saturday).await.unwrap();

        assert!(db.get_pending_reminder("t1", "u1", saturday).await.unwrap().is_some());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reminder_tiers_escalate_once_each() {
        let (scheduler, db, chat) = setup(&[]).await;
        let monday = date(2025, 6, 2);

        scheduler.trigger_daily_prompts_on(monday).await.unwrap();

        let first = scheduler.trigger_reminders_on(monday, 1).await.unwrap();
        assert_eq!(first.sent, 3);
        assert_eq!(db.get_pending_reminder("t1", "u1", monday).await.unwrap().unwrap().reminder_count, 1);

        let repeat = scheduler.trigger_reminders_on(monday, 1).await.unwrap();
        assert_eq!(repeat.sent, 0);
        assert_eq!(repeat.skipped, 3);

        let second = scheduler.trigger_reminders_on(monday, 2).await.unwrap();
        assert_eq!(second.sent, 3);
        assert_eq!(db.get_pending_reminder("t1", "u1", monday).await.unwrap().unwrap().reminder_count, 2);

        let cards = chat.sent.lock().unwrap().iter().filter_map(|(_, _, payload)| payload.as_card().map(|card| card.title.clone())).collect::<Vec<_>>();
        assert_eq!(cards.iter().filter(|title| title.starts_with("Reminder 2 of 2")).count(), 3);
    }

    #[tokio::test]
    async fn test_reminder_removes_pending_row_of_responder() {
        let (scheduler, db, chat) = setup(&[]).await;
        let monday = date(2025, 6, 2);

        db.add_pending_reminder("t1", "u1", monday).await.unwrap();
        db.save_location_record("t1", "u1", monday, LocationEntry::full_day(WorkLocation::Remote).unwrap(), 0).await.unwrap();

        let report = scheduler.trigger_reminders_on(monday, 1).await.unwrap();

        assert_eq!(report.sent, 0);
        assert!(db.get_pending_reminder("t1", "u1", monday).await.unwrap().is_none());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reminder_rejects_unknown_tier() {
        let (scheduler, _db, _chat) = setup(&[]).await;

        assert!(scheduler.trigger_reminders_on(date(2025, 6, 2), 0).await.is_err());
        assert!(scheduler.trigger_reminders_on(date(2025, 6, 2), 3).await.is_err());
    }

    #[tokio::test]
    async fn test_daily_reset_summarizes_and_clears() {
        let (scheduler, db, _chat) = setup(&[]).await;
        let monday = date(2025, 6, 2);

        scheduler.trigger_daily_prompts_on(monday).await.unwrap();
        db.save_location_record("t1", "u1", monday, LocationEntry::full_day(WorkLocation::Office).unwrap(), 0).await.unwrap();

        let report = scheduler.trigger_daily_reset_on(monday).await.unwrap();
        assert_eq!(report.summaries.len(), 2);

        let t1 = report.summaries.iter().find(|summary| summary.tenant_id == "t1").unwrap();
        assert_eq!(t1.statistics.total_users, 2);
        assert_eq!(t1.statistics.responded_users, 1);
        assert_eq!(t1.statistics.office_count, 1);
        assert_eq!(t1.cleared_reminders, 2);

        assert!(db.get_pending_reminders("t1", monday).await.unwrap().is_empty());
        assert!(db.get_pending_reminders("t2", monday).await.unwrap().is_empty());
    }
}
