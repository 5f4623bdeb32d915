//! Cron-driven execution of the scheduler triggers.

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::{error, info, instrument};

use crate::base::{config::Config, types::Res};

use super::reminder::ReminderScheduler;

/// How often the loop checks for due triggers.
const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Parses a 5-field cron expression (minute hour day month weekday).
pub fn parse_cron(expr: &str) -> Res<Schedule> {
    // The cron crate wants a leading seconds field.
    let full = format!("0 {}", expr.trim());

    Schedule::from_str(&full).map_err(|err| anyhow::anyhow!("Invalid cron expression `{expr}`: {err}"))
}

/// A scheduled trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    DailyPrompt,
    Reminder(u32),
    DailyReset,
}

struct Entry {
    trigger: Trigger,
    schedule: Schedule,
    next: Option<DateTime<Tz>>,
}

/// Fires each configured trigger once per scheduled instant, in the configured timezone.
///
/// Instants missed while the process was down are not replayed.
pub struct ScheduleRunner {
    scheduler: ReminderScheduler,
    timezone: Tz,
    entries: Vec<Entry>,
}

impl ScheduleRunner {
    pub fn new(config: &Config, scheduler: ReminderScheduler) -> Res<Self> {
        Self::starting_at(config, scheduler, Utc::now())
    }

    pub fn starting_at(config: &Config, scheduler: ReminderScheduler, now: DateTime<Utc>) -> Res<Self> {
        let timezone = config.timezone;
        let local = now.with_timezone(&timezone);

        let entries = [
            (Trigger::DailyPrompt, &config.schedule_daily_prompt),
            (Trigger::Reminder(1), &config.schedule_first_reminder),
            (Trigger::Reminder(2), &config.schedule_second_reminder),
            (Trigger::DailyReset, &config.schedule_daily_reset),
        ]
        .into_iter()
        .map(|(trigger, expr)| {
            let schedule = parse_cron(expr)?;
            let next = schedule.after(&local).next();

            Ok(Entry { trigger, schedule, next })
        })
        .collect::<Res<Vec<_>>>()?;

        Ok(Self { scheduler, timezone, entries })
    }

    /// Returns the triggers due at `now` and advances them past it.
    pub fn due_at(&mut self, now: DateTime<Utc>) -> Vec<Trigger> {
        let local = now.with_timezone(&self.timezone);
        let mut due = Vec::new();

        for entry in &mut self.entries {
            if entry.next.is_some_and(|next| next <= local) {
                due.push(entry.trigger);
                entry.next = entry.schedule.after(&local).next();
            }
        }

        due
    }

    /// The next instant each trigger fires at.
    pub fn upcoming(&self) -> Vec<(Trigger, Option<DateTime<Tz>>)> {
        self.entries.iter().map(|entry| (entry.trigger, entry.next)).collect()
    }

    #[instrument(skip(self))]
    async fn fire(&self, trigger: Trigger) {
        info!("Running scheduled trigger.");

        let result = match trigger {
            Trigger::DailyPrompt => self.scheduler.trigger_daily_prompts().await.map(|report| format!("{report:?}")),
            Trigger::Reminder(tier) => self.scheduler.trigger_reminders(tier).await.map(|report| format!("{report:?}")),
            Trigger::DailyReset => self.scheduler.trigger_daily_reset().await.map(|report| format!("{} tenants summarized", report.summaries.len())),
        };

        match result {
            Ok(summary) => info!("Scheduled trigger finished: {summary}"),
            Err(err) => error!("Scheduled trigger failed: {:#}", err),
        }
    }

    /// Runs forever.
    pub async fn run(mut self) {
        for (trigger, next) in self.upcoming() {
            info!("{trigger:?} next fires at {next:?}.");
        }

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            for trigger in self.due_at(Utc::now()) {
                self.fire(trigger).await;
            }
        }
    }
}
