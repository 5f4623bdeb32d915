//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, path::PathBuf, sync::Arc, time::Duration};

use chrono_tz::Tz;
use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};

use crate::{base::prompts, schedule::runner::parse_cron};

use super::types::Res;

/// Default address the HTTP listener binds to.
fn default_listen_address() -> String {
    "0.0.0.0:3978".to_string()
}

/// Default Bot Framework token tenant.
fn default_bot_app_tenant_id() -> String {
    "botframework.com".to_string()
}

/// Default database endpoint (in-memory).
fn default_db_endpoint() -> String {
    "mem://".to_string()
}

/// Default database namespace.
fn default_db_namespace() -> String {
    "checkin".to_string()
}

/// Default database name.
fn default_db_database() -> String {
    "bot".to_string()
}

/// Default OpenAI classifier model to use
fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

/// Default sampling temperature for the classifier
fn default_openai_temperature() -> f32 {
    0.0
}

/// Default timeout for a single classifier call.
fn default_openai_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Default minimum confidence for accepting an AI classification.
fn default_ai_confidence_threshold() -> f64 {
    0.4
}

/// Default system directive for the classifier agent.
fn default_classifier_system_directive() -> String {
    prompts::CLASSIFIER_SYSTEM_DIRECTIVE.to_string()
}

/// Default timezone that decides what "today" means.
fn default_timezone() -> Tz {
    chrono_tz::Australia::Brisbane
}

/// Default holiday region code.
fn default_holiday_region() -> String {
    "AU-QLD".to_string()
}

/// Default fixed-date holidays for the default region.
fn default_fixed_holidays() -> Vec<FixedHoliday> {
    vec![
        FixedHoliday::new(1, 1, "New Year's Day"),
        FixedHoliday::new(1, 26, "Australia Day"),
        FixedHoliday::new(4, 25, "Anzac Day"),
        FixedHoliday::new(12, 25, "Christmas Day"),
        FixedHoliday::new(12, 26, "Boxing Day"),
    ]
}

/// Default "first Monday of the month" holidays for the default region.
fn default_first_monday_holidays() -> Vec<FirstMondayHoliday> {
    vec![FirstMondayHoliday::new(5, "Labour Day"), FirstMondayHoliday::new(10, "King's Birthday")]
}

/// Default timeout for the external holiday source.
fn default_holiday_api_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_schedule_daily_prompt() -> String {
    "0 9 * * *".to_string()
}

fn default_schedule_first_reminder() -> String {
    "0 11 * * *".to_string()
}

fn default_schedule_second_reminder() -> String {
    "0 14 * * *".to_string()
}

fn default_schedule_daily_reset() -> String {
    "30 17 * * *".to_string()
}

/// Default window for suppressing re-delivered messages.
fn default_dedup_window() -> Duration {
    Duration::from_secs(30)
}

/// Default lifetime of an unanswered confirmation.
fn default_confirmation_ttl() -> Duration {
    Duration::from_secs(3600)
}

/// Default directory profile field mirrored from the recorded location.
fn default_graph_profile_field() -> String {
    "officeLocation".to_string()
}

/// A holiday on the same calendar date every year.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FixedHoliday {
    /// Month, 1 to 12.
    pub month: u32,
    /// Day of the month.
    pub day: u32,
    /// Name shown to users.
    pub name: String,
}

impl FixedHoliday {
    /// Creates a fixed-date holiday.
    pub fn new(month: u32, day: u32, name: &str) -> Self {
        Self { month, day, name: name.to_string() }
    }
}

/// A holiday on the first Monday of a month.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FirstMondayHoliday {
    /// Month, 1 to 12.
    pub month: u32,
    /// Name shown to users.
    pub name: String,
}

impl FirstMondayHoliday {
    /// Creates a first-Monday holiday.
    pub fn new(month: u32, name: &str) -> Self {
        Self { month, name: name.to_string() }
    }
}

/// Configuration for the checkin-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The shared configuration values.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

/// Configuration values, read from `CHECKIN_BOT_*` environment variables and an optional TOML file.
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Bot Framework application ID (`BOT_APP_ID`).
    #[serde(default)]
    pub bot_app_id: String,
    /// Bot Framework application password (`BOT_APP_PASSWORD`).
    #[serde(default)]
    pub bot_app_password: String,
    /// Tenant used to acquire Bot Framework tokens (`BOT_APP_TENANT_ID`).
    #[serde(default = "default_bot_app_tenant_id")]
    pub bot_app_tenant_id: String,
    /// Address of the HTTP listener (`LISTEN_ADDRESS`).
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Bearer token guarding the admin routes; the routes are disabled when unset (`ADMIN_TOKEN`).
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Database endpoint URL, e.g. `mem://` or `ws://localhost:8000` (`DB_ENDPOINT`).
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`).
    #[serde(default)]
    pub db_username: String,
    /// Database password (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: String,
    /// Database namespace (`DB_NAMESPACE`).
    #[serde(default = "default_db_namespace")]
    pub db_namespace: String,
    /// Database name (`DB_DATABASE`).
    #[serde(default = "default_db_database")]
    pub db_database: String,

    /// OpenAI API key; the AI classifier is disabled when unset (`OPENAI_API_KEY`).
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// OpenAI classifier model to use (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Sampling temperature to use for the classifier (`OPENAI_TEMPERATURE`).
    /// Value between 0 and 2.
    #[serde(default = "default_openai_temperature")]
    pub openai_temperature: f32,
    /// Timeout, in seconds, for a single classifier call (`OPENAI_TIMEOUT`).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_openai_timeout")]
    pub openai_timeout: Duration,
    /// Minimum confidence an AI classification needs to be accepted (`AI_CONFIDENCE_THRESHOLD`).
    #[serde(default = "default_ai_confidence_threshold")]
    pub ai_confidence_threshold: f64,
    /// Optional custom classifier directive to override the default (`CLASSIFIER_SYSTEM_DIRECTIVE`).
    #[serde(default = "default_classifier_system_directive")]
    pub classifier_system_directive: String,

    /// Timezone that decides the calendar day, e.g. `Australia/Brisbane` (`TIMEZONE`).
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// Holiday region, `<country>` or `<country>-<subdivision>` (`HOLIDAY_REGION`).
    #[serde(default = "default_holiday_region")]
    pub holiday_region: String,
    /// Fixed-date holidays of the region.
    #[serde(default = "default_fixed_holidays")]
    pub holiday_fixed_dates: Vec<FixedHoliday>,
    /// First-Monday-of-month holidays of the region.
    #[serde(default = "default_first_monday_holidays")]
    pub holiday_first_mondays: Vec<FirstMondayHoliday>,
    /// Base URL of a Nager.Date compatible holiday API; computed holidays are used when unset (`HOLIDAY_API_URL`).
    #[serde(default)]
    pub holiday_api_url: Option<String>,
    /// Timeout, in seconds, for the holiday API (`HOLIDAY_API_TIMEOUT`).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_holiday_api_timeout")]
    pub holiday_api_timeout: Duration,

    /// Path to a JSON alias file (`{"wfh": "remote", ...}`) (`ALIAS_FILE`).
    #[serde(default)]
    pub alias_file: Option<PathBuf>,

    /// Cron expression (5 fields, local time) for the daily prompt (`SCHEDULE_DAILY_PROMPT`).
    #[serde(default = "default_schedule_daily_prompt")]
    pub schedule_daily_prompt: String,
    /// Cron expression for the first reminder (`SCHEDULE_FIRST_REMINDER`).
    #[serde(default = "default_schedule_first_reminder")]
    pub schedule_first_reminder: String,
    /// Cron expression for the second reminder (`SCHEDULE_SECOND_REMINDER`).
    #[serde(default = "default_schedule_second_reminder")]
    pub schedule_second_reminder: String,
    /// Cron expression for the daily reset (`SCHEDULE_DAILY_RESET`).
    #[serde(default = "default_schedule_daily_reset")]
    pub schedule_daily_reset: String,

    /// Window, in seconds, in which an identical message from the same user is ignored (`DEDUP_WINDOW`).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_dedup_window")]
    pub dedup_window: Duration,
    /// Lifetime, in seconds, of an unanswered confirmation (`CONFIRMATION_TTL`).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_confirmation_ttl")]
    pub confirmation_ttl: Duration,

    /// Directory tenant for profile sync; sync is disabled unless all three graph settings are set (`GRAPH_TENANT_ID`).
    #[serde(default)]
    pub graph_tenant_id: Option<String>,
    /// Directory client ID (`GRAPH_CLIENT_ID`).
    #[serde(default)]
    pub graph_client_id: Option<String>,
    /// Directory client secret (`GRAPH_CLIENT_SECRET`).
    #[serde(default)]
    pub graph_client_secret: Option<String>,
    /// Profile field that mirrors the recorded location (`GRAPH_PROFILE_FIELD`).
    #[serde(default = "default_graph_profile_field")]
    pub graph_profile_field: String,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            bot_app_id: String::new(),
            bot_app_password: String::new(),
            bot_app_tenant_id: default_bot_app_tenant_id(),
            listen_address: default_listen_address(),
            admin_token: None,
            db_endpoint: default_db_endpoint(),
            db_username: String::new(),
            db_password: String::new(),
            db_namespace: default_db_namespace(),
            db_database: default_db_database(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_temperature: default_openai_temperature(),
            openai_timeout: default_openai_timeout(),
            ai_confidence_threshold: default_ai_confidence_threshold(),
            classifier_system_directive: default_classifier_system_directive(),
            timezone: default_timezone(),
            holiday_region: default_holiday_region(),
            holiday_fixed_dates: default_fixed_holidays(),
            holiday_first_mondays: default_first_monday_holidays(),
            holiday_api_url: None,
            holiday_api_timeout: default_holiday_api_timeout(),
            alias_file: None,
            schedule_daily_prompt: default_schedule_daily_prompt(),
            schedule_first_reminder: default_schedule_first_reminder(),
            schedule_second_reminder: default_schedule_second_reminder(),
            schedule_daily_reset: default_schedule_daily_reset(),
            dedup_window: default_dedup_window(),
            confirmation_ttl: default_confirmation_ttl(),
            graph_tenant_id: None,
            graph_client_id: None,
            graph_client_secret: None,
            graph_profile_field: default_graph_profile_field(),
        }
    }
}

impl Config {
    /// Loads the configuration from the environment and either `explicit_path` or
    /// `.hidden/config.toml`, then validates it.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("CHECKIN_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Checks value ranges and expressions that serde cannot check on its own.
    pub fn validate(&self) -> Res<()> {
        if self.openai_temperature < 0.0 || self.openai_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI temperature must be between 0 and 2."));
        }

        if !(0.0..=1.0).contains(&self.ai_confidence_threshold) {
            return Err(anyhow::anyhow!("AI confidence threshold must be between 0 and 1."));
        }

        if self.openai_timeout.is_zero() {
            return Err(anyhow::anyhow!("OpenAI timeout must be greater than zero."));
        }

        if self.dedup_window.is_zero() || self.confirmation_ttl.is_zero() {
            return Err(anyhow::anyhow!("Deduplication window and confirmation TTL must be greater than zero."));
        }

        for holiday in &self.holiday_fixed_dates {
            if chrono::NaiveDate::from_ymd_opt(2024, holiday.month, holiday.day).is_none() {
                return Err(anyhow::anyhow!("Invalid fixed holiday date for `{}`.", holiday.name));
            }
        }

        for holiday in &self.holiday_first_mondays {
            if !(1..=12).contains(&holiday.month) {
                return Err(anyhow::anyhow!("Invalid month for first-Monday holiday `{}`.", holiday.name));
            }
        }

        for expr in [&self.schedule_daily_prompt, &self.schedule_first_reminder, &self.schedule_second_reminder, &self.schedule_daily_reset] {
            parse_cron(expr)?;
        }

        Ok(())
    }

    /// Whether the AI classifier has what it needs.
    pub fn ai_enabled(&self) -> bool {
        self.openai_api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// Whether directory sync has what it needs.
    pub fn directory_sync_enabled(&self) -> bool {
        [&self.graph_tenant_id, &self.graph_client_id, &self.graph_client_secret]
            .iter()
            .all(|value| value.as_deref().is_some_and(|v| !v.is_empty()))
    }
}
