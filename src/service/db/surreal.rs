//! SurrealDB implementation for checkin-bot data storage.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::base::{config::Config, types::Res};

use super::{DailyStatistics, DbClient, GenericDbClient, LocationEntry, LocationRecord, PendingReminder, TeamMemberLocation, User, latest_record, statistics_from_team};

// Tables.

const USER_TABLE: &str = "checkin_user";
const LOCATION_TABLE: &str = "location_record";
const PENDING_TABLE: &str = "pending_reminder";

/// Schema applied on every connect.
const SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS checkin_user SCHEMALESS;
DEFINE INDEX IF NOT EXISTS checkin_user_tenant ON checkin_user FIELDS tenant_id;
DEFINE TABLE IF NOT EXISTS location_record SCHEMALESS;
DEFINE INDEX IF NOT EXISTS location_record_lookup ON location_record FIELDS tenant_id, date, user_id;
DEFINE TABLE IF NOT EXISTS pending_reminder SCHEMALESS;
DEFINE INDEX IF NOT EXISTS pending_reminder_lookup ON pending_reminder FIELDS tenant_id, date;
"#;

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Connects to the configured SurrealDB endpoint.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::connect(&config.db_endpoint, &config.db_username, &config.db_password, &config.db_namespace, &config.db_database).await?;
        Ok(Self { inner: Arc::new(client) })
    }

    /// Creates a fresh in-memory database, for tests and local runs.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealDbClient::connect("mem://", "", "", "checkin", "bot").await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

/// SurrealDB client implementation.
#[derive(Clone)]
pub struct SurrealDbClient {
    db: Surreal<Any>,
}

impl SurrealDbClient {
    #[instrument(name = "SurrealDbClient::connect", skip(username, password))]
    pub async fn connect(endpoint: &str, username: &str, password: &str, namespace: &str, database: &str) -> Res<Self> {
        let db = any::connect(endpoint).await?;

        if !username.is_empty() {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(namespace).use_db(database).await?;
        db.query(SCHEMA).await?.check()?;

        info!("Database initialized successfully.");

        Ok(Self { db })
    }

    /// Runs a `SELECT`/`DELETE` filtered by tenant and date, and optionally by user.
    async fn scoped_query<T>(&self, statement: &str, tenant_id: &str, user_id: Option<&str>, date: NaiveDate) -> Res<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut response = self
            .db
            .query(statement)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.unwrap_or_default().to_string()))
            .bind(("date", date))
            .await?;

        Ok(response.take(0)?)
    }

    async fn user_records(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Vec<LocationRecord>> {
        let mut records: Vec<LocationRecord> = self
            .scoped_query(
                "SELECT * FROM location_record WHERE tenant_id = $tenant_id AND user_id = $user_id AND date = $date",
                tenant_id,
                Some(user_id),
                date,
            )
            .await?;

        records.sort_by_key(|record| (record.response_time, record.sequence));

        Ok(records)
    }

    async fn tenant_records(&self, tenant_id: &str, date: NaiveDate) -> Res<Vec<LocationRecord>> {
        self.scoped_query("SELECT * FROM location_record WHERE tenant_id = $tenant_id AND date = $date", tenant_id, None, date).await
    }
}

fn user_key(tenant_id: &str, external_id: &str) -> String {
    format!("{tenant_id}/{external_id}")
}

fn pending_key(tenant_id: &str, user_id: &str, date: NaiveDate) -> String {
    format!("{tenant_id}/{user_id}/{date}")
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip(self, display_name, employee_number, email))]
    async fn get_or_create_user(&self, tenant_id: &str, external_id: &str, display_name: &str, employee_number: Option<&str>, email: Option<&str>) -> Res<User> {
        let key = user_key(tenant_id, external_id);
        let existing: Option<User> = self.db.select((USER_TABLE, key.as_str())).await?;

        if let Some(mut user) = existing {
            let before = user.clone();

            user.display_name = display_name.to_string();
            if let Some(email) = email {
                user.email = Some(email.to_string());
            }
            if let Some(employee_number) = employee_number {
                user.employee_number = Some(employee_number.to_string());
            }

            if user != before {
                debug!("Refreshing user `{}`.", external_id);
                let _: Option<User> = self.db.update((USER_TABLE, key.as_str())).content(user.clone()).await?;
            }

            return Ok(user);
        }

        info!("User `{}` not found, creating a new one.", external_id);

        let user = User {
            tenant_id: tenant_id.to_string(),
            external_id: external_id.to_string(),
            display_name: display_name.to_string(),
            employee_number: employee_number.map(str::to_string),
            email: email.map(str::to_string),
        };

        match self.db.create((USER_TABLE, key.as_str())).content(user.clone()).await {
            Ok(created) => Ok(created.unwrap_or(user)),
            Err(err) => {
                // Lost a race with a concurrent first contact.
                warn!("Creating user `{}` failed, re-reading: {}", external_id, err);
                let existing: Option<User> = self.db.select((USER_TABLE, key.as_str())).await?;
                existing.ok_or_else(|| anyhow::anyhow!("Failed to create user `{external_id}`: {err}"))
            }
        }
    }

    #[instrument(skip(self, entry))]
    async fn save_location_record(&self, tenant_id: &str, user_id: &str, date: NaiveDate, entry: LocationEntry, reminder_count_at_response: u32) -> Res<String> {
        let previous = self.user_records(tenant_id, user_id, date).await?;
        let sequence = previous.iter().map(|record| record.sequence).max().map_or(1, |last| last + 1);
        // Never earlier than the record it supersedes, even if the clock stepped back.
        let response_time = previous.last().map_or_else(Utc::now, |last| last.response_time.max(Utc::now()));

        let record = LocationRecord {
            record_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            date,
            response_time,
            work_location: entry.work_location(),
            morning_location: entry.morning(),
            afternoon_location: entry.afternoon(),
            reminder_count_at_response,
            sequence,
        };
        let record_id = record.record_id.clone();

        let _: Option<LocationRecord> = self.db.create((LOCATION_TABLE, record_id.as_str())).content(record).await?;

        Ok(record_id)
    }

    async fn get_latest_location_for_user(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Option<LocationRecord>> {
        Ok(latest_record(self.user_records(tenant_id, user_id, date).await?))
    }

    async fn get_location_history(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Vec<LocationRecord>> {
        self.user_records(tenant_id, user_id, date).await
    }

    async fn get_location_count(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<usize> {
        Ok(self.user_records(tenant_id, user_id, date).await?.len())
    }

    #[instrument(skip(self))]
    async fn clear_location(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<usize> {
        let deleted: Vec<LocationRecord> = self
            .scoped_query(
                "DELETE location_record WHERE tenant_id = $tenant_id AND user_id = $user_id AND date = $date RETURN BEFORE",
                tenant_id,
                Some(user_id),
                date,
            )
            .await?;

        Ok(deleted.len())
    }

    #[instrument(skip(self))]
    async fn add_pending_reminder(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<PendingReminder> {
        let key = pending_key(tenant_id, user_id, date);

        if let Some(existing) = self.get_pending_reminder(tenant_id, user_id, date).await? {
            return Ok(existing);
        }

        let pending = PendingReminder {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            date,
            reminder_count: 0,
            last_reminder_time: Utc::now(),
        };

        let created: Option<PendingReminder> = self.db.create((PENDING_TABLE, key.as_str())).content(pending.clone()).await?;

        Ok(created.unwrap_or(pending))
    }

    async fn get_pending_reminder(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Option<PendingReminder>> {
        let key = pending_key(tenant_id, user_id, date);
        let pending: Option<PendingReminder> = self.db.select((PENDING_TABLE, key.as_str())).await?;

        Ok(pending)
    }

    async fn get_pending_reminders(&self, tenant_id: &str, date: NaiveDate) -> Res<Vec<PendingReminder>> {
        let mut pending: Vec<PendingReminder> = self.scoped_query("SELECT * FROM pending_reminder WHERE tenant_id = $tenant_id AND date = $date", tenant_id, None, date).await?;

        pending.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        Ok(pending)
    }

    #[instrument(skip(self))]
    async fn update_reminder_count(&self, tenant_id: &str, user_id: &str, date: NaiveDate, reminder_count: u32) -> Res<Option<PendingReminder>> {
        let key = pending_key(tenant_id, user_id, date);

        let Some(mut pending) = self.get_pending_reminder(tenant_id, user_id, date).await? else {
            return Ok(None);
        };

        pending.reminder_count = pending.reminder_count.max(reminder_count);
        pending.last_reminder_time = Utc::now();

        let _: Option<PendingReminder> = self.db.update((PENDING_TABLE, key.as_str())).content(pending.clone()).await?;

        Ok(Some(pending))
    }

    #[instrument(skip(self))]
    async fn remove_pending_reminder(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Option<PendingReminder>> {
        let key = pending_key(tenant_id, user_id, date);
        let removed: Option<PendingReminder> = self.db.delete((PENDING_TABLE, key.as_str())).await?;

        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear_all_pending_reminders(&self, tenant_id: &str, date: NaiveDate) -> Res<usize> {
        let removed: Vec<PendingReminder> = self
            .scoped_query("DELETE pending_reminder WHERE tenant_id = $tenant_id AND date = $date RETURN BEFORE", tenant_id, None, date)
            .await?;

        Ok(removed.len())
    }

    async fn get_all_users(&self, tenant_id: Option<&str>) -> Res<Vec<User>> {
        let mut users: Vec<User> = match tenant_id {
            Some(tenant_id) => {
                let mut response = self.db.query("SELECT * FROM checkin_user WHERE tenant_id = $tenant_id").bind(("tenant_id", tenant_id.to_string())).await?;
                response.take(0)?
            }
            None => self.db.select(USER_TABLE).await?,
        };

        users.sort_by(|a, b| (&a.tenant_id, a.display_name.to_lowercase()).cmp(&(&b.tenant_id, b.display_name.to_lowercase())));

        Ok(users)
    }

    async fn find_user_by_display_name(&self, tenant_id: &str, display_name: &str) -> Res<Option<User>> {
        let needle = display_name.trim().to_lowercase();
        let users = self.get_all_users(Some(tenant_id)).await?;

        Ok(users.into_iter().find(|user| user.display_name.to_lowercase() == needle))
    }

    async fn search_users_by_name(&self, tenant_id: &str, term: &str) -> Res<Vec<User>> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let users = self.get_all_users(Some(tenant_id)).await?;
        let (prefix, substring): (Vec<User>, Vec<User>) = users
            .into_iter()
            .filter(|user| user.display_name.to_lowercase().contains(&needle))
            .partition(|user| user.display_name.to_lowercase().starts_with(&needle));

        Ok(prefix.into_iter().chain(substring).collect())
    }

    async fn get_team_current_locations(&self, tenant_id: &str, date: NaiveDate) -> Res<Vec<TeamMemberLocation>> {
        let users = self.get_all_users(Some(tenant_id)).await?;

        let mut by_user: HashMap<String, Vec<LocationRecord>> = HashMap::new();
        for record in self.tenant_records(tenant_id, date).await? {
            by_user.entry(record.user_id.clone()).or_default().push(record);
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let latest = by_user.remove(&user.external_id).and_then(latest_record);
                TeamMemberLocation { user, latest }
            })
            .collect())
    }

    async fn get_daily_statistics(&self, tenant_id: &str, date: NaiveDate) -> Res<DailyStatistics> {
        let team = self.get_team_current_locations(tenant_id, date).await?;
        let total_updates = self.tenant_records(tenant_id, date).await?.len();

        Ok(statistics_from_team(&team, total_updates))
    }
}

// Tests.
