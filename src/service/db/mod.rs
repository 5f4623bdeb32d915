//! Tenant-scoped storage for users, location records and pending reminders.
//!
//! The core only talks to the `GenericDbClient` trait, so the backend can be swapped;
//! the default implementation is SurrealDB.

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::base::types::{Res, WorkLocation};

pub mod surreal;

// Data types.

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub tenant_id: String,
    pub external_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One check-in response.
///
/// Records are append-only; the current location of a day is the record with the
/// latest `response_time`, with `sequence` breaking ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub record_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub response_time: DateTime<Utc>,
    pub work_location: WorkLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morning_location: Option<WorkLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afternoon_location: Option<WorkLocation>,
    pub reminder_count_at_response: u32,
    /// Save order among the user's records for the date, starting at 1.
    #[serde(default)]
    pub sequence: u64,
}

/// The location part of a new record.
///
/// Construction enforces that half-day locations exist exactly when the location is hybrid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationEntry {
    work_location: WorkLocation,
    morning: Option<WorkLocation>,
    afternoon: Option<WorkLocation>,
}

impl LocationEntry {
    /// A full-day remote or office entry.
    pub fn full_day(location: WorkLocation) -> Res<Self> {
        if location == WorkLocation::Hybrid {
            return Err(anyhow::anyhow!("A hybrid entry needs morning and afternoon locations."));
        }

        Ok(Self {
            work_location: location,
            morning: None,
            afternoon: None,
        })
    }

    /// A legacy hybrid entry with both half days set.
    pub fn hybrid(morning: WorkLocation, afternoon: WorkLocation) -> Res<Self> {
        if morning == WorkLocation::Hybrid || afternoon == WorkLocation::Hybrid {
            return Err(anyhow::anyhow!("Half-day locations must be remote or office."));
        }

        Ok(Self {
            work_location: WorkLocation::Hybrid,
            morning: Some(morning),
            afternoon: Some(afternoon),
        })
    }

    pub fn work_location(&self) -> WorkLocation {
        self.work_location
    }

    pub fn morning(&self) -> Option<WorkLocation> {
        self.morning
    }

    pub fn afternoon(&self) -> Option<WorkLocation> {
        self.afternoon
    }
}

/// A user who was prompted for a date and has not responded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReminder {
    pub tenant_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub reminder_count: u32,
    pub last_reminder_time: DateTime<Utc>,
}

/// A user together with their current location for a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMemberLocation {
    pub user: User,
    pub latest: Option<LocationRecord>,
}

/// Per-tenant counts for a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DailyStatistics {
    pub total_users: usize,
    pub responded_users: usize,
    pub remote_count: usize,
    pub office_count: usize,
    pub hybrid_count: usize,
    pub total_updates: usize,
}

// Traits.

/// Generic database client trait that clients must implement.
///
/// Every operation is scoped to a tenant, except `get_all_users(None)` which spans all
/// tenants for the scheduled triggers.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Gets the user by its external ID; or, creates a new user if it doesn't exist.
    ///
    /// Display name and email are refreshed on every call; an email of `None` keeps the stored one.
    async fn get_or_create_user(&self, tenant_id: &str, external_id: &str, display_name: &str, employee_number: Option<&str>, email: Option<&str>) -> Res<User>;

    /// Appends a location record and returns its ID.
    async fn save_location_record(&self, tenant_id: &str, user_id: &str, date: NaiveDate, entry: LocationEntry, reminder_count_at_response: u32) -> Res<String>;

    /// Gets the record with the latest response time for the date.
    async fn get_latest_location_for_user(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Option<LocationRecord>>;

    /// Gets all records for the date, oldest first.
    async fn get_location_history(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Vec<LocationRecord>>;

    /// Counts the records for the date.
    async fn get_location_count(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<usize>;

    /// Deletes all records for the date and returns how many were deleted.
    async fn clear_location(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<usize>;

    /// Adds a pending reminder with a count of zero.
    ///
    /// An existing row for the same user and date is left untouched and returned.
    async fn add_pending_reminder(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<PendingReminder>;

    /// Gets the pending reminder of one user for the date.
    async fn get_pending_reminder(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Option<PendingReminder>>;

    /// Gets every pending reminder of the tenant for the date.
    async fn get_pending_reminders(&self, tenant_id: &str, date: NaiveDate) -> Res<Vec<PendingReminder>>;

    /// Sets the reminder count and stamps the reminder time.
    ///
    /// The count never decreases: a lower value leaves the stored count in place.
    async fn update_reminder_count(&self, tenant_id: &str, user_id: &str, date: NaiveDate, reminder_count: u32) -> Res<Option<PendingReminder>>;

    /// Removes the pending reminder and returns it, if it existed.
    async fn remove_pending_reminder(&self, tenant_id: &str, user_id: &str, date: NaiveDate) -> Res<Option<PendingReminder>>;

    /// Removes every pending reminder of the tenant for the date and returns how many were removed.
    async fn clear_all_pending_reminders(&self, tenant_id: &str, date: NaiveDate) -> Res<usize>;

    /// Gets the users of a tenant, or of all tenants.
    async fn get_all_users(&self, tenant_id: Option<&str>) -> Res<Vec<User>>;

    /// Finds a user by display name (case-insensitive, exact).
    async fn find_user_by_display_name(&self, tenant_id: &str, display_name: &str) -> Res<Option<User>>;

    /// Searches users whose display name starts with or contains `term` (case-insensitive).
    ///
    /// Prefix matches are ordered before substring matches.
    async fn search_users_by_name(&self, tenant_id: &str, term: &str) -> Res<Vec<User>>;

    /// Gets every user of the tenant with their latest location for the date.
    async fn get_team_current_locations(&self, tenant_id: &str, date: NaiveDate) -> Res<Vec<TeamMemberLocation>>;

    /// Computes the tenant statistics for the date.
    async fn get_daily_statistics(&self, tenant_id: &str, date: NaiveDate) -> Res<DailyStatistics>;
}

// Structs.

/// Database client for checkin-bot.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    /// The database client instance.
    pub inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}

// Helpers shared by implementations.

/// Picks the record with the latest response time; among equal times, the last saved.
pub fn latest_record(records: impl IntoIterator<Item = LocationRecord>) -> Option<LocationRecord> {
    records.into_iter().max_by_key(|record| (record.response_time, record.sequence))
}

/// Computes statistics from a tenant's team snapshot and its total record count.
pub fn statistics_from_team(team: &[TeamMemberLocation], total_updates: usize) -> DailyStatistics {
    let mut stats = DailyStatistics {
        total_users: team.len(),
        total_updates,
        ..Default::default()
    };

    for member in team {
        let Some(latest) = &member.latest else { continue };

        stats.responded_users += 1;

        match latest.work_location {
            WorkLocation::Remote => stats.remote_count += 1,
            WorkLocation::Office => stats.office_count += 1,
            WorkLocation::Hybrid => stats.hybrid_count += 1,
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_entry_enforces_hybrid_invariant() {
        assert!(LocationEntry::full_day(WorkLocation::Hybrid).is_err());
        assert!(LocationEntry::hybrid(WorkLocation::Hybrid, WorkLocation::Office).is_err());

        let full = LocationEntry::full_day(WorkLocation::Office).unwrap();
        assert_eq!(full.morning(), None);
        assert_eq!(full.afternoon(), None);

        let hybrid = LocationEntry::hybrid(WorkLocation::Office, WorkLocation::Remote).unwrap();
        assert_eq!(hybrid.work_location(), WorkLocation::Hybrid);
        assert_eq!(hybrid.morning(), Some(WorkLocation::Office));
        assert_eq!(hybrid.afternoon(), Some(WorkLocation::Remote));
    }

    #[test]
    fn test_latest_record_breaks_time_ties_by_sequence() {
        let at = Utc::now();
        let record = |record_id: &str, work_location, sequence| LocationRecord {
            record_id: record_id.to_string(),
            tenant_id: "T1".to_string(),
            user_id: "U1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            response_time: at,
            work_location,
            morning_location: None,
            afternoon_location: None,
            reminder_count_at_response: 0,
            sequence,
        };

        // Record ids sort the other way round.
        let first = record("zzz", WorkLocation::Office, 1);
        let second = record("aaa", WorkLocation::Remote, 2);

        assert_eq!(latest_record([first.clone(), second.clone()]).unwrap().record_id, "aaa");
        assert_eq!(latest_record([second, first]).unwrap().record_id, "aaa");
    }
}
