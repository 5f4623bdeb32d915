//! Location writes triggered by messages, cards and confirmations.

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::{
    base::types::{Res, WorkLocation},
    service::{
        db::{DbClient, LocationEntry, User},
        directory::DirectoryClient,
    },
};

/// What a location write did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationOutcome {
    pub record_id: String,
    pub entry: LocationEntry,
    /// Whether the user had already responded for the date.
    pub is_update: bool,
    pub reminder_count: u32,
}

/// Builds the entry for a hybrid answer; identical half days collapse to a full day.
pub fn hybrid_entry(morning: WorkLocation, afternoon: WorkLocation) -> Res<LocationEntry> {
    if morning == afternoon {
        LocationEntry::full_day(morning)
    } else {
        LocationEntry::hybrid(morning, afternoon)
    }
}

/// Records a location for the date.
///
/// The pending reminder is removed first and its count is stored with the record; later
/// updates on the same day carry the count of the earlier record.
#[instrument(skip(db, directory, user), fields(tenant = %user.tenant_id, user = %user.external_id))]
pub async fn set_location(db: &DbClient, directory: Option<&DirectoryClient>, user: &User, date: NaiveDate, entry: LocationEntry) -> Res<LocationOutcome> {
    let previous = db.get_latest_location_for_user(&user.tenant_id, &user.external_id, date).await?;
    let pending = db.remove_pending_reminder(&user.tenant_id, &user.external_id, date).await?;

    let reminder_count = pending
        .map(|pending| pending.reminder_count)
        .or_else(|| previous.as_ref().map(|record| record.reminder_count_at_response))
        .unwrap_or(0);

    let record_id = db.save_location_record(&user.tenant_id, &user.external_id, date, entry, reminder_count).await?;

    info!("Recorded {} for {date}.", entry.work_location());

    if let (Some(directory), Some(email)) = (directory, user.email.as_deref()) {
        directory.sync_in_background(email, entry.work_location());
    }

    Ok(LocationOutcome {
        record_id,
        entry,
        is_update: previous.is_some(),
        reminder_count,
    })
}

/// Deletes the user's records and pending reminder for the date.
#[instrument(skip(db, user), fields(tenant = %user.tenant_id, user = %user.external_id))]
pub async fn clear_location(db: &DbClient, user: &User, date: NaiveDate) -> Res<usize> {
    db.remove_pending_reminder(&user.tenant_id, &user.external_id, date).await?;
    let cleared = db.clear_location(&user.tenant_id, &user.external_id, date).await?;

    info!("Cleared {cleared} records for {date}.");

    Ok(cleared)
}

/// The confirmation text for a recorded location.
pub fn describe_outcome(outcome: &LocationOutcome, date: NaiveDate) -> String {
    let entry = &outcome.entry;
    let location = match (entry.morning(), entry.afternoon()) {
        (Some(morning), Some(afternoon)) => format!(
            "{} **Hybrid** (morning {} {}, afternoon {} {})",
            WorkLocation::Hybrid.emoji(),
            morning.emoji(),
            morning,
            afternoon.emoji(),
            afternoon
        ),
        _ => format!("{} **{}**", entry.work_location().emoji(), entry.work_location()),
    };

    let day = date.format("%A %-d %B");

    if outcome.is_update {
        format!("Updated: you're now {location} for {day}.")
    } else {
        format!("Thanks! You're {location} for {day}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hybrid_entry_collapses_same_half_days() {
        let entry = hybrid_entry(WorkLocation::Office, WorkLocation::Office).unwrap();
        assert_eq!(entry.work_location(), WorkLocation::Office);
        assert_eq!(entry.morning(), None);

        let entry = hybrid_entry(WorkLocation::Office, WorkLocation::Remote).unwrap();
        assert_eq!(entry.work_location(), WorkLocation::Hybrid);
    }

    #[test]
    fn test_describe_outcome() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut outcome = LocationOutcome {
            record_id: "r1".to_string(),
            entry: LocationEntry::full_day(WorkLocation::Office).unwrap(),
            is_update: false,
            reminder_count: 0,
        };

        assert_eq!(describe_outcome(&outcome, date), "Thanks! You're 🏢 **Office** for Monday 2 June.");

        outcome.is_update = true;
        outcome.entry = LocationEntry::hybrid(WorkLocation::Office, WorkLocation::Remote).unwrap();
        let text = describe_outcome(&outcome, date);
        assert!(text.starts_with("Updated:"));
        assert!(text.contains("morning 🏢 Office"));
        assert!(text.contains("afternoon 🏠 Remote"));
    }

    #[tokio::test]
    async fn test_second_save_of_the_day_is_an_update() {
        let db = DbClient::surreal_memory().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let user = db.get_or_create_user("T1", "U1", "Ada", None, None).await.unwrap();

        let first = set_location(&db, None, &user, date, LocationEntry::full_day(WorkLocation::Office).unwrap()).await.unwrap();
        assert!(!first.is_update);
        assert!(describe_outcome(&first, date).starts_with("Thanks!"));

        let second = set_location(&db, None, &user, date, LocationEntry::full_day(WorkLocation::Remote).unwrap()).await.unwrap();
        assert!(second.is_update);
        assert!(describe_outcome(&second, date).starts_with("Updated:"));

        assert_ne!(first.record_id, second.record_id);
        assert_eq!(db.get_location_count("T1", "U1", date).await.unwrap(), 2);

        let latest = db.get_latest_location_for_user("T1", "U1", date).await.unwrap().unwrap();
        assert_eq!(latest.record_id, second.record_id);
        assert_eq!(latest.work_location, WorkLocation::Remote);
    }
}
