//! Read-only replies: status, history, team, person, statistics and holidays.

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::{
    base::types::{Res, WorkLocation},
    schedule::calendar::WorkingDayService,
    service::db::{DbClient, LocationRecord, TeamMemberLocation, User},
};

/// Number of holidays listed by the holidays query.
const UPCOMING_HOLIDAY_LIMIT: usize = 5;

/// Number of names listed when a person query is ambiguous.
const AMBIGUOUS_NAME_LIMIT: usize = 5;

fn describe_record(record: &LocationRecord) -> String {
    match (record.morning_location, record.afternoon_location) {
        (Some(morning), Some(afternoon)) => format!("{} Hybrid (morning {morning}, afternoon {afternoon})", WorkLocation::Hybrid.emoji()),
        _ => format!("{} {}", record.work_location.emoji(), record.work_location),
    }
}

fn local_time(record: &LocationRecord, timezone: Tz) -> String {
    record.response_time.with_timezone(&timezone).format("%H:%M").to_string()
}

/// The user's own location for the date.
pub async fn status(db: &DbClient, calendar: &WorkingDayService, user: &User, date: NaiveDate) -> Res<String> {
    let latest = db.get_latest_location_for_user(&user.tenant_id, &user.external_id, date).await?;

    let text = match latest {
        Some(record) => format!(
            "Today you're **{}** (recorded at {}).",
            describe_record(&record),
            local_time(&record, calendar.timezone())
        ),
        None if !calendar.is_working_day(date).await => "It's not a working day, so there's nothing to record today.".to_string(),
        None => "You haven't recorded a location today. Say **office** or **remote**, or type **checkin** for the card.".to_string(),
    };

    Ok(text)
}

/// Every update the user made on the date.
pub async fn history(db: &DbClient, calendar: &WorkingDayService, user: &User, date: NaiveDate) -> Res<String> {
    let records = db.get_location_history(&user.tenant_id, &user.external_id, date).await?;

    if records.is_empty() {
        return Ok("No updates recorded today.".to_string());
    }

    let lines = records
        .iter()
        .enumerate()
        .map(|(index, record)| format!("{}. {} {}", index + 1, local_time(record, calendar.timezone()), describe_record(record)))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!("Your updates for {}:\n\n{lines}", date.format("%A %-d %B")))
}

fn team_summary(team: &[TeamMemberLocation]) -> String {
    let mut groups: Vec<(String, Vec<&str>)> = Vec::new();

    for (title, location) in [("Office", Some(WorkLocation::Office)), ("Remote", Some(WorkLocation::Remote)), ("Hybrid", Some(WorkLocation::Hybrid)), ("No response", None)] {
        let mut names = team
            .iter()
            .filter(|member| member.latest.as_ref().map(|record| record.work_location) == location)
            .map(|member| member.user.display_name.as_str())
            .collect::<Vec<_>>();

        if names.is_empty() {
            continue;
        }

        names.sort_unstable();

        let emoji = location.map(|l| l.emoji()).unwrap_or("❔");
        groups.push((format!("{emoji} **{title}** ({})", names.len()), names));
    }

    groups.into_iter().map(|(heading, names)| format!("{heading}: {}", names.join(", "))).collect::<Vec<_>>().join("\n")
}

/// Where everyone in the tenant is on the date.
pub async fn team(db: &DbClient, tenant_id: &str, date: NaiveDate) -> Res<String> {
    let team = db.get_team_current_locations(tenant_id, date).await?;

    if team.is_empty() {
        return Ok("Nobody has checked in with me yet.".to_string());
    }

    Ok(format!("Team locations for {}:\n\n{}", date.format("%A %-d %B"), team_summary(&team)))
}

/// Where one named colleague is on the date.
///
/// An unknown name is answered with a friendly "not found", never an error.
pub async fn person(db: &DbClient, tenant_id: &str, name: &str, date: NaiveDate) -> Res<String> {
    let user = match db.find_user_by_display_name(tenant_id, name).await? {
        Some(user) => user,
        None => {
            let mut matches = db.search_users_by_name(tenant_id, name).await?;

            match matches.len() {
                0 => return Ok(format!("I couldn't find anyone called **{name}**.")),
                1 => matches.remove(0),
                _ => {
                    let names = matches.iter().take(AMBIGUOUS_NAME_LIMIT).map(|user| user.display_name.as_str()).collect::<Vec<_>>();
                    return Ok(format!("I found several people matching **{name}**: {}. Which one did you mean?", names.join(", ")));
                }
            }
        }
    };

    let latest = db.get_latest_location_for_user(tenant_id, &user.external_id, date).await?;

    let text = match latest {
        Some(record) => format!("**{}** is {} today.", user.display_name, describe_record(&record)),
        None => format!("**{}** hasn't recorded a location today.", user.display_name),
    };

    Ok(text)
}

/// The tenant statistics for the date.
pub async fn stats(db: &DbClient, tenant_id: &str, date: NaiveDate) -> Res<String> {
    let stats = db.get_daily_statistics(tenant_id, date).await?;

    let percent = if stats.total_users == 0 {
        0
    } else {
        stats.responded_users * 100 / stats.total_users
    };

    Ok(format!(
        "Check-ins for {}: {} of {} responded ({percent}%).\n\n🏢 Office: {}\n🏠 Remote: {}\n🔀 Hybrid: {}\n\nTotal updates: {}",
        date.format("%A %-d %B"),
        stats.responded_users,
        stats.total_users,
        stats.office_count,
        stats.remote_count,
        stats.hybrid_count,
        stats.total_updates
    ))
}

/// Upcoming public holidays, and whether the date itself is a working day.
pub async fn holidays(calendar: &WorkingDayService, date: NaiveDate) -> String {
    let upcoming = calendar.get_upcoming_holidays(date, UPCOMING_HOLIDAY_LIMIT).await;

    let today = match calendar.holiday_on(date).await {
        Some(holiday) => format!("Today is a public holiday: **{}**.", holiday.name),
        None if !calendar.is_working_day(date).await => "Today is not a working day.".to_string(),
        None => "Today is a working day.".to_string(),
    };

    if upcoming.is_empty() {
        return format!("{today}\n\nNo upcoming public holidays found.");
    }

    let lines = upcoming
        .iter()
        .map(|holiday| format!("- {}: {}", holiday.date.format("%a %-d %b %Y"), holiday.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{today}\n\nUpcoming public holidays:\n{lines}")
}
