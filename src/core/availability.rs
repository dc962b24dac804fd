//! Slot availability for a branch on a shop-local day.
//!
//! A slot is available when it is on the grid, the day is not in the past,
//! it satisfies the same-day lead time, no non-cancelled appointment holds it
//! and no blocked range covers it. The filtering itself is pure; the storage
//! side only gathers the occupied instants and blocked ranges for the day.

use crate::{
    config::settings::ShopSettings,
    core::catalog,
    entities::{Appointment, AppointmentStatus, BlockedSlot, appointment, blocked_slot},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use sea_orm::{ConnectionTrait, prelude::*};
use std::collections::HashSet;
use tracing::debug;

const SECONDS_PER_DAY: i64 = 86_400;

/// What already occupies a branch on one day.
#[derive(Debug, Default, Clone)]
pub struct DayOccupancy {
    /// Start instants of non-cancelled appointments
    pub booked: HashSet<DateTime<Utc>>,
    /// Blocked ranges overlapping the day
    pub blocked: Vec<blocked_slot::Model>,
}

impl DayOccupancy {
    fn is_free(&self, instant: DateTime<Utc>) -> bool {
        !self.booked.contains(&instant) && !self.blocked.iter().any(|b| b.covers(instant))
    }
}

/// Shop-local calendar date of `now`.
#[must_use]
pub fn shop_today(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Absolute instant of a shop-local date and time.
///
/// Ambiguous local times resolve to the earlier instant.
///
/// # Errors
/// Returns `Error::InvalidTime` if the local time does not exist on that date.
pub fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidTime {
            value: format!("{date} {time}"),
        })
}

/// UTC range `[start, end)` of one shop-local day.
pub fn day_bounds(tz: Tz, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date.succ_opt().ok_or_else(|| Error::InvalidDate {
        value: date.to_string(),
    })?;
    Ok((
        local_instant(tz, date, NaiveTime::default())?,
        local_instant(tz, next, NaiveTime::default())?,
    ))
}

/// Earliest allowed slot time on `date`, as seconds after that day's midnight.
///
/// Returns `None` when no lead-time filtering applies (any day after today).
/// The cutoff `now + lead` is rounded up to the next grid step from opening.
#[must_use]
pub fn lead_time_floor(settings: &ShopSettings, date: NaiveDate, now: DateTime<Utc>) -> Option<i64> {
    if date != shop_today(settings.timezone, now) {
        return None;
    }
    let cutoff = (now + settings.lead_time).with_timezone(&settings.timezone);
    let day_offset = (cutoff.date_naive() - date).num_days() * SECONDS_PER_DAY;
    let seconds = day_offset + i64::from(cutoff.time().num_seconds_from_midnight());
    // Sub-second remainders still count as "after" the boundary
    let seconds = if cutoff.time().nanosecond() > 0 {
        seconds + 1
    } else {
        seconds
    };
    Some(settings.grid.ceil_to_step(seconds))
}

/// Validates the timing of a requested slot and returns its absolute instant.
///
/// Checks, in order: grid membership, past date, same-day lead time.
///
/// # Errors
/// `OffGrid`, `PastDate` or `LeadTimeNotMet`.
pub fn validate_slot_time(
    settings: &ShopSettings,
    date: NaiveDate,
    time: NaiveTime,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    if !settings.grid.is_on_grid(time) {
        return Err(Error::OffGrid {
            time: time.format("%H:%M").to_string(),
        });
    }
    if date < shop_today(settings.timezone, now) {
        return Err(Error::PastDate { date });
    }
    if let Some(floor) = lead_time_floor(settings, date, now) {
        if i64::from(time.num_seconds_from_midnight()) < floor {
            return Err(Error::LeadTimeNotMet {
                date,
                time: time.format("%H:%M").to_string(),
                lead_minutes: settings.lead_time.num_minutes(),
            });
        }
    }
    local_instant(settings.timezone, date, time)
}

/// Filters the day's grid down to the bookable slots, ascending.
///
/// Past dates yield no slots.
#[must_use]
pub fn filter_available(
    settings: &ShopSettings,
    date: NaiveDate,
    now: DateTime<Utc>,
    occupancy: &DayOccupancy,
) -> Vec<NaiveTime> {
    if date < shop_today(settings.timezone, now) {
        return Vec::new();
    }
    let floor = lead_time_floor(settings, date, now);

    settings
        .grid
        .generate_slots()
        .into_iter()
        .filter(|time| floor.is_none_or(|f| i64::from(time.num_seconds_from_midnight()) >= f))
        .filter(|time| {
            local_instant(settings.timezone, date, *time)
                .map(|instant| occupancy.is_free(instant))
                .unwrap_or(false)
        })
        .collect()
}

/// Loads booked instants and blocked ranges for a branch and shop-local day.
///
/// `exclude_appointment` leaves one appointment out of the booked set, so a
/// reschedule does not collide with the slot it is leaving.
pub async fn load_day_occupancy<C>(
    conn: &C,
    settings: &ShopSettings,
    branch_id: &str,
    date: NaiveDate,
    exclude_appointment: Option<i64>,
) -> Result<DayOccupancy>
where
    C: ConnectionTrait,
{
    let (day_start, day_end) = day_bounds(settings.timezone, date)?;

    let mut query = Appointment::find()
        .filter(appointment::Column::BranchId.eq(branch_id))
        .filter(appointment::Column::Status.ne(AppointmentStatus::Cancelled))
        .filter(appointment::Column::ScheduledAt.gte(day_start))
        .filter(appointment::Column::ScheduledAt.lt(day_end));
    if let Some(id) = exclude_appointment {
        query = query.filter(appointment::Column::Id.ne(id));
    }
    let booked = query
        .all(conn)
        .await?
        .into_iter()
        .map(|a| a.scheduled_at)
        .collect();

    let blocked = BlockedSlot::find()
        .filter(blocked_slot::Column::BranchId.eq(branch_id))
        .filter(blocked_slot::Column::SlotStart.lt(day_end))
        .filter(blocked_slot::Column::SlotEnd.gt(day_start))
        .all(conn)
        .await?;

    Ok(DayOccupancy { booked, blocked })
}

/// Lists bookable slot times for a branch, day and treatment.
///
/// # Errors
/// - `TreatmentNotFound` for an unknown treatment code
/// - `BranchNotFound` / `BranchUnavailable` for an unknown or inactive branch
/// - `PastDate` when the day is before the shop-local today
pub async fn available_slots(
    db: &DatabaseConnection,
    settings: &ShopSettings,
    branch_id: &str,
    date: NaiveDate,
    treatment_code: &str,
    now: DateTime<Utc>,
) -> Result<Vec<NaiveTime>> {
    catalog::require_treatment(db, treatment_code).await?;
    catalog::require_active_branch(db, branch_id).await?;
    if date < shop_today(settings.timezone, now) {
        return Err(Error::PastDate { date });
    }

    let occupancy = load_day_occupancy(db, settings, branch_id, date, None).await?;
    let slots = filter_available(settings, date, now, &occupancy);
    debug!(
        "{} of {} slots available at {} on {}",
        slots.len(),
        settings.grid.generate_slots().len(),
        branch_id,
        date
    );
    Ok(slots)
}

/// Confirms no other appointment holds `instant` and no blocked range covers it.
///
/// Intended to run inside the transaction that then writes the appointment.
///
/// # Errors
/// `SlotTaken` or `SlotBlocked`.
pub async fn ensure_slot_free<C>(
    conn: &C,
    branch_id: &str,
    instant: DateTime<Utc>,
    exclude_appointment: Option<i64>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut taken = Appointment::find()
        .filter(appointment::Column::BranchId.eq(branch_id))
        .filter(appointment::Column::ScheduledAt.eq(instant))
        .filter(appointment::Column::Status.ne(AppointmentStatus::Cancelled));
    if let Some(id) = exclude_appointment {
        taken = taken.filter(appointment::Column::Id.ne(id));
    }
    if taken.one(conn).await?.is_some() {
        return Err(Error::SlotTaken { at: instant });
    }

    let blocked = BlockedSlot::find()
        .filter(blocked_slot::Column::BranchId.eq(branch_id))
        .filter(blocked_slot::Column::SlotStart.lte(instant))
        .filter(blocked_slot::Column::SlotEnd.gt(instant))
        .one(conn)
        .await?;
    if blocked.is_some() {
        return Err(Error::SlotBlocked { at: instant });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::slot_grid::{format_time_of_day, parse_time_of_day};
    use crate::test_utils::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn t(value: &str) -> NaiveTime {
        parse_time_of_day(value).unwrap()
    }

    /// Instant for a Bangkok wall-clock time.
    fn bkk(day: &str, time: &str) -> DateTime<Utc> {
        local_instant(chrono_tz::Asia::Bangkok, date(day), t(time)).unwrap()
    }

    fn labels(slots: &[NaiveTime]) -> Vec<String> {
        slots.iter().copied().map(format_time_of_day).collect()
    }

    #[test]
    fn test_future_day_has_full_grid() {
        let settings = ShopSettings::default();
        let now = bkk("2030-03-18", "17:50");

        let slots = filter_available(&settings, date("2030-03-19"), now, &DayOccupancy::default());
        assert_eq!(slots.len(), 14);
        assert_eq!(format_time_of_day(slots[0]), "08:00");
    }

    #[test]
    fn test_early_morning_cutoff_rounds_to_opening() {
        let settings = ShopSettings::default();
        let now = bkk("2030-03-18", "05:00");

        let slots = filter_available(&settings, date("2030-03-18"), now, &DayOccupancy::default());
        assert_eq!(format_time_of_day(slots[0]), "08:00");
    }

    #[test]
    fn test_same_day_cutoff_rounds_up_to_next_step() {
        let settings = ShopSettings::default();
        // 07:15 + 120 min = 09:15, next step from 08:00 is 09:30
        let now = bkk("2030-03-18", "07:15");

        let slots = filter_available(&settings, date("2030-03-18"), now, &DayOccupancy::default());
        assert_eq!(format_time_of_day(slots[0]), "09:30");
        assert!(!labels(&slots).contains(&"08:45".to_string()));
    }

    #[test]
    fn test_cutoff_exactly_on_step_is_included() {
        let settings = ShopSettings::default();
        // 08:15 + 120 min = 10:15, which is itself a slot
        let now = bkk("2030-03-18", "08:15");

        let slots = filter_available(&settings, date("2030-03-18"), now, &DayOccupancy::default());
        assert_eq!(format_time_of_day(slots[0]), "10:15");
    }

    #[test]
    fn test_late_evening_leaves_no_slots_today() {
        let settings = ShopSettings::default();
        let now = bkk("2030-03-18", "16:30");

        let slots = filter_available(&settings, date("2030-03-18"), now, &DayOccupancy::default());
        assert!(slots.is_empty());
    }

    #[test]
    fn test_booked_and_blocked_slots_excluded() {
        let settings = ShopSettings::default();
        let now = bkk("2030-03-01", "09:00");
        let day = "2030-03-18";

        let mut occupancy = DayOccupancy::default();
        occupancy.booked.insert(bkk(day, "09:30"));
        occupancy.blocked.push(blocked_slot::Model {
            id: 1,
            branch_id: TEST_BRANCH.to_string(),
            slot_start: bkk(day, "12:00"),
            slot_end: bkk(day, "14:00"),
            reason: Some("staff training".to_string()),
        });

        let slots = labels(&filter_available(&settings, date(day), now, &occupancy));
        assert!(!slots.contains(&"09:30".to_string()));
        assert!(!slots.contains(&"12:30".to_string()));
        assert!(!slots.contains(&"13:15".to_string()));
        // Range end is exclusive; 14:00 starts exactly at the end
        assert!(slots.contains(&"14:00".to_string()));
        assert!(slots.contains(&"11:45".to_string()));
    }

    #[test]
    fn test_validate_slot_time_errors() {
        let settings = ShopSettings::default();
        let now = bkk("2030-03-18", "07:15");

        assert!(matches!(
            validate_slot_time(&settings, date("2030-03-19"), t("08:10"), now),
            Err(Error::OffGrid { .. })
        ));
        assert!(matches!(
            validate_slot_time(&settings, date("2030-03-17"), t("08:00"), now),
            Err(Error::PastDate { .. })
        ));
        assert!(matches!(
            validate_slot_time(&settings, date("2030-03-18"), t("08:45"), now),
            Err(Error::LeadTimeNotMet { .. })
        ));
        let instant = validate_slot_time(&settings, date("2030-03-18"), t("09:30"), now).unwrap();
        assert_eq!(instant, bkk("2030-03-18", "09:30"));
    }

    #[test]
    fn test_local_instant_is_offset_from_utc() {
        let instant = bkk("2030-03-18", "08:00");
        assert_eq!(instant.to_rfc3339(), "2030-03-18T01:00:00+00:00");
    }

    #[tokio::test]
    async fn test_available_slots_reads_storage() -> Result<()> {
        let db = setup_seeded_db().await?;
        let settings = ShopSettings::default();
        let now = bkk("2030-03-01", "09:00");
        let day = date("2030-03-18");

        insert_test_appointment(&db, TEST_CUSTOMER, bkk("2030-03-18", "10:15")).await?;
        insert_test_block(&db, TEST_BRANCH, bkk("2030-03-18", "17:00"), bkk("2030-03-18", "18:30"))
            .await?;

        let slots = labels(&available_slots(&db, &settings, TEST_BRANCH, day, TEST_TREATMENT, now).await?);
        assert_eq!(slots.len(), 11);
        assert!(!slots.contains(&"10:15".to_string()));
        assert!(!slots.contains(&"17:00".to_string()));
        assert!(!slots.contains(&"17:45".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_available_slots_rejects_bad_inputs() -> Result<()> {
        let db = setup_seeded_db().await?;
        let settings = ShopSettings::default();
        let now = bkk("2030-03-18", "09:00");

        let past = available_slots(&db, &settings, TEST_BRANCH, date("2030-03-17"), TEST_TREATMENT, now).await;
        assert!(matches!(past, Err(Error::PastDate { .. })));

        let unknown = available_slots(&db, &settings, TEST_BRANCH, date("2030-03-19"), "laser", now).await;
        assert!(matches!(unknown, Err(Error::TreatmentNotFound { .. })));

        let closed = available_slots(&db, &settings, "branch-mk", date("2030-03-19"), TEST_TREATMENT, now).await;
        assert!(matches!(closed, Err(Error::BranchUnavailable { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_slot_free_excludes_own_appointment() -> Result<()> {
        let db = setup_seeded_db().await?;
        let at = bkk("2030-03-18", "11:00");
        let existing = insert_test_appointment(&db, TEST_CUSTOMER, at).await?;

        assert!(matches!(
            ensure_slot_free(&db, TEST_BRANCH, at, None).await,
            Err(Error::SlotTaken { .. })
        ));
        ensure_slot_free(&db, TEST_BRANCH, at, Some(existing.id)).await?;
        Ok(())
    }
}
