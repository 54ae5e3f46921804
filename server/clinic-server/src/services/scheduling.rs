//! Slot matching against weekly doctor schedules
//!
//! Schedules are wall-clock windows in the clinic's local time while
//! appointments are stored as UTC instants. Everything here converts through
//! the clinic's fixed offset before comparing weekdays or times.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use database_layer::Schedule;
use uuid::Uuid;

/// ISO weekday of Sunday, on which the clinic never opens
pub const SUNDAY: i16 = 7;

/// ISO weekday number, 1 = Monday .. 7 = Sunday
pub fn iso_weekday(date: NaiveDate) -> i16 {
    // number_from_monday is always in 1..=7
    i16::try_from(date.weekday().number_from_monday()).unwrap_or(SUNDAY)
}

/// Wall-clock date and time of `at` in the clinic
pub fn to_local(at: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    at.with_timezone(&offset)
}

/// UTC instant of a clinic-local date and time
pub fn local_instant(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// Whether a schedule window contains a local time (start inclusive, end exclusive)
pub fn covers(schedule: &Schedule, time: NaiveTime) -> bool {
    schedule.start_time <= time && time < schedule.end_time
}

/// First schedule, in the given order, covering the local time of `at` whose
/// doctor is still free at that instant.
///
/// `schedules` must already be narrowed to the weekday of `at`.
pub fn first_free_covering<'a, F>(
    schedules: &'a [Schedule],
    at: DateTime<Utc>,
    offset: FixedOffset,
    mut is_taken: F,
) -> Option<&'a Schedule>
where
    F: FnMut(Uuid) -> bool,
{
    let local_time = to_local(at, offset).time();
    schedules
        .iter()
        .filter(|schedule| covers(schedule, local_time))
        .find(|schedule| !is_taken(schedule.doctor_id))
}

/// Whether any schedule covers the local time of `at`
pub fn any_covering(schedules: &[Schedule], at: DateTime<Utc>, offset: FixedOffset) -> bool {
    let local_time = to_local(at, offset).time();
    schedules.iter().any(|schedule| covers(schedule, local_time))
}

/// UTC bounds `[start, end)` of a local calendar day
pub fn local_day_bounds(date: NaiveDate, offset: FixedOffset) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_instant(date, NaiveTime::MIN, offset)?;
    let next = date.succ_opt()?;
    let end = local_instant(next, NaiveTime::MIN, offset)?;
    Some((start, end))
}

/// Start times ("HH:MM") of the schedules whose doctor has no booking at the
/// schedule's start on `date`.
///
/// `schedules` are expected in start-time order; `booked` holds the
/// (doctor, instant) pairs of non-cancelled appointments that day.
pub fn available_times(
    schedules: &[Schedule],
    date: NaiveDate,
    offset: FixedOffset,
    booked: &HashSet<(Uuid, DateTime<Utc>)>,
) -> Vec<String> {
    if iso_weekday(date) == SUNDAY {
        return Vec::new();
    }

    schedules
        .iter()
        .filter_map(|schedule| {
            let instant = local_instant(date, schedule.start_time, offset)?;
            if booked.contains(&(schedule.doctor_id, instant)) {
                None
            } else {
                Some(schedule.start_time.format("%H:%M").to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(-6 * 3600).unwrap()
    }

    fn schedule(doctor_id: Uuid, start: (u32, u32), end: (u32, u32)) -> Schedule {
        Schedule {
            id: Uuid::new_v4(),
            doctor_id,
            specialty_id: Uuid::new_v4(),
            weekday: 1,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    #[test]
    fn test_iso_weekday() {
        assert_eq!(iso_weekday(monday()), 1);
        assert_eq!(iso_weekday(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()), SUNDAY);
    }

    #[test]
    fn test_local_instant_applies_offset() {
        let at = local_instant(monday(), NaiveTime::from_hms_opt(9, 0, 0).unwrap(), offset()).unwrap();
        assert_eq!(at.to_rfc3339(), "2025-03-03T15:00:00+00:00");
    }

    #[test]
    fn test_covers_is_half_open() {
        let s = schedule(Uuid::new_v4(), (9, 0), (10, 0));
        assert!(covers(&s, NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert!(covers(&s, NaiveTime::from_hms_opt(9, 59, 0).unwrap()));
        assert!(!covers(&s, NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
        assert!(!covers(&s, NaiveTime::from_hms_opt(8, 59, 0).unwrap()));
    }

    #[test]
    fn test_first_free_covering_skips_busy_doctor() {
        let busy = Uuid::new_v4();
        let free = Uuid::new_v4();
        let schedules = vec![schedule(busy, (9, 0), (11, 0)), schedule(free, (9, 0), (12, 0))];
        let at = local_instant(monday(), NaiveTime::from_hms_opt(10, 0, 0).unwrap(), offset()).unwrap();

        let chosen = first_free_covering(&schedules, at, offset(), |doctor| doctor == busy).unwrap();
        assert_eq!(chosen.doctor_id, free);

        assert!(first_free_covering(&schedules, at, offset(), |_| true).is_none());
    }

    #[test]
    fn test_first_free_covering_outside_windows() {
        let schedules = vec![schedule(Uuid::new_v4(), (9, 0), (11, 0))];
        let at = local_instant(monday(), NaiveTime::from_hms_opt(11, 0, 0).unwrap(), offset()).unwrap();
        assert!(first_free_covering(&schedules, at, offset(), |_| false).is_none());
        assert!(!any_covering(&schedules, at, offset()));
    }

    #[test]
    fn test_available_times_excludes_booked() {
        let doctor = Uuid::new_v4();
        let schedules = vec![schedule(doctor, (9, 0), (10, 0)), schedule(doctor, (10, 0), (11, 0))];
        let mut booked = HashSet::new();
        booked.insert((
            doctor,
            local_instant(monday(), NaiveTime::from_hms_opt(9, 0, 0).unwrap(), offset()).unwrap(),
        ));

        assert_eq!(available_times(&schedules, monday(), offset(), &booked), vec!["10:00"]);
    }

    #[test]
    fn test_available_times_sunday_is_empty() {
        let schedules = vec![schedule(Uuid::new_v4(), (9, 0), (10, 0))];
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert!(available_times(&schedules, sunday, offset(), &HashSet::new()).is_empty());
    }

    #[test]
    fn test_local_day_bounds() {
        let (start, end) = local_day_bounds(monday(), offset()).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-03-03T06:00:00+00:00");
        assert_eq!((end - start).num_hours(), 24);
    }

    proptest! {
        #[test]
        fn prop_covering_schedule_contains_local_time(start in 0u32..22, len in 1u32..2, minute in 0u32..120) {
            let s = schedule(Uuid::new_v4(), (start, 0), (start + len, 0));
            let hour = start + minute / 60;
            let time = NaiveTime::from_hms_opt(hour, minute % 60, 0).unwrap();
            let at = local_instant(monday(), time, offset()).unwrap();
            let found = first_free_covering(std::slice::from_ref(&s), at, offset(), |_| false).is_some();
            prop_assert_eq!(found, time >= s.start_time && time < s.end_time);
        }

        #[test]
        fn prop_local_round_trip(hour in 0u32..24, minute in 0u32..60) {
            let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
            let at = local_instant(monday(), time, offset()).unwrap();
            let local = to_local(at, offset());
            prop_assert_eq!(local.time(), time);
            prop_assert_eq!(local.date_naive(), monday());
        }
    }
}
