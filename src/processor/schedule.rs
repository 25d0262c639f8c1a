//! Schedule synthesis. There is no timetable behind these values: the
//! estimate is derived from the stop's ordinal and the current clock.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

use super::proximity::NearbyStop;
use crate::error::Result;
use crate::model::{PositionEvent, ScheduleEvent, ScheduleStatus};

/// Minutes added to the current time per position along the route.
pub const MINUTES_PER_SEQUENCE: i64 = 5;

/// Builds the schedule event for a vehicle matched to `nearby` at instant `now`.
///
/// # Errors
///
/// Fails with [`crate::Error::InvalidStopId`] when the stop's ordinal cannot be parsed.
pub fn synthesize(
    event: &PositionEvent,
    nearby: &NearbyStop<'_>,
    status: ScheduleStatus,
    now: NaiveDateTime,
) -> Result<ScheduleEvent> {
    let stop = nearby.stop;
    let sequence_number = stop.sequence_number()?;

    let actual_time = now.time();
    let estimated_time = estimated_time(actual_time, sequence_number);

    Ok(ScheduleEvent {
        vehicle_id: event.vehicle_id.clone(),
        plate_number: event.plate_number.clone(),
        stop_id: stop.stop_id.clone(),
        stop_name: stop.name.clone(),
        stop_address: stop.address.clone(),
        estimated_time,
        actual_time,
        delay_minutes: delay_minutes(estimated_time, actual_time),
        timestamp: now,
        route_id: event.route_id.clone(),
        sequence_number,
        status,
    })
}

/// `now + 5 * sequence` minutes, wrapping at midnight.
pub fn estimated_time(now: NaiveTime, sequence_number: u32) -> NaiveTime {
    let offset = TimeDelta::minutes(i64::from(sequence_number) * MINUTES_PER_SEQUENCE);
    now.overflowing_add_signed(offset).0
}

/// Whole minutes from `estimated` to `actual`, truncated toward zero.
///
/// Both operands are times of day with no date, so an estimate that wrapped
/// past midnight produces a large positive delay instead of a small negative one.
pub fn delay_minutes(estimated: NaiveTime, actual: NaiveTime) -> i64 {
    (actual - estimated).num_minutes()
}
