//! Sequence building: drive the row assembler across an ordered run of day
//! offsets, in both directions.
//!
//! This is where the two providers' incompatible granularities meet: the
//! pollution provider is queried once per day offset (it only answers
//! "latest reading in window"), while the weather provider is queried once
//! for the whole range and returns a day-indexed array that has to be sliced
//! per offset. The builder walks the offsets in chronological order (oldest
//! first for backfill, nearest first for forecast), threading the last
//! successfully observed AQI as an explicit accumulator. A skipped day does
//! not reset the carry: the change rate is computed against the last
//! *observed* AQI, not the last calendar day.
//!
//! Per-offset failures are recorded and skipped; the builder attempts every
//! requested offset and never aborts the run for a single bad day.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use tracing::{debug, error, warn};

use crate::assemble::assemble;
use crate::error::PipelineError;
use crate::models::FeatureRow;
use crate::sources::{DateRange, DayWindow, PollutionSource, WeatherSource};

// ---

/// Which side of "today" a sequence covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Backfill: `day_count` days ago through yesterday.
    Past,
    /// Forecast: tomorrow through `day_count` days ahead.
    Future,
}

impl Direction {
    // ---
    /// Offset distances in chronological visit order. Reordering these would
    /// silently change what `aqi_change_rate` means, so nothing downstream
    /// gets to choose the order.
    pub fn offsets(self, day_count: u32) -> Vec<u32> {
        match self {
            Direction::Past => (1..=day_count).rev().collect(),
            Direction::Future => (1..=day_count).collect(),
        }
    }

    /// Signed day offset recorded on an assembled row.
    pub fn signed(self, offset: u32) -> i32 {
        match self {
            Direction::Past => -(offset as i32),
            Direction::Future => offset as i32,
        }
    }

    /// Calendar day at `offset` days from `today` in this direction.
    fn target_date(self, today: NaiveDate, offset: u32) -> NaiveDate {
        match self {
            Direction::Past => today - Duration::days(i64::from(offset)),
            Direction::Future => today + Duration::days(i64::from(offset)),
        }
    }

    /// The range covered by the single weather fetch for a `day_count` run.
    pub fn date_range(self, today: NaiveDate, day_count: u32) -> DateRange {
        // ---
        let near = self.target_date(today, 1);
        let far = self.target_date(today, day_count.max(1));
        match self {
            Direction::Past => DateRange { start: far, end: near },
            Direction::Future => DateRange { start: near, end: far },
        }
    }

    /// Index of `offset`'s day within the ascending-date weather array
    /// returned for `date_range`.
    fn weather_index(self, offset: u32, day_count: u32) -> usize {
        match self {
            Direction::Past => (day_count - offset) as usize,
            Direction::Future => (offset - 1) as usize,
        }
    }

    /// Epoch-second window covering `offset`'s calendar day.
    fn day_window(self, today: NaiveDate, offset: u32) -> DayWindow {
        // ---
        let midnight = self
            .target_date(today, offset)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        DayWindow {
            start: midnight,
            end: midnight + 86_400,
        }
    }
}

/// Result of one sequence run: the assembled rows in chronological order
/// plus the offsets that produced no row.
#[derive(Debug, Default)]
pub struct SequenceOutcome {
    pub rows: Vec<FeatureRow>,
    pub skipped: BTreeSet<u32>,
}

// ---

/// Build the feature-row sequence for `1..=day_count` offsets in the given
/// direction.
///
/// One weather fetch covers the whole range; one pollution fetch runs per
/// offset. Every requested offset is attempted; failures land in
/// `skipped` and leave the AQI carry untouched.
pub async fn build_sequence<P, W>(
    pollution: &P,
    weather: &W,
    lat: f64,
    lon: f64,
    today: NaiveDate,
    day_count: u32,
    direction: Direction,
) -> SequenceOutcome
where
    P: PollutionSource + ?Sized,
    W: WeatherSource + ?Sized,
{
    // ---
    if day_count == 0 {
        return SequenceOutcome::default();
    }

    let range = direction.date_range(today, day_count);
    let slices = match weather.fetch_weather(lat, lon, range).await {
        Ok(slices) => slices,
        Err(e) => {
            warn!("Weather fetch failed for {}..{}: {e}", range.start, range.end);
            return SequenceOutcome {
                rows: Vec::new(),
                skipped: (1..=day_count).collect(),
            };
        }
    };
    if (slices.len() as i64) < range.len_days() {
        warn!(
            "Weather array covers {} of {} requested days; excess offsets will be skipped",
            slices.len(),
            range.len_days()
        );
    }

    let mut rows = Vec::new();
    let mut skipped = BTreeSet::new();
    // The carry is deliberately a local accumulator: concurrent sequence
    // builds must not share AQI state.
    let mut previous_aqi: Option<i32> = None;

    for offset in direction.offsets(day_count) {
        // ---
        let Some(slice) = slices.get(direction.weather_index(offset, day_count)) else {
            warn!("Day offset {offset}: weather array does not cover this day, skipping");
            skipped.insert(offset);
            continue;
        };

        let window = direction.day_window(today, offset);
        let snapshot = match pollution.fetch_pollution(lat, lon, window).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                record_skip(offset, &e, &mut skipped);
                continue;
            }
        };

        match assemble(&snapshot, slice, direction.signed(offset), previous_aqi) {
            Ok((row, carry)) => {
                debug!(
                    "Day offset {offset}: assembled {} (aqi {}, change rate {})",
                    row.readable_date, row.aqi, row.aqi_change_rate
                );
                previous_aqi = Some(carry);
                rows.push(row);
            }
            Err(e) => {
                // Carry stays as-is: the next successful day computes its
                // change rate against the last observed AQI.
                record_skip(offset, &e, &mut skipped);
            }
        }
    }

    SequenceOutcome { rows, skipped }
}

/// Record one skipped offset. The expected per-offset kinds log at warn;
/// anything else is louder because it means a source leaked a failure kind
/// it should not produce.
fn record_skip(offset: u32, err: &PipelineError, skipped: &mut BTreeSet<u32>) {
    // ---
    if err.is_skippable() {
        warn!("Day offset {offset}: {err}, skipping");
    } else {
        error!("Day offset {offset}: unexpected failure: {err}, skipping");
    }
    skipped.insert(offset);
}

// ---
