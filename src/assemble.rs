//! Row assembly: merging one pollution snapshot and one weather slice into a
//! canonical feature row.
//!
//! All type coercion happens here, on the way into [`FeatureRow`]. Provider
//! payloads may carry numbers as strings; those coerce. Anything else fails
//! the row with [`PipelineError::MalformedSource`]: a row is emitted fully
//! populated or not at all. Date parts are derived solely from the pollution
//! snapshot's UTC timestamp (the weather slice has no timestamp of its own).

use chrono::{DateTime, Datelike, Timelike};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{FeatureRow, PollutionSnapshot, WeatherDailySlice, POLLUTANTS};

// ---

/// Assemble one feature row and return it together with the new AQI carry.
///
/// `previous_aqi` is the last successfully observed AQI in the running
/// sequence, or `None` when no prior row has been assembled; the change rate
/// is 0 in that case.
pub fn assemble(
    pollution: &PollutionSnapshot,
    weather: &WeatherDailySlice,
    day_offset: i32,
    previous_aqi: Option<i32>,
) -> PipelineResult<(FeatureRow, i32)> {
    // ---
    let when = DateTime::from_timestamp(pollution.timestamp, 0).ok_or_else(|| {
        PipelineError::malformed(
            "timestamp",
            format!("epoch {} is out of range", pollution.timestamp),
        )
    })?;

    let aqi = coerce_i32(&pollution.aqi, "aqi")?;
    let aqi_change_rate = match previous_aqi {
        None => 0,
        Some(prev) => aqi - prev,
    };

    // Pollutant presence is provider-dependent; absent keys default to 0.
    // A key that is present but unparsable is fatal for the row.
    let mut concentrations = [0.0_f64; POLLUTANTS.len()];
    for (slot, name) in concentrations.iter_mut().zip(POLLUTANTS) {
        *slot = match pollution.components.get(name) {
            None | Some(Value::Null) => 0.0,
            Some(value) => coerce_f64(value, name)?,
        };
    }
    let [co, no, no2, o3, so2, pm2_5, pm10, nh3] = concentrations;

    // A day with no measurable rain omits the field upstream.
    let precipitation = match &weather.precipitation {
        Value::Null => 0.0,
        value => coerce_f64(value, "precipitation")?,
    };

    let row = FeatureRow {
        readable_date: when.format("%Y-%m-%d").to_string(),
        day_offset,
        hour: when.hour() as i32,
        day: when.day() as i32,
        month: when.month() as i32,
        latitude: pollution.latitude,
        longitude: pollution.longitude,
        aqi,
        aqi_change_rate,
        co,
        no,
        no2,
        o3,
        so2,
        pm2_5,
        pm10,
        nh3,
        max_temp: coerce_f64(&weather.max_temp, "max_temp")?,
        min_temp: coerce_f64(&weather.min_temp, "min_temp")?,
        precipitation,
        max_wind_speed: coerce_f64(&weather.max_wind_speed, "max_wind_speed")?,
    };

    Ok((row, aqi))
}

// ---

/// Coerce a raw JSON value to f64. Accepts numbers and numeric strings.
pub fn coerce_f64(value: &Value, field: &str) -> PipelineResult<f64> {
    // ---
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| PipelineError::malformed(field, format!("{n} does not fit in f64"))),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            PipelineError::malformed(field, format!("string '{s}' is not a number"))
        }),
        other => Err(PipelineError::malformed(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

/// Coerce a raw JSON value to i32. Accepts integers, integral floats
/// (`3.0`), and numeric strings.
pub fn coerce_i32(value: &Value, field: &str) -> PipelineResult<i32> {
    // ---
    let as_float = coerce_f64(value, field)?;
    if as_float.fract() != 0.0 {
        return Err(PipelineError::malformed(
            field,
            format!("{as_float} is not an integer"),
        ));
    }
    if as_float < f64::from(i32::MIN) || as_float > f64::from(i32::MAX) {
        return Err(PipelineError::malformed(
            field,
            format!("{as_float} does not fit in i32"),
        ));
    }
    Ok(as_float as i32)
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    // 2025-03-26 18:45:00 UTC
    const TS: i64 = 1_743_014_700;

    fn snapshot(aqi: Value, components: Value) -> PollutionSnapshot {
        // ---
        PollutionSnapshot {
            timestamp: TS,
            aqi,
            components: components.as_object().cloned().unwrap_or_default(),
            latitude: 24.8607,
            longitude: 67.0011,
        }
    }

    fn slice(precipitation: Value) -> WeatherDailySlice {
        // ---
        WeatherDailySlice {
            max_temp: json!(30.0),
            min_temp: json!(21.5),
            precipitation,
            max_wind_speed: json!(12.3),
        }
    }

    #[test]
    fn assembles_with_defaults_and_change_rate() {
        // ---
        // Snapshot carries only `co`; the other seven pollutants default to 0,
        // null precipitation coerces to 0.0, change rate is current - previous.
        let pollution = snapshot(json!(3), json!({ "co": 200.0 }));
        let (row, carry) = assemble(&pollution, &slice(Value::Null), 1, Some(2)).unwrap();

        assert_eq!(row.aqi, 3);
        assert_eq!(row.aqi_change_rate, 1);
        assert_eq!(row.co, 200.0);
        assert_eq!(row.no, 0.0);
        assert_eq!(row.nh3, 0.0);
        assert_eq!(row.precipitation, 0.0);
        assert_eq!(row.max_temp, 30.0);
        assert_eq!(carry, 3);
    }

    #[test]
    fn first_row_change_rate_is_zero() {
        // ---
        let pollution = snapshot(json!(4), json!({}));
        let (row, carry) = assemble(&pollution, &slice(json!(1.2)), 1, None).unwrap();
        assert_eq!(row.aqi_change_rate, 0);
        assert_eq!(row.precipitation, 1.2);
        assert_eq!(carry, 4);
    }

    #[test]
    fn date_parts_come_from_the_pollution_timestamp() {
        // ---
        let pollution = snapshot(json!(2), json!({}));
        let (row, _) = assemble(&pollution, &slice(json!(0.0)), -3, None).unwrap();
        assert_eq!(row.readable_date, "2025-03-26");
        assert_eq!(row.hour, 18);
        assert_eq!(row.day, 26);
        assert_eq!(row.month, 3);
        assert_eq!(row.day_offset, -3);
    }

    #[test]
    fn numeric_strings_coerce() {
        // ---
        let pollution = snapshot(json!("3"), json!({ "co": "201.94", "so2": " 0.64 " }));
        let (row, _) = assemble(&pollution, &slice(json!("0.4")), 1, None).unwrap();
        assert_eq!(row.aqi, 3);
        assert_eq!(row.co, 201.94);
        assert_eq!(row.so2, 0.64);
        assert_eq!(row.precipitation, 0.4);
    }

    #[test]
    fn unparsable_field_fails_the_row() {
        // ---
        let pollution = snapshot(json!(3), json!({ "co": "hazy" }));
        let err = assemble(&pollution, &slice(json!(0.0)), 1, None).unwrap_err();
        match err {
            PipelineError::MalformedSource { field, .. } => assert_eq!(field, "co"),
            other => panic!("expected MalformedSource, got {other}"),
        }

        let pollution = snapshot(json!(true), json!({}));
        assert!(matches!(
            assemble(&pollution, &slice(json!(0.0)), 1, None),
            Err(PipelineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn fractional_aqi_fails_the_row() {
        // ---
        let pollution = snapshot(json!(3.7), json!({}));
        assert!(matches!(
            assemble(&pollution, &slice(json!(0.0)), 1, None),
            Err(PipelineError::MalformedSource { .. })
        ));

        // An integral float is a fine AQI
        let pollution = snapshot(json!(3.0), json!({}));
        let (row, _) = assemble(&pollution, &slice(json!(0.0)), 1, None).unwrap();
        assert_eq!(row.aqi, 3);
    }

    #[test]
    fn coercion_is_idempotent() {
        // ---
        let pollution = snapshot(json!("3"), json!({ "co": "201.94", "pm2_5": 15.02 }));
        let (row, _) = assemble(&pollution, &slice(Value::Null), 1, Some(1)).unwrap();

        // Re-coercing already-coerced values changes nothing.
        for value in [row.co, row.pm2_5, row.precipitation, row.max_temp] {
            assert_eq!(coerce_f64(&json!(value), "field").unwrap(), value);
        }
        assert_eq!(coerce_i32(&json!(row.aqi), "aqi").unwrap(), row.aqi);
    }
}
