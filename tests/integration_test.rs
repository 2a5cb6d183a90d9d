use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;

// These tests drive a running service end-to-end (live providers, live
// database), so they are ignored by default:
//
//   BASE_URL=http://localhost:8080 cargo test -- --ignored

#[derive(Debug, Deserialize)]
struct Prediction {
    day_offset: i32,
    predicted_aqi: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    model_version: i32,
    predictions: Vec<Prediction>,
    skipped_offsets: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct TrainResponse {
    version: i32,
    rows: usize,
}

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

#[tokio::test]
#[ignore = "requires a running service"]
async fn health_endpoint_responds() -> Result<()> {
    // ---
    let response = Client::new()
        .get(format!("{}/health", base_url()))
        .send()
        .await?;
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running service and provider credentials"]
async fn backfill_train_predict_round_trip() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    // 1) Backfill a month of history into the feature store
    let backfill = client
        .post(format!("{}/pipeline/backfill?days=30", base))
        .send()
        .await?;
    assert!(
        backfill.status().is_success(),
        "backfill failed: {}",
        backfill.text().await?
    );

    // 2) Train and register a new model version
    let train: TrainResponse = client
        .post(format!("{}/pipeline/train", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(train.version >= 1, "expected a registered version");
    assert!(train.rows >= 10, "expected the backfilled rows to be used");

    // 3) Forecast three days ahead with the freshly registered model
    let forecast: ForecastResponse = client
        .get(format!("{}/predict?days=3", base))
        .send()
        .await?
        .json()
        .await?;

    assert!(forecast.model_version >= train.version);
    assert!(
        !forecast.predictions.is_empty(),
        "expected at least one prediction"
    );
    // One prediction per assembled offset; skipped offsets produce none.
    assert_eq!(
        forecast.predictions.len() + forecast.skipped_offsets.len(),
        3
    );

    // Predictions come back nearest-day-first with plausible AQI values
    let mut last_offset = 0;
    for p in &forecast.predictions {
        assert!(p.day_offset > last_offset, "offsets must ascend");
        last_offset = p.day_offset;
        assert!(
            p.predicted_aqi.is_finite() && (0.0..=10.0).contains(&p.predicted_aqi),
            "implausible AQI prediction: {}",
            p.predicted_aqi
        );
    }

    Ok(())
}

#[tokio::test]
#[ignore = "requires a running service"]
async fn ingest_upserts_todays_row() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    let first = client
        .post(format!("{}/pipeline/ingest", base))
        .send()
        .await?;
    assert!(first.status().is_success(), "ingest failed");
    let row: serde_json::Value = first.json().await?;
    assert_eq!(row["day_offset"], 0);
    assert_eq!(row["aqi_change_rate"], 0);

    // Running ingest twice on the same day must overwrite, not duplicate;
    // the second call succeeds and returns the same natural key.
    let second = client
        .post(format!("{}/pipeline/ingest", base))
        .send()
        .await?;
    assert!(second.status().is_success(), "repeat ingest failed");
    let repeat: serde_json::Value = second.json().await?;
    assert_eq!(repeat["readable_date"], row["readable_date"]);

    Ok(())
}
