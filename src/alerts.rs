//! Polling alerts dashboard.
//!
//! Fetches the alerts endpoint on a fixed interval and renders the returned
//! records as rows. A failed poll renders an inline error and the loop keeps
//! polling; only startup errors abort.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::config::AlertsSettings;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// One alert as returned by the endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AlertRecord {
    pub message: String,
    /// Epoch seconds
    pub triggered_at: f64,
}

/// Outcome of one poll cycle
#[derive(Debug)]
pub enum PollOutcome {
    Alerts(Vec<AlertRecord>),
    Failed(String),
}

/// Format epoch seconds as an ISO-8601 UTC timestamp
pub fn format_timestamp(epoch_seconds: f64) -> String {
    let secs = epoch_seconds.trunc() as i64;
    let nanos = ((epoch_seconds - epoch_seconds.trunc()) * 1e9) as u32;
    chrono::DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| epoch_seconds.to_string())
}

/// Render one poll outcome as display rows
pub fn render_rows(outcome: &PollOutcome) -> Vec<String> {
    match outcome {
        PollOutcome::Failed(error) => vec![format!("Failed to load alerts: {}", error)],
        PollOutcome::Alerts(alerts) if alerts.is_empty() => vec!["(no alerts)".to_string()],
        PollOutcome::Alerts(alerts) => alerts
            .iter()
            .map(|alert| format!("{}  {}", format_timestamp(alert.triggered_at), alert.message))
            .collect(),
    }
}

async fn fetch_latest_alerts(client: &reqwest::Client, url: &str) -> Result<Vec<AlertRecord>> {
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to fetch alerts")?;

    if !response.status().is_success() {
        return Err(anyhow!("Failed to fetch alerts: {}", response.status().as_u16()));
    }

    response
        .json::<Vec<AlertRecord>>()
        .await
        .context("Failed to parse alerts response")
}

async fn poll_once(client: &reqwest::Client, url: &str) -> PollOutcome {
    match fetch_latest_alerts(client, url).await {
        Ok(alerts) => PollOutcome::Alerts(alerts),
        Err(e) => PollOutcome::Failed(e.to_string()),
    }
}

/// Run the dashboard loop until Ctrl-C
pub async fn run(settings: AlertsSettings) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")?;

    let interval = Duration::from_secs(settings.poll_interval_seconds.max(1));
    log::info!("polling {} every {:?}", settings.url, interval);

    loop {
        let outcome = poll_once(&client, &settings.url).await;
        if let PollOutcome::Failed(ref e) = outcome {
            log::warn!("poll failed: {}", e);
        }

        println!("--- {} ---", chrono::Utc::now().format("%H:%M:%S"));
        for row in render_rows(&outcome) {
            println!("{}", row);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("received shutdown signal, exiting gracefully");
                return Ok(());
            }
        }
    }
}
