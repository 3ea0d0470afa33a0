use crate::model::{Error, Result};
use crate::telemetry::TelemetryRecord;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

const DAILY_USAGE_URL: &str = "https://api.cursor.com/teams/daily-usage-data";

/// Anything that yields usage rows for the report window. Failures are
/// absorbed: an unavailable source is an empty one.
pub trait TelemetrySource {
    async fn fetch_usage(&self) -> Vec<TelemetryRecord>;
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    data: Option<Vec<TelemetryRecord>>,
}

pub struct UsageClient {
    http: reqwest::Client,
    api_key: Option<String>,
    days: i64,
}

impl UsageClient {
    pub fn new(api_key: Option<String>, days: i64) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.filter(|key| !key.is_empty()),
            days,
        }
    }

    async fn request(&self, api_key: &str) -> Result<Vec<TelemetryRecord>> {
        let end = Utc::now();
        let start = end - Duration::days(self.days);
        let response = self
            .http
            .post(DAILY_USAGE_URL)
            .basic_auth(api_key, Some(""))
            .json(&json!({
                "startDate": start.timestamp_millis(),
                "endDate": end.timestamp_millis(),
            }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: DAILY_USAGE_URL.to_string(),
                status: status.as_u16(),
            });
        }
        let body: UsageResponse = response.json().await?;
        Ok(body.data.unwrap_or_default())
    }
}

impl TelemetrySource for UsageClient {
    async fn fetch_usage(&self) -> Vec<TelemetryRecord> {
        let Some(api_key) = &self.api_key else {
            info!("No usage API key provided, skipping telemetry fetch");
            return Vec::new();
        };
        match self.request(api_key).await {
            Ok(records) => {
                info!("Fetched {} telemetry rows", records.len());
                records
            }
            Err(err) => {
                warn!("Failed to fetch telemetry: {err}");
                Vec::new()
            }
        }
    }
}
