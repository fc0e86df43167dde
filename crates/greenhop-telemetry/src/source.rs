//! Upstream carbon-intensity feeds.

use async_trait::async_trait;
use greenhop_config::{ProviderKind, TelemetryConfig};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use url::Url;

use crate::{TelemetryError, TelemetryResult};

/// WattTime reports marginal emissions in lbs/MWh.
const LBS_PER_MWH_TO_G_PER_KWH: f64 = 0.453592;

/// A feed answering the current intensity of a region, in gCO2/kWh.
#[async_trait]
pub trait CarbonSource: Send + Sync {
    /// Name of this source, for logs.
    fn name(&self) -> &'static str;

    /// Fetch the current intensity of `region`.
    async fn fetch(&self, region: &str) -> TelemetryResult<f64>;
}

/// Build the source selected by the configuration. Credentials come from
/// `WATTTIME_USERNAME`/`WATTTIME_PASSWORD` or `ELECTRICITYMAP_TOKEN`.
pub fn from_config(config: &TelemetryConfig) -> TelemetryResult<Arc<dyn CarbonSource>> {
    let source: Arc<dyn CarbonSource> = match config.provider {
        ProviderKind::Static => Arc::new(StaticSource::new(
            config
                .static_intensities
                .iter()
                .map(|(r, i)| (r.clone(), *i)),
        )),
        ProviderKind::WattTime => {
            let username = env_credential("WATTTIME_USERNAME")?;
            let password = env_credential("WATTTIME_PASSWORD")?;
            Arc::new(WattTimeSource::new(
                required_url(config)?,
                username,
                password,
            ))
        }
        ProviderKind::ElectricityMap => {
            let token = std::env::var("ELECTRICITYMAP_TOKEN").unwrap_or_default();
            Arc::new(ElectricityMapSource::new(required_url(config)?, token))
        }
    };
    info!(source = source.name(), "Configured carbon intensity source");
    Ok(source)
}

fn env_credential(var: &str) -> TelemetryResult<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TelemetryError::Auth(format!("{} is not set", var)))
}

fn required_url(config: &TelemetryConfig) -> TelemetryResult<Url> {
    config
        .base_url()
        .ok_or_else(|| TelemetryError::Parse("telemetry provider has no URL".to_string()))
}

fn endpoint(base: &Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}

/// Fixed per-region intensities. Backs development setups and tests, and
/// can be changed at runtime to simulate the grid moving.
pub struct StaticSource {
    intensities: RwLock<HashMap<String, f64>>,
    latency: Option<Duration>,
}

impl StaticSource {
    pub fn new(intensities: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            intensities: RwLock::new(intensities.into_iter().collect()),
            latency: None,
        }
    }

    /// Delay every answer, e.g. to exercise timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn set(&self, region: &str, intensity: f64) {
        self.intensities
            .write()
            .await
            .insert(region.to_string(), intensity);
    }

    /// Forget a region so fetches for it fail.
    pub async fn remove(&self, region: &str) {
        self.intensities.write().await.remove(region);
    }
}

#[async_trait]
impl CarbonSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, region: &str) -> TelemetryResult<f64> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.intensities
            .read()
            .await
            .get(region)
            .copied()
            .ok_or_else(|| TelemetryError::UnknownRegion(region.to_string()))
    }
}

/// WattTime marginal operating emissions rate (MOER) feed.
pub struct WattTimeSource {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl WattTimeSource {
    pub fn new(base_url: Url, username: String, password: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            username,
            password,
            token: Mutex::new(None),
        }
    }

    async fn login(&self) -> TelemetryResult<String> {
        let response = self
            .client
            .get(endpoint(&self.base_url, "v2/login"))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TelemetryError::Auth(format!(
                "WattTime login returned {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;
        json.get("token")
            .and_then(|t| t.as_str())
            .map(|t| t.to_string())
            .ok_or_else(|| TelemetryError::Auth("WattTime login returned no token".to_string()))
    }

    async fn token(&self) -> TelemetryResult<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.login().await?;
        *guard = Some(token.clone());
        debug!("Acquired WattTime token");
        Ok(token)
    }

    async fn forecast(&self, token: &str, region: &str) -> TelemetryResult<reqwest::Response> {
        Ok(self
            .client
            .get(endpoint(&self.base_url, "v3/forecast"))
            .bearer_auth(token)
            .query(&[("region", region), ("signal_type", "co2_moer")])
            .send()
            .await?)
    }
}

#[async_trait]
impl CarbonSource for WattTimeSource {
    fn name(&self) -> &'static str {
        "watttime"
    }

    async fn fetch(&self, region: &str) -> TelemetryResult<f64> {
        let token = self.token().await?;
        let mut response = self.forecast(&token, region).await?;

        // Tokens expire; log in again once.
        if response.status() == StatusCode::UNAUTHORIZED {
            *self.token.lock().await = None;
            let token = self.token().await?;
            response = self.forecast(&token, region).await?;
        }

        if !response.status().is_success() {
            return Err(TelemetryError::Status {
                context: format!("WattTime forecast for {}", region),
                status: response.status().as_u16(),
            });
        }

        let json: Value = response.json().await?;
        parse_watttime_forecast(&json)
            .ok_or_else(|| TelemetryError::Parse(format!("WattTime forecast for {}", region)))
    }
}

/// First forecast point, converted from lbs/MWh to gCO2/kWh.
fn parse_watttime_forecast(json: &Value) -> Option<f64> {
    let moer = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|point| point.get("value"))
        .and_then(|v| v.as_f64())?;
    Some((moer * LBS_PER_MWH_TO_G_PER_KWH * 10.0).round() / 10.0)
}

/// Electricity Maps latest carbon-intensity feed.
pub struct ElectricityMapSource {
    client: Client,
    base_url: Url,
    token: String,
}

impl ElectricityMapSource {
    pub fn new(base_url: Url, token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token,
        }
    }
}

#[async_trait]
impl CarbonSource for ElectricityMapSource {
    fn name(&self) -> &'static str {
        "electricitymap"
    }

    async fn fetch(&self, region: &str) -> TelemetryResult<f64> {
        let mut request = self
            .client
            .get(endpoint(&self.base_url, "v3/carbon-intensity/latest"))
            .query(&[("zone", region)]);

        if !self.token.is_empty() {
            request = request.header("auth-token", &self.token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(TelemetryError::Status {
                context: format!("ElectricityMap zone {}", region),
                status: response.status().as_u16(),
            });
        }

        let json: Value = response.json().await?;
        json.get("carbonIntensity")
            .and_then(|ci| ci.as_f64())
            .ok_or_else(|| TelemetryError::Parse(format!("ElectricityMap zone {}", region)))
    }
}
