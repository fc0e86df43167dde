//! CLI command implementations.

pub mod jobs;
pub mod stats;

use anyhow::{Context, Result, bail};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Thin JSON client for the GreenHop API.
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(api_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(api_url).with_context(|| format!("invalid API URL: {}", api_url))?;
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.http.get(self.endpoint(path))).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.send(self.http.post(self.endpoint(path)).json(body)).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.http.put(self.endpoint(path))).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.http.delete(self.endpoint(path))).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;
        let status = response.status();

        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("request failed");
            bail!("{} ({})", message, status);
        }

        response.json().await.context("unexpected response body")
    }
}

pub fn validate(path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    match greenhop_config::parse_system_config(&content) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  bind:      {}", config.server.bind);
            println!("  provider:  {:?}", config.telemetry.provider);
            println!("  local:     {}", config.telemetry.local_region);
            println!("  regions:   {}", config.telemetry.regions.join(", "));
            println!(
                "  bands:     low <= {} < medium <= {} < high",
                config.policy.low_threshold, config.policy.medium_threshold
            );
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
