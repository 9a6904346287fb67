use crate::utils::error::{LaunchError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub base_url: String,
    pub health_status: String,
    pub index_content_type: String,
}

/// Post-deploy smoke check against a deployed demo service.
pub struct HealthVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HealthVerifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        crate::utils::validation::validate_url("url", base_url)?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn verify(&self) -> Result<VerifyReport> {
        let health_status = self.check_health().await?;
        let index_content_type = self.check_index().await?;

        Ok(VerifyReport {
            base_url: self.base_url.clone(),
            health_status,
            index_content_type,
        })
    }

    async fn check_health(&self) -> Result<String> {
        let url = format!("{}/health", self.base_url);
        tracing::info!("🩺 GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(self.failure(&url, format!("unexpected HTTP status {}", status)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.failure(&url, format!("response is not JSON: {}", e)))?;

        match body.get("status").and_then(|s| s.as_str()) {
            Some("healthy") => Ok("healthy".to_string()),
            Some(other) => Err(self.failure(&url, format!("service reports status '{}'", other))),
            None => Err(self.failure(&url, "response has no 'status' field".to_string())),
        }
    }

    async fn check_index(&self) -> Result<String> {
        let url = format!("{}/", self.base_url);
        tracing::info!("🌐 GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(self.failure(&url, format!("unexpected HTTP status {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.contains("html") {
            return Err(self.failure(
                &url,
                format!("expected an HTML page, got content-type '{}'", content_type),
            ));
        }

        Ok(content_type)
    }

    fn failure(&self, url: &str, message: String) -> LaunchError {
        LaunchError::HealthCheckError {
            url: url.to_string(),
            message,
        }
    }
}
