use std::time::Duration;

use crate::error::{AnalysisError, Result};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for the external diagnostic model service.
///
/// Constructed explicitly and handed to [`HttpDiagnosticModelClient`];
/// nothing in this crate reads process-wide state at call time, so tests can
/// point a client at a fake endpoint.
///
/// [`HttpDiagnosticModelClient`]: crate::model_client::HttpDiagnosticModelClient
#[derive(Debug, Clone)]
pub struct ModelServiceConfig {
    /// Full URL of the model's analyze endpoint.
    pub endpoint: String,
    /// Sent as the `confidence_threshold` multipart field.
    pub confidence_threshold: f32,
    /// Optional model checkpoint override, sent as `model_path` when set.
    pub model_path: Option<String>,
    /// Hard bound on the model call; a timeout is reported the same way as
    /// any other model failure.
    pub request_timeout: Duration,
}

impl ModelServiceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            model_path: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Reads settings from the environment. `XRAY_MODEL_ENDPOINT` is
    /// required; `XRAY_CONFIDENCE_THRESHOLD`, `XRAY_MODEL_PATH` and
    /// `XRAY_MODEL_TIMEOUT_SECS` override the defaults when present.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("XRAY_MODEL_ENDPOINT")
            .map_err(|_| AnalysisError::Config("XRAY_MODEL_ENDPOINT not set".to_string()))?;

        let mut config = Self::new(endpoint);

        if let Ok(raw) = std::env::var("XRAY_CONFIDENCE_THRESHOLD") {
            config.confidence_threshold = raw.parse().map_err(|_| {
                AnalysisError::Config(format!("invalid XRAY_CONFIDENCE_THRESHOLD: {raw}"))
            })?;
        }

        if let Ok(model_path) = std::env::var("XRAY_MODEL_PATH") {
            config.model_path = Some(model_path);
        }

        if let Ok(raw) = std::env::var("XRAY_MODEL_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                AnalysisError::Config(format!("invalid XRAY_MODEL_TIMEOUT_SECS: {raw}"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
