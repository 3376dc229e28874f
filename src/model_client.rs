use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::info;

use crate::config::ModelServiceConfig;
use crate::error::{AnalysisError, Result};
use crate::models::DiagnosticResult;

/// Client boundary to the external X-ray diagnostic model.
#[async_trait]
pub trait DiagnosticModelClient: Send + Sync {
    /// Submits one image for analysis. Exactly one attempt per call; any
    /// transport error, non-2xx status, or undecodable body is reported as
    /// [`AnalysisError::UpstreamUnavailable`].
    async fn analyze(&self, image: &[u8]) -> Result<DiagnosticResult>;
}

/// HTTP implementation talking to the configured analyze endpoint.
pub struct HttpDiagnosticModelClient {
    client: reqwest::Client,
    config: ModelServiceConfig,
}

impl HttpDiagnosticModelClient {
    pub fn new(config: ModelServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AnalysisError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl DiagnosticModelClient for HttpDiagnosticModelClient {
    async fn analyze(&self, image: &[u8]) -> Result<DiagnosticResult> {
        let image_part = Part::bytes(image.to_vec())
            .file_name("xray_image.png")
            .mime_str("image/png")
            .map_err(|e| AnalysisError::UpstreamUnavailable(e.to_string()))?;

        let mut form = Form::new().part("image", image_part).text(
            "confidence_threshold",
            self.config.confidence_threshold.to_string(),
        );
        if let Some(model_path) = &self.config.model_path {
            form = form.text("model_path", model_path.clone());
        }

        info!(
            "Submitting image ({} bytes) to diagnostic model at {}",
            image.len(),
            self.config.endpoint
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalysisError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::UpstreamUnavailable(format!(
                "model request failed: {}",
                response.status()
            )));
        }

        // Fail closed: a response missing required fields must never reach
        // the persistence layer.
        let result: DiagnosticResult = response
            .json()
            .await
            .map_err(|e| AnalysisError::UpstreamUnavailable(format!("invalid model response: {e}")))?;

        info!(
            "Diagnostic model returned {} predictions",
            result.predicted_diseases.len()
        );
        Ok(result)
    }
}
