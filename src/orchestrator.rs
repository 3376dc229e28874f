use std::collections::BTreeMap;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::info;
use uuid::Uuid;

use crate::error::{AnalysisError, Result};
use crate::model_client::DiagnosticModelClient;
use crate::models::{ChatSession, DiagnosticResult, GRADCAM_SLOTS, StoredResult, rank_label};
use crate::object_store::ObjectStoreGateway;
use crate::repository::SessionRepository;

/// Storage key for the originally uploaded X-ray.
pub fn xray_image_key(session_id: &str) -> String {
    format!("{session_id}/xray_image.png")
}

/// Storage key for one rank-labeled gradcam overlay.
pub fn gradcam_key(session_id: &str, label: &str) -> String {
    format!("{session_id}/gradcam/{label}.png")
}

/// Storage key for the attention-map visualization.
pub fn attention_map_key(session_id: &str) -> String {
    format!("{session_id}/attention_map.png")
}

/// Decodes a base64 image payload, stripping a `data:image/...;base64,`
/// prefix when present. Malformed payloads mean the model response was
/// invalid.
fn decode_image_payload(payload: &str) -> Result<Vec<u8>> {
    let encoded = match payload.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };

    STANDARD.decode(encoded.trim()).map_err(|e| {
        AnalysisError::UpstreamUnavailable(format!("invalid base64 image payload: {e}"))
    })
}

/// Coordinates one full analysis pipeline: model call, artifact uploads,
/// session write, confirming read-back.
///
/// Writes happen upload-first, persist-last. A failed database write can
/// leave orphaned blobs behind (cheap, harmless); a session record
/// referencing missing blobs would be worse.
pub struct AnalysisOrchestrator {
    model_client: Arc<dyn DiagnosticModelClient>,
    object_store: Arc<dyn ObjectStoreGateway>,
    sessions: Arc<dyn SessionRepository>,
}

impl AnalysisOrchestrator {
    pub fn new(
        model_client: Arc<dyn DiagnosticModelClient>,
        object_store: Arc<dyn ObjectStoreGateway>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            model_client,
            object_store,
            sessions,
        }
    }

    /// Turns one uploaded image into one persisted, fully-dereferenced
    /// session, or fails explicitly. A half-written session is never
    /// produced: every fatal condition aborts before the record write, and
    /// the returned copy is the one read back from the repository.
    pub async fn analyze_image(&self, title: &str, image: &[u8]) -> Result<ChatSession> {
        if title.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("title is required".to_string()));
        }
        if image.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "image buffer is empty".to_string(),
            ));
        }

        // Only a storage-key namespace and a primary key; 128 random bits
        // make an existence check unnecessary.
        let session_id = Uuid::new_v4().to_string();
        info!("Starting analysis pipeline for session {}", session_id);

        // All-or-nothing gate: nothing is uploaded or persisted unless the
        // model produced a complete result.
        let diagnostic = self.model_client.analyze(image).await?;

        let xray_image_url = self
            .object_store
            .put(&xray_image_key(&session_id), image.to_vec(), "image/png")
            .await?;

        let result = self.upload_result_images(&session_id, &diagnostic).await?;

        let session = ChatSession::new(
            session_id.clone(),
            title.to_string(),
            xray_image_url,
            Some(result),
        );
        self.sessions.create(session).await?;

        // A write the store's SDK silently swallowed must not be reported
        // as success, so return the server-confirmed copy.
        let confirmed = self
            .sessions
            .find_by_id(&session_id)
            .await?
            .ok_or_else(|| {
                AnalysisError::RecordPersistence(format!(
                    "session {session_id} missing after reported-successful write"
                ))
            })?;

        info!("Analysis pipeline completed for session {}", session_id);
        Ok(confirmed)
    }

    /// Uploads every embedded image of the model response and assembles the
    /// URL-only stored form. Prediction lists and narrative text are copied
    /// verbatim.
    async fn upload_result_images(
        &self,
        session_id: &str,
        diagnostic: &DiagnosticResult,
    ) -> Result<StoredResult> {
        let mut gradcam_urls = BTreeMap::new();

        // The key set is closed: the five expected labels are derived from
        // the top-5 list, never read open-endedly from the response map.
        for (idx, prediction) in diagnostic
            .top_5_diseases
            .iter()
            .take(GRADCAM_SLOTS)
            .enumerate()
        {
            let label = rank_label(idx + 1, &prediction.disease);
            let Some(payload) = diagnostic
                .gradcam_analyses
                .get(&label)
                .filter(|payload| !payload.is_empty())
            else {
                // Absent or empty slot: omitted from the output, not an error.
                continue;
            };

            let bytes = decode_image_payload(payload)?;
            let url = self
                .object_store
                .put(&gradcam_key(session_id, &label), bytes, "image/png")
                .await?;
            gradcam_urls.insert(label, url);
        }

        let attention_map = match diagnostic.attention_map.as_deref() {
            Some(payload) if !payload.is_empty() => {
                let bytes = decode_image_payload(payload)?;
                self.object_store
                    .put(&attention_map_key(session_id), bytes, "image/png")
                    .await?
            }
            _ => String::new(),
        };

        info!(
            "Uploaded {} gradcam images for session {}",
            gradcam_urls.len(),
            session_id
        );

        Ok(StoredResult {
            predicted_diseases: diagnostic.predicted_diseases.clone(),
            top_5_diseases: diagnostic.top_5_diseases.clone(),
            gradcam_analyses: gradcam_urls,
            attention_map,
            concise_conclusion: diagnostic.concise_conclusion.clone(),
            comprehensive_analysis: diagnostic.comprehensive_analysis.clone(),
            disease_analyses: diagnostic.disease_analyses.clone(),
        })
    }
}
