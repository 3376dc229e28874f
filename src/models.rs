use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of rank-labeled gradcam slots a model response carries.
pub const GRADCAM_SLOTS: usize = 5;

/// Builds the rank-prefixed label under which the model reports per-disease
/// data for one of its top predictions, e.g. `top1_Pneumonia`.
pub fn rank_label(rank: usize, disease: &str) -> String {
    format!("top{}_{}", rank, disease)
}

/// One disease prediction with its confidence score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub disease: String,
    pub confidence: f64,
}

/// Raw response of the external diagnostic model.
///
/// Image fields hold base64 payloads, optionally prefixed with
/// `data:image/...;base64,`. The gradcam map is keyed by the rank-prefixed
/// labels of `top_5_diseases`; keys outside that closed set are ignored
/// downstream. The prediction lists and both narrative fields are required
/// and missing ones fail the decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub predicted_diseases: Vec<DiseasePrediction>,
    pub top_5_diseases: Vec<DiseasePrediction>,
    #[serde(default)]
    pub gradcam_analyses: BTreeMap<String, String>,
    #[serde(default)]
    pub attention_map: Option<String>,
    pub concise_conclusion: String,
    pub comprehensive_analysis: String,
    #[serde(default)]
    pub disease_analyses: BTreeMap<String, String>,
}

/// Persisted form of [`DiagnosticResult`]: every embedded image replaced by
/// a retrieval URL. Must never carry image bytes, so session records stay
/// small and large payloads are not duplicated into the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub predicted_diseases: Vec<DiseasePrediction>,
    pub top_5_diseases: Vec<DiseasePrediction>,
    /// Rank-prefixed label to gradcam image URL. Only labels the model
    /// answered with a non-empty payload appear here.
    pub gradcam_analyses: BTreeMap<String, String>,
    /// Attention-map image URL, empty when the model produced none.
    pub attention_map: String,
    pub concise_conclusion: String,
    pub comprehensive_analysis: String,
    pub disease_analyses: BTreeMap<String, String>,
}

/// One question/answer turn of the follow-up chat. Populated by the chat
/// flow, persisted opaquely alongside the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// One complete X-ray diagnostic encounter.
///
/// Created exactly once, after the whole pipeline succeeded; a failed run
/// leaves no session behind. Timestamps serialize as RFC 3339 strings at the
/// storage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub result: Option<StoredResult>,
    pub xray_image_url: String,
    pub chat_history: Vec<ChatExchange>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(
        id: String,
        title: String,
        xray_image_url: String,
        result: Option<StoredResult>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            result,
            xray_image_url,
            chat_history: Vec::new(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}
