use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use crate::error::{AnalysisError, Result};
use crate::models::ChatSession;

/// Persistence boundary for chat sessions.
///
/// Lookup failure and not-found are distinct outcomes: `find_by_id` returns
/// `Ok(None)` for an unknown id and `Err` only when the lookup itself
/// failed.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persists the full record in one write.
    async fn create(&self, session: ChatSession) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<ChatSession>>;
}

/// In-memory implementation of SessionRepository
pub struct InMemorySessionRepository {
    sessions: Arc<DashMap<String, ChatSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: ChatSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ChatSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }
}

/// PostgreSQL implementation of SessionRepository.
///
/// Each session is one JSONB record; timestamps inside it are RFC 3339
/// strings, so records stay portable across storage backends.
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| AnalysisError::RecordPersistence(format!("connect failed: {e}")))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                record JSONB NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| AnalysisError::RecordPersistence(format!("migration failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool, for callers that manage their own.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create(&self, session: ChatSession) -> Result<()> {
        let record = serde_json::to_value(&session)
            .map_err(|e| AnalysisError::RecordPersistence(e.to_string()))?;

        sqlx::query("INSERT INTO chat_sessions (id, record) VALUES ($1, $2)")
            .bind(&session.id)
            .bind(record)
            .execute(&self.pool)
            .await
            .map_err(|e| AnalysisError::RecordPersistence(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ChatSession>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT record FROM chat_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AnalysisError::RecordPersistence(e.to_string()))?;

        match row {
            Some((record,)) => {
                let session = serde_json::from_value(record)
                    .map_err(|e| AnalysisError::RecordPersistence(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiseasePrediction, StoredResult};
    use std::collections::BTreeMap;

    fn sample_session(id: &str) -> ChatSession {
        let mut gradcam_analyses = BTreeMap::new();
        for (rank, disease) in ["Pneumonia", "Cardiomegaly", "Edema", "Atelectasis", "Effusion"]
            .iter()
            .enumerate()
        {
            gradcam_analyses.insert(
                format!("top{}_{}", rank + 1, disease),
                format!("https://cdn.example.com/{id}/gradcam/top{}_{}.png", rank + 1, disease),
            );
        }

        let result = StoredResult {
            predicted_diseases: vec![DiseasePrediction {
                disease: "Pneumonia".to_string(),
                confidence: 0.81,
            }],
            top_5_diseases: vec![DiseasePrediction {
                disease: "Pneumonia".to_string(),
                confidence: 0.81,
            }],
            gradcam_analyses,
            attention_map: format!("https://cdn.example.com/{id}/attention_map.png"),
            concise_conclusion: "Findings consistent with pneumonia.".to_string(),
            comprehensive_analysis: "Right lower lobe consolidation.".to_string(),
            disease_analyses: BTreeMap::new(),
        };

        ChatSession::new(
            id.to_string(),
            "Case 1".to_string(),
            format!("https://cdn.example.com/{id}/xray_image.png"),
            Some(result),
        )
    }

    #[tokio::test]
    async fn in_memory_round_trip_preserves_record() {
        let repo = InMemorySessionRepository::new();
        let session = sample_session("session1");

        repo.create(session.clone()).await.unwrap();

        let found = repo.find_by_id("session1").await.unwrap().unwrap();
        assert_eq!(found, session);
    }

    #[tokio::test]
    async fn unknown_id_is_none_not_error() {
        let repo = InMemorySessionRepository::new();
        assert!(repo.find_by_id("nope").await.unwrap().is_none());
    }

    /// Round-trip against a real database.
    /// Usage: DATABASE_URL=postgres://... cargo test postgres_round_trip
    #[tokio::test]
    async fn postgres_round_trip() -> anyhow::Result<()> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping test - set DATABASE_URL environment variable");
                return Ok(());
            }
        };

        let repo = PostgresSessionRepository::connect(&database_url).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let session = sample_session(&id);

        repo.create(session.clone()).await?;

        let found = repo
            .find_by_id(&id)
            .await?
            .expect("created session must be readable");
        assert_eq!(found.result, session.result);
        assert_eq!(found.xray_image_url, session.xray_image_url);
        Ok(())
    }
}
