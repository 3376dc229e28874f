use thiserror::Error;

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failures the analysis pipeline can surface to its caller.
///
/// Every variant is fatal to the invocation that produced it: the pipeline
/// never partially succeeds silently, and no retries happen at this layer.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The diagnostic model could not be reached or returned an invalid or
    /// empty response. Nothing has been written anywhere.
    #[error("diagnostic model unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An image upload to the object store failed. Artifacts uploaded
    /// earlier in the same attempt are left in place.
    #[error("artifact upload failed: {0}")]
    ArtifactPersistence(String),

    /// The session record write failed, or the read-back after a reported
    /// successful write came back empty. The caller must assume no session
    /// exists.
    #[error("session record persistence failed: {0}")]
    RecordPersistence(String),

    /// Rejected at the core boundary before any external call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing or unparseable configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}
