use thiserror::Error;

/// Top-level application error.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Completion capability errors ─────────────────────────────────────────
    #[error("Completion service unavailable at {host}")]
    CompletionUnavailable { host: String },

    #[error("Model '{model_name}' not found")]
    ModelNotFound { model_name: String },

    #[error("Inference error: {message}")]
    InferenceError { message: String },

    #[error("Completion timed out after {seconds}s")]
    CompletionTimeout { seconds: u64 },

    #[error("Failed to build completion client: {message}")]
    ClientBuild { message: String },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    #[error("Unsupported attachment '{filename}' ({content_type}); allowed: png, jpg, jpeg, mp3, wav")]
    UnsupportedAttachment { filename: String, content_type: String },

    #[error("Malformed upload: {message}")]
    MalformedUpload { message: String },

    #[error("Attachment too large: {actual_bytes} bytes exceeds maximum of {max_bytes} bytes")]
    AttachmentTooLarge { max_bytes: usize, actual_bytes: usize },

    #[error("Upload exceeds maximum of {max_bytes} bytes")]
    UploadTooLarge { max_bytes: usize },

    // ── Session errors ───────────────────────────────────────────────────────
    #[error("Session '{id}' not found")]
    SessionNotFound { id: String },

    #[error("Session '{id}' is still waiting for a reply")]
    SessionBusy { id: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn session_not_found(id: impl Into<String>) -> Self {
        AppError::SessionNotFound { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::SessionNotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::EmptyField { .. }
                | AppError::FieldTooLong { .. }
                | AppError::UnsupportedAttachment { .. }
                | AppError::MalformedUpload { .. }
        )
    }

    pub fn is_too_large(&self) -> bool {
        matches!(self, AppError::AttachmentTooLarge { .. } | AppError::UploadTooLarge { .. })
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, AppError::SessionBusy { .. })
    }

    /// Failures of the completion round trip. A send recovers these into an
    /// assistant message; anywhere else they surface as a gateway error.
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            AppError::CompletionUnavailable { .. }
                | AppError::ModelNotFound { .. }
                | AppError::InferenceError { .. }
                | AppError::CompletionTimeout { .. }
                | AppError::ClientBuild { .. }
        )
    }
}
