use thiserror::Error;

/// Failures of the persistent key/value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Rejected `config set` input, kept apart from storage failures.
#[derive(Error, Debug)]
pub enum SettingError {
    #[error("unknown setting {0:?}")]
    UnknownKey(String),
    #[error("{key} must be {expected}, got {value:?}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("invalid capture URL: {0}")]
    InvalidUrl(String),
    #[error("API key rejected by server (401): {body}")]
    Unauthorized { body: String },
    #[error("server endpoint not found (404): {body}")]
    EndpointMissing { body: String },
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned a non-JSON body: {0}")]
    Decode(String),
    #[error("local storage failed: {0}")]
    Storage(#[from] StoreError),
    #[error("record lost: sync failed ({sync}) and local storage failed ({storage})")]
    RecordLost {
        sync: Box<CaptureError>,
        storage: StoreError,
    },
}

impl CaptureError {
    /// Classify a non-success HTTP status from the document endpoint.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => CaptureError::Unauthorized { body },
            404 => CaptureError::EndpointMissing { body },
            _ => CaptureError::Server { status, body },
        }
    }

    /// Remote sync failed but the record was kept locally.
    pub fn is_sync_failure(&self) -> bool {
        matches!(
            self,
            CaptureError::Unauthorized { .. }
                | CaptureError::EndpointMissing { .. }
                | CaptureError::Server { .. }
                | CaptureError::Transport(_)
                | CaptureError::Decode(_)
        )
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
