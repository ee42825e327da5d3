use thiserror::Error;

/// Coarse classification used by front ends to decide how (and whether) to
/// present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any I/O. Never retried.
    Validation,
    /// Network failure or non-2xx answer from the host.
    Transport,
    /// Session store read/write failure.
    Persistence,
    /// The user aborted the operation. Never shown as an error.
    Cancellation,
    /// Invalid pairing payload or pairing transition.
    Pairing,
    /// The client could not be built from its configuration.
    Config,
}

/// The primary error type for the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The credential handed to the request layer has an empty url or token.
    #[error("failed to get session data: url and token are required")]
    NoSession,
    /// A POST was issued without a body.
    #[error("can't do a post request without a body")]
    MissingBody,
    /// The pairing payload carries no `token` parameter.
    #[error("invalid token given")]
    MissingToken,
    /// The pairing payload could not be split into url and query.
    #[error("malformed pairing payload: {0}")]
    MalformedPayload(String),
    /// The request could not be sent or its answer could not be read.
    #[error("{0}")]
    Transport(String),
    /// The host answered with a non-success status.
    #[error("failed to request {status}:{reason}")]
    Status { status: u16, reason: String },
    /// The host answered 2xx but the body did not decode.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Session store failure.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// The in-flight operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
    /// A cancellable operation is already registered with the coordinator.
    #[error("another operation is already in progress")]
    OperationInProgress,
    /// The pairing state machine does not allow this step from its current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },
    /// The file save collaborator failed.
    #[error("failed to save file: {0}")]
    Save(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::NoSession | ClientError::MissingBody => ErrorKind::Validation,
            ClientError::Transport(_)
            | ClientError::Status { .. }
            | ClientError::Decode(_)
            | ClientError::Save(_) => ErrorKind::Transport,
            ClientError::Persistence(_) => ErrorKind::Persistence,
            ClientError::Cancelled => ErrorKind::Cancellation,
            ClientError::MissingToken
            | ClientError::MalformedPayload(_)
            | ClientError::OperationInProgress
            | ClientError::InvalidTransition { .. } => ErrorKind::Pairing,
            ClientError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this failure should be surfaced to the user.
    pub fn is_user_visible(&self) -> bool {
        self.kind() != ErrorKind::Cancellation
    }
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                ClientError::Persistence(format!("database error: {}", db_err.message()))
            }
            sqlx::Error::PoolTimedOut => {
                ClientError::Persistence("database connection pool timed out".to_string())
            }
            sqlx::Error::PoolClosed => ClientError::Persistence("database pool is closed".to_string()),
            _ => ClientError::Persistence(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

/// A type alias for `Result<T, ClientError>`, used throughout the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result of a cancellable operation. Cancellation is its own variant so
/// callers never have to inspect an error to tell an abort from a failure.
#[derive(Debug)]
pub enum Outcome<T, E = ClientError> {
    Completed(T),
    Cancelled,
    Failed(E),
}

impl<T, E> Outcome<T, E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Outcome::Completed(v) => Outcome::Completed(f(v)),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::Failed(e) => Outcome::Failed(e),
        }
    }

    pub fn map_err<F>(self, f: impl FnOnce(E) -> F) -> Outcome<T, F> {
        match self {
            Outcome::Completed(v) => Outcome::Completed(v),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::Failed(e) => Outcome::Failed(f(e)),
        }
    }

    /// `Ok(Some(v))` on completion, `Ok(None)` on cancellation.
    pub fn into_result(self) -> Result<Option<T>, E> {
        match self {
            Outcome::Completed(v) => Ok(Some(v)),
            Outcome::Cancelled => Ok(None),
            Outcome::Failed(e) => Err(e),
        }
    }
}
