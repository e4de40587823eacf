use std::io;

/// Client-local failure. Remote failures are not errors in this sense —
/// they arrive as an ordinary [`crate::status::Status`] attached to a
/// successfully-decoded response; see [`crate::status`].
#[derive(Debug, thiserror::Error)]
pub enum KineticError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("session is poisoned after a fatal transport error")]
    Poisoned,

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("tls error: {0}")]
    Tls(String),

    #[error("hmac verification failed on an inbound response")]
    HmacVerification,

    #[error("session was closed by the caller")]
    Shutdown,
}

impl KineticError {
    /// An approximate clone good enough for fanning one fatal cause out to
    /// every waiter in the pending table: `io::Error` isn't `Clone`, so its
    /// kind and message survive but the platform-specific payload doesn't.
    pub fn cheap_clone(&self) -> Self {
        match self {
            KineticError::Io(e) => KineticError::Io(io::Error::new(e.kind(), e.to_string())),
            KineticError::Protocol(s) => KineticError::Protocol(s.clone()),
            KineticError::Internal(s) => KineticError::Internal(s.clone()),
            KineticError::Poisoned => KineticError::Poisoned,
            KineticError::Timeout => KineticError::Timeout,
            KineticError::Tls(s) => KineticError::Tls(s.clone()),
            KineticError::HmacVerification => KineticError::HmacVerification,
            KineticError::Shutdown => KineticError::Shutdown,
        }
    }
}

pub type Result<T> = std::result::Result<T, KineticError>;
