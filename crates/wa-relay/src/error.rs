//! Relay errors.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised by the relay outside of the backend call path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("invalid config '{0}'")]
    InvalidConfig(SmolStr),

    /// Credential directory error.
    #[error("credential store error '{0}'")]
    Credentials(SmolStr),

    /// Messaging transport error.
    #[error("transport error '{0}'")]
    Transport(SmolStr),

    /// Pairing code could not be rendered.
    #[error("pairing render error '{0}'")]
    Pairing(SmolStr),

    /// Status page server error.
    #[error("web error '{0}'")]
    Web(SmolStr),
}
