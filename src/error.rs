use std::io;

use http::StatusCode;
use thiserror::Error;

use crate::respond::ErrorResponse;

/// Fatal server-level failures. Per-connection failures never surface
/// here; they end the transaction and are logged by its worker.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Failed to accept an incoming TCP connection.
    #[error("failed to accept tcp connection")]
    Accept {
        #[source]
        source: io::Error,
    },
}

/// Everything that can end one client transaction early.
#[derive(Debug, Error)]
pub(crate) enum TransactionError {
    #[error("failed to read request from client")]
    ClientRead(#[source] io::Error),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("method {0} is not implemented")]
    NotImplemented(String),

    #[error("invalid request target {target:?}")]
    BadTarget { target: String },

    #[error("failed to connect to origin {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to forward request to origin")]
    OriginWrite(#[source] io::Error),

    #[error("origin read failed mid-stream")]
    OriginRead(#[source] io::Error),

    #[error("client write failed")]
    ClientWrite(#[source] io::Error),
}

impl TransactionError {
    /// The response owed to the client, for the failures that are
    /// client-visible. Everything else closes the connection silently.
    pub(crate) fn response(&self) -> Option<ErrorResponse> {
        match self {
            Self::BadRequest(_) => Some(ErrorResponse::new(
                StatusCode::BAD_REQUEST,
                "Proxy received a malformed request",
            )),
            Self::NotImplemented(_) => Some(ErrorResponse::new(
                StatusCode::NOT_IMPLEMENTED,
                "Proxy does not implement this method",
            )),
            _ => None,
        }
    }
}
