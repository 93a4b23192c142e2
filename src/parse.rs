//! Line-oriented parsing of client requests and their absolute request
//! targets.

use std::str::FromStr;

use bytes::BytesMut;
use http::Uri;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{HEADER_SECTION_MAX_LENGTH, error::TransactionError};

const DEFAULT_PORT: u16 = 80;

/// Parsed request line.
#[derive(Debug)]
pub(crate) struct RequestLine {
    /// Method token as received.
    pub(crate) method: String,
    /// Request target exactly as received; doubles as the cache key.
    pub(crate) target: String,
}

/// One client header line, kept exactly as received.
#[derive(Debug, Clone)]
pub(crate) struct HeaderLine {
    raw: String,
}

impl HeaderLine {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The header name, the part of the line before the first colon.
    pub(crate) fn name(&self) -> &str {
        self.raw.split(':').next().unwrap_or("").trim()
    }

    /// The full line as received, without the CRLF.
    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }
}

/// Buffered CRLF-line reader for the client side of a transaction.
///
/// A closed stream is never an error here: HTTP/1.0 clients may stop
/// sending at any point, and the transaction simply ends with whatever
/// arrived. Only bytes that are present but invalid are malformed.
pub(crate) struct RequestReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> RequestReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(1024),
        }
    }

    /// Reads one CRLF-terminated line, without the terminator.
    ///
    /// Returns `Ok(None)` when the stream ends before a complete line,
    /// no matter how much of one had arrived. A line that reaches
    /// `HEADER_SECTION_MAX_LENGTH` without terminating is malformed.
    async fn read_line(&mut self) -> Result<Option<String>, TransactionError> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let line = self.buf.split_to(pos + 2);
                return Ok(Some(String::from_utf8_lossy(&line[..pos]).into_owned()));
            }
            if self.buf.len() >= HEADER_SECTION_MAX_LENGTH {
                return Err(TransactionError::BadRequest(
                    "header line too long".into(),
                ));
            }
            let n = (&mut self.inner)
                .take((HEADER_SECTION_MAX_LENGTH - self.buf.len()) as u64)
                .read_buf(&mut self.buf)
                .await
                .map_err(TransactionError::ClientRead)?;
            if n == 0 {
                return Ok(None);
            }
        }
    }

    /// Reads and parses the request line.
    ///
    /// Returns `Ok(None)` when the client closes before completing one;
    /// that ends the transaction silently.
    pub(crate) async fn read_request_line(
        &mut self,
    ) -> Result<Option<RequestLine>, TransactionError> {
        match self.read_line().await? {
            None => Ok(None),
            Some(line) => parse_request_line(&line).map(Some),
        }
    }

    /// Reads header lines until the empty line or the end of the stream.
    ///
    /// A stream that ends mid-section is a graceful end: the complete
    /// lines collected so far are returned and a trailing partial line
    /// is discarded.
    pub(crate) async fn read_header_lines(
        &mut self,
    ) -> Result<Vec<HeaderLine>, TransactionError> {
        let mut headers = Vec::new();
        let mut section_len = 0usize;
        loop {
            let Some(line) = self.read_line().await? else {
                return Ok(headers);
            };
            if line.is_empty() {
                return Ok(headers);
            }
            section_len += line.len() + 2;
            if section_len > HEADER_SECTION_MAX_LENGTH {
                return Err(TransactionError::BadRequest(
                    "header section too large".into(),
                ));
            }
            headers.push(HeaderLine::new(line));
        }
    }
}

/// Splits a request line into its method, target and version tokens.
/// Only HTTP/1.0 and HTTP/1.1 are accepted.
fn parse_request_line(line: &str) -> Result<RequestLine, TransactionError> {
    let mut tokens = line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(TransactionError::BadRequest(format!(
            "invalid request line {line:?}"
        )));
    };
    if !matches!(version, "HTTP/1.0" | "HTTP/1.1") {
        return Err(TransactionError::BadRequest(format!(
            "unsupported protocol version {version:?}"
        )));
    }
    Ok(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
    })
}

/// Origin host, port and path extracted from an absolute request target.
#[derive(Debug, Clone, derive_more::Display)]
#[display("{host}:{port}")]
pub(crate) struct RequestTarget {
    /// Hostname or IP literal without scheme or port.
    pub(crate) host: String,
    /// Port number; 80 unless the target names one.
    pub(crate) port: u16,
    /// Path plus query, never empty (`/` when the target has no path).
    pub(crate) path: String,
}

impl RequestTarget {
    /// Parses an absolute-form request target such as
    /// `http://host:port/path?query`.
    pub(crate) fn parse(target: &str) -> Result<Self, TransactionError> {
        let bad_target = || TransactionError::BadTarget {
            target: target.to_string(),
        };
        let uri = Uri::from_str(target).map_err(|_| bad_target())?;
        let authority = uri.authority().ok_or_else(bad_target)?;
        let host = authority.host().to_string();
        if host.is_empty() {
            return Err(bad_target());
        }
        let port = authority.port_u16().unwrap_or(DEFAULT_PORT);
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|p| !p.is_empty())
            .unwrap_or("/")
            .to_string();
        Ok(Self { host, port, path })
    }

    /// Dial address for the origin.
    pub(crate) fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
