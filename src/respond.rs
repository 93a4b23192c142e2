//! Client-facing HTTP/1.0 error responses.

use http::StatusCode;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

/// Upper bound on a rendered error body.
const MAX_ERROR_BODY: usize = 8192;

/// An HTTP/1.0 error response with a small HTML body.
#[derive(Debug)]
pub(crate) struct ErrorResponse {
    status: StatusCode,
    detail: String,
}

impl ErrorResponse {
    pub(crate) fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn reason(&self) -> &str {
        self.status.canonical_reason().unwrap_or("Error")
    }

    fn body(&self) -> String {
        format!(
            "<!DOCTYPE html>\r\n\
             <html>\r\n\
             <head><title>Proxy Error</title></head>\r\n\
             <body>\r\n\
             <h1>{code}: {reason}</h1>\r\n\
             <p>{detail}</p>\r\n\
             <hr /><em>memo-proxy</em>\r\n\
             </body></html>\r\n",
            code = self.status.as_u16(),
            reason = self.reason(),
            detail = self.detail,
        )
    }

    /// Writes the status line, headers and body to `writer`.
    ///
    /// A body that would exceed the bound writes nothing at all.
    pub(crate) async fn write(&self, writer: &mut (impl AsyncWrite + Unpin)) -> io::Result<()> {
        let body = self.body();
        if body.len() > MAX_ERROR_BODY {
            return Ok(());
        }
        let head = format!(
            "HTTP/1.0 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n",
            self.status.as_u16(),
            self.reason(),
            body.len(),
        );
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(body.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(response: &ErrorResponse) -> String {
        let mut out = Vec::new();
        response.write(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn renders_status_line_and_parameters() {
        let response = ErrorResponse::new(StatusCode::NOT_IMPLEMENTED, "no such method");
        let text = render(&response).await;

        assert!(text.starts_with("HTTP/1.0 501 Not Implemented\r\n"));
        assert!(text.contains("Content-Type: text/html\r\n"));
        assert!(text.contains("501"));
        assert!(text.contains("no such method"));
    }

    #[tokio::test]
    async fn content_length_matches_the_body() {
        let response = ErrorResponse::new(StatusCode::BAD_REQUEST, "bad line");
        let text = render(&response).await;

        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        let length: usize = head
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(length, body.len());
    }

    #[tokio::test]
    async fn oversized_body_writes_nothing() {
        let response = ErrorResponse::new(StatusCode::BAD_REQUEST, "x".repeat(MAX_ERROR_BODY));
        let mut out = Vec::new();
        response.write(&mut out).await.unwrap();
        assert!(out.is_empty());
    }
}
