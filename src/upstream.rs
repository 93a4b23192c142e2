//! Origin-side request translation and connection.

use tokio::net::TcpStream;

use crate::parse::{HeaderLine, RequestTarget};

const USER_AGENT: &str = "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:3.10.0) \
                          Gecko/20191101 Firefox/63.0.1\r\n";
const CONNECTION_CLOSE: &str = "Connection: close\r\n";
const PROXY_CONNECTION_CLOSE: &str = "Proxy-Connection: close\r\n";

/// Client header names replaced by the fixed headers above. Matched as
/// case-sensitive substrings of the header name.
const FILTERED_HEADERS: [&str; 4] = ["Host", "Connection", "Proxy-Connection", "User-Agent"];

/// Opens the TCP connection to the origin, resolving DNS as needed.
pub(crate) async fn connect(target: &RequestTarget) -> std::io::Result<TcpStream> {
    TcpStream::connect(target.addr()).await
}

/// Builds the HTTP/1.0 request forwarded to the origin.
///
/// The request line carries only the path-and-query component. A client
/// supplied `Host` header is forwarded verbatim, otherwise one is
/// synthesised from the target hostname. `Connection`,
/// `Proxy-Connection` and `User-Agent` are always replaced with fixed
/// values; all remaining client header lines pass through verbatim, in
/// order.
pub(crate) fn build_origin_request(target: &RequestTarget, headers: &[HeaderLine]) -> String {
    let mut out = format!("GET {} HTTP/1.0\r\n", target.path);
    match headers.iter().find(|h| h.name() == "Host") {
        Some(host) => {
            out.push_str(host.raw());
            out.push_str("\r\n");
        }
        None => {
            out.push_str(&format!("Host: {}\r\n", target.host));
        }
    }
    out.push_str(CONNECTION_CLOSE);
    out.push_str(PROXY_CONNECTION_CLOSE);
    out.push_str(USER_AGENT);
    for line in headers {
        if FILTERED_HEADERS.iter().any(|key| line.name().contains(key)) {
            continue;
        }
        out.push_str(line.raw());
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out
}
