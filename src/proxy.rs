//! The accept loop and per-connection transaction handler.

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error_span, warn};

use crate::{
    MAX_OBJECT_SIZE, RELAY_CHUNK_SIZE,
    cache::Cache,
    error::{ServeError, TransactionError},
    parse::{RequestReader, RequestTarget},
    upstream,
};

/// Forwarding HTTP/1.0 proxy sharing one response cache across all
/// connections.
#[derive(Debug, Clone)]
pub struct Proxy {
    cache: Cache,
}

impl Proxy {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    /// The cache shared by every connection.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Accepts connections from the listener and handles each on its own
    /// task.
    ///
    /// Runs until the listener fails. Transaction failures are logged by
    /// their worker and never end the server.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServeError> {
        let cancel_token = CancellationToken::new();
        let _cancel_guard = cancel_token.clone().drop_guard();
        let mut id = 0u64;
        loop {
            let (stream, client_addr) = listener
                .accept()
                .await
                .map_err(|source| ServeError::Accept { source })?;
            let this = self.clone();
            tokio::spawn(
                cancel_token
                    .child_token()
                    .run_until_cancelled_owned(async move {
                        debug!(%client_addr, "accepted connection");
                        this.handle_client(stream).await;
                    })
                    .instrument(error_span!("conn", id)),
            );
            id += 1;
        }
    }

    /// Runs one transaction and writes an error response when one is
    /// owed. Dropping the stream closes the connection on every exit
    /// path.
    async fn handle_client(&self, mut stream: TcpStream) {
        if let Err(err) = self.try_handle(&mut stream).await {
            warn!("transaction failed: {err:#}");
            if let Some(response) = err.response() {
                if let Err(err) = response.write(&mut stream).await {
                    debug!("failed to send error response: {err:#}");
                }
            }
        }
    }

    /// One request per connection: read the request line, serve from
    /// cache, or fetch from the origin, relay, and admit.
    async fn try_handle(&self, stream: &mut TcpStream) -> Result<(), TransactionError> {
        let (read_half, mut write_half) = stream.split();
        let mut reader = RequestReader::new(read_half);

        let Some(request) = reader.read_request_line().await? else {
            // Client went away before completing a request line.
            return Ok(());
        };
        if request.method != "GET" {
            return Err(TransactionError::NotImplemented(request.method));
        }

        if let Some(lease) = self.cache.lookup(&request.target) {
            debug!(target = %request.target, size = lease.bytes().len(), "cache hit");
            write_half
                .write_all(lease.bytes())
                .await
                .map_err(TransactionError::ClientWrite)?;
            return Ok(());
        }

        let target = RequestTarget::parse(&request.target)?;
        let headers = reader.read_header_lines().await?;
        debug!(%target, "cache miss, connecting to origin");
        let mut origin = upstream::connect(&target)
            .await
            .map_err(|source| TransactionError::Connect {
                addr: target.addr(),
                source,
            })?;

        let origin_request = upstream::build_origin_request(&target, &headers);
        origin
            .write_all(origin_request.as_bytes())
            .await
            .map_err(TransactionError::OriginWrite)?;

        if let Some(bytes) = relay(&mut origin, &mut write_half).await? {
            self.cache.admit(request.target, bytes);
        }
        Ok(())
    }
}

/// Streams the origin response to the client until EOF.
///
/// Returns the complete response when it stayed within
/// [`MAX_OBJECT_SIZE`], `None` when it outgrew admission or was empty.
async fn relay(
    origin: &mut TcpStream,
    client: &mut (impl AsyncWrite + Unpin),
) -> Result<Option<Bytes>, TransactionError> {
    let mut chunk = [0u8; RELAY_CHUNK_SIZE];
    let mut buffered = BytesMut::new();
    let mut total = 0usize;
    loop {
        let n = origin
            .read(&mut chunk)
            .await
            .map_err(TransactionError::OriginRead)?;
        if n == 0 {
            break;
        }
        client
            .write_all(&chunk[..n])
            .await
            .map_err(TransactionError::ClientWrite)?;
        total += n;
        if total <= MAX_OBJECT_SIZE {
            buffered.extend_from_slice(&chunk[..n]);
        } else if !buffered.is_empty() {
            // Outgrew admission; keep relaying but stop buffering.
            buffered = BytesMut::new();
        }
    }
    debug!(total, "origin stream finished");
    if total > 0 && total <= MAX_OBJECT_SIZE {
        Ok(Some(buffered.freeze()))
    } else {
        Ok(None)
    }
}
