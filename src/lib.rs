//! A concurrent caching forward proxy for HTTP/1.0.
//!
//! Clients send absolute-URI GET requests to the proxy; responses small
//! enough to fit [`MAX_OBJECT_SIZE`] are kept in a bounded LRU cache
//! shared by every connection, so subsequent requests for the same URI
//! are served without contacting the origin.

pub mod cache;
mod error;
mod parse;
pub mod proxy;
mod respond;
mod upstream;

pub use cache::{Cache, CacheStats, Lease};
pub use error::ServeError;
pub use proxy::Proxy;

/// Largest origin response admitted to the cache, in bytes.
pub const MAX_OBJECT_SIZE: usize = 100 * 1024;
/// Total cache capacity, in bytes.
pub const MAX_CACHE_SIZE: usize = 1024 * 1024;

/// How much data to read for the client header section before the request
/// is considered invalid.
pub(crate) const HEADER_SECTION_MAX_LENGTH: usize = 8192;
/// Chunk size used when relaying the origin response.
pub(crate) const RELAY_CHUNK_SIZE: usize = 8192;
