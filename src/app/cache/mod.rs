//! Content-addressed cache of downloaded video files
//!
//! The cache is a single flat directory of `<id>.<ext>` files plus an
//! in-memory index rebuilt by [`CacheStore::scan`] on startup. The store is
//! the sole mutator of the directory; eviction keeps the byte total under a
//! configurable budget by dropping the least recently accessed entries.

pub mod store;

pub use store::CacheStore;
