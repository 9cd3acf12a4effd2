//! Counsel cache crate - advisory TTL key-value cache.
//!
//! The cache is a side-channel, never a correctness dependency: every
//! caller must behave identically if it is absent or failing. The
//! `CacheStore` trait keeps the backing store swappable (the in-memory
//! implementation here, or an external store in deployment).

pub mod key;
pub mod store;

pub use key::{ai_response_key, conversation_key, translation_key, user_key};
pub use store::{CacheError, CacheStore, MemoryCache};
