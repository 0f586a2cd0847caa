//! Rendered-page cache and invalidation.
//!
//! - **Response store**: in-process cache of the public pages, keyed by page
//!   and reference day.
//! - **Trigger**: after every committed post mutation, tells each rendering
//!   target (the response store, an optional webhook) which pages are stale.

mod events;
mod keys;
mod middleware;
mod store;
mod trigger;

pub use events::EventKind;
pub use keys::{PageKey, ResponseKey};
pub use middleware::{CacheState, response_cache_layer};
pub use store::{CachedResponse, ResponseStore};
pub use trigger::InvalidationNotifier;
