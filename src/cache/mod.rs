//! Cache module for calendar event windows
//!
//! Events are cached per query window in a pluggable key-value store with a
//! time-to-live. Fresh entries are served immediately and revalidated in the
//! background; absent or stale ones are fetched before returning.

mod clock;
mod entry;
mod revalidating;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{is_fresh, CacheEntry, CacheKey, CALENDAR_EVENTS_RESOURCE};
pub use revalidating::{
    CacheConfig, LoadOptions, Loaded, Origin, RevalidatingCache, WritePolicy, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_TTL,
};
pub use store::{read_entry, write_entry, FileStore, KeyValueStore, MemoryStore};
