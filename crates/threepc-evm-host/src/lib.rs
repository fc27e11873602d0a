//! A `revm::DatabaseRef` whose account, storage and code lookups are
//! lazily fetched (and cached) by acquiring locks on a shard-partitioned
//! key-value store, and the state-diff-to-shard-writes translation that
//! runs after execution.

mod account_codec;
mod finalize;
mod keys;
mod state_cache;

pub use account_codec::{decode as decode_account, encode as encode_account};
pub use finalize::state_updates;
pub use keys::{account_key, code_key, storage_key};
pub use state_cache::{acquire_write_locks, HostError, StateAccess, StateCache};
