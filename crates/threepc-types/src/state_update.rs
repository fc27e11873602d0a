use crate::key::{Key, Value};
use std::collections::HashMap;

/// A set of `{key -> value}` produced by a runner. Not visible to other
/// tickets until the owning shard commits it.
pub type StateUpdates = HashMap<Key, Value>;
