use serde::{Deserialize, Serialize};

/// Lock mode requested on a key: shared `Read` or exclusive `Write`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum LockMode {
    Read,
    Write,
}

impl LockMode {
    pub fn is_write(&self) -> bool {
        matches!(self, LockMode::Write)
    }

    /// Two requested modes on the same key are compatible (can be granted
    /// concurrently) iff neither is a write.
    pub fn compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Read, LockMode::Read))
    }
}
