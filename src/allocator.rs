//! Allocation of non-conflicting ports and cache database indices.
//!
//! Both functions are pure: they only look at the set of values already taken
//! by other projects. Ports prefer the usual dev-server defaults and overflow
//! past the highest used port, while cache indices come from a small closed
//! range and fail loudly once it is exhausted.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Port handed out when nothing else is in use.
pub const DEFAULT_PORT: u16 = 3000;

/// Ports tried in order before falling back to `max(used) + 1`.
pub const PREFERRED_PORTS: [u16; 6] = [3000, 3001, 3002, 3003, 3004, 3005];

/// Inclusive range of cache database indices that may be assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheDbRange {
    pub min: u32,
    pub max: u32,
}

impl Default for CacheDbRange {
    fn default() -> Self {
        Self { min: 0, max: 999 }
    }
}

impl CacheDbRange {
    #[must_use]
    pub const fn contains(&self, index: u32) -> bool {
        index >= self.min && index <= self.max
    }
}

/// Compute the next free port given the ports already in use.
///
/// Returns [`DEFAULT_PORT`] for an empty set, otherwise the first of
/// [`PREFERRED_PORTS`] not in `used`, otherwise one past the highest used
/// port. If the highest used port is already `65535` the search wraps to the
/// lowest free port at or above [`DEFAULT_PORT`].
#[must_use]
pub fn next_port(used: &HashSet<u16>) -> u16 {
    if used.is_empty() {
        return DEFAULT_PORT;
    }

    if let Some(port) = PREFERRED_PORTS.iter().find(|p| !used.contains(p)) {
        return *port;
    }

    let highest = used.iter().copied().max().unwrap_or(DEFAULT_PORT);
    match highest.checked_add(1) {
        Some(port) => port,
        None => (DEFAULT_PORT..=u16::MAX)
            .find(|p| !used.contains(p))
            .unwrap_or(DEFAULT_PORT),
    }
}

/// Compute the lowest free cache database index inside `range`.
///
/// # Errors
///
/// Returns [`Error::CacheDbExhausted`] when every index of `range` is taken.
pub fn next_cache_db_index(used: &HashSet<u32>, range: CacheDbRange) -> Result<u32> {
    if used.is_empty() {
        return Ok(range.min);
    }

    (range.min..=range.max)
        .find(|index| !used.contains(index))
        .ok_or(Error::CacheDbExhausted {
            min: range.min,
            max: range.max,
        })
}
