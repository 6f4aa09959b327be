//! Heap configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::{GcError, Result};

/// Heap size used when none is configured.
pub const DEFAULT_HEAP_SIZE: usize = 1000;

/// Maximum number of simultaneously registered roots by default.
pub const DEFAULT_ROOT_CAPACITY: usize = 100;

/// Environment variable overriding [`HeapConfig::heap_size`].
pub const ENV_HEAP_SIZE: &str = "ARENA_GC_HEAP_SIZE";
/// Environment variable overriding [`HeapConfig::policy`].
pub const ENV_POLICY: &str = "ARENA_GC_POLICY";
/// Environment variable overriding [`HeapConfig::root_capacity`].
pub const ENV_ROOTS: &str = "ARENA_GC_ROOTS";

/// Reclamation discipline applied after tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Rebuild a free list from unmarked storage; first-fit with splitting.
    Sweep,
    /// Never sweep; reuse unmarked slots found by scanning the object table.
    ScanReuse,
    /// Slide live objects to the arena base and rewrite every pointer.
    #[default]
    Compact,
}

impl PolicyKind {
    /// All policies, in declaration order.
    pub const ALL: [Self; 3] = [Self::Sweep, Self::ScanReuse, Self::Compact];

    /// Stable lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sweep => "sweep",
            Self::ScanReuse => "scan-reuse",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = GcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sweep" | "mark-sweep" => Ok(Self::Sweep),
            "scan-reuse" | "scan_reuse" | "mark-not-sweep" => Ok(Self::ScanReuse),
            "compact" | "mark-compact" => Ok(Self::Compact),
            _ => Err(GcError::InvalidConfig {
                key: "policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for creating a [`Heap`](crate::Heap).
///
/// # Example
///
/// ```
/// use arena_gc::{HeapConfig, PolicyKind};
///
/// let config = HeapConfig::new()
///     .heap_size(64 * 1024)
///     .policy(PolicyKind::Sweep)
///     .root_capacity(16);
/// assert_eq!(config.policy_kind(), PolicyKind::Sweep);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    pub(crate) heap_size: usize,
    pub(crate) policy: PolicyKind,
    pub(crate) root_capacity: usize,
    pub(crate) populate: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapConfig {
    /// Defaults: 1000-byte heap, compacting policy, 100 roots.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            heap_size: DEFAULT_HEAP_SIZE,
            policy: PolicyKind::Compact,
            root_capacity: DEFAULT_ROOT_CAPACITY,
            populate: false,
        }
    }

    /// Sets the arena size in bytes. It is rounded down to the word size.
    #[must_use]
    pub const fn heap_size(mut self, size: usize) -> Self {
        self.heap_size = size;
        self
    }

    /// Sets the reclamation policy.
    #[must_use]
    pub const fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the root table capacity.
    #[must_use]
    pub const fn root_capacity(mut self, capacity: usize) -> Self {
        self.root_capacity = capacity;
        self
    }

    /// Pre-fault the arena's pages when mapping it.
    #[must_use]
    pub const fn populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    /// Configured arena size.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.heap_size
    }

    /// Configured policy.
    #[must_use]
    pub const fn policy_kind(&self) -> PolicyKind {
        self.policy
    }

    /// Configured root capacity.
    #[must_use]
    pub const fn roots(&self) -> usize {
        self.root_capacity
    }

    /// Overlay `ARENA_GC_HEAP_SIZE`, `ARENA_GC_POLICY` and `ARENA_GC_ROOTS`
    /// from the process environment onto this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] when a variable is set but cannot
    /// be parsed.
    pub fn from_env(self) -> Result<Self> {
        self.overlay(|key| std::env::var(key).ok())
    }

    pub(crate) fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_HEAP_SIZE) {
            self.heap_size = parse_usize(ENV_HEAP_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_POLICY) {
            self.policy = value.parse().map_err(|_| GcError::InvalidConfig {
                key: ENV_POLICY,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_ROOTS) {
            self.root_capacity = parse_usize(ENV_ROOTS, &value)?;
        }
        Ok(self)
    }
}

fn parse_usize(key: &'static str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| GcError::InvalidConfig {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HeapConfig::default();
        assert_eq!(config.size(), 1000);
        assert_eq!(config.policy_kind(), PolicyKind::Compact);
        assert_eq!(config.roots(), 100);
    }

    #[test]
    fn test_policy_round_trip_names() {
        for policy in PolicyKind::ALL {
            assert_eq!(policy.to_string().parse::<PolicyKind>().unwrap(), policy);
        }
        assert_eq!("Mark-Compact".parse::<PolicyKind>().unwrap(), PolicyKind::Compact);
        assert!("generational".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_overlay_from_lookup() {
        let config = HeapConfig::new()
            .overlay(|key| match key {
                ENV_HEAP_SIZE => Some("4096".into()),
                ENV_POLICY => Some("sweep".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.size(), 4096);
        assert_eq!(config.policy_kind(), PolicyKind::Sweep);
        assert_eq!(config.roots(), DEFAULT_ROOT_CAPACITY);
    }

    #[test]
    fn test_overlay_rejects_garbage() {
        let err = HeapConfig::new()
            .overlay(|key| (key == ENV_ROOTS).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, GcError::InvalidConfig { key: ENV_ROOTS, .. }));
    }
}
