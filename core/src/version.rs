//! Record versions for optimistic concurrency control.
//!
//! Every stored record carries a [`Version`]. A write names the version it
//! expects to replace ([`ExpectedVersion`]); the store rejects the whole write
//! set when any record has moved on in the meantime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Record version number.
///
/// Versions start at 1 for a freshly inserted record and increment by 1 on
/// every committed write.
///
/// # Examples
///
/// ```
/// use conference_core::version::Version;
///
/// let v1 = Version::FIRST;
/// assert_eq!(v1.next(), Version::new(2));
/// assert_eq!(Version::new(7).value(), 7);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version assigned to a record on insert.
    pub const FIRST: Self = Self(1);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a write expects to find in the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The record must not exist yet (insert-if-absent).
    Absent,
    /// The record must still be at exactly this version.
    Exact(Version),
}

impl ExpectedVersion {
    /// Version the record will have once the write commits.
    #[must_use]
    pub const fn next(self) -> Version {
        match self {
            Self::Absent => Version::FIRST,
            Self::Exact(version) => version.next(),
        }
    }

    /// Check an expectation against the version currently stored.
    #[must_use]
    pub fn is_satisfied_by(self, current: Option<Version>) -> bool {
        match (self, current) {
            (Self::Absent, None) => true,
            (Self::Exact(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// A value read from the store together with its version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The record
    pub value: T,
    /// Version of the record when it was read
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Pair a value with its version.
    #[must_use]
    pub const fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }

    /// Expectation to use when writing this value back.
    #[must_use]
    pub const fn expected(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.version)
    }

    /// Drop the version.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}
