//! Contract versions and the compatibility rule between a provider and a consumer.

use std::fmt;

/// An API version number attached to a service contract or to a dependency on one.
///
/// `major` changes on every backward-incompatible change, `minor` on every
/// backward-compatible one and resets to 0 when `major` moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns true when a contract advertising `self` can serve a consumer
    /// that asked for `requested`.
    pub fn satisfies(&self, requested: Version) -> bool {
        self.major == requested.major && requested.minor <= self.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
