//! Host version and capability resolution for one extension load.

use rusqlite::functions::FunctionFlags;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// SQLite library version as a `major.minor.patch` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl HostVersion {
    /// Oldest host this extension registers against.
    pub const MINIMUM: HostVersion = HostVersion::new(3, 8, 7);
    /// First host release that defines `SQLITE_DETERMINISTIC`.
    pub const DETERMINISTIC_FLAG: HostVersion = HostVersion::new(3, 8, 3);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Decodes the `SQLITE_VERSION_NUMBER` form, e.g. `3008007` -> `3.8.7`.
    ///
    /// Negative input decodes to `0.0.0`.
    pub fn from_number(number: i32) -> Self {
        let number = u32::try_from(number).unwrap_or(0);
        Self::new(number / 1_000_000, (number / 1_000) % 1_000, number % 1_000)
    }

    /// Encodes back into the `SQLITE_VERSION_NUMBER` form.
    pub fn number(self) -> i64 {
        i64::from(self.major) * 1_000_000 + i64::from(self.minor) * 1_000 + i64::from(self.patch)
    }
}

impl Display for HostVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Optional features resolved once per load.
///
/// Build features decide what this library can serve; the host version
/// decides what the host can accept. Nothing here changes after load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub host_version: HostVersion,
    pub min_host_version: HostVersion,
    pub supports_deterministic_flag: bool,
    pub supports_serialize: bool,
    pub supports_union_arity2: bool,
}

impl CapabilitySet {
    /// Capabilities of this build against a host reporting `host_version`.
    pub fn for_host(host_version: HostVersion) -> Self {
        Self {
            host_version,
            min_host_version: HostVersion::MINIMUM,
            supports_deterministic_flag: host_version >= HostVersion::DETERMINISTIC_FLAG,
            supports_serialize: cfg!(feature = "serialize"),
            supports_union_arity2: cfg!(feature = "union-pairwise"),
        }
    }

    /// Whether the host meets the minimum version (inclusive).
    pub fn is_host_compatible(&self) -> bool {
        self.host_version >= self.min_host_version
    }

    /// Flags attached to every registration.
    pub fn function_flags(&self) -> FunctionFlags {
        if self.supports_deterministic_flag {
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC
        } else {
            FunctionFlags::SQLITE_UTF8
        }
    }
}
