//! Connectivity classification types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Three-level connectivity tier, ordered by capability.
///
/// `Offline < LocalOnly < Full`: a higher tier can do everything a lower
/// tier can. `LocalOnly` models a reachable local hub/backend with no
/// wide-area uplink (e.g. a campsite LAN).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Offline,
    LocalOnly,
    Full,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Offline => write!(f, "offline"),
            Tier::LocalOnly => write!(f, "local-only"),
            Tier::Full => write!(f, "full"),
        }
    }
}

/// Result of one probe cycle. Recomputed every cycle, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub has_internet: bool,
    pub has_local_connectivity: bool,
}

impl ConnectivityStatus {
    pub fn new(has_internet: bool, has_local_connectivity: bool) -> Self {
        Self { has_internet, has_local_connectivity }
    }

    /// Derive the tier: `Full` iff internet is reachable, `LocalOnly` iff
    /// only the local backend is, otherwise `Offline`.
    pub fn tier(&self) -> Tier {
        if self.has_internet {
            Tier::Full
        } else if self.has_local_connectivity {
            Tier::LocalOnly
        } else {
            Tier::Offline
        }
    }

    /// True when anything at all is reachable.
    pub fn is_online(&self) -> bool {
        self.has_internet || self.has_local_connectivity
    }
}
