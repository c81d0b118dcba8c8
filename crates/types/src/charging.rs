use serde::{Deserialize, Serialize};

/// Online/offline charging function addresses for a registration set.
///
/// Each list is ordered primary-first. Empty lists mean the HSS supplied no
/// charging information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargingAddresses {
    pub ccfs: Vec<String>,
    pub ecfs: Vec<String>,
}

impl ChargingAddresses {
    pub fn new(ccfs: Vec<String>, ecfs: Vec<String>) -> Self {
        Self { ccfs, ecfs }
    }

    pub fn is_empty(&self) -> bool {
        self.ccfs.is_empty() && self.ecfs.is_empty()
    }

    pub fn primary_ccf(&self) -> Option<&str> {
        self.ccfs.first().map(String::as_str)
    }

    pub fn secondary_ccf(&self) -> Option<&str> {
        self.ccfs.get(1).map(String::as_str)
    }

    pub fn primary_ecf(&self) -> Option<&str> {
        self.ecfs.first().map(String::as_str)
    }

    pub fn secondary_ecf(&self) -> Option<&str> {
        self.ecfs.get(1).map(String::as_str)
    }
}
