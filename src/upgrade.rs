//! Block major version upgrade schedule

use crate::constants::{BLOCK_MAJOR_VERSION_1, BLOCK_MAJOR_VERSION_2, BLOCK_MAJOR_VERSION_3};
use crate::types::BlockHeight;
use serde::{Deserialize, Serialize};

/// Upgrade-policy collaborator
pub trait UpgradePolicy {
    /// Major version every block at `height` must carry
    fn active_major_version(&self, height: BlockHeight) -> u8;

    /// Last height of the version preceding `version`, `None` when the
    /// upgrade is not scheduled
    fn upgrade_height(&self, version: u8) -> Option<BlockHeight>;
}

/// Fixed schedule: version N becomes mandatory on the block after its
/// upgrade height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpgradeSchedule {
    pub upgrade_height_v2: Option<BlockHeight>,
    pub upgrade_height_v3: Option<BlockHeight>,
}

impl UpgradeSchedule {
    /// Version 1 forever
    pub fn v1_only() -> Self {
        Self::default()
    }

    /// Version 2 from height 1 on, genesis stays version 1
    pub fn v2_from_start() -> Self {
        UpgradeSchedule { upgrade_height_v2: Some(0), upgrade_height_v3: None }
    }

    /// Version 3 from height 1 on
    pub fn v3_from_start() -> Self {
        UpgradeSchedule { upgrade_height_v2: Some(0), upgrade_height_v3: Some(0) }
    }
}

impl UpgradePolicy for UpgradeSchedule {
    fn active_major_version(&self, height: BlockHeight) -> u8 {
        match (self.upgrade_height_v3, self.upgrade_height_v2) {
            (Some(v3), _) if height > v3 => BLOCK_MAJOR_VERSION_3,
            (_, Some(v2)) if height > v2 => BLOCK_MAJOR_VERSION_2,
            _ => BLOCK_MAJOR_VERSION_1,
        }
    }

    fn upgrade_height(&self, version: u8) -> Option<BlockHeight> {
        match version {
            BLOCK_MAJOR_VERSION_2 => self.upgrade_height_v2,
            BLOCK_MAJOR_VERSION_3 => self.upgrade_height_v3,
            _ => None,
        }
    }
}
