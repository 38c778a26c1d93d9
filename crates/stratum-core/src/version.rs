//! Project schema version marker.
//!
//! The version is stored in `config.yaml` as a bare integer (`version: 2`).
//! Versions are totally ordered and a project only ever moves forward.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// On-disk layout version of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProjectSchemaVersion {
    /// Single source, metadata in one file.
    V1,
    /// Single source, metadata split per object type.
    V2,
    /// Migrations, seeds and metadata namespaced per data source.
    V3,
}

impl ProjectSchemaVersion {
    /// The newest layout this tooling knows how to produce.
    pub const LATEST: ProjectSchemaVersion = ProjectSchemaVersion::V3;

    /// Returns the integer written to `config.yaml`.
    pub fn as_u8(self) -> u8 {
        match self {
            ProjectSchemaVersion::V1 => 1,
            ProjectSchemaVersion::V2 => 2,
            ProjectSchemaVersion::V3 => 3,
        }
    }

    /// Returns true when moving from `self` to `target` is a forward step.
    pub fn can_upgrade_to(self, target: ProjectSchemaVersion) -> bool {
        self < target
    }
}

impl TryFrom<u8> for ProjectSchemaVersion {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ProjectSchemaVersion::V1),
            2 => Ok(ProjectSchemaVersion::V2),
            3 => Ok(ProjectSchemaVersion::V3),
            other => Err(CoreError::UnknownVersion { value: other }),
        }
    }
}

impl From<ProjectSchemaVersion> for u8 {
    fn from(version: ProjectSchemaVersion) -> Self {
        version.as_u8()
    }
}

impl fmt::Display for ProjectSchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ordered() {
        assert!(ProjectSchemaVersion::V1 < ProjectSchemaVersion::V2);
        assert!(ProjectSchemaVersion::V2 < ProjectSchemaVersion::V3);
        assert_eq!(ProjectSchemaVersion::LATEST, ProjectSchemaVersion::V3);
    }

    #[test]
    fn only_forward_moves_are_upgrades() {
        assert!(ProjectSchemaVersion::V2.can_upgrade_to(ProjectSchemaVersion::V3));
        assert!(!ProjectSchemaVersion::V3.can_upgrade_to(ProjectSchemaVersion::V3));
        assert!(!ProjectSchemaVersion::V3.can_upgrade_to(ProjectSchemaVersion::V2));
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&ProjectSchemaVersion::V2).unwrap();
        assert_eq!(json, "2");
        let parsed: ProjectSchemaVersion = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, ProjectSchemaVersion::V3);
    }

    #[test]
    fn rejects_unknown_integer() {
        let err = ProjectSchemaVersion::try_from(4).unwrap_err();
        assert!(matches!(err, CoreError::UnknownVersion { value: 4 }));
        assert!(serde_json::from_str::<ProjectSchemaVersion>("0").is_err());
    }

    #[test]
    fn display_uses_v_prefix() {
        assert_eq!(ProjectSchemaVersion::V3.to_string(), "v3");
    }

    proptest::proptest! {
        #[test]
        fn u8_round_trip_matches_try_from(value in 0u8..=10) {
            match ProjectSchemaVersion::try_from(value) {
                Ok(version) => proptest::prop_assert_eq!(version.as_u8(), value),
                Err(_) => proptest::prop_assert!(value == 0 || value > 3),
            }
        }
    }
}
