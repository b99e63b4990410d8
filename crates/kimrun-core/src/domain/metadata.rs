//! Declared item metadata (`kimspec.json`).

use serde::{Deserialize, Serialize};

use super::identifier::Identifier;
use super::version::{Version, VersionConstraint};

/// Name of the metadata sidecar inside every item directory.
pub const METADATA_FILE: &str = "kimspec.json";

/// Executable started for a runner that does not name one.
pub const DEFAULT_EXECUTABLE: &str = "runner";

/// A simulator a runner can drive, optionally restricted to a version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConstraint {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionConstraint>,
}

impl SimulatorConstraint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: VersionConstraint) -> Self {
        self.version = Some(version);
        self
    }
}

/// Everything an item declares about itself. Every field is optional; an
/// empty list means "not declared".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub species: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kim_api_version: Option<VersionConstraint>,

    /// Test Driver or Model Driver this item is built on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulator_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulator_version: Option<Version>,

    /// Simulators a runner supports.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub simulators: Vec<SimulatorConstraint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    /// Files that must exist after a successful build.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
}

impl ItemMetadata {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Executable name, defaulting to `runner`.
    pub fn executable(&self) -> &str {
        self.executable.as_deref().unwrap_or(DEFAULT_EXECUTABLE)
    }

    pub fn with_species<I, S>(mut self, species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.species = species.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_driver(mut self, driver: Identifier) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_api_version(mut self, constraint: VersionConstraint) -> Self {
        self.kim_api_version = Some(constraint);
        self
    }

    pub fn with_simulator(mut self, name: impl Into<String>, version: Version) -> Self {
        self.simulator_name = Some(name.into());
        self.simulator_version = Some(version);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let meta = ItemMetadata::from_json("{}").unwrap();
        assert_eq!(meta, ItemMetadata::default());
        assert_eq!(meta.executable(), "runner");
    }

    #[test]
    fn test_full_document() {
        let json = r#"{
            "title": "Lattice constant of fcc Al",
            "species": ["Al"],
            "kim_api_version": "2.1",
            "driver": "LatticeConstant__TD_000000000001_002",
            "simulators": [{"name": "LAMMPS", "version": ">=2.0"}, {"name": "ASE"}],
            "executable": "run.sh",
            "artifacts": ["run.sh"]
        }"#;
        let meta = ItemMetadata::from_json(json).unwrap();
        assert_eq!(meta.species, vec!["Al"]);
        assert_eq!(meta.kim_api_version.as_ref().unwrap().as_str(), "2.1");
        assert_eq!(
            meta.driver.as_ref().unwrap().format(),
            "LatticeConstant__TD_000000000001_002"
        );
        assert_eq!(meta.simulators.len(), 2);
        assert!(meta.simulators[1].version.is_none());
        assert_eq!(meta.executable(), "run.sh");
    }

    #[test]
    fn test_bad_fields_are_rejected() {
        assert!(ItemMetadata::from_json(r#"{"driver": "nope"}"#).is_err());
        assert!(ItemMetadata::from_json(r#"{"kim_api_version": ">=3, <2"}"#).is_err());
        assert!(ItemMetadata::from_json(r#"{"simulator_version": "two"}"#).is_err());
    }

    #[test]
    fn test_serialize_skips_undeclared() {
        let meta = ItemMetadata::default().with_species(["Al", "Cu"]);
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"species":["Al","Cu"]}"#);
    }
}
