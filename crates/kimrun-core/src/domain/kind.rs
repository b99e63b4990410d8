//! Item kinds.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of item kinds stored in a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Test,
    TestDriver,
    Model,
    ModelDriver,
    SimulatorModel,
    VerificationCheck,
    ReferenceData,
}

impl ItemKind {
    pub const ALL: [ItemKind; 7] = [
        ItemKind::Test,
        ItemKind::TestDriver,
        ItemKind::Model,
        ItemKind::ModelDriver,
        ItemKind::SimulatorModel,
        ItemKind::VerificationCheck,
        ItemKind::ReferenceData,
    ];

    /// Two-letter code used inside identifiers.
    pub fn code(&self) -> &'static str {
        match self {
            ItemKind::Test => "TE",
            ItemKind::TestDriver => "TD",
            ItemKind::Model => "MO",
            ItemKind::ModelDriver => "MD",
            ItemKind::SimulatorModel => "SM",
            ItemKind::VerificationCheck => "VC",
            ItemKind::ReferenceData => "RD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        ItemKind::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Storage area (directory under the repository root) for this kind.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            ItemKind::Test => "tests",
            ItemKind::TestDriver => "test-drivers",
            ItemKind::Model => "models",
            ItemKind::ModelDriver => "model-drivers",
            ItemKind::SimulatorModel => "simulator-models",
            ItemKind::VerificationCheck => "verification-checks",
            ItemKind::ReferenceData => "reference-data",
        }
    }

    /// Tests and Verification Checks.
    pub fn is_runner(&self) -> bool {
        matches!(self, ItemKind::Test | ItemKind::VerificationCheck)
    }

    /// Models and Simulator Models.
    pub fn is_subject(&self) -> bool {
        matches!(self, ItemKind::Model | ItemKind::SimulatorModel)
    }

    /// Kind of driver an item of this kind may declare.
    pub fn driver_kind(&self) -> Option<ItemKind> {
        match self {
            ItemKind::Test | ItemKind::VerificationCheck => Some(ItemKind::TestDriver),
            ItemKind::Model => Some(ItemKind::ModelDriver),
            ItemKind::TestDriver
            | ItemKind::ModelDriver
            | ItemKind::SimulatorModel
            | ItemKind::ReferenceData => None,
        }
    }

    /// Kinds an item of this kind can be paired with.
    pub fn counterparts(&self) -> &'static [ItemKind] {
        match self {
            ItemKind::Test | ItemKind::VerificationCheck => {
                &[ItemKind::Model, ItemKind::SimulatorModel]
            }
            ItemKind::Model | ItemKind::SimulatorModel => {
                &[ItemKind::Test, ItemKind::VerificationCheck]
            }
            ItemKind::TestDriver | ItemKind::ModelDriver | ItemKind::ReferenceData => &[],
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Test => "test",
            ItemKind::TestDriver => "test-driver",
            ItemKind::Model => "model",
            ItemKind::ModelDriver => "model-driver",
            ItemKind::SimulatorModel => "simulator-model",
            ItemKind::VerificationCheck => "verification-check",
            ItemKind::ReferenceData => "reference-data",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    /// Accepts the kind name (`test`), its plural storage area (`tests`),
    /// or its two-letter code (`TE`, case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ItemKind::ALL
            .into_iter()
            .find(|kind| {
                kind.name() == lowered
                    || kind.storage_dir() == lowered
                    || kind.code().eq_ignore_ascii_case(&lowered)
            })
            .ok_or_else(|| format!("unknown item kind: {s}"))
    }
}
