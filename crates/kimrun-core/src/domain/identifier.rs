//! Item identifiers: `[name__]KK_dddddddddddd[_vvv]`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::MalformedIdentifier;
use super::kind::ItemKind;

/// Version used when an identifier omits its version block.
pub const DEFAULT_VERSION: &str = "000";

fn grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(r"^(?:([A-Za-z][A-Za-z0-9_]*)__)?([A-Z]{2})_([0-9]{12})(?:_([0-9]{3}))?$")
            .expect("identifier grammar is a valid regex")
    })
}

/// A parsed item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    name: Option<String>,
    kind: ItemKind,
    code: String,
    version: String,
}

/// Lineage key: everything but the version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lineage {
    pub name: Option<String>,
    pub kind: ItemKind,
    pub code: String,
}

impl Identifier {
    /// Parse an identifier, defaulting the version to `000`.
    pub fn parse(text: &str) -> Result<Self, MalformedIdentifier> {
        Self::parse_query(text).map(|(id, _)| id)
    }

    /// Parse an identifier and report whether the version was written
    /// explicitly.
    pub fn parse_query(text: &str) -> Result<(Self, bool), MalformedIdentifier> {
        let caps = grammar().captures(text).ok_or_else(|| {
            MalformedIdentifier::new(text, "expected [name__]KK_dddddddddddd[_vvv]")
        })?;

        let kind_code = &caps[2];
        let kind = ItemKind::from_code(kind_code).ok_or_else(|| {
            MalformedIdentifier::new(text, format!("unknown kind code '{kind_code}'"))
        })?;

        let explicit = caps.get(4).is_some();
        let id = Identifier {
            name: caps.get(1).map(|m| m.as_str().to_string()),
            kind,
            code: caps[3].to_string(),
            version: caps
                .get(4)
                .map_or(DEFAULT_VERSION, |m| m.as_str())
                .to_string(),
        };
        Ok((id, explicit))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// The 12-digit numeric code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The 3-digit version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Canonical text form, always including the version block.
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// `KK_dddddddddddd_vvv`, without the name.
    pub fn short(&self) -> String {
        format!("{}_{}_{}", self.kind.code(), self.code, self.version)
    }

    pub fn lineage(&self) -> Lineage {
        Lineage {
            name: self.name.clone(),
            kind: self.kind,
            code: self.code.clone(),
        }
    }

    /// Same name, kind, and code; versions may differ.
    pub fn same_lineage(&self, other: &Identifier) -> bool {
        self.name == other.name && self.kind == other.kind && self.code == other.code
    }

    /// Whether `self` refers to `other`, treating a missing name on `self`
    /// as a wildcard.
    pub fn refers_to(&self, other: &Identifier) -> bool {
        self.kind == other.kind
            && self.code == other.code
            && self.name.as_ref().map_or(true, |n| other.name.as_ref() == Some(n))
    }
}

/// Remove the trailing `_vvv` block from an identifier string, if present.
pub fn strip_version(text: &str) -> String {
    match grammar().captures(text).and_then(|caps| caps.get(4)) {
        // The version block is always the final `_vvv`
        Some(version) => text[..version.start() - 1].to_string(),
        None => text.to_string(),
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{name}__")?;
        }
        write!(f, "{}_{}_{}", self.kind.code(), self.code, self.version)
    }
}

impl FromStr for Identifier {
    type Err = MalformedIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = MalformedIdentifier;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Identifier::parse(&s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.format()
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.format().cmp(&other.format())
    }
}
