//! Domain model: identifiers, kinds, declared metadata, items.

pub mod error;
pub mod identifier;
pub mod item;
pub mod kind;
pub mod metadata;
pub mod version;

pub use error::{MalformedIdentifier, MetadataError};
pub use identifier::{strip_version, Identifier, Lineage, DEFAULT_VERSION};
pub use item::Item;
pub use kind::ItemKind;
pub use metadata::{ItemMetadata, SimulatorConstraint, DEFAULT_EXECUTABLE, METADATA_FILE};
pub use version::{Version, VersionConstraint};
