//! Hierarchical address selection
//!
//! Keeps the four linked levels (region → province → municipality →
//! barangay) of each address group consistent with the remote directory.
//!
//! - [`selection`] - the per-group value types and the structural path
//! - [`cascade`] - one controller per group: change → fetch → apply
//! - [`mirror`] - "same as" copies between groups
//! - [`preload`] - rebuild a selection from a stored barangay id
//! - [`form`] - the three groups of an application form together

pub mod cascade;
pub mod form;
pub mod mirror;
pub mod preload;
pub mod selection;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use cascade::{CascadeController, ChildList, FetchOutcome, PendingFetch};
pub use form::{AddressForm, MirrorFlags};
pub use mirror::{addresses_match, set_mirror};
pub use preload::{preload_group, reconstruct_mirror_flags, resolve_chain, ResolvedChain};
pub use selection::{AddressPath, AddressSelection, CascadeState, Choice, DirectoryCache, StreetDetails};

/// One of the three independent address contexts of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressGroup {
    /// Taxpayer (payer) address
    Taxpayer,
    /// Business main office
    MainOffice,
    /// Business location
    BusinessLocation,
}

impl AddressGroup {
    pub const ALL: [AddressGroup; 3] = [
        AddressGroup::Taxpayer,
        AddressGroup::MainOffice,
        AddressGroup::BusinessLocation,
    ];

    /// Heading used in user-facing prompts
    pub fn title(self) -> &'static str {
        match self {
            Self::Taxpayer => "Taxpayer Address",
            Self::MainOffice => "Main Office Address",
            Self::BusinessLocation => "Business Location Address",
        }
    }
}

impl fmt::Display for AddressGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Taxpayer => "taxpayer",
            Self::MainOffice => "main office",
            Self::BusinessLocation => "business location",
        };
        f.write_str(s)
    }
}

/// A level of the cascade, ordered from the root down
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressLevel {
    Region,
    Province,
    Municipality,
    Barangay,
}

impl AddressLevel {
    pub const ALL: [AddressLevel; 4] = [
        AddressLevel::Region,
        AddressLevel::Province,
        AddressLevel::Municipality,
        AddressLevel::Barangay,
    ];

    /// Index into an [`AddressPath`]
    pub fn depth(self) -> usize {
        self as usize
    }

    pub fn child(self) -> Option<AddressLevel> {
        match self {
            Self::Region => Some(Self::Province),
            Self::Province => Some(Self::Municipality),
            Self::Municipality => Some(Self::Barangay),
            Self::Barangay => None,
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Region => "regions",
            Self::Province => "provinces",
            Self::Municipality => "municipalities",
            Self::Barangay => "barangays",
        }
    }
}

impl fmt::Display for AddressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Region => "region",
            Self::Province => "province",
            Self::Municipality => "municipality",
            Self::Barangay => "barangay",
        };
        f.write_str(s)
    }
}
