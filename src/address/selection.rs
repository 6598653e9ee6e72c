//! Address selection value types
//!
//! The selected levels live in an [`AddressPath`]: a level can only be
//! present if every level above it is, so "province set implies region
//! set" holds by construction, and clearing descendants is a truncate.

use ebpls_types::{Barangay, Municipality, Province, Region, SavedAddress};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::AddressLevel;

/// A selected dropdown option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    pub name: String,
}

impl Choice {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Selected levels from the region down, indexed by [`AddressLevel::depth`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressPath(SmallVec<[Choice; 4]>);

impl AddressPath {
    pub fn get(&self, level: AddressLevel) -> Option<&Choice> {
        self.0.get(level.depth())
    }

    pub fn id(&self, level: AddressLevel) -> Option<i64> {
        self.get(level).map(|c| c.id)
    }

    /// Number of levels selected (0..=4)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deepest selected level
    pub fn deepest(&self) -> Option<AddressLevel> {
        self.0.len().checked_sub(1).map(|i| AddressLevel::ALL[i])
    }

    /// Drop `level` and everything below it
    pub fn clear_from(&mut self, level: AddressLevel) {
        self.0.truncate(level.depth());
    }

    /// Select `choice` at `level`.
    ///
    /// With `keep_descendants` an existing choice at `level` is replaced in
    /// place and deeper levels survive; otherwise they are dropped. Returns
    /// false (and changes nothing) if the parent level is not selected.
    pub fn set(&mut self, level: AddressLevel, choice: Choice, keep_descendants: bool) -> bool {
        let depth = level.depth();
        if self.0.len() < depth {
            return false;
        }
        if keep_descendants && depth < self.0.len() {
            self.0[depth] = choice;
        } else {
            self.0.truncate(depth);
            self.0.push(choice);
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (AddressLevel, &Choice)> {
        AddressLevel::ALL.into_iter().zip(self.0.iter())
    }
}

/// Where a group's cascade currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeState {
    Empty,
    RegionSet,
    ProvinceSet,
    MunicipalitySet,
    BarangaySet,
}

impl CascadeState {
    pub fn of(path: &AddressPath) -> Self {
        match path.deepest() {
            None => Self::Empty,
            Some(AddressLevel::Region) => Self::RegionSet,
            Some(AddressLevel::Province) => Self::ProvinceSet,
            Some(AddressLevel::Municipality) => Self::MunicipalitySet,
            Some(AddressLevel::Barangay) => Self::BarangaySet,
        }
    }
}

/// Free-text address lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetDetails {
    pub unit_number: String,
    pub building_name: String,
    pub lot_number: String,
    pub block_number: String,
    pub street: String,
    pub subdivision: String,
}

impl From<&SavedAddress> for StreetDetails {
    fn from(saved: &SavedAddress) -> Self {
        Self {
            unit_number: saved.unit_number.clone(),
            building_name: saved.building_name.clone(),
            lot_number: saved.lot_number.clone(),
            block_number: saved.block_number.clone(),
            street: saved.street.clone(),
            subdivision: saved.subdivision.clone(),
        }
    }
}

/// Everything one address group holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSelection {
    pub path: AddressPath,
    /// Zipcode of the selected barangay; empty when none is selected
    pub zipcode: String,
    pub details: StreetDetails,
}

impl AddressSelection {
    pub fn region(&self) -> Option<&Choice> {
        self.path.get(AddressLevel::Region)
    }

    pub fn province(&self) -> Option<&Choice> {
        self.path.get(AddressLevel::Province)
    }

    pub fn municipality(&self) -> Option<&Choice> {
        self.path.get(AddressLevel::Municipality)
    }

    pub fn barangay(&self) -> Option<&Choice> {
        self.path.get(AddressLevel::Barangay)
    }

    pub fn barangay_id(&self) -> Option<i64> {
        self.path.id(AddressLevel::Barangay)
    }

    pub fn state(&self) -> CascadeState {
        CascadeState::of(&self.path)
    }

    /// All four levels selected
    pub fn is_complete(&self) -> bool {
        self.state() == CascadeState::BarangaySet
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Clear `level` and below, including the zipcode that hangs off the barangay
    pub(crate) fn clear_from(&mut self, level: AddressLevel) {
        self.path.clear_from(level);
        self.zipcode.clear();
    }

    /// The stored form of this selection, if a barangay is selected
    pub fn to_saved(&self) -> Option<SavedAddress> {
        let barangay_id = self.barangay_id()?;
        Some(SavedAddress {
            barangay_id,
            unit_number: self.details.unit_number.clone(),
            building_name: self.details.building_name.clone(),
            lot_number: self.details.lot_number.clone(),
            block_number: self.details.block_number.clone(),
            street: self.details.street.clone(),
            subdivision: self.details.subdivision.clone(),
        })
    }
}

/// Last-fetched option lists of one group.
///
/// Each list belongs to the parent currently selected one level up and is
/// replaced, never merged, when it is fetched again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCache {
    pub regions: Vec<Region>,
    pub provinces: Vec<Province>,
    pub municipalities: Vec<Municipality>,
    pub barangays: Vec<Barangay>,
}

impl DirectoryCache {
    /// Empty the option lists for `level` and every level below it.
    /// The region list is screen-wide and never cleared here.
    pub fn clear_lists_from(&mut self, level: AddressLevel) {
        if level <= AddressLevel::Province {
            self.provinces.clear();
        }
        if level <= AddressLevel::Municipality {
            self.municipalities.clear();
        }
        self.barangays.clear();
    }

    /// Look up the display name of option `id` in the list for `level`
    pub fn name_of(&self, level: AddressLevel, id: i64) -> Option<&str> {
        match level {
            AddressLevel::Region => self.regions.iter().find(|r| r.id == id).map(|r| r.name.as_str()),
            AddressLevel::Province => self
                .provinces
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.as_str()),
            AddressLevel::Municipality => self
                .municipalities
                .iter()
                .find(|m| m.id == id)
                .map(|m| m.name.as_str()),
            AddressLevel::Barangay => self
                .barangays
                .iter()
                .find(|b| b.id == id)
                .map(|b| b.name.as_str()),
        }
    }

    pub fn barangay(&self, id: i64) -> Option<&Barangay> {
        self.barangays.iter().find(|b| b.id == id)
    }

    pub fn len(&self, level: AddressLevel) -> usize {
        match level {
            AddressLevel::Region => self.regions.len(),
            AddressLevel::Province => self.provinces.len(),
            AddressLevel::Municipality => self.municipalities.len(),
            AddressLevel::Barangay => self.barangays.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_path() -> AddressPath {
        let mut path = AddressPath::default();
        assert!(path.set(AddressLevel::Region, Choice::new(2, "Region VIII"), false));
        assert!(path.set(AddressLevel::Province, Choice::new(3, "Leyte"), false));
        assert!(path.set(AddressLevel::Municipality, Choice::new(7, "Baybay City"), false));
        assert!(path.set(AddressLevel::Barangay, Choice::new(1042, "Gaas"), false));
        path
    }

    #[test]
    fn cannot_skip_a_level() {
        let mut path = AddressPath::default();
        assert!(!path.set(AddressLevel::Province, Choice::new(3, "Leyte"), false));
        assert!(path.is_empty());
    }

    #[test]
    fn setting_a_parent_drops_descendants() {
        let mut path = full_path();
        path.set(AddressLevel::Province, Choice::new(4, "Samar"), false);
        assert_eq!(path.len(), 2);
        assert_eq!(path.id(AddressLevel::Province), Some(4));
        assert_eq!(path.get(AddressLevel::Municipality), None);
    }

    #[test]
    fn keep_descendants_replaces_in_place() {
        let mut path = full_path();
        path.set(AddressLevel::Region, Choice::new(2, "Eastern Visayas"), true);
        assert_eq!(path.len(), 4);
        assert_eq!(path.get(AddressLevel::Region).unwrap().name, "Eastern Visayas");
    }

    #[test]
    fn state_tracks_depth() {
        let mut path = full_path();
        assert_eq!(CascadeState::of(&path), CascadeState::BarangaySet);
        path.clear_from(AddressLevel::Municipality);
        assert_eq!(CascadeState::of(&path), CascadeState::ProvinceSet);
        path.clear_from(AddressLevel::Region);
        assert_eq!(CascadeState::of(&path), CascadeState::Empty);
    }

    #[test]
    fn clear_lists_from_keeps_upper_levels() {
        let mut cache = DirectoryCache {
            regions: vec![Region {
                id: 2,
                name: "Region VIII".into(),
                description: String::new(),
            }],
            provinces: vec![Province {
                id: 3,
                code: String::new(),
                name: "Leyte".into(),
            }],
            municipalities: vec![Municipality {
                id: 7,
                code: String::new(),
                name: "Baybay City".into(),
            }],
            barangays: vec![Barangay {
                id: 1042,
                name: "Gaas".into(),
                zipcode: "6521".into(),
            }],
        };
        cache.clear_lists_from(AddressLevel::Municipality);
        assert_eq!(cache.len(AddressLevel::Province), 1);
        assert_eq!(cache.len(AddressLevel::Municipality), 0);
        assert_eq!(cache.len(AddressLevel::Barangay), 0);

        cache.clear_lists_from(AddressLevel::Region);
        assert_eq!(cache.len(AddressLevel::Region), 1);
        assert_eq!(cache.len(AddressLevel::Province), 0);
    }

    #[test]
    fn to_saved_requires_barangay() {
        let mut selection = AddressSelection {
            path: full_path(),
            zipcode: "6521".into(),
            details: StreetDetails {
                street: "Rizal St".into(),
                ..Default::default()
            },
        };
        let saved = selection.to_saved().unwrap();
        assert_eq!(saved.barangay_id, 1042);
        assert_eq!(saved.street, "Rizal St");

        selection.clear_from(AddressLevel::Barangay);
        assert!(selection.to_saved().is_none());
        assert_eq!(selection.zipcode, "");
    }
}
