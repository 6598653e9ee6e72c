//! Shared wire types for the eBPLS mobile client.
//!
//! These mirror the JSON contract of the eBPLS mobile API
//! (`/ebpls/api/mobile`). Field names are camelCase on the wire.
//! The backend owns the contract; anything we do not model explicitly
//! on the larger payloads is kept in an `extra` map so it survives a
//! round trip.

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// DIRECTORY LISTS (dropdown options)
// =============================================================================

/// Region as returned by `GET /regions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

/// Province as returned by `GET /provinces/{regionId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub code: String,
    pub name: String,
}

/// Municipality as returned by `GET /municipalities/{provinceId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub code: String,
    pub name: String,
}

/// Barangay as returned inside the `GET /barangays/{municipalityId}` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barangay {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub zipcode: String,
}

/// The barangay list endpoint wraps its rows, unlike the other list calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarangayList {
    #[serde(default)]
    pub barangays: Vec<Barangay>,
}

// =============================================================================
// REVERSE LOOKUPS (edit-mode preload)
// =============================================================================

/// `GET /barangay/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarangayRecord {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub zipcode: String,
    pub municipality_id: i64,
}

/// `GET /municipality/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityRecord {
    pub id: i64,
    pub name: String,
    pub province_id: i64,
}

/// `GET /province/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceRecord {
    pub id: i64,
    pub name: String,
    pub region_id: i64,
}

/// `GET /region/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: i64,
    pub name: String,
}

/// `GET /addresses/defaults` - the LGU's home region, matched by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDefaults {
    #[serde(default)]
    pub default_region: Option<String>,
}

// =============================================================================
// APPLICATION EDIT PAYLOAD
// =============================================================================

/// A stored address: only the leaf barangay plus the free-text lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddress {
    pub barangay_id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub unit_number: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub building_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub lot_number: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub block_number: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub street: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subdivision: String,
}

/// The three address groups of an application, any of which may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAddresses {
    #[serde(default)]
    pub payer: Option<SavedAddress>,
    #[serde(default)]
    pub main_office: Option<SavedAddress>,
    #[serde(default)]
    pub business_location: Option<SavedAddress>,
}

/// `GET /applications/{id}/edit`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEdit {
    #[serde(default)]
    pub status: Option<i32>,
    #[serde(default)]
    pub is_renewal: bool,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub link_business_no: Option<String>,
    #[serde(default)]
    pub addresses: Option<ApplicationAddresses>,
    /// Remaining backend-owned fields (business lines, measures, attachments...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ApplicationEdit {
    /// Renewals and expired permits are edited in renewal mode
    pub fn is_renewal_mode(&self) -> bool {
        self.is_renewal || self.is_expired
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// `GET /me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub firstname: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub lastname: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub role: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `POST /login` body
#[derive(Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Error body shape used by the backend on non-2xx responses.
/// Login failures use `message` instead of `error` on some deployments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn text(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.is_empty())
    }
}

/// The backend sends `null` for empty text fields; we want `""`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
