//! Core data models for atlas.
//!
//! These types are shared across all atlas crates and represent the stored
//! entities, their enumerations, and the request/report shapes that cross
//! crate boundaries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::capability::GeometryMode;
use crate::error::{Error, Result};
use crate::geometry::{Centroid, Geometry};

// =============================================================================
// ENUMERATIONS
// =============================================================================

/// Kind of rights a claimant asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimantType {
    /// Individual forest rights.
    #[serde(rename = "IFR")]
    Individual,
    /// Community forest rights.
    #[serde(rename = "CFR")]
    Community,
}

impl ClaimantType {
    pub const ALL: [ClaimantType; 2] = [ClaimantType::Individual, ClaimantType::Community];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "IFR",
            Self::Community => "CFR",
        }
    }
}

impl std::fmt::Display for ClaimantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimantType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IFR" | "INDIVIDUAL" => Ok(Self::Individual),
            "CFR" | "COMMUNITY" => Ok(Self::Community),
            _ => Err(format!("Invalid claimant type: {}", s)),
        }
    }
}

/// Review status of a rights claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    #[default]
    Pending,
    Recognized,
    Rejected,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 3] = [
        ClaimStatus::Pending,
        ClaimStatus::Recognized,
        ClaimStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Recognized => "recognized",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "recognized" => Ok(Self::Recognized),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid claim status: {}", s)),
        }
    }
}

/// Category of a land or water micro-asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    WaterBody,
    Vegetation,
    Farmland,
    Infrastructure,
}

impl AssetType {
    pub const ALL: [AssetType; 4] = [
        AssetType::WaterBody,
        AssetType::Vegetation,
        AssetType::Farmland,
        AssetType::Infrastructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaterBody => "water_body",
            Self::Vegetation => "vegetation",
            Self::Farmland => "farmland",
            Self::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "water_body" => Ok(Self::WaterBody),
            "vegetation" => Ok(Self::Vegetation),
            "farmland" => Ok(Self::Farmland),
            "infrastructure" => Ok(Self::Infrastructure),
            _ => Err(format!("Invalid asset type: {}", s)),
        }
    }
}

/// Access role of a user account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
    Viewer,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Admin, UserRole::User, UserRole::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Administrative village with its boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Village {
    pub id: i64,
    pub uid: Uuid,
    pub external_id: Option<String>,
    pub name: String,
    pub state: Option<String>,
    pub district: Option<String>,
    pub block: Option<String>,
    pub properties: JsonValue,
    pub boundary: Option<Geometry>,
    /// Store-derived in native mode; caller-supplied or absent in fallback mode.
    pub centroid: Option<Centroid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rights claimant (individual or community).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claimant {
    pub id: i64,
    pub uid: Uuid,
    pub external_id: Option<String>,
    pub name: String,
    pub claimant_type: ClaimantType,
    pub tribal_group: Option<String>,
    /// Weak reference; cleared when the village is deleted.
    pub village_id: Option<i64>,
    pub area_ha: Option<f64>,
    pub status: ClaimStatus,
    pub properties: JsonValue,
    pub geometry: Option<Geometry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Land or water micro-asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroAsset {
    pub id: i64,
    pub uid: Uuid,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub asset_type: AssetType,
    /// Weak reference; cleared when the village is deleted.
    pub village_id: Option<i64>,
    pub district: Option<String>,
    pub area_ha: Option<f64>,
    pub status: String,
    pub properties: JsonValue,
    pub geometry: Option<Geometry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Supporting document with its opaque extraction payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub uid: Uuid,
    pub external_id: Option<String>,
    /// Weak reference; cleared when the claimant is deleted.
    pub claimant_id: Option<i64>,
    pub filename: Option<String>,
    pub file_path: Option<String>,
    pub raw_text: Option<String>,
    pub structured: JsonValue,
    pub ocr_confidence: Option<f64>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uid: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SPATIAL ACCESS TYPES
// =============================================================================

/// Entity tables that carry geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialEntity {
    Village,
    Claimant,
    MicroAsset,
}

impl SpatialEntity {
    pub const ALL: [SpatialEntity; 3] = [
        SpatialEntity::Village,
        SpatialEntity::Claimant,
        SpatialEntity::MicroAsset,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Self::Village => "villages",
            Self::Claimant => "claimants",
            Self::MicroAsset => "micro_assets",
        }
    }

    /// Column holding the entity's geometry.
    pub fn geometry_column(&self) -> &'static str {
        match self {
            Self::Village => "boundary",
            Self::Claimant | Self::MicroAsset => "geom",
        }
    }
}

impl std::fmt::Display for SpatialEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

impl std::str::FromStr for SpatialEntity {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "village" | "villages" => Ok(Self::Village),
            "claimant" | "claimants" => Ok(Self::Claimant),
            "micro_asset" | "micro_assets" | "asset" | "assets" => Ok(Self::MicroAsset),
            _ => Err(format!("Invalid spatial entity: {}", s)),
        }
    }
}

/// Mode-independent row shape returned by bounding-box queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialRecord {
    pub entity: SpatialEntity,
    pub id: i64,
    pub uid: Uuid,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub geometry: Option<Geometry>,
    pub centroid: Option<Centroid>,
    pub properties: JsonValue,
}

/// Fields that identify a village for deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VillageIdentity {
    pub external_id: Option<String>,
    pub name: String,
    pub district: Option<String>,
}

/// An existing village that an incoming identity collides with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VillageMatch {
    pub id: i64,
    pub external_id: Option<String>,
}

// =============================================================================
// CREATE REQUESTS
// =============================================================================

/// Request for creating a village.
#[derive(Debug, Clone, Default)]
pub struct NewVillage {
    pub external_id: Option<String>,
    pub name: String,
    pub state: Option<String>,
    pub district: Option<String>,
    pub block: Option<String>,
    pub properties: JsonValue,
    pub boundary: Option<Geometry>,
    /// Precomputed centroid; only consulted in fallback mode.
    pub centroid: Option<Centroid>,
}

impl NewVillage {
    pub fn identity(&self) -> VillageIdentity {
        VillageIdentity {
            external_id: self.external_id.clone(),
            name: self.name.clone(),
            district: self.district.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("village name is required".to_string()));
        }
        Ok(())
    }
}

/// Request for creating a claimant.
#[derive(Debug, Clone)]
pub struct NewClaimant {
    pub external_id: Option<String>,
    pub name: String,
    pub claimant_type: ClaimantType,
    pub tribal_group: Option<String>,
    pub village_id: Option<i64>,
    pub area_ha: Option<f64>,
    pub status: ClaimStatus,
    pub properties: JsonValue,
    pub geometry: Option<Geometry>,
    pub centroid: Option<Centroid>,
}

impl NewClaimant {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("claimant name is required".to_string()));
        }
        validate_area(self.area_ha)
    }
}

/// Request for creating a micro-asset.
#[derive(Debug, Clone)]
pub struct NewMicroAsset {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub asset_type: AssetType,
    pub village_id: Option<i64>,
    pub district: Option<String>,
    pub area_ha: Option<f64>,
    /// Defaults to `active` when absent.
    pub status: Option<String>,
    pub properties: JsonValue,
    pub geometry: Option<Geometry>,
    pub centroid: Option<Centroid>,
}

impl NewMicroAsset {
    pub fn validate(&self) -> Result<()> {
        validate_area(self.area_ha)
    }
}

/// Request for creating a document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub external_id: Option<String>,
    pub claimant_id: Option<i64>,
    pub filename: Option<String>,
    pub file_path: Option<String>,
    pub raw_text: Option<String>,
    pub structured: JsonValue,
    pub ocr_confidence: Option<f64>,
    pub uploaded_by: Option<String>,
}

impl NewDocument {
    pub fn validate(&self) -> Result<()> {
        match self.ocr_confidence {
            Some(c) if !(0.0..=1.0).contains(&c) => Err(Error::InvalidInput(format!(
                "ocr confidence must be within [0, 1], got {}",
                c
            ))),
            _ => Ok(()),
        }
    }
}

fn validate_area(area_ha: Option<f64>) -> Result<()> {
    match area_ha {
        Some(a) if !a.is_finite() || a < 0.0 => Err(Error::InvalidInput(format!(
            "area_ha must be a non-negative number, got {}",
            a
        ))),
        _ => Ok(()),
    }
}

// =============================================================================
// HEALTH TYPES
// =============================================================================

/// Row count for one table, or the reason it could not be counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableCount {
    Count(i64),
    Error { error: String },
}

impl TableCount {
    pub fn count(&self) -> Option<i64> {
        match self {
            Self::Count(n) => Some(*n),
            Self::Error { .. } => None,
        }
    }
}

/// Per-table row counts keyed by table name.
pub type TableStats = BTreeMap<String, TableCount>;

/// Connection pool snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Structured health record; failures are captured, never raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub geometry_mode: GeometryMode,
    /// Present when bounding-box queries are approximate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TableStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claimant_type_values() {
        assert_eq!(ClaimantType::ALL.len(), 2);
        assert_eq!("IFR".parse::<ClaimantType>().unwrap(), ClaimantType::Individual);
        assert_eq!("cfr".parse::<ClaimantType>().unwrap(), ClaimantType::Community);
        assert!("XYZ".parse::<ClaimantType>().is_err());
        assert_eq!(
            serde_json::to_string(&ClaimantType::Community).unwrap(),
            "\"CFR\""
        );
    }

    #[test]
    fn test_claim_status_values() {
        assert_eq!(ClaimStatus::ALL.len(), 3);
        assert_eq!(ClaimStatus::default(), ClaimStatus::Pending);
        for status in ClaimStatus::ALL {
            assert_eq!(status.as_str().parse::<ClaimStatus>().unwrap(), status);
        }
        assert!("approved".parse::<ClaimStatus>().is_err());
    }

    #[test]
    fn test_asset_type_values() {
        assert_eq!(AssetType::ALL.len(), 4);
        assert_eq!("Water Body".parse::<AssetType>().unwrap(), AssetType::WaterBody);
        assert_eq!(AssetType::WaterBody.to_string(), "water_body");
        assert!("forest".parse::<AssetType>().is_err());
    }

    #[test]
    fn test_user_role_values() {
        assert_eq!(UserRole::ALL.len(), 3);
        assert_eq!("Admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("root".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_spatial_entity_columns() {
        assert_eq!(SpatialEntity::Village.geometry_column(), "boundary");
        assert_eq!(SpatialEntity::Claimant.geometry_column(), "geom");
        assert_eq!(SpatialEntity::MicroAsset.table(), "micro_assets");
        assert_eq!(
            "assets".parse::<SpatialEntity>().unwrap(),
            SpatialEntity::MicroAsset
        );
    }

    #[test]
    fn test_new_claimant_rejects_negative_area() {
        let claimant = NewClaimant {
            external_id: None,
            name: "Ramesh".to_string(),
            claimant_type: ClaimantType::Individual,
            tribal_group: None,
            village_id: None,
            area_ha: Some(-0.5),
            status: ClaimStatus::Pending,
            properties: json!({}),
            geometry: None,
            centroid: None,
        };
        assert!(matches!(claimant.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_new_document_confidence_bounds() {
        let mut doc = NewDocument {
            ocr_confidence: Some(1.0),
            ..Default::default()
        };
        assert!(doc.validate().is_ok());
        doc.ocr_confidence = Some(1.01);
        assert!(doc.validate().is_err());
        doc.ocr_confidence = None;
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_new_village_requires_name() {
        let village = NewVillage {
            name: "  ".to_string(),
            ..Default::default()
        };
        assert!(village.validate().is_err());
    }

    #[test]
    fn test_table_count_serializes_error_marker() {
        let mut stats = TableStats::new();
        stats.insert("villages".to_string(), TableCount::Count(3));
        stats.insert(
            "users".to_string(),
            TableCount::Error {
                error: "relation \"users\" does not exist".to_string(),
            },
        );
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["villages"], json!(3));
        assert_eq!(
            value["users"]["error"],
            json!("relation \"users\" does not exist")
        );
    }
}
