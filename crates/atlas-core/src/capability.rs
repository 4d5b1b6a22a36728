//! Store capability flags and the geometry mode derived from them.

use serde::{Deserialize, Serialize};

/// Optional Postgres extensions, in the order the prober enables them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extension {
    /// Trigram similarity search (`pg_trgm`).
    Trigram,
    /// GiST operator classes for scalar types (`btree_gist`).
    BtreeGist,
    /// Native spatial types and functions (`postgis`).
    Postgis,
    /// Spatial topology support (`postgis_topology`).
    PostgisTopology,
}

impl Extension {
    /// Fixed probe order.
    pub const PROBE_ORDER: [Extension; 4] = [
        Extension::Trigram,
        Extension::BtreeGist,
        Extension::Postgis,
        Extension::PostgisTopology,
    ];

    /// Extension name as known to `CREATE EXTENSION`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trigram => "pg_trgm",
            Self::BtreeGist => "btree_gist",
            Self::Postgis => "postgis",
            Self::PostgisTopology => "postgis_topology",
        }
    }
}

impl std::fmt::Display for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema variant used for geometry columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryMode {
    /// PostGIS geometry columns, spatial indexes, centroid trigger.
    Native,
    /// GeoJSON JSONB columns with scalar centroid fields.
    Fallback,
}

impl GeometryMode {
    /// Whether bounding-box queries are approximate in this mode.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Fallback)
    }

    /// Operator-facing note for degraded mode, `None` in native mode.
    pub fn degraded_warning(&self) -> Option<&'static str> {
        match self {
            Self::Native => None,
            Self::Fallback => Some(
                "PostGIS unavailable: geometry stored as GeoJSON, bounding-box queries \
                 filter on centroid fields and include rows without a centroid",
            ),
        }
    }
}

impl std::fmt::Display for GeometryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Immutable result of the startup capability probe.
///
/// Produced once during initialization and handed to the schema provisioner
/// and geometry strategy constructors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub trigram: bool,
    pub btree_gist: bool,
    pub postgis: bool,
    pub postgis_topology: bool,
}

impl Capabilities {
    /// Capabilities with every optional extension missing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from the set of extensions that were enabled.
    pub fn from_enabled(enabled: &[Extension]) -> Self {
        let mut caps = Self::none();
        for ext in enabled {
            caps.set(*ext, true);
        }
        caps
    }

    /// Record the probe outcome for one extension.
    pub fn set(&mut self, extension: Extension, available: bool) {
        match extension {
            Extension::Trigram => self.trigram = available,
            Extension::BtreeGist => self.btree_gist = available,
            Extension::Postgis => self.postgis = available,
            Extension::PostgisTopology => self.postgis_topology = available,
        }
    }

    /// Whether an extension was enabled.
    pub fn has(&self, extension: Extension) -> bool {
        match extension {
            Extension::Trigram => self.trigram,
            Extension::BtreeGist => self.btree_gist,
            Extension::Postgis => self.postgis,
            Extension::PostgisTopology => self.postgis_topology,
        }
    }

    /// "Native spatial type available."
    pub fn native_spatial(&self) -> bool {
        self.postgis
    }

    /// Geometry mode selected by these capabilities.
    pub fn geometry_mode(&self) -> GeometryMode {
        if self.native_spatial() {
            GeometryMode::Native
        } else {
            GeometryMode::Fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_order_is_fixed() {
        let names: Vec<&str> = Extension::PROBE_ORDER.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["pg_trgm", "btree_gist", "postgis", "postgis_topology"]
        );
    }

    #[test]
    fn test_mode_follows_postgis() {
        let caps = Capabilities::from_enabled(&[Extension::Postgis]);
        assert_eq!(caps.geometry_mode(), GeometryMode::Native);

        // Topology without postgis itself does not make the store spatial.
        let caps = Capabilities::from_enabled(&[Extension::Trigram, Extension::PostgisTopology]);
        assert_eq!(caps.geometry_mode(), GeometryMode::Fallback);
    }

    #[test]
    fn test_set_and_has() {
        let mut caps = Capabilities::none();
        for ext in Extension::PROBE_ORDER {
            assert!(!caps.has(ext));
            caps.set(ext, true);
            assert!(caps.has(ext));
        }
    }

    #[test]
    fn test_degraded_warning_only_in_fallback() {
        assert!(GeometryMode::Native.degraded_warning().is_none());
        assert!(GeometryMode::Fallback.degraded_warning().is_some());
        assert!(GeometryMode::Fallback.is_degraded());
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&GeometryMode::Fallback).unwrap(),
            "\"fallback\""
        );
        assert_eq!(GeometryMode::Native.to_string(), "native");
    }
}
