// src/artifacts/table.rs

use crate::types::DatatypeId;

use super::discovery::FileSelector;

/// Raw isochrone layer written by the simulator.
pub const ISOCHRONE_SELECTOR: FileSelector = FileSelector::new("isochrone", "geojson");

/// Where an artifact's file comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Isochrones filtered on the probability cutoff.
    Isochrones,
    /// Same as [`ArtifactSource::Isochrones`] with absolute `time` values.
    IsochronesIsotime,
    /// A raster written by the simulator, masked on the cutoff isochrones
    /// before upload.
    Raster(FileSelector),
}

/// One publishable output kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub datatype: DatatypeId,
    pub name: &'static str,
    pub source: ArtifactSource,
    /// Resource format reported to the repository.
    pub format: &'static str,
}

impl ArtifactSpec {
    pub fn is_raster(&self) -> bool {
        matches!(self.source, ArtifactSource::Raster(_))
    }
}

/// Every artifact the service publishes, in publication order.
pub const ARTIFACTS: &[ArtifactSpec] = &[
    ArtifactSpec {
        datatype: DatatypeId(35007),
        name: "isochrones",
        source: ArtifactSource::Isochrones,
        format: "GeoJSON",
    },
    ArtifactSpec {
        datatype: DatatypeId(35012),
        name: "isochrones_isotime",
        source: ArtifactSource::IsochronesIsotime,
        format: "GeoJSON",
    },
    ArtifactSpec {
        datatype: DatatypeId(35010),
        name: "ros_mean",
        source: ArtifactSource::Raster(FileSelector::new("RoS_mean", "tiff")),
        format: "tiff",
    },
    ArtifactSpec {
        datatype: DatatypeId(35011),
        name: "ros_max",
        source: ArtifactSource::Raster(FileSelector::new("RoS_max", "tiff")),
        format: "tiff",
    },
    ArtifactSpec {
        datatype: DatatypeId(35008),
        name: "fireline_intensity_max",
        source: ArtifactSource::Raster(FileSelector::new("fireline_intensity_max", "tiff")),
        format: "tiff",
    },
    ArtifactSpec {
        datatype: DatatypeId(35009),
        name: "fireline_intensity_mean",
        source: ArtifactSource::Raster(FileSelector::new("fireline_intensity_mean", "tiff")),
        format: "tiff",
    },
];

pub fn lookup(datatype: DatatypeId) -> Option<&'static ArtifactSpec> {
    ARTIFACTS.iter().find(|a| a.datatype == datatype)
}

/// Artifacts to publish for a requested datatype: everything for the ALL
/// sentinel, the single matching entry otherwise.
pub fn select(requested: DatatypeId) -> Vec<&'static ArtifactSpec> {
    if requested.is_all() {
        ARTIFACTS.iter().collect()
    } else {
        lookup(requested).into_iter().collect()
    }
}

/// Datatype codes accepted on the inbound routing key.
pub fn supported_datatypes() -> Vec<DatatypeId> {
    std::iter::once(DatatypeId::ALL)
        .chain(ARTIFACTS.iter().map(|a| a.datatype))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_sentinel_selects_every_artifact_in_order() {
        let codes: Vec<u32> = select(DatatypeId::ALL).iter().map(|a| a.datatype.0).collect();
        assert_eq!(codes, vec![35007, 35012, 35010, 35011, 35008, 35009]);
    }

    #[test]
    fn single_datatype_selects_one_entry() {
        let selected = select(DatatypeId(35011));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "ros_max");
        assert!(selected[0].is_raster());
    }

    #[test]
    fn unknown_datatype_selects_nothing() {
        assert!(select(DatatypeId(35013)).is_empty());
        assert!(!supported_datatypes().contains(&DatatypeId(35013)));
        assert!(supported_datatypes().contains(&DatatypeId::ALL));
    }

    #[test]
    fn datatype_codes_are_unique() {
        let mut codes: Vec<_> = ARTIFACTS.iter().map(|a| a.datatype).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), ARTIFACTS.len());
    }
}
