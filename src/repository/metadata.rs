// src/repository/metadata.rs

//! Datalake package and resource records.

use std::path::Path;

use chrono::{Local, NaiveDateTime};
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::types::DatatypeId;

/// `datatype_id` of the package wrapping a run's resources.
pub const PACKAGE_DATATYPE_ID: u32 = 35005;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn iso_date<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.format(DATE_FORMAT).to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalAttributes {
    pub request_code: String,
}

/// Fixed INSPIRE descriptors carried by every package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspireDefaults {
    #[serde(rename = "identification_ResourceType")]
    pub resource_type: &'static str,
    #[serde(rename = "identification_CoupledResource")]
    pub coupled_resource: &'static str,
    #[serde(rename = "identification_ResourceLanguage")]
    pub resource_language: &'static str,
    #[serde(rename = "classification_TopicCategory")]
    pub topic_category: &'static str,
    #[serde(rename = "classification_SpatialDataServiceType")]
    pub spatial_data_service_type: &'static str,
    #[serde(rename = "keyword_KeywordValue")]
    pub keyword_value: &'static str,
    #[serde(rename = "keyword_OriginatingControlledVocabulary")]
    pub keyword_vocabulary: &'static str,
    pub quality_and_validity_lineage: &'static str,
    pub quality_and_validity_spatial_resolution_latitude: &'static str,
    pub quality_and_validity_spatial_resolution_longitude: &'static str,
    pub quality_and_validity_spatial_resolution_scale: &'static str,
    pub quality_and_validity_spatial_resolution_measureunit: &'static str,
    pub conformity_specification_title: &'static str,
    #[serde(rename = "conformity_specification_dateType")]
    pub conformity_specification_date_type: &'static str,
    pub conformity_specification_date: &'static str,
    pub conformity_degree: &'static str,
    pub constraints_conditions_for_access_and_use: &'static str,
    pub constraints_limitation_on_public_access: &'static str,
    pub responsable_organization_name: &'static str,
    pub responsable_organization_email: &'static str,
    pub responsable_organization_role: &'static str,
    pub point_of_contact_name: &'static str,
    pub point_of_contact_email: &'static str,
    pub metadata_language: &'static str,
    pub coordinatesystemreference_code: &'static str,
    pub coordinatesystemreference_codespace: &'static str,
    pub character_encoding: &'static str,
}

impl Default for InspireDefaults {
    fn default() -> Self {
        Self {
            resource_type: "dataset",
            coupled_resource: "",
            resource_language: "eng",
            topic_category: "environment",
            spatial_data_service_type: "",
            keyword_value: "Wildfire, Fire, Forest Fire, Land Fire, Hazard, Delineation Map",
            keyword_vocabulary: "ontology",
            quality_and_validity_lineage: "Quality approved",
            quality_and_validity_spatial_resolution_latitude: "0",
            quality_and_validity_spatial_resolution_longitude: "0",
            quality_and_validity_spatial_resolution_scale: "20",
            quality_and_validity_spatial_resolution_measureunit: "m",
            conformity_specification_title: "COMMISSION REGULATION (EU) No 1089/2010 of 23 November 2010 implementing Directive 2007/2/EC of the European Parliament and of the Council as regards interoperability of spatial data sets and services",
            conformity_specification_date_type: "publication",
            conformity_specification_date: "2010-12-08T00:00:00",
            conformity_degree: "true",
            constraints_conditions_for_access_and_use: "cc-by",
            constraints_limitation_on_public_access: "",
            responsable_organization_name: "Copernicus EMS Rapid Mapping Team",
            responsable_organization_email: "mapping@copernicus.com",
            responsable_organization_role: "author",
            point_of_contact_name: "CIMA Research Foundation",
            point_of_contact_email: "incendi@cimafoundation.org",
            metadata_language: "eng",
            coordinatesystemreference_code: "4326",
            coordinatesystemreference_codespace: "EPSG",
            character_encoding: "UTF-8",
        }
    }
}

/// What the orchestrator knows about a run when it creates the package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInfo {
    pub title: String,
    pub notes: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// GeoJSON footprint of the published isochrones.
    pub spatial: Value,
    pub request_code: String,
}

/// One package per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatalakeMetadata {
    /// Unique package name.
    pub name: String,
    pub title: String,
    pub notes: String,
    #[serde(serialize_with = "iso_date")]
    pub data_temporal_extent_begin_date: NaiveDateTime,
    #[serde(serialize_with = "iso_date")]
    pub data_temporal_extent_end_date: NaiveDateTime,
    #[serde(rename = "temporalReference_dateOfPublication", serialize_with = "iso_date")]
    pub date_of_publication: NaiveDateTime,
    #[serde(rename = "temporalReference_dateOfLastRevision", serialize_with = "iso_date")]
    pub date_of_last_revision: NaiveDateTime,
    #[serde(rename = "temporalReference_dateOfCreation", serialize_with = "iso_date")]
    pub date_of_creation: NaiveDateTime,
    #[serde(rename = "temporalReference_date", serialize_with = "iso_date")]
    pub reference_date: NaiveDateTime,
    pub spatial: Value,
    pub external_attributes: ExternalAttributes,
    pub private: bool,
    pub datatype_id: u32,
    pub owner_org: String,
    #[serde(flatten)]
    pub inspire: InspireDefaults,
}

impl DatalakeMetadata {
    pub fn new(info: PackageInfo, owner_org: impl Into<String>) -> Self {
        let now = Local::now().naive_local();
        Self {
            name: Uuid::new_v4().to_string(),
            title: info.title,
            notes: info.notes,
            data_temporal_extent_begin_date: info.start,
            data_temporal_extent_end_date: info.end,
            date_of_publication: now,
            date_of_last_revision: now,
            date_of_creation: now,
            reference_date: info.start,
            spatial: info.spatial,
            external_attributes: ExternalAttributes {
                request_code: info.request_code,
            },
            private: true,
            datatype_id: PACKAGE_DATATYPE_ID,
            owner_org: owner_org.into(),
            inspire: InspireDefaults::default(),
        }
    }

    pub fn request_code(&self) -> &str {
        &self.external_attributes.request_code
    }
}

/// Per-file record attached to an upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceMetadata {
    pub name: String,
    pub notes: String,
    pub format: String,
    #[serde(serialize_with = "iso_date")]
    pub file_date_start: NaiveDateTime,
    #[serde(serialize_with = "iso_date")]
    pub file_date_end: NaiveDateTime,
    pub request_code: String,
    pub datatype_resource: DatatypeId,
}

impl ResourceMetadata {
    /// Resource named after the file's stem.
    pub fn for_file(
        file: &Path,
        format: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        request_code: &str,
        datatype: DatatypeId,
    ) -> Self {
        let name = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            notes: name.clone(),
            name,
            format: format.to_string(),
            file_date_start: start,
            file_date_end: end,
            request_code: request_code.to_string(),
            datatype_resource: datatype,
        }
    }

    /// Flat text fields for a multipart form.
    pub fn form_fields(&self, package_id: &str) -> Vec<(&'static str, String)> {
        vec![
            ("package_id", package_id.to_string()),
            ("name", self.name.clone()),
            ("notes", self.notes.clone()),
            ("format", self.format.clone()),
            ("file_date_start", self.file_date_start.format(DATE_FORMAT).to_string()),
            ("file_date_end", self.file_date_end.format(DATE_FORMAT).to_string()),
            ("request_code", self.request_code.clone()),
            ("datatype_resource", self.datatype_resource.to_string()),
        ]
    }
}
