//! Sumo Logic API payloads

use serde::{Deserialize, Serialize};

/// Response of `GET /collectors`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorList {
    #[serde(default)]
    pub collectors: Vec<CollectorInfo>,
}

/// A collector entry from the collector listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorInfo {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alive: Option<bool>,
}

/// Response of `GET /collectors/{id}/sources`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceList {
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// A source as stored by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path_expression: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub force_time_zone: bool,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub source_type: Option<String>,
}

/// Source fields sent on create and update.
///
/// The whole record is written on update; fields left out here are reset
/// to their API defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    pub name: String,
    pub source_type: String,
    pub path_expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    pub force_time_zone: bool,
    pub blacklist: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
}

/// Request body wrapper: `{"source": {...}}`
#[derive(Debug, Serialize)]
pub(crate) struct SourceEnvelope<'a> {
    pub source: SourcePayload<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SourcePayload<'a> {
    #[serde(flatten)]
    pub spec: &'a SourceSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl<'a> SourceEnvelope<'a> {
    pub fn create(spec: &'a SourceSpec) -> Self {
        Self {
            source: SourcePayload { spec, id: None },
        }
    }

    pub fn update(spec: &'a SourceSpec, id: u64) -> Self {
        Self {
            source: SourcePayload { spec, id: Some(id) },
        }
    }
}
