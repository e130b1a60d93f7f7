//! Metadata summary stored in the `meta` column

use serde::{Deserialize, Serialize};
use tracing::warn;
use wof_common::{Feature, Hierarchy};

use crate::error::{IndexError, IndexResult};

/// Country code used when a feature does not carry `wof:country`
pub const UNKNOWN_COUNTRY: &str = "XX";

/// Compact summary of a feature: name, country and ancestor chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "wof:name")]
    pub name: String,

    #[serde(rename = "wof:country")]
    pub country: String,

    #[serde(rename = "wof:hierarchy")]
    pub hierarchy: Hierarchy,
}

impl Meta {
    pub fn from_feature(feature: &Feature) -> Self {
        let country = match feature.string_property("wof:country") {
            Some(country) => country.to_string(),
            None => {
                warn!(id = feature.id(), "Failed to determine country, defaulting to {}", UNKNOWN_COUNTRY);
                UNKNOWN_COUNTRY.to_string()
            },
        };

        Self {
            name: feature.name().to_string(),
            country,
            hierarchy: feature.hierarchy(),
        }
    }

    /// Serialize to the JSON text written to the store
    pub fn encode(&self, id: i64) -> IndexResult<String> {
        serde_json::to_string(self).map_err(|source| IndexError::Encode {
            id,
            what: "metadata",
            source,
        })
    }
}
