//! Who's On First feature records
//!
//! A feature is a GeoJSON `Feature` whose `properties` carry the `wof:*`
//! namespace. Parsing validates the handful of fields every record must have
//! (identifier, name, placetype) and keeps the rest of the document as a raw
//! JSON body, so geometry can be passed through untouched.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, WofError};

/// Identifier of the Earth record, the root of every hierarchy
pub const EARTH_ID: i64 = 0;

/// Ordered ancestor chains, one map of `<placetype>_id` to identifier per chain
pub type Hierarchy = Vec<BTreeMap<String, i64>>;

/// A single parsed Who's On First record
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: i64,
    name: String,
    placetype: String,
    body: Value,
}

impl Feature {
    /// Read and parse a GeoJSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| WofError::io(path, e))?;
        Self::from_slice(&bytes)
    }

    /// Parse a feature from raw GeoJSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let body: Value = serde_json::from_slice(bytes)?;
        Self::from_value(body)
    }

    /// Build a feature from an already decoded GeoJSON document
    pub fn from_value(body: Value) -> Result<Self> {
        let properties = body
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| WofError::MissingProperty("properties".to_string()))?;

        let id = body
            .get("id")
            .or_else(|| properties.get("wof:id"))
            .ok_or_else(|| WofError::MissingProperty("wof:id".to_string()))?;
        let id = id
            .as_i64()
            .ok_or_else(|| WofError::invalid_property("wof:id", "not an integer"))?;
        if id < 0 {
            return Err(WofError::invalid_property("wof:id", format!("negative identifier {}", id)));
        }

        let name = required_string(properties, "wof:name")?;
        let placetype = required_string(properties, "wof:placetype")?;

        Ok(Self {
            id,
            name,
            placetype,
            body,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn placetype(&self) -> &str {
        &self.placetype
    }

    /// The full GeoJSON document
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The GeoJSON `geometry` member, if present and not null
    pub fn geometry(&self) -> Option<&Value> {
        self.body.get("geometry").filter(|g| !g.is_null())
    }

    /// The top-level `bbox` member as `[swlon, swlat, nelon, nelat]`
    pub fn bbox(&self) -> Option<[f64; 4]> {
        let values = self.body.get("bbox")?.as_array()?;
        match values.as_slice() {
            [swlon, swlat, nelon, nelat, ..] => Some([
                swlon.as_f64()?,
                swlat.as_f64()?,
                nelon.as_f64()?,
                nelat.as_f64()?,
            ]),
            _ => None,
        }
    }

    /// Look up a raw property by key
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.body.get("properties")?.get(key)
    }

    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.property(key)?.as_str()
    }

    /// Integer property; numeric strings are accepted as well
    pub fn int_property(&self, key: &str) -> Option<i64> {
        match self.property(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn float_property(&self, key: &str) -> Option<f64> {
        self.property(key)?.as_f64()
    }

    /// Deprecated when `edtf:deprecated` holds a real date
    pub fn is_deprecated(&self) -> bool {
        matches!(
            self.string_property("edtf:deprecated"),
            Some(date) if !date.is_empty() && date != "uuuu"
        )
    }

    /// Superseded when `wof:superseded_by` lists at least one record
    pub fn is_superseded(&self) -> bool {
        self.property("wof:superseded_by")
            .and_then(Value::as_array)
            .is_some_and(|ids| !ids.is_empty())
    }

    /// Ancestor chains from `wof:hierarchy`, keeping integer entries only
    pub fn hierarchy(&self) -> Hierarchy {
        let Some(chains) = self.property("wof:hierarchy").and_then(Value::as_array) else {
            return Vec::new();
        };

        chains
            .iter()
            .filter_map(Value::as_object)
            .map(|chain| {
                chain
                    .iter()
                    .filter_map(|(key, value)| value.as_i64().map(|id| (key.clone(), id)))
                    .collect()
            })
            .collect()
    }
}

fn required_string(properties: &Map<String, Value>, key: &str) -> Result<String> {
    match properties.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(WofError::invalid_property(key, "not a string")),
        None => Err(WofError::MissingProperty(key.to_string())),
    }
}
