//! Placetype vocabulary
//!
//! Maps placetype names to the numeric codes stored in `placetype_id`.

use std::collections::HashMap;

use crate::error::{Result, WofError};

/// One entry of the placetype vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placetype {
    pub id: i64,
    pub name: &'static str,
    pub role: &'static str,
}

const VOCABULARY: &[Placetype] = &[
    Placetype { id: 102312341, name: "planet", role: "common" },
    Placetype { id: 102312309, name: "continent", role: "common" },
    Placetype { id: 404528709, name: "ocean", role: "common" },
    Placetype { id: 136057795, name: "empire", role: "common_optional" },
    Placetype { id: 102312307, name: "country", role: "common" },
    Placetype { id: 102322043, name: "disputed", role: "common_optional" },
    Placetype { id: 102312331, name: "dependency", role: "common_optional" },
    Placetype { id: 404528711, name: "marinearea", role: "common_optional" },
    Placetype { id: 404227475, name: "macroregion", role: "optional" },
    Placetype { id: 102312311, name: "region", role: "common" },
    Placetype { id: 404221413, name: "macrocounty", role: "optional" },
    Placetype { id: 102312313, name: "county", role: "common_optional" },
    Placetype { id: 404221409, name: "localadmin", role: "common_optional" },
    Placetype { id: 102312317, name: "locality", role: "common" },
    Placetype { id: 421205765, name: "borough", role: "optional" },
    Placetype { id: 1108906905, name: "macrohood", role: "optional" },
    Placetype { id: 102312319, name: "neighbourhood", role: "common" },
    Placetype { id: 102312321, name: "microhood", role: "optional" },
    Placetype { id: 1159268867, name: "campus", role: "common_optional" },
    Placetype { id: 102312325, name: "venue", role: "common" },
    Placetype { id: 102312327, name: "building", role: "optional" },
    Placetype { id: 102312329, name: "address", role: "optional" },
    Placetype { id: 102312323, name: "postalcode", role: "optional" },
    Placetype { id: 102320821, name: "timezone", role: "optional" },
    Placetype { id: 1159162573, name: "intersection", role: "optional" },
];

/// Name-indexed placetype vocabulary
#[derive(Debug, Clone)]
pub struct Placetypes {
    by_name: HashMap<&'static str, Placetype>,
}

impl Placetypes {
    /// Load the built-in vocabulary
    pub fn new() -> Self {
        Self {
            by_name: VOCABULARY.iter().map(|pt| (pt.name, *pt)).collect(),
        }
    }

    /// Resolve a placetype by name
    pub fn by_name(&self, name: &str) -> Result<&Placetype> {
        self.by_name
            .get(name)
            .ok_or_else(|| WofError::UnknownPlacetype(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for Placetypes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup_by_name() {
        let placetypes = Placetypes::new();
        assert_eq!(placetypes.by_name("country").unwrap().id, 102312307);
        assert_eq!(placetypes.by_name("locality").unwrap().id, 102312317);
    }

    #[test]
    fn test_unknown_placetype() {
        let placetypes = Placetypes::new();
        let err = placetypes.by_name("galaxy").unwrap_err();
        assert!(matches!(err, WofError::UnknownPlacetype(name) if name == "galaxy"));
    }

    #[test]
    fn test_codes_are_unique() {
        let ids: HashSet<i64> = VOCABULARY.iter().map(|pt| pt.id).collect();
        assert_eq!(ids.len(), VOCABULARY.len());
        assert_eq!(Placetypes::new().len(), VOCABULARY.len());
    }
}
