//! The immutable, ordered set of stops positions are matched against.

mod catalog;

pub use catalog::{BuiltinCatalog, FileCatalog, HttpCatalog, StopCatalog, catalog_for_source};

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::Stop;

/// Read-only stop list. Iteration order is the load order, which is also the
/// tie-break order for nearest-stop matching.
#[derive(Debug, Clone)]
pub struct StopRegistry {
    stops: Vec<Stop>,
}

impl StopRegistry {
    /// Builds a registry, rejecting duplicate ids and non-finite coordinates.
    ///
    /// Ids whose ordinal does not parse are accepted here; they fail per event
    /// when a vehicle is matched to them. See [`StopRegistry::malformed_ids`].
    pub fn new(stops: Vec<Stop>) -> Result<Self> {
        let mut seen = HashSet::new();
        for stop in &stops {
            if !seen.insert(stop.stop_id.as_str()) {
                return Err(Error::Catalog(format!("duplicate stop id '{}'", stop.stop_id)));
            }
            if !stop.latitude.is_finite() || !stop.longitude.is_finite() {
                return Err(Error::Catalog(format!(
                    "stop '{}' has non-finite coordinates",
                    stop.stop_id
                )));
            }
        }
        Ok(Self { stops })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn get(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.stop_id == stop_id)
    }

    /// Ids whose embedded ordinal cannot be parsed.
    pub fn malformed_ids(&self) -> Vec<&str> {
        self.stops
            .iter()
            .filter(|s| s.sequence_number().is_err())
            .map(|s| s.stop_id.as_str())
            .collect()
    }
}

impl Default for StopRegistry {
    fn default() -> Self {
        Self {
            stops: default_stops(),
        }
    }
}

/// The reference stop set of the Lima deployment.
pub fn default_stops() -> Vec<Stop> {
    vec![
        Stop::new("P001", "Terminal Norte", "Av. Principal 123", -12.0464, -77.0428),
        Stop::new("P002", "Plaza Mayor", "Jr. Unión 456", -12.0565, -77.0352),
        Stop::new("P003", "Parque Central", "Av. Arequipa 789", -12.0689, -77.0389),
        Stop::new("P004", "Centro Comercial", "Av. Javier Prado 321", -12.0834, -77.0321),
        Stop::new("P005", "Universidad", "Av. Universitaria 654", -12.0721, -77.0784),
        Stop::new("P006", "Hospital Regional", "Av. Salud 987", -12.0612, -77.0456),
    ]
}
