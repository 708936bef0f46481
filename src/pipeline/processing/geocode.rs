use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::pipeline::processing::diagnostics::NormalizeDiagnostics;

/// Only the first five characters of a postal value are looked up (ZIP+4 collapses to ZIP)
pub const POSTAL_PREFIX_LEN: usize = 5;

/// Latitude/longitude as reported by a postal-code source; either side may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoPoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Resolved coordinates; `(0.0, 0.0)` stands for "unknown".
pub type Coordinates = (f64, f64);

/// Source of postal-code coordinates. An error aborts the current file.
pub trait PostalLookup {
    fn query_postal_code(&self, code: &str) -> Result<Option<GeoPoint>>;
}

/// Run-scoped memo of postal value -> coordinates around an injected lookup.
///
/// The cache key is the raw value exactly as the caller passed it, so `"98101"` and
/// `"981011234"` are separate entries even though both query `"98101"`.
pub struct GeocodeCache<L> {
    lookup: L,
    entries: HashMap<String, Coordinates>,
    lookups: usize,
}

impl<L: PostalLookup> GeocodeCache<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            entries: HashMap::new(),
            lookups: 0,
        }
    }

    /// Number of calls made to the underlying lookup so far
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a raw postal value, consulting the lookup at most once per distinct value.
    pub fn resolve(
        &mut self,
        raw: Option<&str>,
        diagnostics: &mut NormalizeDiagnostics,
    ) -> Result<Coordinates> {
        let Some(raw) = raw else {
            diagnostics.geocode_unresolved();
            return Ok((0.0, 0.0));
        };
        if let Some(coords) = self.entries.get(raw) {
            return Ok(*coords);
        }

        let code: String = raw.trim().chars().take(POSTAL_PREFIX_LEN).collect();
        self.lookups += 1;
        diagnostics.geocode_lookup();
        let point = self.lookup.query_postal_code(&code)?;

        let coords = match point {
            Some(GeoPoint { latitude, longitude }) => {
                if latitude.is_none() || longitude.is_none() {
                    diagnostics.geocode_unresolved();
                }
                (latitude.unwrap_or(0.0), longitude.unwrap_or(0.0))
            }
            None => {
                debug!(postal_code = %code, "postal code not found");
                diagnostics.geocode_unresolved();
                (0.0, 0.0)
            }
        };
        self.entries.insert(raw.to_string(), coords);
        Ok(coords)
    }
}

/// Postal-code table loaded from a GeoNames dump.
///
/// Tab-separated, no header: country, postal code, place name, three admin
/// name/code pairs, latitude, longitude, accuracy. Codes listed more than once
/// resolve to the mean of their coordinates.
#[derive(Debug, Default, Clone)]
pub struct GeoNamesTable {
    points: HashMap<String, GeoPoint>,
}

const GEONAMES_POSTAL_CODE: usize = 1;
const GEONAMES_LATITUDE: usize = 9;
const GEONAMES_LONGITUDE: usize = 10;

impl GeoNamesTable {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            PipelineError::Geocode(format!("cannot open postal table {}: {}", path.display(), e))
        })?;
        let table = Self::from_reader(file)?;
        info!(path = %path.display(), codes = table.len(), "Loaded postal-code table");
        Ok(table)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        // (lat sum, lat count, lon sum, lon count)
        let mut sums: HashMap<String, (f64, u32, f64, u32)> = HashMap::new();
        for row in rdr.records() {
            let row = row?;
            let Some(code) = row.get(GEONAMES_POSTAL_CODE).map(str::trim) else {
                continue;
            };
            if code.is_empty() {
                continue;
            }
            let parse = |idx: usize| row.get(idx).and_then(|v| v.trim().parse::<f64>().ok());
            let entry = sums.entry(code.to_string()).or_default();
            if let Some(lat) = parse(GEONAMES_LATITUDE) {
                entry.0 += lat;
                entry.1 += 1;
            }
            if let Some(lon) = parse(GEONAMES_LONGITUDE) {
                entry.2 += lon;
                entry.3 += 1;
            }
        }

        let mean = |sum: f64, n: u32| (n > 0).then(|| sum / n as f64);
        let points = sums
            .into_iter()
            .map(|(code, (lat, nlat, lon, nlon))| {
                (
                    code,
                    GeoPoint {
                        latitude: mean(lat, nlat),
                        longitude: mean(lon, nlon),
                    },
                )
            })
            .collect();
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PostalLookup for GeoNamesTable {
    fn query_postal_code(&self, code: &str) -> Result<Option<GeoPoint>> {
        Ok(self.points.get(code).copied())
    }
}

impl<T: PostalLookup + ?Sized> PostalLookup for &T {
    fn query_postal_code(&self, code: &str) -> Result<Option<GeoPoint>> {
        (**self).query_postal_code(code)
    }
}
