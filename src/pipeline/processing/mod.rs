// Pipeline processing: schema resolution, normalization, geocoding, and recurrence

pub mod batch;
pub mod dates;
pub mod diagnostics;
pub mod geocode;
pub mod normalize;
pub mod recurrence;
pub mod schema;
