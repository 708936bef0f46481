// Pipeline ingestion: pipe-delimited bulk files and the zipped summary grids

pub mod delimited;
pub mod grid_import;
