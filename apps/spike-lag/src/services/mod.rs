pub mod analysis;
pub mod batch;
pub mod series_cache;
