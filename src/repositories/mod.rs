pub mod scan;

pub use scan::{DueScans, ScanRepository, ScanStore, UndecodableScan};
