//! Pipeline entry points.
//!
//! - `batch`: bulk submissions in bounded concurrent groups
//! - `scan`: continuous per-detection processing with a session

pub mod batch;
pub mod scan;

pub use batch::{AbortHandle, BatchProcessor, BatchReport, run_bulk};
pub use scan::{ScanProcessor, ScanSession, ScanSummary, run_scan};
