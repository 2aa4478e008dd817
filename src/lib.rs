//! Loading and analysis of opto-transport lab measurements.
//!
//! A measurement file (a sweep-database `.db` snapshot or a spectral
//! `.csv` table, with an optional `.json` metadata sibling) loads into a
//! [`MeasurementRecord`]: an ordered collection of labeled tables plus a
//! metadata mapping. Domain-specific processors then derive physical
//! quantities column-by-column: [`OpticalSignalProcessor`] for spectra,
//! [`TransportSignalProcessor`] for transport sweeps.

pub mod enums;
pub mod errors;
pub mod loader;
pub mod optics;
pub mod record;
pub mod resolve;
pub mod signal;
pub mod transport;

pub use enums::{CosineWindow, SweepDirection, SweepType};
pub use errors::{DataError, Result};
pub use loader::{load, write_metadata_json};
pub use optics::OpticalSignalProcessor;
pub use record::{MeasurementRecord, Param, TableMap};
pub use resolve::{load_with, ExplicitPath, PathResolver};
pub use transport::{BField, Sweep2d, TransportSignalProcessor};
