//! Reference-network augmentation.
//!
//! Finds permanent stations around the deployment through a remote
//! [`StationService`], fetches their waveforms for the event window and
//! writes them beside the primary traces. Failures stay per station.

mod augment;
mod bbox;
mod fdsn;
mod service;
mod station;

pub use augment::{ReferenceAugmenter, ReferenceOptions, ReferenceReport, StationOutcome};
pub use bbox::BoundingBox;
pub use fdsn::FdsnClient;
pub use service::{RemoteError, StationService};
pub use station::{Station, read_station_file, read_stations, write_station_file, write_stations};
