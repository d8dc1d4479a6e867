//! peerclock Time Library
//!
//! Estimates how far the local clock is off from the network, using the
//! offsets peers report during their handshake.
//!
//! # Features
//! - Seeded sliding-window median filter, generic over integer types
//! - One sample per peer, bounded dedup set
//! - Median accepted only within a configurable bound (default 70 minutes)
//! - One-shot user warning when every peer disagrees with the local clock
//! - Adjusted time as system clock plus published offset

pub mod adjusted;
pub mod clock;
pub mod config;
pub mod errors;
pub mod median_filter;
pub mod timedata;
pub mod warnings;

pub use adjusted::AdjustedClock;
pub use clock::{ManualClock, SystemClock, WallClock};
pub use config::{TimeConfig, DEFAULT_MAX_TIME_ADJUSTMENT};
pub use errors::{Result, TimeDataError};
pub use median_filter::MedianFilter;
pub use timedata::{
    offset_from_peer_time, TimeData, TimeDataStatus, CLOSE_MATCH_SECS, MAX_SAMPLES, MIN_SAMPLES,
};
pub use warnings::{Notifier, WarningRegistry, CLOCK_WARNING};
