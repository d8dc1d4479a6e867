//! Peer-assisted clock offset tracking.
//!
//! Peers report their clock during the handshake. Each distinct peer may
//! contribute one offset sample for the lifetime of the process; the median
//! of those samples becomes the published offset as long as it stays within
//! the configured adjustment bound.
//!
//! Three time sources are weighed against each other: the system clock, the
//! median of peer clocks, and the user, who is asked to fix the system clock
//! when the first two disagree.
//!
//! The recompute only runs on an odd sample count. Once the window holds
//! [`MAX_SAMPLES`] (an even number) entries its size never changes again, so
//! the published offset is frozen from then on. This caps how far a late
//! flood of peers can drag the clock and is kept on purpose.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, Level};

use crate::clock::SystemClock;
use crate::config::TimeConfig;
use crate::errors::Result;
use crate::median_filter::MedianFilter;
use crate::warnings::{Notifier, CLOCK_WARNING};

/// Capacity of both the peer dedup set and the sample window.
pub const MAX_SAMPLES: usize = 200;

/// Samples required before the median is trusted.
pub const MIN_SAMPLES: usize = 5;

/// A peer within this many seconds of our clock (and not exactly on it)
/// counts as agreeing with us and suppresses the clock warning.
pub const CLOSE_MATCH_SECS: u64 = 5 * 60;

/// Raw offset sample from a peer's advertised time and our own clock.
pub fn offset_from_peer_time(peer_time: i64, now: i64) -> i64 {
    peer_time.wrapping_sub(now)
}

/// Peer identifiers that have already contributed a sample.
///
/// Bounded, and never evicts: once full, new identifiers are refused.
#[derive(Debug)]
struct KnownPeers<P> {
    peers: HashSet<P>,
    capacity: usize,
}

impl<P: Eq + Hash> KnownPeers<P> {
    fn new(capacity: usize) -> Self {
        Self {
            peers: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn is_full(&self) -> bool {
        self.peers.len() == self.capacity
    }

    /// Returns true if `peer` was newly admitted.
    fn admit(&mut self, peer: P) -> bool {
        if self.is_full() {
            return false;
        }
        self.peers.insert(peer)
    }

    fn len(&self) -> usize {
        self.peers.len()
    }
}

#[derive(Debug)]
struct TimeDataState<P> {
    known_peers: KnownPeers<P>,
    offsets: MedianFilter<i64>,
    offset: i64,
    warning_fired: bool,
}

/// Point-in-time view of the tracker, taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDataStatus {
    /// Currently published offset in seconds.
    pub offset: i64,
    /// Samples in the median window, seed included.
    pub samples: usize,
    /// Distinct peers admitted so far.
    pub known_peers: usize,
    pub warning_fired: bool,
}

/// Process-wide offset tracker shared by every peer connection.
///
/// All state sits behind a single lock so the dedup check, filter update,
/// threshold decision and warning latch are applied atomically per sample.
pub struct TimeData<P> {
    state: Mutex<TimeDataState<P>>,
    threshold: i64,
    notifier: Arc<dyn Notifier>,
}

impl<P: Eq + Hash> TimeData<P> {
    /// Create a tracker with the standard [`MAX_SAMPLES`] window.
    pub fn new(config: TimeConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        Self::with_capacity(MAX_SAMPLES, config, notifier)
    }

    /// Create a tracker whose dedup set and sample window hold `capacity`
    /// entries each.
    pub fn with_capacity(
        capacity: usize,
        config: TimeConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let offsets = MedianFilter::new(capacity, 0)?;
        Ok(Self {
            state: Mutex::new(TimeDataState {
                known_peers: KnownPeers::new(capacity),
                offsets,
                offset: 0,
                warning_fired: false,
            }),
            threshold: config.threshold(),
            notifier,
        })
    }

    /// Currently published offset in seconds.
    pub fn time_offset(&self) -> i64 {
        self.state.lock().offset
    }

    /// Accepted offset bound in seconds.
    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn status(&self) -> TimeDataStatus {
        let state = self.state.lock();
        TimeDataStatus {
            offset: state.offset,
            samples: state.offsets.size(),
            known_peers: state.known_peers.len(),
            warning_fired: state.warning_fired,
        }
    }

    /// Record the offset sample reported for `peer`.
    ///
    /// Repeat samples from a known peer, and any sample once the dedup set is
    /// full, are dropped without touching state.
    pub fn add_time_data(&self, peer: P, offset_sample: i64) {
        let fire_warning = {
            let mut state = self.state.lock();
            self.apply_sample(&mut state, peer, offset_sample)
        };

        // The latch is already set; deliver outside the lock.
        if fire_warning {
            self.notifier.warn_once(CLOCK_WARNING);
        }
    }

    /// Turn a peer's advertised epoch seconds into a sample and record it.
    /// Returns the raw sample.
    pub fn ingest_peer_time<C>(&self, peer: P, peer_time: i64, clock: &C) -> i64
    where
        C: SystemClock + ?Sized,
    {
        let sample = offset_from_peer_time(peer_time, clock.now());
        self.add_time_data(peer, sample);
        sample
    }

    /// Returns true when the clock warning latch was tripped by this sample.
    fn apply_sample(&self, state: &mut TimeDataState<P>, peer: P, offset_sample: i64) -> bool {
        if !state.known_peers.admit(peer) {
            return false;
        }

        state.offsets.input(offset_sample);
        let samples = state.offsets.size();
        debug!(
            target: "net",
            samples,
            offset = offset_sample,
            minutes = offset_sample / 60,
            "added time data"
        );

        if samples < MIN_SAMPLES || samples % 2 == 0 {
            return false;
        }

        let median = state.offsets.median();
        let sorted = state.offsets.snapshot_sorted();
        let mut fire_warning = false;

        if median.unsigned_abs() <= self.threshold as u64 {
            state.offset = median;
        } else {
            state.offset = 0;

            if !state.warning_fired {
                let any_close = sorted
                    .iter()
                    .any(|&v| v != 0 && v.unsigned_abs() < CLOSE_MATCH_SECS);
                if !any_close {
                    state.warning_fired = true;
                    fire_warning = true;
                }
            }
        }

        if tracing::enabled!(target: "net", Level::DEBUG) {
            let samples_line = sorted
                .iter()
                .map(|v| format!("{v:+}"))
                .collect::<Vec<_>>()
                .join("  ");
            debug!(
                target: "net",
                offset = state.offset,
                minutes = state.offset / 60,
                "{samples_line}  |  time offset updated"
            );
        }

        fire_warning
    }
}
