//! Offset tracker scenarios
//!
//! Drives `TimeData` the way peer connections do and checks the published
//! offset, dedup behaviour and the one-shot clock warning.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use peerclock_time::{
    AdjustedClock, ManualClock, Notifier, TimeConfig, TimeData, TimeDataStatus, CLOCK_WARNING,
    MAX_SAMPLES,
};

// ----------------------------------------------------------------------------
// Test doubles
// ----------------------------------------------------------------------------

#[derive(Default)]
struct RecordingNotifier {
    calls: AtomicUsize,
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn warn_once(&self, message: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.messages.lock().push(message.to_string());
    }
}

fn peer(n: u32) -> IpAddr {
    IpAddr::V4(Ipv4Addr::from(0x0a00_0000 + n))
}

fn tracker(threshold: i64) -> (TimeData<IpAddr>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let time_data = TimeData::new(
        TimeConfig::with_max_time_adjustment(threshold),
        notifier.clone(),
    )
    .expect("standard capacity is valid");
    (time_data, notifier)
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[test]
fn outliers_on_both_sides_leave_median_near_zero() {
    let (time_data, notifier) = tracker(4_200);

    let reports = [300_000, -300_000, 1, -1];
    for (i, offset) in reports.into_iter().enumerate() {
        time_data.add_time_data(peer(i as u32 + 1), offset);
    }
    // Window with seed: [-300000, -1, 0, 1, 300000]
    assert_eq!(time_data.time_offset(), 0);

    // Sixth entry: even count, nothing recomputed.
    time_data.add_time_data(peer(5), 2);
    assert_eq!(time_data.time_offset(), 0);

    // Seventh entry: [-300000, -1, 0, 1, 2, 3, 300000] -> 1
    time_data.add_time_data(peer(6), 3);
    assert_eq!(time_data.time_offset(), 1);
    assert_eq!(notifier.calls(), 0);
}

#[test]
fn even_count_keeps_previous_offset() {
    let (time_data, _) = tracker(4_200);
    for (n, offset) in [(1, 10), (2, 20), (3, 30), (4, 40)] {
        time_data.add_time_data(peer(n), offset);
    }
    // [0, 10, 20, 30, 40]
    assert_eq!(time_data.time_offset(), 20);

    // [0, 10, 20, 30, 40, 1000] would average to 25.
    time_data.add_time_data(peer(5), 1_000);
    assert_eq!(time_data.status().samples, 6);
    assert_eq!(time_data.time_offset(), 20);
}

#[test]
fn median_equal_to_threshold_is_accepted() {
    let (time_data, notifier) = tracker(4_200);
    for n in 1..=4 {
        time_data.add_time_data(peer(n), 4_200);
    }
    assert_eq!(time_data.time_offset(), 4_200);
    assert_eq!(notifier.calls(), 0);
}

#[test]
fn median_above_threshold_is_rejected() {
    let (time_data, notifier) = tracker(4_200);
    for n in 1..=4 {
        time_data.add_time_data(peer(n), 4_201);
    }
    assert_eq!(time_data.time_offset(), 0);
    assert_eq!(notifier.calls(), 1);
    assert_eq!(notifier.messages.lock().as_slice(), [CLOCK_WARNING]);
}

#[test]
fn rejection_resets_a_previously_accepted_offset() {
    let (time_data, _) = tracker(4_200);
    for n in 1..=4 {
        time_data.add_time_data(peer(n), 600);
    }
    assert_eq!(time_data.time_offset(), 600);

    for n in 5..=10 {
        time_data.add_time_data(peer(n), 90_000);
    }
    assert_eq!(time_data.time_offset(), 0);
}

#[test]
fn nearby_peer_suppresses_warning() {
    let (time_data, notifier) = tracker(4_200);
    time_data.add_time_data(peer(1), 120);
    for n in 2..=4 {
        time_data.add_time_data(peer(n), 50_000);
    }
    // [0, 120, 50000, 50000, 50000]: rejected, but one peer agrees with us.
    assert_eq!(time_data.time_offset(), 0);
    assert_eq!(notifier.calls(), 0);
    assert!(!time_data.status().warning_fired);
}

#[test]
fn peers_exactly_on_our_clock_do_not_count_as_agreement() {
    let (time_data, notifier) = tracker(0);
    time_data.add_time_data(peer(1), 0);
    time_data.add_time_data(peer(2), 0);
    time_data.add_time_data(peer(3), 400);
    time_data.add_time_data(peer(4), 400);
    time_data.add_time_data(peer(5), 400);
    time_data.add_time_data(peer(6), 400);
    // [0, 0, 0, 400, 400, 400, 400] -> 400 > 0, no peer in (0, 300).
    assert_eq!(time_data.time_offset(), 0);
    assert_eq!(notifier.calls(), 1);
}

#[test]
fn warning_fires_at_most_once() {
    let (time_data, notifier) = tracker(4_200);
    for n in 1..=MAX_SAMPLES as u32 {
        time_data.add_time_data(peer(n), -86_400);
    }
    assert_eq!(time_data.time_offset(), 0);
    assert_eq!(notifier.calls(), 1);
    assert!(time_data.status().warning_fired);
}

#[test]
fn repeated_peer_changes_nothing() {
    let (time_data, _) = tracker(4_200);
    for n in 1..=4 {
        time_data.add_time_data(peer(n), 30);
    }
    let before = time_data.status();

    time_data.add_time_data(peer(2), -100_000);
    time_data.add_time_data(peer(2), 100_000);

    assert_eq!(time_data.status(), before);
}

#[test]
fn full_peer_set_drops_new_peers() {
    let (time_data, _) = tracker(4_200);
    for n in 1..=MAX_SAMPLES as u32 {
        time_data.add_time_data(peer(n), 15);
    }
    let before = time_data.status();
    assert_eq!(before.known_peers, MAX_SAMPLES);

    time_data.add_time_data(peer(10_000), 3_000);
    assert_eq!(time_data.status(), before);
}

#[test]
fn saturated_window_never_recomputes() {
    let (time_data, _) = tracker(4_200);

    // 198 samples plus the seed: 199 entries, the last odd count.
    for n in 1..=198u32 {
        time_data.add_time_data(peer(n), n as i64);
    }
    // [0, 1, ..., 198]
    assert_eq!(time_data.time_offset(), 99);

    // Peer 199 fills the window, peer 200 pushes the seed out. A recompute
    // over [1, ..., 198, 4000, 4000] would give 100.
    for n in 199..=200 {
        time_data.add_time_data(peer(n), 4_000);
    }
    assert_eq!(time_data.time_offset(), 99);

    // The peer set is full, so none of these are admitted.
    for n in 201..=1_200 {
        time_data.add_time_data(peer(n), 4_000);
    }

    assert_eq!(
        time_data.status(),
        TimeDataStatus {
            offset: 99,
            samples: MAX_SAMPLES,
            known_peers: MAX_SAMPLES,
            warning_fired: false,
        }
    );
}

#[test]
fn small_even_capacity_freezes_early() {
    let notifier = Arc::new(RecordingNotifier::default());
    let time_data: TimeData<u32> =
        TimeData::with_capacity(6, TimeConfig::default(), notifier).unwrap();

    for (n, offset) in [(1, 10), (2, 20), (3, 30), (4, 40)] {
        time_data.add_time_data(n, offset);
    }
    assert_eq!(time_data.time_offset(), 20);

    // Even-count averages would be 25, then 35 once the seed is evicted.
    time_data.add_time_data(5, 1_000);
    assert_eq!(time_data.time_offset(), 20);
    time_data.add_time_data(6, 2_000);
    assert_eq!(time_data.status().samples, 6);
    assert_eq!(time_data.time_offset(), 20);
}

#[test]
fn zero_capacity_tracker_is_rejected() {
    let notifier = Arc::new(RecordingNotifier::default());
    let result = TimeData::<u32>::with_capacity(0, TimeConfig::default(), notifier);
    assert!(result.is_err());
}

#[test]
fn adjusted_clock_applies_peer_time() {
    let (time_data, _) = tracker(4_200);
    let clock = ManualClock::new(1_700_000_000);

    for n in 1..=4 {
        let sample = time_data.ingest_peer_time(peer(n), 1_700_000_045, &clock);
        assert_eq!(sample, 45);
    }

    let adjusted = AdjustedClock::new(&clock, &time_data);
    assert_eq!(adjusted.adjusted_time(), 1_700_000_045);
}

#[test]
fn concurrent_peers_are_each_admitted_once() {
    let (time_data, notifier) = tracker(4_200);
    let time_data = Arc::new(time_data);

    let threads: Vec<_> = (0..8u32)
        .map(|t| {
            let time_data = Arc::clone(&time_data);
            thread::spawn(move || {
                for i in 0..50u32 {
                    // Every peer id is submitted by two threads.
                    let id = (t / 2) * 50 + i;
                    time_data.add_time_data(peer(id), 60);
                    let offset = time_data.time_offset();
                    assert!(offset == 0 || offset == 60);
                }
            })
        })
        .collect();

    for t in threads {
        t.join().expect("thread must not panic");
    }

    let status = time_data.status();
    assert_eq!(status.known_peers, MAX_SAMPLES);
    assert_eq!(status.samples, MAX_SAMPLES);
    assert_eq!(status.offset, 60);
    assert_eq!(notifier.calls(), 0);
}
