//! Adjusted network time: local clock plus the peer-derived offset.

use std::hash::Hash;

use crate::clock::SystemClock;
use crate::timedata::TimeData;

/// Reads the system clock and the published offset on every call.
pub struct AdjustedClock<'a, C: ?Sized, P> {
    clock: &'a C,
    time_data: &'a TimeData<P>,
}

impl<'a, C, P> AdjustedClock<'a, C, P>
where
    C: SystemClock + ?Sized,
    P: Eq + Hash,
{
    pub fn new(clock: &'a C, time_data: &'a TimeData<P>) -> Self {
        Self { clock, time_data }
    }

    /// Epoch seconds corrected by the current offset.
    pub fn adjusted_time(&self) -> i64 {
        self.clock.now().wrapping_add(self.time_data.time_offset())
    }

    pub fn time_offset(&self) -> i64 {
        self.time_data.time_offset()
    }
}
