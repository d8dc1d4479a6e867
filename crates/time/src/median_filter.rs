//! Sliding-window median filter.
//!
//! Keeps the last `capacity` values in arrival order and a sorted copy that
//! is rebuilt on every insertion. The window is seeded at construction, so it
//! is never empty and [`MedianFilter::median`] is always defined.
//!
//! Inputs arrive at peer-handshake frequency, so a full re-sort per sample is
//! cheap enough and keeps the structure trivially correct.

use std::collections::VecDeque;

use num_traits::{Num, WrappingAdd};

use crate::errors::{Result, TimeDataError};

/// Median over the most recent `capacity` values of a stream.
#[derive(Debug, Clone)]
pub struct MedianFilter<T> {
    capacity: usize,
    window: VecDeque<T>,
    sorted: Vec<T>,
}

impl<T> MedianFilter<T>
where
    T: Copy + Ord + Num + WrappingAdd,
{
    /// Create a filter holding at most `capacity` values, seeded with `seed`.
    pub fn new(capacity: usize, seed: T) -> Result<Self> {
        if capacity == 0 {
            return Err(TimeDataError::InvalidCapacity);
        }

        let mut window = VecDeque::with_capacity(capacity);
        window.push_back(seed);

        Ok(Self {
            capacity,
            window,
            sorted: vec![seed],
        })
    }

    /// Push a value, evicting the oldest one when the window is full.
    pub fn input(&mut self, value: T) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);

        self.sorted.clear();
        self.sorted.extend(self.window.iter().copied());
        self.sorted.sort();
    }

    /// Median of the current window.
    ///
    /// For an even number of values this is the average of the two middle
    /// ones, using `T`'s own division (truncating for integers). The sum
    /// wraps on overflow.
    pub fn median(&self) -> T {
        let n = self.sorted.len();
        let mid = n / 2;
        if n % 2 == 1 {
            self.sorted[mid]
        } else {
            let two = T::one() + T::one();
            self.sorted[mid - 1].wrapping_add(&self.sorted[mid]) / two
        }
    }

    /// Number of values currently retained.
    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Upper bound on [`MedianFilter::size`], fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the retained values in non-decreasing order.
    pub fn snapshot_sorted(&self) -> Vec<T> {
        self.sorted.clone()
    }
}
