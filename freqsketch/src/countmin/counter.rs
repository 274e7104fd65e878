// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt;
use std::io;
use std::str::FromStr;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;

/// Counter encoding used by every cell of a Count-Min sketch.
///
/// The encoding fixes the physical cell size, and with it how many cells a
/// memory budget buys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Exact 32-bit counters with conservative update, saturating at
    /// `u32::MAX`.
    #[default]
    Conservative,
    /// 16-bit probabilistic logarithmic counters with scale 1024.
    ///
    /// Counts stay nearly exact into the low thousands; relative error is
    /// about 2% beyond that.
    Log1024,
    /// 8-bit probabilistic logarithmic counters with scale 8.
    ///
    /// The smallest cells, with about 25% relative error on large counts.
    Log8,
}

impl Algorithm {
    /// All supported algorithms.
    pub const ALL: [Algorithm; 3] = [Algorithm::Conservative, Algorithm::Log1024, Algorithm::Log8];

    /// Returns the configuration name of this algorithm.
    pub const fn name(self) -> &'static str {
        match self {
            Algorithm::Conservative => "conservative",
            Algorithm::Log1024 => "log1024",
            Algorithm::Log8 => "log8",
        }
    }

    /// Returns the size in bytes of one counter cell.
    pub const fn cell_bytes(self) -> usize {
        match self {
            Algorithm::Conservative => Conservative::CELL_BYTES,
            Algorithm::Log1024 => Log1024::CELL_BYTES,
            Algorithm::Log8 => Log8::CELL_BYTES,
        }
    }

    /// Returns whether increments draw from the sketch's random source.
    pub const fn is_probabilistic(self) -> bool {
        !matches!(self, Algorithm::Conservative)
    }

    pub(crate) const fn tag(self) -> u8 {
        match self {
            Algorithm::Conservative => 0,
            Algorithm::Log1024 => 1,
            Algorithm::Log8 => 2,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Parses one of `conservative`, `log1024` or `log8`. Matching is exact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == s)
            .ok_or_else(|| {
                Error::invalid_config(
                    "unknown algorithm, expected one of conservative, log1024, log8",
                )
                .with_context("algorithm", format!("{s:?}"))
            })
    }
}

impl TryFrom<&str> for Algorithm {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<u8> for Algorithm {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.tag() == tag)
            .ok_or_else(|| {
                Error::invalid_config("unknown algorithm tag").with_context("tag", tag)
            })
    }
}

/// Per-algorithm rule for storing one logical count in a fixed-width cell.
pub(crate) trait CounterCodec {
    type Cell: Copy + Default + Ord + fmt::Debug + Send + Sync + 'static;

    const ALGORITHM: Algorithm;
    const CELL_BYTES: usize;

    /// Whether only the cells at the row minimum are raised on increment.
    const CONSERVATIVE_UPDATE: bool;

    /// Returns the cell after adding `amount` to the count it represents.
    ///
    /// `draw` is a uniform sample in `[0, 1)`; deterministic codecs ignore it.
    fn apply_increment(cell: Self::Cell, amount: u64, draw: f64) -> Self::Cell;

    /// Returns the count a cell represents.
    fn decode(cell: Self::Cell) -> u64;

    /// Returns a cell representing the sum of two cells.
    fn combine(left: Self::Cell, right: Self::Cell, draw: f64) -> Self::Cell;

    fn write_cell(bytes: &mut SketchBytes, cell: Self::Cell);

    fn read_cell(slice: &mut SketchSlice<'_>) -> io::Result<Self::Cell>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Conservative;

impl CounterCodec for Conservative {
    type Cell = u32;

    const ALGORITHM: Algorithm = Algorithm::Conservative;
    const CELL_BYTES: usize = 4;
    const CONSERVATIVE_UPDATE: bool = true;

    #[inline]
    fn apply_increment(cell: u32, amount: u64, _draw: f64) -> u32 {
        u64::from(cell)
            .saturating_add(amount)
            .min(u64::from(u32::MAX)) as u32
    }

    #[inline]
    fn decode(cell: u32) -> u64 {
        u64::from(cell)
    }

    #[inline]
    fn combine(left: u32, right: u32, _draw: f64) -> u32 {
        left.saturating_add(right)
    }

    fn write_cell(bytes: &mut SketchBytes, cell: u32) {
        bytes.write_u32_le(cell);
    }

    fn read_cell(slice: &mut SketchSlice<'_>) -> io::Result<u32> {
        slice.read_u32_le()
    }
}

/// Morris counter arithmetic for scale `a`.
///
/// Level `v` represents `a * (g^v - 1)` with growth `g = 1 + 1/a`, so the gap
/// between levels `v` and `v + 1` is exactly `g^v`.
struct MorrisScale {
    scale: f64,
}

impl MorrisScale {
    const fn new(scale: f64) -> Self {
        MorrisScale { scale }
    }

    #[inline]
    fn ln_growth(&self) -> f64 {
        (1.0 / self.scale).ln_1p()
    }

    #[inline]
    fn gap(&self, level: u32) -> f64 {
        (f64::from(level) * self.ln_growth()).exp()
    }

    #[inline]
    fn decode(&self, level: u32) -> u64 {
        // Float to int casts saturate, so overflowing levels read as u64::MAX.
        (self.scale * (f64::from(level) * self.ln_growth()).exp_m1()).round() as u64
    }

    /// Advances `level` by `amount` counts, never beyond `max_level`.
    fn increment(&self, level: u32, max_level: u32, amount: u64, draw: f64) -> u32 {
        let mut level = level;
        let mut remaining = amount as f64;
        while remaining > 0.0 && level < max_level {
            let gap = self.gap(level);
            if remaining >= gap {
                level += 1;
                remaining -= gap;
            } else {
                if draw * gap < remaining {
                    level += 1;
                }
                break;
            }
        }
        level
    }
}

macro_rules! impl_log_codec {
    ($name:ident, $cell:ty, $scale:expr, $algorithm:expr, $write:ident, $read:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub(crate) struct $name;

        impl $name {
            const MORRIS: MorrisScale = MorrisScale::new($scale);
        }

        impl CounterCodec for $name {
            type Cell = $cell;

            const ALGORITHM: Algorithm = $algorithm;
            const CELL_BYTES: usize = std::mem::size_of::<$cell>();
            const CONSERVATIVE_UPDATE: bool = false;

            #[inline]
            fn apply_increment(cell: $cell, amount: u64, draw: f64) -> $cell {
                let level = Self::MORRIS.increment(
                    u32::from(cell),
                    u32::from(<$cell>::MAX),
                    amount,
                    draw,
                );
                level as $cell
            }

            #[inline]
            fn decode(cell: $cell) -> u64 {
                Self::MORRIS.decode(u32::from(cell))
            }

            #[inline]
            fn combine(left: $cell, right: $cell, draw: f64) -> $cell {
                let (high, low) = if left >= right {
                    (left, right)
                } else {
                    (right, left)
                };
                Self::apply_increment(high, Self::decode(low), draw)
            }

            fn write_cell(bytes: &mut SketchBytes, cell: $cell) {
                bytes.$write(cell);
            }

            fn read_cell(slice: &mut SketchSlice<'_>) -> io::Result<$cell> {
                slice.$read()
            }
        }
    };
}

impl_log_codec!(Log1024, u16, 1024.0, Algorithm::Log1024, write_u16_le, read_u16_le);
impl_log_codec!(Log8, u8, 8.0, Algorithm::Log8, write_u8, read_u8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RandomSource;
    use crate::common::XorShift64;

    #[test]
    fn test_algorithm_names_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.name().parse::<Algorithm>().unwrap(), algorithm);
            assert_eq!(Algorithm::try_from(algorithm.tag()).unwrap(), algorithm);
        }
        assert_eq!(Algorithm::default(), Algorithm::Conservative);
    }

    #[test]
    fn test_algorithm_rejects_unknown_names() {
        for name in ["basic", "cons", "logcounter", "", "5", "Conservative", " log8"] {
            let err = name.parse::<Algorithm>().unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::InvalidConfiguration);
        }
        assert!(Algorithm::try_from(5u8).is_err());
    }

    #[test]
    fn test_cell_bytes() {
        assert_eq!(Algorithm::Conservative.cell_bytes(), 4);
        assert_eq!(Algorithm::Log1024.cell_bytes(), 2);
        assert_eq!(Algorithm::Log8.cell_bytes(), 1);
        assert_eq!(Conservative::ALGORITHM, Algorithm::Conservative);
        assert_eq!(Log1024::ALGORITHM, Algorithm::Log1024);
        assert_eq!(Log8::ALGORITHM, Algorithm::Log8);
    }

    #[test]
    fn test_conservative_saturates() {
        assert_eq!(Conservative::apply_increment(5, 3, 0.0), 8);
        assert_eq!(Conservative::apply_increment(u32::MAX - 1, 10, 0.0), u32::MAX);
        assert_eq!(Conservative::apply_increment(7, u64::MAX, 0.0), u32::MAX);
        assert_eq!(Conservative::combine(u32::MAX, 1, 0.0), u32::MAX);
        assert_eq!(Conservative::decode(123), 123);
    }

    #[test]
    fn test_log_decode_anchors() {
        assert_eq!(Log1024::decode(0), 0);
        assert_eq!(Log1024::decode(1), 1);
        assert_eq!(Log8::decode(0), 0);
        assert_eq!(Log8::decode(1), 1);
        // Level 2 of scale 8 sits at 1 + 9/8.
        assert_eq!(Log8::decode(2), 2);
        assert!(Log8::decode(u8::MAX) > 1_000_000_000_000);
        assert_eq!(Log1024::decode(u16::MAX), u64::MAX);
    }

    #[test]
    fn test_log_decode_is_monotonic() {
        let mut previous = 0;
        for level in 1..=u8::MAX {
            let value = Log8::decode(level);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_log_first_increment_is_certain() {
        assert_eq!(Log8::apply_increment(0, 1, 0.999), 1);
        assert_eq!(Log1024::apply_increment(0, 1, 0.999), 1);
    }

    #[test]
    fn test_log_increment_probability_follows_level() {
        // At level 10 of scale 8 the gap is 1.125^10 ~ 3.25.
        let gap = 1.125f64.powi(10);
        assert_eq!(Log8::apply_increment(10, 1, 1.0 / gap - 1e-9), 11);
        assert_eq!(Log8::apply_increment(10, 1, 1.0 / gap + 1e-9), 10);
    }

    #[test]
    fn test_log_saturates_at_cell_max() {
        assert_eq!(Log8::apply_increment(u8::MAX, 1_000, 0.0), u8::MAX);
        assert_eq!(Log8::apply_increment(0, u64::MAX, 0.5), u8::MAX);
    }

    #[test]
    fn test_log_weighted_increment_is_unbiased() {
        let mut rng = XorShift64::seeded(17);
        let trials = 2_000;
        let amount = 5_000u64;
        let mut sum = 0.0;
        for _ in 0..trials {
            let cell = Log8::apply_increment(0, amount, rng.next_f64());
            sum += Log8::decode(cell) as f64;
        }
        let mean = sum / trials as f64;
        let relative = (mean - amount as f64).abs() / amount as f64;
        assert!(relative < 0.05, "mean {mean} for amount {amount}");
    }

    #[test]
    fn test_log_unit_increments_are_unbiased() {
        let mut rng = XorShift64::seeded(99);
        let trials = 1_000;
        let count = 2_000;
        let mut sum = 0.0;
        for _ in 0..trials {
            let mut cell = 0u8;
            for _ in 0..count {
                cell = Log8::apply_increment(cell, 1, rng.next_f64());
            }
            sum += Log8::decode(cell) as f64;
        }
        let mean = sum / trials as f64;
        let relative = (mean - count as f64).abs() / count as f64;
        assert!(relative < 0.05, "mean {mean} for count {count}");
    }

    #[test]
    fn test_log1024_is_exact_for_small_counts() {
        let mut cell = 0u16;
        let mut rng = XorShift64::seeded(3);
        for _ in 0..10 {
            cell = Log1024::apply_increment(cell, 1, rng.next_f64());
        }
        // Gaps stay below 1.01 over the first ten levels, so skipped
        // increments are rare.
        let estimate = Log1024::decode(cell);
        assert!((8..=10).contains(&estimate), "estimate {estimate}");
    }

    #[test]
    fn test_log_combine_keeps_expected_sum() {
        let mut rng = XorShift64::seeded(5);
        let left = Log8::apply_increment(0, 300, 0.5);
        let right = Log8::apply_increment(0, 100, 0.5);
        let expected = (Log8::decode(left) + Log8::decode(right)) as f64;
        let trials = 2_000;
        let mut sum = 0.0;
        for _ in 0..trials {
            sum += Log8::decode(Log8::combine(left, right, rng.next_f64())) as f64;
        }
        let mean = sum / trials as f64;
        assert!((mean - expected).abs() / expected < 0.05, "mean {mean}");
    }
}
