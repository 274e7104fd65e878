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

use std::collections::TryReserveError;
use std::fmt;
use std::hash::Hash;

use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_preamble_longs_in;
use crate::codec::assert::ensure_serial_version_is;
use crate::codec::assert::insufficient_data;
use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::countmin::builder::CountMinSketchBuilder;
use crate::countmin::builder::ensure_addressable;
use crate::countmin::builder::ensure_valid_depth;
use crate::countmin::builder::ensure_valid_width;
use crate::countmin::counter::Algorithm;
use crate::countmin::counter::Conservative;
use crate::countmin::counter::Log8;
use crate::countmin::counter::Log1024;
use crate::countmin::matrix::Matrix;
use crate::countmin::serialization::FLAGS_IS_EMPTY;
use crate::countmin::serialization::LONG_SIZE_BYTES;
use crate::countmin::serialization::PREAMBLE_LONGS;
use crate::countmin::serialization::SERIAL_VERSION;
use crate::countmin::serialization::compute_seed_hash;
use crate::countmin::serialization::read_cells;
use crate::countmin::serialization::write_cells;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::RowPositions;
use crate::hash::row_positions;

/// The counter matrix, monomorphized per algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Counters {
    Conservative(Matrix<Conservative>),
    Log1024(Matrix<Log1024>),
    Log8(Matrix<Log8>),
}

// Runs `$body` against whichever matrix the sketch holds.
macro_rules! with_matrix {
    ($counters:expr, $matrix:ident => $body:expr) => {
        match $counters {
            Counters::Conservative($matrix) => $body,
            Counters::Log1024($matrix) => $body,
            Counters::Log8($matrix) => $body,
        }
    };
}

impl Counters {
    fn new(width: u32, depth: u32, algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Conservative => Counters::Conservative(Matrix::new(width, depth)),
            Algorithm::Log1024 => Counters::Log1024(Matrix::new(width, depth)),
            Algorithm::Log8 => Counters::Log8(Matrix::new(width, depth)),
        }
    }

    fn try_new(width: u32, depth: u32, algorithm: Algorithm) -> Result<Self, TryReserveError> {
        Ok(match algorithm {
            Algorithm::Conservative => Counters::Conservative(Matrix::try_new(width, depth)?),
            Algorithm::Log1024 => Counters::Log1024(Matrix::try_new(width, depth)?),
            Algorithm::Log8 => Counters::Log8(Matrix::try_new(width, depth)?),
        })
    }
}

/// Count-Min sketch for estimating item frequencies in a fixed memory budget.
///
/// Every item maps to one cell in each of `depth` rows of `width` cells. An
/// estimate is the smallest count across those cells, so with the
/// conservative algorithm it never falls below the true count and only
/// overshoots when another item collides in every row.
///
/// Use [`CountMinSketchBuilder`] (or [`CountMinSketch::builder`]) to size a
/// sketch from a memory budget or an explicit shape.
///
/// The sketch has no internal synchronization: updating methods take
/// `&mut self`, and sharing one sketch between threads needs an external lock.
#[derive(Clone)]
pub struct CountMinSketch<R: RandomSource = XorShift64> {
    seed: u64,
    total_count: u64,
    counters: Counters,
    rng: R,
}

impl CountMinSketch<XorShift64> {
    /// Returns a builder for creating a sketch.
    ///
    /// # Examples
    ///
    /// ```
    /// use freqsketch::countmin::Algorithm;
    /// use freqsketch::countmin::CountMinSketch;
    ///
    /// let sketch = CountMinSketch::builder()
    ///     .width(1 << 12)
    ///     .depth(3)
    ///     .algorithm(Algorithm::Conservative)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(sketch.size(), 49152);
    /// ```
    pub fn builder() -> CountMinSketchBuilder {
        CountMinSketchBuilder::default()
    }

    /// Creates a conservative sketch filling a budget of `size_mb` MiB.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfiguration`](crate::error::ErrorKind::InvalidConfiguration)
    /// if `size_mb` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use freqsketch::countmin::CountMinSketch;
    ///
    /// let sketch = CountMinSketch::new(1).unwrap();
    /// assert_eq!(sketch.width(), 1 << 15);
    /// assert_eq!(sketch.depth(), 8);
    /// ```
    pub fn new(size_mb: u32) -> Result<Self, Error> {
        CountMinSketchBuilder::with_size_mb(size_mb).build()
    }

    /// Deserializes a sketch written with the default seed.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// if the bytes are truncated, corrupted, or written with another seed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserializes a sketch written with `seed`.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        Self::deserialize_with_rng(bytes, seed, XorShift64::default())
    }
}

impl<R: RandomSource> CountMinSketch<R> {
    pub(crate) fn from_parts(width: u32, depth: u32, algorithm: Algorithm, seed: u64, rng: R) -> Self {
        CountMinSketch {
            seed,
            total_count: 0,
            counters: Counters::new(width, depth, algorithm),
            rng,
        }
    }

    /// Returns the number of cells per row.
    pub fn width(&self) -> u32 {
        with_matrix!(&self.counters, m => m.width())
    }

    /// Returns the number of rows.
    pub fn depth(&self) -> u32 {
        with_matrix!(&self.counters, m => m.depth())
    }

    /// Returns the counter algorithm.
    pub fn algorithm(&self) -> Algorithm {
        with_matrix!(&self.counters, m => m.algorithm())
    }

    /// Returns the hash seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the bytes used by the counter matrix: `width * depth * cell_bytes`.
    pub fn size(&self) -> usize {
        with_matrix!(&self.counters, m => m.size_bytes())
    }

    /// Returns the exact sum of all increments, saturating at `u64::MAX`.
    ///
    /// Unlike [`estimate()`](Self::estimate), the total is not affected by
    /// counter saturation or the probabilistic algorithms.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Returns true if nothing has been counted.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    /// Returns the relative error bound `e / width`.
    ///
    /// With probability `1 - error_probability()` an estimate exceeds the
    /// true count by at most `relative_error() * total_count()`.
    pub fn relative_error(&self) -> f64 {
        std::f64::consts::E / f64::from(self.width())
    }

    /// Returns the probability `e^-depth` that an estimate exceeds the
    /// relative error bound.
    pub fn error_probability(&self) -> f64 {
        (-f64::from(self.depth())).exp()
    }

    /// Counts one occurrence of `item`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use freqsketch::countmin::CountMinSketch;
    /// let mut sketch = CountMinSketch::new(1).unwrap();
    /// sketch.increment("apple");
    /// sketch.increment("apple");
    /// sketch.increment(42_u64);
    /// assert_eq!(sketch.estimate("apple"), 2);
    /// assert_eq!(sketch.total_count(), 3);
    /// ```
    pub fn increment<T: Hash>(&mut self, item: T) {
        self.increment_by(item, 1);
    }

    /// Counts `amount` occurrences of `item`.
    pub fn increment_by<T: Hash>(&mut self, item: T, amount: u64) {
        let positions = self.positions(&item);
        let rng = &mut self.rng;
        with_matrix!(&mut self.counters, m => m.increment(positions, amount, rng));
        self.total_count = self.total_count.saturating_add(amount);
    }

    /// Counts one occurrence of every item.
    pub fn update<T: Hash, I: IntoIterator<Item = T>>(&mut self, items: I) {
        for item in items {
            self.increment(item);
        }
    }

    /// Returns the estimated count of `item`.
    ///
    /// With the conservative algorithm the estimate is never below the true
    /// count. The logarithmic algorithms return an unbiased approximation.
    pub fn estimate<T: Hash>(&self, item: T) -> u64 {
        let positions = self.positions(&item);
        with_matrix!(&self.counters, m => m.estimate(positions))
    }

    /// Returns whether `other` has the same width, depth, algorithm and seed.
    pub fn is_compatible<S: RandomSource>(&self, other: &CountMinSketch<S>) -> bool {
        self.width() == other.width()
            && self.depth() == other.depth()
            && self.algorithm() == other.algorithm()
            && self.seed == other.seed
    }

    /// Merges the counts of `other` into this sketch.
    ///
    /// Conservative cells are added and saturate. Logarithmic cells are
    /// recombined probabilistically so that the expected estimate of every
    /// item is the sum of its expected estimates in both sketches.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ShapeMismatch`](crate::error::ErrorKind::ShapeMismatch)
    /// if the sketches are not [compatible](Self::is_compatible); `self` is
    /// left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// # use freqsketch::countmin::CountMinSketch;
    /// let mut left = CountMinSketch::new(1).unwrap();
    /// let mut right = CountMinSketch::new(1).unwrap();
    /// left.increment("a");
    /// right.increment_by("a", 4);
    ///
    /// left.merge(&right).unwrap();
    /// assert_eq!(left.estimate("a"), 5);
    /// assert_eq!(left.total_count(), 5);
    /// ```
    pub fn merge<S: RandomSource>(&mut self, other: &CountMinSketch<S>) -> Result<(), Error> {
        if !self.is_compatible(other) {
            return Err(Error::shape_mismatch("cannot merge incompatible sketches")
                .with_context("width", format!("{} vs {}", self.width(), other.width()))
                .with_context("depth", format!("{} vs {}", self.depth(), other.depth()))
                .with_context(
                    "algorithm",
                    format!("{} vs {}", self.algorithm(), other.algorithm()),
                )
                .with_context("seed", format!("{} vs {}", self.seed, other.seed)));
        }

        let rng = &mut self.rng;
        match (&mut self.counters, &other.counters) {
            (Counters::Conservative(m), Counters::Conservative(o)) => m.merge(o, rng),
            (Counters::Log1024(m), Counters::Log1024(o)) => m.merge(o, rng),
            (Counters::Log8(m), Counters::Log8(o)) => m.merge(o, rng),
            _ => unreachable!("compatible sketches share an algorithm"),
        }
        self.total_count = self.total_count.saturating_add(other.total_count);
        tracing::debug!(
            width = self.width(),
            depth = self.depth(),
            total_count = self.total_count,
            "merged count-min sketches"
        );
        Ok(())
    }

    /// Clears all counts while keeping the shape, algorithm and seed.
    pub fn reset(&mut self) {
        with_matrix!(&mut self.counters, m => m.reset());
        self.total_count = 0;
    }

    /// Serializes the sketch to a byte vector.
    ///
    /// The image holds the shape, algorithm, a fingerprint of the seed, the
    /// total count and the raw cells. Random source state is not stored.
    ///
    /// # Examples
    ///
    /// ```
    /// # use freqsketch::countmin::CountMinSketch;
    /// let mut sketch = CountMinSketch::builder().width(1024).depth(4).build().unwrap();
    /// sketch.increment("apple");
    ///
    /// let bytes = sketch.serialize();
    /// let restored = CountMinSketch::deserialize(&bytes).unwrap();
    /// assert_eq!(restored.estimate("apple"), 1);
    /// assert_eq!(restored, sketch);
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();
        let mut capacity = LONG_SIZE_BYTES * PREAMBLE_LONGS as usize;
        if !is_empty {
            capacity += LONG_SIZE_BYTES + self.size();
        }
        let mut bytes = SketchBytes::with_capacity(capacity);

        bytes.write_u8(PREAMBLE_LONGS);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::COUNTMIN.id);
        bytes.write_u8(if is_empty { FLAGS_IS_EMPTY } else { 0 });
        bytes.write_u8(self.algorithm().tag());
        bytes.write_u8(0); // reserved
        bytes.write_u16_le(compute_seed_hash(self.seed));
        bytes.write_u32_le(self.width());
        bytes.write_u32_le(self.depth());

        if !is_empty {
            bytes.write_u64_le(self.total_count);
            with_matrix!(&self.counters, m => write_cells(&mut bytes, m));
        }

        bytes.into_bytes()
    }

    /// Deserializes a sketch written with `seed`, using `rng` for future
    /// logarithmic updates.
    pub fn deserialize_with_rng(bytes: &[u8], seed: u64, rng: R) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);

        let preamble_longs = cursor
            .read_u8()
            .map_err(insufficient_data("preamble_longs"))?;
        let serial_version = cursor
            .read_u8()
            .map_err(insufficient_data("serial_version"))?;
        let family_id = cursor.read_u8().map_err(insufficient_data("family_id"))?;
        let flags = cursor.read_u8().map_err(insufficient_data("flags"))?;
        let algorithm_tag = cursor.read_u8().map_err(insufficient_data("algorithm"))?;
        cursor.read_u8().map_err(insufficient_data("reserved"))?;
        let seed_hash = cursor.read_u16_le().map_err(insufficient_data("seed_hash"))?;

        Family::COUNTMIN.validate_id(family_id)?;
        ensure_serial_version_is(SERIAL_VERSION, serial_version)?;
        ensure_preamble_longs_in(Family::COUNTMIN.pre_longs, preamble_longs)?;

        let algorithm = Algorithm::try_from(algorithm_tag).map_err(|_| {
            Error::deserial(format!("unknown algorithm tag {algorithm_tag}"))
        })?;
        let expected_seed_hash = compute_seed_hash(seed);
        if seed_hash != expected_seed_hash {
            return Err(Error::deserial(format!(
                "incompatible seed hash: expected {expected_seed_hash}, got {seed_hash}"
            )));
        }

        let width = cursor.read_u32_le().map_err(insufficient_data("width"))?;
        let depth = cursor.read_u32_le().map_err(insufficient_data("depth"))?;
        ensure_valid_width(width)
            .and_then(|_| ensure_valid_depth(depth))
            .and_then(|_| ensure_addressable(width, depth, algorithm.cell_bytes() as u64))
            .map_err(|err| Error::deserial(format!("invalid sketch shape: {}", err.message())))?;

        if flags & FLAGS_IS_EMPTY != 0 {
            // The image carries no cells, so the shape alone sizes the matrix.
            let counters = Counters::try_new(width, depth, algorithm).map_err(|err| {
                Error::deserial("cannot allocate cells for empty sketch")
                    .with_context("width", width)
                    .with_context("depth", depth)
                    .set_source(err)
            })?;
            return Ok(CountMinSketch {
                seed,
                total_count: 0,
                counters,
                rng,
            });
        }

        let total_count = cursor
            .read_u64_le()
            .map_err(insufficient_data("total_count"))?;
        let counters = match algorithm {
            Algorithm::Conservative => {
                Counters::Conservative(read_cells(&mut cursor, width, depth)?)
            }
            Algorithm::Log1024 => Counters::Log1024(read_cells(&mut cursor, width, depth)?),
            Algorithm::Log8 => Counters::Log8(read_cells(&mut cursor, width, depth)?),
        };

        Ok(CountMinSketch {
            seed,
            total_count,
            counters,
            rng,
        })
    }

    fn positions<T: Hash>(&self, item: &T) -> RowPositions {
        row_positions(item, self.seed, self.width(), self.depth())
    }
}

impl<T: Hash, R: RandomSource> Extend<T> for CountMinSketch<R> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.update(iter);
    }
}

/// Sketches are equal when their shape, seed, counts and cells agree; the
/// random source is ignored.
impl<R: RandomSource, S: RandomSource> PartialEq<CountMinSketch<S>> for CountMinSketch<R> {
    fn eq(&self, other: &CountMinSketch<S>) -> bool {
        self.seed == other.seed
            && self.total_count == other.total_count
            && self.counters == other.counters
    }
}

impl<R: RandomSource> fmt::Debug for CountMinSketch<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountMinSketch")
            .field("width", &self.width())
            .field("depth", &self.depth())
            .field("algorithm", &self.algorithm())
            .field("seed", &self.seed)
            .field("total_count", &self.total_count)
            .finish_non_exhaustive()
    }
}
