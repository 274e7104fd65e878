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

use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::countmin::counter::Algorithm;
use crate::countmin::sketch::CountMinSketch;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;

/// Largest accepted row width.
pub const MAX_WIDTH: u32 = 1 << 21;

/// Depth the auto-sizing path aims for before spending budget on width.
pub(crate) const MIN_AUTO_DEPTH: u64 = 8;

const BYTES_PER_MB: u64 = 1 << 20;

/// Builder for creating [`CountMinSketch`] instances.
///
/// A sketch is shaped by one of:
/// - a memory budget alone ([`with_size_mb()`](Self::with_size_mb)), which
///   picks both width and depth;
/// - a budget plus a fixed width or a fixed depth, which derives the other;
/// - an explicit width and depth ([`with_shape()`](Self::with_shape)).
///
/// The counter [`Algorithm`] decides the cell size and defaults to
/// [`Algorithm::Conservative`].
///
/// # Examples
///
/// ```
/// use freqsketch::countmin::Algorithm;
/// use freqsketch::countmin::CountMinSketchBuilder;
///
/// let sketch = CountMinSketchBuilder::with_size_mb(1)
///     .algorithm(Algorithm::Log8)
///     .build()
///     .unwrap();
/// assert_eq!(sketch.width(), 1 << 17);
/// assert_eq!(sketch.depth(), 8);
/// assert!(sketch.size() <= 1 << 20);
/// ```
#[derive(Debug, Clone)]
pub struct CountMinSketchBuilder {
    size_mb: Option<u32>,
    width: Option<u32>,
    depth: Option<u32>,
    algorithm: Algorithm,
    seed: u64,
}

impl Default for CountMinSketchBuilder {
    fn default() -> Self {
        CountMinSketchBuilder {
            size_mb: None,
            width: None,
            depth: None,
            algorithm: Algorithm::default(),
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl CountMinSketchBuilder {
    /// Creates a builder sized by a memory budget in MiB.
    pub fn with_size_mb(size_mb: u32) -> Self {
        Self::default().size_mb(size_mb)
    }

    /// Creates a builder with an explicit width and depth.
    pub fn with_shape(width: u32, depth: u32) -> Self {
        Self::default().width(width).depth(depth)
    }

    /// Sets the memory budget in MiB.
    pub fn size_mb(mut self, size_mb: u32) -> Self {
        self.size_mb = Some(size_mb);
        self
    }

    /// Sets the row width. Must be a power of two no larger than [`MAX_WIDTH`].
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the number of rows.
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Sets the counter algorithm.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the hash seed. Sketches with different seeds cannot be merged.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parses a textual memory budget as accepted by [`size_mb()`](Self::size_mb).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfiguration`](crate::error::ErrorKind::InvalidConfiguration)
    /// unless `text` is a positive integer.
    ///
    /// # Examples
    ///
    /// ```
    /// use freqsketch::countmin::CountMinSketchBuilder;
    ///
    /// assert_eq!(CountMinSketchBuilder::parse_size_mb("64").unwrap(), 64);
    /// assert!(CountMinSketchBuilder::parse_size_mb("0.5").is_err());
    /// assert!(CountMinSketchBuilder::parse_size_mb("0").is_err());
    /// ```
    pub fn parse_size_mb(text: &str) -> Result<u32, Error> {
        let size_mb = text.trim().parse::<u32>().map_err(|err| {
            Error::invalid_config("size_mb must be a positive integer")
                .with_context("size_mb", text)
                .set_source(err)
        })?;
        ensure_positive_size(size_mb)?;
        Ok(size_mb)
    }

    /// Builds the sketch with the default random source.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfiguration`](crate::error::ErrorKind::InvalidConfiguration)
    /// if the parameters are out of range or cannot be satisfied together.
    pub fn build(self) -> Result<CountMinSketch, Error> {
        self.build_with_rng(XorShift64::default())
    }

    /// Builds the sketch with the given random source for the logarithmic
    /// counters.
    pub fn build_with_rng<R: RandomSource>(self, rng: R) -> Result<CountMinSketch<R>, Error> {
        let (width, depth) = self.plan()?;
        tracing::debug!(
            width,
            depth,
            algorithm = %self.algorithm,
            size_mb = ?self.size_mb,
            bytes = width as u64 * depth as u64 * self.algorithm.cell_bytes() as u64,
            "planned count-min sketch"
        );
        Ok(CountMinSketch::from_parts(
            width,
            depth,
            self.algorithm,
            self.seed,
            rng,
        ))
    }

    /// Resolves the configured parameters into a validated `(width, depth)`.
    pub(crate) fn plan(&self) -> Result<(u32, u32), Error> {
        if let Some(width) = self.width {
            ensure_valid_width(width)?;
        }
        if let Some(depth) = self.depth {
            ensure_valid_depth(depth)?;
        }
        let cell_bytes = self.algorithm.cell_bytes() as u64;

        let (width, depth) = match (self.size_mb, self.width, self.depth) {
            (Some(size_mb), width, depth) => {
                ensure_positive_size(size_mb)?;
                let budget = u64::from(size_mb) * BYTES_PER_MB;
                match (width, depth) {
                    (None, None) => auto_shape(budget, cell_bytes),
                    (Some(width), None) => {
                        let depth = budget / (u64::from(width) * cell_bytes);
                        if depth == 0 {
                            return Err(Error::invalid_config("width is too large for size_mb")
                                .with_context("width", width)
                                .with_context("size_mb", size_mb));
                        }
                        (width, clamp_depth(depth))
                    }
                    (None, Some(depth)) => {
                        let row_cells = budget / (u64::from(depth) * cell_bytes);
                        if row_cells == 0 {
                            return Err(Error::invalid_config("depth is too large for size_mb")
                                .with_context("depth", depth)
                                .with_context("size_mb", size_mb));
                        }
                        (floor_width(row_cells), depth)
                    }
                    (Some(width), Some(depth)) => {
                        let bytes = u64::from(width) * u64::from(depth) * cell_bytes;
                        if bytes > budget {
                            return Err(Error::invalid_config(
                                "width and depth exceed size_mb",
                            )
                            .with_context("width", width)
                            .with_context("depth", depth)
                            .with_context("size_mb", size_mb));
                        }
                        (width, depth)
                    }
                }
            }
            (None, Some(width), Some(depth)) => (width, depth),
            (None, _, _) => {
                return Err(Error::invalid_config(
                    "either size_mb or both width and depth must be set",
                ));
            }
        };

        ensure_addressable(width, depth, cell_bytes)?;
        Ok((width, depth))
    }
}

/// Picks the shape for a budget: the widest power of two that still leaves
/// room for [`MIN_AUTO_DEPTH`] rows, then as many rows as the budget holds.
///
/// Below the width ceiling the depth lands in `[8, 16)`; above it the extra
/// budget goes into rows.
fn auto_shape(budget: u64, cell_bytes: u64) -> (u32, u32) {
    let cells = budget / cell_bytes;
    let width = floor_width((cells / MIN_AUTO_DEPTH).max(1));
    let depth = cells / u64::from(width);
    (width, clamp_depth(depth))
}

/// Largest power of two not above `cells`, capped at [`MAX_WIDTH`].
fn floor_width(cells: u64) -> u32 {
    debug_assert!(cells > 0);
    let width = 1u64 << (63 - cells.leading_zeros());
    width.min(u64::from(MAX_WIDTH)) as u32
}

fn clamp_depth(depth: u64) -> u32 {
    depth.min(u64::from(u32::MAX)) as u32
}

fn ensure_positive_size(size_mb: u32) -> Result<(), Error> {
    if size_mb == 0 {
        return Err(Error::invalid_config("size_mb must be a positive integer")
            .with_context("size_mb", size_mb));
    }
    Ok(())
}

pub(crate) fn ensure_valid_width(width: u32) -> Result<(), Error> {
    if !width.is_power_of_two() {
        return Err(
            Error::invalid_config("width must be a power of two").with_context("width", width)
        );
    }
    if width > MAX_WIDTH {
        return Err(Error::invalid_config("width is too large")
            .with_context("width", width)
            .with_context("max_width", MAX_WIDTH));
    }
    Ok(())
}

pub(crate) fn ensure_valid_depth(depth: u32) -> Result<(), Error> {
    if depth == 0 {
        return Err(Error::invalid_config("depth must be at least 1").with_context("depth", depth));
    }
    Ok(())
}

pub(crate) fn ensure_addressable(width: u32, depth: u32, cell_bytes: u64) -> Result<(), Error> {
    let bytes = u64::from(width) * u64::from(depth) * cell_bytes;
    if usize::try_from(bytes).is_err() {
        return Err(Error::invalid_config("sketch does not fit in the address space")
            .with_context("width", width)
            .with_context("depth", depth));
    }
    Ok(())
}
