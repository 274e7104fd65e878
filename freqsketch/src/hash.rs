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

//! Hashing of items into sketch row positions.

use std::hash::Hash;

use mur3::Hasher128;

/// Seed used when the caller does not pick one.
pub(crate) const DEFAULT_UPDATE_SEED: u64 = 9001;

/// Splits one 128-bit MurmurHash3 of `item` into the two double-hashing
/// bases.
///
/// The stride is forced odd: with a power-of-two width an odd stride visits
/// `width` distinct columns before repeating.
pub(crate) fn hash_pair<T: Hash>(item: &T, seed: u64) -> (u64, u64) {
    let mut hasher = Hasher128::with_seed(fold_seed(seed));
    item.hash(&mut hasher);
    let (h1, h2) = hasher.finish128();
    (h1, h2 | 1)
}

// MurmurHash3 takes a 32-bit seed; both halves of the sketch seed count.
fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

/// Column index of one item in each sketch row, computed as
/// `(h1 + row * h2) mod width`.
#[derive(Debug, Clone)]
pub(crate) struct RowPositions {
    h1: u64,
    h2: u64,
    mask: u64,
    row: u32,
    depth: u32,
}

impl RowPositions {
    /// `width` must be a power of two.
    pub(crate) fn new(h1: u64, h2: u64, width: u32, depth: u32) -> Self {
        debug_assert!(width.is_power_of_two());
        RowPositions {
            h1,
            h2,
            mask: u64::from(width) - 1,
            row: 0,
            depth,
        }
    }
}

impl Iterator for RowPositions {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.row == self.depth {
            return None;
        }
        let hash = self
            .h1
            .wrapping_add(u64::from(self.row).wrapping_mul(self.h2));
        self.row += 1;
        Some((hash & self.mask) as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.depth - self.row) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowPositions {}

/// Returns the column of `item` in every row of a `depth x width` matrix.
pub(crate) fn row_positions<T: Hash>(item: &T, seed: u64, width: u32, depth: u32) -> RowPositions {
    let (h1, h2) = hash_pair(item, seed);
    RowPositions::new(h1, h2, width, depth)
}
