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
use std::marker::PhantomData;

use crate::common::RandomSource;
use crate::countmin::counter::Algorithm;
use crate::countmin::counter::CounterCodec;
use crate::hash::RowPositions;

/// Row-major `depth x width` array of cells of a single codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Matrix<C: CounterCodec> {
    width: u32,
    depth: u32,
    cells: Vec<C::Cell>,
    codec: PhantomData<C>,
}

impl<C: CounterCodec> Matrix<C> {
    /// Allocates a zeroed matrix. The shape must already be validated.
    pub fn new(width: u32, depth: u32) -> Self {
        let len = width as usize * depth as usize;
        Self::from_cells(width, depth, vec![C::Cell::default(); len])
    }

    /// Like [`Matrix::new`], but reports allocation failure instead of
    /// aborting. For shapes that come from untrusted input.
    pub fn try_new(width: u32, depth: u32) -> Result<Self, TryReserveError> {
        let len = width as usize * depth as usize;
        let mut cells = Vec::new();
        cells.try_reserve_exact(len)?;
        cells.resize(len, C::Cell::default());
        Ok(Self::from_cells(width, depth, cells))
    }

    pub fn from_cells(width: u32, depth: u32, cells: Vec<C::Cell>) -> Self {
        debug_assert_eq!(cells.len(), width as usize * depth as usize);
        Matrix {
            width,
            depth,
            cells,
            codec: PhantomData,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn algorithm(&self) -> Algorithm {
        C::ALGORITHM
    }

    pub fn cells(&self) -> &[C::Cell] {
        &self.cells
    }

    pub fn size_bytes(&self) -> usize {
        self.cells.len() * C::CELL_BYTES
    }

    /// Adds `amount` to the count of the item owning `positions`.
    pub fn increment<R: RandomSource>(&mut self, positions: RowPositions, amount: u64, rng: &mut R) {
        if amount == 0 {
            return;
        }
        if C::CONSERVATIVE_UPDATE {
            // Every row must be read before any row is written: the target
            // is derived from the minimum over the untouched cells.
            let min = self.min_cell(positions.clone());
            let target = C::apply_increment(min, amount, 0.0);
            let width = self.width as usize;
            for (row, col) in positions.enumerate() {
                let cell = &mut self.cells[row * width + col];
                if *cell < target {
                    *cell = target;
                }
            }
        } else {
            let draw = rng.next_f64();
            let width = self.width as usize;
            for (row, col) in positions.enumerate() {
                let cell = &mut self.cells[row * width + col];
                *cell = C::apply_increment(*cell, amount, draw);
            }
        }
    }

    /// Returns the smallest decoded count across the rows.
    pub fn estimate(&self, positions: RowPositions) -> u64 {
        // Decoding is monotonic, so decoding the minimum cell is enough.
        C::decode(self.min_cell(positions))
    }

    /// Folds `other` into `self` cell by cell. Shapes must match.
    pub fn merge<R: RandomSource>(&mut self, other: &Matrix<C>, rng: &mut R) {
        debug_assert_eq!(self.width, other.width);
        debug_assert_eq!(self.depth, other.depth);
        // One draw for the whole merge: the rows of an item hold equal cells
        // and must round the same way, or the row minimum drifts low.
        let draw = if C::CONSERVATIVE_UPDATE {
            0.0
        } else {
            rng.next_f64()
        };
        for (cell, other_cell) in self.cells.iter_mut().zip(&other.cells) {
            *cell = C::combine(*cell, *other_cell, draw);
        }
    }

    pub fn reset(&mut self) {
        self.cells.fill(C::Cell::default());
    }

    fn min_cell(&self, positions: RowPositions) -> C::Cell {
        let width = self.width as usize;
        positions
            .enumerate()
            .map(|(row, col)| self.cells[row * width + col])
            .min()
            .unwrap_or_default()
    }
}
