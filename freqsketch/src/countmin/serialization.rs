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

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::insufficient_data;
use crate::countmin::counter::CounterCodec;
use crate::countmin::matrix::Matrix;
use crate::error::Error;

pub(super) const PREAMBLE_LONGS: u8 = 2;
pub(super) const SERIAL_VERSION: u8 = 1;
pub(super) const FLAGS_IS_EMPTY: u8 = 1 << 0;
pub(super) const LONG_SIZE_BYTES: usize = 8;

/// Fingerprint of the hash seed stored in the image, so a sketch is never
/// read back with a seed that would scatter its items differently.
pub(super) fn compute_seed_hash(seed: u64) -> u16 {
    let (h1, _) = mur3::murmurhash3_x64_128(&seed.to_le_bytes(), 0);
    (h1 & 0xffff) as u16
}

/// Appends all cells in row-major order.
pub(super) fn write_cells<C: CounterCodec>(bytes: &mut SketchBytes, matrix: &Matrix<C>) {
    for &cell in matrix.cells() {
        C::write_cell(bytes, cell);
    }
}

/// Reads `width * depth` cells in row-major order.
pub(super) fn read_cells<C: CounterCodec>(
    slice: &mut SketchSlice<'_>,
    width: u32,
    depth: u32,
) -> Result<Matrix<C>, Error> {
    let len = width as usize * depth as usize;
    if slice.remaining() < len * C::CELL_BYTES {
        return Err(Error::insufficient_data("cells"));
    }
    let mut cells = Vec::with_capacity(len);
    for _ in 0..len {
        cells.push(C::read_cell(slice).map_err(insufficient_data("cells"))?);
    }
    Ok(Matrix::from_cells(width, depth, cells))
}
