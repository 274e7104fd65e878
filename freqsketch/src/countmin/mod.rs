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

//! Count-Min sketch implementation for frequency estimation.
//!
//! A Count-Min sketch keeps a `depth x width` matrix of counters and answers
//! "how many times has this item been seen?" within a fixed memory budget.
//! The answer is the minimum over one counter per row, so hash collisions can
//! only inflate it.
//!
//! Three counter [`Algorithm`]s trade accuracy for cells per byte:
//!
//! - [`Algorithm::Conservative`] keeps exact 32-bit counts and only raises the
//!   counters that hold the current minimum.
//! - [`Algorithm::Log1024`] keeps 16-bit logarithmic (Morris) counters that
//!   stay close to exact for small counts and never saturate in practice.
//! - [`Algorithm::Log8`] keeps 8-bit logarithmic counters that reach about
//!   `10^14` with coarse resolution.
//!
//! # Usage
//!
//! ```rust
//! # use freqsketch::countmin::CountMinSketch;
//! let mut sketch = CountMinSketch::new(1).unwrap();
//!
//! sketch.increment("apple");
//! sketch.increment_by("banana", 3);
//!
//! assert_eq!(sketch.estimate("apple"), 1);
//! assert!(sketch.estimate("banana") >= 3);
//! assert_eq!(sketch.estimate("cherry"), 0);
//! ```
//!
//! # Sizing
//!
//! ```rust
//! use freqsketch::countmin::Algorithm;
//! use freqsketch::countmin::CountMinSketchBuilder;
//!
//! // The 8-bit algorithm packs four times as many cells into the budget.
//! let sketch = CountMinSketchBuilder::with_size_mb(3)
//!     .algorithm(Algorithm::Log8)
//!     .build()
//!     .unwrap();
//! assert_eq!(sketch.width(), 1 << 18);
//! assert_eq!(sketch.depth(), 12);
//! ```

mod builder;
mod counter;
mod matrix;
mod serialization;
mod sketch;

pub use self::builder::CountMinSketchBuilder;
pub use self::builder::MAX_WIDTH;
pub use self::counter::Algorithm;
pub use self::sketch::CountMinSketch;
