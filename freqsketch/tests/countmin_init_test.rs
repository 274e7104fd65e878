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

use freqsketch::countmin::Algorithm;
use freqsketch::countmin::CountMinSketch;
use freqsketch::countmin::CountMinSketchBuilder;
use freqsketch::countmin::MAX_WIDTH;
use freqsketch::error::ErrorKind;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::eq;
use googletest::prelude::gt;
use googletest::prelude::le;

const MIB: usize = 1 << 20;

// (size_mb, width, depth) for 4-byte cells before the width ceiling applies.
const SIZE_TABLE: [(u32, u32, u32); 12] = [
    (1, 1 << 15, 8),
    (2, 1 << 16, 8),
    (3, 1 << 16, 12),
    (4, 1 << 17, 8),
    (5, 1 << 17, 10),
    (6, 1 << 17, 12),
    (7, 1 << 17, 14),
    (8, 1 << 18, 8),
    (32, 1 << 20, 8),
    (55, 1 << 20, 13),
    (95, 1 << 21, 11),
    (256, 1 << 23, 8),
];

fn check_size_table(algorithm: Algorithm, width_factor: u32) {
    for (size_mb, width, depth) in SIZE_TABLE {
        let sketch = CountMinSketchBuilder::with_size_mb(size_mb)
            .algorithm(algorithm)
            .build()
            .unwrap();

        let budget = size_mb as usize * MIB;
        let unclamped = u64::from(width) * u64::from(width_factor);
        if unclamped <= u64::from(MAX_WIDTH) {
            assert_eq!(sketch.width() as u64, unclamped, "width for {size_mb} MiB");
            assert_eq!(sketch.depth(), depth, "depth for {size_mb} MiB");
        } else {
            // Past the ceiling the leftover budget becomes extra rows.
            let cells = budget / algorithm.cell_bytes();
            assert_eq!(sketch.width(), MAX_WIDTH, "width for {size_mb} MiB");
            assert_eq!(
                sketch.depth() as usize,
                cells / MAX_WIDTH as usize,
                "depth for {size_mb} MiB"
            );
        }
        assert_that!(sketch.size(), le(budget));
        assert_that!(sketch.size(), gt(budget / 2));
    }
}

#[test]
fn test_size_mb_conservative() {
    check_size_table(Algorithm::Conservative, 1);
}

#[test]
fn test_size_mb_log1024() {
    check_size_table(Algorithm::Log1024, 2);
}

#[test]
fn test_size_mb_log8() {
    check_size_table(Algorithm::Log8, 4);
}

#[test]
fn test_size_mb_log8_one_mib() {
    let sketch = CountMinSketchBuilder::with_size_mb(1)
        .algorithm(Algorithm::Log8)
        .build()
        .unwrap();
    assert_eq!(sketch.width(), 1 << 17);
    assert_eq!(sketch.depth(), 8);
}

#[test]
fn test_default_algorithm_is_conservative() {
    let sketch = CountMinSketch::new(1).unwrap();
    assert_eq!(sketch.algorithm(), Algorithm::Conservative);
    assert!(sketch.is_empty());
    assert_eq!(sketch.total_count(), 0);
}

#[test]
fn test_width_and_depth() {
    let cases = [
        (Algorithm::Conservative, 1 << 12, 3, 49152),
        (Algorithm::Conservative, 1 << 13, 7, 229376),
        (Algorithm::Log1024, 1 << 18, 1, 524288),
        (Algorithm::Log8, 1 << 13, 7, 57344),
    ];
    for (algorithm, width, depth, size) in cases {
        let sketch = CountMinSketchBuilder::with_shape(width, depth)
            .algorithm(algorithm)
            .build()
            .unwrap();
        assert_eq!(sketch.width(), width);
        assert_eq!(sketch.depth(), depth);
        assert_eq!(sketch.size(), size);
    }
}

#[test]
fn test_size_mb_and_width() {
    let cases = [
        (Algorithm::Conservative, 4, 1 << 18, 4),
        (Algorithm::Conservative, 17, 1 << 19, 8),
        (Algorithm::Log1024, 70, 1 << 21, 17),
        (Algorithm::Log8, 100, 1 << 21, 50),
    ];
    for (algorithm, size_mb, width, depth) in cases {
        let sketch = CountMinSketchBuilder::with_size_mb(size_mb)
            .width(width)
            .algorithm(algorithm)
            .build()
            .unwrap();
        assert_eq!(sketch.width(), width);
        assert_eq!(sketch.depth(), depth);
        assert_that!(sketch.size(), le(size_mb as usize * MIB));
    }
}

#[test]
fn test_size_mb_and_depth() {
    let cases = [
        (Algorithm::Conservative, 4, 1 << 18, 4),
        (Algorithm::Conservative, 17, 1 << 19, 8),
        (Algorithm::Log1024, 70, 1 << 21, 17),
        // The budget would allow 2^26 cells in one row; the ceiling wins.
        (Algorithm::Log8, 100, MAX_WIDTH, 1),
    ];
    for (algorithm, size_mb, width, depth) in cases {
        let sketch = CountMinSketchBuilder::with_size_mb(size_mb)
            .depth(depth)
            .algorithm(algorithm)
            .build()
            .unwrap();
        assert_eq!(sketch.width(), width);
        assert_eq!(sketch.depth(), depth);
        assert_that!(sketch.size(), le(size_mb as usize * MIB));
    }
}

#[test]
fn test_invalid_width() {
    assert!(
        CountMinSketchBuilder::with_size_mb(8)
            .width(1 << 20)
            .build()
            .is_ok()
    );
    assert!(CountMinSketchBuilder::with_shape(MAX_WIDTH, 1).build().is_ok());

    let err = CountMinSketchBuilder::with_size_mb(8)
        .width((1 << 20) - 1)
        .build()
        .unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));
    assert_that!(err.message(), contains_substring("power of two"));

    let err = CountMinSketchBuilder::with_size_mb(8)
        .width(1 << 22)
        .build()
        .unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));
    assert_that!(err.message(), contains_substring("too large"));

    let err = CountMinSketchBuilder::with_shape((1 << 22) - 1, 8)
        .build()
        .unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));
}

#[test]
fn test_invalid_size_mb() {
    let err = CountMinSketch::new(0).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));

    let err = CountMinSketchBuilder::parse_size_mb("0.5").unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));
    assert_that!(err.message(), contains_substring("positive integer"));
}

#[test]
fn test_invalid_depth() {
    let err = CountMinSketchBuilder::with_shape(1024, 0).build().unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));
}

#[test]
fn test_missing_sizing_parameters() {
    let err = CountMinSketch::builder().width(1024).build().unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));
    assert_that!(err.message(), contains_substring("size_mb"));
}

#[test]
fn test_invalid_algorithm() {
    for name in ["basic", "cons", "logcounter", "", "5", "Conservative", " log8"] {
        let err = name.parse::<Algorithm>().unwrap_err();
        assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));
    }
    let err = Algorithm::try_from(5u8).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidConfiguration));
}

#[test]
fn test_algorithm_names() {
    for algorithm in Algorithm::ALL {
        let parsed: Algorithm = algorithm.name().parse().unwrap();
        assert_eq!(parsed, algorithm);
        assert_eq!(algorithm.to_string(), algorithm.name());
    }
    assert_eq!(Algorithm::try_from("log1024").unwrap(), Algorithm::Log1024);
    assert_eq!(Algorithm::default(), Algorithm::Conservative);
}

#[test]
fn test_seed_is_kept() {
    let sketch = CountMinSketch::builder()
        .width(64)
        .depth(2)
        .seed(42)
        .build()
        .unwrap();
    assert_eq!(sketch.seed(), 42);
    assert_eq!(CountMinSketch::new(1).unwrap().seed(), 9001);
}

#[test]
fn test_error_bounds_follow_shape() {
    let narrow = CountMinSketchBuilder::with_shape(1 << 10, 4).build().unwrap();
    let wide = CountMinSketchBuilder::with_shape(1 << 12, 8).build().unwrap();
    assert_that!(wide.relative_error(), le(narrow.relative_error() / 4.0 + 1e-15));
    assert!(wide.error_probability() < narrow.error_probability());
}
