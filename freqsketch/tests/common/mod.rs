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

#![allow(dead_code)]

use freqsketch::common::RandomSource;
use freqsketch::countmin::Algorithm;
use freqsketch::countmin::CountMinSketch;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Reproducible random source backed by `rand`.
#[derive(Debug, Clone)]
pub struct StdRngSource(StdRng);

impl StdRngSource {
    pub fn seeded(seed: u64) -> Self {
        StdRngSource(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for StdRngSource {
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
}

/// Builds a `width x depth` sketch with a seeded random source.
pub fn seeded_sketch(
    width: u32,
    depth: u32,
    algorithm: Algorithm,
    rng_seed: u64,
) -> CountMinSketch<StdRngSource> {
    CountMinSketch::builder()
        .width(width)
        .depth(depth)
        .algorithm(algorithm)
        .build_with_rng(StdRngSource::seeded(rng_seed))
        .unwrap()
}
