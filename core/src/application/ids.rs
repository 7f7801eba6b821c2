// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Snowflake-style 64-bit ID generation (GLOSSARY: "a monotonically-increasing
//! 64-bit identifier generated locally without DB round trips").
//!
//! Layout: 41 bits millis-since-epoch | 10 bits node id | 12 bits sequence.
//! Single global epoch chosen arbitrarily; only monotonicity within a node
//! matters for this system's invariants.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const EPOCH_MILLIS: i64 = 1_700_000_000_000;
const SEQUENCE_BITS: i64 = 12;
const NODE_BITS: i64 = 10;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

pub struct SnowflakeGenerator {
    node_id: i64,
    state: Mutex<(i64, i64)>, // (last_millis, sequence)
}

impl SnowflakeGenerator {
    pub fn new(node_id: i64) -> Self {
        Self {
            node_id: node_id & ((1 << NODE_BITS) - 1),
            state: Mutex::new((0, 0)),
        }
    }

    pub fn next_id(&self) -> i64 {
        let mut guard = self.state.lock();
        let mut now = current_millis();
        if now == guard.0 {
            guard.1 = (guard.1 + 1) & SEQUENCE_MASK;
            if guard.1 == 0 {
                while now <= guard.0 {
                    now = current_millis();
                }
            }
        } else {
            guard.1 = 0;
        }
        guard.0 = now;
        let timestamp_part = (now - EPOCH_MILLIS) << (NODE_BITS + SEQUENCE_BITS);
        let node_part = self.node_id << SEQUENCE_BITS;
        timestamp_part | node_part | guard.1
    }
}

fn current_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let gen = SnowflakeGenerator::new(1);
        let mut last = gen.next_id();
        for _ in 0..1000 {
            let id = gen.next_id();
            assert!(id > last);
            last = id;
        }
    }
}
