//! Shared helpers for runtime integration tests

#![allow(dead_code)]

pub use pretty_assertions::assert_eq;

use paribridge_runtime::{ArenaOptions, Bridge, LimbOrder, Value};
use rstest::fixture;

pub const SMALL_ARENA: u64 = 1 << 16;
pub const MAX_ARENA: u64 = 1 << 22;

/// A bridge with a small arena, closed when the test ends
#[fixture]
pub fn bridge() -> Bridge {
    Bridge::open(ArenaOptions::new(SMALL_ARENA, MAX_ARENA)).unwrap()
}

pub fn bridge_with(order: LimbOrder) -> Bridge {
    Bridge::open(ArenaOptions::new(SMALL_ARENA, MAX_ARENA).with_limb_order(order)).unwrap()
}

pub fn int(n: i64) -> Value {
    Value::integer(n)
}

pub fn ints(values: &[i64]) -> Value {
    Value::sequence(values.iter().map(|n| Value::integer(*n)).collect())
}

pub fn text(s: &str) -> Value {
    Value::text(s)
}
