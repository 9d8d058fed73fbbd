//! Test-only config builders, gated behind the `test-utils` feature so
//! downstream crates can build a `RagkilnConfig` for fixtures without
//! hand-rolling every field.

use crate::RagkilnConfig;

/// A config tuned for fast, deterministic tests: no inter-call delay, a
/// tiny batch size, and a local DSN that is never actually dialed unless a
/// test opts in.
pub fn test_config() -> RagkilnConfig {
    let mut config = RagkilnConfig::default();
    config.llm.rate_delay_s = 0.0;
    config.embedding.rate_delay_s = 0.0;
    config.embedding.batch_size = 8;
    config
}
