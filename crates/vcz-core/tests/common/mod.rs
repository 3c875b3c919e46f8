//! Shared helpers for vcz-core integration tests.

pub mod fake_encoder;
