//! Helpers for tests of the engine and of crates that build on it.
pub mod fake_provider;
pub mod prepare_env;
