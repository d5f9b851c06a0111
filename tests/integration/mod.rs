//! Integration tests for layered configuration stores

mod discovery_sources;
mod export_roundtrip;
mod layered_build;
mod safe_rebuild;
mod test_utils;
