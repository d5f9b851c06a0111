//! Property-based tests for key composition, flattening and merging

mod flatten;
mod merge;
