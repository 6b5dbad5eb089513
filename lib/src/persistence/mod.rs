//! Artifact file persistence.
//!
//! One observation is serialized to one compressed Parquet file: the
//! spectrum and frequency axis as list columns, everything else as
//! single-value columns. Reads reproduce every field; a missing column is
//! reported as a corrupt artifact.

mod parquet;

pub use parquet::{read_artifact, write_artifact};
