//! # Loop Assembly
//!
//! Turns the source and its bridge into one loop unit, decides the output
//! compression profile, and replicates the unit to the requested length with
//! a stream copy so expansion cost does not grow with the target duration.

pub mod loop_assembler;
pub mod policy;

pub use loop_assembler::{LoopAssembler, LoopUnit};
pub use policy::{compute_repeat_count, estimate_compression_need};
