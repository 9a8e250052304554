use std::fmt;

use ndarray::Array4;

use crate::error::{ModelError, Result};

/// Compute backends in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBackend {
    /// General-purpose GPU compute
    Cuda,
    /// Graphics-API GPU acceleration
    DirectMl,
    Cpu,
}

impl ComputeBackend {
    pub const PRIORITY: [ComputeBackend; 3] = [Self::Cuda, Self::DirectMl, Self::Cpu];
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cuda => "cuda",
            Self::DirectMl => "directml",
            Self::Cpu => "cpu",
        };
        f.write_str(name)
    }
}

/// A loaded frame-interpolation network.
///
/// Inputs are `[1, 3, H, W]` RGB tensors normalized to [0, 1] with identical,
/// aligned dimensions; `t` is the temporal position between them.
pub trait InterpolationModel: Send {
    fn infer(&mut self, frame_a: &Array4<f32>, frame_b: &Array4<f32>, t: f32) -> Result<Array4<f32>>;
}

/// Builds interpolation models from raw weights on a given backend
pub trait SessionFactory: Send + Sync {
    /// Capability probe; must not touch any session state
    fn is_available(&self) -> bool;

    fn build(&self, weights: &[u8], backend: ComputeBackend) -> Result<Box<dyn InterpolationModel>>;
}

/// Factory used when the crate is built without an inference runtime
pub struct UnavailableFactory;

impl SessionFactory for UnavailableFactory {
    fn is_available(&self) -> bool {
        false
    }

    fn build(&self, _weights: &[u8], _backend: ComputeBackend) -> Result<Box<dyn InterpolationModel>> {
        Err(ModelError::NoBackend.into())
    }
}
