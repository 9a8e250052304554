//! # Frame Interpolation
//!
//! Neural in-betweening for the AI bridge: a persistent weight cache, a
//! session bound to the best available compute backend, and tensor
//! conversion between RGB8 frames and the model's NCHW layout.

pub mod backend;
pub mod engine;
pub mod model_store;
pub mod tensor;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use backend::{ComputeBackend, InterpolationModel, SessionFactory, UnavailableFactory};
pub use engine::{FrameInterpolator, InferenceSession, InterpolationSequence};
pub use model_store::{CacheEntryMeta, ModelStore};

use std::sync::Arc;

use crate::config::ModelConfig;

/// The session factory this build supports
pub fn default_factory(config: &ModelConfig) -> Arc<dyn SessionFactory> {
    #[cfg(feature = "onnx")]
    {
        Arc::new(onnx::OnnxSessionFactory::new(config.inference_threads))
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = config;
        Arc::new(UnavailableFactory)
    }
}
