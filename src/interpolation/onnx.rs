//! ONNX Runtime backend for RIFE-style three-input models
//! (`img0`, `img1`, `timestep` → `output`).

use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, DirectMLExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{ModelError, Result};
use crate::interpolation::backend::{ComputeBackend, InterpolationModel, SessionFactory};

const INPUT_IMG0: &str = "img0";
const INPUT_IMG1: &str = "img1";
const INPUT_TIMESTEP: &str = "timestep";
const OUTPUT_NAME: &str = "output";

pub struct OnnxSessionFactory {
    intra_threads: usize,
}

impl OnnxSessionFactory {
    pub fn new(intra_threads: usize) -> Self {
        Self {
            intra_threads: intra_threads.max(1),
        }
    }

    fn provider(backend: ComputeBackend) -> ExecutionProviderDispatch {
        // Accelerated providers must fail loudly, otherwise ort silently lands on CPU
        match backend {
            ComputeBackend::Cuda => CUDAExecutionProvider::default().build().error_on_failure(),
            ComputeBackend::DirectMl => DirectMLExecutionProvider::default().build().error_on_failure(),
            ComputeBackend::Cpu => CPUExecutionProvider::default().build(),
        }
    }
}

impl SessionFactory for OnnxSessionFactory {
    fn is_available(&self) -> bool {
        true
    }

    fn build(&self, weights: &[u8], backend: ComputeBackend) -> Result<Box<dyn InterpolationModel>> {
        let load_failed = |e: ort::Error| ModelError::LoadFailed {
            reason: format!("{} session: {}", backend, e),
        };

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(self.intra_threads))
            .and_then(|b| b.with_execution_providers([Self::provider(backend)]))
            .and_then(|b| b.commit_from_memory(weights))
            .map_err(load_failed)?;

        Ok(Box::new(OnnxInterpolator { session }))
    }
}

struct OnnxInterpolator {
    session: Session,
}

impl InterpolationModel for OnnxInterpolator {
    fn infer(&mut self, frame_a: &Array4<f32>, frame_b: &Array4<f32>, t: f32) -> Result<Array4<f32>> {
        let inference = |e: ort::Error| ModelError::Inference { reason: e.to_string() };

        let tensor0 = Tensor::from_array(frame_a.clone()).map_err(inference)?;
        let tensor1 = Tensor::from_array(frame_b.clone()).map_err(inference)?;
        let timestep = Tensor::from_array(Array4::<f32>::from_elem((1, 1, 1, 1), t)).map_err(inference)?;

        let outputs = self
            .session
            .run(ort::inputs![INPUT_IMG0 => &tensor0, INPUT_IMG1 => &tensor1, INPUT_TIMESTEP => &timestep])
            .map_err(inference)?;
        let output = outputs[OUTPUT_NAME].try_extract_array::<f32>().map_err(inference)?;

        output
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|e| ModelError::Inference {
                reason: format!("expected a 4D output: {}", e),
            }
            .into())
    }
}
