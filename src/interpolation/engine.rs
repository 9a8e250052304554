use std::sync::{Arc, Mutex};

use image::RgbImage;
use ndarray::Array4;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{ModelError, Result};
use crate::interpolation::backend::{ComputeBackend, InterpolationModel, SessionFactory};
use crate::interpolation::model_store::ModelStore;
use crate::interpolation::tensor::{align_frame, image_to_tensor, resize_to, tensor_to_image};

type SharedModel = Arc<Mutex<Box<dyn InterpolationModel>>>;

/// A constructed inference session bound to one compute backend
#[derive(Clone)]
pub struct InferenceSession {
    model: SharedModel,
    backend: ComputeBackend,
}

impl std::fmt::Debug for InferenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSession")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl InferenceSession {
    pub fn backend(&self) -> ComputeBackend {
        self.backend
    }
}

/// Temporal position of step `index` (1-based) out of `steps`
pub fn interpolation_t(index: u32, steps: u32) -> f32 {
    index as f32 / (steps as f32 + 1.0)
}

/// Frame-interpolation engine with a lazily-constructed, cached session
pub struct FrameInterpolator {
    store: ModelStore,
    factory: Arc<dyn SessionFactory>,
    enabled: bool,
    alignment: u32,
    session: OnceCell<InferenceSession>,
}

impl FrameInterpolator {
    pub fn new(store: ModelStore, factory: Arc<dyn SessionFactory>, enabled: bool, alignment: u32) -> Self {
        Self {
            store,
            factory,
            enabled,
            alignment: alignment.max(1),
            session: OnceCell::new(),
        }
    }

    /// Whether the AI path can be attempted at all. Never touches session state.
    pub fn is_available(&self) -> bool {
        self.enabled && self.factory.is_available()
    }

    /// Fetch weights (cache or download) and bind a session on the best backend
    pub async fn ensure_model_ready(&self, progress: &mut (dyn FnMut(u8) + Send)) -> Result<InferenceSession> {
        if !self.is_available() {
            return Err(ModelError::NoBackend.into());
        }

        if let Some(session) = self.session.get() {
            progress(100);
            return Ok(session.clone());
        }

        let init = async {
            let weights = self.store.fetch(progress).await?;
            let factory = self.factory.clone();
            let session = tokio::task::spawn_blocking(move || build_session(factory.as_ref(), &weights))
                .await
                .map_err(|e| ModelError::LoadFailed {
                    reason: format!("session construction panicked: {}", e),
                })??;
            Ok::<_, crate::error::PipelineError>(session)
        };

        let session = self.session.get_or_try_init(|| init).await?.clone();
        progress(100);
        Ok(session)
    }

    /// Lazily interpolate `steps` frames between `frame_a` and `frame_b`.
    ///
    /// Frames are resized to the model alignment and stay at that size; the
    /// caller upsamples. Requires [`ensure_model_ready`](Self::ensure_model_ready).
    pub fn interpolate(&self, frame_a: &RgbImage, frame_b: &RgbImage, steps: u32) -> Result<InterpolationSequence> {
        let session = self.session.get().ok_or(ModelError::NoBackend)?;

        let aligned_a = align_frame(frame_a, self.alignment);
        let aligned_b = resize_to(&align_frame(frame_b, self.alignment), aligned_a.width(), aligned_a.height());
        debug!(
            "Interpolating {} frames at {}x{} on {}",
            steps,
            aligned_a.width(),
            aligned_a.height(),
            session.backend
        );

        Ok(InterpolationSequence {
            model: session.model.clone(),
            frame_a: Arc::new(image_to_tensor(&aligned_a)),
            frame_b: Arc::new(image_to_tensor(&aligned_b)),
            width: aligned_a.width(),
            height: aligned_a.height(),
            steps,
            next_index: 1,
        })
    }
}

fn build_session(factory: &dyn SessionFactory, weights: &[u8]) -> Result<InferenceSession> {
    let mut failures = Vec::new();
    for backend in ComputeBackend::PRIORITY {
        match factory.build(weights, backend) {
            Ok(model) => {
                info!("Interpolation session bound to {} backend", backend);
                return Ok(InferenceSession {
                    model: Arc::new(Mutex::new(model)),
                    backend,
                });
            }
            Err(e) => {
                debug!("{} backend unavailable: {}", backend, e);
                failures.push(format!("{}: {}", backend, e));
            }
        }
    }

    Err(ModelError::LoadFailed {
        reason: failures.join("; "),
    }
    .into())
}

/// Finite, non-restartable sequence of interpolated frames in increasing t
pub struct InterpolationSequence {
    model: SharedModel,
    frame_a: Arc<Array4<f32>>,
    frame_b: Arc<Array4<f32>>,
    width: u32,
    height: u32,
    steps: u32,
    next_index: u32,
}

impl InterpolationSequence {
    /// Dimensions the frames are produced at
    pub fn inference_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn remaining(&self) -> u32 {
        (self.steps + 1).saturating_sub(self.next_index)
    }

    /// Run inference for the next frame; `None` once all steps were produced
    pub async fn next_frame(&mut self) -> Option<Result<RgbImage>> {
        if self.next_index > self.steps {
            return None;
        }
        let t = interpolation_t(self.next_index, self.steps);
        self.next_index += 1;

        let model = self.model.clone();
        let frame_a = self.frame_a.clone();
        let frame_b = self.frame_b.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut model = model.lock().map_err(|_| ModelError::Inference {
                reason: "inference session poisoned by an earlier panic".to_string(),
            })?;
            let output = model.infer(&frame_a, &frame_b, t)?;
            tensor_to_image(&output)
        })
        .await;

        Some(match result {
            Ok(frame) => frame,
            Err(e) => Err(ModelError::Inference {
                reason: format!("inference task failed: {}", e),
            }
            .into()),
        })
    }
}
