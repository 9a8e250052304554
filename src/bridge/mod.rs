//! # Bridge Synthesis
//!
//! Builds the short transition clip that carries the end of the source back
//! to its beginning, either by neural in-betweening of the boundary frames
//! or with an `xfade` crossfade of the two boundary windows.

pub mod synthesizer;
pub mod types;

pub use synthesizer::{blend_window, bridge_frame_rate, BridgeSynthesizer};
pub use types::{BridgeClip, BridgeMode, BridgeResult};
