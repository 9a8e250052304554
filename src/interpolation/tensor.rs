use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use ndarray::Array4;

use crate::error::{ModelError, Result};

/// Round `width`/`height` to the nearest multiple of `alignment` (at least one unit)
pub fn aligned_dimensions(width: u32, height: u32, alignment: u32) -> (u32, u32) {
    let align = |v: u32| {
        let units = ((v as f64) / alignment as f64).round().max(1.0) as u32;
        units * alignment
    };
    (align(width), align(height))
}

/// Resize so both dimensions are multiples of `alignment`
pub fn align_frame(frame: &RgbImage, alignment: u32) -> RgbImage {
    let (width, height) = aligned_dimensions(frame.width(), frame.height(), alignment);
    resize_to(frame, width, height)
}

pub fn resize_to(frame: &RgbImage, width: u32, height: u32) -> RgbImage {
    if frame.width() == width && frame.height() == height {
        return frame.clone();
    }
    image::imageops::resize(frame, width, height, FilterType::Lanczos3)
}

/// Scale down so the long edge is at most `max_edge`, keeping aspect ratio
pub fn bound_long_edge(frame: &RgbImage, max_edge: u32) -> RgbImage {
    let long_edge = frame.width().max(frame.height());
    if long_edge <= max_edge {
        return frame.clone();
    }
    let scale = max_edge as f64 / long_edge as f64;
    let width = ((frame.width() as f64 * scale).round() as u32).max(1);
    let height = ((frame.height() as f64 * scale).round() as u32).max(1);
    resize_to(frame, width, height)
}

/// RGB8 image to a `[1, 3, H, W]` tensor in [0, 1]
pub fn image_to_tensor(frame: &RgbImage) -> Array4<f32> {
    let (width, height) = frame.dimensions();
    Array4::from_shape_fn((1, 3, height as usize, width as usize), |(_, c, y, x)| {
        frame.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// `[1, 3, H, W]` tensor back to RGB8, clamping model overshoot
pub fn tensor_to_image(tensor: &Array4<f32>) -> Result<RgbImage> {
    let shape = tensor.shape();
    if shape[0] < 1 || shape[1] != 3 {
        return Err(ModelError::Inference {
            reason: format!("unexpected output shape {:?}", shape),
        }
        .into());
    }

    let (height, width) = (shape[2] as u32, shape[3] as u32);
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let channel = |c: usize| denormalize(tensor[[0, c, y as usize, x as usize]]);
        Rgb([channel(0), channel(1), channel(2)])
    }))
}

fn denormalize(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}
