// SPDX-License-Identifier: GPL-3.0-only

//! Conversions from camera pixel formats to packed RGB

use image::{ImageFormat, RgbImage};

/// Convert YUV (BT.601) to RGB
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

/// Convert packed 4:2:2 YUYV (Y0 U Y1 V) to packed RGB
///
/// `stride` is the number of bytes per source row (at least `width * 2`).
/// Returns `None` if the buffer is too small for the given geometry.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    let width = width as usize;
    let height = height as usize;
    let stride = (stride as usize).max(width * 2);

    if height == 0 || data.len() < stride * (height - 1) + width * 2 {
        return None;
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let line = &data[row * stride..row * stride + width * 2];
        for x in 0..width {
            // Two pixels share one U/V pair
            let base = (x & !1) * 2;
            let luma = if x & 1 == 0 { line[base] } else { line[base + 2] };
            let (u, v) = if base + 3 < line.len() {
                (line[base + 1], line[base + 3])
            } else {
                (128, 128)
            };
            let (r, g, b) = yuv_to_rgb(luma, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    Some(rgb)
}

/// Decode an MJPEG frame into RGB
pub fn decode_mjpeg(data: &[u8]) -> Result<RgbImage, String> {
    image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map(|img| img.to_rgb8())
        .map_err(|e| format!("MJPEG decode failed: {}", e))
}

/// Drop row padding from an RGB buffer with `stride` bytes per row
pub fn pack_rgb_rows(data: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    let row_bytes = width as usize * 3;
    let stride = stride as usize;
    let height = height as usize;

    if stride == row_bytes {
        return (data.len() >= row_bytes * height).then(|| data[..row_bytes * height].to_vec());
    }
    if stride < row_bytes || height == 0 || data.len() < stride * (height - 1) + row_bytes {
        return None;
    }

    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        packed.extend_from_slice(&data[start..start + row_bytes]);
    }
    Some(packed)
}
