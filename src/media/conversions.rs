// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion kernels
//!
//! Pure per-format functions mapping raw source buffers to packed BGR, the
//! canonical format every sink consumes. The stateful wrapper that chooses
//! a kernel per frame lives in [`super::converter`].

/// Convert packed RGB to packed BGR (channel swap)
pub fn rgb_to_bgr(data: &[u8]) -> Vec<u8> {
    let mut bgr = Vec::with_capacity(data.len());
    for px in data.chunks_exact(3) {
        bgr.push(px[2]);
        bgr.push(px[1]);
        bgr.push(px[0]);
    }
    bgr
}

/// Convert packed BGR to packed RGB.
///
/// Same swap as [`rgb_to_bgr`]; named separately because the JPEG encoder
/// wants RGB input while the pipeline's canonical order is BGR.
pub fn bgr_to_rgb(data: &[u8]) -> Vec<u8> {
    rgb_to_bgr(data)
}

/// Convert packed RGBA to packed BGR, discarding alpha
pub fn rgba_to_bgr(data: &[u8]) -> Vec<u8> {
    let mut bgr = Vec::with_capacity(data.len() / 4 * 3);
    for px in data.chunks_exact(4) {
        bgr.push(px[2]);
        bgr.push(px[1]);
        bgr.push(px[0]);
    }
    bgr
}

/// Convert 8-bit grayscale to packed BGR by channel replication
pub fn mono_to_bgr(data: &[u8]) -> Vec<u8> {
    let mut bgr = Vec::with_capacity(data.len() * 3);
    for &v in data {
        bgr.push(v);
        bgr.push(v);
        bgr.push(v);
    }
    bgr
}

/// Convert YUYV (YUV 4:2:2) to packed BGR
///
/// YUYV format: Y0 U Y1 V - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
///
/// Always produces exactly one BGR pixel per input pixel: an odd pixel
/// count leaves a trailing half macropixel (Y U, no V byte), which is
/// decoded with the previous macropixel's V.
pub fn yuyv_to_bgr(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    fn push_yuv(bgr: &mut Vec<u8>, y: f32, u: f32, v: f32) {
        let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
        let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
        bgr.push(b);
        bgr.push(g);
        bgr.push(r);
    }

    let pixel_count = (width * height) as usize;
    let mut bgr = Vec::with_capacity(pixel_count * 3);
    let mut last_v = 0.0;

    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;
        last_v = v;

        for y in [y0, y1] {
            if bgr.len() >= pixel_count * 3 {
                break;
            }
            push_yuv(&mut bgr, y, u, v);
        }
    }

    let tail = data.chunks_exact(4).remainder();
    if bgr.len() < pixel_count * 3 && tail.len() >= 2 {
        push_yuv(&mut bgr, tail[0] as f32, tail[1] as f32 - 128.0, last_v);
    }

    bgr
}

/// Downscale a packed BGR frame by 2 in both dimensions (2x2 box average).
///
/// This is the preview resize: sinks that display want half resolution.
/// Returns the new buffer and its dimensions.
pub fn downscale_half_bgr(data: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    let w = width as usize;
    let out_w = (width / 2).max(1);
    let out_h = (height / 2).max(1);
    let mut out = Vec::with_capacity((out_w * out_h * 3) as usize);

    for oy in 0..out_h as usize {
        for ox in 0..out_w as usize {
            let x = ox * 2;
            let y = oy * 2;
            for c in 0..3 {
                let i00 = (y * w + x) * 3 + c;
                let i01 = (y * w + (x + 1).min(w - 1)) * 3 + c;
                let i10 = ((y + 1).min(height as usize - 1) * w + x) * 3 + c;
                let i11 = ((y + 1).min(height as usize - 1) * w + (x + 1).min(w - 1)) * 3 + c;
                let sum =
                    data[i00] as u32 + data[i01] as u32 + data[i10] as u32 + data[i11] as u32;
                out.push((sum / 4) as u8);
            }
        }
    }

    (out, out_w, out_h)
}
