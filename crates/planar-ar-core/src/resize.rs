//! Area-averaging downsampling.

use crate::{GrayImage, GrayImageView};

/// One source span contributing to a destination pixel: `(index, weight)`.
type Taps = Vec<(usize, f32)>;

// For each destination index, the source indices overlapping its footprint
// `[d * scale, (d + 1) * scale)` and their normalized coverage.
fn area_taps(src_len: usize, dst_len: usize) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = ((d + 1) as f64 * scale).min(src_len as f64);
            let mut taps = Taps::new();
            let mut s = start.floor() as usize;
            while (s as f64) < end && s < src_len {
                let lo = start.max(s as f64);
                let hi = end.min((s + 1) as f64);
                if hi > lo {
                    taps.push((s, (hi - lo) as f32));
                }
                s += 1;
            }
            let total: f32 = taps.iter().map(|&(_, w)| w).sum();
            if total > 0.0 {
                for t in &mut taps {
                    t.1 /= total;
                }
            }
            taps
        })
        .collect()
}

/// Shrink `src` to `dst_w × dst_h` by averaging the source area each
/// destination pixel covers.
///
/// Destination dimensions are clamped to `1..=src` so the call never upsamples.
pub fn resize_area(src: &GrayImageView<'_>, dst_w: usize, dst_h: usize) -> GrayImage {
    let dst_w = dst_w.clamp(1, src.width.max(1));
    let dst_h = dst_h.clamp(1, src.height.max(1));

    let x_taps = area_taps(src.width, dst_w);
    let y_taps = area_taps(src.height, dst_h);

    // Horizontal pass into f32 rows, then vertical pass.
    let mut rows = vec![0f32; dst_w * src.height];
    for y in 0..src.height {
        let line = &src.data[y * src.width..(y + 1) * src.width];
        for (x, taps) in x_taps.iter().enumerate() {
            rows[y * dst_w + x] = taps.iter().map(|&(s, w)| line[s] as f32 * w).sum();
        }
    }

    let mut out = GrayImage::new(dst_w, dst_h);
    for (y, taps) in y_taps.iter().enumerate() {
        for x in 0..dst_w {
            let v: f32 = taps.iter().map(|&(s, w)| rows[s * dst_w + x] * w).sum();
            out.data[y * dst_w + x] = (v + 0.5).clamp(0.0, 255.0) as u8;
        }
    }
    out
}
