//! FAST-9 segment-test corners with 3x3 non-maximum suppression.

use planar_ar_core::GrayImageView;

/// Bresenham circle of radius 3, clockwise from 12 o'clock.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC: u32 = 9;

/// A FAST corner candidate in integer pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Corner {
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

/// `true` if the circular 16-bit mask holds a run of at least `ARC` set bits.
#[inline]
fn has_arc(mask: u16) -> bool {
    if mask.count_ones() < ARC {
        return false;
    }
    let mut acc = (mask as u32) | ((mask as u32) << 16);
    for _ in 1..ARC {
        acc &= acc >> 1;
    }
    acc != 0
}

/// Sum of `|diff| - threshold` over the longest arc of `mask`.
fn arc_score(diffs: &[i16; 16], threshold: i16, mask: u16) -> f32 {
    let m32 = (mask as u32) | ((mask as u32) << 16);
    let (mut best_start, mut best_len) = (0usize, 0usize);
    let mut i = 0usize;
    while i < 16 {
        if m32 & (1 << i) == 0 {
            i += 1;
            continue;
        }
        let start = i;
        while i < 32 && m32 & (1 << i) != 0 {
            i += 1;
        }
        if i - start > best_len {
            best_len = (i - start).min(16);
            best_start = start;
        }
    }
    (best_start..best_start + best_len)
        .map(|j| (diffs[j % 16].abs() - threshold).max(0) as f32)
        .sum()
}

/// Segment-test score at `(x, y)`, or `None` when it is not a corner.
/// Caller guarantees a 3-pixel margin.
#[inline]
fn corner_score(img: &GrayImageView<'_>, x: usize, y: usize, threshold: i16) -> Option<f32> {
    let w = img.width as i32;
    let center = img.data[y * img.width + x] as i16;
    let at = |k: usize| {
        let (dx, dy) = CIRCLE[k];
        let idx = (y as i32 + dy) * w + (x as i32 + dx);
        img.data[idx as usize] as i16 - center
    };

    // Any 9-arc covers at least two of the four cardinal points.
    let cardinals = [at(0), at(4), at(8), at(12)];
    let bright = cardinals.iter().filter(|&&d| d > threshold).count();
    let dark = cardinals.iter().filter(|&&d| d < -threshold).count();
    if bright < 2 && dark < 2 {
        return None;
    }

    let mut diffs = [0i16; 16];
    let (mut bright_mask, mut dark_mask) = (0u16, 0u16);
    for (k, d) in diffs.iter_mut().enumerate() {
        *d = at(k);
        if *d > threshold {
            bright_mask |= 1 << k;
        } else if *d < -threshold {
            dark_mask |= 1 << k;
        }
    }

    let mut best: Option<f32> = None;
    for mask in [bright_mask, dark_mask] {
        if has_arc(mask) {
            let s = arc_score(&diffs, threshold, mask);
            best = Some(best.map_or(s, |b| b.max(s)));
        }
    }
    best
}

/// Detect FAST-9 corners at least `border` pixels from every edge
/// (never less than 3), keeping only 3x3 local maxima of the score.
///
/// Equal-score neighbours resolve in favour of the earlier pixel in raster
/// order. Output is in raster order.
pub(crate) fn detect(img: &GrayImageView<'_>, threshold: u8, border: usize) -> Vec<Corner> {
    let border = border.max(3);
    let (w, h) = (img.width, img.height);
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    // Scores over the whole 3..w-3 band so that NMS at the border margin sees
    // its outer neighbours.
    let mut scores = vec![0f32; w * h];
    for y in 3..h - 3 {
        for x in 3..w - 3 {
            if let Some(s) = corner_score(img, x, y, threshold as i16) {
                scores[y * w + x] = s;
            }
        }
    }

    let mut out = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let s = scores[y * w + x];
            if s <= 0.0 {
                continue;
            }
            let mut is_max = true;
            'nbr: for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let n = scores[(y as i32 + dy) as usize * w + (x as i32 + dx) as usize];
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if n > s || (earlier && n == s) {
                        is_max = false;
                        break 'nbr;
                    }
                }
            }
            if is_max {
                out.push(Corner { x, y, score: s });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_ar_core::GrayImage;

    fn square(size: usize, x0: usize, y0: usize, side: usize) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.set(x, y, 220);
            }
        }
        img
    }

    #[test]
    fn uniform_image_has_no_corners() {
        let img = GrayImage::from_raw(40, 40, vec![128; 1600]).unwrap();
        assert!(detect(&img.view(), 20, 3).is_empty());
    }

    #[test]
    fn bright_square_yields_corners_near_its_vertices() {
        let img = square(60, 20, 20, 20);
        let corners = detect(&img.view(), 20, 3);
        assert!(!corners.is_empty());
        let vertices = [(20.0, 20.0), (39.0, 20.0), (39.0, 39.0), (20.0, 39.0)];
        for (vx, vy) in vertices {
            let near = corners.iter().any(|c| {
                let dx = c.x as f32 - vx;
                let dy = c.y as f32 - vy;
                (dx * dx + dy * dy).sqrt() <= 3.0
            });
            assert!(near, "no corner near ({vx}, {vy})");
        }
        // A straight edge is not a corner.
        assert!(!corners.iter().any(|c| c.x == 30 && c.y == 20));
    }

    #[test]
    fn non_maximum_suppression_keeps_isolated_maxima() {
        let img = square(60, 20, 20, 20);
        let corners = detect(&img.view(), 20, 3);
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                let adjacent = a.x.abs_diff(b.x) <= 1 && a.y.abs_diff(b.y) <= 1;
                assert!(!adjacent, "{a:?} and {b:?} both survived");
            }
        }
    }

    #[test]
    fn border_excludes_edge_corners() {
        let img = square(60, 20, 20, 20);
        assert!(detect(&img.view(), 20, 25).is_empty());
        assert!(detect(&img.view(), 20, 40).is_empty());
    }

    #[test]
    fn arc_detection_wraps_around() {
        // Bits 12..16 and 0..5 form a 9-run across the wrap.
        let mask: u16 = 0b1111_0000_0001_1111;
        assert!(has_arc(mask));
        assert!(!has_arc(0b0000_0001_1111_1111 >> 1));
    }
}
