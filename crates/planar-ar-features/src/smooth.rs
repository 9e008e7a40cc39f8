use planar_ar_core::{GrayImage, GrayImageView};

/// Summed-area table with a zero top row and left column.
pub(crate) struct IntegralImage {
    width: usize,
    height: usize,
    sums: Vec<u32>,
}

impl IntegralImage {
    pub fn new(img: &GrayImageView<'_>) -> Self {
        let stride = img.width + 1;
        let mut sums = vec![0u32; stride * (img.height + 1)];
        for y in 0..img.height {
            let mut row = 0u32;
            for x in 0..img.width {
                row += img.data[y * img.width + x] as u32;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self {
            width: img.width,
            height: img.height,
            sums,
        }
    }

    /// Sum over the half-open pixel rectangle `[x0, x1) x [y0, y1)`,
    /// clamped to the image.
    pub fn rect_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u32 {
        let (x1, y1) = (x1.min(self.width), y1.min(self.height));
        if x0 >= x1 || y0 >= y1 {
            return 0;
        }
        let stride = self.width + 1;
        let at = |x: usize, y: usize| self.sums[y * stride + x];
        at(x1, y1) + at(x0, y0) - at(x0, y1) - at(x1, y0)
    }
}

/// Mean over the `(2r+1)²` box around each pixel; the box is clipped at the
/// image border and the mean taken over the pixels that remain.
pub(crate) fn box_blur(img: &GrayImageView<'_>, radius: usize) -> GrayImage {
    let integral = IntegralImage::new(img);
    let mut out = GrayImage::new(img.width, img.height);
    for y in 0..img.height {
        let (y0, y1) = (y.saturating_sub(radius), (y + radius + 1).min(img.height));
        for x in 0..img.width {
            let (x0, x1) = (x.saturating_sub(radius), (x + radius + 1).min(img.width));
            let n = ((x1 - x0) * (y1 - y0)) as u32;
            let s = integral.rect_sum(x0, y0, x1, y1);
            out.data[y * img.width + x] = ((s + n / 2) / n) as u8;
        }
    }
    out
}
