#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Errors raised when a pixel buffer does not match its declared layout.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("invalid pixel buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },

    #[error("unsupported channel count {channels} (expected 1, 3 or 4)")]
    UnsupportedChannels { channels: usize },
}

impl GrayImage {
    /// Black image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = checked_len(width, height, 1)?;
        if data.len() != expected {
            return Err(ImageError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn to_owned_image(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

/// Byte order of interleaved color frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Blue first, the layout produced by most capture back-ends.
    #[default]
    Bgr,
    Rgb,
}

/// Interleaved 8-bit frame with 1, 3 or 4 channels.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub order: ChannelOrder,
    pub data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Wrap a raw buffer, validating its length against the declared layout.
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(ImageError::UnsupportedChannels { channels });
        }
        let expected = checked_len(width, height, channels)?;
        if data.len() != expected {
            return Err(ImageError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            order: ChannelOrder::Bgr,
            data,
        })
    }

    pub fn with_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
        self
    }
}

impl<'a> From<GrayImageView<'a>> for FrameView<'a> {
    fn from(view: GrayImageView<'a>) -> Self {
        Self {
            width: view.width,
            height: view.height,
            channels: 1,
            order: ChannelOrder::Bgr,
            data: view.data,
        }
    }
}

fn checked_len(width: usize, height: usize, channels: usize) -> Result<usize, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(ImageError::InvalidDimensions { width, height })
}

/// Convert a frame to 8-bit luma.
///
/// Single-channel input is copied through unchanged; 3- and 4-channel input
/// uses the Rec.601 weights (alpha is ignored).
pub fn to_gray(frame: &FrameView<'_>) -> Result<GrayImage, ImageError> {
    let n = checked_len(frame.width, frame.height, frame.channels)?;
    if frame.data.len() != n {
        return Err(ImageError::InvalidBuffer {
            expected: n,
            got: frame.data.len(),
        });
    }

    let data = match frame.channels {
        1 => frame.data.to_vec(),
        3 | 4 => frame
            .data
            .chunks_exact(frame.channels)
            .map(|px| {
                let (r, g, b) = match frame.order {
                    ChannelOrder::Bgr => (px[2], px[1], px[0]),
                    ChannelOrder::Rgb => (px[0], px[1], px[2]),
                };
                luma(r, g, b)
            })
            .collect(),
        channels => return Err(ImageError::UnsupportedChannels { channels }),
    };

    Ok(GrayImage {
        width: frame.width,
        height: frame.height,
        data,
    })
}

// Fixed-point Rec.601: 0.299 R + 0.587 G + 0.114 B, 14-bit weights.
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    const WR: u32 = 4899;
    const WG: u32 = 9617;
    const WB: u32 = 1868;
    ((WR * r as u32 + WG * g as u32 + WB * b as u32 + (1 << 13)) >> 14) as u8
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    (sample_bilinear(src, x, y) + 0.5).clamp(0.0, 255.0) as u8
}
