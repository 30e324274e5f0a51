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

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Wrap a row-major buffer; `None` if its length is not `width * height`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width.checked_mul(height)?).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width && y < self.height).then(|| self.data[y * self.width + x])
    }
}

/// Read one channel of an interleaved buffer; outside pixels are black.
#[inline]
fn get_channel(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    c: usize,
    x: i32,
    y: i32,
) -> u8 {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return 0;
    }
    data[(y as usize * width + x as usize) * channels + c]
}

/// Bilinear sample of channel `c` in an interleaved `channels`-per-pixel buffer.
///
/// Coordinates that are non-finite or a full pixel outside the buffer read
/// as black before any integer conversion.
#[inline]
pub fn sample_bilinear_interleaved(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    c: usize,
    x: f32,
    y: f32,
) -> f32 {
    let inside = x > -1.0 && y > -1.0 && x < width as f32 && y < height as f32;
    if !inside {
        return 0.0;
    }
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_channel(data, width, height, channels, c, x0, y0) as f32;
    let p10 = get_channel(data, width, height, channels, c, x0 + 1, y0) as f32;
    let p01 = get_channel(data, width, height, channels, c, x0, y0 + 1) as f32;
    let p11 = get_channel(data, width, height, channels, c, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    sample_bilinear_interleaved(src.data, src.width, src.height, 1, 0, x, y)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}
