use serde::{Deserialize, Serialize};

/// Borrowed single-channel 8-bit image.
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

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(usize),
    #[error("invalid frame buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },
    #[error("frame heights differ ({left} vs {right})")]
    HeightMismatch { left: usize, right: usize },
    #[error("frame channel counts differ ({left} vs {right})")]
    ChannelMismatch { left: usize, right: usize },
}

/// Interleaved 8-bit video frame with 1 (gray), 3 (RGB) or 4 (RGBA) channels.
///
/// This is the unit exchanged with frame sources and sinks. Corner detection
/// always works on the luma plane obtained from [`Frame::to_gray`].
///
/// The channel count and buffer length are checked at construction,
/// including deserialization, so every `Frame` is well formed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct Frame {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct RawFrame {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl TryFrom<RawFrame> for Frame {
    type Error = FrameError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        Frame::from_raw(raw.width, raw.height, raw.channels, raw.data)
    }
}

impl Frame {
    pub fn from_raw(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FrameError::UnsupportedChannels(channels));
        }
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(FrameError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Frame filled with a constant value in every channel.
    pub fn filled(
        width: usize,
        height: usize,
        channels: usize,
        value: u8,
    ) -> Result<Self, FrameError> {
        Self::from_raw(width, height, channels, vec![value; width * height * channels])
    }

    /// Crate-internal constructor for buffers built from an existing frame.
    pub(crate) fn from_parts(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Self {
        debug_assert!(matches!(channels, 1 | 3 | 4));
        debug_assert_eq!(data.len(), width * height * channels);
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn from_gray(gray: GrayImage) -> Self {
        Self {
            width: gray.width,
            height: gray.height,
            channels: 1,
            data: gray.data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// 1, 3 or 4.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Interleaved row-major samples.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Single-channel intensity using ITU-R BT.601 luma weights.
    ///
    /// Channels are interpreted as R, G, B (alpha ignored).
    pub fn to_gray(&self) -> GrayImage {
        if self.channels == 1 {
            return GrayImage {
                width: self.width,
                height: self.height,
                data: self.data.clone(),
            };
        }

        let data = self
            .data
            .chunks_exact(self.channels)
            .map(|px| {
                let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();

        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Horizontal concatenation `[self | right]`.
    pub fn hconcat(&self, right: &Frame) -> Result<Frame, FrameError> {
        if self.height != right.height {
            return Err(FrameError::HeightMismatch {
                left: self.height,
                right: right.height,
            });
        }
        if self.channels != right.channels {
            return Err(FrameError::ChannelMismatch {
                left: self.channels,
                right: right.channels,
            });
        }

        let left_row = self.width * self.channels;
        let right_row = right.width * right.channels;
        let mut data = Vec::with_capacity(self.data.len() + right.data.len());
        for y in 0..self.height {
            data.extend_from_slice(&self.data[y * left_row..(y + 1) * left_row]);
            data.extend_from_slice(&right.data[y * right_row..(y + 1) * right_row]);
        }

        Ok(Frame {
            width: self.width + right.width,
            height: self.height,
            channels: self.channels,
            data,
        })
    }

    /// Copy of the `[x0, x0 + width)` column band.
    pub fn crop_columns(&self, x0: usize, width: usize) -> Frame {
        let x0 = x0.min(self.width);
        let width = width.min(self.width - x0);
        let row = self.width * self.channels;
        let mut data = Vec::with_capacity(width * self.height * self.channels);
        for y in 0..self.height {
            let start = y * row + x0 * self.channels;
            data.extend_from_slice(&self.data[start..start + width * self.channels]);
        }
        Frame {
            width,
            height: self.height,
            channels: self.channels,
            data,
        }
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear intensity lookup; samples outside the image read as 0.
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
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_to_gray_uses_luma_weights() {
        let frame = Frame::from_raw(2, 1, 3, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let gray = frame.to_gray();
        assert_eq!(gray.data, vec![76, 29]);
    }

    #[test]
    fn rejects_bad_buffers() {
        assert_eq!(
            Frame::from_raw(2, 2, 3, vec![0; 5]),
            Err(FrameError::InvalidBuffer {
                expected: 12,
                got: 5
            })
        );
        assert_eq!(
            Frame::from_raw(1, 1, 2, vec![0; 2]),
            Err(FrameError::UnsupportedChannels(2))
        );
    }

    #[test]
    fn filled_enforces_channel_count() {
        assert_eq!(
            Frame::filled(64, 48, 2, 10),
            Err(FrameError::UnsupportedChannels(2))
        );
        assert_eq!(
            Frame::filled(4, 4, 5, 10),
            Err(FrameError::UnsupportedChannels(5))
        );
        let rgba = Frame::filled(4, 2, 4, 7).unwrap();
        assert_eq!(rgba.channels(), 4);
        assert_eq!(rgba.data().len(), 32);
        assert_eq!(rgba.to_gray().data, vec![7; 8]);
    }

    #[test]
    fn deserialization_validates_frames() {
        let ok: Frame =
            serde_json::from_str(r#"{"width":2,"height":1,"channels":1,"data":[3,4]}"#).unwrap();
        assert_eq!(ok.size(), (2, 1));
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"width":2,"height":1,"channels":1,"data":[3,4]}"#);

        let bad_channels =
            serde_json::from_str::<Frame>(r#"{"width":1,"height":1,"channels":2,"data":[0,0]}"#);
        assert!(bad_channels.unwrap_err().to_string().contains("unsupported channel count 2"));

        let short =
            serde_json::from_str::<Frame>(r#"{"width":2,"height":2,"channels":1,"data":[0]}"#);
        assert!(short.is_err());
    }

    #[test]
    fn hconcat_places_left_then_right() {
        let left = Frame::filled(2, 2, 1, 10).unwrap();
        let right = Frame::filled(3, 2, 1, 20).unwrap();
        let both = left.hconcat(&right).unwrap();
        assert_eq!(both.size(), (5, 2));
        assert_eq!(both.data, vec![10, 10, 20, 20, 20, 10, 10, 20, 20, 20]);
        assert_eq!(both.crop_columns(0, 2), left);
        assert_eq!(both.crop_columns(2, 3), right);

        let short = Frame::filled(2, 1, 1, 0).unwrap();
        assert!(matches!(
            left.hconcat(&short),
            Err(FrameError::HeightMismatch { .. })
        ));
    }

    #[test]
    fn bilinear_is_exact_on_integer_coordinates() {
        let img = GrayImage {
            width: 3,
            height: 2,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        let v = img.view();
        assert_eq!(sample_bilinear_u8(&v, 2.0, 1.0), 6);
        assert_eq!(sample_bilinear(&v, 0.5, 0.0), 1.5);
        assert_eq!(sample_bilinear(&v, -3.0, 0.0), 0.0);
    }
}
