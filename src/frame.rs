//! Frame container and colour conversions.
//!
//! A `Frame` is one image sample from a capture source: interleaved BGR,
//! 3 channels, 8 bits per channel. Frames are produced once, consumed once,
//! and never persisted.
//!
//! The pipeline needs three views of a frame:
//! - BGR bytes (annotation mutates these in place)
//! - RGB bytes (object detector input)
//! - greyscale bytes (face detector input)

use anyhow::{anyhow, Result};
use image::RgbImage;

/// One captured frame. Interleaved BGR, 8-bit, 3 channels.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap raw BGR bytes. The byte length must match `width * height * 3`.
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} BGR bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Wrap raw RGB bytes (e.g. straight out of a JPEG decode), converting
    /// to the BGR layout the pipeline works in.
    pub fn from_rgb(mut data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
        Self::from_bgr(data, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bgr(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel access for in-place annotation.
    pub fn as_bgr_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// RGB copy of the frame, the layout object detectors expect.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = self.data.clone();
        for pixel in rgb.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
        rgb
    }

    /// Greyscale copy (BT.601 luma), the layout face detectors expect.
    pub fn to_gray(&self) -> Vec<u8> {
        self.data
            .chunks_exact(3)
            .map(|bgr| {
                let b = bgr[0] as u32;
                let g = bgr[1] as u32;
                let r = bgr[2] as u32;
                ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
            })
            .collect()
    }

    /// Encode the frame as JPEG for streaming.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>> {
        let rgb = self.to_rgb();
        let image = RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| anyhow!("frame buffer does not match dimensions"))?;
        let mut out = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut out);
        image
            .write_with_encoder(encoder)
            .map_err(|e| anyhow!("jpeg encode failed: {}", e))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::from_bgr(vec![0u8; 10], 4, 4).is_err());
    }

    #[test]
    fn rgb_round_trips_channel_order() {
        // One blue pixel in BGR is (255, 0, 0).
        let frame = Frame::from_bgr(vec![255, 0, 0], 1, 1).unwrap();
        assert_eq!(frame.to_rgb(), vec![0, 0, 255]);

        let back = Frame::from_rgb(vec![0, 0, 255], 1, 1).unwrap();
        assert_eq!(back.as_bgr(), &[255, 0, 0]);
    }

    #[test]
    fn gray_uses_luma_weights() {
        // Pure green: 0.587 * 255 ~= 150.
        let frame = Frame::from_bgr(vec![0, 255, 0], 1, 1).unwrap();
        let gray = frame.to_gray();
        assert_eq!(gray.len(), 1);
        assert!((gray[0] as i32 - 150).abs() <= 1);

        // White stays white, black stays black.
        let white = Frame::from_bgr(vec![255, 255, 255], 1, 1).unwrap();
        assert_eq!(white.to_gray(), vec![255]);
        let black = Frame::from_bgr(vec![0, 0, 0], 1, 1).unwrap();
        assert_eq!(black.to_gray(), vec![0]);
    }

    #[test]
    fn jpeg_encode_produces_jfif_bytes() {
        let frame = Frame::from_bgr(vec![128u8; 8 * 8 * 3], 8, 8).unwrap();
        let jpeg = frame.encode_jpeg().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }
}
