//! Window frame capture
//!
//! Frames leave this module as 3-channel RGB: matching is defined on
//! color/gray data only, so any alpha channel the capture path produces
//! is stripped here and nowhere else.

use image::RgbImage;

use crate::error::CaptureError;
use crate::window::WindowHandle;

/// One captured frame of a window's visible content.
///
/// Ephemeral: produced per capture call, owned by the caller, discarded
/// after one match pass.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB8, no alpha
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Wrap an RGB8 buffer. Returns None if the buffer length does not
    /// match `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        if pixels.len() != (width as usize) * (height as usize) * 3 {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a frame from a BGRA buffer (the GDI bitmap layout),
    /// dropping alpha and swapping to RGB.
    pub fn from_bgra(width: u32, height: u32, bgra: &[u8]) -> Option<Self> {
        if bgra.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        let mut pixels = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for px in bgra.chunks_exact(4) {
            pixels.push(px[2]);
            pixels.push(px[1]);
            pixels.push(px[0]);
        }
        Frame::from_rgb(width, height, pixels)
    }

    /// View the frame as an `image` buffer
    pub fn to_rgb_image(&self) -> RgbImage {
        // Length invariant is enforced by the constructors
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

impl From<RgbImage> for Frame {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }
}

/// Source of window frames.
///
/// Implementations must capture the window's visible content even when
/// the window is occluded or in the background.
pub trait CaptureSource: Send {
    fn capture(&self, handle: WindowHandle) -> Result<Frame, CaptureError>;
}
