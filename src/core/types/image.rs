//! Depth and color image buffers.

use serde::{Deserialize, Serialize};

/// Sentinel value marking a pixel with no depth measurement.
pub const DEPTH_SENTINEL: f32 = f32::NEG_INFINITY;

/// Row-major depth image, one metric depth value per pixel.
///
/// Pixels with no measurement hold [`DEPTH_SENTINEL`] or NaN; both are
/// treated as invalid by [`DepthImage::is_valid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthImage {
    /// Wrap a raw depth buffer.
    ///
    /// The buffer length must equal `width * height`; anything else is a
    /// caller contract breach.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "depth buffer size does not match image dimensions"
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// An image with every pixel marked invalid.
    pub fn filled_invalid(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![DEPTH_SENTINEL; width * height],
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

    /// Raw row-major buffer.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Depth at pixel `(x, y)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(x < self.width && y < self.height);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, depth: f32) {
        assert!(x < self.width && y < self.height);
        self.data[y * self.width + x] = depth;
    }

    /// Whether a depth value represents a real measurement.
    ///
    /// The sentinel and NaN are both non-finite, so a single finiteness
    /// check covers them.
    #[inline]
    pub fn is_valid(depth: f32) -> bool {
        depth.is_finite()
    }
}

/// Row-major RGB color image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorImage {
    width: usize,
    height: usize,
    data: Vec<[u8; 3]>,
}

impl ColorImage {
    /// Wrap a raw RGB buffer. Length must equal `width * height`.
    pub fn new(width: usize, height: usize, data: Vec<[u8; 3]>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "color buffer size does not match image dimensions"
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// A black image.
    pub fn black(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![[0, 0, 0]; width * height],
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

    #[inline]
    pub fn data(&self) -> &[[u8; 3]] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        assert!(x < self.width && y < self.height);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        assert!(x < self.width && y < self.height);
        self.data[y * self.width + x] = rgb;
    }
}
