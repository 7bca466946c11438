//! CPU-side textures and the resource contract shared with renderers.

use std::sync::{Arc, RwLock};

use image::ImageFormat;

use crate::error::{PuppetError, Result};
use crate::format::TextureEncoding;

/// Opaque id a renderer assigns after uploading a resource. 0 means "not uploaded".
pub type RendererId = usize;

/// Largest width or height `pad` will grow a texture to.
pub const MAX_TEXTURE_SIZE: u32 = 16384;

/// Texture shared between a texture cache and any outside holders.
pub type SharedTexture = Arc<RwLock<Texture>>;

/// Memory that can be transferred between CPU and GPU.
pub trait Resource {
    /// Length of the resource's data in bytes.
    fn byte_len(&self) -> usize;
    fn renderer_id(&self) -> RendererId;
    fn set_renderer_id(&mut self, id: RendererId);
}

/// Tightly packed 8-bit texture with 1 to 4 channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<u8>,
    renderer_id: RendererId,
}

impl Texture {
    /// Wrap raw pixel data. `data` must hold exactly `width * height * channels` bytes.
    pub fn from_raw(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self> {
        if !(1..=4).contains(&channels) {
            return Err(PuppetError::InvalidTexture {
                reason: format!("channel count {channels} outside 1..=4"),
            });
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(PuppetError::InvalidTexture {
                reason: format!(
                    "{width}x{height}x{channels} needs {expected} bytes, got {}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
            renderer_id: 0,
        })
    }

    /// Decode an embedded texture into RGBA8.
    pub fn from_encoded(bytes: &[u8], encoding: TextureEncoding) -> Result<Self> {
        let format = match encoding {
            TextureEncoding::Png => ImageFormat::Png,
            TextureEncoding::Tga => ImageFormat::Tga,
            TextureEncoding::Bc7 => return Err(PuppetError::UnsupportedTextureEncoding("BC7")),
        };
        let rgba = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_raw(width, height, 4, rgba.into_raw())
    }

    pub fn into_shared(self) -> SharedTexture {
        Arc::new(RwLock::new(self))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    fn alpha_index(&self) -> Option<usize> {
        match self.channels {
            2 => Some(1),
            4 => Some(3),
            _ => None,
        }
    }

    /// Reverse the row order.
    pub fn flip_vertically(&mut self) {
        let stride = self.stride();
        let rows = self.height as usize;
        if stride == 0 {
            return;
        }
        for y in 0..rows / 2 {
            let (top, bottom) = self.data.split_at_mut((rows - 1 - y) * stride);
            top[y * stride..(y + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }

    /// Multiply colour channels by alpha. No-op for textures without alpha.
    pub fn premultiply(&mut self) {
        let Some(ai) = self.alpha_index() else {
            return;
        };
        let ch = self.channels as usize;
        for px in self.data.chunks_exact_mut(ch) {
            let a = px[ai] as u32;
            for c in &mut px[..ai] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
    }

    /// Divide colour channels by alpha. Fully transparent pixels become black.
    pub fn unpremultiply(&mut self) {
        let Some(ai) = self.alpha_index() else {
            return;
        };
        let ch = self.channels as usize;
        for px in self.data.chunks_exact_mut(ch) {
            let a = px[ai] as u32;
            for c in &mut px[..ai] {
                *c = if a == 0 {
                    0
                } else {
                    ((*c as u32 * 255 + a / 2) / a).min(255) as u8
                };
            }
        }
    }

    /// Grow the texture by `thickness` pixels on every side.
    /// The original image is centred; the border is transparent (zeroed).
    /// Fails, leaving the texture untouched, if a side would exceed [`MAX_TEXTURE_SIZE`].
    pub fn pad(&mut self, thickness: u32) -> Result<()> {
        if thickness == 0 {
            return Ok(());
        }
        let grow = |side: u32| {
            thickness
                .checked_mul(2)
                .and_then(|border| side.checked_add(border))
                .filter(|n| *n <= MAX_TEXTURE_SIZE)
        };
        let (Some(new_w), Some(new_h)) = (grow(self.width), grow(self.height)) else {
            return Err(PuppetError::InvalidTexture {
                reason: format!(
                    "padding {}x{} by {thickness} exceeds {MAX_TEXTURE_SIZE} pixels per side",
                    self.width, self.height
                ),
            });
        };
        let ch = self.channels as usize;
        let new_stride = new_w as usize * ch;
        let old_stride = self.stride();
        let mut out = vec![0u8; new_stride * new_h as usize];
        let x0 = thickness as usize * ch;
        for y in 0..self.height as usize {
            let dst = (y + thickness as usize) * new_stride + x0;
            out[dst..dst + old_stride]
                .copy_from_slice(&self.data[y * old_stride..(y + 1) * old_stride]);
        }
        self.width = new_w;
        self.height = new_h;
        self.data = out;
        Ok(())
    }
}

impl Resource for Texture {
    fn byte_len(&self) -> usize {
        self.data.len()
    }

    fn renderer_id(&self) -> RendererId {
        self.renderer_id
    }

    fn set_renderer_id(&mut self, id: RendererId) {
        self.renderer_id = id;
    }
}
