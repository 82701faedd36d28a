//! Offscreen pixel surfaces.
//!
//! A [`Surface`] is the only view the core has of a graphics buffer: it can be
//! allocated at canvas resolution, drawn into, and read back. Channels are
//! linear `f32` values in `[0, 1]`.

use crate::{Result, VisualiserError};

/// One RGBA pixel.
pub type Rgba = [f32; 4];

pub const BLACK: Rgba = [0.0, 0.0, 0.0, 1.0];

/// Fixed-resolution RGBA buffer.
#[derive(Clone, PartialEq)]
pub struct Surface {
    id: u64,
    generation: u64,
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Surface {
    /// Allocates an opaque black surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_identity(0, 0, width, height)
    }

    pub(crate) fn with_identity(id: u64, generation: u64, width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            id,
            generation,
            width,
            height,
            pixels: vec![BLACK; len],
        }
    }

    /// Pool-assigned identity; zero for surfaces allocated outside the pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resize epoch the surface was allocated in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.pixels[self.index(x, y)]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: Rgba) {
        let index = self.index(x, y);
        self.pixels[index] = value;
    }

    /// Resets every pixel to opaque black.
    pub fn clear(&mut self) {
        self.fill(BLACK);
    }

    pub fn fill(&mut self, value: Rgba) {
        self.pixels.fill(value);
    }

    /// Copies the pixels of `other`, which must share this surface's resolution.
    pub fn copy_from(&mut self, other: &Surface) -> Result<()> {
        self.ensure_same_size(other)?;
        self.pixels.copy_from_slice(&other.pixels);
        Ok(())
    }

    pub(crate) fn ensure_same_size(&self, other: &Surface) -> Result<()> {
        if self.dimensions() == other.dimensions() {
            Ok(())
        } else {
            Err(VisualiserError::SurfaceMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            })
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
