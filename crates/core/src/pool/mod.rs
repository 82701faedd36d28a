//! Recycled offscreen surfaces at canvas resolution.

use crate::surface::Surface;
use crate::{Result, VisualiserError};

/// Pool configuration.
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoolOpts {
    /// Hard cap on surfaces checked out at the same time. Also bounds how many
    /// surfaces the pool ever allocates per resolution.
    pub capacity: usize,
}

impl Default for SurfacePoolOpts {
    fn default() -> Self {
        Self { capacity: 4 }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SurfacePoolStats {
    pub allocated: u64,
    pub recycled: u64,
    /// Surfaces dropped on release because a resize made them stale.
    pub discarded_stale: u64,
    /// Free surfaces dropped by `resize` or `destroy_all`.
    pub destroyed: u64,
    /// Highest number of surfaces checked out at once.
    pub peak_outstanding: usize,
}

/// Bounded pool of canvas-sized offscreen surfaces.
///
/// Checkout is stack-disciplined: the most recently acquired surface must be
/// released first, and every surface must be back before the tick ends.
#[derive(Debug)]
pub struct SurfacePool {
    opts: SurfacePoolOpts,
    width: u32,
    height: u32,
    generation: u64,
    next_id: u64,
    free: Vec<Surface>,
    checked_out: Vec<u64>,
    stats: SurfacePoolStats,
}

impl SurfacePool {
    pub fn new(opts: SurfacePoolOpts, width: u32, height: u32) -> Self {
        Self {
            opts,
            width,
            height,
            generation: 0,
            next_id: 1,
            free: Vec::with_capacity(opts.capacity),
            checked_out: Vec::with_capacity(opts.capacity),
            stats: SurfacePoolStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.opts.capacity
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of surfaces currently checked out.
    pub fn outstanding(&self) -> usize {
        self.checked_out.len()
    }

    /// Number of idle surfaces ready for reuse.
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> SurfacePoolStats {
        self.stats.clone()
    }

    /// Checks out a surface at the current canvas resolution. Its contents are
    /// unspecified.
    pub fn acquire(&mut self) -> Result<Surface> {
        if self.checked_out.len() >= self.opts.capacity {
            tracing::warn!(capacity = self.opts.capacity, "surface pool exhausted");
            return Err(VisualiserError::ResourceExhausted {
                capacity: self.opts.capacity,
            });
        }

        let surface = match self.free.pop() {
            Some(surface) => {
                self.stats.recycled += 1;
                surface
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.stats.allocated += 1;
                tracing::debug!(id, width = self.width, height = self.height, "allocating surface");
                Surface::with_identity(id, self.generation, self.width, self.height)
            }
        };

        self.checked_out.push(surface.id());
        self.stats.peak_outstanding = self.stats.peak_outstanding.max(self.checked_out.len());
        Ok(surface)
    }

    /// Returns a surface to the pool. Surfaces allocated before the last
    /// resize are dropped instead of recycled.
    pub fn release(&mut self, surface: Surface) -> Result<()> {
        let released = surface.id();
        let expected = self.checked_out.last().copied();

        if expected != Some(released) {
            // Keep the bookkeeping honest even though the caller broke the
            // nesting rule.
            if let Some(pos) = self.checked_out.iter().rposition(|&id| id == released) {
                self.checked_out.remove(pos);
            }
            return Err(VisualiserError::SurfaceOrder {
                released,
                expected: expected.unwrap_or(0),
            });
        }
        self.checked_out.pop();

        if surface.generation() != self.generation || surface.dimensions() != self.dimensions() {
            tracing::debug!(id = released, "dropping stale surface");
            self.stats.discarded_stale += 1;
            return Ok(());
        }

        self.free.push(surface);
        Ok(())
    }

    /// Invalidates every pooled and outstanding surface. New surfaces are
    /// allocated at the new resolution on the next `acquire`.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.dimensions() {
            return;
        }
        tracing::debug!(width, height, "resizing surface pool");
        self.width = width;
        self.height = height;
        self.invalidate();
    }

    /// Releases every idle surface. Outstanding ones are dropped when they
    /// come back.
    pub fn destroy_all(&mut self) {
        tracing::debug!(idle = self.free.len(), "destroying pooled surfaces");
        self.invalidate();
    }

    /// Verifies that everything checked out during the tick came back.
    pub fn finish_tick(&mut self) -> Result<()> {
        let outstanding = self.checked_out.len();
        if outstanding == 0 {
            return Ok(());
        }
        self.checked_out.clear();
        Err(VisualiserError::SurfaceLeak { outstanding })
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.stats.destroyed += self.free.len() as u64;
        self.free.clear();
    }
}
