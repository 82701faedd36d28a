//! Per-preset draw state and the single-tick entry point.

use crate::buffers::NamedBufferStore;
use crate::component::{ComponentTree, DrawContext};
use crate::pool::{SurfacePool, SurfacePoolOpts};
use crate::registers::RegisterBank;
use crate::surface::Surface;
use crate::{AnalysisFrame, Result};

/// GPU-side state of one loaded preset: the component tree plus everything
/// it draws with. Dropping the renderer releases all of it.
#[derive(Debug)]
pub struct Renderer {
    tree: ComponentTree,
    pool: SurfacePool,
    buffers: NamedBufferStore,
    registers: RegisterBank,
    frame: Surface,
    ticks: u64,
}

impl Renderer {
    pub fn new(tree: ComponentTree, pool: SurfacePoolOpts, width: u32, height: u32) -> Self {
        Self {
            tree,
            pool: SurfacePool::new(pool, width, height),
            buffers: NamedBufferStore::new(),
            registers: RegisterBank::new(),
            frame: Surface::new(width, height),
            ticks: 0,
        }
    }

    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ComponentTree {
        &mut self.tree
    }

    /// The canvas as of the last completed tick.
    pub fn frame(&self) -> &Surface {
        &self.frame
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    pub fn buffers(&self) -> &NamedBufferStore {
        &self.buffers
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterBank {
        &mut self.registers
    }

    /// Ticks drawn since the current preset was loaded.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick of the tree against `analysis`. Fails if any surface is
    /// still checked out when the traversal returns.
    pub fn draw_frame(&mut self, analysis: &AnalysisFrame) -> Result<()> {
        if self.tree.clears_frame() {
            self.frame.clear();
        }

        let mut ctx = DrawContext {
            pool: &mut self.pool,
            buffers: &mut self.buffers,
            registers: &mut self.registers,
            analysis,
            tick: self.ticks,
        };
        let drawn = self.tree.draw(&mut ctx, &mut self.frame);
        let balanced = self.pool.finish_tick();
        self.ticks += 1;
        drawn.and(balanced)
    }

    /// Swaps in a freshly built tree. Named buffers and registers belong to
    /// the old preset and are emptied. Returns the old tree.
    pub fn replace_tree(&mut self, tree: ComponentTree) -> ComponentTree {
        self.buffers.clear();
        self.registers.reset();
        self.ticks = 0;
        std::mem::replace(&mut self.tree, tree)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.frame.dimensions() == (width, height) {
            return;
        }
        self.pool.resize(width, height);
        self.frame = Surface::new(width, height);
    }

    /// Releases every component, buffer and pooled surface.
    pub fn destroy(&mut self) {
        self.tree.destroy();
        self.buffers.clear();
        self.pool.destroy_all();
    }
}
