//! Scratch surfaces for tile extraction.
//!
//! Each extraction borrows one surface for its whole duration. The guard
//! hands it back on drop, so the surface returns to the pool on every exit
//! path, early error returns included.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use tiny_skia::{Color, Pixmap};

use super::TileError;

/// Pool of reusable tile-sized pixmaps.
#[derive(Debug, Clone)]
pub struct ScratchPool {
    size: u32,
    free: Arc<Mutex<Vec<Pixmap>>>,
}

impl ScratchPool {
    /// Create an empty pool of `size`×`size` surfaces.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            free: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of idle surfaces.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Borrow a cleared surface, allocating one if none is idle.
    pub fn acquire(&self) -> Result<ScratchSurface, TileError> {
        let reused = self.free.lock().pop();
        let pixmap = match reused {
            Some(mut pixmap) => {
                pixmap.fill(Color::TRANSPARENT);
                pixmap
            }
            None => Pixmap::new(self.size, self.size).ok_or(TileError::Surface {
                width: self.size,
                height: self.size,
            })?,
        };
        Ok(ScratchSurface {
            pixmap: Some(pixmap),
            free: Arc::clone(&self.free),
        })
    }
}

/// Exclusive loan of a scratch pixmap.
pub struct ScratchSurface {
    pixmap: Option<Pixmap>,
    free: Arc<Mutex<Vec<Pixmap>>>,
}

impl Deref for ScratchSurface {
    type Target = Pixmap;

    fn deref(&self) -> &Pixmap {
        // Only `drop` takes the pixmap.
        self.pixmap.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for ScratchSurface {
    fn deref_mut(&mut self) -> &mut Pixmap {
        self.pixmap.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for ScratchSurface {
    fn drop(&mut self) {
        if let Some(pixmap) = self.pixmap.take() {
            self.free.lock().push(pixmap);
        }
    }
}
