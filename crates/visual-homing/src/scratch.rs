//! Reusable image buffers for the rotation scan.
//!
//! Every rotation of a query needs a full-size shifted copy. Buffers are
//! checked out of a mutex-guarded free list and returned when the guard is
//! dropped, so concurrent queries each get their own buffer without
//! reallocating on every call.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use image::GrayImage;

/// Free list of grayscale buffers.
#[derive(Debug, Default)]
pub struct ScratchPool {
    free: Mutex<Vec<GrayImage>>,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out a `width` x `height` buffer; contents are unspecified.
    pub fn take(&self, width: u32, height: u32) -> PooledBuffer<'_> {
        let reused = {
            let mut free = self.lock();
            free.iter()
                .position(|b| b.dimensions() == (width, height))
                .map(|i| free.swap_remove(i))
        };
        PooledBuffer {
            pool: self,
            image: reused.unwrap_or_else(|| GrayImage::new(width, height)),
        }
    }

    /// Number of idle buffers.
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<GrayImage>> {
        // The free list has no invariants to protect, so poisoning is ignored.
        self.free.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A buffer on loan from a [`ScratchPool`]; goes back to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a ScratchPool,
    image: GrayImage,
}

impl Deref for PooledBuffer<'_> {
    type Target = GrayImage;

    fn deref(&self) -> &GrayImage {
        &self.image
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut GrayImage {
        &mut self.image
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        let image = std::mem::take(&mut self.image);
        self.pool.lock().push(image);
    }
}
