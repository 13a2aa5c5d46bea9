//! One-time bring-up: the FIFO buffer, the finish interrupt and the PE interrupt enables.
use std::alloc::{Layout, handle_alloc_error};
use std::sync::Arc;

use glam::Mat4;
use tracing::info;
use zerocopy::{FromBytes, FromZeros, Immutable, KnownLayout};

use crate::Address;
use crate::hw::{DataCache, Handler, Interrupt, PixelEngine};
use crate::ops::{self, DisplayCopy, Projection, TextureCopy, Viewport};
use crate::pipe::Pipe;
use crate::reg::pix::InterruptStatus;
use crate::sync::{Completion, Pending};

/// Size of the command FIFO buffer.
pub const FIFO_SIZE: usize = 256 * 1024;

/// The zeroed, 32 byte aligned memory the GPU fetches commands from.
#[derive(FromBytes, Immutable, KnownLayout)]
#[repr(C, align(32))]
pub struct FifoBuffer([u8; FIFO_SIZE]);

impl FifoBuffer {
    /// Allocates a zeroed buffer on the heap.
    pub fn new() -> Box<Self> {
        Self::new_box_zeroed().unwrap_or_else(|_| handle_alloc_error(Layout::new::<Self>()))
    }

    pub fn address(&self) -> Address {
        Address::from_ptr(self.0.as_ptr())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The platform below the command stream: how the FIFO is attached, where cache maintenance
/// and PE registers go and how interrupts are delivered.
pub trait Backend {
    type Pipe: Pipe;
    type Cache: DataCache;
    type PixelEngine: PixelEngine + Send + 'static;

    /// Points the command processor at `fifo` and returns the pipe feeding it.
    fn init_fifo(&mut self, fifo: &mut FifoBuffer) -> Self::Pipe;

    fn cache(&mut self) -> Self::Cache;

    fn pixel_engine(&mut self) -> Self::PixelEngine;

    /// Registers `handler` for `interrupt` and unmasks it.
    fn request_interrupt(&mut self, interrupt: Interrupt, handler: Handler);
}

/// An initialized GX: the pipe, the cache and the completion handshake.
pub struct Gx<B: Backend> {
    pipe: B::Pipe,
    cache: B::Cache,
    completion: Arc<Completion>,
    backend: B,
    // keep last: the pipe feeds this buffer
    _fifo: Box<FifoBuffer>,
}

impl<B: Backend> Gx<B> {
    /// Brings the GPU up on `backend`.
    pub fn init(mut backend: B) -> Self {
        let mut fifo = FifoBuffer::new();
        let pipe = backend.init_fifo(&mut fifo);
        let cache = backend.cache();

        let completion = Arc::new(Completion::new());
        let mut pe = backend.pixel_engine();
        backend.request_interrupt(Interrupt::PeFinish, {
            let completion = completion.clone();
            Box::new(move || completion.signal(&mut pe))
        });

        backend
            .pixel_engine()
            .write_interrupt(InterruptStatus::from_bits(InterruptStatus::BRING_UP));

        info!("FIFO of {FIFO_SIZE} bytes at {} is up", fifo.address());
        Self {
            pipe,
            cache,
            completion,
            backend,
            _fifo: fifo,
        }
    }

    pub fn pipe(&mut self) -> &mut B::Pipe {
        &mut self.pipe
    }

    pub fn cache(&mut self) -> &mut B::Cache {
        &mut self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        ops::set_viewport(&mut self.pipe, viewport);
    }

    pub fn load_position_matrix(&mut self, matrix: &Mat4, index: u32) {
        ops::load_position_matrix(&mut self.pipe, matrix, index);
    }

    pub fn load_projection_matrix(&mut self, matrix: &Mat4, projection: Projection) {
        ops::load_projection_matrix(&mut self.pipe, matrix, projection);
    }

    pub fn copy_to_texture(&mut self, copy: &TextureCopy) {
        ops::copy_to_texture(&mut self.pipe, &mut self.cache, copy);
    }

    pub fn copy_to_display(&mut self, copy: &DisplayCopy) {
        ops::copy_to_display(&mut self.pipe, &mut self.cache, copy);
    }

    pub fn force_pipeline_flush(&mut self) {
        ops::force_pipeline_flush(&mut self.pipe);
    }

    pub fn draw_fullscreen_quad(&mut self, color: u32) {
        ops::draw_fullscreen_quad(&mut self.pipe, color);
    }

    /// Starts a completion cycle without waiting on it.
    pub fn arm(&mut self) -> Pending<'_> {
        self.completion.arm(&mut self.pipe)
    }

    /// Blocks until the GPU executed everything issued so far.
    pub fn wait_for_gpu(&mut self) {
        self.completion.wait_for_gpu(&mut self.pipe);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fifo_is_zeroed_and_aligned() {
        let fifo = FifoBuffer::new();
        assert_eq!(fifo.bytes().len(), FIFO_SIZE);
        assert!(fifo.bytes().iter().all(|b| *b == 0));
        assert_eq!(fifo.address().value() % 32, 0);
    }
}
