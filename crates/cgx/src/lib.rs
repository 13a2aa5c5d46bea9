//! Direct GX command stream encoding for hardware conformance tests.
//!
//! Register writes are packed into the exact FIFO wire format and stored through the
//! write-gather pipe, with no state tracking in between. [`sync::Completion`] lets the producer
//! block until the GPU executed everything it was sent.
pub mod primitive;
pub mod stream;

pub mod codec;
pub mod pipe;
pub mod reg;
pub mod tex;

pub mod boot;
pub mod hw;
pub mod ops;
pub mod sync;

pub mod decode;
pub mod soft;

pub use boot::{Backend, FifoBuffer, Gx};
pub use hw::Address;
pub use ops::{DisplayCopy, Projection, TextureCopy, Viewport};
pub use pipe::Pipe;
pub use primitive::Primitive;
pub use reg::pix::ColorCopyFormat;
