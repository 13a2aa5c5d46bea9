//! The write-gather pipe: the CPU side of the GPU command FIFO.
//!
//! Stores to the pipe are forwarded to the FIFO in 32 byte bursts and consumed by the command
//! processor strictly in issue order. There is no backpressure and no error path at this layer.
use crate::codec::{self, LOAD_BP, LOAD_CP, LOAD_XF};
use crate::reg::{bp, cp};

/// Address of the write-gather pipe register.
pub const PIPE_BASE: usize = 0xCC00_8000;
/// Size of a write-gather burst.
pub const BURST_LEN: usize = 32;
/// How many zero words a pipeline flush stores. Together they fill a whole burst.
pub const FLUSH_WORDS: usize = BURST_LEN / 4;

/// A sink for command stream stores.
pub trait Pipe {
    fn write_u8(&mut self, value: u8);
    fn write_u16(&mut self, value: u16);
    fn write_u32(&mut self, value: u32);

    fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Loads a BP register.
    fn load_bp(&mut self, reg: bp::Reg, value: u32) {
        let word = codec::bp_word(reg, value);
        self.write_u8(LOAD_BP);
        self.write_u32(word);
    }

    /// Loads a CP register.
    fn load_cp(&mut self, reg: cp::Reg, value: u32) {
        self.write_u8(LOAD_CP);
        self.write_u8(reg as u8);
        self.write_u32(value);
    }

    /// Starts an XF load of `count` words at `address`. The caller must store exactly `count`
    /// words next.
    fn begin_xf(&mut self, address: u16, count: usize) {
        let header = codec::xf_header(address, count);
        self.write_u8(LOAD_XF);
        self.write_u32(header);
    }

    /// Loads consecutive XF words starting at `address`.
    fn load_xf(&mut self, address: u16, values: &[u32]) {
        self.begin_xf(address, values.len());
        for value in values {
            self.write_u32(*value);
        }
    }

    /// Loads consecutive XF words starting at `address`.
    fn load_xf_f32(&mut self, address: u16, values: &[f32]) {
        self.begin_xf(address, values.len());
        for value in values {
            self.write_f32(*value);
        }
    }

    /// Forces everything stored so far out of the gather buffer by storing a burst worth of
    /// no-ops. Zero bytes decode as `NOP` and change no state.
    fn flush(&mut self) {
        for _ in 0..FLUSH_WORDS {
            self.write_u32(0);
        }
    }
}

impl<T: Pipe + ?Sized> Pipe for &mut T {
    fn write_u8(&mut self, value: u8) {
        (**self).write_u8(value);
    }

    fn write_u16(&mut self, value: u16) {
        (**self).write_u16(value);
    }

    fn write_u32(&mut self, value: u32) {
        (**self).write_u32(value);
    }
}

/// Records the stream as big-endian bytes.
impl Pipe for Vec<u8> {
    fn write_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }
}

/// The memory mapped write-gather pipe.
#[derive(Debug)]
pub struct WgPipe {
    base: *mut u8,
}

impl WgPipe {
    /// # Safety
    /// `base` must be the address of a write-gather pipe register (or memory standing in for
    /// one) that stays valid for volatile 8, 16 and 32 bit stores for the lifetime of the pipe,
    /// and the FIFO behind it must have been set up.
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }

    /// The console's pipe at [`PIPE_BASE`].
    ///
    /// # Safety
    /// Only valid on the console, after the FIFO has been initialized.
    pub const unsafe fn hardware() -> Self {
        unsafe { Self::new(PIPE_BASE as *mut u8) }
    }
}

impl Pipe for WgPipe {
    fn write_u8(&mut self, value: u8) {
        // SAFETY: guaranteed by the constructor
        unsafe { self.base.write_volatile(value) }
    }

    fn write_u16(&mut self, value: u16) {
        // SAFETY: guaranteed by the constructor
        unsafe { self.base.cast::<u16>().write_volatile(value.to_be()) }
    }

    fn write_u32(&mut self, value: u32) {
        // SAFETY: guaranteed by the constructor
        unsafe { self.base.cast::<u32>().write_volatile(value.to_be()) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flush_is_a_burst_of_nops() {
        let mut out: Vec<u8> = Vec::new();
        out.flush();
        assert_eq!(out, [codec::NOP; BURST_LEN]);
    }

    #[test]
    fn helpers_match_register_writes() {
        use crate::codec::RegisterWrite;

        let mut helpers: Vec<u8> = Vec::new();
        helpers.load_bp(bp::Reg::PixelCopyDstStride, 2);
        helpers.load_cp(cp::Reg::VcdLow, 0x2200);
        helpers.load_xf(0x1026, &[1]);

        let mut writes: Vec<u8> = Vec::new();
        RegisterWrite::bp(bp::Reg::PixelCopyDstStride, 2).emit(&mut writes);
        RegisterWrite::cp(cp::Reg::VcdLow, 0x2200).emit(&mut writes);
        RegisterWrite::xf(0x1026, [1u32]).emit(&mut writes);

        assert_eq!(helpers, writes);
    }

    #[test]
    fn volatile_pipe_stores_big_endian() {
        #[repr(align(4))]
        struct Register([u8; 4]);

        let mut register = Register([0; 4]);
        let mut pipe = unsafe { WgPipe::new(register.0.as_mut_ptr()) };
        pipe.write_u32(0x4500_0002);
        assert_eq!(register.0, [0x45, 0x00, 0x00, 0x02]);

        pipe.write_u16(0x0004);
        assert_eq!(register.0[..2], [0x00, 0x04]);
    }
}
