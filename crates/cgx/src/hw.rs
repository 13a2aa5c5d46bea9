//! Collaborators outside the command stream: memory addresses, the data cache, the pixel engine
//! registers and the interrupt lines.
use std::fmt;

use crate::reg::pix::InterruptStatus;

/// Base of the pixel engine registers.
pub const PE_BASE: usize = 0xCC00_1000;
/// Offset of the PE interrupt status register.
pub const PE_INTERRUPT_STATUS: usize = 0x0A;

/// An address in the CPU's view of memory.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub u32);

impl Address {
    #[inline(always)]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The physical address, with the cached/uncached segment bits stripped.
    #[inline(always)]
    pub const fn physical(self) -> u32 {
        self.0 & 0x3FFF_FFFF
    }

    /// Address of a pointer on the console, where pointers are 32 bits wide.
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.addr() as u32)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{:08X})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// The CPU data cache.
pub trait DataCache {
    /// Writes back and invalidates the lines covering `len` bytes starting at `address`.
    fn flush_range(&mut self, address: Address, len: u32);
}

/// The pixel engine interrupt registers.
pub trait PixelEngine {
    fn read_interrupt(&self) -> InterruptStatus;
    fn write_interrupt(&mut self, value: InterruptStatus);

    /// Clears a pending finish interrupt, keeping everything else as is.
    fn acknowledge_finish(&mut self) {
        let status = self.read_interrupt();
        self.write_interrupt(status.with_finish(true));
    }
}

/// An interrupt line of the processor interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    PeFinish,
}

/// An interrupt handler. Runs in interrupt context, asynchronously to every other thread.
pub type Handler = Box<dyn FnMut() + Send + 'static>;

/// The memory mapped PE registers.
#[derive(Debug)]
pub struct MmioPixelEngine {
    status: *mut u16,
}

// SAFETY: the registers are global hardware state, not tied to the creating thread
unsafe impl Send for MmioPixelEngine {}

impl MmioPixelEngine {
    /// # Safety
    /// `base` must point at the PE register block and stay valid for volatile 16 bit accesses
    /// for the lifetime of this value.
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self {
            status: unsafe { base.add(PE_INTERRUPT_STATUS) }.cast(),
        }
    }

    /// The console's PE at [`PE_BASE`].
    ///
    /// # Safety
    /// Only valid on the console.
    pub const unsafe fn hardware() -> Self {
        unsafe { Self::new(PE_BASE as *mut u8) }
    }
}

impl PixelEngine for MmioPixelEngine {
    fn read_interrupt(&self) -> InterruptStatus {
        // SAFETY: guaranteed by the constructor
        let raw = unsafe { self.status.read_volatile() };
        InterruptStatus::from_bits(u16::from_be(raw))
    }

    fn write_interrupt(&mut self, value: InterruptStatus) {
        // SAFETY: guaranteed by the constructor
        unsafe { self.status.write_volatile(value.to_bits().to_be()) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn physical_strips_segment() {
        assert_eq!(Address(0x8000_1000).physical(), 0x1000);
        assert_eq!(Address(0xC000_1000).physical(), 0x1000);
        assert_eq!(Address(0x0000_1000).physical(), 0x1000);
        assert_eq!(format!("{}", Address(0x8000_1000)), "0x80001000");
    }

    #[test]
    fn acknowledge_sets_only_the_finish_bit() {
        #[repr(align(2))]
        struct Registers([u8; 12]);

        let mut regs = Registers([0; 12]);
        regs.0[PE_INTERRUPT_STATUS..][..2].copy_from_slice(&0x0Au16.to_be_bytes());

        let mut pe = unsafe { MmioPixelEngine::new(regs.0.as_mut_ptr()) };
        pe.acknowledge_finish();
        assert_eq!(pe.read_interrupt().to_bits(), 0x0A);

        let mut pe = unsafe { MmioPixelEngine::new(regs.0.as_mut_ptr()) };
        pe.write_interrupt(InterruptStatus::from_bits(0x03));
        pe.acknowledge_finish();
        assert_eq!(
            u16::from_be_bytes([regs.0[PE_INTERRUPT_STATUS], regs.0[PE_INTERRUPT_STATUS + 1]]),
            0x0B
        );
    }
}
