//! Pixel engine (PE) register layouts.
use bitos::bitos;
use bitos::integer::{u2, u4, u9, u10};

/// Top-left corner of a framebuffer copy (`X10Y10`).
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopySrc {
    #[bits(0..10)]
    pub x: u10,
    #[bits(10..20)]
    pub y: u10,
}

/// Dimensions of a framebuffer copy, both stored minus one (`X10Y10`).
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyDims {
    #[bits(0..10)]
    pub width_minus_one: u10,
    #[bits(10..20)]
    pub height_minus_one: u10,
}

impl CopyDims {
    pub fn width(&self) -> u16 {
        self.width_minus_one().value() + 1
    }

    pub fn height(&self) -> u16 {
        self.height_minus_one().value() + 1
    }
}

/// Pixel format of a copy to texture.
#[bitos(4)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorCopyFormat {
    #[default]
    R4        = 0x0,
    Y8        = 0x1,
    RA4       = 0x2,
    RA8       = 0x3,
    RGB565    = 0x4,
    RGB5A3    = 0x5,
    RGBA8     = 0x6,
    A8        = 0x7,
    R8        = 0x8,
    G8        = 0x9,
    B8        = 0xA,
    RG8       = 0xB,
    GB8       = 0xC,
    Reserved0 = 0xD,
    Reserved1 = 0xE,
    Reserved2 = 0xF,
}

/// The copy trigger register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyCmd {
    #[bits(0..2)]
    pub clamp: u2,
    /// Target format with its top bit rotated down to bit 0.
    #[bits(3..7)]
    pub target_format: u4,
    #[bits(7..9)]
    pub gamma: u2,
    #[bits(9)]
    pub half: bool,
    #[bits(10)]
    pub scale_invert: bool,
    #[bits(11)]
    pub clear: bool,
    /// to XFB or to texture?
    #[bits(14)]
    pub to_xfb: bool,
    #[bits(15)]
    pub intensity: bool,
}

impl CopyCmd {
    /// Undoes the rotation of [`CopyCmd::target_format`].
    pub fn color_format(&self) -> ColorCopyFormat {
        let raw = self.target_format().value();
        ColorCopyFormat::from_bits(u4::new((raw & 1) << 3 | raw >> 1))
    }
}

/// Vertical scale of a copy to the display buffer.
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyScale {
    #[bits(0..9)]
    pub y_scale: u9,
}

/// The PE interrupt status register. Writing a one to a pending bit clears it.
#[bitos(16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptStatus {
    #[bits(0)]
    pub token_enabled: bool,
    #[bits(1)]
    pub finish_enabled: bool,
    #[bits(2)]
    pub token: bool,
    #[bits(3)]
    pub finish: bool,
}

impl InterruptStatus {
    /// Enables both PE interrupts and clears whatever is pending.
    pub const BRING_UP: u16 = 0x0F;

    /// Applies a CPU write to the register as the hardware does: enables are stored, pending
    /// bits are cleared by writing one.
    pub fn write(&mut self, value: Self) {
        self.set_token_enabled(value.token_enabled());
        self.set_finish_enabled(value.finish_enabled());
        self.set_token(self.token() & !value.token());
        self.set_finish(self.finish() & !value.finish());
    }
}
