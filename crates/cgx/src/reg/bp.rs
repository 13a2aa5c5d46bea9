//! Rasterizer state registers (BP).
use strum::FromRepr;

/// Value written to [`Reg::PixelDone`] to request the PE finish interrupt.
pub const DRAW_DONE: u32 = 0x02;

/// Largest payload a BP register accepts. The top byte of the word is the address.
pub const VALUE_MAX: u32 = 0x00FF_FFFF;

/// A BP register address.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u8)]
pub enum Reg {
    GenMode             = 0x00,
    GenFilter0          = 0x01,
    GenFilter1          = 0x02,
    GenFilter2          = 0x03,
    GenFilter3          = 0x04,

    ScissorTopLeft      = 0x20,
    ScissorBottomRight  = 0x21,

    PixelZMode          = 0x40,
    PixelBlendMode      = 0x41,
    PixelConstantAlpha  = 0x42,
    PixelControl        = 0x43,
    PixelFieldMask      = 0x44,
    PixelDone           = 0x45,
    PixelRefresh        = 0x46,
    PixelToken          = 0x47,
    PixelTokenInt       = 0x48,
    PixelCopySrc        = 0x49,
    PixelCopyDimensions = 0x4A,
    PixelCopyDst        = 0x4B,
    PixelCopyDstStride  = 0x4D,
    PixelCopyScale      = 0x4E,
    PixelCopyClearAr    = 0x4F,
    PixelCopyClearGb    = 0x50,
    PixelCopyClearZ     = 0x51,
    PixelCopyCmd        = 0x52,
    PixelCopyFilter0    = 0x53,
    PixelCopyFilter1    = 0x54,
    PixelXBound         = 0x55,
    PixelYBound         = 0x56,
    PixelPerfMode       = 0x57,
    PixelChicken        = 0x58,
    ScissorOffset       = 0x59,

    TexInvTags          = 0x66,
    TexFieldMode        = 0x68,
    TexRefresh          = 0x69,

    WriteMask           = 0xFE,
}

impl Reg {
    /// Whether this register is part of the framebuffer copy setup.
    pub fn is_copy(self) -> bool {
        matches!(
            self,
            Self::PixelCopySrc
                | Self::PixelCopyDimensions
                | Self::PixelCopyDst
                | Self::PixelCopyDstStride
                | Self::PixelCopyScale
                | Self::PixelCopyCmd
        )
    }
}
