//! Transform unit (XF) address space.
use strum::FromRepr;

/// Base of the XF internal registers.
pub const REGISTERS: u16 = 0x1000;

/// Scale applied to depth values to map them into the 24-bit depth buffer.
pub const DEPTH_24_BIT_MAX: u32 = (1 << 24) - 1;

/// An XF internal register, relative to [`REGISTERS`].
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u8)]
pub enum Reg {
    Error                  = 0x00,
    Diagnostics            = 0x01,
    State0                 = 0x02,
    State1                 = 0x03,
    PowerSave              = 0x04,
    ClipDisable            = 0x05,
    InVertexSpec           = 0x08,
    NumColors              = 0x09,
    MatIndexLow            = 0x18,
    MatIndexHigh           = 0x19,
    ViewportScaleX         = 0x1A,
    ViewportScaleY         = 0x1B,
    ViewportScaleZ         = 0x1C,
    ViewportOffsetX        = 0x1D,
    ViewportOffsetY        = 0x1E,
    ViewportOffsetZ        = 0x1F,
    ProjectionParam0       = 0x20,
    ProjectionParam1       = 0x21,
    ProjectionParam2       = 0x22,
    ProjectionParam3       = 0x23,
    ProjectionParam4       = 0x24,
    ProjectionParam5       = 0x25,
    ProjectionOrthographic = 0x26,
    TexGenCount            = 0x3F,
}

impl Reg {
    /// Absolute XF address of this register.
    pub fn address(self) -> u16 {
        REGISTERS | self as u16
    }

    /// The register at an absolute XF address, if any.
    pub fn from_address(address: u16) -> Option<Self> {
        address
            .checked_sub(REGISTERS)
            .and_then(|offset| u8::try_from(offset).ok())
            .and_then(Self::from_repr)
    }
}

/// XF address of the first row of position matrix `index`.
///
/// `index` is a row index as used by the hardware (`PNMTX1` is 3, `PNMTX2` is 6 and so on).
pub fn position_matrix(index: u32) -> u16 {
    ((index << 2) & 0xFF) as u16
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_addresses() {
        assert_eq!(Reg::ViewportScaleX.address(), 0x101A);
        assert_eq!(Reg::ProjectionParam0.address(), 0x1020);
        assert_eq!(Reg::from_address(0x1026), Some(Reg::ProjectionOrthographic));
        assert_eq!(Reg::from_address(0x0026), None);
        assert_eq!(Reg::from_address(0x1100), None);
    }

    #[test]
    fn matrix_addresses() {
        assert_eq!(position_matrix(0), 0x00);
        assert_eq!(position_matrix(3), 0x0C);
        assert_eq!(position_matrix(57), 0xE4);
    }
}
