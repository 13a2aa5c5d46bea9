//! Command processor registers (CP) and the vertex layout they describe.
use bitos::bitos;
use bitos::integer::{u4, u5, u9};
use strum::FromRepr;

/// A CP register address.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u8)]
pub enum Reg {
    // VCD
    VcdLow          = 0x50,
    VcdHigh         = 0x60,

    // VAT
    Vat0A           = 0x70,
    Vat1A           = 0x71,
    Vat2A           = 0x72,
    Vat3A           = 0x73,
    Vat4A           = 0x74,
    Vat5A           = 0x75,
    Vat6A           = 0x76,
    Vat7A           = 0x77,

    Vat0B           = 0x80,
    Vat1B           = 0x81,
    Vat2B           = 0x82,
    Vat3B           = 0x83,
    Vat4B           = 0x84,
    Vat5B           = 0x85,
    Vat6B           = 0x86,
    Vat7B           = 0x87,

    Vat0C           = 0x90,
    Vat1C           = 0x91,
    Vat2C           = 0x92,
    Vat3C           = 0x93,
    Vat4C           = 0x94,
    Vat5C           = 0x95,
    Vat6C           = 0x96,
    Vat7C           = 0x97,
}

impl Reg {
    /// The attribute table `A` register of the given table.
    pub fn vat_a(table: u8) -> Self {
        assert!(table < 8, "vertex attribute table {table} out of range");
        Self::from_repr(Self::Vat0A as u8 + table).unwrap_or(Self::Vat0A)
    }

    /// The attribute table `B` register of the given table.
    pub fn vat_b(table: u8) -> Self {
        assert!(table < 8, "vertex attribute table {table} out of range");
        Self::from_repr(Self::Vat0B as u8 + table).unwrap_or(Self::Vat0B)
    }

    /// The attribute table `C` register of the given table.
    pub fn vat_c(table: u8) -> Self {
        assert!(table < 8, "vertex attribute table {table} out of range");
        Self::from_repr(Self::Vat0C as u8 + table).unwrap_or(Self::Vat0C)
    }

    /// For `VatNA` registers, the table index `N`.
    pub fn vat_a_index(self) -> Option<u8> {
        let raw = self as u8;
        (Self::Vat0A as u8..=Self::Vat7A as u8)
            .contains(&raw)
            .then(|| raw - Self::Vat0A as u8)
    }
}

/// How an attribute is present in the vertex stream.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeMode {
    /// Not present
    #[default]
    None    = 0b00,
    /// Directly in the vertex attribute stream
    Direct  = 0b01,
    /// Indirectly through a 8 bit index in the vertex attribute stream
    Index8  = 0b10,
    /// Indirectly through a 16 bit index in the vertex attribute stream
    Index16 = 0b11,
}

impl AttributeMode {
    /// Size of the attribute in the stream when it is an index, `None` when it is direct data.
    pub fn index_size(self) -> Option<u32> {
        match self {
            Self::None => Some(0),
            Self::Direct => None,
            Self::Index8 => Some(1),
            Self::Index16 => Some(2),
        }
    }
}

/// Describes which attributes are present in the vertices of primitives and how they are present.
#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexDescriptor {
    /// Whether the position/normal matrix index is present.
    #[bits(0)]
    pub pos_mat_index: bool,
    /// Whether the texture coordinate matrix N index is present.
    #[bits(1..9)]
    pub tex_coord_mat_index: [bool; 8],
    #[bits(9..11)]
    pub position: AttributeMode,
    #[bits(11..13)]
    pub normal: AttributeMode,
    #[bits(13..15)]
    pub chan0: AttributeMode,
    #[bits(15..17)]
    pub chan1: AttributeMode,
    #[bits(32..48)]
    pub tex_coord: [AttributeMode; 8],
}

impl VertexDescriptor {
    /// Value of the [`Reg::VcdLow`] register.
    pub fn low(&self) -> u32 {
        self.to_bits() as u32
    }

    /// Value of the [`Reg::VcdHigh`] register.
    pub fn high(&self) -> u32 {
        (self.to_bits() >> 32) as u32
    }

    pub fn with_low(self, value: u32) -> Self {
        Self::from_bits((self.to_bits() & !0xFFFF_FFFF) | value as u64)
    }

    pub fn with_high(self, value: u32) -> Self {
        Self::from_bits((self.to_bits() & 0xFFFF_FFFF) | (value as u64) << 32)
    }
}

#[bitos(1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionKind {
    /// Two components (x, y).
    #[default]
    Vec2 = 0b0,
    /// Three components (x, y, z).
    Vec3 = 0b1,
}

#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordsFormat {
    #[default]
    U8        = 0b000,
    I8        = 0b001,
    U16       = 0b010,
    I16       = 0b011,
    F32       = 0b100,
    Reserved0 = 0b101,
    Reserved1 = 0b110,
    Reserved2 = 0b111,
}

impl CoordsFormat {
    pub fn size(self) -> Option<u32> {
        match self {
            Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::F32 => Some(4),
            _ => None,
        }
    }
}

#[bitos(9)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionDescriptor {
    #[bits(0)]
    pub kind: PositionKind,
    #[bits(1..4)]
    pub format: CoordsFormat,
    #[bits(4..9)]
    pub shift: u5,
}

impl PositionDescriptor {
    pub fn size(&self) -> Option<u32> {
        let components = match self.kind() {
            PositionKind::Vec2 => 2,
            PositionKind::Vec3 => 3,
        };

        self.format().size().map(|size| components * size)
    }
}

#[bitos(1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorKind {
    /// Three components (r, g, b).
    #[default]
    Rgb  = 0b0,
    /// Four components (r, g, b, a).
    Rgba = 0b1,
}

#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    #[default]
    Rgb565    = 0b000,
    Rgb888    = 0b001,
    Rgb888x   = 0b010,
    Rgba4444  = 0b011,
    Rgba6666  = 0b100,
    Rgba8888  = 0b101,
    Reserved0 = 0b110,
    Reserved1 = 0b111,
}

impl ColorFormat {
    pub fn size(self) -> Option<u32> {
        match self {
            Self::Rgb565 | Self::Rgba4444 => Some(2),
            Self::Rgb888 | Self::Rgba6666 => Some(3),
            Self::Rgb888x | Self::Rgba8888 => Some(4),
            Self::Reserved0 | Self::Reserved1 => None,
        }
    }
}

#[bitos(4)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorDescriptor {
    #[bits(0)]
    pub kind: ColorKind,
    #[bits(1..4)]
    pub format: ColorFormat,
}

/// Vertex attribute table, first word. Normals and the first texture coordinate are kept raw.
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexAttributeTableA {
    #[bits(0..9)]
    pub position: PositionDescriptor,
    #[bits(9..13)]
    pub normal: u4,
    #[bits(13..17)]
    pub chan0: ColorDescriptor,
    #[bits(17..21)]
    pub chan1: ColorDescriptor,
    #[bits(21..30)]
    pub tex0: u9,
    #[bits(30)]
    pub byte_dequant: bool,
    #[bits(31)]
    pub normal_index: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quad_layout_words() {
        let vcd = VertexDescriptor::default()
            .with_position(AttributeMode::Direct)
            .with_chan0(AttributeMode::Direct);
        assert_eq!(vcd.low(), 0x2200);
        assert_eq!(vcd.high(), 0);
        assert_eq!(VertexDescriptor::default().with_low(0x2200), vcd);

        let vat = VertexAttributeTableA::default()
            .with_position(
                PositionDescriptor::default()
                    .with_kind(PositionKind::Vec3)
                    .with_format(CoordsFormat::F32),
            )
            .with_chan0(
                ColorDescriptor::default()
                    .with_kind(ColorKind::Rgba)
                    .with_format(ColorFormat::Rgba8888),
            )
            .with_byte_dequant(true);
        assert_eq!(vat.to_bits(), 0x4001_6009);
    }

    #[test]
    fn vat_registers_by_index() {
        assert_eq!(Reg::vat_a(0), Reg::Vat0A);
        assert_eq!(Reg::vat_b(3), Reg::Vat3B);
        assert_eq!(Reg::vat_c(7), Reg::Vat7C);
        assert_eq!(Reg::Vat5A.vat_a_index(), Some(5));
        assert_eq!(Reg::Vat5B.vat_a_index(), None);
    }
}
