//! Encoding of register writes into the command stream wire format.
//!
//! Every bank has its own packing:
//! - BP: `0x61`, then one word holding the address in the top byte and a 24 bit payload.
//! - CP: `0x08`, the address byte, then the 32 bit payload.
//! - XF: `0x10`, a header word `((count - 1) << 16) | address`, then `count` words.
//!
//! Nothing here touches hardware. Out of range values are programming errors and panic instead
//! of being masked into a neighbouring field.
use bitos::integer::{u4, u10};

use crate::Address;
use crate::pipe::Pipe;
use crate::reg::pix::{CopyDims, CopySrc};
use crate::reg::{bp, cp};

/// Opcode of a no-op.
pub const NOP: u8 = 0x00;
/// Opcode of a CP register load.
pub const LOAD_CP: u8 = 0x08;
/// Opcode of an XF register/memory load.
pub const LOAD_XF: u8 = 0x10;
/// Opcode of a BP register load.
pub const LOAD_BP: u8 = 0x61;
/// Opcode of a quad list draw using attribute table 0.
pub const DRAW_QUADS: u8 = 0x80;

/// Largest value a copy rectangle coordinate can hold.
pub const COORD_MAX: u16 = 1023;
/// Largest number of words a single XF load can carry.
pub const XF_COUNT_MAX: usize = 0x1_0000;

/// A single store into the command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    U8(u8),
    U16(u16),
    U32(u32),
}

impl Word {
    /// Stores this word into the pipe.
    pub fn push<P: Pipe + ?Sized>(self, pipe: &mut P) {
        match self {
            Self::U8(value) => pipe.write_u8(value),
            Self::U16(value) => pipe.write_u16(value),
            Self::U32(value) => pipe.write_u32(value),
        }
    }

    /// Appends the big-endian bytes of this word.
    pub fn extend_be(self, out: &mut Vec<u8>) {
        match self {
            Self::U8(value) => out.push(value),
            Self::U16(value) => out.extend_from_slice(&value.to_be_bytes()),
            Self::U32(value) => out.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

/// The word following a BP opcode.
pub fn bp_word(reg: bp::Reg, value: u32) -> u32 {
    assert!(
        value <= bp::VALUE_MAX,
        "value 0x{value:08X} for BP register {reg:?} does not fit in 24 bits"
    );

    (reg as u32) << 24 | value
}

/// The header word following an XF opcode.
pub fn xf_header(address: u16, count: usize) -> u32 {
    assert!(count >= 1, "XF load at 0x{address:04X} must carry at least one word");
    assert!(
        address as usize + count <= XF_COUNT_MAX,
        "XF load of {count} words at 0x{address:04X} runs past the address space"
    );

    (((count - 1) as u32 & 0xFFFF) << 16) | address as u32
}

fn coord(value: u16, what: &str) -> u10 {
    assert!(
        value <= COORD_MAX,
        "copy {what} {value} does not fit in 10 bits"
    );

    u10::new(value)
}

/// Packs the top-left corner of a copy.
pub fn copy_src(left: u16, top: u16) -> CopySrc {
    CopySrc::default()
        .with_x(coord(left, "left"))
        .with_y(coord(top, "top"))
}

/// Packs the dimensions of a copy. Both must be within `1..=COORD_MAX`.
pub fn copy_dims(width: u16, height: u16) -> CopyDims {
    let width = coord(width, "width").value();
    let height = coord(height, "height").value();
    assert!(width >= 1 && height >= 1, "copy of {width}x{height} is empty");

    CopyDims::default()
        .with_width_minus_one(u10::new(width - 1))
        .with_height_minus_one(u10::new(height - 1))
}

/// Physical destination of a copy in 32 byte units.
pub fn copy_dst(dest: Address) -> u32 {
    let physical = dest.physical();
    assert!(
        physical & 0x1F == 0,
        "copy destination {dest} is not 32 byte aligned"
    );

    physical >> 5
}

/// The target pixel format field of the copy trigger: the 4 bit format rotated left by one
/// within its nibble.
pub fn target_format(format: u8) -> u4 {
    assert!(format <= 0xF, "copy format 0x{format:X} does not fit in 4 bits");
    u4::new(((format << 1) & 0xE) | (format >> 3))
}

/// A write to a register bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterWrite {
    Bp { reg: bp::Reg, value: u32 },
    Cp { reg: cp::Reg, value: u32 },
    Xf { address: u16, values: Vec<u32> },
    Raw(Word),
}

impl RegisterWrite {
    pub fn bp(reg: bp::Reg, value: u32) -> Self {
        bp_word(reg, value);
        Self::Bp { reg, value }
    }

    pub fn cp(reg: cp::Reg, value: u32) -> Self {
        Self::Cp { reg, value }
    }

    pub fn xf(address: u16, values: impl Into<Vec<u32>>) -> Self {
        let values = values.into();
        xf_header(address, values.len());
        Self::Xf { address, values }
    }

    pub fn xf_f32(address: u16, values: &[f32]) -> Self {
        Self::xf(
            address,
            values.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
        )
    }

    /// The stores this write is made of, in issue order.
    pub fn words(&self) -> Vec<Word> {
        match self {
            Self::Bp { reg, value } => vec![Word::U8(LOAD_BP), Word::U32(bp_word(*reg, *value))],
            Self::Cp { reg, value } => {
                vec![Word::U8(LOAD_CP), Word::U8(*reg as u8), Word::U32(*value)]
            }
            Self::Xf { address, values } => {
                let mut words = Vec::with_capacity(2 + values.len());
                words.push(Word::U8(LOAD_XF));
                words.push(Word::U32(xf_header(*address, values.len())));
                words.extend(values.iter().copied().map(Word::U32));
                words
            }
            Self::Raw(word) => vec![*word],
        }
    }

    /// The exact bytes the command processor receives for this write.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for word in self.words() {
            word.extend_be(&mut out);
        }

        out
    }

    /// Stores this write into the pipe.
    pub fn emit<P: Pipe + ?Sized>(&self, pipe: &mut P) {
        for word in self.words() {
            word.push(pipe);
        }
    }
}
