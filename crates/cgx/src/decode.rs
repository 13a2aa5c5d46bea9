//! Command processor side of the stream: parses encoded bytes back into commands.
use bitos::integer::u3;
use bitos::{BitUtils, bitos};
use easyerr::Error;

use crate::Address;
use crate::reg::cp::{AttributeMode, VertexAttributeTableA, VertexDescriptor};
use crate::reg::{bp, cp};
use crate::stream::{BinReader, BinaryStream};

#[bitos(5)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    NOP                   = 0b0_0000,
    SetCP                 = 0b0_0001,
    SetXF                 = 0b0_0010,
    IndexedSetXFA         = 0b0_0100,
    IndexedSetXFB         = 0b0_0101,
    IndexedSetXFC         = 0b0_0110,
    IndexedSetXFD         = 0b0_0111,
    Call                  = 0b0_1000,
    InvalidateVertexCache = 0b0_1001,
    SetBP                 = 0b0_1100,
    DrawQuadList          = 0b1_0000,
    DrawTriangleList      = 0b1_0010,
    DrawTriangleStrip     = 0b1_0011,
    DrawTriangleFan       = 0b1_0100,
    DrawLineList          = 0b1_0101,
    DrawLineStrip         = 0b1_0110,
    DrawPointList         = 0b1_0111,
}

#[bitos(8)]
#[derive(Debug)]
pub struct Opcode {
    #[bits(0..3)]
    pub vat_index: u3,
    #[bits(3..8)]
    pub operation: Option<Operation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    QuadList,
    TriangleList,
    TriangleStrip,
    TriangleFan,
    LineList,
    LineStrip,
    PointList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nop,
    InvalidateVertexCache,
    Call {
        address: Address,
        length: u32,
    },
    SetCP {
        register: cp::Reg,
        value: u32,
    },
    SetBP {
        register: bp::Reg,
        value: u32,
    },
    SetXF {
        start: u16,
        values: Vec<u32>,
    },
    /// An XF load from one of the four indexed arrays (`A` to `D`).
    IndexedSetXF {
        array: u8,
        base: u16,
        length: u8,
        index: u16,
    },
    Draw {
        topology: Topology,
        vat: u8,
        count: u16,
        data: Vec<u8>,
    },
}

impl Command {
    /// Whether this command changes no state.
    pub fn is_nop(&self) -> bool {
        matches!(self, Self::Nop)
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown opcode 0x{f0:02X}")]
    UnknownOpcode(u8),
    #[error("unknown BP register 0x{f0:02X}")]
    UnknownBpRegister(u8),
    #[error("unknown CP register 0x{f0:02X}")]
    UnknownCpRegister(u8),
    #[error("vertex format of table {f0} is not supported")]
    UnsupportedVertexFormat(u8),
    #[error("stream ends in the middle of a command ({f0} bytes left)")]
    Truncated(usize),
}

/// Decodes commands, tracking the CP state draws depend on.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    vcd: VertexDescriptor,
    vat_a: [VertexAttributeTableA; 8],
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of a vertex in the stream, as described by the current VCD and table `vat`.
    pub fn vertex_size(&self, vat: u8) -> Result<u32, DecodeError> {
        let vcd = &self.vcd;
        let table = &self.vat_a[vat as usize];
        let unsupported = DecodeError::UnsupportedVertexFormat(vat);

        let mut size = vcd.pos_mat_index() as u32;
        for i in 0..8 {
            size += vcd.tex_coord_mat_index_at(i).unwrap_or(false) as u32;
        }

        let direct = |mode: AttributeMode, size: Option<u32>| match mode.index_size() {
            Some(index) => Some(index),
            None => size,
        };

        size += direct(vcd.position(), table.position().size()).ok_or(unsupported)?;
        size += direct(vcd.normal(), None).ok_or(unsupported)?;
        size += direct(vcd.chan0(), table.chan0().format().size()).ok_or(unsupported)?;
        size += direct(vcd.chan1(), table.chan1().format().size()).ok_or(unsupported)?;
        for i in 0..8 {
            let mode = vcd.tex_coord_at(i).unwrap_or_default();
            size += direct(mode, None).ok_or(unsupported)?;
        }

        Ok(size)
    }

    fn set_cp(&mut self, register: cp::Reg, value: u32) {
        match register {
            cp::Reg::VcdLow => self.vcd = self.vcd.with_low(value),
            cp::Reg::VcdHigh => self.vcd = self.vcd.with_high(value),
            _ => {
                if let Some(table) = register.vat_a_index() {
                    self.vat_a[table as usize] = VertexAttributeTableA::from_bits(value);
                }
            }
        }
    }

    /// Reads a command from the stream. Returns `Ok(None)` when the stream does not hold a
    /// whole command yet, in which case nothing is consumed.
    pub fn read(&mut self, stream: &mut dyn BinaryStream) -> Result<Option<Command>, DecodeError> {
        let mut reader = BinReader::new(stream);

        macro_rules! need {
            ($e:expr) => {
                match $e {
                    Some(value) => value,
                    None => return Ok(None),
                }
            };
        }

        let raw = need!(reader.read_be::<u8>());
        let opcode = Opcode::from_bits(raw);
        let Some(operation) = opcode.operation() else {
            return Err(DecodeError::UnknownOpcode(raw));
        };

        let command = match operation {
            Operation::NOP => Command::Nop,
            Operation::SetCP => {
                let register = need!(reader.read_be::<u8>());
                let value = need!(reader.read_be::<u32>());

                let Some(register) = cp::Reg::from_repr(register) else {
                    return Err(DecodeError::UnknownCpRegister(register));
                };

                self.set_cp(register, value);
                Command::SetCP { register, value }
            }
            Operation::SetXF => {
                let length = need!(reader.read_be::<u16>()) as usize + 1;
                let start = need!(reader.read_be::<u16>());
                if reader.remaining() < 4 * length {
                    return Ok(None);
                }

                let mut values = Vec::with_capacity(length);
                for _ in 0..length {
                    values.push(need!(reader.read_be::<u32>()));
                }

                Command::SetXF { start, values }
            }
            Operation::IndexedSetXFA
            | Operation::IndexedSetXFB
            | Operation::IndexedSetXFC
            | Operation::IndexedSetXFD => {
                let config = need!(reader.read_be::<u32>());
                Command::IndexedSetXF {
                    array: operation as u8 - Operation::IndexedSetXFA as u8,
                    base: config.bits(0, 12) as u16,
                    length: config.bits(12, 16) as u8 + 1,
                    index: config.bits(16, 32) as u16,
                }
            }
            Operation::Call => {
                let address = Address(need!(reader.read_be::<u32>()));
                let length = need!(reader.read_be::<u32>());

                Command::Call { address, length }
            }
            Operation::InvalidateVertexCache => Command::InvalidateVertexCache,
            Operation::SetBP => {
                let word = need!(reader.read_be::<u32>());
                let register = (word >> 24) as u8;
                let value = word & bp::VALUE_MAX;

                let Some(register) = bp::Reg::from_repr(register) else {
                    return Err(DecodeError::UnknownBpRegister(register));
                };

                Command::SetBP { register, value }
            }
            Operation::DrawQuadList
            | Operation::DrawTriangleList
            | Operation::DrawTriangleStrip
            | Operation::DrawTriangleFan
            | Operation::DrawLineList
            | Operation::DrawLineStrip
            | Operation::DrawPointList => {
                let vat = opcode.vat_index().value();
                let count = need!(reader.read_be::<u16>());
                let size = count as usize * self.vertex_size(vat)? as usize;
                let data = need!(reader.read_bytes(size));

                let topology = match operation {
                    Operation::DrawQuadList => Topology::QuadList,
                    Operation::DrawTriangleList => Topology::TriangleList,
                    Operation::DrawTriangleStrip => Topology::TriangleStrip,
                    Operation::DrawTriangleFan => Topology::TriangleFan,
                    Operation::DrawLineList => Topology::LineList,
                    Operation::DrawLineStrip => Topology::LineStrip,
                    _ => Topology::PointList,
                };

                Command::Draw {
                    topology,
                    vat,
                    count,
                    data,
                }
            }
        };

        reader.finish();
        Ok(Some(command))
    }
}

/// Decodes a whole stream.
pub fn decode_all(mut bytes: &[u8]) -> Result<Vec<Command>, DecodeError> {
    let mut decoder = Decoder::new();
    let mut commands = Vec::new();
    while !bytes.is_empty() {
        match decoder.read(&mut bytes)? {
            Some(command) => commands.push(command),
            None => return Err(DecodeError::Truncated(bytes.len())),
        }
    }

    Ok(commands)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::RegisterWrite;
    use crate::ops;
    use crate::pipe::Pipe;

    #[test]
    fn register_writes_round_trip() {
        let mut out: Vec<u8> = Vec::new();
        RegisterWrite::bp(bp::Reg::PixelDone, bp::DRAW_DONE).emit(&mut out);
        RegisterWrite::cp(cp::Reg::Vat0B, 7).emit(&mut out);
        RegisterWrite::xf(0x1020, [1u32, 2, 3]).emit(&mut out);
        out.flush();

        let commands = decode_all(&out).unwrap();
        assert_eq!(commands.len(), 3 + 32);
        assert_eq!(
            commands[..3],
            [
                Command::SetBP {
                    register: bp::Reg::PixelDone,
                    value: 2
                },
                Command::SetCP {
                    register: cp::Reg::Vat0B,
                    value: 7
                },
                Command::SetXF {
                    start: 0x1020,
                    values: vec![1, 2, 3]
                },
            ]
        );
        assert!(commands[3..].iter().all(Command::is_nop));
    }

    #[test]
    fn quad_draw_uses_the_loaded_vertex_format() {
        let mut out: Vec<u8> = Vec::new();
        ops::draw_fullscreen_quad(&mut out, 0xFF00_00FF);

        let mut decoder = Decoder::new();
        let mut bytes = out.as_slice();
        let mut draw = None;
        while let Some(command) = decoder.read(&mut bytes).unwrap() {
            if let Command::Draw { .. } = command {
                draw = Some(command);
            }
        }

        assert!(bytes.is_empty());
        assert_eq!(decoder.vertex_size(0), Ok(16));
        let Some(Command::Draw {
            topology,
            count,
            data,
            ..
        }) = draw
        else {
            panic!("no draw decoded");
        };
        assert_eq!(topology, Topology::QuadList);
        assert_eq!(count, 4);
        assert_eq!(data.len(), 64);
    }

    #[test]
    fn partial_commands_are_not_consumed() {
        let bytes = RegisterWrite::xf(0x101A, [0u32; 6]).encode();
        let mut partial = &bytes[..bytes.len() - 1];

        let mut decoder = Decoder::new();
        assert_eq!(decoder.read(&mut partial), Ok(None));
        assert_eq!(partial.len(), bytes.len() - 1);
        assert_eq!(
            decode_all(&bytes[..bytes.len() - 1]),
            Err(DecodeError::Truncated(bytes.len() - 1))
        );
    }

    #[test]
    fn unknown_opcode() {
        assert_eq!(decode_all(&[0x18]), Err(DecodeError::UnknownOpcode(0x18)));
        assert_eq!(
            decode_all(&[0x61, 0xEE, 0x00, 0x00, 0x00]),
            Err(DecodeError::UnknownBpRegister(0xEE))
        );
    }

    #[test]
    fn draws_need_a_known_vertex_size() {
        let mut out: Vec<u8> = Vec::new();
        out.load_cp(cp::Reg::VcdLow, 0x0800);
        out.extend_from_slice(&[0x80, 0x00, 0x01]);
        assert_eq!(
            decode_all(&out),
            Err(DecodeError::UnsupportedVertexFormat(0))
        );
    }
}
