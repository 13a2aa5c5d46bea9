//! Texture formats and their memory footprint.
use bitos::bitos;

#[bitos(4)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    I4        = 0x0,
    I8        = 0x1,
    IA4       = 0x2,
    IA8       = 0x3,
    RGB565    = 0x4,
    RGB5A3    = 0x5,
    RGBA8     = 0x6,
    Reserved0 = 0x7,
    CI4       = 0x8,
    CI8       = 0x9,
    CI14X2    = 0xA,
    Reserved1 = 0xB,
    Reserved2 = 0xC,
    Reserved3 = 0xD,
    Cmpr      = 0xE,
    Reserved4 = 0xF,
}

/// Shape of a texture tile: textures are stored as a grid of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub width: u32,
    pub height: u32,
    pub bytes: u32,
}

impl Format {
    /// The tile layout of this format.
    pub fn tile(self) -> Tile {
        let (width, height, bytes) = match self {
            Self::I4 | Self::CI4 | Self::Cmpr => (8, 8, 32),
            Self::I8 | Self::IA4 | Self::CI8 => (8, 4, 32),
            Self::IA8 | Self::RGB565 | Self::RGB5A3 | Self::CI14X2 => (4, 4, 32),
            // stored as two 32 byte halves: AR then GB
            Self::RGBA8 => (4, 4, 64),
            _ => panic!("reserved texture format {self:?}"),
        };

        Tile {
            width,
            height,
            bytes,
        }
    }

    /// Size, in bytes, of a texture of this format with the given dimensions.
    pub fn length_for(self, width: u32, height: u32) -> u32 {
        let tile = self.tile();
        width.div_ceil(tile.width) * height.div_ceil(tile.height) * tile.bytes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn footprints() {
        assert_eq!(Format::RGBA8.length_for(4, 4), 64);
        assert_eq!(Format::RGBA8.length_for(5, 4), 128);
        assert_eq!(Format::RGBA8.length_for(640, 480), 640 * 480 * 4);
        assert_eq!(Format::I4.length_for(8, 8), 32);
        assert_eq!(Format::I8.length_for(9, 1), 64);
        assert_eq!(Format::RGB565.length_for(1, 1), 32);
    }
}
