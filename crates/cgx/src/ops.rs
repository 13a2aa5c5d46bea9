//! Semantic GPU operations, each a fixed sequence of register writes.
//!
//! Every operation validates all of its inputs before the first store, so a failed assertion
//! never leaves a half written register group in the FIFO.
use bitos::integer::{u2, u9};
use glam::{Mat4, Vec4};
use tracing::debug;

use crate::Address;
use crate::codec::{self, DRAW_QUADS};
use crate::hw::DataCache;
use crate::pipe::Pipe;
use crate::reg::cp::{
    AttributeMode, ColorDescriptor, ColorFormat, ColorKind, CoordsFormat, PositionDescriptor,
    PositionKind, VertexAttributeTableA, VertexDescriptor,
};
use crate::reg::pix::{ColorCopyFormat, CopyCmd, CopyScale};
use crate::reg::{bp, cp, xf};
use crate::tex;

/// Screen space offset of the viewport origin, in pixels.
pub const SCREEN_OFFSET: f32 = 342.0;
/// Scale from normalized depth to the 24 bit depth buffer.
pub const DEPTH_SCALE: f32 = xf::DEPTH_24_BIT_MAX as f32;
/// Largest position matrix row index.
pub const POSITION_MATRIX_MAX: u32 = 61;
/// Largest vertical scale of a display copy.
pub const Y_SCALE_MAX: u32 = 0x1FF;

/// Both clamp bits set: clamp at the top and at the bottom of the source.
const CLAMP_BOTH: u8 = 0b11;

/// The transform from clip space to screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
}

impl Viewport {
    pub fn new(origin_x: f32, origin_y: f32, width: f32, height: f32, near: f32, far: f32) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
            near,
            far,
        }
    }

    /// The six XF viewport words: scale x/y/z followed by offset x/y/z.
    pub fn words(&self) -> [f32; 6] {
        [
            self.width * 0.5,
            -self.height * 0.5,
            (self.far - self.near) * DEPTH_SCALE,
            SCREEN_OFFSET + self.origin_x + self.width * 0.5,
            SCREEN_OFFSET + self.origin_y + self.height * 0.5,
            self.far * DEPTH_SCALE,
        ]
    }
}

/// Loads the viewport registers.
pub fn set_viewport<P: Pipe + ?Sized>(pipe: &mut P, viewport: &Viewport) {
    pipe.load_xf_f32(xf::Reg::ViewportScaleX.address(), &viewport.words());
}

/// The twelve words of a position matrix: the top three rows of `matrix`, row after row.
pub fn position_matrix_words(matrix: &Mat4) -> [f32; 12] {
    let mut words = [0.0; 12];
    for (row, chunk) in words.chunks_exact_mut(4).enumerate() {
        chunk.copy_from_slice(&matrix.row(row).to_array());
    }

    words
}

/// Loads a 3x4 position matrix into the matrix memory row `index`.
pub fn load_position_matrix<P: Pipe + ?Sized>(pipe: &mut P, matrix: &Mat4, index: u32) {
    assert!(
        index <= POSITION_MATRIX_MAX,
        "position matrix index {index} out of range"
    );

    pipe.load_xf_f32(xf::position_matrix(index), &position_matrix_words(matrix));
}

/// Kind of projection, as stored in [`xf::Reg::ProjectionOrthographic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Projection {
    Perspective  = 0,
    Orthographic = 1,
}

impl Projection {
    /// The six parameters the hardware keeps out of a full projection matrix.
    pub fn params(self, matrix: &Mat4) -> [f32; 6] {
        let rows: [Vec4; 3] = [matrix.row(0), matrix.row(1), matrix.row(2)];
        match self {
            Self::Perspective => [
                rows[0].x, rows[0].z, rows[1].y, rows[1].z, rows[2].z, rows[2].w,
            ],
            Self::Orthographic => [
                rows[0].x, rows[0].w, rows[1].y, rows[1].w, rows[2].z, rows[2].w,
            ],
        }
    }
}

/// Loads the projection parameters and the projection kind, seven words in a single group.
pub fn load_projection_matrix<P: Pipe + ?Sized>(
    pipe: &mut P,
    matrix: &Mat4,
    projection: Projection,
) {
    let mut words = [0; 7];
    for (word, param) in words.iter_mut().zip(projection.params(matrix)) {
        *word = param.to_bits();
    }
    words[6] = projection as u32;

    pipe.load_xf(xf::Reg::ProjectionParam0.address(), &words);
}

/// A copy of a framebuffer region into texture memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopy {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub dest: Address,
    pub format: ColorCopyFormat,
    /// Store the texels in an intensity format.
    pub intensity: bool,
    /// Downscale the region by two in both directions.
    pub half: bool,
    /// Clear the region after copying it.
    pub clear: bool,
}

impl TextureCopy {
    pub fn new(
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        dest: Address,
        format: ColorCopyFormat,
    ) -> Self {
        Self {
            left,
            top,
            width,
            height,
            dest,
            format,
            intensity: false,
            half: false,
            clear: false,
        }
    }

    /// Destination row stride, in 32 byte units. Sized for four bytes per texel.
    pub fn stride(&self) -> u32 {
        ((self.width as u32 + 3) >> 2) * 2
    }

    /// Bytes of memory the copy writes to. Rows are spaced by [`TextureCopy::stride`] whatever
    /// the format, so this is the size of an RGBA8 texture of the same dimensions.
    pub fn footprint(&self) -> u32 {
        tex::Format::RGBA8.length_for(self.width as u32, self.height as u32)
    }

    /// The copy trigger.
    pub fn command(&self) -> CopyCmd {
        CopyCmd::default()
            .with_clamp(u2::new(CLAMP_BOTH))
            .with_target_format(codec::target_format(self.format as u8))
            .with_half(self.half)
            .with_clear(self.clear)
            .with_intensity(self.intensity)
    }
}

/// Copies a framebuffer region into texture memory and makes the result visible to the CPU.
pub fn copy_to_texture<P, C>(pipe: &mut P, cache: &mut C, copy: &TextureCopy)
where
    P: Pipe + ?Sized,
    C: DataCache + ?Sized,
{
    let src = codec::copy_src(copy.left, copy.top);
    let dims = codec::copy_dims(copy.width, copy.height);
    let dst = codec::copy_dst(copy.dest);
    let cmd = copy.command();
    let footprint = copy.footprint();

    pipe.load_bp(bp::Reg::PixelCopySrc, src.to_bits());
    pipe.load_bp(bp::Reg::PixelCopyDimensions, dims.to_bits());
    pipe.load_bp(bp::Reg::PixelCopyDstStride, copy.stride());
    pipe.load_bp(bp::Reg::PixelCopyDst, dst);
    pipe.load_bp(bp::Reg::PixelCopyCmd, cmd.to_bits());
    debug!(
        "copy {}x{} at ({}, {}) to texture {} as {:?}",
        copy.width, copy.height, copy.left, copy.top, copy.dest, copy.format
    );

    cache.flush_range(copy.dest, footprint);
}

/// A copy of a framebuffer region into a display (YUYV) buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayCopy {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub src_height: u16,
    pub dst_height: u16,
    pub dest: Address,
    pub clear: bool,
}

impl DisplayCopy {
    /// Vertical scale, `256 * src / dst`. `None` when no scaling is needed.
    pub fn y_scale(&self) -> Option<u32> {
        if self.src_height == self.dst_height {
            return None;
        }

        assert!(self.dst_height >= 1, "display copy height must be at least one");
        let scale = 256 * self.src_height as u32 / self.dst_height as u32;
        assert!(scale <= Y_SCALE_MAX, "display copy y scale {scale} out of range");

        Some(scale)
    }

    /// Destination row stride, in 32 byte units.
    pub fn stride(&self) -> u32 {
        self.width as u32 >> 4
    }

    /// Bytes of memory the copy writes to: two bytes per pixel.
    pub fn footprint(&self) -> u32 {
        self.width as u32 * 2 * self.dst_height as u32
    }
}

/// Copies a framebuffer region into a display buffer and makes the result visible to the CPU.
pub fn copy_to_display<P, C>(pipe: &mut P, cache: &mut C, copy: &DisplayCopy)
where
    P: Pipe + ?Sized,
    C: DataCache + ?Sized,
{
    let src = codec::copy_src(copy.left, copy.top);
    let dims = codec::copy_dims(copy.width, copy.src_height);
    let dst = codec::copy_dst(copy.dest);
    let y_scale = copy.y_scale();
    let cmd = CopyCmd::default()
        .with_clamp(u2::new(CLAMP_BOTH))
        .with_scale_invert(y_scale.is_some())
        .with_clear(copy.clear)
        .with_to_xfb(true);

    pipe.load_bp(bp::Reg::PixelCopySrc, src.to_bits());
    pipe.load_bp(bp::Reg::PixelCopyDimensions, dims.to_bits());
    pipe.load_bp(bp::Reg::PixelCopyDst, dst);
    pipe.load_bp(bp::Reg::PixelCopyDstStride, copy.stride());
    if let Some(scale) = y_scale {
        let scale = CopyScale::default().with_y_scale(u9::new(scale as u16));
        pipe.load_bp(bp::Reg::PixelCopyScale, scale.to_bits());
    }
    pipe.load_bp(bp::Reg::PixelCopyCmd, cmd.to_bits());
    debug!(
        "copy {}x{} at ({}, {}) to display buffer {} ({} lines)",
        copy.width, copy.src_height, copy.left, copy.top, copy.dest, copy.dst_height
    );

    cache.flush_range(copy.dest, copy.footprint());
}

/// Pushes everything stored so far out of the write-gather buffer.
pub fn force_pipeline_flush<P: Pipe + ?Sized>(pipe: &mut P) {
    pipe.flush();
}

/// Vertex layout of [`draw_fullscreen_quad`]: direct position and colour.
pub fn quad_vertex_descriptor() -> VertexDescriptor {
    VertexDescriptor::default()
        .with_position(AttributeMode::Direct)
        .with_chan0(AttributeMode::Direct)
}

/// Attribute formats of [`draw_fullscreen_quad`]: f32 xyz position and rgba8 colour.
pub fn quad_attribute_table() -> VertexAttributeTableA {
    VertexAttributeTableA::default()
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
        .with_byte_dequant(true)
}

/// Corners of the full screen quad, in drawing order.
const QUAD_CORNERS: [[f32; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [1.0, -1.0], [-1.0, -1.0]];

/// Draws a quad covering the whole viewport in a single colour (`0xRRGGBBAA`).
pub fn draw_fullscreen_quad<P: Pipe + ?Sized>(pipe: &mut P, color: u32) {
    let vcd = quad_vertex_descriptor();
    pipe.load_cp(cp::Reg::VcdLow, vcd.low());
    pipe.load_cp(cp::Reg::VcdHigh, vcd.high());
    pipe.load_cp(cp::Reg::vat_a(0), quad_attribute_table().to_bits());
    pipe.load_cp(cp::Reg::vat_b(0), 0);
    pipe.load_cp(cp::Reg::vat_c(0), 0);

    let projection = Mat4::from_diagonal(Vec4::new(1.0, 1.0, -1.0, 0.0));
    load_projection_matrix(pipe, &projection, Projection::Orthographic);

    pipe.write_u8(DRAW_QUADS);
    pipe.write_u16(QUAD_CORNERS.len() as u16);
    for [x, y] in QUAD_CORNERS {
        pipe.write_f32(x);
        pipe.write_f32(y);
        pipe.write_f32(1.0);
        pipe.write_u32(color);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Flushes(Vec<(Address, u32)>);

    impl DataCache for Flushes {
        fn flush_range(&mut self, address: Address, len: u32) {
            self.0.push((address, len));
        }
    }

    fn bp_words(bytes: &[u8]) -> Vec<u32> {
        assert_eq!(bytes.len() % 5, 0);
        bytes
            .chunks_exact(5)
            .map(|chunk| {
                assert_eq!(chunk[0], codec::LOAD_BP);
                u32::from_be_bytes([chunk[1], chunk[2], chunk[3], chunk[4]])
            })
            .collect()
    }

    #[test]
    fn viewport_640x480() {
        let words = Viewport::new(0.0, 0.0, 640.0, 480.0, 0.0, 1.0).words();
        assert_eq!(words, [320.0, -240.0, 16_777_215.0, 662.0, 582.0, 16_777_215.0]);
    }

    #[test]
    fn viewport_matches_closed_form() {
        let cases = [
            (0.0f32, 0.0f32, 640.0f32, 480.0f32, 0.0f32, 1.0f32),
            (12.5, -3.25, 317.0, 211.0, 0.25, 0.75),
            (-100.0, 40.0, 1.0, 1.0, 0.5, 0.5),
            (0.1, 0.2, 0.3, 0.7, 0.1, 0.9),
        ];

        for (ox, oy, w, h, n, f) in cases {
            let words = Viewport::new(ox, oy, w, h, n, f).words();
            let expected = [
                w * 0.5,
                -h * 0.5,
                (f - n) * 16_777_215.0,
                342.0 + ox + w * 0.5,
                342.0 + oy + h * 0.5,
                f * 16_777_215.0,
            ];

            for (word, expected) in words.iter().zip(expected) {
                assert_eq!(word.to_bits(), expected.to_bits());
            }
        }
    }

    #[test]
    fn viewport_is_one_xf_group() {
        let mut out: Vec<u8> = Vec::new();
        set_viewport(&mut out, &Viewport::new(0.0, 0.0, 640.0, 480.0, 0.0, 1.0));

        assert_eq!(out.len(), 1 + 4 + 6 * 4);
        assert_eq!(out[0], codec::LOAD_XF);
        assert_eq!(out[1..5], 0x0005_101Au32.to_be_bytes());
        assert_eq!(out[5..9], 320.0f32.to_be_bytes());
    }

    #[test]
    fn position_matrix_rows() {
        let matrix = Mat4::from_cols_array_2d(&[
            [1.0, 5.0, 9.0, 13.0],
            [2.0, 6.0, 10.0, 14.0],
            [3.0, 7.0, 11.0, 15.0],
            [4.0, 8.0, 12.0, 16.0],
        ]);

        let words = position_matrix_words(&matrix);
        assert_eq!(
            words,
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]
        );

        let mut out: Vec<u8> = Vec::new();
        load_position_matrix(&mut out, &matrix, 3);
        assert_eq!(out[1..5], 0x000B_000Cu32.to_be_bytes());
        assert_eq!(out.len(), 1 + 4 + 12 * 4);
    }

    #[test]
    #[should_panic(expected = "position matrix index 62")]
    fn position_matrix_index_range() {
        load_position_matrix(&mut Vec::<u8>::new(), &Mat4::IDENTITY, 62);
    }

    #[test]
    fn projection_params() {
        let matrix = Mat4::from_cols_array_2d(&[
            [1.0, 5.0, 9.0, 13.0],
            [2.0, 6.0, 10.0, 14.0],
            [3.0, 7.0, 11.0, 15.0],
            [4.0, 8.0, 12.0, 16.0],
        ]);

        assert_eq!(
            Projection::Perspective.params(&matrix),
            [1.0, 3.0, 6.0, 7.0, 11.0, 12.0]
        );
        assert_eq!(
            Projection::Orthographic.params(&matrix),
            [1.0, 4.0, 6.0, 8.0, 11.0, 12.0]
        );

        let mut out: Vec<u8> = Vec::new();
        load_projection_matrix(&mut out, &matrix, Projection::Orthographic);
        assert_eq!(out[1..5], 0x0006_1020u32.to_be_bytes());
        assert_eq!(out[out.len() - 4..], 1u32.to_be_bytes());
    }

    #[test]
    fn texture_copy_rgba8_4x4() {
        let copy = TextureCopy::new(0, 0, 4, 4, Address(0x8000_1000), ColorCopyFormat::RGBA8);
        let mut out: Vec<u8> = Vec::new();
        let mut cache = Flushes::default();
        copy_to_texture(&mut out, &mut cache, &copy);

        assert_eq!(
            bp_words(&out),
            [0x4900_0000, 0x4A00_0C03, 0x4D00_0002, 0x4B00_0080, 0x5200_0063]
        );
        assert_eq!(cache.0, [(Address(0x8000_1000), 64)]);
    }

    #[test]
    fn texture_copy_flags() {
        let mut copy = TextureCopy::new(16, 8, 32, 32, Address(0x8010_0000), ColorCopyFormat::R8);
        copy.intensity = true;
        copy.half = true;
        copy.clear = true;

        let cmd = copy.command();
        assert_eq!(cmd.clamp().value(), 0b11);
        assert_eq!(cmd.target_format().value(), 0x1);
        assert_eq!(cmd.color_format(), ColorCopyFormat::R8);
        assert!(cmd.half() && cmd.clear() && cmd.intensity());
        assert!(!cmd.to_xfb());
        assert_eq!(copy.stride(), 16);
        assert_eq!(copy.footprint(), 32 * 32 * 4);
    }

    #[test]
    fn texture_copy_flush_covers_every_tile_row() {
        let cases = [
            (ColorCopyFormat::R8, tex::Format::I8, 32, 32),
            (ColorCopyFormat::RGB565, tex::Format::RGB565, 16, 16),
            (ColorCopyFormat::R4, tex::Format::I4, 20, 9),
            (ColorCopyFormat::RA8, tex::Format::IA8, 1, 1),
        ];

        for (format, texels, width, height) in cases {
            let copy = TextureCopy::new(0, 0, width, height, Address(0x8000_1000), format);
            let tile = texels.tile();
            let rows = (height as u32).div_ceil(tile.height);
            let row_bytes = (width as u32).div_ceil(tile.width) * tile.bytes;
            let written = (rows - 1) * copy.stride() * 32 + row_bytes;

            let mut cache = Flushes::default();
            copy_to_texture(&mut Vec::<u8>::new(), &mut cache, &copy);
            assert_eq!(cache.0.len(), 1);
            assert!(
                cache.0[0].1 >= written,
                "{format:?} {width}x{height}: flushed {} of {written} bytes",
                cache.0[0].1
            );
        }
    }

    #[test]
    fn texture_copy_accepts_reserved_formats() {
        for format in [
            ColorCopyFormat::Reserved0,
            ColorCopyFormat::Reserved1,
            ColorCopyFormat::Reserved2,
        ] {
            let copy = TextureCopy::new(0, 0, 8, 8, Address(0x8000_1000), format);
            let mut out: Vec<u8> = Vec::new();
            let mut cache = Flushes::default();
            copy_to_texture(&mut out, &mut cache, &copy);

            let trigger = CopyCmd::from_bits(bp_words(&out)[4] & bp::VALUE_MAX);
            assert_eq!(trigger.color_format(), format);
            // stride of 4 lines, two rows of tiles
            assert_eq!(cache.0, [(Address(0x8000_1000), 4 * 32 * 2)]);
        }
    }

    #[test]
    #[should_panic(expected = "copy width 1025")]
    fn texture_copy_rejects_wide_regions_before_writing() {
        let copy = TextureCopy::new(0, 0, 1025, 4, Address(0x8000_1000), ColorCopyFormat::RGBA8);
        copy_to_texture(&mut Vec::<u8>::new(), &mut Flushes::default(), &copy);
    }

    #[test]
    fn display_copy_same_height() {
        let copy = DisplayCopy {
            left: 0,
            top: 0,
            width: 640,
            src_height: 480,
            dst_height: 480,
            dest: Address(0x8050_0000),
            clear: true,
        };

        let mut out: Vec<u8> = Vec::new();
        let mut cache = Flushes::default();
        copy_to_display(&mut out, &mut cache, &copy);

        let words = bp_words(&out);
        assert_eq!(
            words[..4],
            [0x4900_0000, 0x4A07_7E7F, 0x4B02_8000, 0x4D00_0028]
        );
        let cmd = CopyCmd::from_bits(words[4] & bp::VALUE_MAX);
        assert_eq!(words[4] >> 24, 0x52);
        assert!(cmd.to_xfb() && cmd.clear() && !cmd.scale_invert());
        assert_eq!(cache.0, [(Address(0x8050_0000), 640 * 2 * 480)]);
    }

    #[test]
    fn display_copy_scaled() {
        let copy = DisplayCopy {
            left: 0,
            top: 0,
            width: 640,
            src_height: 240,
            dst_height: 480,
            dest: Address(0x8050_0000),
            clear: false,
        };

        assert_eq!(copy.y_scale(), Some(128));

        let mut out: Vec<u8> = Vec::new();
        copy_to_display(&mut out, &mut Flushes::default(), &copy);
        let words = bp_words(&out);
        assert_eq!(words.len(), 6);
        assert_eq!(words[4], 0x4E00_0080);
        assert!(CopyCmd::from_bits(words[5] & bp::VALUE_MAX).scale_invert());
    }

    #[test]
    fn fullscreen_quad() {
        let mut out: Vec<u8> = Vec::new();
        draw_fullscreen_quad(&mut out, 0x0000_FF00);

        assert_eq!(out[..6], [0x08, 0x50, 0x00, 0x00, 0x22, 0x00]);
        assert_eq!(out[12..18], [0x08, 0x70, 0x40, 0x01, 0x60, 0x09]);

        let draw = &out[out.len() - (3 + 4 * 16)..];
        assert_eq!(draw[..3], [DRAW_QUADS, 0x00, 0x04]);
        assert_eq!(draw[3..7], (-1.0f32).to_be_bytes());
        assert_eq!(draw[draw.len() - 4..], 0x0000_FF00u32.to_be_bytes());
    }
}
