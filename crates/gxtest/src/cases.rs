//! Conformance cases. Each one drives the GPU through [`Gx`] and checks the resulting state.
use std::io::Write;

use cgx::decode::Command;
use cgx::ops::{self, Projection};
use cgx::reg::pix::{CopyCmd, CopyDims, CopySrc};
use cgx::reg::{bp, xf};
use cgx::soft::SoftGpu;
use cgx::{Address, ColorCopyFormat, DisplayCopy, Gx, TextureCopy, Viewport};
use glam::{Mat4, Vec4};

use crate::report::{ReportError, Reporter, check, end_test, start_test};

pub type Output = Box<dyn Write + Send>;
type Run = fn(&mut Gx<SoftGpu>, &mut Reporter<Output>) -> Result<(), ReportError>;

pub struct Case {
    pub name: &'static str,
    pub run: Run,
}

pub const CASES: &[Case] = &[
    Case {
        name: "viewport",
        run: viewport,
    },
    Case {
        name: "position_matrix",
        run: position_matrix,
    },
    Case {
        name: "projection",
        run: projection,
    },
    Case {
        name: "texture_copy",
        run: texture_copy,
    },
    Case {
        name: "display_copy",
        run: display_copy,
    },
    Case {
        name: "pipeline_flush",
        run: pipeline_flush,
    },
    Case {
        name: "fullscreen_quad",
        run: fullscreen_quad,
    },
    Case {
        name: "completion",
        run: completion,
    },
];

/// The copy registers written since `skip` commands, in order.
fn copy_writes(gx: &Gx<SoftGpu>, skip: usize) -> Vec<(bp::Reg, u32)> {
    gx.backend()
        .registers()
        .commands
        .iter()
        .skip(skip)
        .filter_map(|command| match command {
            Command::SetBP { register, value } if register.is_copy() => Some((*register, *value)),
            _ => None,
        })
        .collect()
}

fn viewport(gx: &mut Gx<SoftGpu>, r: &mut Reporter<Output>) -> Result<(), ReportError> {
    start_test!(r);

    let viewport = Viewport::new(0.0, 0.0, 640.0, 480.0, 0.0, 1.0);
    gx.set_viewport(&viewport);
    gx.wait_for_gpu();

    let regs = gx.backend().registers();
    let expected = [320.0, -240.0, 16_777_215.0, 662.0, 582.0, 16_777_215.0];
    for (offset, expected) in (0u16..).zip(expected) {
        let address = xf::Reg::ViewportScaleX.address() + offset;
        let actual = regs.xf_f32(address);
        check!(
            r,
            actual == Some(expected),
            "XF 0x{address:04X}: expected {expected}, got {actual:?}"
        );
    }

    end_test!(r);
    Ok(())
}

fn position_matrix(gx: &mut Gx<SoftGpu>, r: &mut Reporter<Output>) -> Result<(), ReportError> {
    start_test!(r);

    let matrix = Mat4::from_cols_array(&[
        1.0, 5.0, 9.0, 0.0, //
        2.0, 6.0, 10.0, 0.0, //
        3.0, 7.0, 11.0, 0.0, //
        4.0, 8.0, 12.0, 1.0, //
    ]);
    gx.load_position_matrix(&matrix, 6);
    gx.wait_for_gpu();

    let regs = gx.backend().registers();
    let base = xf::position_matrix(6);
    for (offset, expected) in (0u16..).zip(ops::position_matrix_words(&matrix)) {
        let actual = regs.xf_f32(base + offset);
        check!(
            r,
            actual == Some(expected),
            "matrix word {offset}: expected {expected}, got {actual:?}"
        );
    }

    end_test!(r);
    Ok(())
}

fn projection(gx: &mut Gx<SoftGpu>, r: &mut Reporter<Output>) -> Result<(), ReportError> {
    start_test!(r);

    let matrix = Mat4::perspective_rh_gl(1.0, 4.0 / 3.0, 0.1, 100.0);
    for kind in [Projection::Perspective, Projection::Orthographic] {
        gx.load_projection_matrix(&matrix, kind);
        gx.wait_for_gpu();

        let regs = gx.backend().registers();
        for (offset, expected) in (0u16..).zip(kind.params(&matrix)) {
            let actual = regs.xf_f32(xf::Reg::ProjectionParam0.address() + offset);
            check!(
                r,
                actual == Some(expected),
                "{kind:?} parameter {offset}: expected {expected}, got {actual:?}"
            );
        }

        let mode = regs.xf(xf::Reg::ProjectionOrthographic.address());
        check!(
            r,
            mode == Some(kind as u32),
            "{kind:?} mode: got {mode:?}"
        );
    }

    end_test!(r);
    Ok(())
}

fn texture_copy(gx: &mut Gx<SoftGpu>, r: &mut Reporter<Output>) -> Result<(), ReportError> {
    start_test!(r);

    let skip = gx.backend().registers().commands.len();
    let flushes = gx.backend().flushes().len();

    let copy = TextureCopy::new(0, 0, 4, 4, Address(0x8000_1000), ColorCopyFormat::RGBA8);
    gx.copy_to_texture(&copy);
    gx.wait_for_gpu();

    let writes = copy_writes(gx, skip);
    let order = writes.iter().map(|(reg, _)| *reg).collect::<Vec<_>>();
    check!(
        r,
        order
            == [
                bp::Reg::PixelCopySrc,
                bp::Reg::PixelCopyDimensions,
                bp::Reg::PixelCopyDstStride,
                bp::Reg::PixelCopyDst,
                bp::Reg::PixelCopyCmd,
            ],
        "unexpected copy register writes {order:?}"
    );

    for (reg, value) in writes {
        match reg {
            bp::Reg::PixelCopySrc => {
                let src = CopySrc::from_bits(value);
                check!(
                    r,
                    src.x().value() == 0 && src.y().value() == 0,
                    "top left is {src:?}"
                );
            }
            bp::Reg::PixelCopyDimensions => {
                let dims = CopyDims::from_bits(value);
                check!(
                    r,
                    dims.width() == 4 && dims.height() == 4,
                    "dimensions are {}x{}",
                    dims.width(),
                    dims.height()
                );
            }
            bp::Reg::PixelCopyDstStride => {
                check!(r, value == 2, "stride is {value}");
            }
            bp::Reg::PixelCopyDst => {
                check!(r, value == 0x80, "destination is 0x{value:X}");
            }
            bp::Reg::PixelCopyCmd => {
                let cmd = CopyCmd::from_bits(value);
                check!(
                    r,
                    cmd.color_format() == ColorCopyFormat::RGBA8,
                    "format is {:?}",
                    cmd.color_format()
                );
                check!(
                    r,
                    cmd.clamp().value() == 0b11 && !cmd.to_xfb() && !cmd.half(),
                    "trigger is {cmd:?}"
                );
            }
            _ => (),
        }
    }

    let flushed = gx.backend().flushes()[flushes..].to_vec();
    check!(
        r,
        flushed == [(Address(0x8000_1000), 64)],
        "cache flushes {flushed:?}"
    );

    end_test!(r);
    Ok(())
}

fn display_copy(gx: &mut Gx<SoftGpu>, r: &mut Reporter<Output>) -> Result<(), ReportError> {
    start_test!(r);

    for (src_height, dst_height) in [(480, 480), (240, 480)] {
        let skip = gx.backend().registers().commands.len();
        let copy = DisplayCopy {
            left: 0,
            top: 0,
            width: 640,
            src_height,
            dst_height,
            dest: Address(0x8050_0000),
            clear: true,
        };
        gx.copy_to_display(&copy);
        gx.wait_for_gpu();

        let writes = copy_writes(gx, skip);
        let scale = writes
            .iter()
            .find(|(reg, _)| *reg == bp::Reg::PixelCopyScale)
            .map(|(_, value)| *value);
        check!(
            r,
            scale == copy.y_scale(),
            "{src_height} to {dst_height} lines: scale {scale:?}"
        );

        let cmd = writes
            .last()
            .filter(|(reg, _)| *reg == bp::Reg::PixelCopyCmd)
            .map(|(_, value)| CopyCmd::from_bits(*value));
        check!(
            r,
            cmd.is_some_and(|cmd| cmd.to_xfb() && cmd.clear()),
            "trigger is {cmd:?}"
        );
    }

    end_test!(r);
    Ok(())
}

fn pipeline_flush(gx: &mut Gx<SoftGpu>, r: &mut Reporter<Output>) -> Result<(), ReportError> {
    start_test!(r);

    gx.wait_for_gpu();
    let before = gx.backend().registers();
    for _ in 0..8 {
        gx.force_pipeline_flush();
    }
    gx.wait_for_gpu();
    let after = gx.backend().registers();

    check!(r, before.bp == after.bp, "BP state changed");
    check!(r, before.cp == after.cp, "CP state changed");
    check!(r, before.xf == after.xf, "XF state changed");

    end_test!(r);
    Ok(())
}

fn fullscreen_quad(gx: &mut Gx<SoftGpu>, r: &mut Reporter<Output>) -> Result<(), ReportError> {
    start_test!(r);

    let draws = gx.backend().registers().draws;
    gx.draw_fullscreen_quad(0x0000_FF00);
    gx.wait_for_gpu();

    let regs = gx.backend().registers();
    check!(r, regs.fault.is_none(), "GPU fault {:?}", regs.fault);
    check!(
        r,
        regs.draws == draws + 1,
        "{} draws executed",
        regs.draws - draws
    );

    let projection = Mat4::from_diagonal(Vec4::new(1.0, 1.0, -1.0, 0.0));
    let params = Projection::Orthographic.params(&projection);
    let actual = regs.xf_f32(xf::Reg::ProjectionParam4.address());
    check!(
        r,
        actual == Some(params[4]),
        "depth scale is {actual:?}"
    );

    end_test!(r);
    Ok(())
}

fn completion(gx: &mut Gx<SoftGpu>, r: &mut Reporter<Output>) -> Result<(), ReportError> {
    start_test!(r);

    let signals = gx.completion().signals();
    let done = gx.backend().registers().done;
    for _ in 0..100 {
        gx.wait_for_gpu();
    }

    let handled = gx.completion().signals() - signals;
    let executed = gx.backend().registers().done - done;
    check!(r, handled == 100, "{handled} finish interrupts handled");
    check!(r, executed == 100, "{executed} draw-done requests executed");
    check!(
        r,
        !gx.backend().interrupt_status().finish(),
        "finish interrupt left pending"
    );

    end_test!(r);
    Ok(())
}
