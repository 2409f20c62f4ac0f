use crate::{
    parallel::Partitioner,
    source::{
        IndexedPlane, PackedPlane, PixelBounds, PixelModel, PixelQuery, SourceImage, YuvPlanes,
    },
};

/// The canonical frame layout every conversion targets: packed 8-bit RGBA,
/// straight (non-premultiplied) alpha, row-major, `width * height * 4` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRgba {
    /// Size in bytes of one frame at the given geometry.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }
}

/// Converts a decoded image into a freshly allocated [`FrameRgba`] sized to
/// the image's own bounds.
///
/// Pure: reads `src`, returns the buffer, keeps no state across calls. Rows
/// are self-contained, so every variant is parallelized over destination rows
/// through the partitioner; partitioning never changes the output.
pub fn convert(src: &SourceImage, par: &Partitioner) -> FrameRgba {
    let bounds = src.bounds();
    let (width, height) = bounds.dimensions();
    let row_len = width as usize * 4;
    let mut data = vec![0u8; FrameRgba::byte_len(width, height)];

    if !data.is_empty() {
        match src.model() {
            PixelModel::Rgba8(p) => fill_rgba8(&mut data, row_len, bounds, p, par),
            PixelModel::Rgba16(p) => fill_rgba16(&mut data, row_len, bounds, p, par),
            PixelModel::PremulRgba8(p) => fill_premul(&mut data, row_len, bounds, p, par, 1),
            PixelModel::PremulRgba16(p) => fill_premul(&mut data, row_len, bounds, p, par, 2),
            PixelModel::Gray8(p) => fill_gray(&mut data, row_len, bounds, p, par, 1),
            PixelModel::Gray16(p) => fill_gray(&mut data, row_len, bounds, p, par, 2),
            PixelModel::Yuv(p) => fill_yuv(&mut data, row_len, bounds, p, par),
            PixelModel::Indexed(p) => fill_indexed(&mut data, row_len, bounds, p, par),
            PixelModel::Generic(q) => fill_generic(&mut data, row_len, bounds, q.as_ref(), par),
        }
    }

    FrameRgba {
        width,
        height,
        data,
    }
}

/// Straight contiguous row copy; the fast path.
fn fill_rgba8(dst: &mut [u8], row_len: usize, b: PixelBounds, p: &PackedPlane, par: &Partitioner) {
    par.run_rows(dst, row_len, |start_row, chunk| {
        for (i, out) in chunk.chunks_exact_mut(row_len).enumerate() {
            let y = b.min_y + (start_row + i) as u32;
            let si = p.index(b.min_x, y, 4);
            out.copy_from_slice(&p.pix[si..si + row_len]);
        }
    });
}

/// 16-bit big-endian channels at byte offsets 0,2,4,6; keep each high byte.
fn fill_rgba16(dst: &mut [u8], row_len: usize, b: PixelBounds, p: &PackedPlane, par: &Partitioner) {
    par.run_rows(dst, row_len, |start_row, chunk| {
        for (i, out) in chunk.chunks_exact_mut(row_len).enumerate() {
            let y = b.min_y + (start_row + i) as u32;
            let mut si = p.index(b.min_x, y, 8);
            for px in out.chunks_exact_mut(4) {
                px[0] = p.pix[si];
                px[1] = p.pix[si + 2];
                px[2] = p.pix[si + 4];
                px[3] = p.pix[si + 6];
                si += 8;
            }
        }
    });
}

// Truncating division, only called with a != 0. The truncation is part of the
// output contract; golden fixtures depend on it.
fn unpremultiply(c: u8, a: u8) -> u8 {
    (u16::from(c) * 0xff / u16::from(a)) as u8
}

/// Premultiplied RGBA with `sample_step` bytes per channel (1 for 8-bit, 2
/// for 16-bit big-endian, reading high bytes).
fn fill_premul(
    dst: &mut [u8],
    row_len: usize,
    b: PixelBounds,
    p: &PackedPlane,
    par: &Partitioner,
    sample_step: usize,
) {
    let bpp = 4 * sample_step;
    par.run_rows(dst, row_len, |start_row, chunk| {
        for (i, out) in chunk.chunks_exact_mut(row_len).enumerate() {
            let y = b.min_y + (start_row + i) as u32;
            let mut si = p.index(b.min_x, y, bpp);
            for px in out.chunks_exact_mut(4) {
                let a = p.pix[si + 3 * sample_step];
                px[3] = a;
                match a {
                    0 => {
                        px[0] = 0;
                        px[1] = 0;
                        px[2] = 0;
                    }
                    0xff => {
                        px[0] = p.pix[si];
                        px[1] = p.pix[si + sample_step];
                        px[2] = p.pix[si + 2 * sample_step];
                    }
                    a => {
                        px[0] = unpremultiply(p.pix[si], a);
                        px[1] = unpremultiply(p.pix[si + sample_step], a);
                        px[2] = unpremultiply(p.pix[si + 2 * sample_step], a);
                    }
                }
                si += bpp;
            }
        }
    });
}

/// Grayscale: replicate the (high) byte into R,G,B; alpha forced opaque.
fn fill_gray(
    dst: &mut [u8],
    row_len: usize,
    b: PixelBounds,
    p: &PackedPlane,
    par: &Partitioner,
    bpp: usize,
) {
    par.run_rows(dst, row_len, |start_row, chunk| {
        for (i, out) in chunk.chunks_exact_mut(row_len).enumerate() {
            let y = b.min_y + (start_row + i) as u32;
            let mut si = p.index(b.min_x, y, bpp);
            for px in out.chunks_exact_mut(4) {
                let c = p.pix[si];
                px[0] = c;
                px[1] = c;
                px[2] = c;
                px[3] = 0xff;
                si += bpp;
            }
        }
    });
}

/// Fixed-point BT.601 full-range Y'CbCr to RGB.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let yy = i32::from(y) * 0x10101;
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;
    let clamp = |v: i32| (v >> 16).clamp(0, 255) as u8;
    (
        clamp(yy + 91881 * cr),
        clamp(yy - 22554 * cb - 46802 * cr),
        clamp(yy + 116130 * cb),
    )
}

fn fill_yuv(dst: &mut [u8], row_len: usize, b: PixelBounds, p: &YuvPlanes, par: &Partitioner) {
    par.run_rows(dst, row_len, |start_row, chunk| {
        for (i, out) in chunk.chunks_exact_mut(row_len).enumerate() {
            let y = b.min_y + (start_row + i) as u32;
            for (dx, px) in out.chunks_exact_mut(4).enumerate() {
                let x = b.min_x + dx as u32;
                let ci = p.chroma_index(x, y);
                let (r, g, bl) = ycbcr_to_rgb(p.y[p.luma_index(x, y)], p.cb[ci], p.cr[ci]);
                px[0] = r;
                px[1] = g;
                px[2] = bl;
                px[3] = 0xff;
            }
        }
    });
}

fn fill_indexed(
    dst: &mut [u8],
    row_len: usize,
    b: PixelBounds,
    p: &IndexedPlane,
    par: &Partitioner,
) {
    // Resolve the whole palette once, outside the row loop; rows then only
    // index the resolved table.
    let lut: Vec<[u8; 4]> = p.palette.iter().map(|c| c.to_straight_rgba8()).collect();
    par.run_rows(dst, row_len, |start_row, chunk| {
        for (i, out) in chunk.chunks_exact_mut(row_len).enumerate() {
            let y = b.min_y + (start_row + i) as u32;
            let mut si = p.index(b.min_x, y);
            for px in out.chunks_exact_mut(4) {
                let entry = lut
                    .get(usize::from(p.pix[si]))
                    .copied()
                    .unwrap_or([0, 0, 0, 0]);
                px.copy_from_slice(&entry);
                si += 1;
            }
        }
    });
}

/// Fallback arm: per-pixel query through the source's own accessor. Handles
/// any variant, at per-pixel conversion cost.
fn fill_generic(
    dst: &mut [u8],
    row_len: usize,
    b: PixelBounds,
    q: &dyn PixelQuery,
    par: &Partitioner,
) {
    par.run_rows(dst, row_len, |start_row, chunk| {
        for (i, out) in chunk.chunks_exact_mut(row_len).enumerate() {
            let y = b.min_y + (start_row + i) as u32;
            for (dx, px) in out.chunks_exact_mut(4).enumerate() {
                let x = b.min_x + dx as u32;
                px.copy_from_slice(&q.pixel(x, y).to_straight_rgba8());
            }
        }
    });
}
