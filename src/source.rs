/// Rectangular pixel bounds of a decoded image: an origin offset into the
/// backing sample buffers plus the visible width/height.
///
/// Sample buffers are indexed in absolute image coordinates, so a sub-view
/// can share its parent's buffer by carrying the parent's stride and a
/// nonzero origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelBounds {
    pub fn of(width: u32, height: u32) -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            width,
            height,
        }
    }

    pub fn with_origin(min_x: u32, min_y: u32, width: u32, height: u32) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A packed sample buffer with a fixed byte stride per image row.
#[derive(Clone, Debug)]
pub struct PackedPlane {
    pub pix: Vec<u8>,
    /// Bytes per backing-buffer row (may exceed `width * bytes_per_pixel`
    /// for sub-views).
    pub stride: usize,
}

impl PackedPlane {
    /// Byte offset of the sample at absolute coordinates `(x, y)`.
    pub fn index(&self, x: u32, y: u32, bytes_per_pixel: usize) -> usize {
        y as usize * self.stride + x as usize * bytes_per_pixel
    }
}

/// Chroma subsampling ratios for planar luma/chroma images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaSubsampling {
    S444,
    S422,
    S420,
    S440,
    S411,
    S410,
}

/// Planar Y'CbCr storage: full-resolution luma plus two chroma planes whose
/// sample density is governed by the subsampling ratio.
#[derive(Clone, Debug)]
pub struct YuvPlanes {
    pub y: Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
    pub y_stride: usize,
    pub c_stride: usize,
    pub subsampling: ChromaSubsampling,
}

impl YuvPlanes {
    /// Index into the luma plane for absolute coordinates `(x, y)`.
    pub fn luma_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.y_stride + x as usize
    }

    /// Index into either chroma plane for absolute coordinates `(x, y)`,
    /// applying the subsampling coordinate mapping.
    pub fn chroma_index(&self, x: u32, y: u32) -> usize {
        let (x, y) = (x as usize, y as usize);
        match self.subsampling {
            ChromaSubsampling::S444 => y * self.c_stride + x,
            ChromaSubsampling::S422 => y * self.c_stride + x / 2,
            ChromaSubsampling::S420 => (y / 2) * self.c_stride + x / 2,
            ChromaSubsampling::S440 => (y / 2) * self.c_stride + x,
            ChromaSubsampling::S411 => y * self.c_stride + x / 4,
            ChromaSubsampling::S410 => (y / 2) * self.c_stride + x / 4,
        }
    }
}

/// Palette-indexed storage: one index byte per pixel plus the palette itself,
/// kept in the wide encoding so resolution happens once per conversion.
#[derive(Clone, Debug)]
pub struct IndexedPlane {
    pub pix: Vec<u8>,
    pub stride: usize,
    pub palette: Vec<WidePixel>,
}

impl IndexedPlane {
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride + x as usize
    }
}

/// A single sample in the wide interchange encoding: alpha-premultiplied,
/// 16 bits per channel. This is what generic sources and palette entries
/// report before narrowing to the canonical straight-alpha layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WidePixel {
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub a: u16,
}

impl WidePixel {
    /// Widens and premultiplies a straight-alpha 8-bit pixel.
    pub fn from_straight_rgba8(px: [u8; 4]) -> Self {
        let a = u32::from(px[3]) * 0x101;
        let widen = |c: u8| ((u32::from(c) * 0x101) * a / 0xffff) as u16;
        Self {
            r: widen(px[0]),
            g: widen(px[1]),
            b: widen(px[2]),
            a: a as u16,
        }
    }

    /// Narrows to straight-alpha 8-bit RGBA, dividing the premultiplied
    /// channels back out. Zero alpha maps to transparent black.
    pub fn to_straight_rgba8(self) -> [u8; 4] {
        match self.a {
            0 => [0, 0, 0, 0],
            0xffff => [
                (self.r >> 8) as u8,
                (self.g >> 8) as u8,
                (self.b >> 8) as u8,
                0xff,
            ],
            a => {
                let narrow = |c: u16| ((u32::from(c) * 0xffff / u32::from(a)) >> 8) as u8;
                [
                    narrow(self.r),
                    narrow(self.g),
                    narrow(self.b),
                    (a >> 8) as u8,
                ]
            }
        }
    }
}

/// Per-pixel accessor for sources outside the closed variant set. Correct for
/// anything, slower than the dedicated paths.
pub trait PixelQuery: Send + Sync {
    /// Wide premultiplied sample at absolute coordinates `(x, y)`.
    fn pixel(&self, x: u32, y: u32) -> WidePixel;
}

/// The closed set of pixel encodings with dedicated conversion paths, plus a
/// generic fallback arm so no decoded image is ever rejected.
pub enum PixelModel {
    /// Packed straight-alpha RGBA, 8 bits per channel, 4 bytes per pixel.
    Rgba8(PackedPlane),
    /// Packed straight-alpha RGBA, 16 bits per channel big-endian, 8 bytes
    /// per pixel.
    Rgba16(PackedPlane),
    /// Packed premultiplied RGBA, 8 bits per channel.
    PremulRgba8(PackedPlane),
    /// Packed premultiplied RGBA, 16 bits per channel big-endian.
    PremulRgba16(PackedPlane),
    /// Single-channel grayscale, 1 byte per pixel.
    Gray8(PackedPlane),
    /// Single-channel grayscale, 16 bits big-endian, 2 bytes per pixel.
    Gray16(PackedPlane),
    /// Planar Y'CbCr with chroma subsampling.
    Yuv(YuvPlanes),
    /// Palette-indexed, one index byte per pixel.
    Indexed(IndexedPlane),
    /// Anything else, answered per pixel through [`PixelQuery`].
    Generic(Box<dyn PixelQuery>),
}

/// A decoded still image: bounds plus a tagged pixel-model variant. The
/// converter only reads it and never retains it past the call.
pub struct SourceImage {
    bounds: PixelBounds,
    model: PixelModel,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let model = match self.model {
            PixelModel::Rgba8(_) => "Rgba8",
            PixelModel::Rgba16(_) => "Rgba16",
            PixelModel::PremulRgba8(_) => "PremulRgba8",
            PixelModel::PremulRgba16(_) => "PremulRgba16",
            PixelModel::Gray8(_) => "Gray8",
            PixelModel::Gray16(_) => "Gray16",
            PixelModel::Yuv(_) => "Yuv",
            PixelModel::Indexed(_) => "Indexed",
            PixelModel::Generic(_) => "Generic",
        };
        f.debug_struct("SourceImage")
            .field("bounds", &self.bounds)
            .field("model", &model)
            .finish()
    }
}

impl SourceImage {
    pub fn new(bounds: PixelBounds, model: PixelModel) -> Self {
        Self { bounds, model }
    }

    /// Packed straight-alpha RGBA8 image with origin (0, 0).
    pub fn rgba8(width: u32, height: u32, pix: Vec<u8>) -> Self {
        debug_assert_eq!(pix.len(), width as usize * height as usize * 4);
        Self::new(
            PixelBounds::of(width, height),
            PixelModel::Rgba8(PackedPlane {
                pix,
                stride: width as usize * 4,
            }),
        )
    }

    /// Packed premultiplied RGBA8 image with origin (0, 0).
    pub fn premul_rgba8(width: u32, height: u32, pix: Vec<u8>) -> Self {
        debug_assert_eq!(pix.len(), width as usize * height as usize * 4);
        Self::new(
            PixelBounds::of(width, height),
            PixelModel::PremulRgba8(PackedPlane {
                pix,
                stride: width as usize * 4,
            }),
        )
    }

    /// Single-channel 8-bit grayscale image with origin (0, 0).
    pub fn gray8(width: u32, height: u32, pix: Vec<u8>) -> Self {
        debug_assert_eq!(pix.len(), width as usize * height as usize);
        Self::new(
            PixelBounds::of(width, height),
            PixelModel::Gray8(PackedPlane {
                pix,
                stride: width as usize,
            }),
        )
    }

    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    pub fn model(&self) -> &PixelModel {
        &self.model
    }
}
