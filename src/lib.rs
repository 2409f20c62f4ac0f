//! Streams still images of mixed pixel formats into an ffmpeg raw-video pipe.
//!
//! Every submitted image is normalized to one canonical layout (packed 8-bit
//! straight-alpha RGBA) by [`convert`], parallelized over rows, and written to
//! the stdin pipe of a lazily spawned encoder subprocess owned by
//! [`FrameStream`].

#![forbid(unsafe_code)]

pub mod convert;
pub mod decode;
pub mod error;
pub mod locate;
pub mod parallel;
pub mod source;
pub mod stream;

pub use convert::{FrameRgba, convert};
pub use decode::{decode_image, source_from_dynamic};
pub use error::{FramepipeError, FramepipeResult};
pub use locate::locate_ffmpeg;
pub use parallel::Partitioner;
pub use source::{
    ChromaSubsampling, IndexedPlane, PackedPlane, PixelBounds, PixelModel, PixelQuery,
    SourceImage, WidePixel, YuvPlanes,
};
pub use stream::{EncodeOptions, EncoderSink, EncoderSpawner, FrameStream};
