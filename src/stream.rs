use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use serde::{Deserialize, Serialize};

use crate::{
    convert::convert,
    decode::decode_image,
    error::{FramepipeError, FramepipeResult},
    locate::locate_ffmpeg,
    parallel::Partitioner,
    source::SourceImage,
};

/// Encoder configuration captured at stream construction.
///
/// Zero/empty fields resolve to the documented defaults (25 fps, libx264,
/// yuv420p output, rgba raw input) before the subprocess is spawned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Input frame rate of the raw stream.
    pub fps: u32,
    /// Output video codec identifier.
    pub codec: String,
    /// Output pixel format identifier.
    pub pix_fmt: String,
    /// Pixel format of the raw bytes written to the pipe.
    pub raw_pix_fmt: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            fps: 25,
            codec: "libx264".into(),
            pix_fmt: "yuv420p".into(),
            raw_pix_fmt: "rgba".into(),
        }
    }
}

impl EncodeOptions {
    fn resolved(mut self) -> Self {
        let defaults = Self::default();
        if self.fps == 0 {
            self.fps = defaults.fps;
        }
        if self.codec.is_empty() {
            self.codec = defaults.codec;
        }
        if self.pix_fmt.is_empty() {
            self.pix_fmt = defaults.pix_fmt;
        }
        if self.raw_pix_fmt.is_empty() {
            self.raw_pix_fmt = defaults.raw_pix_fmt;
        }
        self
    }
}

/// Builds the raw-video argument vector for one encoder run.
///
/// Argument order is a contract with the ffmpeg binary: input flags (raw
/// video, geometry, raw pixel format, input rate), stdin as the source, then
/// output flags (codec, pixel format, fixed crf 25, fixed output rate 50,
/// warning-level logging) with the destination path last.
pub fn raw_video_args(
    geometry: (u32, u32),
    options: &EncodeOptions,
    output: &Path,
) -> Vec<String> {
    let (width, height) = geometry;
    vec![
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-vcodec".into(),
        "rawvideo".into(),
        "-s".into(),
        format!("{width}x{height}"),
        "-pix_fmt".into(),
        options.raw_pix_fmt.clone(),
        "-r".into(),
        options.fps.to_string(),
        "-i".into(),
        "-".into(),
        "-an".into(),
        "-vcodec".into(),
        options.codec.clone(),
        "-pix_fmt".into(),
        options.pix_fmt.clone(),
        "-crf".into(),
        "25".into(),
        "-r".into(),
        "50".into(),
        "-v".into(),
        "warning".into(),
        output.display().to_string(),
    ]
}

/// Spawns an encoder run and hands back its input sink. The seam that lets
/// tests replace the subprocess with a mock.
pub trait EncoderSpawner: Send {
    fn spawn(
        &self,
        geometry: (u32, u32),
        options: &EncodeOptions,
        output: &Path,
    ) -> FramepipeResult<Box<dyn EncoderSink>>;
}

/// Write end of a running encoder.
pub trait EncoderSink: Send {
    /// Writes one full frame's bytes to the encoder input. Blocks while the
    /// encoder is not draining its pipe; that backpressure is the only flow
    /// control.
    fn write_frame(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Closes the input pipe (end-of-stream) and blocks until the encoder
    /// exits. The process is reaped even when closing the pipe fails.
    fn finish(self: Box<Self>) -> FramepipeResult<()>;
}

/// Production spawner: resolves ffmpeg via [`locate_ffmpeg`] and runs it with
/// [`raw_video_args`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegSpawner;

impl EncoderSpawner for FfmpegSpawner {
    fn spawn(
        &self,
        geometry: (u32, u32),
        options: &EncodeOptions,
        output: &Path,
    ) -> FramepipeResult<Box<dyn EncoderSink>> {
        let exe = locate_ffmpeg()?;
        tracing::info!(
            exe = %exe.display(),
            width = geometry.0,
            height = geometry.1,
            output = %output.display(),
            "starting encoder subprocess"
        );
        let mut child = Command::new(&exe)
            .args(raw_video_args(geometry, options, output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FramepipeError::init(format!("spawn '{}': {e}", exe.display())))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FramepipeError::init("encoder stdin was not piped"))?;
        Ok(Box::new(FfmpegSink {
            child,
            stdin: Some(stdin),
        }))
    }
}

struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl EncoderSink for FfmpegSink {
    fn write_frame(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(bytes),
            None => Err(std::io::Error::other("encoder pipe already closed")),
        }
    }

    fn finish(mut self: Box<Self>) -> FramepipeResult<()> {
        // Flush, then drop the pipe to signal end-of-stream. A flush failure
        // is surfaced, but only after the process has been reaped so no
        // zombie is left behind.
        let close_err = match self.stdin.take() {
            Some(mut stdin) => stdin.flush().err(),
            None => None,
        };

        let output = self
            .child
            .wait_with_output()
            .map_err(|e| FramepipeError::write(format!("wait for encoder exit: {e}")))?;

        if let Some(e) = close_err {
            return Err(FramepipeError::write(format!("close encoder pipe: {e}")));
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FramepipeError::write(format!(
                "encoder exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Streams still images into one encoder subprocess as raw RGBA video.
///
/// Created unopened; the first successful submit spawns the encoder and
/// freezes the stream geometry for its whole life. [`close`](Self::close)
/// ends the raw stream and waits for the encoder to exit.
///
/// This is a single-writer sequential pipe: submissions take `&mut self`, so
/// sharing a stream across threads requires external synchronization.
pub struct FrameStream {
    output: PathBuf,
    options: EncodeOptions,
    partitioner: Partitioner,
    spawner: Box<dyn EncoderSpawner>,
    geometry: Option<(u32, u32)>,
    sink: Option<Box<dyn EncoderSink>>,
    closed: bool,
}

impl FrameStream {
    pub fn new(output: impl Into<PathBuf>, options: EncodeOptions) -> Self {
        Self::with_spawner(output, options, Box::new(FfmpegSpawner))
    }

    /// Builds a stream around a custom spawner; tests use this to observe
    /// pipe traffic without a real subprocess.
    pub fn with_spawner(
        output: impl Into<PathBuf>,
        options: EncodeOptions,
        spawner: Box<dyn EncoderSpawner>,
    ) -> Self {
        Self {
            output: output.into(),
            options: options.resolved(),
            partitioner: Partitioner::new(),
            spawner,
            geometry: None,
            sink: None,
            closed: false,
        }
    }

    /// Pre-sizes an unopened stream. The first frame must then match this
    /// geometry exactly.
    pub fn with_geometry(mut self, width: u32, height: u32) -> Self {
        self.geometry = Some((width, height));
        self
    }

    /// Replaces the conversion partitioner (e.g. [`Partitioner::serial`]).
    pub fn with_partitioner(mut self, partitioner: Partitioner) -> Self {
        self.partitioner = partitioner;
        self
    }

    /// The frozen geometry, once set.
    pub fn geometry(&self) -> Option<(u32, u32)> {
        self.geometry
    }

    /// True once the encoder subprocess is running.
    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Decodes an image file and submits it as the next frame.
    pub fn submit_path(&mut self, path: impl AsRef<Path>) -> FramepipeResult<()> {
        let image = decode_image(path)?;
        self.submit_image(&image)
    }

    /// Submits one decoded frame, lazily starting the encoder on the first.
    ///
    /// A failed encoder start leaves the stream unopened: geometry is not
    /// frozen and a later submit retries initialization.
    pub fn submit_image(&mut self, image: &SourceImage) -> FramepipeResult<()> {
        if self.closed {
            return Err(FramepipeError::not_open("stream is already closed"));
        }

        let frame_dims = image.bounds().dimensions();
        let geometry = self.geometry.unwrap_or(frame_dims);

        if self.sink.is_none() {
            let sink = self.spawner.spawn(geometry, &self.options, &self.output)?;
            self.geometry = Some(geometry);
            self.sink = Some(sink);
        }

        if frame_dims != geometry {
            return Err(FramepipeError::geometry_mismatch(format!(
                "stream is locked to {}x{} but the frame is {}x{}; \
                 all frames in one stream share one geometry",
                geometry.0, geometry.1, frame_dims.0, frame_dims.1
            )));
        }

        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| FramepipeError::not_open("encoder pipe is not open"))?;
        let frame = convert(image, &self.partitioner);
        sink.write_frame(&frame.data).map_err(|e| {
            FramepipeError::write(format!("write {} frame bytes: {e}", frame.data.len()))
        })?;
        tracing::debug!(bytes = frame.data.len(), "frame written to encoder pipe");
        Ok(())
    }

    /// Closes the encoder input pipe and blocks until the subprocess exits.
    ///
    /// Errors with [`FramepipeError::NotOpen`] if no frame was ever submitted
    /// or the stream was already closed; `close` is not idempotent.
    pub fn close(&mut self) -> FramepipeResult<()> {
        let Some(sink) = self.sink.take() else {
            return Err(FramepipeError::not_open(if self.closed {
                "stream is already closed"
            } else {
                "no frame was ever submitted"
            }));
        };
        self.closed = true;
        tracing::debug!(output = %self.output.display(), "closing encoder stream");
        sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_resolve_unset_fields_to_defaults() {
        let opts = EncodeOptions {
            fps: 0,
            codec: String::new(),
            pix_fmt: String::new(),
            raw_pix_fmt: String::new(),
        }
        .resolved();
        assert_eq!(opts, EncodeOptions::default());

        let custom = EncodeOptions {
            fps: 30,
            codec: "libx265".into(),
            ..Default::default()
        }
        .resolved();
        assert_eq!(custom.fps, 30);
        assert_eq!(custom.codec, "libx265");
        assert_eq!(custom.pix_fmt, "yuv420p");
    }

    #[test]
    fn raw_video_args_order_is_fixed() {
        let args = raw_video_args((64, 48), &EncodeOptions::default(), Path::new("out.mp4"));
        assert_eq!(
            args,
            vec![
                "-y", "-f", "rawvideo", "-vcodec", "rawvideo", "-s", "64x48", "-pix_fmt",
                "rgba", "-r", "25", "-i", "-", "-an", "-vcodec", "libx264", "-pix_fmt",
                "yuv420p", "-crf", "25", "-r", "50", "-v", "warning", "out.mp4",
            ]
        );
    }
}
