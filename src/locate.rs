use std::{
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::error::{FramepipeError, FramepipeResult};

/// Environment variable that overrides encoder discovery with an explicit
/// executable path.
pub const FFMPEG_ENV: &str = "FRAMEPIPE_FFMPEG";

/// Resolves the ffmpeg executable: explicit override first, then PATH, then
/// a platform-named binary in the working directory.
pub fn locate_ffmpeg() -> FramepipeResult<PathBuf> {
    if let Ok(exe) = std::env::var(FFMPEG_ENV) {
        let exe = PathBuf::from(exe);
        if looks_like_ffmpeg(&exe) {
            return Ok(exe);
        }
        return Err(FramepipeError::init(format!(
            "'{}' (from {FFMPEG_ENV}) is not a runnable ffmpeg",
            exe.display()
        )));
    }

    if looks_like_ffmpeg(Path::new("ffmpeg")) {
        return Ok(PathBuf::from("ffmpeg"));
    }

    let local = PathBuf::from(platform_binary_name());
    if local.exists() && looks_like_ffmpeg(&local) {
        return Ok(local);
    }

    Err(FramepipeError::init(format!(
        "ffmpeg not found on PATH; install it or point {FFMPEG_ENV} at a binary"
    )))
}

/// Runs `<exe> -version` and checks that the first output line names ffmpeg.
pub fn looks_like_ffmpeg(exe: &Path) -> bool {
    let child = Command::new(exe)
        .arg("-version")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();
    let Ok(mut child) = child else {
        return false;
    };
    let first_line = child.stdout.take().map(|out| {
        let mut line = String::new();
        let _ = BufReader::new(out).read_line(&mut line);
        line
    });
    let _ = child.wait();
    first_line.is_some_and(|line| line.contains("ffmpeg"))
}

/// Filename the imageio binary distribution uses for a locally provisioned
/// ffmpeg on this platform.
fn platform_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "ffmpeg.win32.exe"
    } else if cfg!(target_os = "macos") {
        "ffmpeg.osx"
    } else if cfg!(target_pointer_width = "32") {
        "ffmpeg.linux32"
    } else {
        "ffmpeg.linux64"
    }
}
