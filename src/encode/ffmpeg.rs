use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use tiny_skia::Pixmap;

pub struct EncoderSettings<'a> {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: &'a str,
    pub pix_fmt: &'a str,
    pub crf: u32,
    pub bitrate: Option<&'a str>,
}

pub struct FfmpegEncoder {
    child: Child,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

fn encoder_args(output_path: &Path, input_audio: &Path, settings: &EncoderSettings) -> Vec<OsString> {
    let video_size = format!("{}x{}", settings.width, settings.height);
    let framerate = settings.fps.to_string();
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel", "error",
        "-nostats",
        "-y",
        "-f", "rawvideo",
        "-pixel_format", "rgba",
        "-video_size", video_size.as_str(),
        "-framerate", framerate.as_str(),
        "-i", "pipe:0",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(input_audio.as_os_str().to_owned());
    args.extend(["-c:v", settings.codec, "-pix_fmt", settings.pix_fmt].map(OsString::from));

    if let Some(br) = settings.bitrate {
        args.extend(["-b:v", br].map(OsString::from));
    } else {
        args.extend(["-crf".to_string(), settings.crf.to_string()].map(OsString::from));
        args.extend(["-preset", "medium"].map(OsString::from));
    }

    args.extend(["-c:a", "aac", "-b:a", "192k", "-shortest"].map(OsString::from));
    args.push(output_path.as_os_str().to_owned());
    args
}

impl FfmpegEncoder {
    pub fn new(output_path: &Path, input_audio: &Path, settings: &EncoderSettings) -> Result<Self> {
        let mut child = Command::new("ffmpeg")
            .args(encoder_args(output_path, input_audio, settings))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;
        // ffmpeg blocks once the stderr pipe is full
        let stderr = child.stderr.take().map(drain);

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width, settings.height, settings.fps, settings.codec
        );

        Ok(Self {
            child,
            stderr,
            width: settings.width,
            height: settings.height,
            rgba: Vec::with_capacity(settings.width as usize * settings.height as usize * 4),
        })
    }

    /// Send one canvas frame. The canvas is premultiplied; ffmpeg gets
    /// straight RGBA.
    pub fn write_pixmap(&mut self, pixmap: &Pixmap) -> Result<()> {
        if pixmap.width() != self.width || pixmap.height() != self.height {
            anyhow::bail!(
                "Frame is {}x{} but the encoder was started at {}x{}",
                pixmap.width(), pixmap.height(), self.width, self.height
            );
        }
        demultiply_into(pixmap, &mut self.rgba);
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(&self.rgba).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let status = self.child.wait().context("Failed to wait for ffmpeg")?;
        let stderr = self.stderr.take().and_then(|h| h.join().ok()).unwrap_or_default();

        if !status.success() {
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

/// Read a pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf) {
            log::warn!("Failed to read ffmpeg output: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn demultiply_into(pixmap: &Pixmap, out: &mut Vec<u8>) {
    out.clear();
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::Color;

    #[test]
    fn frames_are_demultiplied() {
        let mut pixmap = Pixmap::new(2, 1).unwrap();
        pixmap.fill(Color::from_rgba8(200, 100, 0, 128));
        let mut out = Vec::new();
        demultiply_into(&pixmap, &mut out);
        assert_eq!(out.len(), 8);
        assert_eq!(out[3], 128);
        assert!(out[0].abs_diff(200) <= 2, "{}", out[0]);
        assert!(out[1].abs_diff(100) <= 2, "{}", out[1]);
    }

    #[test]
    fn bitrate_replaces_crf() {
        let settings = EncoderSettings {
            width: 640,
            height: 270,
            fps: 30,
            codec: "libx264",
            pix_fmt: "yuv420p",
            crf: 18,
            bitrate: Some("5M"),
        };
        let args = encoder_args(Path::new("out.mp4"), Path::new("in.wav"), &settings);
        assert!(args.iter().any(|a| a == "-b:v"));
        assert!(!args.iter().any(|a| a == "-crf"));
        assert_eq!(args.last().map(|a| a.as_os_str()), Some(Path::new("out.mp4").as_os_str()));
        assert!(args.iter().any(|a| a == "640x270"));
    }

    #[test]
    fn progress_output_is_silenced() {
        let settings = EncoderSettings {
            width: 320,
            height: 240,
            fps: 60,
            codec: "libx264",
            pix_fmt: "yuv420p",
            crf: 23,
            bitrate: None,
        };
        let args = encoder_args(Path::new("out.mp4"), Path::new("in.wav"), &settings);
        let level = args.iter().position(|a| a == "-loglevel").unwrap();
        assert_eq!(args[level + 1], "error");
        assert!(args.iter().any(|a| a == "-nostats"));
        // global options come before the first input
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(level < input);
    }

    #[test]
    fn stderr_larger_than_a_pipe_buffer_is_collected() {
        let noise = "frame=  1 fps=0.0 q=0.0 size=0kB\n".repeat(8192);
        let handle = drain(std::io::Cursor::new(noise.clone().into_bytes()));
        assert_eq!(handle.join().unwrap(), noise);
    }
}
