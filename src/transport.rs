//! Audio transport.
//!
//! The navigator never decodes audio itself. It drives a [`Transport`]: start a
//! path, pause, resume, seek, stop, and ask for the elapsed position. At most
//! one file plays at a time; `play` implicitly stops whatever was playing.
//!
//! [`RecordingTransport`] is an in-memory double used by tests and by headless
//! callers. With the `rodio-output` feature, [`RodioTransport`] drives the
//! default audio device.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Audio engine consumed by the [`crate::navigator::Navigator`].
pub trait Transport {
    /// Start decoding `path` from the beginning, replacing the current stream.
    fn play(&mut self, path: &Path) -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// True while a stream is loaded, not paused and not drained.
    fn is_playing(&self) -> bool;

    /// Elapsed seconds in the current stream. May read 0 briefly after a seek.
    fn position(&self) -> f64;

    /// Jump to `seconds` inside `path`, loading it first if it is not current.
    fn seek(&mut self, path: &Path, seconds: f64) -> Result<()>;

    fn stop(&mut self);

    /// Length of the current stream when the decoder knows it.
    fn duration(&self) -> Option<f64> {
        None
    }
}

/// A command observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Play(PathBuf),
    Pause,
    Resume,
    Seek(PathBuf, f64),
    Stop,
}

/// Transport that plays nothing and remembers what it was told.
///
/// The reported position is scripted with [`RecordingTransport::set_position`],
/// and selected paths can be made to fail like an unsupported codec would.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    commands: Vec<TransportCommand>,
    current: Option<PathBuf>,
    playing: bool,
    position: f64,
    duration: Option<f64>,
    failing: HashSet<PathBuf>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `play` or `seek` of `path` fail.
    pub fn fail_on(&mut self, path: impl Into<PathBuf>) {
        self.failing.insert(path.into());
    }

    pub fn set_position(&mut self, seconds: f64) {
        self.position = seconds;
    }

    pub fn set_duration(&mut self, seconds: Option<f64>) {
        self.duration = seconds;
    }

    /// Simulate the stream draining on its own.
    pub fn finish(&mut self) {
        self.playing = false;
    }

    #[must_use]
    pub fn commands(&self) -> &[TransportCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<TransportCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Paths passed to `play`, in order.
    #[must_use]
    pub fn played(&self) -> Vec<&Path> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                TransportCommand::Play(path) => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn check(&mut self, path: &Path) -> Result<()> {
        if self.failing.contains(path) {
            self.current = None;
            self.playing = false;
            return Err(Error::transport(path, "unsupported codec"));
        }
        Ok(())
    }
}

impl Transport for RecordingTransport {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.commands.push(TransportCommand::Play(path.to_path_buf()));
        self.check(path)?;
        self.current = Some(path.to_path_buf());
        self.playing = true;
        self.position = 0.0;
        Ok(())
    }

    fn pause(&mut self) {
        self.commands.push(TransportCommand::Pause);
        self.playing = false;
    }

    fn resume(&mut self) {
        self.commands.push(TransportCommand::Resume);
        self.playing = self.current.is_some();
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, path: &Path, seconds: f64) -> Result<()> {
        self.commands
            .push(TransportCommand::Seek(path.to_path_buf(), seconds));
        self.check(path)?;
        if self.current.as_deref() != Some(path) {
            self.current = Some(path.to_path_buf());
            self.playing = true;
        }
        // Mimics a real decoder restarting after a seek.
        self.position = 0.0;
        Ok(())
    }

    fn stop(&mut self) {
        self.commands.push(TransportCommand::Stop);
        self.current = None;
        self.playing = false;
        self.position = 0.0;
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}

#[cfg(feature = "rodio-output")]
pub use self::rodio_output::RodioTransport;

#[cfg(feature = "rodio-output")]
mod rodio_output {
    use super::{Error, Path, PathBuf, Result, Transport};
    use log::{debug, warn};
    use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
    use std::fs::File;
    use std::io::BufReader;
    use std::time::Duration;

    /// Transport backed by the default output device.
    pub struct RodioTransport {
        // Dropping the stream silences every sink attached to it.
        stream: OutputStream,
        sink: Option<Sink>,
        current: Option<PathBuf>,
        duration: Option<f64>,
    }

    impl RodioTransport {
        pub fn open_default() -> Result<Self> {
            let stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| Error::transport("<default output>", e.to_string()))?;
            debug!("Opened default audio output");
            Ok(Self {
                stream,
                sink: None,
                current: None,
                duration: None,
            })
        }

        fn load(&mut self, path: &Path) -> Result<()> {
            self.stop();

            let file = File::open(path).map_err(|e| Error::transport(path, e.to_string()))?;
            let decoder = Decoder::new(BufReader::new(file))
                .map_err(|e| Error::transport(path, format!("decode failed: {e}")))?;
            self.duration = decoder.total_duration().map(|d| d.as_secs_f64());

            let sink = Sink::connect_new(self.stream.mixer());
            sink.append(decoder);
            sink.play();

            self.sink = Some(sink);
            self.current = Some(path.to_path_buf());
            Ok(())
        }
    }

    impl Transport for RodioTransport {
        fn play(&mut self, path: &Path) -> Result<()> {
            self.load(path)?;
            debug!("Playing {}", path.display());
            Ok(())
        }

        fn pause(&mut self) {
            if let Some(sink) = &self.sink {
                sink.pause();
            }
        }

        fn resume(&mut self) {
            if let Some(sink) = &self.sink {
                sink.play();
            }
        }

        fn is_playing(&self) -> bool {
            self.sink
                .as_ref()
                .is_some_and(|sink| !sink.is_paused() && !sink.empty())
        }

        fn position(&self) -> f64 {
            self.sink
                .as_ref()
                .map_or(0.0, |sink| sink.get_pos().as_secs_f64())
        }

        fn seek(&mut self, path: &Path, seconds: f64) -> Result<()> {
            if self.current.as_deref() != Some(path) {
                self.load(path)?;
            }
            if let Some(sink) = &self.sink {
                sink.try_seek(Duration::from_secs_f64(seconds.max(0.0)))
                    .map_err(|e| {
                        warn!("Seek in {} failed: {e}", path.display());
                        Error::transport(path, format!("seek failed: {e}"))
                    })?;
            }
            Ok(())
        }

        fn stop(&mut self) {
            if let Some(sink) = self.sink.take() {
                sink.stop();
            }
            self.current = None;
            self.duration = None;
        }

        fn duration(&self) -> Option<f64> {
            self.duration
        }
    }
}
