use anyhow::{Context, Result};
use rodio::Source;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub trait AudioOutput {
    /// Sets the source without starting playback.
    fn load(&mut self, path: &Path) -> Result<()>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    fn source(&self) -> Option<&Path>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    /// Positions past the end are clamped to the duration when it is known.
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn output_name(&self) -> String;
    fn is_finished(&self) -> bool;
}

impl<T: AudioOutput + ?Sized> AudioOutput for Box<T> {
    fn load(&mut self, path: &Path) -> Result<()> {
        (**self).load(path)
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn source(&self) -> Option<&Path> {
        (**self).source()
    }

    fn position(&self) -> Option<Duration> {
        (**self).position()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        (**self).seek_to(position)
    }

    fn volume(&self) -> f32 {
        (**self).volume()
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume)
    }

    fn output_name(&self) -> String {
        (**self).output_name()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }
}

pub struct RodioOutput {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
    track_duration: Option<Duration>,
    volume: f32,
}

impl RodioOutput {
    pub fn new() -> Result<Self> {
        let mut stream = with_silenced_stderr(|| {
            OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")?
                .with_error_callback(|err| log::warn!("audio stream error: {err}"))
                .open_stream_or_fallback()
                .context("failed to start default output stream")
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();

        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            volume: 1.0,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();
        self.sink.set_volume(self.volume);
        self.current = None;
        self.track_duration = None;

        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        self.track_duration = source.total_duration().filter(|value| !value.is_zero());
        self.sink.append(source);
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) {
        if self.current.is_some() {
            self.sink.play();
        }
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn source(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        let target = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.sink
            .try_seek(target)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn output_name(&self) -> String {
        String::from("System default output")
    }

    fn is_finished(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

pub struct NullOutput {
    paused: bool,
    current: Option<PathBuf>,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
}

impl NullOutput {
    pub fn new() -> Self {
        Self {
            paused: true,
            current: None,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
        }
    }

    /// Overrides the probed duration; `None` means unknown.
    pub fn set_duration(&mut self, duration: Option<Duration>) {
        self.track_duration = duration.filter(|value| !value.is_zero());
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for NullOutput {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.paused = true;
        self.current = Some(path.to_path_buf());
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(path);
        Ok(())
    }

    fn play(&mut self) {
        if self.current.is_none() {
            return;
        }
        if self.paused {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn source(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn output_name(&self) -> String {
        String::from("Silent output")
    }

    fn is_finished(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        self.current.is_some() && !self.paused && self.current_position() >= duration
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioOutput, NullOutput};
    use crate::fixtures::write_silent_wav;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn load_does_not_start_playback() {
        let mut output = NullOutput::new();
        output
            .load(Path::new("nonexistent-track.flac"))
            .expect("load should work in null mode");

        assert!(output.is_paused());
        let before = output.position().expect("position");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(output.position().expect("position"), before);
    }

    #[test]
    fn pause_and_play_control_position_progression() {
        let mut output = NullOutput::new();
        output
            .load(Path::new("nonexistent-track.flac"))
            .expect("load should work in null mode");
        output.play();
        thread::sleep(Duration::from_millis(20));

        output.pause();
        let paused = output.position().expect("position");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(output.position().expect("position"), paused);

        output.play();
        thread::sleep(Duration::from_millis(20));
        assert!(output.position().expect("position") > paused);
    }

    #[test]
    fn seek_is_clamped_to_known_duration() {
        let mut output = NullOutput::new();
        output
            .load(Path::new("nonexistent-track.flac"))
            .expect("load should work in null mode");
        output.set_duration(Some(Duration::from_secs(30)));

        output.seek_to(Duration::from_secs(90)).expect("seek");
        assert_eq!(output.position(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn seek_without_source_fails() {
        let mut output = NullOutput::new();
        assert!(output.seek_to(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn volume_is_clamped_to_unit_range() {
        let mut output = NullOutput::new();
        output.set_volume(1.7);
        assert_eq!(output.volume(), 1.0);
        output.set_volume(-0.2);
        assert_eq!(output.volume(), 0.0);
    }

    #[test]
    fn finishes_when_known_duration_elapses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_silent_wav(&track, 80);

        let mut output = NullOutput::new();
        output.load(&track).expect("load wav fixture");
        let duration = output.duration().expect("duration should be detected");
        assert!(duration >= Duration::from_millis(70));

        output.play();
        thread::sleep(Duration::from_millis(120));
        assert!(output.is_finished());
    }

    #[test]
    fn unknown_duration_does_not_auto_finish() {
        let mut output = NullOutput::new();
        output
            .load(Path::new("nonexistent-track.flac"))
            .expect("load should work in null mode");
        output.play();
        assert_eq!(output.duration(), None);

        thread::sleep(Duration::from_millis(40));
        assert!(!output.is_finished());
    }
}
