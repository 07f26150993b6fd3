use crate::audio::AudioOutput;
use crate::model::TrackId;
use crate::queue::QueueStore;
use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

impl PlayerState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndAction {
    Replayed(usize),
    Advanced(usize),
    Stopped,
}

pub struct PlaybackController<O: AudioOutput> {
    output: O,
    state: PlayerState,
    loaded: Option<TrackId>,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            state: PlayerState::Idle,
            loaded: None,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn loaded(&self) -> Option<TrackId> {
        self.loaded
    }

    /// Sets the source without starting playback.
    pub fn load(&mut self, queue: &mut QueueStore, index: usize) -> Result<()> {
        let Some(track) = queue.get(index) else {
            anyhow::bail!("no track at queue index {index}");
        };
        let next_id = track.id;
        let source = track.source.clone();

        if self.loaded.is_some_and(|id| id != next_id) {
            self.release_loaded(queue);
        }

        queue.select(index);
        self.loaded = Some(next_id);
        let result = self
            .output
            .load(&source)
            .with_context(|| format!("failed to load {}", source.display()));
        self.state = if result.is_ok() {
            PlayerState::Paused
        } else {
            PlayerState::Idle
        };
        result
    }

    pub fn play_index(&mut self, queue: &mut QueueStore, index: usize) -> Result<()> {
        self.load(queue, index)?;
        self.play();
        Ok(())
    }

    pub fn play(&mut self) {
        if self.output.source().is_none() {
            return;
        }
        self.output.play();
        self.state = PlayerState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        self.output.pause();
        self.state = PlayerState::Paused;
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused => self.play(),
            PlayerState::Idle => {}
        }
    }

    pub fn stop(&mut self) {
        self.output.stop();
        self.state = PlayerState::Idle;
        self.loaded = None;
    }

    /// Caller guarantees the queue is not empty.
    pub fn next(&mut self, queue: &mut QueueStore) -> Result<usize> {
        let index = queue.next();
        self.play_index(queue, index)?;
        Ok(index)
    }

    /// Caller guarantees the queue is not empty.
    pub fn prev(&mut self, queue: &mut QueueStore) -> Result<usize> {
        let index = queue.prev();
        self.play_index(queue, index)?;
        Ok(index)
    }

    pub fn on_track_ended(&mut self, queue: &mut QueueStore) -> Result<EndAction> {
        let Some(current) = queue.cursor() else {
            self.stop();
            return Ok(EndAction::Stopped);
        };

        if queue.is_repeat_one() {
            self.play_index(queue, current)?;
            return Ok(EndAction::Replayed(current));
        }

        if queue.len() > 1 {
            self.release_loaded(queue);
            let next = queue.next();
            self.play_index(queue, next)?;
            return Ok(EndAction::Advanced(next));
        }

        self.release_loaded(queue);
        self.stop();
        Ok(EndAction::Stopped)
    }

    /// Clamped to the track bounds. A non-finite delta is ignored.
    pub fn seek_relative(&mut self, delta_seconds: f64) -> Result<()> {
        let Some(position) = self.output.position() else {
            return Ok(());
        };
        if !delta_seconds.is_finite() {
            return Ok(());
        }
        let mut target = (position.as_secs_f64() + delta_seconds).max(0.0);
        if let Some(duration) = self.output.duration() {
            target = target.min(duration.as_secs_f64());
        }
        let Ok(target) = Duration::try_from_secs_f64(target) else {
            return Ok(());
        };
        self.output.seek_to(target)
    }

    /// No-op while the duration is unknown or zero.
    pub fn seek_to_fraction(&mut self, fraction: f64) -> Result<()> {
        let Some(duration) = self.output.duration().filter(|value| !value.is_zero()) else {
            return Ok(());
        };
        if self.output.source().is_none() {
            return Ok(());
        }
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.output.seek_to(duration.mul_f64(fraction))
    }

    pub fn volume(&self) -> f32 {
        self.output.volume()
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() { volume } else { 0.0 };
        self.output.set_volume(volume.clamp(0.0, 1.0));
    }

    pub fn progress(&self) -> (Duration, Option<Duration>, Option<f64>) {
        let position = self.output.position().unwrap_or_default();
        let duration = self.output.duration();
        let fraction = duration
            .filter(|value| !value.is_zero())
            .map(|value| (position.as_secs_f64() / value.as_secs_f64()).clamp(0.0, 1.0));
        (position, duration, fraction)
    }

    pub fn is_output_finished(&self) -> bool {
        self.state == PlayerState::Playing && self.output.is_finished()
    }

    pub fn sync_removed(&mut self, queue: &QueueStore) {
        if self
            .loaded
            .is_some_and(|id| !queue.tracks().iter().any(|track| track.id == id))
        {
            self.loaded = None;
        }
    }

    fn release_loaded(&mut self, queue: &mut QueueStore) {
        let Some(id) = self.loaded else {
            return;
        };
        if let Some(index) = queue.tracks().iter().position(|track| track.id == id) {
            queue.release_artwork_at(index);
        }
    }
}
