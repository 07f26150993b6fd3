use crate::audio::AudioOutput;
use crate::config;
use crate::library::TagEvent;
use crate::model::{Settings, Theme, TrackMetadata};
use crate::player::{EndAction, PlaybackController, PlayerState};
use crate::queue::{QueueStore, Removal};
use std::path::PathBuf;

pub const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    Relative(f64),
    Fraction(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackAdded {
        path: PathBuf,
        metadata: TrackMetadata,
    },
    TagReadFailed {
        path: PathBuf,
        reason: String,
    },
    TrackEnded,
    UserSeek(SeekTarget),
    TogglePlayback,
    Next,
    Prev,
    PlayIndex(usize),
    Remove(usize),
    ClearQueue,
    ToggleShuffle,
    ToggleRepeatOne,
    SetVolume(f32),
    AdjustVolume(f32),
    SetTheme(Theme),
    CycleTheme,
    SaveSettings,
}

impl From<TagEvent> for PlayerEvent {
    fn from(event: TagEvent) -> Self {
        match event {
            TagEvent::Loaded { path, metadata } => Self::TrackAdded { path, metadata },
            TagEvent::Failed { path, reason } => Self::TagReadFailed { path, reason },
        }
    }
}

pub struct PlayerCore<O: AudioOutput> {
    pub queue: QueueStore,
    pub player: PlaybackController<O>,
    pub settings: Settings,
    pub selected: usize,
    pub status: String,
    pub dirty: bool,
    settings_path: Option<PathBuf>,
}

impl<O: AudioOutput> PlayerCore<O> {
    pub fn new(queue: QueueStore, output: O, settings: Settings) -> Self {
        Self {
            queue,
            player: PlaybackController::new(output),
            settings,
            selected: 0,
            status: String::from("Ready"),
            dirty: true,
            settings_path: None,
        }
    }

    /// Where `SaveSettings` writes. Without it the default config location
    /// is used.
    pub fn with_settings_path(mut self, path: PathBuf) -> Self {
        self.settings_path = Some(path);
        self
    }

    pub fn handle(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::TrackAdded { path, metadata } => self.on_track_added(path, metadata),
            PlayerEvent::TagReadFailed { path, reason } => {
                log::warn!("error while reading tags of {}: {reason}", path.display());
                self.dirty = true;
            }
            PlayerEvent::TrackEnded => self.on_track_ended(),
            PlayerEvent::UserSeek(target) => self.seek(target),
            PlayerEvent::TogglePlayback => self.toggle_playback(),
            PlayerEvent::Next => self.step(true),
            PlayerEvent::Prev => self.step(false),
            PlayerEvent::PlayIndex(index) => {
                if index >= self.queue.len() {
                    self.set_status("Nothing selected");
                    return;
                }
                let result = self.player.play_index(&mut self.queue, index);
                self.report_playback(result, "Playing selected track");
            }
            PlayerEvent::Remove(index) => self.remove(index),
            PlayerEvent::ClearQueue => {
                self.player.stop();
                self.queue.clear();
                self.selected = 0;
                self.set_status("Queue cleared");
            }
            PlayerEvent::ToggleShuffle => {
                let enabled = self.queue.toggle_shuffle();
                self.set_status(if enabled {
                    "Shuffle on"
                } else {
                    "Shuffle off"
                });
            }
            PlayerEvent::ToggleRepeatOne => {
                let enabled = self.queue.toggle_repeat_one();
                self.set_status(if enabled {
                    "Repeat one on"
                } else {
                    "Repeat one off"
                });
            }
            PlayerEvent::SetVolume(volume) => self.set_volume(volume),
            PlayerEvent::AdjustVolume(delta) => self.set_volume(self.player.volume() + delta),
            PlayerEvent::SetTheme(theme) => {
                self.settings.theme = theme;
                self.set_status(&format!("Theme: {}", theme.key()));
            }
            PlayerEvent::CycleTheme => {
                self.settings.theme = self.settings.theme.next();
                self.set_status(&format!("Theme: {}", self.settings.theme.key()));
            }
            PlayerEvent::SaveSettings => {
                if let Err(err) = self.save_settings() {
                    log::error!("failed to save settings: {err:#}");
                    self.set_status(&format!("save error: {err:#}"));
                } else {
                    self.set_status("Settings saved");
                }
            }
        }
    }

    pub fn poll_output(&mut self) {
        if self.player.is_output_finished() {
            self.handle(PlayerEvent::TrackEnded);
        }
    }

    pub fn select_next(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.selected = (self.selected + 1).min(self.queue.len() - 1);
        self.dirty = true;
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.dirty = true;
    }

    pub fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }

    fn on_track_added(&mut self, path: PathBuf, metadata: TrackMetadata) {
        let added = self.queue.add_tagged(path, metadata);
        let title = self
            .queue
            .get(added.index)
            .map(|track| track.title.clone())
            .unwrap_or_default();
        log::info!("queued {title}");

        if added.was_empty && self.player.state() == PlayerState::Idle {
            let result = self.player.play_index(&mut self.queue, 0);
            self.report_playback(result, &format!("Playing {title}"));
        } else {
            self.set_status(&format!("Queued {title}"));
        }
    }

    fn on_track_ended(&mut self) {
        match self.player.on_track_ended(&mut self.queue) {
            Ok(EndAction::Replayed(_)) => self.set_status("Repeating track"),
            Ok(EndAction::Advanced(_)) => self.set_status("Next track"),
            Ok(EndAction::Stopped) => self.set_status("Reached end of queue"),
            Err(err) => self.report_playback(Err(err), ""),
        }
    }

    fn toggle_playback(&mut self) {
        if self.queue.is_empty() {
            self.set_status("Queue is empty");
            return;
        }

        if self.player.state() == PlayerState::Idle {
            let index = self.queue.cursor().unwrap_or(0);
            let result = self.player.play_index(&mut self.queue, index);
            self.report_playback(result, "Playing");
            return;
        }

        self.player.toggle();
        let label = self.player.state().label();
        self.set_status(label);
    }

    fn step(&mut self, forward: bool) {
        if self.queue.is_empty() {
            self.set_status("Queue is empty");
            return;
        }

        let result = if forward {
            self.player.next(&mut self.queue)
        } else {
            self.player.prev(&mut self.queue)
        };
        let label = if forward { "Next track" } else { "Previous track" };
        self.report_playback(result.map(|_| ()), label);
    }

    fn remove(&mut self, index: usize) {
        let was_playing = self.player.state() == PlayerState::Playing;
        let Some(removal) = self.queue.remove_at(index) else {
            self.set_status("Nothing to remove");
            return;
        };
        self.player.sync_removed(&self.queue);
        self.selected = self.selected.min(self.queue.len().saturating_sub(1));

        match removal {
            Removal::Emptied => {
                self.player.stop();
                self.set_status("Queue is empty");
            }
            Removal::CurrentRemoved { next } if self.player.state() != PlayerState::Idle => {
                let result = self.player.load(&mut self.queue, next);
                if result.is_ok() && was_playing {
                    self.player.play();
                }
                self.report_playback(result, "Removed current track");
            }
            Removal::CurrentRemoved { .. } | Removal::Before | Removal::After => {
                self.set_status("Removed track");
            }
        }
    }

    fn seek(&mut self, target: SeekTarget) {
        let result = match target {
            SeekTarget::Relative(delta) => self.player.seek_relative(delta),
            SeekTarget::Fraction(fraction) => self.player.seek_to_fraction(fraction),
        };
        if let Err(err) = result {
            log::warn!("seek failed: {err:#}");
            self.set_status(&format!("seek error: {err:#}"));
        }
        self.dirty = true;
    }

    fn set_volume(&mut self, volume: f32) {
        self.player.set_volume(volume);
        let volume = self.player.volume();
        self.set_status(&format!("Volume: {}%", (volume * 100.0).round() as u16));
    }

    fn save_settings(&self) -> anyhow::Result<()> {
        match &self.settings_path {
            Some(path) => config::save_settings_to(path, &self.settings),
            None => config::save_settings(&self.settings),
        }
    }

    fn report_playback(&mut self, result: anyhow::Result<()>, success: &str) {
        match result {
            Ok(()) => self.set_status(success),
            Err(err) => {
                log::warn!("playback error: {err:#}");
                self.set_status(&format!("playback error: {err:#}"));
            }
        }
    }
}
