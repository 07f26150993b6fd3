use crate::model::{Picture, TrackMetadata};
use anyhow::{Context, Result};
use lofty::picture::PictureType;
use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

pub trait TagReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        match lofty_metadata(path) {
            Ok(metadata) => Ok(metadata),
            Err(lofty_err) => symphonia_metadata(path).with_context(|| {
                format!(
                    "failed to read tags from {}: {lofty_err:#}",
                    path.display()
                )
            }),
        }
    }
}

fn lofty_metadata(path: &Path) -> Result<TrackMetadata> {
    let tagged = Probe::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .read()
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let duration = Some(tagged.properties().duration()).filter(|value| !value.is_zero());
    let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
        return Ok(TrackMetadata {
            duration,
            ..TrackMetadata::default()
        });
    };

    let picture = tag
        .pictures()
        .iter()
        .find(|picture| picture.pic_type() == PictureType::CoverFront)
        .or_else(|| tag.pictures().first())
        .filter(|picture| !picture.data().is_empty())
        .map(|picture| Picture {
            mime_type: picture.mime_type().map(|mime| mime.as_str().to_string()),
            data: picture.data().to_vec(),
        });

    Ok(TrackMetadata {
        title: tag.title().and_then(|value| clean_metadata_value(&value)),
        artist: tag.artist().and_then(|value| clean_metadata_value(&value)),
        album: tag.album().and_then(|value| clean_metadata_value(&value)),
        picture,
        duration,
    })
}

fn symphonia_metadata(path: &Path) -> Result<TrackMetadata> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let mut probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("unrecognised audio container {}", path.display()))?;

    let duration = probed
        .format
        .default_track()
        .and_then(|track| codec_duration(&track.codec_params));

    let metadata = probed.format.metadata();
    let Some(revision) = metadata.current() else {
        return Ok(TrackMetadata {
            duration,
            ..TrackMetadata::default()
        });
    };

    let tags = revision.tags();
    let picture = revision
        .visuals()
        .iter()
        .find(|visual| !visual.data.is_empty())
        .map(|visual| Picture {
            mime_type: Some(visual.media_type.clone()).filter(|mime| !mime.is_empty()),
            data: visual.data.to_vec(),
        });

    Ok(TrackMetadata {
        title: tag_value(tags, StandardTagKey::TrackTitle, &["title"]),
        artist: tag_value(
            tags,
            StandardTagKey::Artist,
            &["artist", "albumartist", "album_artist"],
        ),
        album: tag_value(tags, StandardTagKey::Album, &["album"]),
        picture,
        duration,
    })
}

fn codec_duration(codec_params: &symphonia::core::codecs::CodecParameters) -> Option<Duration> {
    let (time_base, frame_count) = codec_params.time_base.zip(codec_params.n_frames)?;
    let time = time_base.calc_time(frame_count);
    Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
        .filter(|value| !value.is_zero())
}

fn tag_value(
    tags: &[symphonia::core::meta::Tag],
    standard_key: StandardTagKey,
    fallback_keys: &[&str],
) -> Option<String> {
    let from_standard = tags
        .iter()
        .find(|tag| tag.std_key == Some(standard_key))
        .map(|tag| tag.value.to_string());

    let from_fallback = || {
        tags.iter()
            .find(|tag| {
                fallback_keys
                    .iter()
                    .any(|key| tag.key.eq_ignore_ascii_case(key))
            })
            .map(|tag| tag.value.to_string())
    };

    from_standard
        .or_else(from_fallback)
        .and_then(|value| clean_metadata_value(&value))
}

fn clean_metadata_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

pub fn collect_audio_files(selection: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(selection)
        .with_context(|| format!("cannot access {}", selection.display()))?;

    if metadata.is_file() {
        if !is_audio(selection) {
            anyhow::bail!("not a supported audio file: {}", selection.display());
        }
        return Ok(vec![selection.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(selection)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    Loaded {
        path: PathBuf,
        metadata: TrackMetadata,
    },
    Failed {
        path: PathBuf,
        reason: String,
    },
}

/// Reads tags on one background worker, in request order. Every request
/// yields exactly one `TagEvent`. Requests cannot be cancelled.
pub struct TagLoader {
    requests: Option<Sender<PathBuf>>,
    tx: Sender<TagEvent>,
    rx: Receiver<TagEvent>,
    pending: usize,
}

impl TagLoader {
    pub fn new(reader: Arc<dyn TagReader + Send + Sync>) -> Self {
        let (tx, rx) = mpsc::channel();
        let (request_tx, request_rx) = mpsc::channel::<PathBuf>();
        let results = tx.clone();

        let worker = thread::Builder::new()
            .name(String::from("tag-reader"))
            .spawn(move || {
                while let Ok(path) = request_rx.recv() {
                    let event = match reader.read(&path) {
                        Ok(metadata) => TagEvent::Loaded { path, metadata },
                        Err(err) => TagEvent::Failed {
                            path,
                            reason: format!("{err:#}"),
                        },
                    };
                    if results.send(event).is_err() {
                        break;
                    }
                }
            });

        let requests = match worker {
            Ok(_) => Some(request_tx),
            Err(err) => {
                log::error!("failed to start tag reader thread: {err}");
                None
            }
        };

        Self {
            requests,
            tx,
            rx,
            pending: 0,
        }
    }

    pub fn request(&mut self, path: PathBuf) {
        self.pending += 1;
        let path = match &self.requests {
            Some(requests) => match requests.send(path) {
                Ok(()) => return,
                Err(mpsc::SendError(path)) => path,
            },
            None => path,
        };

        self.requests = None;
        let _ = self.tx.send(TagEvent::Failed {
            path,
            reason: String::from("tag reader unavailable"),
        });
    }

    pub fn drain(&mut self) -> Vec<TagEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.pending = self.pending.saturating_sub(1);
                    events.push(event);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Blocks up to `timeout` for the next completed read.
    pub fn wait(&mut self, timeout: Duration) -> Option<TagEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => {
                self.pending = self.pending.saturating_sub(1);
                Some(event)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }
}
