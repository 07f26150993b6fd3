#![no_main]

use cazic::audio::NullOutput;
use cazic::core::{PlayerCore, PlayerEvent, SeekTarget};
use cazic::model::{Picture, Settings, TrackMetadata};
use cazic::queue::QueueStore;
use libfuzzer_sys::fuzz_target;
use std::path::PathBuf;

fuzz_target!(|data: &[u8]| {
    let mut core = PlayerCore::new(
        QueueStore::with_seed(0),
        NullOutput::new(),
        Settings::default(),
    );

    for pair in data.chunks(2) {
        let op = pair[0];
        let arg = pair.get(1).copied().unwrap_or_default();
        let index = usize::from(arg) % (core.queue.len() + 2);
        let event = match op % 13 {
            0 | 1 => PlayerEvent::TrackAdded {
                path: PathBuf::from(format!("track_{arg}.mp3")),
                metadata: TrackMetadata {
                    title: (arg % 3 != 0).then(|| char::from(b'a' + arg % 26).to_string()),
                    picture: (arg % 2 == 0).then(|| Picture {
                        mime_type: None,
                        data: vec![arg],
                    }),
                    ..TrackMetadata::default()
                },
            },
            2 => PlayerEvent::TrackEnded,
            3 => PlayerEvent::Next,
            4 => PlayerEvent::Prev,
            5 => PlayerEvent::PlayIndex(index),
            6 => PlayerEvent::Remove(index),
            7 => PlayerEvent::ToggleShuffle,
            8 => PlayerEvent::ToggleRepeatOne,
            9 => PlayerEvent::TogglePlayback,
            10 => PlayerEvent::UserSeek(SeekTarget::Fraction(f64::from(arg) / 200.0)),
            11 => PlayerEvent::UserSeek(SeekTarget::Relative(match arg % 4 {
                0 => f64::INFINITY,
                1 => f64::NAN,
                2 => f64::from(arg).powi(12),
                _ => f64::from(arg) - 128.0,
            })),
            _ => PlayerEvent::AdjustVolume(f32::from(arg) / 128.0 - 1.0),
        };
        core.handle(event);

        if let Some(cursor) = core.queue.cursor() {
            assert!(cursor < core.queue.len());
        }
        assert!(core.queue.artwork().live_count() <= core.queue.len());
    }
});
