use crate::artwork::ArtworkStore;
use crate::model::{Track, TrackId, TrackMetadata};
use rand::RngExt;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::path::PathBuf;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Added {
    pub index: usize,
    pub was_empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Before,
    After,
    /// The caller should load `next`.
    CurrentRemoved { next: usize },
    Emptied,
}

/// `next` and `prev` expect a non-empty queue; callers check `is_empty`
/// first.
#[derive(Debug)]
pub struct QueueStore {
    tracks: Vec<Track>,
    cursor: Option<usize>,
    repeat_one: bool,
    shuffle: bool,
    unshuffled: Vec<TrackId>,
    artwork: ArtworkStore,
    next_id: u64,
    rng: SmallRng,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_rng(&mut rand::rng()))
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            tracks: Vec::new(),
            cursor: None,
            repeat_one: false,
            shuffle: false,
            unshuffled: Vec::new(),
            artwork: ArtworkStore::new(),
            next_id: 0,
            rng,
        }
    }

    pub fn add_tagged(&mut self, source: PathBuf, metadata: TrackMetadata) -> Added {
        let mut track = Track::new(source, metadata.title, metadata.artist, metadata.album)
            .with_duration(metadata.duration);
        track.image = metadata
            .picture
            .and_then(|picture| self.artwork.register(picture));
        self.add(track)
    }

    pub fn add(&mut self, mut track: Track) -> Added {
        let was_empty = self.tracks.is_empty();
        self.next_id += 1;
        let id = TrackId(self.next_id);
        track.id = id;

        let current = self.current().map(|track| track.id);
        self.tracks.push(track);
        self.sort_by_title();
        if let Some(current) = current {
            self.cursor = self.position_of(current);
        }

        let index = self.position_of(id).unwrap_or(self.tracks.len() - 1);
        Added { index, was_empty }
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Removal> {
        if index >= self.tracks.len() {
            return None;
        }

        let removed = self.tracks.remove(index);
        if let Some(handle) = removed.image {
            self.artwork.release(handle);
        }
        self.unshuffled.retain(|id| *id != removed.id);

        if self.tracks.is_empty() {
            self.cursor = None;
            return Some(Removal::Emptied);
        }

        let removal = match self.cursor {
            Some(cursor) if index < cursor => {
                self.cursor = Some(cursor - 1);
                Removal::Before
            }
            Some(cursor) if index == cursor => {
                let next = self.successor(index);
                self.cursor = Some(next);
                Removal::CurrentRemoved { next }
            }
            _ => Removal::After,
        };
        Some(removal)
    }

    pub fn next(&mut self) -> usize {
        debug_assert!(!self.tracks.is_empty(), "next() on an empty queue");
        match self.cursor {
            Some(current) => self.successor(current),
            None => 0,
        }
    }

    pub fn prev(&self) -> usize {
        debug_assert!(!self.tracks.is_empty(), "prev() on an empty queue");
        let len = self.tracks.len().max(1);
        let current = self.cursor.unwrap_or(0);
        (current + len - 1) % len
    }

    /// Disabling moves the cursor back to the first entry, even if another
    /// track is playing.
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;

        if self.shuffle {
            self.unshuffled = self.tracks.iter().map(|track| track.id).collect();
            match self.cursor {
                Some(cursor) => {
                    let current = self.tracks.remove(cursor);
                    self.tracks.shuffle(&mut self.rng);
                    self.tracks.insert(cursor, current);
                }
                None => self.tracks.shuffle(&mut self.rng),
            }
        } else {
            self.restore_unshuffled();
            self.cursor = (!self.tracks.is_empty()).then_some(0);
        }

        self.shuffle
    }

    pub fn toggle_repeat_one(&mut self) -> bool {
        self.repeat_one = !self.repeat_one;
        self.repeat_one
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.cursor = Some(index);
        true
    }

    pub fn release_artwork_at(&mut self, index: usize) -> bool {
        let Some(handle) = self
            .tracks
            .get_mut(index)
            .and_then(|track| track.image.take())
        else {
            return false;
        };
        self.artwork.release(handle)
    }

    pub fn clear(&mut self) {
        for handle in self.tracks.drain(..).filter_map(|track| track.image) {
            self.artwork.release(handle);
        }
        self.unshuffled.clear();
        self.cursor = None;
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.cursor?)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn is_repeat_one(&self) -> bool {
        self.repeat_one
    }

    pub fn artwork(&self) -> &ArtworkStore {
        &self.artwork
    }

    /// Index after `from`. Under shuffle a random index other than `from`;
    /// `from` may equal `len` when it names a slot that was just removed.
    fn successor(&mut self, from: usize) -> usize {
        let len = self.tracks.len().max(1);
        if !self.shuffle {
            return (from + 1) % len;
        }
        if from >= len {
            return self.rng.random_range(0..len);
        }
        if len == 1 {
            return from;
        }
        let pick = self.rng.random_range(0..len - 1);
        if pick >= from { pick + 1 } else { pick }
    }

    fn position_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == id)
    }

    fn sort_by_title(&mut self) {
        self.tracks
            .sort_by_cached_key(|track| (title_sort_key(&track.title), track.title.clone()));
    }

    fn restore_unshuffled(&mut self) {
        let mut pool: HashMap<TrackId, Track> = self
            .tracks
            .drain(..)
            .map(|track| (track.id, track))
            .collect();

        let mut restored: Vec<Track> = std::mem::take(&mut self.unshuffled)
            .into_iter()
            .filter_map(|id| pool.remove(&id))
            .collect();

        if pool.is_empty() {
            self.tracks = restored;
            return;
        }

        // Tracks added while shuffled have no snapshot slot.
        let mut added: Vec<Track> = pool.into_values().collect();
        added.sort_by_key(|track| track.id);
        restored.extend(added);
        self.tracks = restored;
        self.sort_by_title();
    }
}

pub fn title_sort_key(title: &str) -> String {
    title
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Picture;
    use proptest::prop_assert;
    use proptest::prop_assert_eq;
    use proptest::prop_assert_ne;

    fn track(title: &str) -> Track {
        Track::new(
            PathBuf::from(format!("{title}.mp3")),
            Some(title.to_string()),
            None,
            None,
        )
    }

    fn queue_of(titles: &[&str]) -> QueueStore {
        let mut queue = QueueStore::with_seed(7);
        for title in titles {
            queue.add(track(title));
        }
        queue
    }

    fn titles(queue: &QueueStore) -> Vec<&str> {
        queue.tracks().iter().map(|track| track.title.as_str()).collect()
    }

    fn with_art(queue: &mut QueueStore, title: &str) -> Added {
        queue.add_tagged(
            PathBuf::from(format!("{title}.mp3")),
            TrackMetadata {
                title: Some(title.to_string()),
                picture: Some(Picture {
                    mime_type: Some(String::from("image/jpeg")),
                    data: vec![0xff, 0xd8, 0xff],
                }),
                ..TrackMetadata::default()
            },
        )
    }

    #[test]
    fn adding_sorts_by_title() {
        let mut queue = QueueStore::with_seed(1);
        let first = queue.add(track("Bravo"));
        let second = queue.add(track("Alpha"));

        assert_eq!(titles(&queue), vec!["Alpha", "Bravo"]);
        assert!(first.was_empty);
        assert!(!second.was_empty);
        assert_eq!(second.index, 0);
    }

    #[test]
    fn sorting_ignores_case_and_accents() {
        let queue = queue_of(&["zulu", "Écho", "alpha", "Delta"]);
        assert_eq!(titles(&queue), vec!["alpha", "Delta", "Écho", "zulu"]);
    }

    #[test]
    fn cursor_follows_its_track_after_resort() {
        let mut queue = queue_of(&["Mike", "Zulu"]);
        queue.select(1);
        queue.add(track("Alpha"));

        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("Zulu"));
        assert_eq!(queue.cursor(), Some(2));
    }

    #[test]
    fn next_wraps_in_order() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.select(2);
        assert_eq!(queue.next(), 0);
        queue.select(0);
        assert_eq!(queue.next(), 1);
    }

    #[test]
    fn prev_wraps_to_last() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.select(0);
        assert_eq!(queue.prev(), 2);
        queue.select(2);
        assert_eq!(queue.prev(), 1);
    }

    #[test]
    fn shuffle_next_on_single_entry_returns_same_index() {
        let mut queue = queue_of(&["only"]);
        queue.select(0);
        queue.toggle_shuffle();
        assert_eq!(queue.next(), 0);
    }

    #[test]
    fn entropy_seeded_queue_shuffles_and_never_repeats() {
        let mut queue = QueueStore::new();
        for title in ["a", "b", "c", "d", "e"] {
            queue.add(track(title));
        }
        queue.select(2);
        assert!(queue.toggle_shuffle());

        for _ in 0..50 {
            let before = queue.cursor().expect("cursor");
            let next = queue.next();
            assert!(next < queue.len());
            assert_ne!(next, before);
            queue.select(next);
        }
    }

    #[test]
    fn removing_only_track_empties_queue() {
        let mut queue = queue_of(&["only"]);
        queue.select(0);

        assert_eq!(queue.remove_at(0), Some(Removal::Emptied));
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
    }

    #[test]
    fn removing_before_cursor_shifts_it() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.select(2);

        assert_eq!(queue.remove_at(0), Some(Removal::Before));
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("c"));
    }

    #[test]
    fn removing_after_cursor_leaves_it() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.select(0);
        assert_eq!(queue.remove_at(2), Some(Removal::After));
        assert_eq!(queue.cursor(), Some(0));
    }

    #[test]
    fn removing_current_advances_from_the_removed_slot() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        queue.select(1);
        assert_eq!(
            queue.remove_at(1),
            Some(Removal::CurrentRemoved { next: 2 })
        );
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("d"));

        let mut queue = queue_of(&["a", "b", "c"]);
        queue.select(1);
        assert_eq!(
            queue.remove_at(1),
            Some(Removal::CurrentRemoved { next: 0 })
        );
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("a"));
    }

    #[test]
    fn removing_last_slot_while_current_wraps() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.select(2);
        assert_eq!(
            queue.remove_at(2),
            Some(Removal::CurrentRemoved { next: 1 })
        );
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("b"));
    }

    #[test]
    fn removing_current_under_shuffle_never_lands_on_the_removed_slot() {
        for seed in 0..200 {
            let mut queue = QueueStore::with_seed(seed);
            for title in ["a", "b", "c", "d"] {
                queue.add(track(title));
            }
            queue.select(1);
            queue.toggle_shuffle();

            let Some(Removal::CurrentRemoved { next }) = queue.remove_at(1) else {
                panic!("current track should have been removed");
            };
            assert_ne!(next, 1, "seed {seed}");
            assert!(next < queue.len());
            assert_eq!(queue.cursor(), Some(next));
        }
    }

    #[test]
    fn removing_out_of_range_is_rejected() {
        let mut queue = queue_of(&["a"]);
        assert_eq!(queue.remove_at(1), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn removing_track_releases_its_artwork_once() {
        let mut queue = QueueStore::with_seed(3);
        with_art(&mut queue, "b");
        let added = with_art(&mut queue, "a");
        let handle = queue.get(added.index).and_then(|t| t.image).expect("image");

        queue.remove_at(added.index);

        assert_eq!(queue.artwork().released_count(), 1);
        assert!(!queue.artwork().is_live(handle));
        assert_eq!(queue.artwork().live_count(), 1);
    }

    #[test]
    fn released_artwork_is_not_released_again_on_removal() {
        let mut queue = QueueStore::with_seed(3);
        with_art(&mut queue, "a");

        assert!(queue.release_artwork_at(0));
        assert!(!queue.release_artwork_at(0));
        queue.remove_at(0);

        assert_eq!(queue.artwork().released_count(), 1);
    }

    #[test]
    fn clear_releases_every_image() {
        let mut queue = QueueStore::with_seed(3);
        with_art(&mut queue, "a");
        with_art(&mut queue, "b");
        queue.add(track("c"));
        queue.select(1);

        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
        assert_eq!(queue.artwork().released_count(), 2);
        assert_eq!(queue.artwork().live_count(), 0);
    }

    #[test]
    fn shuffle_keeps_current_track_in_place() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        queue.select(3);

        assert!(queue.toggle_shuffle());
        assert_eq!(queue.cursor(), Some(3));
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("d"));
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn unshuffle_restores_order_and_resets_cursor() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e"]);
        queue.select(4);
        queue.toggle_shuffle();

        assert!(!queue.toggle_shuffle());
        assert_eq!(titles(&queue), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(queue.cursor(), Some(0));
    }

    #[test]
    fn unshuffle_skips_removed_and_merges_added() {
        let mut queue = queue_of(&["b", "d", "f"]);
        queue.select(0);
        queue.toggle_shuffle();
        let removed = queue
            .tracks()
            .iter()
            .position(|t| t.title == "d")
            .expect("d queued");
        queue.remove_at(removed);
        queue.add(track("c"));

        queue.toggle_shuffle();
        assert_eq!(titles(&queue), vec!["b", "c", "f"]);
    }

    #[test]
    fn repeat_one_toggle_keeps_cursor() {
        let mut queue = queue_of(&["a", "b"]);
        queue.select(1);
        assert!(queue.toggle_repeat_one());
        assert!(!queue.toggle_repeat_one());
        assert_eq!(queue.cursor(), Some(1));
    }

    proptest::proptest! {
        #[test]
        fn queue_stays_sorted_after_adds(titles in proptest::collection::vec("[a-zA-Z ]{0,8}", 1..40)) {
            let mut queue = QueueStore::with_seed(11);
            for title in &titles {
                queue.add(track(title));
                let keys: Vec<String> = queue
                    .tracks()
                    .iter()
                    .map(|t| title_sort_key(&t.title))
                    .collect();
                prop_assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
            }
            prop_assert_eq!(queue.len(), titles.len());
        }

        #[test]
        fn shuffled_next_never_repeats_cursor(len in 2usize..30, cursor in 0usize..30, seed in 0u64..1000) {
            let mut queue = QueueStore::with_seed(seed);
            for n in 0..len {
                queue.add(track(&format!("{n:02}")));
            }
            queue.select(cursor % len);
            queue.toggle_shuffle();
            let current = queue.cursor().expect("cursor");

            for _ in 0..20 {
                let next = queue.next();
                prop_assert_ne!(next, current);
                prop_assert!(next < len);
            }
        }

        #[test]
        fn cursor_stays_valid_after_random_ops(ops in proptest::collection::vec((0u8..6, 0usize..12), 1..120)) {
            let mut queue = QueueStore::with_seed(5);
            for (op, arg) in ops {
                match op {
                    0 => {
                        queue.add(track(&format!("t{arg}")));
                    }
                    1 => {
                        queue.remove_at(arg);
                    }
                    2 => {
                        queue.select(arg);
                    }
                    3 => {
                        queue.toggle_shuffle();
                    }
                    4 if !queue.is_empty() => {
                        let next = queue.next();
                        prop_assert!(next < queue.len());
                        queue.select(next);
                    }
                    _ => {
                        queue.toggle_repeat_one();
                    }
                }

                if let Some(cursor) = queue.cursor() {
                    prop_assert!(cursor < queue.len());
                }
                if queue.is_empty() {
                    prop_assert!(queue.cursor().is_none());
                }
            }
        }
    }
}
