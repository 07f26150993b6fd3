use crate::model::Picture;
use image::ImageReader;
use std::collections::HashMap;
use std::io::Cursor;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtworkHandle(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ArtworkStore {
    next_id: u64,
    live: HashMap<ArtworkHandle, Artwork>,
    released: u64,
}

impl ArtworkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, picture: Picture) -> Option<ArtworkHandle> {
        if picture.data.is_empty() {
            return None;
        }

        let mime_type = picture
            .mime_type
            .filter(|mime| !mime.trim().is_empty())
            .or_else(|| {
                image::guess_format(&picture.data)
                    .ok()
                    .map(|format| format.to_mime_type().to_string())
            })
            .unwrap_or_else(|| String::from(FALLBACK_MIME));

        self.next_id += 1;
        let handle = ArtworkHandle(self.next_id);
        self.live.insert(
            handle,
            Artwork {
                mime_type,
                data: picture.data,
            },
        );
        Some(handle)
    }

    pub fn get(&self, handle: ArtworkHandle) -> Option<&Artwork> {
        self.live.get(&handle)
    }

    pub fn is_live(&self, handle: ArtworkHandle) -> bool {
        self.live.contains_key(&handle)
    }

    /// Frees the bytes behind `handle`. Returns `false` if it was already gone.
    pub fn release(&mut self, handle: ArtworkHandle) -> bool {
        if self.live.remove(&handle).is_none() {
            log::debug!("artwork {handle:?} released twice");
            return false;
        }
        self.released += 1;
        true
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn released_count(&self) -> u64 {
        self.released
    }

    pub fn dimensions(&self, handle: ArtworkHandle) -> Option<(u32, u32)> {
        let artwork = self.get(handle)?;
        ImageReader::new(Cursor::new(artwork.data.as_slice()))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    pub fn describe(&self, handle: ArtworkHandle) -> Option<String> {
        let artwork = self.get(handle)?;
        Some(match self.dimensions(handle) {
            Some((width, height)) => format!("{} {width}x{height}", artwork.mime_type),
            None => artwork.mime_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TINY_PNG;

    #[test]
    fn release_is_counted_once() {
        let mut store = ArtworkStore::new();
        let handle = store
            .register(Picture {
                mime_type: Some(String::from("image/jpeg")),
                data: vec![1, 2, 3],
            })
            .expect("handle");

        assert!(store.is_live(handle));
        assert!(store.release(handle));
        assert!(!store.release(handle));
        assert_eq!(store.released_count(), 1);
        assert_eq!(store.live_count(), 0);
        assert!(store.get(handle).is_none());
    }

    #[test]
    fn empty_picture_is_not_registered() {
        let mut store = ArtworkStore::new();
        let handle = store.register(Picture {
            mime_type: None,
            data: Vec::new(),
        });
        assert!(handle.is_none());
    }

    #[test]
    fn mime_and_dimensions_are_detected_from_bytes() {
        let mut store = ArtworkStore::new();
        let handle = store
            .register(Picture {
                mime_type: None,
                data: TINY_PNG.to_vec(),
            })
            .expect("handle");

        assert_eq!(store.get(handle).expect("art").mime_type, "image/png");
        assert_eq!(store.dimensions(handle), Some((1, 1)));
        assert_eq!(store.describe(handle).as_deref(), Some("image/png 1x1"));
    }
}
