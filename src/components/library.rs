// ============================================================================
// ASSET LIBRARY — saved results, independent of edit history
// ============================================================================

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::raster::RasterImage;

/// A saved image. Identity is the id, not the content.
#[derive(Clone, Debug)]
pub struct LibraryEntry {
    pub id: Uuid,
    pub image: RasterImage,
    pub created_at: DateTime<Utc>,
}

/// In-memory list of saved images, newest first.
#[derive(Clone, Debug, Default)]
pub struct AssetLibrary {
    entries: Vec<LibraryEntry>,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `image` as a new entry at the front and return its id.
    pub fn save(&mut self, image: RasterImage) -> Uuid {
        let entry = LibraryEntry {
            id: Uuid::new_v4(),
            image,
            created_at: Utc::now(),
        };
        let id = entry.id;
        self.entries.insert(0, entry);
        log::debug!("library: saved {}", id);
        id
    }

    /// Remove entry `id`. Returns false if there was no such entry.
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn get(&self, id: Uuid) -> Option<&LibraryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn img(tag: u8) -> RasterImage {
        RasterImage::from_rgba(&RgbaImage::from_pixel(1, 1, Rgba([tag, 0, 0, 255]))).unwrap()
    }

    #[test]
    fn newest_entry_comes_first() {
        let mut lib = AssetLibrary::new();
        let a = lib.save(img(1));
        let b = lib.save(img(2));
        assert_ne!(a, b);
        assert_eq!(lib.entries()[0].id, b);
        assert_eq!(lib.entries()[1].id, a);
    }

    #[test]
    fn same_image_saved_twice_gets_two_entries() {
        let mut lib = AssetLibrary::new();
        lib.save(img(1));
        lib.save(img(1));
        assert_eq!(lib.len(), 2);
    }

    #[test]
    fn delete_by_id() {
        let mut lib = AssetLibrary::new();
        let a = lib.save(img(1));
        let b = lib.save(img(2));
        assert!(lib.delete(a));
        assert!(!lib.delete(a));
        assert!(lib.get(a).is_none());
        assert_eq!(lib.get(b).map(|e| e.image.clone()), Some(img(2)));
    }
}
