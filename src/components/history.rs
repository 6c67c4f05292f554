// ============================================================================
// EDIT HISTORY — linear undo/redo over whole-image states
// ============================================================================
//
// Entry 0 is the original upload and can never be deleted. Committing while
// the cursor is behind the end drops every entry after the cursor first.

use crate::raster::RasterImage;

#[derive(Clone, Debug, Default)]
pub struct EditHistory {
    entries: Vec<RasterImage>,
    index: usize,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History containing only `original`.
    pub fn with_original(original: RasterImage) -> Self {
        Self {
            entries: vec![original],
            index: 0,
        }
    }

    /// Replace everything with a fresh original.
    pub fn open(&mut self, original: RasterImage) {
        self.entries.clear();
        self.entries.push(original);
        self.index = 0;
    }

    /// Append a new state after the cursor, discarding any redo tail.
    pub fn commit(&mut self, image: RasterImage) {
        if !self.entries.is_empty() {
            let dropped = self.entries.len() - (self.index + 1);
            if dropped > 0 {
                log::debug!("history: discarding {} redo entries", dropped);
            }
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(image);
        self.index = self.entries.len() - 1;
        log::debug!("history: committed entry {}", self.index);
    }

    /// Step back one entry. Returns false at the original.
    pub fn undo(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Step forward one entry. Returns false at the newest entry.
    pub fn redo(&mut self) -> bool {
        if self.index + 1 < self.entries.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Jump straight to entry `index` (history strip click).
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.entries.len() && index != self.index {
            self.index = index;
            true
        } else {
            false
        }
    }

    /// Remove entry `index`. The original (index 0) is never removed.
    pub fn delete_at(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.entries.len() {
            return false;
        }
        self.entries.remove(index);
        if self.index >= index {
            self.index = self.index.saturating_sub(1);
        }
        log::debug!("history: deleted entry {}, cursor now {}", index, self.index);
        true
    }

    /// Back to the original only.
    pub fn reset(&mut self) {
        self.entries.truncate(1);
        self.index = 0;
        log::debug!("history: reset to original");
    }

    pub fn current(&self) -> Option<&RasterImage> {
        self.entries.get(self.index)
    }

    pub fn original(&self) -> Option<&RasterImage> {
        self.entries.first()
    }

    /// Entry before the cursor, or the current one at the original.
    pub fn previous(&self) -> Option<&RasterImage> {
        if self.index > 0 {
            self.entries.get(self.index - 1)
        } else {
            self.current()
        }
    }

    pub fn get(&self, index: usize) -> Option<&RasterImage> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[RasterImage] {
        &self.entries
    }

    /// Cursor position, `None` while empty.
    pub fn index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use proptest::prelude::*;

    /// Distinct 1×1 images, told apart by their red channel.
    fn img(tag: u8) -> RasterImage {
        RasterImage::from_rgba(&RgbaImage::from_pixel(1, 1, Rgba([tag, 0, 0, 255]))).unwrap()
    }

    fn tags(h: &EditHistory) -> Vec<u8> {
        h.entries().iter().map(|e| e.to_rgba().unwrap().get_pixel(0, 0)[0]).collect()
    }

    #[test]
    fn empty_history_has_no_current() {
        let h = EditHistory::new();
        assert!(h.current().is_none());
        assert_eq!(h.index(), None);
        assert!(!h.can_undo() && !h.can_redo());
    }

    #[test]
    fn commit_after_undo_discards_redo_tail() {
        let mut h = EditHistory::with_original(img(0));
        h.commit(img(1));
        h.commit(img(2));
        assert_eq!(h.index(), Some(2));
        assert!(h.undo());
        h.commit(img(3));
        assert_eq!(tags(&h), vec![0, 1, 3]);
        assert_eq!(h.index(), Some(2));
        assert!(!h.can_redo());
    }

    #[test]
    fn undo_redo_stop_at_bounds() {
        let mut h = EditHistory::with_original(img(0));
        h.commit(img(1));
        assert!(!h.redo());
        assert!(h.undo());
        assert!(!h.undo());
        assert_eq!(h.current(), Some(&img(0)));
        assert!(h.redo());
        assert_eq!(h.current(), Some(&img(1)));
    }

    #[test]
    fn original_cannot_be_deleted() {
        let mut h = EditHistory::with_original(img(0));
        h.commit(img(1));
        assert!(!h.delete_at(0));
        assert!(!h.delete_at(9));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn delete_moves_cursor_back_when_at_or_after() {
        let mut h = EditHistory::with_original(img(0));
        h.commit(img(1));
        h.commit(img(2));
        // cursor 2, delete 1 -> cursor 1, still showing entry "2"
        assert!(h.delete_at(1));
        assert_eq!(h.index(), Some(1));
        assert_eq!(tags(&h), vec![0, 2]);

        h.commit(img(3));
        h.select(1);
        // cursor 1, delete 2 -> cursor unchanged
        assert!(h.delete_at(2));
        assert_eq!(h.index(), Some(1));
    }

    #[test]
    fn reset_keeps_only_original() {
        let mut h = EditHistory::with_original(img(0));
        h.commit(img(1));
        h.commit(img(2));
        h.reset();
        assert_eq!(h.len(), 1);
        assert_eq!(h.current(), Some(&img(0)));
    }

    #[test]
    fn previous_falls_back_to_current_at_original() {
        let mut h = EditHistory::with_original(img(0));
        assert_eq!(h.previous(), Some(&img(0)));
        h.commit(img(1));
        assert_eq!(h.previous(), Some(&img(0)));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Commit,
        Undo,
        Redo,
        Delete(usize),
        Select(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Commit),
            2 => Just(Op::Undo),
            1 => Just(Op::Redo),
            1 => (0usize..6).prop_map(Op::Delete),
            1 => (0usize..6).prop_map(Op::Select),
        ]
    }

    proptest! {
        #[test]
        fn cursor_stays_in_bounds_and_commit_truncates(ops in prop::collection::vec(op(), 1..30)) {
            let mut h = EditHistory::with_original(img(0));
            let mut next_tag = 1u8;
            for op in ops {
                match op {
                    Op::Commit => {
                        let before = h.index().unwrap();
                        let kept: Vec<RasterImage> = h.entries()[..=before].to_vec();
                        h.commit(img(next_tag));
                        prop_assert_eq!(&h.entries()[..=before], kept.as_slice());
                        prop_assert_eq!(h.len(), before + 2);
                        prop_assert_eq!(h.index(), Some(before + 1));
                        next_tag += 1;
                    }
                    Op::Undo => { h.undo(); }
                    Op::Redo => { h.redo(); }
                    Op::Delete(i) => { h.delete_at(i); }
                    Op::Select(i) => { h.select(i); }
                }
                let idx = h.index().unwrap();
                prop_assert!(idx < h.len());
                prop_assert_eq!(h.original(), Some(&img(0)));
            }
        }
    }
}
