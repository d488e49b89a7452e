//! Arenas backing the two byte-sequence payload kinds: `text!`/`file!`/
//! `tag!`/`issue!` (UTF-8, spec §3.1) and `binary!` (raw bytes).
//!
//! These sit alongside [`crate::array::Arrays`] as the other half of the
//! arena-of-heap-objects pattern grounded on the teacher's `Heap<T>`; split
//! into their own module because cells reference them through distinct id
//! types ([`crate::ids::TextId`], [`crate::ids::BytesId`]) rather than
//! sharing `ArrayId`.

use crate::ids::{BytesId, TextId};

#[derive(Debug, Default)]
pub struct Texts {
    slots: Vec<Option<Box<str>>>,
    free: Vec<u32>,
}

impl Texts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, text: impl Into<Box<str>>) -> TextId {
        let text = text.into();
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(text);
            TextId::new(slot as usize)
        } else {
            let id = TextId::new(self.slots.len());
            self.slots.push(Some(text));
            id
        }
    }

    #[must_use]
    pub fn get(&self, id: TextId) -> &str {
        self.slots[id.index()].as_deref().expect("dereferencing a freed TextId")
    }

    pub fn free(&mut self, id: TextId) {
        self.slots[id.index()] = None;
        self.free.push(id.index() as u32);
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[derive(Debug, Default)]
pub struct Blobs {
    slots: Vec<Option<Vec<u8>>>,
    free: Vec<u32>,
}

impl Blobs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, bytes: Vec<u8>) -> BytesId {
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(bytes);
            BytesId::new(slot as usize)
        } else {
            let id = BytesId::new(self.slots.len());
            self.slots.push(Some(bytes));
            id
        }
    }

    #[must_use]
    pub fn get(&self, id: BytesId) -> &[u8] {
        self.slots[id.index()].as_deref().expect("dereferencing a freed BytesId")
    }

    pub fn free(&mut self, id: BytesId) {
        self.slots[id.index()] = None;
        self.free.push(id.index() as u32);
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_round_trips() {
        let mut texts = Texts::new();
        let id = texts.alloc("hello");
        assert_eq!(texts.get(id), "hello");
    }

    #[test]
    fn blob_slots_are_reused() {
        let mut blobs = Blobs::new();
        let a = blobs.alloc(vec![1, 2, 3]);
        blobs.free(a);
        let b = blobs.alloc(vec![4, 5]);
        assert_eq!(a, b);
    }
}
