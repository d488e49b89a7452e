//! Lightweight index newtypes used throughout the crate.
//!
//! Every heap-ish structure (arrays, contexts, actions, frames, virtual-bind
//! patches, interned symbols) is owned by a flat arena and referenced by a
//! small `Copy` index rather than a pointer or `Rc`. This sidesteps the
//! aliasing problems that a pointer-based cyclic graph (frames <-> varlists
//! <-> actions <-> paramlists) would create in safe Rust, at the cost of
//! routing every dereference through the owning arena. See `DESIGN.md` for
//! the rationale (grounded on the teacher's `HeapId`/`StringId`/`NamespaceId`
//! family in `heap.rs`/`intern.rs`/`namespace.rs`).

use std::fmt;

macro_rules! index_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            #[must_use]
            pub fn new(index: usize) -> Self {
                Self(u32::try_from(index).expect(concat!(stringify!($name), " overflow")))
            }

            #[inline]
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

index_id!(ArrayId, "Index into the `Arrays` arena: one heap-allocated block/group/paramlist/varlist/details/patch.");
index_id!(ContextId, "Index into the `Contexts` arena: one object/frame/module/error varlist+keylist pair.");
index_id!(KeylistId, "Index into the `Keylists` arena: a symbol list shared across context instances of one class.");
index_id!(ActionId, "Index into the `Actions` arena: one callable action (paramlist + dispatcher + details).");
index_id!(FrameId, "Identity of a call activation. Stable even if the frame's varlist is later reified.");
index_id!(PatchId, "Index into the `Patches` arena: one link of a virtual-binding override chain.");
index_id!(TextId, "Index into the `Texts` arena backing text/file/tag/issue cell payloads.");
index_id!(BytesId, "Index into the `Blobs` arena backing binary cell payloads.");
