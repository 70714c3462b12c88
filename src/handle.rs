//! Pinned API handles: a reference an embedder holds across calls that must
//! survive GC even though it isn't reachable from any fiber or module.
//!
//! Ground: `lua_vm::lua_ref.rs`'s refcounted external-reference table —
//! same "the table of outstanding handles is itself a GC root, a handle's
//! drop decrements a count and frees the slot at zero" shape.

use crate::gc::id::ObjRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u32);

struct Slot {
    value: ObjRef,
    ref_count: u32,
}

#[derive(Default)]
pub struct HandleTable {
    slots: Vec<Option<Slot>>,
    free_list: Vec<u32>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&mut self, value: ObjRef) -> HandleId {
        let slot = Slot { value, ref_count: 1 };
        if let Some(id) = self.free_list.pop() {
            self.slots[id as usize] = Some(slot);
            HandleId(id)
        } else {
            let id = self.slots.len() as u32;
            self.slots.push(Some(slot));
            HandleId(id)
        }
    }

    pub fn retain(&mut self, handle: HandleId) {
        if let Some(Some(slot)) = self.slots.get_mut(handle.0 as usize) {
            slot.ref_count += 1;
        }
    }

    /// Drop one reference to `handle`, freeing its slot once the count
    /// reaches zero. Returns `true` if the slot was freed.
    pub fn unpin(&mut self, handle: HandleId) -> bool {
        let Some(Some(slot)) = self.slots.get_mut(handle.0 as usize) else {
            return false;
        };
        slot.ref_count -= 1;
        if slot.ref_count == 0 {
            self.slots[handle.0 as usize] = None;
            self.free_list.push(handle.0);
            true
        } else {
            false
        }
    }

    pub fn get(&self, handle: HandleId) -> Option<ObjRef> {
        self.slots.get(handle.0 as usize)?.as_ref().map(|s| s.value)
    }

    /// Every pinned value, for the collector to treat as a root.
    pub fn roots(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.slots.iter().filter_map(|s| s.as_ref().map(|s| s.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::id::ObjKind;

    #[test]
    fn unpin_frees_only_at_zero_refs() {
        let mut table = HandleTable::new();
        let r = ObjRef::new(ObjKind::String, 7);
        let h = table.pin(r);
        table.retain(h);
        assert!(!table.unpin(h));
        assert_eq!(table.get(h), Some(r));
        assert!(table.unpin(h));
        assert_eq!(table.get(h), None);
    }
}
