//! Open-addressed hash table with tombstones.
//!
//! Written directly from §4.4 and the probe/tombstone invariants in §8 —
//! NOT grounded on `lua_value::lua_table::hash_table.rs`, which delegates to
//! `hashbrown::RawTable` and so can't expose the exact probe-count /
//! tombstone-reuse behavior those invariants test. `std::collections::HashMap`
//! is avoided for the same reason.
//!
//! `Value` equality/hashing for object references that opt into structural
//! comparison (strings, ranges) needs heap access, so this module is generic
//! over a [`ValueOps`] implementation the heap supplies rather than hashing
//! `Value` itself.

use crate::gc::id::ClassId;
use crate::value::Value;

pub trait ValueOps {
    fn hash(&self, v: Value) -> u32;
    fn eq(&self, a: Value, b: Value) -> bool;
}

const MIN_CAPACITY: usize = 16;
const LOAD_FACTOR_CEIL: f64 = 0.75;

#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(Value, Value),
}

#[derive(Debug, Clone)]
pub struct EmberMap {
    slots: Vec<Slot>,
    count: usize,
    /// The class script code sees this map as an instance of. Left
    /// unpopulated by this core — binding a concrete `Map` class is the
    /// embedder's job.
    pub class: Option<ClassId>,
}

impl EmberMap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
            class: None,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn find_slot(slots: &[Slot], key: Value, ops: &dyn ValueOps) -> usize {
        let cap = slots.len() as u32;
        let mut index = ops.hash(key) % cap;
        let mut tombstone: Option<usize> = None;
        loop {
            match slots[index as usize] {
                Slot::Empty => return tombstone.unwrap_or(index as usize),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index as usize);
                    }
                }
                Slot::Occupied(k, _) if ops.eq(k, key) => return index as usize,
                Slot::Occupied(..) => {}
            }
            index = (index + 1) % cap;
        }
    }

    pub fn get(&self, key: Value, ops: &dyn ValueOps) -> Option<Value> {
        if self.slots.is_empty() {
            return None;
        }
        match self.slots[Self::find_slot(&self.slots, key, ops)] {
            Slot::Occupied(_, v) => Some(v),
            _ => None,
        }
    }

    pub fn contains(&self, key: Value, ops: &dyn ValueOps) -> bool {
        self.get(key, ops).is_some()
    }

    /// Insert or update `key -> value`. Returns `true` if this added a new
    /// key (as opposed to overwriting an existing one).
    pub fn set(&mut self, key: Value, value: Value, ops: &dyn ValueOps) -> bool {
        if self.slots.is_empty() || self.count + 1 > self.grow_threshold() {
            self.grow(ops);
        }
        let index = Self::find_slot(&self.slots, key, ops);
        let is_new = !matches!(self.slots[index], Slot::Occupied(..));
        if is_new {
            self.count += 1;
        }
        self.slots[index] = Slot::Occupied(key, value);
        is_new
    }

    /// Remove `key`, leaving a tombstone. Frees the table entirely if this
    /// was the last entry, else shrinks when under-full.
    pub fn remove(&mut self, key: Value, ops: &dyn ValueOps) -> Option<Value> {
        if self.slots.is_empty() {
            return None;
        }
        let index = Self::find_slot(&self.slots, key, ops);
        let removed = match self.slots[index] {
            Slot::Occupied(_, v) => v,
            _ => return None,
        };
        self.slots[index] = Slot::Tombstone;
        self.count -= 1;
        if self.count == 0 {
            self.slots.clear();
        } else {
            self.maybe_shrink(ops);
        }
        Some(removed)
    }

    fn grow_threshold(&self) -> usize {
        (self.slots.len() as f64 * LOAD_FACTOR_CEIL) as usize
    }

    fn grow(&mut self, ops: &dyn ValueOps) {
        let new_cap = if self.slots.is_empty() {
            MIN_CAPACITY
        } else {
            self.slots.len() * 2
        };
        self.resize(new_cap, ops);
    }

    fn maybe_shrink(&mut self, ops: &dyn ValueOps) {
        let cap = self.slots.len();
        if cap <= MIN_CAPACITY {
            return;
        }
        let half = cap / 2;
        if self.count < ((half as f64) * LOAD_FACTOR_CEIL) as usize {
            self.resize(half.max(MIN_CAPACITY), ops);
        }
    }

    fn resize(&mut self, new_cap: usize, ops: &dyn ValueOps) {
        let mut fresh = vec![Slot::Empty; new_cap];
        for slot in &self.slots {
            if let Slot::Occupied(k, v) = *slot {
                let index = Self::find_slot(&fresh, k, ops);
                fresh[index] = Slot::Occupied(k, v);
            }
        }
        self.slots = fresh;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.slots.iter().filter_map(|slot| match *slot {
            Slot::Occupied(k, v) => Some((k, v)),
            _ => None,
        })
    }
}

impl Default for EmberMap {
    fn default() -> Self {
        Self::new()
    }
}
