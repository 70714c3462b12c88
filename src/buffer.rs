//! A growable contiguous sequence with the spec's mandated growth policy.
//!
//! Ground: shape borrowed from `lua_value::lua_table::value_array`'s thin
//! owning wrapper, but the growth/shrink arithmetic comes straight from §4.3
//! and §4.6 / §8 invariant 4 — `Vec`'s own amortized growth doesn't expose
//! the doubling-from-`MIN_CAPACITY` and shrink-to-half formula under test, so
//! this is written by hand rather than delegated.

pub const MIN_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct Buffer<T> {
    data: Vec<T>,
}

impl<T: Clone> Buffer<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.data.get_mut(index)
    }

    fn grown_capacity(count: usize) -> usize {
        let mut cap = MIN_CAPACITY.max(1);
        while cap < count {
            cap *= 2;
        }
        cap
    }

    fn reserve_for(&mut self, needed: usize) {
        if needed > self.data.capacity() {
            let target = Self::grown_capacity(needed);
            self.data.reserve_exact(target - self.data.len());
        }
    }

    /// Append one value, doubling capacity (from an effective floor of
    /// `MIN_CAPACITY`) whenever the next write would overflow it.
    pub fn write(&mut self, value: T) {
        self.reserve_for(self.data.len() + 1);
        self.data.push(value);
    }

    /// Append `n` copies of `value`.
    pub fn fill(&mut self, value: T, n: usize) {
        self.reserve_for(self.data.len() + n);
        for _ in 0..n {
            self.data.push(value.clone());
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.data.shrink_to_fit();
    }

    /// Shrink backing storage to half its capacity if occupancy has dropped
    /// to `capacity/2` or below. Never below `MIN_CAPACITY`.
    fn maybe_shrink(&mut self) {
        let cap = self.data.capacity();
        if cap > MIN_CAPACITY && self.data.len() <= cap / 2 {
            let new_cap = (cap / 2).max(MIN_CAPACITY).max(self.data.len());
            let mut shrunk = Vec::with_capacity(new_cap);
            shrunk.extend(self.data.drain(..));
            self.data = shrunk;
        }
    }

    /// Insert `value` at `index`, shifting `[index..]` right by one.
    pub fn insert(&mut self, index: usize, value: T) {
        self.reserve_for(self.data.len() + 1);
        self.data.insert(index, value);
    }

    /// Remove and return the value at `index`, shifting `[index+1..]` left
    /// by one, then applying the shrink policy.
    pub fn remove(&mut self, index: usize) -> T {
        let value = self.data.remove(index);
        self.maybe_shrink();
        value
    }
}

impl<T: Clone> Default for Buffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
