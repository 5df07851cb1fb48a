//! Fixed-size bit vectors indexed by geodesic vertex, face or atom ids.

use std::fmt;

const WORD_BITS: usize = u64::BITS as usize;

/// A bitset whose length is fixed at construction.
///
/// Reads past the end return `false`; writes past the end are a bug in the
/// caller and panic like slice indexing does.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Bitmap {
    len: usize,
    words: Vec<u64>,
}

impl Bitmap {
    /// All bits clear.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            words: vec![0; len.div_ceil(WORD_BITS)],
        }
    }

    /// All bits set.
    pub fn full(len: usize) -> Self {
        let mut map = Self::new(len);
        map.set_all();
        map
    }

    pub fn from_indices(len: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut map = Self::new(len);
        for i in indices {
            map.set(i);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.words[i / WORD_BITS] & (1 << (i % WORD_BITS)) != 0
    }

    pub fn set(&mut self, i: usize) {
        assert!(i < self.len, "bit {i} out of range for bitmap of {}", self.len);
        self.words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
    }

    pub fn clear(&mut self, i: usize) {
        assert!(i < self.len, "bit {i} out of range for bitmap of {}", self.len);
        self.words[i / WORD_BITS] &= !(1 << (i % WORD_BITS));
    }

    pub fn set_all(&mut self) {
        self.words.fill(u64::MAX);
        self.trim_tail();
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    pub fn all(&self) -> bool {
        self.count_ones() == self.len
    }

    /// `self |= other`, over the common prefix.
    pub fn union_with(&mut self, other: &Bitmap) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
        self.trim_tail();
    }

    /// `self &= other`; bits beyond `other`'s length are cleared.
    pub fn intersect_with(&mut self, other: &Bitmap) {
        for (i, a) in self.words.iter_mut().enumerate() {
            *a &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    pub fn intersection(&self, other: &Bitmap) -> Bitmap {
        let mut out = self.clone();
        out.intersect_with(other);
        out
    }

    /// Indices of the set bits in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(w * WORD_BITS + tz)
            })
        })
    }

    fn trim_tail(&mut self) {
        let rem = self.len % WORD_BITS;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({}/{}: ", self.count_ones(), self.len)?;
        f.debug_list().entries(self.ones()).finish()?;
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear() {
        let mut map = Bitmap::new(130);
        assert!(!map.any());
        map.set(0);
        map.set(64);
        map.set(129);
        assert!(map.get(0) && map.get(64) && map.get(129));
        assert!(!map.get(1));
        assert_eq!(map.count_ones(), 3);
        map.clear(64);
        assert!(!map.get(64));
        assert_eq!(map.ones().collect::<Vec<_>>(), vec![0, 129]);
    }

    #[test]
    fn full_map_counts_only_its_length() {
        let map = Bitmap::full(42);
        assert_eq!(map.count_ones(), 42);
        assert!(map.all());
        assert!(!map.get(42), "bits past the end must read as clear");
    }

    #[test]
    fn union_and_intersection() {
        let a = Bitmap::from_indices(70, [1, 5, 66]);
        let b = Bitmap::from_indices(70, [5, 6, 69]);
        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.ones().collect::<Vec<_>>(), vec![1, 5, 6, 66, 69]);
        assert_eq!(a.intersection(&b).ones().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn set_past_the_end_panics() {
        let mut map = Bitmap::new(12);
        map.set(12);
    }
}
