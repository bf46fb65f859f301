/// Fixed-length bitmap with an O(1) population count, used to flag the
/// tile-local cells that currently carry water.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitMask {
    words: Vec<u64>,
    len: usize,
    ones: usize,
}

impl BitMask {
    pub fn new(len: usize) -> Self {
        Self { words: vec![0; len.div_ceil(64)], len, ones: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn count_ones(&self) -> usize {
        self.ones
    }

    #[inline]
    pub fn any(&self) -> bool {
        self.ones > 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "bit {i} out of range {}", self.len);
        self.words[i / 64] & (1 << (i % 64)) != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: bool) {
        assert!(i < self.len, "bit {i} out of range {}", self.len);
        let word = &mut self.words[i / 64];
        let mask = 1u64 << (i % 64);
        let was = *word & mask != 0;
        if value && !was {
            *word |= mask;
            self.ones += 1;
        } else if !value && was {
            *word &= !mask;
            self.ones -= 1;
        }
    }

    #[inline]
    pub fn insert(&mut self, i: usize) {
        self.set(i, true);
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
        self.ones = 0;
    }

    #[inline]
    pub(crate) fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Snapshot of one 64-bit word; lets callers walk set bits while mutating
    /// the mask.
    #[inline]
    pub(crate) fn word(&self, w: usize) -> u64 {
        self.words[w]
    }

    /// Indices of set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let b = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(w * 64 + b)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_tracks_population() {
        let mut m = BitMask::new(130);
        assert!(!m.any());
        m.insert(0);
        m.insert(64);
        m.insert(129);
        m.insert(64);
        assert_eq!(m.count_ones(), 3);
        assert_eq!(m.iter_ones().collect::<Vec<_>>(), vec![0, 64, 129]);
        m.set(64, false);
        m.set(64, false);
        assert_eq!(m.count_ones(), 2);
        assert!(!m.get(64));
        m.clear();
        assert!(!m.any());
    }
}
