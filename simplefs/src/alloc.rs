#[derive(Debug, PartialEq, Clone, Copy)]
pub enum State {
    Free,
    Used,
}

/// Tracks the allocation state of every block in the volume, one bit per block packed
/// into 64-bit words. Bit `n % 64` of word `n / 64` belongs to block `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    /// The number of addressable blocks. Trailing bits of the last word past this value are
    /// never set.
    len: usize,
}

/// The number of `u64` words needed to hold `len` bits.
fn word_count(len: usize) -> usize {
    len / 64 + (len % 64 != 0) as usize
}

impl Bitmap {
    /// Creates a bitmap of `len` blocks, all free.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; word_count(len)],
            len,
        }
    }

    /// Rebuilds a bitmap from its raw words. Returns `None` if the word count does not match
    /// `len` or a bit past the end is set.
    pub fn from_words(words: Vec<u64>, len: usize) -> Option<Self> {
        if words.len() != word_count(len) {
            return None;
        }
        let bmp = Self { words, len };
        let tail = len % 64;
        if tail != 0 {
            let last = bmp.words[bmp.words.len() - 1];
            if last >> tail != 0 {
                return None;
            }
        }
        Some(bmp)
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, blocknr: usize) -> State {
        assert!(blocknr < self.len, "block {} out of range", blocknr);
        // Grab of the u64 containing the significant bit.
        let outer_offset = self.words[blocknr / 64];

        let inner_offset = blocknr % 64;
        let mask = 0b01_u64 << inner_offset;
        let block_state = (outer_offset & mask) >> inner_offset;
        match block_state {
            0 => State::Free,
            1 => State::Used,
            _ => unreachable!("Block state returned a non 0 or 1 value. This likely indicates an error with bitmasking"),
        }
    }

    pub fn set_reserved(&mut self, blocknr: usize) {
        assert!(blocknr < self.len, "block {} out of range", blocknr);
        let mask = 0b01_u64 << (blocknr % 64);
        self.words[blocknr / 64] |= mask;
    }

    pub fn set_free(&mut self, blocknr: usize) {
        assert!(blocknr < self.len, "block {} out of range", blocknr);
        let mask = 0b01_u64 << (blocknr % 64);
        self.words[blocknr / 64] &= !mask;
    }

    /// Sets `n` consecutive blocks beginning at `start` to used or free.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past the end of the bitmap. Callers are expected to have
    /// obtained the range from [`Bitmap::find_contiguous`] or from a live allocation record.
    pub fn mark(&mut self, start: usize, n: usize, used: bool) {
        assert!(
            start.checked_add(n).map_or(false, |end| end <= self.len),
            "range {}+{} exceeds bitmap of {} blocks",
            start,
            n,
            self.len
        );
        for blocknr in start..start + n {
            if used {
                self.set_reserved(blocknr);
            } else {
                self.set_free(blocknr);
            }
        }
    }

    /// First-fit search for `n` consecutive free blocks, scanning from the lowest address.
    ///
    /// A zero block request always succeeds at block 0 and reserves nothing, including on a
    /// volume with no free blocks.
    pub fn find_contiguous(&self, n: usize) -> Option<usize> {
        if n == 0 {
            return Some(0);
        }
        let mut run_start = 0;
        let mut run_len = 0;
        for blocknr in 0..self.len {
            match self.get(blocknr) {
                State::Free => {
                    if run_len == 0 {
                        run_start = blocknr;
                    }
                    run_len += 1;
                    if run_len == n {
                        return Some(run_start);
                    }
                }
                State::Used => run_len = 0,
            }
        }
        None
    }

    pub fn used_blocks(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn free_blocks(&self) -> usize {
        self.len - self.used_blocks()
    }

    pub fn iter(&self) -> impl Iterator<Item = State> + '_ {
        (0..self.len).map(move |blocknr| self.get(blocknr))
    }
}
