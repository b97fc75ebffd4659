#[derive(Debug, PartialEq, Clone, Copy)]
pub enum State {
    Free,
    Used,
}

const WORD_BITS: usize = 64;

/// Occupancy map for a fixed number of slots, one bit per slot. A set bit
/// marks the slot as used.
#[derive(Debug, Clone)]
pub struct Bitmap {
    bitmap: Vec<u64>,
    /// Number of addressable slots. Bits past this index are never handed out.
    len: usize,
}

impl Bitmap {
    pub fn new(len: usize) -> Self {
        Self {
            bitmap: vec![0; (len + WORD_BITS - 1) / WORD_BITS],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn get(&self, slot: usize) -> State {
        assert!(slot < self.len, "slot {} out of range", slot);
        // Grab the u64 containing the significant bit.
        let word = self.bitmap[slot / WORD_BITS];

        let inner_offset = slot % WORD_BITS;
        let mask = 0b01_u64 << inner_offset;
        match (word & mask) >> inner_offset {
            0 => State::Free,
            1 => State::Used,
            _ => unreachable!("Slot state returned a non 0 or 1 value. This likely indicates an error with bitmasking"),
        }
    }

    pub fn set_reserved(&mut self, slot: usize) {
        assert!(slot < self.len, "slot {} out of range", slot);
        let mask = 0b01_u64 << (slot % WORD_BITS);
        self.bitmap[slot / WORD_BITS] |= mask;
    }

    pub fn set_free(&mut self, slot: usize) {
        assert!(slot < self.len, "slot {} out of range", slot);
        let mask = 0b01_u64 << (slot % WORD_BITS);
        self.bitmap[slot / WORD_BITS] &= !mask;
    }

    /// Number of slots currently marked used.
    pub fn count_used(&self) -> usize {
        self.bitmap.iter().map(|word| word.count_ones() as usize).sum()
    }
}

/// Implements a naive first-fit allocation policy over a bitmap. Each call to
/// the iterator returns the next free slot at or after the previous one, lowest
/// index first, so a freed low slot is always reused before a higher one.
pub struct NextAvailableAllocation<'a> {
    /// Keeps track of the next starting place for looking for available slots.
    marker: usize,
    bitmap: &'a Bitmap,
}

impl<'a> NextAvailableAllocation<'a> {
    pub fn new(bitmap: &'a Bitmap) -> Self {
        Self { marker: 0, bitmap }
    }
}

impl<'a> Iterator for NextAvailableAllocation<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        for i in self.marker..self.bitmap.len() {
            if let State::Free = self.bitmap.get(i) {
                self.marker = i + 1;
                return Some(i);
            }
        }
        self.marker = self.bitmap.len();
        None
    }
}
