//! Dense bin store (component B).
//!
//! A contiguous `f64` counter array addressed by `array_index = logical_index
//! - offset`. Growth and re-centering are the hard part: the backing array
//! is grown in fixed-size chunks and re-centered around the midpoint of the
//! requested range so that a long-lived sketch doesn't repeatedly reallocate
//! as its index range drifts.
//!
//! The chunked-growth arithmetic below was reverse-engineered against a
//! golden vector (seven inserts into a fresh store) to be bit-for-bit
//! compatible with the reference implementation; see `DESIGN.md` for how
//! the growth formula was derived. Centering always uses the *logical*
//! (unrounded) required length for the midpoint calculation, and only the
//! physical backing allocation is rounded up to
//! the next multiple of 8; the two must be computed separately or the
//! offset drifts from the reference output.

const GROWTH_OVERHEAD: i64 = 64;
const ALLOC_CHUNK: i64 = 8;

/// A dynamically sized, contiguous, integer-indexed counter array.
#[derive(Debug, Clone)]
pub struct DenseStore {
    bins: Vec<f64>,
    offset: i32,
    min_index: i32,
    max_index: i32,
    total_count: f64,
}

impl Default for DenseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DenseStore {
    pub fn new() -> Self {
        Self {
            bins: Vec::new(),
            offset: 0,
            min_index: i32::MAX,
            max_index: i32::MIN,
            total_count: 0.0,
        }
    }

    pub fn empty(&self) -> bool {
        self.total_count == 0.0
    }

    pub fn total_count(&self) -> f64 {
        self.total_count
    }

    pub fn min_index(&self) -> i32 {
        self.min_index
    }

    pub fn max_index(&self) -> i32 {
        self.max_index
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    fn is_allocated(&self) -> bool {
        !self.bins.is_empty()
    }

    /// Adds `c` at logical index `i`. A `c == 0` call is a no-op.
    pub fn add(&mut self, i: i32, c: f64) {
        if c == 0.0 {
            return;
        }
        if !self.is_allocated() || i < self.min_index || i > self.max_index {
            self.extend_range(i, i);
        }
        let array_index = (i - self.offset) as usize;
        self.bins[array_index] += c;
        self.total_count += c;
    }

    /// The logical index of the `r`-th smallest value in rank order
    /// (0-indexed), walking bins in ascending logical-index order.
    ///
    /// A non-positive rank is treated as `0`. If no bin's cumulative count
    /// exceeds `r`, returns `max_index`.
    pub fn key_at_rank(&self, rank: f64) -> i32 {
        let rank = rank.max(0.0);
        if !self.is_allocated() {
            return self.max_index;
        }
        let mut running = 0.0;
        for (array_index, &count) in self.bins.iter().enumerate() {
            if count == 0.0 {
                continue;
            }
            running += count;
            if running > rank {
                return array_index as i32 + self.offset;
            }
        }
        self.max_index
    }

    /// Produces the dense wire slice: `bins[0..=max_index-min_index]`
    /// re-centered so array position 0 corresponds to `min_index`, plus the
    /// offset of that slice (`contiguous_bin_index_offset`).
    pub fn to_wire(&self) -> (Vec<f64>, i32) {
        if !self.is_allocated() || self.empty() {
            return (Vec::new(), 0);
        }
        let len = (self.max_index - self.min_index + 1) as usize;
        let start = (self.min_index - self.offset) as usize;
        let mut out = vec![0.0; len];
        out.copy_from_slice(&self.bins[start..start + len]);
        (out, self.min_index)
    }

    /// Multiplies every bin and `total_count` by `w` (`w` must be positive).
    pub fn reweight(&mut self, w: f64) {
        debug_assert!(w > 0.0, "reweight factor must be positive");
        for bin in &mut self.bins {
            *bin *= w;
        }
        self.total_count *= w;
    }

    fn new_length(desired: i64) -> (i64, i64) {
        let logical = desired + GROWTH_OVERHEAD - 1;
        let alloc = ALLOC_CHUNK * div_ceil(logical, ALLOC_CHUNK);
        (logical, alloc)
    }

    fn extend_range(&mut self, new_min: i32, new_max: i32) {
        let (new_min, new_max) = if self.is_allocated() {
            (new_min.min(self.min_index), new_max.max(self.max_index))
        } else {
            (new_min, new_max)
        };

        if !self.is_allocated() {
            let desired = i64::from(new_max) - i64::from(new_min) + 1;
            let (logical_len, alloc_len) = Self::new_length(desired);
            self.bins = vec![0.0; alloc_len as usize];
            self.offset = new_min;
            self.min_index = new_min;
            self.max_index = new_max;
            self.center_bins(new_min, new_max, logical_len);
            self.min_index = new_min;
            self.max_index = new_max;
            return;
        }

        if i64::from(new_min) >= i64::from(self.offset)
            && i64::from(new_max) < i64::from(self.offset) + self.bins.len() as i64
        {
            self.min_index = new_min;
            self.max_index = new_max;
            return;
        }

        let desired = i64::from(new_max) - i64::from(new_min) + 1;
        let (logical_len, alloc_len) = Self::new_length(desired);
        if alloc_len > self.bins.len() as i64 {
            self.bins.resize(alloc_len as usize, 0.0);
        }
        self.center_bins(new_min, new_max, logical_len);
        self.min_index = new_min;
        self.max_index = new_max;
    }

    /// Shifts live bins by `delta = offset + floor(logical_len/2) - mid`
    /// and sets `offset -= delta`, where
    /// `mid = new_min + floor((new_max - new_min + 1)/2)`.
    fn center_bins(&mut self, new_min: i32, new_max: i32, logical_len: i64) {
        let mid = i64::from(new_min) + (i64::from(new_max) - i64::from(new_min) + 1) / 2;
        let delta = i64::from(self.offset) + logical_len / 2 - mid;
        if delta == 0 {
            return;
        }
        self.shift_bins(delta);
        self.offset = (i64::from(self.offset) - delta) as i32;
    }

    fn shift_bins(&mut self, delta: i64) {
        let len = self.bins.len();
        let mut shifted = vec![0.0; len];
        if delta > 0 {
            let delta = delta as usize;
            for (src, &value) in self.bins.iter().enumerate() {
                let dst = src + delta;
                if dst < len {
                    shifted[dst] = value;
                }
            }
        } else {
            let delta = (-delta) as usize;
            for (src, &value) in self.bins.iter().enumerate() {
                if src >= delta {
                    shifted[src - delta] = value;
                }
            }
        }
        self.bins = shifted;
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}
