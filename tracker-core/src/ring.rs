//! Fixed-capacity circular sample buffer.
//!
//! The engine sizes this at twice the analysis window, which guarantees
//! that the most recent window never overlaps the write frontier while
//! it is being copied out.

/// A fixed-size ring of samples with a single write cursor. Allocated
/// once and never reallocated; pushing is a store plus a modulo advance.
#[derive(Debug, Clone)]
pub struct SampleRingBuffer {
    data: Box<[f32]>,
    write_pos: usize,
}

impl SampleRingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        SampleRingBuffer {
            data: vec![0.0; capacity].into_boxed_slice(),
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Appends one sample, overwriting the oldest slot once full.
    pub fn push(&mut self, sample: f32) {
        self.data[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.data.len();
    }

    /// Copies the most recent `out.len()` samples into `out`, oldest
    /// first. Slots that have never been written read as zero, so a
    /// partially filled buffer yields a zero-padded window.
    pub fn copy_latest(&self, out: &mut [f32]) {
        let capacity = self.data.len();
        debug_assert!(out.len() <= capacity);
        let start = (self.write_pos + capacity - out.len()) % capacity;
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.data[(start + i) % capacity];
        }
    }

    /// Zeroes the buffer and rewinds the write cursor.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_window_is_contiguous_across_the_wrap() {
        let mut ring = SampleRingBuffer::with_capacity(8);
        for i in 0..11 {
            ring.push(i as f32);
        }
        let mut window = [0.0; 4];
        ring.copy_latest(&mut window);
        assert_eq!(window, [7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn partially_filled_buffer_reads_as_zero_padded() {
        let mut ring = SampleRingBuffer::with_capacity(8);
        ring.push(1.0);
        ring.push(2.0);
        let mut window = [f32::NAN; 4];
        ring.copy_latest(&mut window);
        assert_eq!(window, [0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn clear_rewinds_and_zeroes() {
        let mut ring = SampleRingBuffer::with_capacity(4);
        for i in 0..7 {
            ring.push(1.0 + i as f32);
        }
        ring.clear();
        let mut window = [f32::NAN; 4];
        ring.copy_latest(&mut window);
        assert_eq!(window, [0.0; 4]);
    }
}
