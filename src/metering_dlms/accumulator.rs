use log::error;
use std::time::{Duration, Instant};

use super::DlmsParseError;

/// Collects bytes from the serial line until the meter goes quiet.
///
/// The meter sends a burst and then stays silent for several seconds, so a
/// frame is complete once no byte arrived for `read_timeout`.
pub struct ByteAccumulator {
    buffer: Vec<u8>,
    capacity: usize,
    read_timeout: Duration,
    last_read: Option<Instant>,
}

impl ByteAccumulator {
    /// `capacity` is raised to one byte at least
    pub fn new(capacity: usize, read_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            read_timeout,
            last_read: None,
        }
    }

    /// Appends one byte. On overflow the collected bytes are dropped and the
    /// new byte starts the next frame.
    pub fn feed(&mut self, byte: u8, now: Instant) -> Result<(), DlmsParseError> {
        self.last_read = Some(now);

        if self.buffer.len() >= self.capacity {
            error!("Buffer overflow after {} bytes", self.buffer.len());
            self.reset();
            self.buffer.push(byte);
            return Err(DlmsParseError::BufferOverflow(self.capacity));
        }

        self.buffer.push(byte);
        Ok(())
    }

    /// Hands out the collected frame once the line has been idle long enough
    pub fn poll(&mut self, now: Instant) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }

        let last_read = self.last_read?;
        if now.saturating_duration_since(last_read) <= self.read_timeout {
            return None;
        }

        Some(std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity)))
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_after_idle_timeout() {
        let start = Instant::now();
        let mut acc = ByteAccumulator::new(16, Duration::from_millis(1000));

        for b in [0x68u8, 0xFA, 0xFA, 0x68] {
            acc.feed(b, start).unwrap();
        }

        assert_eq!(acc.poll(start + Duration::from_millis(500)), None);
        assert_eq!(acc.poll(start + Duration::from_millis(1000)), None);

        let frame = acc.poll(start + Duration::from_millis(1001)).unwrap();
        assert_eq!(frame, vec![0x68, 0xFA, 0xFA, 0x68]);
        assert!(acc.is_empty());
        assert_eq!(acc.poll(start + Duration::from_millis(5000)), None);
    }

    #[test]
    fn test_each_byte_restarts_the_timeout() {
        let start = Instant::now();
        let mut acc = ByteAccumulator::new(16, Duration::from_millis(100));
        acc.feed(0x01, start).unwrap();
        acc.feed(0x02, start + Duration::from_millis(90)).unwrap();
        assert_eq!(acc.poll(start + Duration::from_millis(150)), None);
        assert_eq!(acc.poll(start + Duration::from_millis(191)), Some(vec![0x01, 0x02]));
    }

    #[test]
    fn test_empty_buffer_never_completes() {
        let start = Instant::now();
        let mut acc = ByteAccumulator::new(16, Duration::from_millis(10));
        assert_eq!(acc.poll(start + Duration::from_secs(60)), None);
    }

    #[test]
    fn test_overflow_clears_buffer() {
        let start = Instant::now();
        let mut acc = ByteAccumulator::new(4, Duration::from_millis(10));
        for b in 0..4u8 {
            acc.feed(b, start).unwrap();
        }
        assert_eq!(acc.len(), 4);

        let err = acc.feed(0xAA, start).unwrap_err();
        assert_eq!(err, DlmsParseError::BufferOverflow(4));
        assert_eq!(acc.len(), 1);

        /* Nothing of the discarded frame survives */
        let frame = acc.poll(start + Duration::from_millis(11)).unwrap();
        assert_eq!(frame, vec![0xAA]);
    }

    #[test]
    fn test_reset() {
        let start = Instant::now();
        let mut acc = ByteAccumulator::new(4, Duration::from_millis(10));
        acc.feed(0x01, start).unwrap();
        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(acc.poll(start + Duration::from_secs(1)), None);
        assert_eq!(acc.capacity(), 4);
    }

    #[test]
    fn test_zero_capacity_still_bounds_the_buffer() {
        let start = Instant::now();
        let mut acc = ByteAccumulator::new(0, Duration::from_millis(10));
        assert_eq!(acc.capacity(), 1);

        acc.feed(0x01, start).unwrap();
        assert_eq!(acc.feed(0x02, start), Err(DlmsParseError::BufferOverflow(1)));
        assert!(acc.len() <= acc.capacity());
        assert_eq!(acc.poll(start + Duration::from_millis(11)), Some(vec![0x02]));
    }
}
