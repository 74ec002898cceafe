//! Bounded list of recent debug lines

/// Lines kept for on-screen display
pub const DEBUG_RING_CAPACITY: usize = 16;

/// Keeps the most recent `capacity` lines in insertion order.
#[derive(Debug, Clone)]
pub struct DebugRing {
    lines: Vec<String>,
    capacity: usize,
}

impl DebugRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends `line`, then drops however many of the oldest lines exceed
    /// the capacity in one step.
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
        if self.lines.len() > self.capacity {
            let excess = self.lines.len() - self.capacity;
            self.lines.drain(..excess);
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for DebugRing {
    fn default() -> Self {
        Self::new(DEBUG_RING_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_everything_below_capacity() {
        let mut ring = DebugRing::default();
        for i in 0..10 {
            ring.push(format!("line {i}"));
        }
        assert_eq!(ring.len(), 10);
        assert_eq!(ring.lines()[0], "line 0");
    }

    #[test]
    fn test_ring_keeps_last_sixteen_in_order() {
        let mut ring = DebugRing::default();
        for i in 0..40 {
            ring.push(format!("line {i}"));
            assert!(ring.len() <= DEBUG_RING_CAPACITY);
        }

        let expected: Vec<String> = (24..40).map(|i| format!("line {i}")).collect();
        assert_eq!(ring.lines(), expected.as_slice());
    }

    #[test]
    fn test_ring_at_exact_capacity() {
        let mut ring = DebugRing::new(3);
        ring.push("a");
        ring.push("b");
        ring.push("c");
        assert_eq!(ring.lines(), &["a", "b", "c"]);

        ring.push("d");
        assert_eq!(ring.lines(), &["b", "c", "d"]);
    }
}
