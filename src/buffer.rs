/// Accumulates samples until a target size is reached.
pub struct Buffer<T: Copy> {
    buf: Vec<T>,
    size: usize,
}

impl<T: Copy> Buffer<T> {
    /// Create a new `Buffer` that fills up at the given number of items.
    pub fn new(size: usize) -> Buffer<T> {
        Buffer {
            buf: Vec::with_capacity(size),
            size: size,
        }
    }

    /// Drop all buffered items.
    pub fn reset(&mut self) { self.buf.clear(); }

    /// Number of items that can still be added.
    pub fn left(&self) -> usize { self.size - self.buf.len() }

    pub fn is_full(&self) -> bool { self.buf.len() == self.size }

    /// Copy as many items as fit from the given slice into the buffer and return the
    /// number of items taken.
    pub fn fill(&mut self, items: &[T]) -> usize {
        let take = std::cmp::min(self.left(), items.len());
        self.buf.extend_from_slice(&items[..take]);
        take
    }

    /// Retrieve the buffered items.
    pub fn get(&self) -> &[T] { &self.buf[..] }
}
