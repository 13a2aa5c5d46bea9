//! Binary sources the command decoder reads from.
use std::collections::VecDeque;

use crate::Primitive;

/// Trait for types which can be seen as a binary data source.
pub trait BinaryStream {
    /// Prepares the stream for reading.
    fn prepare(&mut self) {}

    /// The currently available data.
    fn data(&self) -> &[u8];

    /// Consumes `amount` bytes from the data.
    fn consume(&mut self, amount: usize);

    /// Returns a reader for the data.
    fn reader(&mut self) -> BinReader<'_>
    where
        Self: Sized,
    {
        BinReader::new(self)
    }
}

impl BinaryStream for &[u8] {
    fn data(&self) -> &[u8] {
        self
    }

    fn consume(&mut self, amount: usize) {
        *self = &self[amount..];
    }
}

/// A transactional reader: nothing is consumed from the stream until [`BinReader::finish`].
pub struct BinReader<'a> {
    data: &'a mut dyn BinaryStream,
    read: usize,
}

impl<'a> BinReader<'a> {
    pub fn new(data: &'a mut dyn BinaryStream) -> Self {
        data.prepare();
        Self { data, read: 0 }
    }

    /// Reads a primitive if there is enough data for it.
    pub fn read_be<P>(&mut self) -> Option<P>
    where
        P: Primitive,
    {
        let slice = &self.data.data()[self.read..];
        (slice.len() >= size_of::<P>()).then(|| {
            self.read += size_of::<P>();
            P::read_be_bytes(slice)
        })
    }

    /// Reads a sequence of `length` bytes if there is enough data for it.
    pub fn read_bytes(&mut self, length: usize) -> Option<Vec<u8>> {
        let slice = &self.data.data()[self.read..];
        (slice.len() >= length).then(|| {
            self.read += length;
            slice[..length].to_vec()
        })
    }

    /// Returns how many bytes of data are remaining in the data.
    pub fn remaining(&self) -> usize {
        self.data.data().len() - self.read
    }

    /// Consumes the read bytes and returns how many bytes were read.
    pub fn finish(self) -> usize {
        self.data.consume(self.read);
        self.read
    }
}

/// A ring buffer of binary data.
#[derive(Debug, Clone, Default)]
pub struct BinRingBuffer {
    data: VecDeque<u8>,
}

impl BinRingBuffer {
    /// Appends a burst of bytes to the back of the buffer.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().copied());
    }

    /// Current length of the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty or not.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BinaryStream for BinRingBuffer {
    fn prepare(&mut self) {
        self.data.make_contiguous();
    }

    fn data(&self) -> &[u8] {
        self.data.as_slices().0
    }

    fn consume(&mut self, amount: usize) {
        self.data.drain(..amount);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unfinished_reads_are_not_consumed() {
        let mut ring = BinRingBuffer::default();
        ring.extend_from_slice(&[0x61, 0x45, 0x00]);

        let mut reader = ring.reader();
        assert_eq!(reader.read_be::<u8>(), Some(0x61));
        assert_eq!(reader.read_be::<u32>(), None);
        drop(reader);
        assert_eq!(ring.len(), 3);

        ring.extend_from_slice(&[0x00, 0x02]);
        let mut reader = ring.reader();
        assert_eq!(reader.read_be::<u8>(), Some(0x61));
        assert_eq!(reader.read_be::<u32>(), Some(0x4500_0002));
        assert_eq!(reader.finish(), 5);
        assert!(ring.is_empty());
    }
}
