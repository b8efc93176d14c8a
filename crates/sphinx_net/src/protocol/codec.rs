//! # Packet Codec
//!
//! Little-endian primitive readers and writers.
//!
//! ## Design
//!
//! - Writers append to a `Vec`; the datagram size cap is checked once at `finish`
//! - Readers never panic; a short buffer is `None`
//! - Fixed-layout values go through `bytemuck` as raw bytes

use bytemuck::Pod;
use sphinx_shared::MAX_PACKET_SIZE;

use crate::error::{NetError, NetResult};

/// Builds one encoded packet.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    /// Empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Bytes written so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if nothing has been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a u16 length prefix followed by the bytes.
    ///
    /// # Errors
    ///
    /// [`NetError::PacketTooLarge`] if `bytes` is longer than `u16::MAX`.
    pub fn write_prefixed(&mut self, bytes: &[u8]) -> NetResult<()> {
        let len = u16::try_from(bytes.len()).map_err(|_| NetError::PacketTooLarge {
            size: bytes.len(),
            max: usize::from(u16::MAX),
        })?;
        self.write_u16(len);
        self.write_bytes(bytes);
        Ok(())
    }

    /// Writes a Pod value as its raw bytes.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.write_bytes(bytemuck::bytes_of(value));
    }

    /// Returns the encoded packet.
    ///
    /// # Errors
    ///
    /// [`NetError::PacketTooLarge`] if it exceeds the datagram size.
    pub fn finish(self) -> NetResult<Vec<u8>> {
        if self.buffer.len() > MAX_PACKET_SIZE {
            return Err(NetError::PacketTooLarge {
                size: self.buffer.len(),
                max: MAX_PACKET_SIZE,
            });
        }
        Ok(self.buffer)
    }
}

/// Reads one encoded packet.
pub struct PacketReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    /// Reader over `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Bytes not yet read.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    /// Reads a u16 in little-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Borrows the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        let bytes = self.buffer.get(self.position..end)?;
        self.position = end;
        Some(bytes)
    }

    /// Reads a u16 length prefix and borrows that many bytes.
    pub fn read_prefixed(&mut self) -> Option<&'a [u8]> {
        let len = self.read_u16()?;
        self.read_bytes(usize::from(len))
    }

    /// Reads a Pod value from raw bytes.
    #[inline]
    pub fn read_pod<T: Pod>(&mut self) -> Option<T> {
        let bytes = self.read_bytes(std::mem::size_of::<T>())?;
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }

    /// Fails unless every byte was consumed.
    ///
    /// # Errors
    ///
    /// [`NetError::MalformedPacket`] on trailing bytes.
    pub fn finish(&self) -> NetResult<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(NetError::MalformedPacket("trailing bytes"))
        }
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        bytes.try_into().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut writer = PacketWriter::new();
        writer.write_u8(0xAB);
        writer.write_u16(0x0102);
        writer.write_u32(0x0304_0506);
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes, vec![0xAB, 0x02, 0x01, 0x06, 0x05, 0x04, 0x03]);

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_u8(), Some(0xAB));
        assert_eq!(reader.read_u16(), Some(0x0102));
        assert_eq!(reader.read_u32(), Some(0x0304_0506));
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_short_buffer_reads_none() {
        let mut reader = PacketReader::new(&[1, 2, 3]);
        assert_eq!(reader.read_u32(), None);
        // A failed read consumes nothing
        assert_eq!(reader.remaining(), 3);
        assert_eq!(reader.read_prefixed(), None);
    }

    #[test]
    fn test_prefixed_bytes() {
        let mut writer = PacketWriter::new();
        writer.write_prefixed(&[9, 8, 7]).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_prefixed(), Some(&[9u8, 8, 7][..]));
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_pod_values() {
        let position = sphinx_shared::Vec3::new(1.0, -2.0, 0.5);
        let mut writer = PacketWriter::new();
        writer.write_pod(&position);
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), 12);

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_pod::<sphinx_shared::Vec3>(), Some(position));
        assert_eq!(reader.read_pod::<u32>(), None);
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let mut writer = PacketWriter::new();
        writer.write_bytes(&vec![0; MAX_PACKET_SIZE + 1]);
        assert!(matches!(writer.finish(), Err(NetError::PacketTooLarge { .. })));
    }
}
