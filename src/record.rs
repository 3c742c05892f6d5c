//! Fixed-size little-endian encoding of everything that is written to disk.
//!
//! Element files, sorter runs, and spilled priority-queue runs are plain arrays of records, so a
//! record can be located by its index alone and streams can be read in both directions.

use std::fmt::Debug;

use crate::ptr::{Label, Ptr};

/// A value with a fixed-width binary representation.
pub trait Record: Copy + Debug + Send + Sync + 'static {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Serializes into exactly [`Self::SIZE`] bytes.
    fn write_le(&self, buf: &mut [u8]);

    /// Deserializes from exactly [`Self::SIZE`] bytes.
    fn read_le(buf: &[u8]) -> Self;
}

pub(crate) fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

pub(crate) fn write_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_ptr(buf: &[u8], at: usize) -> Ptr {
    Ptr::from_raw(read_u64(buf, at))
}

pub(crate) fn write_ptr(buf: &mut [u8], at: usize, ptr: Ptr) {
    write_u64(buf, at, ptr.raw());
}

impl Record for Ptr {
    const SIZE: usize = 8;

    fn write_le(&self, buf: &mut [u8]) {
        write_ptr(buf, 0, *self);
    }

    fn read_le(buf: &[u8]) -> Self {
        read_ptr(buf, 0)
    }
}

impl Record for Label {
    const SIZE: usize = 4;

    fn write_le(&self, buf: &mut [u8]) {
        write_u32(buf, 0, *self);
    }

    fn read_le(buf: &[u8]) -> Self {
        read_u32(buf, 0)
    }
}

impl Record for u64 {
    const SIZE: usize = 8;

    fn write_le(&self, buf: &mut [u8]) {
        write_u64(buf, 0, *self);
    }

    fn read_le(buf: &[u8]) -> Self {
        read_u64(buf, 0)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn encode<T: Record>(value: T) -> Vec<u8> {
        let mut buf = vec![0u8; T::SIZE];
        value.write_le(&mut buf);
        buf
    }

    #[test]
    fn test_ptr_is_little_endian() {
        let p = Ptr::node(1, 0);
        let bytes = encode(p);
        assert_eq!(bytes, p.raw().to_le_bytes());
        assert_eq!(Ptr::read_le(&bytes), p);
    }

    #[test]
    fn test_label_width() {
        let bytes = encode::<Label>(0x0102_0304);
        assert_eq!(bytes, [4, 3, 2, 1]);
    }
}
