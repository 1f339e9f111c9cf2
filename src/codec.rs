//! Binary record encoding.
//!
//! Every record moved between workers is encoded with an explicit schema:
//!
//! ```text
//! i64, u64      8 bytes, little endian
//! String        u64 length + UTF-8 bytes
//! Vec<T>        u64 length + each element
//! (A, B)        A followed by B
//! ```
//!
//! A bucket is the concatenation of its encoded records, so it is decoded by
//! reading records until the buffer is exhausted.

use crate::error::{Error, Result};
use std::convert::TryFrom;

pub trait Codec: Sized {
    fn encode(&self, buf: &mut Vec<u8>);

    /// Decodes one value from the front of `buf` and advances it.
    fn decode(buf: &mut &[u8]) -> Result<Self>;
}

fn take<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if buf.len() < len {
        return Err(Error::Codec(format!(
            "truncated record: need {} bytes, {} left",
            len,
            buf.len()
        )));
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn take_array<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N]> {
    let mut array = [0; N];
    array.copy_from_slice(take(buf, N)?);
    Ok(array)
}

impl Codec for u8 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        Ok(take(buf, 1)?[0])
    }
}

impl Codec for i64 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        Ok(i64::from_le_bytes(take_array::<8>(buf)?))
    }
}

impl Codec for u64 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        Ok(u64::from_le_bytes(take_array::<8>(buf)?))
    }
}

fn decode_len(buf: &mut &[u8]) -> Result<usize> {
    let len = u64::decode(buf)?;
    usize::try_from(len).map_err(|_| Error::Codec(format!("length {} overflows", len)))
}

impl Codec for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        (self.len() as u64).encode(buf);
        buf.extend_from_slice(self.as_bytes());
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        let len = decode_len(buf)?;
        String::from_utf8(take(buf, len)?.to_vec()).map_err(|e| Error::Codec(e.to_string()))
    }
}

impl<T: Codec> Codec for Vec<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        (self.len() as u64).encode(buf);
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        let len = decode_len(buf)?;
        // Every element is at least one byte long.
        let mut items = Vec::with_capacity(len.min(buf.len()));
        for _ in 0..len {
            items.push(T::decode(buf)?);
        }
        Ok(items)
    }
}

impl<A: Codec, B: Codec> Codec for (A, B) {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.0.encode(buf);
        self.1.encode(buf);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        let a = A::decode(buf)?;
        Ok((a, B::decode(buf)?))
    }
}

/// Encodes `items` back to back.
pub fn encode_all<'a, T, I>(items: I) -> Vec<u8>
where
    T: Codec + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut buf = Vec::new();
    for item in items {
        item.encode(&mut buf);
    }
    buf
}

/// Decodes records until `buf` is exhausted.
pub fn decode_all<T: Codec>(mut buf: &[u8]) -> Result<Vec<T>> {
    let mut items = Vec::new();
    while !buf.is_empty() {
        items.push(T::decode(&mut buf)?);
    }
    Ok(items)
}
