use bytes::{Buf, BufMut, Bytes};

use crate::wire::ProtocolError;

/// Lengths are `usize` in rust, while the protocol wants `u32`.
pub trait UsizeExt {
    /// This will panic when overflow instead of wrapping.
    fn to_u32(self) -> u32;
}

/// Length prefixed string and byte string operation in [`BufMut`].
pub trait BufMutExt {
    /// Write `u32` length then the string bytes.
    fn put_len_str(&mut self, string: &str);

    /// Write `u32` length then the bytes.
    fn put_len_bytes(&mut self, bytes: &[u8]);

    /// Write `1` and the value, or a single `0` when `None`.
    fn put_opt_i32(&mut self, value: Option<i32>);
}

/// Length prefixed string operation in [`Bytes`].
pub trait BytesExt {
    /// Try to read a `u32` length prefixed byte string.
    fn get_len_bytes(&mut self) -> Result<Bytes, ProtocolError>;

    /// Try to read a `u32` length prefixed utf8 string.
    fn get_len_string(&mut self) -> Result<String, ProtocolError>;

    /// Read value written by [`BufMutExt::put_opt_i32`].
    fn get_opt_i32(&mut self) -> Result<Option<i32>, ProtocolError>;

    /// Read a `u32` element count, rejecting counts larger than remaining bytes.
    fn get_count(&mut self) -> Result<usize, ProtocolError>;
}

impl UsizeExt for usize {
    fn to_u32(self) -> u32 {
        self.try_into().expect("message size too large for protocol")
    }
}

impl<B: BufMut> BufMutExt for B {
    fn put_len_str(&mut self, string: &str) {
        self.put_len_bytes(string.as_bytes());
    }

    fn put_len_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len().to_u32());
        self.put_slice(bytes);
    }

    fn put_opt_i32(&mut self, value: Option<i32>) {
        match value {
            Some(value) => {
                self.put_u8(1);
                self.put_i32(value);
            }
            None => self.put_u8(0),
        }
    }
}

impl BytesExt for Bytes {
    fn get_len_bytes(&mut self) -> Result<Bytes, ProtocolError> {
        let len = self.try_get_u32()? as usize;
        if self.remaining() < len {
            return Err(ProtocolError::Truncated);
        }
        Ok(self.split_to(len))
    }

    fn get_len_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.get_len_bytes()?;
        String::from_utf8(bytes.into()).map_err(|e| ProtocolError::Utf8(e.utf8_error()))
    }

    fn get_opt_i32(&mut self) -> Result<Option<i32>, ProtocolError> {
        match self.try_get_u8()? {
            0 => Ok(None),
            _ => Ok(Some(self.try_get_i32()?)),
        }
    }

    fn get_count(&mut self) -> Result<usize, ProtocolError> {
        let count = self.try_get_u32()? as usize;
        // every element takes at least one byte
        if count > self.remaining() {
            return Err(ProtocolError::Truncated);
        }
        Ok(count)
    }
}
