//! Big-endian primitives shared by the snapshot and EdgeInfo layouts.
//!
//! Strings and byte arrays are `u32` length-prefixed; lists are a `u32`
//! count followed by their items.

use std::io::Write;

use crate::error::{CellGraphError, Result};

pub fn write_u8<W: Write>(writer: &mut W, v: u8) -> Result<()> {
    writer.write_all(&[v])?;
    Ok(())
}

pub fn write_u32<W: Write>(writer: &mut W, v: u32) -> Result<()> {
    writer.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn write_i64<W: Write>(writer: &mut W, v: i64) -> Result<()> {
    writer.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| CellGraphError::InvalidFormat(format!("length {} exceeds u32", len)))?;
    write_u32(writer, len)
}

pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    write_len(writer, bytes.len())?;
    writer.write_all(bytes)?;
    Ok(())
}

pub fn write_str<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    write_bytes(writer, s.as_bytes())
}

pub fn write_str_list<'a, W, I>(writer: &mut W, items: I) -> Result<()>
where
    W: Write,
    I: ExactSizeIterator<Item = &'a str>,
{
    write_len(writer, items.len())?;
    for item in items {
        write_str(writer, item)?;
    }
    Ok(())
}

/// Cursor over an encoded buffer. Every read is bounds-checked.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(CellGraphError::InvalidFormat(format!(
                "truncated: need {} bytes at offset {}, {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(buf))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    pub fn read_str(&mut self) -> Result<&'a str> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map_err(|e| CellGraphError::InvalidFormat(format!("string is not UTF-8: {}", e)))
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.read_str().map(str::to_string)
    }

    /// Skip over a length-prefixed field without validating it.
    pub fn skip_bytes(&mut self) -> Result<()> {
        let len = self.read_u32()? as usize;
        self.skip(len)
    }

    pub fn read_str_list(&mut self) -> Result<Vec<String>> {
        let count = self.read_u32()? as usize;
        let mut out = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    /// Read one byte and fail unless it equals `marker`.
    pub fn expect_marker(&mut self, marker: u8, what: &str) -> Result<()> {
        let found = self.read_u8()?;
        if found != marker {
            return Err(CellGraphError::InvalidFormat(format!(
                "expected {} marker 0x{:02X}, found 0x{:02X}",
                what, marker, found
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_big_endian() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 1).unwrap();
        write_i64(&mut buf, -2).unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 1]);

        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u32().unwrap(), 1);
        assert_eq!(r.read_i64().unwrap(), -2);
        assert!(r.is_empty());
    }

    #[test]
    fn test_string_list() {
        let mut buf = Vec::new();
        write_str_list(&mut buf, ["a", "", "ccc"].into_iter()).unwrap();
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_str_list().unwrap(), vec!["a", "", "ccc"]);
    }

    #[test]
    fn test_truncated_read_fails() {
        let mut buf = Vec::new();
        write_str(&mut buf, "hello").unwrap();
        let mut r = Reader::new(&buf[..6]);
        let err = r.read_str().unwrap_err();
        assert!(err.to_string().contains("truncated"), "unexpected error: {}", err);
    }

    #[test]
    fn test_expect_marker() {
        let mut r = Reader::new(&[0xA1, 0xA3]);
        r.expect_marker(0xA1, "start").unwrap();
        let err = r.expect_marker(0xA2, "end").unwrap_err();
        assert!(err.to_string().contains("end marker"));
    }
}
