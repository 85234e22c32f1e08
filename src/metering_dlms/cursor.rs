use super::DlmsParseError;

/// Read position over a decrypted APDU. Every read is bounds checked and
/// only moves the position on success.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos: pos.min(data.len()) }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn ensure(&self, needed: usize) -> Result<(), DlmsParseError> {
        if self.remaining() < needed {
            return Err(DlmsParseError::Truncated {
                position: self.pos,
                needed: needed - self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DlmsParseError> {
        self.ensure(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16_be(&mut self) -> Result<u16, DlmsParseError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, DlmsParseError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DlmsParseError> {
        self.ensure(len)?;
        let data = self.data;
        let slice = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Byte `offset` positions ahead of the cursor, without consuming it
    pub fn peek_at(&self, offset: usize) -> Result<u8, DlmsParseError> {
        self.ensure(offset + 1)?;
        Ok(self.data[self.pos + offset])
    }

    pub fn peek_slice(&self, offset: usize, len: usize) -> Result<&'a [u8], DlmsParseError> {
        self.ensure(offset + len)?;
        let data = self.data;
        Ok(&data[self.pos + offset..self.pos + offset + len])
    }

    /// Byte `distance` positions behind the cursor
    pub fn peek_back(&self, distance: usize) -> Option<u8> {
        if distance == 0 || distance > self.pos {
            return None;
        }
        Some(self.data[self.pos - distance])
    }

    /// Skips up to `len` bytes, stopping at the end of the data
    pub fn advance(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.data.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_big_endian() {
        let data = [0x08, 0xFC, 0x00, 0x00, 0x12, 0x34];
        let mut cursor = ByteCursor::new(&data, 0);
        assert_eq!(cursor.read_u16_be().unwrap(), 2300);
        assert_eq!(cursor.read_u32_be().unwrap(), 0x1234);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_short_read_does_not_move() {
        let data = [0x01, 0x02, 0x03];
        let mut cursor = ByteCursor::new(&data, 1);
        let err = cursor.read_u32_be().unwrap_err();
        assert_eq!(err, DlmsParseError::Truncated { position: 1, needed: 2 });
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_u8().unwrap(), 0x02);
    }

    #[test]
    fn test_peek() {
        let data = [0xAA, 0xBB, 0xCC, 0xDD];
        let cursor = ByteCursor::new(&data, 1);
        assert_eq!(cursor.peek_at(0).unwrap(), 0xBB);
        assert_eq!(cursor.peek_at(2).unwrap(), 0xDD);
        assert!(cursor.peek_at(3).is_err());
        assert_eq!(cursor.peek_slice(1, 2).unwrap(), &[0xCC, 0xDD]);
        assert_eq!(cursor.peek_back(1), Some(0xAA));
        assert_eq!(cursor.peek_back(2), None);
    }

    #[test]
    fn test_advance_stops_at_end() {
        let data = [0u8; 4];
        let mut cursor = ByteCursor::new(&data, 2);
        cursor.advance(10);
        assert_eq!(cursor.position(), 4);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.remaining(), 0);
    }
}
