//! Wire layout of an emitted block.
//!
//! ```text
//! ┌────────────┬──────────────────────────┐
//! │ id (3B LE) │ payload (block_size B)   │
//! └────────────┴──────────────────────────┘
//! ```

use super::CodecError;

/// Bytes used by the id prefix.
pub const WIRE_ID_BYTES: usize = 3;

/// Largest id representable on the wire.
pub const MAX_WIRE_ID: u32 = (1 << 24) - 1;

/// One generated block and its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Output slot id; ids below K are message blocks.
    pub id: u32,
    /// Block contents.
    pub payload: Vec<u8>,
}

impl Block {
    /// Pairs an id with its payload.
    #[must_use]
    pub const fn new(id: u32, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    /// Encoded length: id prefix plus payload.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        WIRE_ID_BYTES + self.payload.len()
    }

    /// Writes the frame into `out`, returning the bytes written.
    pub fn write_to(&self, out: &mut [u8]) -> Result<usize, CodecError> {
        if self.id > MAX_WIRE_ID {
            return Err(CodecError::BlockIdOutOfRange { id: self.id });
        }
        let len = self.wire_len();
        if out.len() < len {
            return Err(CodecError::malformed(format!(
                "output buffer holds {} bytes, frame needs {len}",
                out.len()
            )));
        }
        out[..WIRE_ID_BYTES].copy_from_slice(&self.id.to_le_bytes()[..WIRE_ID_BYTES]);
        out[WIRE_ID_BYTES..len].copy_from_slice(&self.payload);
        Ok(len)
    }

    /// Encodes the frame into a new buffer.
    pub fn to_wire(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = vec![0u8; self.wire_len()];
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parses a frame carrying exactly `block_size` payload bytes.
    pub fn from_wire(bytes: &[u8], block_size: usize) -> Result<Self, CodecError> {
        let expected = WIRE_ID_BYTES + block_size;
        if bytes.len() != expected {
            return Err(CodecError::malformed(format!(
                "frame is {} bytes, expected {expected}",
                bytes.len()
            )));
        }
        let id = u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16;
        Ok(Self {
            id,
            payload: bytes[WIRE_ID_BYTES..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_little_endian() {
        let block = Block::new(0x0a_0b_0c, vec![0xee, 0xff]);
        assert_eq!(block.to_wire().unwrap(), vec![0x0c, 0x0b, 0x0a, 0xee, 0xff]);
    }

    #[test]
    fn parses_its_own_frames() {
        let block = Block::new(MAX_WIRE_ID, vec![1, 2, 3, 4]);
        let bytes = block.to_wire().unwrap();
        assert_eq!(Block::from_wire(&bytes, 4).unwrap(), block);
    }

    #[test]
    fn rejects_ids_beyond_24_bits() {
        let err = Block::new(MAX_WIRE_ID + 1, vec![0]).to_wire().unwrap_err();
        assert_eq!(err, CodecError::BlockIdOutOfRange { id: 1 << 24 });
    }

    #[test]
    fn rejects_wrong_frame_lengths() {
        assert!(matches!(
            Block::from_wire(&[0, 0, 0, 1, 2], 3),
            Err(CodecError::MalformedBlock { .. })
        ));
        assert!(matches!(
            Block::from_wire(&[0, 0, 0, 1, 2, 3, 4], 3),
            Err(CodecError::MalformedBlock { .. })
        ));
        assert!(matches!(
            Block::from_wire(&[0, 0], 0),
            Err(CodecError::MalformedBlock { .. })
        ));
    }

    #[test]
    fn short_output_buffer_is_rejected() {
        let block = Block::new(7, vec![0; 8]);
        let mut buf = [0u8; 10];
        assert!(matches!(
            block.write_to(&mut buf),
            Err(CodecError::MalformedBlock { .. })
        ));
        let mut buf = [0u8; 16];
        assert_eq!(block.write_to(&mut buf).unwrap(), 11);
        assert_eq!(&buf[..3], &[7, 0, 0]);
    }
}
