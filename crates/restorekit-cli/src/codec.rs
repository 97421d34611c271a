use std::io::Read;

use bson::Document;
use restorekit_core::{DocCodec, RestoreError};

/// Plain BSON: peeks the 4-byte little-endian length prefix to tell a clean
/// end of stream from a genuine document. This is the only wire format
/// directory dumps and file-backed oplogs use.
pub struct BsonCodec;

impl DocCodec for BsonCodec {
    fn decode_next(&self, reader: &mut dyn Read) -> Result<Option<Document>, RestoreError> {
        let mut len_bytes = [0u8; 4];
        let mut read = 0;
        while read < 4 {
            match reader.read(&mut len_bytes[read..]) {
                Ok(0) if read == 0 => return Ok(None),
                Ok(0) => return Err(RestoreError::InputCorrupt("truncated document length".into())),
                Ok(n) => read += n,
                Err(e) => return Err(e.into()),
            }
        }
        let len = i32::from_le_bytes(len_bytes) as usize;
        if len < 4 {
            return Err(RestoreError::InputCorrupt(format!("implausible document length {len}")));
        }
        let mut body = vec![0u8; len];
        body[..4].copy_from_slice(&len_bytes);
        reader
            .read_exact(&mut body[4..])
            .map_err(|_| RestoreError::InputCorrupt("truncated document body".into()))?;
        self.decode_bytes(&body).map(Some)
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<Document, RestoreError> {
        Document::from_reader(bytes).map_err(|e| RestoreError::InputCorrupt(e.to_string()))
    }
}
