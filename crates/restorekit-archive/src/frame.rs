use std::io::{self, Read};

use crate::error::ArchiveError;

pub const TAG_DOCUMENT: u8 = 0x01;
pub const TAG_END_OF_NAMESPACE: u8 = 0x02;
pub const TAG_END_OF_ARCHIVE: u8 = 0xFF;

#[derive(Debug)]
pub struct Frame {
    pub tag: u8,
    pub ns_index: u32,
    pub body: Vec<u8>,
}

/// Reads one `[tag: u8][ns_index: u32][len: u32][len bytes]` frame.
/// `ns_index`/`len` are zero for the end-of-archive marker, which carries no body.
pub fn read_frame(reader: &mut impl Read) -> Result<Frame, ArchiveError> {
    let mut tag_buf = [0u8; 1];
    match reader.read_exact(&mut tag_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(ArchiveError::ShortArchive),
        Err(e) => return Err(e.into()),
    }
    let tag = tag_buf[0];
    if tag == TAG_END_OF_ARCHIVE {
        return Ok(Frame { tag, ns_index: 0, body: Vec::new() });
    }

    let mut ns_buf = [0u8; 4];
    read_exact_or_short(reader, &mut ns_buf)?;
    let ns_index = u32::from_be_bytes(ns_buf);

    let mut len_buf = [0u8; 4];
    read_exact_or_short(reader, &mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);

    let mut body = vec![0u8; len as usize];
    read_exact_or_short(reader, &mut body)?;

    Ok(Frame { tag, ns_index, body })
}

fn read_exact_or_short(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), ArchiveError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ArchiveError::ShortArchive
        } else {
            ArchiveError::Io(e)
        }
    })
}

#[cfg(test)]
pub fn write_frame(writer: &mut impl std::io::Write, tag: u8, ns_index: u32, body: &[u8]) -> io::Result<()> {
    writer.write_all(&[tag])?;
    if tag != TAG_END_OF_ARCHIVE {
        writer.write_all(&ns_index.to_be_bytes())?;
        writer.write_all(&(body.len() as u32).to_be_bytes())?;
        writer.write_all(body)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_document_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, TAG_DOCUMENT, 3, b"hello").unwrap();
        let frame = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(frame.tag, TAG_DOCUMENT);
        assert_eq!(frame.ns_index, 3);
        assert_eq!(frame.body, b"hello");
    }

    #[test]
    fn end_of_archive_has_no_body() {
        let mut buf = Vec::new();
        write_frame(&mut buf, TAG_END_OF_ARCHIVE, 0, &[]).unwrap();
        let buf_len = buf.len();
        let frame = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(frame.tag, TAG_END_OF_ARCHIVE);
        assert_eq!(buf_len, 1);
    }

    #[test]
    fn truncated_frame_body_is_short_archive() {
        let mut buf = Vec::new();
        buf.push(TAG_DOCUMENT);
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&10u32.to_be_bytes());
        buf.extend_from_slice(b"short");
        let err = read_frame(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ArchiveError::ShortArchive));
    }
}
