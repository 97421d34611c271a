use std::io::{self, Read, Write};

use bson::{Bson, Document};
use restorekit_catalog::{CollectionMetadata, IndexDocument, Namespace};
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

pub const MAGIC: &[u8; 4] = b"RKDV";

/// Archive-level header, written once before any namespace metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivePrelude {
    pub format_version: u32,
    pub source_server_version: String,
    pub tool_version: String,
    pub concurrency: u32,
}

/// One namespace's metadata block, in the order dump order placed it. The
/// position of an entry in the returned `Vec` is its `ns_index`, the value
/// every body frame uses to address it.
#[derive(Debug, Clone)]
pub struct NamespaceMetadataEntry {
    pub namespace: Namespace,
    pub metadata: CollectionMetadata,
}

#[derive(Serialize, Deserialize)]
struct IndexDocumentWire {
    key: Vec<(String, Bson)>,
    options: Document,
    partial_filter_expression: Option<Document>,
}

impl From<&IndexDocument> for IndexDocumentWire {
    fn from(idx: &IndexDocument) -> Self {
        IndexDocumentWire {
            key: idx.key.clone(),
            options: idx.options.clone(),
            partial_filter_expression: idx.partial_filter_expression.clone(),
        }
    }
}

impl From<IndexDocumentWire> for IndexDocument {
    fn from(wire: IndexDocumentWire) -> Self {
        let mut idx = IndexDocument::new(wire.key, wire.options);
        idx.partial_filter_expression = wire.partial_filter_expression;
        idx
    }
}

#[derive(Serialize, Deserialize)]
struct NamespaceMetadataWire {
    db: String,
    coll: String,
    options: Document,
    indexes: Vec<IndexDocumentWire>,
    uuid: Option<[u8; 16]>,
    collection_name_override: Option<String>,
}

fn write_len_prefixed(writer: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(&(bytes.len() as u32).to_be_bytes())?;
    writer.write_all(bytes)
}

fn read_len_prefixed(reader: &mut impl Read) -> Result<Option<Vec<u8>>, ArchiveError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(ArchiveError::ShortArchive),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ArchiveError::ShortArchive
        } else {
            ArchiveError::Io(e)
        }
    })?;
    Ok(Some(buf))
}

/// Writes `MAGIC`, the prelude, and the namespace metadata list (terminated
/// by a zero-length marker). Used by fixture code building synthetic
/// archives for tests — production archives are produced upstream of this
/// crate, which only ever demultiplexes them.
pub fn write_header(
    writer: &mut impl Write,
    prelude: &ArchivePrelude,
    entries: &[NamespaceMetadataEntry],
) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    let prelude_json = serde_json::to_vec(prelude).expect("ArchivePrelude always serializes");
    write_len_prefixed(writer, &prelude_json)?;
    for entry in entries {
        let wire = NamespaceMetadataWire {
            db: entry.namespace.db.clone(),
            coll: entry.namespace.coll.clone(),
            options: entry.metadata.options.clone(),
            indexes: entry.metadata.indexes.iter().map(IndexDocumentWire::from).collect(),
            uuid: entry.metadata.uuid,
            collection_name_override: entry.metadata.collection_name_override.clone(),
        };
        let json = serde_json::to_vec(&wire).expect("NamespaceMetadataWire always serializes");
        write_len_prefixed(writer, &json)?;
    }
    writer.write_all(&0u32.to_be_bytes())
}

pub fn read_header(
    reader: &mut impl Read,
) -> Result<(ArchivePrelude, Vec<NamespaceMetadataEntry>), ArchiveError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ArchiveError::ShortArchive
        } else {
            ArchiveError::Io(e)
        }
    })?;
    if &magic != MAGIC {
        return Err(ArchiveError::BadMagic);
    }
    let prelude_bytes = read_len_prefixed(reader)?.ok_or_else(|| {
        ArchiveError::InvalidPrelude("prelude block must not be empty".to_string())
    })?;
    let prelude: ArchivePrelude =
        serde_json::from_slice(&prelude_bytes).map_err(|e| ArchiveError::InvalidPrelude(e.to_string()))?;

    let mut entries = Vec::new();
    while let Some(bytes) = read_len_prefixed(reader)? {
        let wire: NamespaceMetadataWire =
            serde_json::from_slice(&bytes).map_err(|e| ArchiveError::InvalidNamespaceMetadata(e.to_string()))?;
        let namespace = Namespace::new(wire.db, wire.coll);
        let metadata = CollectionMetadata {
            options: wire.options,
            indexes: wire.indexes.into_iter().map(IndexDocument::from).collect(),
            uuid: wire.uuid,
            collection_name_override: wire.collection_name_override,
        };
        entries.push(NamespaceMetadataEntry { namespace, metadata });
    }
    Ok((prelude, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_prelude() -> ArchivePrelude {
        ArchivePrelude {
            format_version: 1,
            source_server_version: "7.0.0".to_string(),
            tool_version: "0.1.0".to_string(),
            concurrency: 4,
        }
    }

    #[test]
    fn round_trips_header_with_no_namespaces() {
        let mut buf = Vec::new();
        write_header(&mut buf, &sample_prelude(), &[]).unwrap();
        let (prelude, entries) = read_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(prelude.format_version, 1);
        assert!(entries.is_empty());
    }

    #[test]
    fn round_trips_header_with_namespaces_and_indexes() {
        let mut metadata = CollectionMetadata::default();
        metadata.indexes.push(IndexDocument::identity());
        let entries = vec![NamespaceMetadataEntry {
            namespace: Namespace::new("app", "widgets"),
            metadata,
        }];
        let mut buf = Vec::new();
        write_header(&mut buf, &sample_prelude(), &entries).unwrap();
        let (_, parsed) = read_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].namespace, Namespace::new("app", "widgets"));
        assert_eq!(parsed[0].metadata.indexes.len(), 1);
        assert_eq!(parsed[0].metadata.indexes[0].name(), Some("_id_"));
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = b"XXXX".to_vec();
        let err = read_header(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ArchiveError::BadMagic));
    }

    #[test]
    fn truncated_prelude_is_short_archive() {
        let mut buf = MAGIC.to_vec();
        buf.extend_from_slice(&100u32.to_be_bytes());
        buf.extend_from_slice(b"not enough bytes");
        let err = read_header(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ArchiveError::ShortArchive));
    }
}
