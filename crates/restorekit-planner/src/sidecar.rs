use std::fs;
use std::io::Read;
use std::path::Path;

use bson::{Bson, Document};
use flate2::read::GzDecoder;
use restorekit_catalog::{CollectionMetadata, IndexDocument};
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

#[derive(Serialize, Deserialize)]
struct IndexDocumentWire {
    key: Vec<(String, Bson)>,
    options: Document,
    #[serde(rename = "partialFilterExpression", default)]
    partial_filter_expression: Option<Document>,
}

#[derive(Serialize, Deserialize, Default)]
struct MetadataSidecarWire {
    #[serde(default)]
    options: Document,
    #[serde(default)]
    indexes: Vec<IndexDocumentWire>,
    #[serde(default)]
    uuid: Option<[u8; 16]>,
    #[serde(rename = "collectionName", default)]
    collection_name: Option<String>,
}

/// Parses a `<coll>.metadata.json` sidecar into the shared metadata shape.
pub fn parse_metadata_sidecar(path: &Path) -> Result<CollectionMetadata, PlannerError> {
    let text = fs::read_to_string(path)?;
    let wire: MetadataSidecarWire =
        serde_json::from_str(&text).map_err(|e| PlannerError::BadSidecar(path.display().to_string(), e.to_string()))?;
    Ok(CollectionMetadata {
        options: wire.options,
        indexes: wire
            .indexes
            .into_iter()
            .map(|idx| {
                let mut doc = IndexDocument::new(idx.key, idx.options);
                doc.partial_filter_expression = idx.partial_filter_expression;
                doc
            })
            .collect(),
        uuid: wire.uuid,
        collection_name_override: wire.collection_name,
    })
}

#[derive(Serialize, Deserialize)]
struct DirectoryPreludeWire {
    #[serde(rename = "ServerVersion")]
    server_version: String,
}

#[derive(Debug, Clone)]
pub struct DirectoryPrelude {
    pub server_version: String,
}

/// Parses the root `prelude.json` (or gzipped `prelude.json.gz`) header.
pub fn parse_directory_prelude(path: &Path) -> Result<DirectoryPrelude, PlannerError> {
    let text = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        let file = fs::File::open(path)?;
        let mut decoder = GzDecoder::new(file);
        let mut buf = String::new();
        decoder.read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path)?
    };
    let wire: DirectoryPreludeWire =
        serde_json::from_str(&text).map_err(|e| PlannerError::BadSidecar(path.display().to_string(), e.to_string()))?;
    Ok(DirectoryPrelude { server_version: wire.server_version })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_a_metadata_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.metadata.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"options":{{}},"indexes":[{{"key":[["_id",1]],"options":{{"name":"_id_"}}}}]}}"#
        )
        .unwrap();
        let metadata = parse_metadata_sidecar(&path).unwrap();
        assert_eq!(metadata.indexes.len(), 1);
        assert_eq!(metadata.indexes[0].name(), Some("_id_"));
    }

    #[test]
    fn parses_an_uncompressed_prelude() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prelude.json");
        fs::write(&path, r#"{"ServerVersion":"7.0.4"}"#).unwrap();
        let prelude = parse_directory_prelude(&path).unwrap();
        assert_eq!(prelude.server_version, "7.0.4");
    }
}
