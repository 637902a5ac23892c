//! Opaque serialization of collection-valued columns.
//!
//! Empty collections are written as an absent column and absent columns
//! read back as empty collections, so "never set" and "set to empty" are
//! indistinguishable after a round trip.

use super::RecordError;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

pub(crate) fn encode_map<K, V>(
    column: &'static str,
    map: &BTreeMap<K, V>,
) -> Result<Option<Vec<u8>>, RecordError>
where
    K: Serialize,
    V: Serialize,
{
    if map.is_empty() {
        return Ok(None);
    }
    serde_json::to_vec(map)
        .map(Some)
        .map_err(|err| RecordError::blob(column, err))
}

pub(crate) fn encode_list<T: Serialize>(
    column: &'static str,
    items: &[T],
) -> Result<Option<Vec<u8>>, RecordError> {
    if items.is_empty() {
        return Ok(None);
    }
    serde_json::to_vec(items)
        .map(Some)
        .map_err(|err| RecordError::blob(column, err))
}

pub(crate) fn encode_value<T: Serialize>(
    column: &'static str,
    value: Option<&T>,
) -> Result<Option<Vec<u8>>, RecordError> {
    value
        .map(|inner| serde_json::to_vec(inner).map_err(|err| RecordError::blob(column, err)))
        .transpose()
}

pub(crate) fn decode_map<K, V>(
    column: &'static str,
    blob: Option<&[u8]>,
) -> Result<BTreeMap<K, V>, RecordError>
where
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
{
    match blob {
        None | Some([]) => Ok(BTreeMap::new()),
        Some(bytes) => serde_json::from_slice(bytes).map_err(|err| RecordError::blob(column, err)),
    }
}

pub(crate) fn decode_list<T: DeserializeOwned>(
    column: &'static str,
    blob: Option<&[u8]>,
) -> Result<Vec<T>, RecordError> {
    match blob {
        None | Some([]) => Ok(Vec::new()),
        Some(bytes) => serde_json::from_slice(bytes).map_err(|err| RecordError::blob(column, err)),
    }
}

pub(crate) fn decode_value<T: DeserializeOwned>(
    column: &'static str,
    blob: Option<&[u8]>,
) -> Result<Option<T>, RecordError> {
    match blob {
        None | Some([]) => Ok(None),
        Some(bytes) => serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|err| RecordError::blob(column, err)),
    }
}

/// Gzip-compresses a job definition.
///
/// # Errors
///
/// Returns [`RecordError::Compression`] when the encoder fails.
pub fn compress_content(content: &str) -> Result<Vec<u8>, RecordError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(content.as_bytes())
        .map_err(|err| RecordError::Compression(Arc::new(err)))?;
    encoder
        .finish()
        .map_err(|err| RecordError::Compression(Arc::new(err)))
}

/// Restores a job definition compressed by [`compress_content`].
///
/// # Errors
///
/// Returns [`RecordError::Compression`] when the bytes are not valid gzip
/// data or do not hold UTF-8 text.
pub fn decompress_content(compressed: &[u8]) -> Result<String, RecordError> {
    let mut decoder = GzDecoder::new(compressed);
    let mut content = String::new();
    decoder
        .read_to_string(&mut content)
        .map_err(|err| RecordError::Compression(Arc::new(err)))?;
    Ok(content)
}
