use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;

use super::IngestError;
use super::classify::ShapeCategory;

/// Random bytes per key (256 bits)
const KEY_BYTES: usize = 32;

/// Location of an asset in the durable store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    pub id: String,
    pub extension: String,
    pub prefix: Option<ShapeCategory>,
}

impl StorageKey {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.extension)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}/{}.{}", prefix, self.id, self.extension),
            None => write!(f, "{}.{}", self.id, self.extension),
        }
    }
}

/// Check a declared content type against `allowed`, returning the normalized
/// essence ("type/subtype") on success.
pub fn validate_content_type(declared: &str, allowed: &[String]) -> Result<String, IngestError> {
    let parsed: mime::Mime = declared
        .trim()
        .parse()
        .map_err(|_| IngestError::UnsupportedMediaType(declared.to_string()))?;

    let essence = parsed.essence_str().to_lowercase();
    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&essence)) {
        return Err(IngestError::UnsupportedMediaType(essence));
    }

    Ok(essence)
}

/// 32 bytes from the OS CSPRNG, base64url without padding
pub fn random_identifier() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build a fresh key for an essence already accepted by
/// [`validate_content_type`]. The subtype becomes the extension.
pub fn derive_key(essence: &str, prefix: Option<ShapeCategory>) -> Result<StorageKey, IngestError> {
    let extension = essence
        .split_once('/')
        .map(|(_, subtype)| subtype.to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| IngestError::UnsupportedMediaType(essence.to_string()))?;

    Ok(StorageKey {
        id: random_identifier(),
        extension,
        prefix,
    })
}
