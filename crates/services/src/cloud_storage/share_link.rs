//! Share-link parameters of the form `{provider}://{percent-encoded path}`.
//!
//! The leading `/` of the item path is dropped on encoding and restored on
//! decoding, so every absolute path survives the round trip.

use super::{CloudError, CloudItem, CloudResult, path_name};

pub const SEPARATOR: &str = "://";

pub fn encode(provider: &str, id: &str) -> String {
    let path = id.strip_prefix('/').unwrap_or(id);
    format!("{}{}{}", provider, SEPARATOR, urlencoding::encode(path))
}

/// Recovers the item path from a parameter produced by [`encode`] for the same
/// provider. The provider prefix is compared case-insensitively.
pub fn decode_id(provider: &str, param: &str) -> CloudResult<String> {
    let prefix_len = provider.len() + SEPARATOR.len();
    let has_prefix = param
        .get(..provider.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(provider))
        && param.get(provider.len()..prefix_len) == Some(SEPARATOR);
    if !has_prefix {
        return Err(CloudError::Parse(format!(
            "Share parameter does not belong to {}: {}",
            provider, param
        )));
    }
    decode_path(&param[prefix_len..])
}

/// Builds a bare item (provider and path only) from any provider's parameter.
pub fn decode_item(param: &str) -> CloudResult<CloudItem> {
    let (provider, encoded) = param
        .split_once(SEPARATOR)
        .ok_or_else(|| CloudError::Parse(format!("Malformed share parameter: {}", param)))?;
    let id = decode_path(encoded)?;
    Ok(CloudItem {
        name: path_name(&id).to_string(),
        unique_id: id.clone(),
        id,
        provider: provider.to_string(),
        ..Default::default()
    })
}

fn decode_path(encoded: &str) -> CloudResult<String> {
    let decoded = urlencoding::decode(encoded)
        .map_err(|e| CloudError::Parse(format!("Share parameter is not valid UTF-8: {}", e)))?;
    Ok(format!("/{}", decoded))
}
