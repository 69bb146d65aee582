use md5::{Digest, Md5};
use url::Url;

use crate::{GrabError, Result};

/// Directory part of a manifest URL: the text before the last `/` that
/// precedes the query string.
pub fn resolve_base_url(manifest_url: &str) -> Result<String> {
    let base_url_error = |reason| GrabError::BaseUrl {
        url: manifest_url.to_string(),
        reason,
    };

    let query = manifest_url
        .rfind('?')
        .ok_or_else(|| base_url_error("no query string"))?;
    let slash = manifest_url[..query]
        .rfind('/')
        .ok_or_else(|| base_url_error("no path separator before the query string"))?;

    Ok(manifest_url[..slash].to_string())
}

/// Local file name for a downloaded URL.
///
/// The last path component before the query string, or the MD5 hex digest of
/// the whole URL when no usable component exists.
pub fn resolve_file_name(url: &str) -> String {
    let name = match url.rfind('?') {
        None => Some(url.rsplit('/').next().unwrap_or(url)),
        Some(query) => url[..query]
            .rfind('/')
            .map(|slash| &url[slash + 1..query]),
    };

    match name {
        Some(name) if !matches!(name, "" | "." | "..") => name.to_string(),
        _ => hex::encode(Md5::digest(url.as_bytes())),
    }
}

/// URL of the media playlist for `variant_uri`.
///
/// Absolute URIs are used as-is; relative ones are joined to `base_url` with
/// a single `/`.
pub fn media_playlist_url(base_url: &str, variant_uri: &str) -> Result<String> {
    let variant_uri = variant_uri.trim();
    if variant_uri.is_empty() {
        return Err(GrabError::invalid_url(variant_uri, "empty variant URI"));
    }

    let joined = if variant_uri.starts_with("http://") || variant_uri.starts_with("https://") {
        variant_uri.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            variant_uri.trim_start_matches('/')
        )
    };

    Url::parse(&joined).map_err(|e| GrabError::invalid_url(&joined, e.to_string()))?;
    Ok(joined)
}
