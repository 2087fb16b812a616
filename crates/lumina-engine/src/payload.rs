use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

/// An image as returned by an upstream client, still base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub base64: String,
}

impl EncodedImage {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64: BASE64.encode(bytes),
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedPayload {
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Reads an image file into the `data:<mime>;base64,...` form stored on
/// artifacts and sent upstream.
pub fn payload_from_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    let mime = match mime_for_path(path) {
        Some(mime) => mime,
        None => image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .with_context(|| format!("{} is not a recognised image", path.display()))?,
    };
    Ok(EncodedImage::from_bytes(mime, &bytes).to_data_url())
}

pub fn decode_payload(payload: &str) -> Result<DecodedPayload> {
    let Some((mime_type, data)) = split_data_url(payload) else {
        bail!("payload is not a base64 data URL");
    };
    let bytes = BASE64
        .decode(data.as_bytes())
        .context("payload base64 decode failed")?;
    Ok(DecodedPayload {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

/// `(mime, base64)` halves of a `data:` URL.
pub fn split_data_url(payload: &str) -> Option<(&str, &str)> {
    let rest = payload.trim().strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let mime = if mime.is_empty() { "image/png" } else { mime };
    Some((mime, data))
}

/// Gemini `inlineData` part for a stored payload.
pub(crate) fn inline_part(payload: &str) -> Option<Value> {
    let (mime, data) = split_data_url(payload)?;
    Some(json!({
        "inlineData": {
            "mimeType": mime,
            "data": data,
        }
    }))
}

pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
