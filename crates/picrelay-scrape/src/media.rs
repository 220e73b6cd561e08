// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media type handling for downloaded payloads.

/// Supported image media types and the file extension used for each.
const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("image/bmp", "bmp"),
    ("image/gif", "gif"),
    ("image/jpeg", "jpeg"),
    ("image/png", "png"),
    ("image/svg+xml", "svg"),
    ("image/tiff", "tiff"),
    ("image/webp", "webp"),
];

/// Media types whose body is worth quoting in an HTTP error.
const TEXTUAL: &[&str] = &["text/plain", "text/html", "application/json"];

/// Maximum number of characters of an error body kept in messages.
pub const ERROR_EXCERPT_CHARS: usize = 300;

/// Normalizes a `Content-Type` header value to its bare media type.
///
/// `"Image/PNG; charset=binary"` becomes `"image/png"`.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// File extension for a supported image media type.
pub fn image_extension(media_type: &str) -> Option<&'static str> {
    IMAGE_EXTENSIONS
        .iter()
        .find(|(mt, _)| *mt == media_type)
        .map(|(_, ext)| *ext)
}

pub fn is_textual(media_type: &str) -> bool {
    TEXTUAL.contains(&media_type)
}

/// First [`ERROR_EXCERPT_CHARS`] characters of `body`.
pub fn excerpt(body: &str) -> String {
    body.chars().take(ERROR_EXCERPT_CHARS).collect()
}
