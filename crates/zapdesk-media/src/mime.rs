// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File extension resolution for attachments.

/// Known MIME types and the extension files are stored under.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("audio/ogg", "ogg"),
    ("audio/mpeg", "mp3"),
    ("audio/mp3", "mp3"),
    ("audio/mp4", "m4a"),
    ("audio/aac", "aac"),
    ("audio/amr", "amr"),
    ("audio/wav", "wav"),
    ("video/mp4", "mp4"),
    ("video/3gpp", "3gp"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
    ("application/pdf", "pdf"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("application/vnd.ms-excel", "xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    ("application/zip", "zip"),
    ("text/plain", "txt"),
    ("text/csv", "csv"),
];

/// Extension for an attachment: MIME table, then the filename, then `bin`.
///
/// MIME parameters (`audio/ogg; codecs=opus`) are ignored.
pub fn extension_for(mime_type: Option<&str>, filename: Option<&str>) -> String {
    if let Some(mime) = mime_type {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        if let Some((_, ext)) = MIME_EXTENSIONS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(essence))
        {
            return (*ext).to_string();
        }
    }

    filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

/// MIME type declared by a `data:` URI, if any.
pub fn data_uri_mime(data: &str) -> Option<&str> {
    let rest = data.strip_prefix("data:")?;
    let (header, _) = rest.split_once(',')?;
    let mime = header.split(';').next()?;
    (!mime.is_empty()).then_some(mime)
}
