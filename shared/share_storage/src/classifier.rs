//! Content type detection for uploaded payloads

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

use std::collections::HashMap;

use mime::Mime;

use crate::key::file_extension;

/// Number of leading bytes inspected when sniffing
const SNIFF_LEN: usize = 512;

const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";

/// Fixed byte signatures, matched against the start of the payload
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b\x08", "application/x-gzip"),
    (b"\x1a\x45\xdf\xa3", "video/webm"),
    (b"ID3", "audio/mpeg"),
    (b"OggS\x00", "application/ogg"),
];

/// Byte order marks, matched before anything else
const BOMS: &[(&[u8], &str)] = &[
    (b"\xfe\xff", "text/plain; charset=utf-16be"),
    (b"\xff\xfe", "text/plain; charset=utf-16le"),
    (b"\xef\xbb\xbf", TEXT_PLAIN_UTF_8),
];

/// Opening tags of an HTML document, matched case-insensitively after leading
/// whitespace and followed by a space or `>`
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const TEXT_HTML_UTF_8: &str = "text/html; charset=utf-8";
const TEXT_XML_UTF_8: &str = "text/xml; charset=utf-8";

/// Determines the MIME type of a payload
///
/// Sniffing the payload bytes always wins. The extension table is consulted
/// only when sniffing cannot do better than `application/octet-stream`, which
/// happens for captures written by some screen recording tools.
#[derive(Debug, Clone)]
pub struct ContentClassifier {
    extension_types: HashMap<String, Mime>,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        let extension_types = HashMap::from([
            (".mp4".to_string(), "video/mp4".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)),
            (".png".to_string(), mime::IMAGE_PNG),
        ]);

        Self { extension_types }
    }
}

impl ContentClassifier {
    /// Creates a classifier with the default fallback table extended by `extra`
    ///
    /// Extensions are matched case-insensitively and may be given with or
    /// without the leading dot.
    #[must_use]
    pub fn with_extension_types<I>(extra: I) -> Self
    where
        I: IntoIterator<Item = (String, Mime)>,
    {
        let mut classifier = Self::default();
        for (extension, mime_type) in extra {
            classifier
                .extension_types
                .insert(normalize_extension(&extension), mime_type);
        }
        classifier
    }

    /// Resolves the content type for `bytes` stored under `filename`
    #[must_use]
    pub fn classify(&self, bytes: &[u8], filename: &str) -> String {
        let sniffed = sniff(bytes);
        tracing::debug!("Detected content type for '{filename}' is '{sniffed}'");

        if sniffed != mime::APPLICATION_OCTET_STREAM.essence_str() {
            return sniffed.to_string();
        }

        match self.media_type_for(filename) {
            Some(fallback) => {
                tracing::debug!("Using fallback content type '{fallback}' for file '{filename}'");
                fallback.to_string()
            }
            None => sniffed.to_string(),
        }
    }

    /// Looks up the fallback table entry for the extension of `filename`
    #[must_use]
    pub fn media_type_for(&self, filename: &str) -> Option<&Mime> {
        let extension = file_extension(filename);
        if extension.is_empty() {
            return None;
        }
        self.extension_types.get(&extension.to_lowercase())
    }
}

fn normalize_extension(extension: &str) -> String {
    let extension = extension.trim().to_lowercase();
    if extension.starts_with('.') {
        extension
    } else {
        format!(".{extension}")
    }
}

/// Sniffs the content type from the leading bytes of a payload
fn sniff(bytes: &[u8]) -> &'static str {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];

    if let Some(content_type) = sniff_markup(head) {
        return content_type;
    }

    if let Some((_, content_type)) = BOMS.iter().find(|(bom, _)| head.starts_with(bom)) {
        return *content_type;
    }

    if let Some((_, content_type)) = SIGNATURES
        .iter()
        .find(|(signature, _)| head.starts_with(signature))
    {
        return *content_type;
    }

    if let Some(content_type) = sniff_riff(head) {
        return content_type;
    }

    if is_mp4(head) {
        return "video/mp4";
    }

    if head.iter().any(|byte| is_binary_byte(*byte)) {
        mime::APPLICATION_OCTET_STREAM.essence_str()
    } else {
        TEXT_PLAIN_UTF_8
    }
}

fn sniff_markup(head: &[u8]) -> Option<&'static str> {
    let start = head
        .iter()
        .position(|&byte| !matches!(byte, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))?;
    let text = &head[start..];

    let is_html = HTML_TAGS.iter().any(|tag| {
        text.len() > tag.len()
            && text[..tag.len()].eq_ignore_ascii_case(tag)
            && matches!(text[tag.len()], b' ' | b'>')
    });
    if is_html {
        return Some(TEXT_HTML_UTF_8);
    }

    text.starts_with(b"<?xml").then_some(TEXT_XML_UTF_8)
}

fn sniff_riff(head: &[u8]) -> Option<&'static str> {
    if head.len() < 12 || &head[..4] != b"RIFF" {
        return None;
    }
    match &head[8..12] {
        b"WEBP" => Some("image/webp"),
        b"WAVE" => Some("audio/wave"),
        b"AVI " => Some("video/avi"),
        _ => None,
    }
}

/// Matches an ISO base media `ftyp` box carrying an `mp4*` brand
fn is_mp4(head: &[u8]) -> bool {
    if head.len() < 12 || &head[4..8] != b"ftyp" {
        return false;
    }

    let box_size = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
    if box_size % 4 != 0 || box_size > head.len() || box_size < 12 {
        return false;
    }

    // Major brand at 8, minor version at 12, compatible brands from 16 on
    (8..box_size)
        .step_by(4)
        .filter(|offset| *offset != 12)
        .filter_map(|offset| head.get(offset..offset + 3))
        .any(|brand| brand == b"mp4")
}

const fn is_binary_byte(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}
