//! Content-based type detection.
//!
//! The MIME type comes from the leading bytes of the file, never from its
//! name or a client-supplied header. The category is then derived from the
//! MIME prefix by [`MediaCategory::from_mime`].

use mediaflow_core::models::{FileClassification, MediaCategory};
use mediaflow_core::AppError;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Bytes read from the start of a file for sniffing.
pub const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Magic bytes at `offset`, optionally followed by a second marker at
/// `sub_offset` (RIFF and IFF forms, BMP reserved bytes).
struct Signature {
    offset: usize,
    magic: &'static [u8],
    sub_offset: usize,
    sub: &'static [u8],
    mime: &'static str,
}

impl Signature {
    fn matches(&self, buf: &[u8]) -> bool {
        matches_at(buf, self.offset, self.magic) && matches_at(buf, self.sub_offset, self.sub)
    }
}

fn matches_at(buf: &[u8], offset: usize, bytes: &[u8]) -> bool {
    buf.get(offset..offset + bytes.len())
        .is_some_and(|slice| slice == bytes)
}

const fn sig(magic: &'static [u8], mime: &'static str) -> Signature {
    sig_at(0, magic, mime)
}

const fn sig_at(offset: usize, magic: &'static [u8], mime: &'static str) -> Signature {
    Signature {
        offset,
        magic,
        sub_offset: 0,
        sub: b"",
        mime,
    }
}

const fn sig_with(
    magic: &'static [u8],
    sub_offset: usize,
    sub: &'static [u8],
    mime: &'static str,
) -> Signature {
    Signature {
        offset: 0,
        magic,
        sub_offset,
        sub,
        mime,
    }
}

/// Ordered: more specific signatures come before generic ones sharing a prefix.
const SIGNATURES: &[Signature] = &[
    // Images
    sig(b"\xFF\xD8\xFF", "image/jpeg"),
    sig(b"\x89PNG\r\n\x1A\n", "image/png"),
    sig(b"GIF87a", "image/gif"),
    sig(b"GIF89a", "image/gif"),
    sig_with(b"RIFF", 8, b"WEBP", "image/webp"),
    sig_with(b"BM", 6, b"\x00\x00\x00\x00", "image/bmp"),
    sig(b"II*\x00", "image/tiff"),
    sig(b"MM\x00*", "image/tiff"),
    sig(b"\x00\x00\x01\x00", "image/x-icon"),
    sig_at(4, b"ftypavif", "image/avif"),
    sig_at(4, b"ftypheic", "image/heic"),
    // Audio
    sig(b"ID3", "audio/mpeg"),
    sig(b"fLaC", "audio/flac"),
    sig_with(b"RIFF", 8, b"WAVE", "audio/wav"),
    sig_with(b"FORM", 8, b"AIFF", "audio/aiff"),
    sig(b"MThd", "audio/midi"),
    sig_at(4, b"ftypM4A ", "audio/mp4"),
    sig(b"#!AMR", "audio/amr"),
    // Video
    sig_with(b"RIFF", 8, b"AVI ", "video/x-msvideo"),
    sig_at(4, b"ftypqt  ", "video/quicktime"),
    sig_at(4, b"ftyp", "video/mp4"),
    sig(b"FLV\x01", "video/x-flv"),
    sig(b"\x00\x00\x01\xBA", "video/mpeg"),
    sig(b"\x00\x00\x01\xB3", "video/mpeg"),
    sig(b"\x30\x26\xB2\x75\x8E\x66\xCF\x11", "video/x-ms-asf"),
    // Documents and archives
    sig(b"%PDF-", "application/pdf"),
    sig(b"PK\x03\x04", "application/zip"),
    sig(b"\x1F\x8B\x08", "application/x-gzip"),
    sig(b"Rar!\x1A\x07", "application/x-rar-compressed"),
    sig(b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    sig(b"\x7FELF", "application/x-executable"),
    sig(b"\x00asm", "application/wasm"),
    sig(b"{\\rtf1", "text/rtf; charset=utf-8"),
    sig(b"<?xml", "text/xml; charset=utf-8"),
];

/// Detect a MIME type from the leading bytes of a file.
pub fn sniff_mime(buf: &[u8]) -> &'static str {
    if buf.is_empty() {
        return OCTET_STREAM;
    }
    if let Some(signature) = SIGNATURES.iter().find(|s| s.matches(buf)) {
        return signature.mime;
    }
    if let Some(mime) = sniff_container(buf) {
        return mime;
    }
    if is_mpeg_audio_frame(buf) {
        return "audio/mpeg";
    }
    if looks_like_text(buf) {
        return PLAIN_TEXT;
    }
    OCTET_STREAM
}

/// Containers whose signature alone does not say what they carry.
fn sniff_container(buf: &[u8]) -> Option<&'static str> {
    // EBML: Matroska or WebM depending on the DocType element.
    if buf.starts_with(b"\x1A\x45\xDF\xA3") {
        return Some(if contains(buf, b"webm") {
            "video/webm"
        } else {
            "video/x-matroska"
        });
    }
    if buf.starts_with(b"OggS") {
        return Some(if contains(buf, b"theora") {
            "video/ogg"
        } else {
            "audio/ogg"
        });
    }
    // MPEG transport stream: sync byte every 188 bytes.
    if buf.len() > 188 && buf[0] == 0x47 && buf[188] == 0x47 {
        return Some("video/mp2t");
    }
    None
}

/// MPEG audio frame sync (MP3 without an ID3 tag) or ADTS AAC.
fn is_mpeg_audio_frame(buf: &[u8]) -> bool {
    let [0xFF, second, ..] = buf else {
        return false;
    };
    // 0xFE would be a UTF-16 byte order mark.
    *second != 0xFE && second & 0xE0 == 0xE0 && (second & 0x06 != 0 || second & 0x16 == 0x10)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Valid UTF-8 (allowing a codepoint cut off at the sniff boundary) with no
/// control bytes other than whitespace.
fn looks_like_text(buf: &[u8]) -> bool {
    let text = match std::str::from_utf8(buf) {
        Ok(text) => text,
        Err(e) if e.error_len().is_none() => {
            // Truncated multi-byte sequence at the end of the window.
            match std::str::from_utf8(&buf[..e.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    !text
        .bytes()
        .any(|b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C) || b == 0x7F)
}

/// Classify an in-memory payload. `size` is the payload length.
pub fn classify_bytes(data: &[u8]) -> FileClassification {
    let head = &data[..data.len().min(SNIFF_LEN)];
    let mime_type = sniff_mime(head);
    FileClassification {
        category: MediaCategory::from_mime(mime_type),
        mime_type: mime_type.to_string(),
        size: data.len() as u64,
    }
}

/// Classify a file on disk by reading its first [`SNIFF_LEN`] bytes.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub async fn classify_path(path: &Path) -> Result<FileClassification, AppError> {
    let read_error =
        |e: std::io::Error| AppError::Classification(format!("{}: {}", path.display(), e));

    let mut file = File::open(path).await.map_err(read_error)?;
    let size = file.metadata().await.map_err(read_error)?.len();

    let mut head = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut head[filled..]).await.map_err(read_error)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    head.truncate(filled);

    let mime_type = sniff_mime(&head);
    let category = MediaCategory::from_mime(mime_type);
    tracing::debug!(mime_type, category = %category, size, "File classified");

    Ok(FileClassification {
        category,
        mime_type: mime_type.to_string(),
        size,
    })
}
