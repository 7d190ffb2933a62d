//! S3-compatible multipart documents.
//!
//! Only the two documents the chunked-upload protocol needs are supported: the
//! initiation result sent to the client and the completion manifest it sends
//! back. Manifests may arrive as S3 XML or as JSON (`{"parts": [...]}`).

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Bucket name reported in initiation results.
pub const UPLOAD_BUCKET: &str = "upload";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitiateMultipartUploadResult {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

impl InitiateMultipartUploadResult {
    pub fn new(key: impl Into<String>, upload_id: impl Into<String>) -> Self {
        Self {
            bucket: UPLOAD_BUCKET.to_string(),
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }

    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
                r#"<Bucket>{}</Bucket>"#,
                r#"<Key>{}</Key>"#,
                r#"<UploadId>{}</UploadId>"#,
                r#"</InitiateMultipartUploadResult>"#
            ),
            xml_escape(&self.bucket),
            xml_escape(&self.key),
            xml_escape(&self.upload_id)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    #[serde(rename = "partNumber", alias = "PartNumber", alias = "part_number")]
    pub part_number: u32,
    #[serde(rename = "etag", alias = "ETag", default)]
    pub etag: String,
}

/// Completion manifest. The number of listed parts is the part count the
/// upload is assembled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteMultipartUpload {
    #[serde(alias = "Parts", alias = "Part")]
    pub parts: Vec<CompletedPart>,
}

impl CompleteMultipartUpload {
    pub fn parse(body: &str) -> Result<Self, AppError> {
        let trimmed = body.trim_start();
        let manifest = if trimmed.starts_with('<') {
            Self::from_xml(trimmed)?
        } else {
            serde_json::from_str::<Self>(trimmed)?
        };
        if manifest.parts.is_empty() {
            return Err(AppError::InvalidInput(
                "completion manifest lists no parts".to_string(),
            ));
        }
        if let Some(part) = manifest.parts.iter().find(|p| p.part_number == 0) {
            return Err(AppError::InvalidInput(format!(
                "invalid part number {}",
                part.part_number
            )));
        }
        Ok(manifest)
    }

    /// Parse an S3 `CompleteMultipartUpload` document. Namespace prefixes on
    /// element names (`<s3:Part>`) are ignored, comments are skipped and
    /// CDATA sections are read as text.
    pub fn from_xml(xml: &str) -> Result<Self, AppError> {
        let xml = normalize_xml(xml)?;
        let xml = xml.as_str();
        if element_bodies(xml, "CompleteMultipartUpload").is_empty() {
            return Err(AppError::InvalidInput(
                "expected a CompleteMultipartUpload document".to_string(),
            ));
        }

        let mut parts = Vec::new();
        for part in element_bodies(xml, "Part") {
            let number = element_bodies(part, "PartNumber")
                .first()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| AppError::InvalidInput("Part without PartNumber".to_string()))?;
            let part_number = number
                .parse::<u32>()
                .map_err(|_| AppError::InvalidInput(format!("invalid PartNumber '{}'", number)))?;
            let etag = element_bodies(part, "ETag")
                .first()
                .map(|s| xml_unescape(s.trim()))
                .unwrap_or_default();
            parts.push(CompletedPart { part_number, etag });
        }

        Ok(Self { parts })
    }

    pub fn part_count(&self) -> u32 {
        u32::try_from(self.parts.len()).unwrap_or(u32::MAX)
    }
}

/// Rewrite `xml` so plain substring matching works on it: element names lose
/// their namespace prefix, comments are dropped and CDATA content is escaped
/// in place.
fn normalize_xml(xml: &str) -> Result<String, AppError> {
    let malformed = |what: &str| AppError::InvalidInput(format!("unterminated {} in manifest", what));

    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let tail = &rest[lt..];

        if let Some(comment) = tail.strip_prefix("<!--") {
            let end = comment.find("-->").ok_or_else(|| malformed("comment"))?;
            rest = &comment[end + 3..];
            continue;
        }
        if let Some(cdata) = tail.strip_prefix("<![CDATA[") {
            let end = cdata.find("]]>").ok_or_else(|| malformed("CDATA section"))?;
            out.push_str(&xml_escape(&cdata[..end]));
            rest = &cdata[end + 3..];
            continue;
        }

        let gt = tail.find('>').ok_or_else(|| malformed("tag"))?;
        let inner = &tail[1..gt];
        let (slash, inner) = match inner.strip_prefix('/') {
            Some(name) => ("/", name),
            None => ("", inner),
        };
        let name_end = inner
            .find(|c: char| c.is_whitespace() || c == '/')
            .unwrap_or(inner.len());
        let (name, attrs) = inner.split_at(name_end);
        let local = name.rsplit_once(':').map_or(name, |(_, local)| local);

        out.push('<');
        out.push_str(slash);
        out.push_str(local);
        out.push_str(attrs);
        out.push('>');
        rest = &tail[gt + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Inner text of every `<tag>...</tag>` (attributes on the opening tag allowed).
fn element_bodies<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open_plain = format!("<{}>", tag);
    let open_attr = format!("<{} ", tag);
    let close = format!("</{}>", tag);

    let mut bodies = Vec::new();
    let mut rest = xml;
    loop {
        let start = match (rest.find(&open_plain), rest.find(&open_attr)) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => break,
        };
        let after_open = &rest[start..];
        let Some(gt) = after_open.find('>') else {
            break;
        };
        let content = &after_open[gt + 1..];
        let Some(end) = content.find(&close) else {
            break;
        };
        bodies.push(&content[..end]);
        rest = &content[end + close.len()..];
    }
    bodies
}

pub fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
