use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Canvas attribute value: integer with optional `px`.
static ATTR_PIXELS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)(px)?\s*$").expect("valid regex"));

/// Inline-style value in pixels with optional `!important`.
static STYLE_PIXELS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\s*)(\d+(?:\.\d+)?)px(\s*!important)?(\s*)$").expect("valid regex")
});

/// Elements whose content is not markup.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

/// Maximum rendered size of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_width: 600,
            max_height: 400,
        }
    }
}

/// Reasons a document could not be tokenized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkupError {
    #[error("unterminated tag at byte {0}")]
    UnterminatedTag(usize),
    #[error("unterminated attribute quote at byte {0}")]
    UnterminatedQuote(usize),
    #[error("unterminated comment at byte {0}")]
    UnterminatedComment(usize),
    #[error("unterminated declaration at byte {0}")]
    UnterminatedDeclaration(usize),
    #[error("unclosed <{name}> element at byte {offset}")]
    UnclosedRawText { name: String, offset: usize },
}

/// Clamps canvas and inline-style dimensions in an HTML document.
#[derive(Debug, Clone, Default)]
pub struct MarkupSanitizer {
    limits: SizeLimits,
}

/// Sanitizes with the default 600x400 limits.
pub fn sanitize_chart_html(html: &str) -> String {
    MarkupSanitizer::default().sanitize(html)
}

impl MarkupSanitizer {
    pub fn new(limits: SizeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SizeLimits {
        self.limits
    }

    /// Returns the clamped document, or `html` unchanged when it is malformed.
    pub fn sanitize(&self, html: &str) -> String {
        match self.try_sanitize(html) {
            Ok(sanitized) => sanitized,
            Err(e) => {
                debug!(error = %e, "Leaving malformed HTML untouched");
                html.to_string()
            }
        }
    }

    /// Like [`sanitize`](Self::sanitize) but reports why a document was rejected.
    pub fn try_sanitize(&self, html: &str) -> Result<String, MarkupError> {
        let edits = self.collect_edits(html)?;
        if edits.is_empty() {
            return Ok(html.to_string());
        }

        let mut out = String::with_capacity(html.len());
        let mut copied = 0;
        for (range, replacement) in edits {
            out.push_str(&html[copied..range.start]);
            out.push_str(&replacement);
            copied = range.end;
        }
        out.push_str(&html[copied..]);
        Ok(out)
    }

    fn collect_edits(&self, html: &str) -> Result<Vec<(Range<usize>, String)>, MarkupError> {
        let lower = html.to_ascii_lowercase();
        let bytes = html.as_bytes();
        let mut edits = Vec::new();
        let mut pos = 0;

        while let Some(rel) = html[pos..].find('<') {
            let lt = pos + rel;
            let rest = &html[lt..];

            if rest.starts_with("<!--") {
                let end = find_from(html, lt + 4, "-->").ok_or(MarkupError::UnterminatedComment(lt))?;
                pos = end + 3;
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                let end = find_from(html, lt + 2, ">").ok_or(MarkupError::UnterminatedDeclaration(lt))?;
                pos = end + 1;
                continue;
            }
            if rest.starts_with("</") {
                let end = find_from(html, lt + 2, ">").ok_or(MarkupError::UnterminatedTag(lt))?;
                pos = end + 1;
                continue;
            }
            if !bytes.get(lt + 1).is_some_and(u8::is_ascii_alphabetic) {
                // A bare '<' in text.
                pos = lt + 1;
                continue;
            }

            let tag = parse_start_tag(html, lt)?;
            let name = &lower[tag.name.clone()];
            self.clamp_tag(html, name, &tag.attrs, &lower, &mut edits);
            pos = tag.end;

            if !tag.self_closing && RAW_TEXT_ELEMENTS.contains(&name) {
                let closing = format!("</{name}");
                pos = find_from(&lower, pos, &closing).ok_or_else(|| MarkupError::UnclosedRawText {
                    name: name.to_string(),
                    offset: lt,
                })?;
            }
        }

        Ok(edits)
    }

    fn clamp_tag(
        &self,
        html: &str,
        name: &str,
        attrs: &[Attribute],
        lower: &str,
        edits: &mut Vec<(Range<usize>, String)>,
    ) {
        let is_canvas = name == "canvas";
        for attr in attrs {
            let Some(value_range) = attr.value.clone() else {
                continue;
            };
            let value = &html[value_range.clone()];
            let replacement = match &lower[attr.name.clone()] {
                "width" if is_canvas => clamp_attribute(value, self.limits.max_width),
                "height" if is_canvas => clamp_attribute(value, self.limits.max_height),
                "style" => self.clamp_style(value, is_canvas),
                _ => None,
            };
            if let Some(replacement) = replacement {
                edits.push((value_range, replacement));
            }
        }
    }

    /// Rewrites pixel `height` (and on canvas, `width`) declarations above the limit.
    fn clamp_style(&self, style: &str, is_canvas: bool) -> Option<String> {
        let mut changed = false;
        let declarations: Vec<String> = style
            .split(';')
            .map(|decl| {
                let Some(colon) = decl.find(':') else {
                    return decl.to_string();
                };
                let property = decl[..colon].trim().to_ascii_lowercase();
                let max = match property.as_str() {
                    "height" => self.limits.max_height,
                    "width" if is_canvas => self.limits.max_width,
                    _ => return decl.to_string(),
                };
                match clamp_style_value(&decl[colon + 1..], max) {
                    Some(value) => {
                        changed = true;
                        format!("{}{value}", &decl[..=colon])
                    }
                    None => decl.to_string(),
                }
            })
            .collect();
        changed.then(|| declarations.join(";"))
    }
}

fn clamp_attribute(value: &str, max: u32) -> Option<String> {
    let caps = ATTR_PIXELS.captures(value)?;
    // Digits only, so a parse failure means the value overflowed.
    let number: u64 = caps[1].parse().unwrap_or(u64::MAX);
    if number <= u64::from(max) {
        return None;
    }
    let unit = caps.get(2).map_or("", |m| m.as_str());
    Some(format!("{max}{unit}"))
}

fn clamp_style_value(value: &str, max: u32) -> Option<String> {
    let caps = STYLE_PIXELS.captures(value)?;
    let number: f64 = caps[2].parse().ok()?;
    if number <= f64::from(max) {
        return None;
    }
    let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());
    Some(format!("{}{max}px{}{}", group(1), group(3), group(4)))
}

fn find_from(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    haystack.get(from..)?.find(needle).map(|i| from + i)
}

struct Attribute {
    name: Range<usize>,
    value: Option<Range<usize>>,
}

struct StartTag {
    name: Range<usize>,
    attrs: Vec<Attribute>,
    self_closing: bool,
    /// Byte offset just past the closing `>`.
    end: usize,
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn parse_start_tag(html: &str, lt: usize) -> Result<StartTag, MarkupError> {
    let bytes = html.as_bytes();
    let unterminated = MarkupError::UnterminatedTag(lt);

    let mut i = lt + 1;
    let name_start = i;
    while i < bytes.len() && !is_space(bytes[i]) && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }
    let name = name_start..i;

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        while i < bytes.len() && is_space(bytes[i]) {
            i += 1;
        }
        let Some(&b) = bytes.get(i) else {
            return Err(unterminated);
        };
        match b {
            b'>' => {
                return Ok(StartTag {
                    name,
                    attrs,
                    self_closing,
                    end: i + 1,
                });
            }
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => self_closing = false,
        }

        let attr_start = i;
        i += 1;
        while i < bytes.len() && !is_space(bytes[i]) && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        let attr_name = attr_start..i;

        let mut j = i;
        while j < bytes.len() && is_space(bytes[j]) {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            attrs.push(Attribute {
                name: attr_name,
                value: None,
            });
            continue;
        }
        j += 1;
        while j < bytes.len() && is_space(bytes[j]) {
            j += 1;
        }

        let value = match bytes.get(j) {
            None => return Err(unterminated),
            Some(&quote @ (b'"' | b'\'')) => {
                let start = j + 1;
                let close = html[start..]
                    .bytes()
                    .position(|c| c == quote)
                    .ok_or(MarkupError::UnterminatedQuote(j))?;
                i = start + close + 1;
                start..start + close
            }
            Some(_) => {
                let start = j;
                while j < bytes.len() && !is_space(bytes[j]) && bytes[j] != b'>' {
                    j += 1;
                }
                i = j;
                start..j
            }
        };
        attrs.push(Attribute {
            name: attr_name,
            value: Some(value),
        });
    }
}
