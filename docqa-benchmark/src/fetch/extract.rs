//! Content-type classification and text extraction

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use std::panic;
use std::sync::OnceLock;

use super::{FetchError, FetchResult};

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start and end a line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "td", "th", "table", "h1", "h2", "h3", "h4",
    "h5", "h6", "section", "article", "header", "footer", "blockquote", "pre", "hr",
];

/// Format a fetched document was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Html,
    Pdf,
    PlainText,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Html => "html",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::PlainText => "text",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decide how to decode a payload.
///
/// The declared content type wins; when it is missing or not one we understand,
/// the extension of the URL path decides.
pub fn classify(content_type: Option<&str>, url: &str) -> FetchResult<DocumentFormat> {
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_lowercase())
        .unwrap_or_default();

    if let Some(format) = format_for_mime(&declared) {
        return Ok(format);
    }

    let guessed = guess_mime_from_url(url);
    if let Some(format) = guessed.and_then(format_for_mime) {
        tracing::debug!("Classified {} as {} from its extension", url, format);
        return Ok(format);
    }

    let mime = if !declared.is_empty() {
        declared
    } else {
        guessed.unwrap_or("unknown").to_string()
    };
    Err(FetchError::UnsupportedContentType { mime })
}

fn format_for_mime(mime: &str) -> Option<DocumentFormat> {
    match mime {
        "application/pdf" => Some(DocumentFormat::Pdf),
        "text/html" | "application/xhtml+xml" => Some(DocumentFormat::Html),
        m if m.starts_with("text/") => Some(DocumentFormat::PlainText),
        _ => None,
    }
}

fn guess_mime_from_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file.rsplit_once('.')?;

    match ext.to_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "html" | "htm" => Some("text/html"),
        "xhtml" => Some("application/xhtml+xml"),
        "txt" | "text" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "md" | "markdown" => Some("text/markdown"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "zip" => Some("application/zip"),
        "json" => Some("application/json"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        _ => None,
    }
}

/// Visible text of an HTML page.
///
/// Text runs inside a block are joined as-is; block boundaries start a new line.
pub fn extract_html_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.tree.root().descendants() {
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => HIDDEN_ELEMENTS.contains(&element.name()),
            _ => false,
        });
        if hidden {
            continue;
        }

        let after_block = node
            .prev_sibling()
            .and_then(|sibling| sibling.value().as_element())
            .is_some_and(|element| BLOCK_ELEMENTS.contains(&element.name()));
        if after_block {
            raw.push('\n');
        }

        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(element) if BLOCK_ELEMENTS.contains(&element.name()) => raw.push('\n'),
            _ => {}
        }
    }

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(collapse_spaces)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs of horizontal whitespace (including non-breaking spaces) become one space
fn collapse_spaces(line: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let spaces = SPACES.get_or_init(|| Regex::new(r"[\p{Zs}\t]+").expect("static pattern"));
    spaces.replace_all(line, " ").into_owned()
}

/// Decode a text body using the `charset` of its content type, UTF-8 otherwise
pub fn decode_text(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!("Body had bytes invalid for {}", encoding.name());
    }
    text.into_owned()
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Text of every page of a PDF, in document order.
///
/// The decoder panics on some malformed inputs; a panic is reported as an
/// extraction error.
pub fn extract_pdf_text(bytes: &[u8]) -> FetchResult<String> {
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(FetchError::Extraction(e.to_string())),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            tracing::warn!("PDF decoder panicked: {}", reason);
            Err(FetchError::Extraction(format!("PDF decoder panicked: {}", reason)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_takes_precedence() {
        assert_eq!(
            classify(Some("application/pdf"), "http://x.com/page.html").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            classify(Some("text/html; charset=utf-8"), "http://x.com/file.pdf").unwrap(),
            DocumentFormat::Html
        );
        assert_eq!(
            classify(Some("TEXT/PLAIN"), "http://x.com/a").unwrap(),
            DocumentFormat::PlainText
        );
    }

    #[test]
    fn test_falls_back_to_extension() {
        assert_eq!(
            classify(None, "http://x.com/docs/terms.PDF?download=1").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            classify(Some("application/octet-stream"), "http://x.com/report.pdf").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            classify(Some(""), "http://x.com/notes.txt").unwrap(),
            DocumentFormat::PlainText
        );
        assert_eq!(
            classify(None, "http://example.com/doc.html").unwrap(),
            DocumentFormat::Html
        );
    }

    #[test]
    fn test_unsupported_names_mime() {
        match classify(Some("image/png"), "http://x.com/pic") {
            Err(FetchError::UnsupportedContentType { mime }) => assert_eq!(mime, "image/png"),
            other => panic!("unexpected: {:?}", other),
        }
        match classify(None, "http://x.com/archive.zip") {
            Err(FetchError::UnsupportedContentType { mime }) => {
                assert_eq!(mime, "application/zip")
            }
            other => panic!("unexpected: {:?}", other),
        }
        match classify(None, "http://x.com/") {
            Err(FetchError::UnsupportedContentType { mime }) => assert_eq!(mime, "unknown"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_html_excludes_script_and_style() {
        let html = r#"<html><head><title>T</title><style>body { color: red; }</style></head>
            <body>
              <h1>Terms of Service</h1>
              <script>var tracking = "secret";</script>
              <p>You agree to   the terms.</p>
              <noscript>Enable JS</noscript>
            </body></html>"#;
        let text = extract_html_text(html);
        assert_eq!(text, "Terms of Service\nYou agree to the terms.");
        assert!(!text.contains("secret"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_html_keeps_nested_inline_text() {
        let text = extract_html_text("<p>Renewal is <b>annual</b></p><ul><li>One</li><li>Two</li></ul>");
        assert_eq!(text, "Renewal is annual\nOne\nTwo");
    }

    #[test]
    fn test_inline_markup_stays_on_one_line() {
        assert_eq!(
            extract_html_text("<p>Renewal is <b>annual</b> each <a href='#'>year</a>.</p>"),
            "Renewal is annual each year."
        );
    }

    #[test]
    fn test_block_boundaries_split_lines() {
        let html = "<div><p>First</p>tail<br>after break<h2>Heading</h2><span>inline</span></div>";
        assert_eq!(
            extract_html_text(html),
            "First\ntail\nafter break\nHeading\ninline"
        );
    }

    #[test]
    fn test_decode_uses_declared_charset() {
        let latin1 = b"Caf\xe9 cr\xe8me";
        assert_eq!(
            decode_text(latin1, Some("text/plain; charset=ISO-8859-1")),
            "Caf\u{e9} cr\u{e8}me"
        );
        assert_eq!(
            decode_text("Caf\u{e9}".as_bytes(), Some("text/html; charset=\"utf-8\"")),
            "Caf\u{e9}"
        );
        assert_eq!(decode_text("plain".as_bytes(), None), "plain");
        assert_eq!(decode_text(b"ok", Some("text/plain; charset=bogus")), "ok");
    }

    #[test]
    fn test_non_breaking_spaces_collapse() {
        assert_eq!(extract_html_text("<p>Section\u{a0}\u{a0}4.2\t applies</p>"), "Section 4.2 applies");
    }

    #[test]
    fn test_invalid_pdf_is_extraction_error() {
        let err = extract_pdf_text(b"not a pdf").unwrap_err();
        assert!(matches!(err, FetchError::Extraction(_)));
    }

    #[test]
    fn test_broken_pdf_with_header_is_extraction_error() {
        let broken = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
                       2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
                       3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 9 0 R >>\nendobj\n\
                       xref\n0 2\ntrailer\n<< /Root 1 0 R >>\nstartxref\n9999\n%%EOF";
        match extract_pdf_text(broken) {
            Err(FetchError::Extraction(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
