use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tracing::debug;
use url::Url;

use crate::error::IngestError;

const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
const SKIPPED_HTML_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    PlainText,
    Markdown,
    Pdf,
    Docx,
    HtmlFile,
    HtmlUrl,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::HtmlFile => "html",
            Self::HtmlUrl => "url",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "html" | "htm" => Some(Self::HtmlFile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Path(PathBuf),
    Url(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub id: String,
    pub location: SourceLocation,
    pub kind: SourceKind,
}

impl fmt::Display for ResolvedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

pub fn resolve(raw: &str) -> Result<ResolvedSource, IngestError> {
    let raw = raw.trim();
    if let Some(url) = parse_web_url(raw) {
        return Ok(ResolvedSource {
            id: url.to_string(),
            location: SourceLocation::Url(url),
            kind: SourceKind::HtmlUrl,
        });
    }

    let path = expand_home(raw);
    if !path.exists() {
        return Err(IngestError::SourceNotFound(path));
    }
    let kind = path
        .is_file()
        .then(|| path.extension().and_then(|ext| ext.to_str()))
        .flatten()
        .and_then(SourceKind::from_extension)
        .ok_or_else(|| IngestError::UnsupportedSource(raw.to_string()))?;

    Ok(ResolvedSource {
        id: path.display().to_string(),
        location: SourceLocation::Path(path),
        kind,
    })
}

pub fn looks_like_source(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.contains(char::is_whitespace) {
        return false;
    }
    resolve(line).is_ok()
}

fn parse_web_url(raw: &str) -> Option<Url> {
    Url::parse(raw)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a>>;

pub trait DocumentLoader {
    fn load<'a>(&'a self, source: &'a ResolvedSource) -> LoadFuture<'a>;
}

pub struct LoaderRegistry {
    loaders: HashMap<SourceKind, Box<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    pub fn with_defaults(client: &Client) -> Self {
        let mut registry = Self::empty();
        registry.register(SourceKind::PlainText, TextFileLoader);
        registry.register(SourceKind::Markdown, TextFileLoader);
        registry.register(SourceKind::Pdf, PdfLoader);
        registry.register(SourceKind::Docx, DocxLoader);
        registry.register(SourceKind::HtmlFile, HtmlFileLoader);
        registry.register(
            SourceKind::HtmlUrl,
            WebPageLoader {
                client: client.clone(),
            },
        );
        registry
    }

    pub fn register(&mut self, kind: SourceKind, loader: impl DocumentLoader + 'static) {
        self.loaders.insert(kind, Box::new(loader));
    }

    pub async fn load(&self, source: &ResolvedSource) -> Result<String, IngestError> {
        let loader = self
            .loaders
            .get(&source.kind)
            .ok_or_else(|| IngestError::UnsupportedSource(source.id.clone()))?;
        debug!(source = %source, kind = source.kind.as_str(), "loading document");
        loader.load(source).await.map_err(|err| IngestError::Load {
            source_id: source.id.clone(),
            reason: format!("{err:#}"),
        })
    }
}

fn local_path(source: &ResolvedSource) -> Result<&Path> {
    match &source.location {
        SourceLocation::Path(path) => Ok(path),
        SourceLocation::Url(url) => Err(anyhow!("expected a local file, got URL {url}")),
    }
}

fn read_bytes(source: &ResolvedSource) -> Result<Vec<u8>> {
    let path = local_path(source)?;
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub struct TextFileLoader;

impl DocumentLoader for TextFileLoader {
    fn load<'a>(&'a self, source: &'a ResolvedSource) -> LoadFuture<'a> {
        Box::pin(async move {
            let bytes = read_bytes(source)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
    }
}

pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load<'a>(&'a self, source: &'a ResolvedSource) -> LoadFuture<'a> {
        Box::pin(async move { extract_pdf(&read_bytes(source)?) })
    }
}

pub struct DocxLoader;

impl DocumentLoader for DocxLoader {
    fn load<'a>(&'a self, source: &'a ResolvedSource) -> LoadFuture<'a> {
        Box::pin(async move { extract_docx(&read_bytes(source)?) })
    }
}

pub struct HtmlFileLoader;

impl DocumentLoader for HtmlFileLoader {
    fn load<'a>(&'a self, source: &'a ResolvedSource) -> LoadFuture<'a> {
        Box::pin(async move {
            let bytes = read_bytes(source)?;
            Ok(html_to_text(&String::from_utf8_lossy(&bytes)))
        })
    }
}

pub struct WebPageLoader {
    client: Client,
}

impl DocumentLoader for WebPageLoader {
    fn load<'a>(&'a self, source: &'a ResolvedSource) -> LoadFuture<'a> {
        Box::pin(async move {
            let SourceLocation::Url(url) = &source.location else {
                return Err(anyhow!("expected a URL, got {}", source.id));
            };
            let html = self
                .client
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("Failed to fetch {url}"))?
                .error_for_status()
                .with_context(|| format!("Failed to fetch {url}"))?
                .text()
                .await
                .with_context(|| format!("Failed to read body of {url}"))?;
            Ok(html_to_text(&html))
        })
    }
}

pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|err| anyhow!("PDF extraction failed: {err}"))
}

pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .context("DOCX is not a valid zip archive")?;
    let entry = archive
        .by_name("word/document.xml")
        .context("word/document.xml not found")?;
    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .context("Failed to read word/document.xml")?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(anyhow!("word/document.xml exceeds size limit"));
    }
    paragraphs_from_document_xml(&xml)
}

fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => out.push('\t'),
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(anyhow!("DOCX XML is malformed: {err}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

pub fn html_to_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let root = scraper::Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?.value().as_element()?;
            if SKIPPED_HTML_ELEMENTS.iter().any(|name| *name == parent.name()) {
                return None;
            }
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!collapsed.is_empty()).then_some(collapsed)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
