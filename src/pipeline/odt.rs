//! ODT emission: styled ODF blocks for each [`ContentNode`], packaged as an
//! OpenDocument Text zip container.
//!
//! The body is accumulated in memory as nodes are appended; nothing touches
//! the filesystem until [`OdtDocument::write_to`], which writes the whole
//! package in one atomic rename.
//!
//! Package layout:
//!
//! | entry                   | compression |
//! |-------------------------|-------------|
//! | `mimetype`              | stored, first |
//! | `content.xml`           | deflated    |
//! | `styles.xml`            | deflated    |
//! | `meta.xml`              | deflated    |
//! | `META-INF/manifest.xml` | deflated    |

use super::style::{directive, Numbering, ParagraphStyle, StyleDirective, FONT_FAMILY};
use super::tei::{Citation, ContentNode, List, Run, Table};
use super::write_atomic;
use crate::error::Pdf2OdtError;
use crate::output::EmitStats;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MIMETYPE: &str = "application/vnd.oasis.opendocument.text";
const ODF_VERSION: &str = "1.3";

const NS_OFFICE: &str = "urn:oasis:names:tc:opendocument:xmlns:office:1.0";
const NS_STYLE: &str = "urn:oasis:names:tc:opendocument:xmlns:style:1.0";
const NS_TEXT: &str = "urn:oasis:names:tc:opendocument:xmlns:text:1.0";
const NS_TABLE: &str = "urn:oasis:names:tc:opendocument:xmlns:table:1.0";
const NS_FO: &str = "urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0";
const NS_SVG: &str = "urn:oasis:names:tc:opendocument:xmlns:svg-compatible:1.0";
const NS_XLINK: &str = "http://www.w3.org/1999/xlink";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
const NS_META: &str = "urn:oasis:names:tc:opendocument:xmlns:meta:1.0";
const NS_MANIFEST: &str = "urn:oasis:names:tc:opendocument:xmlns:manifest:1.0";

/// Deepest list level declared in the list styles.
const LIST_LEVELS: u8 = 10;

// ── XML writer ───────────────────────────────────────────────────────────

/// Thin wrapper over `quick_xml::Writer` that maps errors into ours.
struct Xml {
    writer: Writer<Vec<u8>>,
}

impl Xml {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), Pdf2OdtError> {
        self.writer
            .write_event(event)
            .map(|_| ())
            .map_err(|e| Pdf2OdtError::Internal(format!("xml write failed: {e}")))
    }

    fn decl(&mut self) -> Result<(), Pdf2OdtError> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Pdf2OdtError> {
        self.event(Event::Start(element(name, attrs)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Pdf2OdtError> {
        self.event(Event::Empty(element(name, attrs)))
    }

    fn end(&mut self, name: &str) -> Result<(), Pdf2OdtError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, text: &str) -> Result<(), Pdf2OdtError> {
        if text.is_empty() {
            return Ok(());
        }
        self.event(Event::Text(BytesText::new(text)))
    }

    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), Pdf2OdtError> {
        self.start(name, attrs)?;
        self.text(text)?;
        self.end(name)
    }

    /// Splice already-serialised markup.
    fn raw(&mut self, bytes: &[u8]) {
        self.writer.get_mut().extend_from_slice(bytes);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

fn element<'a>(name: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
    let mut e = BytesStart::new(name);
    for (k, v) in attrs {
        e.push_attribute((*k, *v));
    }
    e
}

// ── Document ─────────────────────────────────────────────────────────────

/// An output document under construction.
pub struct OdtDocument {
    body: Xml,
    title: Option<String>,
    stats: EmitStats,
    tables: usize,
}

impl Default for OdtDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OdtDocument {
    pub fn new() -> Self {
        Self {
            body: Xml::new(),
            title: None,
            stats: EmitStats::default(),
            tables: 0,
        }
    }

    /// Counts of what has been appended so far.
    pub fn stats(&self) -> EmitStats {
        self.stats
    }

    /// Append one node as the next block(s) of the body.
    pub fn append(&mut self, node: &ContentNode) -> Result<(), Pdf2OdtError> {
        let d = directive(node.kind(), node.level());
        match node {
            ContentNode::Title(text) => {
                if self.title.is_none() {
                    self.title = Some(text.clone());
                }
                self.paragraph_text(&d, text)?;
                self.stats.paragraphs += 1;
            }
            ContentNode::Authors(names) => {
                self.paragraph_text(&d, &names.join(", "))?;
                self.stats.paragraphs += 1;
            }
            ContentNode::SectionLabel(text) => {
                self.paragraph_text(&d, text)?;
                self.stats.paragraphs += 1;
            }
            ContentNode::Abstract(runs) | ContentNode::Paragraph(runs) => {
                self.paragraph_runs(&d, runs)?;
                self.stats.paragraphs += 1;
            }
            ContentNode::Heading { number, text, .. } => {
                self.heading(&d, number.as_deref(), text)?;
                self.stats.headings += 1;
            }
            ContentNode::List(list) => {
                self.list(&d, list)?;
                self.stats.lists += 1;
            }
            ContentNode::Table(table) => {
                self.table(&d, table)?;
                self.stats.tables += 1;
            }
            ContentNode::Reference(citation) => {
                self.stats.references += 1;
                self.reference(&d, citation, self.stats.references)?;
            }
        }
        self.stats.blocks += 1;
        Ok(())
    }

    /// Append every node in order.
    pub fn extend<'n>(
        &mut self,
        nodes: impl IntoIterator<Item = &'n ContentNode>,
    ) -> Result<(), Pdf2OdtError> {
        for node in nodes {
            self.append(node)?;
        }
        Ok(())
    }

    fn paragraph_text(&mut self, d: &StyleDirective, text: &str) -> Result<(), Pdf2OdtError> {
        let style = d.style.name();
        self.body.leaf("text:p", &[("text:style-name", style.as_str())], text)
    }

    fn paragraph_runs(&mut self, d: &StyleDirective, runs: &[Run]) -> Result<(), Pdf2OdtError> {
        let style = d.style.name();
        self.body.start("text:p", &[("text:style-name", style.as_str())])?;
        self.runs(runs)?;
        self.body.end("text:p")
    }

    fn runs(&mut self, runs: &[Run]) -> Result<(), Pdf2OdtError> {
        for run in runs {
            match run {
                Run::Text(text) => self.body.text(text)?,
                Run::Citation { text, target } => {
                    let href = format!("#{target}");
                    self.link(&href, text)?;
                }
                Run::Link { text, href } => self.link(href, text)?,
            }
        }
        Ok(())
    }

    fn link(&mut self, href: &str, text: &str) -> Result<(), Pdf2OdtError> {
        self.body.leaf(
            "text:a",
            &[("xlink:type", "simple"), ("xlink:href", href)],
            text,
        )
    }

    fn heading(
        &mut self,
        d: &StyleDirective,
        number: Option<&str>,
        text: &str,
    ) -> Result<(), Pdf2OdtError> {
        let style = d.style.name();
        let level = d.outline_level.unwrap_or(1).to_string();
        let text = match number {
            Some(n) => format!("{n} {text}"),
            None => text.to_string(),
        };
        self.body.leaf(
            "text:h",
            &[("text:style-name", style.as_str()), ("text:outline-level", level.as_str())],
            &text,
        )
    }

    fn list(&mut self, d: &StyleDirective, list: &List) -> Result<(), Pdf2OdtError> {
        let item_style = d.style.name();

        // Only the outermost list names a style; nested lists inherit its levels.
        match (d.indent, d.numbering.list_style_name()) {
            (1, Some(list_style)) => self.body.start("text:list", &[("text:style-name", list_style)])?,
            _ => self.body.start("text:list", &[])?,
        }
        if let Some(ref head) = list.head {
            self.body.start("text:list-header", &[])?;
            self.body.leaf("text:p", &[("text:style-name", item_style.as_str())], head)?;
            self.body.end("text:list-header")?;
        }
        let nested = d.indent.saturating_add(1).min(LIST_LEVELS);
        for item in &list.items {
            self.body.start("text:list-item", &[])?;
            if !item.runs.is_empty() {
                self.body.start("text:p", &[("text:style-name", item_style.as_str())])?;
                self.runs(&item.runs)?;
                self.body.end("text:p")?;
            }
            for sub in &item.sublists {
                self.list(&directive(sub.kind(), nested), sub)?;
            }
            self.body.end("text:list-item")?;
        }
        self.body.end("text:list")
    }

    fn table(&mut self, d: &StyleDirective, table: &Table) -> Result<(), Pdf2OdtError> {
        self.tables += 1;
        if let Some(ref caption) = table.caption {
            let style = ParagraphStyle::TableCaption.name();
            self.body.leaf("text:p", &[("text:style-name", style.as_str())], caption)?;
        }

        let name = format!("Table{}", self.tables);
        let columns = table.columns().to_string();
        let cell_style = d.style.name();
        self.body.start("table:table", &[("table:name", name.as_str())])?;
        self.body
            .empty("table:table-column", &[("table:number-columns-repeated", columns.as_str())])?;
        for row in &table.rows {
            self.body.start("table:table-row", &[])?;
            for cell in row {
                let span = cell.span.to_string();
                let mut attrs = vec![("office:value-type", "string")];
                if cell.span > 1 {
                    attrs.push(("table:number-columns-spanned", span.as_str()));
                }
                self.body.start("table:table-cell", &attrs)?;
                self.body
                    .leaf("text:p", &[("text:style-name", cell_style.as_str())], &cell.text)?;
                self.body.end("table:table-cell")?;
                for _ in 1..cell.span {
                    self.body.empty("table:covered-table-cell", &[])?;
                }
            }
            self.body.end("table:table-row")?;
        }
        self.body.end("table:table")
    }

    fn reference(
        &mut self,
        d: &StyleDirective,
        citation: &Citation,
        position: usize,
    ) -> Result<(), Pdf2OdtError> {
        let style = d.style.name();
        self.body.start("text:p", &[("text:style-name", style.as_str())])?;
        self.body.empty("text:bookmark", &[("text:name", citation.id.as_str())])?;
        if let Some(prefix) = d.numbering.prefix(position) {
            self.body.text(&prefix)?;
        }
        self.body.text(&citation.formatted())?;
        self.body.end("text:p")
    }

    /// Serialise the package into zip bytes.
    pub fn finish(self) -> Result<Vec<u8>, Pdf2OdtError> {
        let content = content_xml(&self.body.into_bytes())?;
        let styles = styles_xml()?;
        let meta = meta_xml(self.title.as_deref())?;
        let manifest = manifest_xml()?;

        let zip_err = |e: zip::result::ZipError| Pdf2OdtError::Internal(format!("zip: {e}"));
        let io_err = |e: std::io::Error| Pdf2OdtError::Internal(format!("zip: {e}"));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).map_err(zip_err)?;
        zip.write_all(MIMETYPE.as_bytes()).map_err(io_err)?;
        for (name, bytes) in [
            ("content.xml", &content),
            ("styles.xml", &styles),
            ("meta.xml", &meta),
            ("META-INF/manifest.xml", &manifest),
        ] {
            zip.start_file(name, deflated).map_err(zip_err)?;
            zip.write_all(bytes).map_err(io_err)?;
        }
        let cursor = zip.finish().map_err(zip_err)?;
        Ok(cursor.into_inner())
    }

    /// Build the package and write it atomically to `path`.
    pub fn write_to(self, path: &Path) -> Result<EmitStats, Pdf2OdtError> {
        let stats = self.stats;
        let bytes = self.finish()?;
        write_atomic(path, &bytes)?;
        debug!(
            "Wrote {} ({} bytes, {} blocks)",
            path.display(),
            bytes.len(),
            stats.blocks
        );
        Ok(stats)
    }
}

/// Emit a whole node sequence into ODT bytes.
pub fn render(nodes: impl IntoIterator<Item = ContentNode>) -> Result<(Vec<u8>, EmitStats), Pdf2OdtError> {
    let mut doc = OdtDocument::new();
    for node in nodes {
        doc.append(&node)?;
    }
    let stats = doc.stats();
    Ok((doc.finish()?, stats))
}

// ── Package parts ────────────────────────────────────────────────────────

fn font_face_decls(xml: &mut Xml) -> Result<(), Pdf2OdtError> {
    xml.start("office:font-face-decls", &[])?;
    xml.empty(
        "style:font-face",
        &[
            ("style:name", FONT_FAMILY),
            ("svg:font-family", FONT_FAMILY),
            ("style:font-family-generic", "swiss"),
        ],
    )?;
    xml.end("office:font-face-decls")
}

fn content_xml(body: &[u8]) -> Result<Vec<u8>, Pdf2OdtError> {
    let mut xml = Xml::new();
    xml.decl()?;
    xml.start(
        "office:document-content",
        &[
            ("xmlns:office", NS_OFFICE),
            ("xmlns:style", NS_STYLE),
            ("xmlns:text", NS_TEXT),
            ("xmlns:table", NS_TABLE),
            ("xmlns:fo", NS_FO),
            ("xmlns:svg", NS_SVG),
            ("xmlns:xlink", NS_XLINK),
            ("office:version", ODF_VERSION),
        ],
    )?;
    font_face_decls(&mut xml)?;
    xml.empty("office:automatic-styles", &[])?;
    xml.start("office:body", &[])?;
    xml.start("office:text", &[])?;
    xml.raw(body);
    xml.end("office:text")?;
    xml.end("office:body")?;
    xml.end("office:document-content")?;
    Ok(xml.into_bytes())
}

fn styles_xml() -> Result<Vec<u8>, Pdf2OdtError> {
    let mut xml = Xml::new();
    xml.decl()?;
    xml.start(
        "office:document-styles",
        &[
            ("xmlns:office", NS_OFFICE),
            ("xmlns:style", NS_STYLE),
            ("xmlns:text", NS_TEXT),
            ("xmlns:table", NS_TABLE),
            ("xmlns:fo", NS_FO),
            ("xmlns:svg", NS_SVG),
            ("office:version", ODF_VERSION),
        ],
    )?;
    font_face_decls(&mut xml)?;
    xml.start("office:styles", &[])?;

    xml.start("style:default-style", &[("style:family", "paragraph")])?;
    xml.empty(
        "style:text-properties",
        &[("style:font-name", FONT_FAMILY), ("fo:font-size", "12pt")],
    )?;
    xml.end("style:default-style")?;

    for style in ParagraphStyle::all() {
        paragraph_style(&mut xml, style)?;
    }
    list_style(&mut xml, Numbering::Bullet)?;
    list_style(&mut xml, Numbering::Decimal)?;

    xml.end("office:styles")?;
    xml.end("office:document-styles")?;
    Ok(xml.into_bytes())
}

fn paragraph_style(xml: &mut Xml, style: ParagraphStyle) -> Result<(), Pdf2OdtError> {
    let name = style.name();
    let display = style.display_name();
    let outline = match style {
        ParagraphStyle::Heading(level) => Some(level.to_string()),
        _ => None,
    };
    let mut attrs = vec![
        ("style:name", name.as_str()),
        ("style:display-name", display.as_str()),
        ("style:family", "paragraph"),
    ];
    if let Some(ref level) = outline {
        attrs.push(("style:default-outline-level", level.as_str()));
    }
    xml.start("style:style", &attrs)?;

    let p = style.properties();
    let top = format!("{:.2}cm", p.margin_top_cm);
    let bottom = format!("{:.2}cm", p.margin_bottom_cm);
    let mut para = vec![("fo:margin-top", top.as_str()), ("fo:margin-bottom", bottom.as_str())];
    if p.centered {
        para.push(("fo:text-align", "center"));
    }
    if p.keep_with_next {
        para.push(("fo:keep-with-next", "always"));
    }
    xml.empty("style:paragraph-properties", &para)?;

    let size = format!("{}pt", p.font_size_pt);
    let mut text = vec![("style:font-name", FONT_FAMILY), ("fo:font-size", size.as_str())];
    if p.bold {
        text.push(("fo:font-weight", "bold"));
    }
    if p.italic {
        text.push(("fo:font-style", "italic"));
    }
    xml.empty("style:text-properties", &text)?;
    xml.end("style:style")
}

fn list_style(xml: &mut Xml, numbering: Numbering) -> Result<(), Pdf2OdtError> {
    let Some(name) = numbering.list_style_name() else {
        return Ok(());
    };
    xml.start("text:list-style", &[("style:name", name)])?;
    for level in 1..=LIST_LEVELS {
        let lvl = level.to_string();
        let indent = format!("{:.3}cm", 0.635 * f32::from(level));
        let (tag, attrs) = match numbering {
            Numbering::Decimal => (
                "text:list-level-style-number",
                vec![
                    ("text:level", lvl.as_str()),
                    ("style:num-format", "1"),
                    ("style:num-suffix", "."),
                ],
            ),
            _ => (
                "text:list-level-style-bullet",
                vec![("text:level", lvl.as_str()), ("text:bullet-char", "•")],
            ),
        };
        xml.start(tag, &attrs)?;
        xml.start(
            "style:list-level-properties",
            &[("text:list-level-position-and-space-mode", "label-alignment")],
        )?;
        xml.empty(
            "style:list-level-label-alignment",
            &[
                ("text:label-followed-by", "listtab"),
                ("fo:text-indent", "-0.635cm"),
                ("fo:margin-left", indent.as_str()),
            ],
        )?;
        xml.end("style:list-level-properties")?;
        xml.end(tag)?;
    }
    xml.end("text:list-style")
}

fn meta_xml(title: Option<&str>) -> Result<Vec<u8>, Pdf2OdtError> {
    let mut xml = Xml::new();
    xml.decl()?;
    xml.start(
        "office:document-meta",
        &[
            ("xmlns:office", NS_OFFICE),
            ("xmlns:meta", NS_META),
            ("xmlns:dc", NS_DC),
            ("office:version", ODF_VERSION),
        ],
    )?;
    xml.start("office:meta", &[])?;
    let generator = format!("pdf2odt/{}", env!("CARGO_PKG_VERSION"));
    xml.leaf("meta:generator", &[], &generator)?;
    if let Some(title) = title {
        xml.leaf("dc:title", &[], title)?;
    }
    xml.end("office:meta")?;
    xml.end("office:document-meta")?;
    Ok(xml.into_bytes())
}

fn manifest_xml() -> Result<Vec<u8>, Pdf2OdtError> {
    let mut xml = Xml::new();
    xml.decl()?;
    xml.start(
        "manifest:manifest",
        &[("xmlns:manifest", NS_MANIFEST), ("manifest:version", ODF_VERSION)],
    )?;
    xml.empty(
        "manifest:file-entry",
        &[
            ("manifest:full-path", "/"),
            ("manifest:version", ODF_VERSION),
            ("manifest:media-type", MIMETYPE),
        ],
    )?;
    for part in ["content.xml", "styles.xml", "meta.xml"] {
        xml.empty(
            "manifest:file-entry",
            &[("manifest:full-path", part), ("manifest:media-type", "text/xml")],
        )?;
    }
    xml.end("manifest:manifest")?;
    Ok(xml.into_bytes())
}
