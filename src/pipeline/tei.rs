//! TEI tree walk: classify GROBID's TEI into [`ContentNode`]s.
//!
//! GROBID's full-text TEI has three parts we care about:
//!
//! ```text
//! TEI
//!  ├─ teiHeader   title, authors (sourceDesc), abstract (profileDesc)
//!  └─ text
//!      ├─ body    div* ─ head, p, list, figure[@type=table], formula, …
//!      └─ back    div ─ listBibl ─ biblStruct*
//! ```
//!
//! [`TeiDocument::nodes`] yields the front matter, then the body in document
//! order, then the bibliography. The body is walked lazily with an explicit
//! stack of child iterators, one frame per open `div`, so the sequence can be
//! consumed incrementally and restarted by calling `nodes()` again.
//!
//! Classification is a single closed mapping, [`ElementKind::of`]. Anything
//! it does not recognise, or recognises but cannot make sense of (a table
//! figure without a `table`, a list without items), degrades to a plain-text
//! paragraph instead of failing the document.

use crate::error::Pdf2OdtError;
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Children, Document, Node, ParsingOptions};
use std::collections::VecDeque;
use std::path::Path;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Deepest heading level emitted; deeper sections are clamped.
pub const MAX_HEADING_LEVEL: u8 = 6;

// ── Content model ────────────────────────────────────────────────────────

/// An inline piece of paragraph text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    Text(String),
    /// In-text citation (`ref[@type='bibr']`); `target` is a reference id.
    Citation { text: String, target: String },
    /// External hyperlink (`ref[@type='url']`).
    Link { text: String, href: String },
}

impl Run {
    pub fn text(&self) -> &str {
        match self {
            Run::Text(t) => t,
            Run::Citation { text, .. } | Run::Link { text, .. } => text,
        }
    }
}

/// Concatenated text of a run sequence.
pub fn plain_text(runs: &[Run]) -> String {
    runs.iter().map(Run::text).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub ordered: bool,
    /// Text of the list's own `head`, if any.
    pub head: Option<String>,
    pub items: Vec<ListItem>,
}

impl List {
    pub fn kind(&self) -> NodeKind {
        if self.ordered {
            NodeKind::NumberedList
        } else {
            NodeKind::BulletList
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub runs: Vec<Run>,
    pub sublists: Vec<List>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    /// Number of grid columns this cell covers (`cell/@cols`), at least 1.
    pub span: usize,
}

/// A rectangular table: every row covers exactly [`Table::columns`] grid
/// columns once spans are counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub caption: Option<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn columns(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.iter().map(|c| c.span).sum::<usize>())
            .max()
            .unwrap_or(0)
    }
}

/// A bibliography entry with the fields GROBID extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Citation {
    /// `xml:id`, the anchor in-text citations point at.
    pub id: String,
    pub authors: Vec<String>,
    pub title: Option<String>,
    /// Journal, proceedings or book title when `title` is an article.
    pub venue: Option<String>,
    pub volume: Option<String>,
    pub pages: Option<String>,
    pub year: Option<String>,
    pub doi: Option<String>,
    /// The reference as printed, or all of its text when GROBID kept no raw copy.
    pub raw: String,
}

impl Citation {
    /// `Authors (year). Title. Venue, volume, pages. doi:…`, falling back to
    /// the raw string when GROBID could not split the reference.
    pub fn formatted(&self) -> String {
        if self.authors.is_empty() && self.title.is_none() {
            return self.raw.clone();
        }

        let mut out = String::new();
        if !self.authors.is_empty() {
            out.push_str(&join_names(&self.authors));
        }
        if let Some(ref year) = self.year {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&format!("({year})"));
        }
        if !out.is_empty() {
            out.push_str(". ");
        }
        if let Some(ref title) = self.title {
            out.push_str(title);
            if !title.ends_with(['.', '?', '!']) {
                out.push('.');
            }
            out.push(' ');
        }
        let source: Vec<&str> = [&self.venue, &self.volume, &self.pages]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .collect();
        if !source.is_empty() {
            out.push_str(&source.join(", "));
            out.push_str(". ");
        }
        if let Some(ref doi) = self.doi {
            out.push_str(&format!("doi:{doi}"));
        }
        out.trim_end().to_string()
    }
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// One classified unit of document structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Title(String),
    Authors(Vec<String>),
    /// Caption introducing the abstract or the bibliography.
    SectionLabel(String),
    /// One abstract paragraph.
    Abstract(Vec<Run>),
    Heading {
        level: u8,
        /// Section number from `head/@n`, e.g. `"2.1"`.
        number: Option<String>,
        text: String,
    },
    Paragraph(Vec<Run>),
    List(List),
    Table(Table),
    Reference(Citation),
}

/// Field-less discriminant of [`ContentNode`], the Style Mapper's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Title,
    Authors,
    SectionLabel,
    Abstract,
    Heading,
    Paragraph,
    BulletList,
    NumberedList,
    Table,
    Reference,
}

impl ContentNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            ContentNode::Title(_) => NodeKind::Title,
            ContentNode::Authors(_) => NodeKind::Authors,
            ContentNode::SectionLabel(_) => NodeKind::SectionLabel,
            ContentNode::Abstract(_) => NodeKind::Abstract,
            ContentNode::Heading { .. } => NodeKind::Heading,
            ContentNode::Paragraph(_) => NodeKind::Paragraph,
            ContentNode::List(l) => l.kind(),
            ContentNode::Table(_) => NodeKind::Table,
            ContentNode::Reference(_) => NodeKind::Reference,
        }
    }

    /// Nesting level: the outline level for headings, 1 for a top-level
    /// list, 0 for everything else.
    pub fn level(&self) -> u8 {
        match self {
            ContentNode::Heading { level, .. } => *level,
            ContentNode::List(_) => 1,
            _ => 0,
        }
    }
}

// ── Document ─────────────────────────────────────────────────────────────

/// A parsed TEI document.
pub struct TeiDocument<'input> {
    doc: Document<'input>,
}

impl<'input> TeiDocument<'input> {
    /// Parse TEI XML. `origin` only labels the error.
    pub fn parse(xml: &'input str, origin: impl AsRef<Path>) -> Result<Self, Pdf2OdtError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(xml, options).map_err(|e| Pdf2OdtError::ParseError {
            path: origin.as_ref().to_path_buf(),
            detail: e.to_string(),
        })?;

        let root = doc.root_element().tag_name().name();
        if root != "TEI" {
            return Err(Pdf2OdtError::ParseError {
                path: origin.as_ref().to_path_buf(),
                detail: format!("root element is <{root}>, expected <TEI>"),
            });
        }
        Ok(Self { doc })
    }

    /// Main title from `titleStmt/title[@type='main']` (or the first title).
    pub fn title(&self) -> Option<String> {
        let stmt = find_desc(self.header()?, "titleStmt")?;
        let titles: Vec<Node> = element_children(stmt, "title").collect();
        let main = titles
            .iter()
            .find(|t| t.attribute("type") == Some("main"))
            .or_else(|| titles.first())?;
        non_empty(normalize(&text_of(*main)))
    }

    /// Author names from the source description, `forename* surname`.
    pub fn authors(&self) -> Vec<String> {
        let Some(source) = self.header().and_then(|h| find_desc(h, "sourceDesc")) else {
            return Vec::new();
        };
        source
            .descendants()
            .filter(|n| is(*n, "author"))
            .filter_map(|a| element_children(a, "persName").next())
            .filter_map(person_name)
            .collect()
    }

    /// A fresh, lazy pass over the document's content in order.
    pub fn nodes(&self) -> Nodes<'_, 'input> {
        Nodes {
            root: self.doc.root_element(),
            doc: self,
            phase: Phase::FrontMatter,
            pending: VecDeque::new(),
            stack: Vec::new(),
            references: Vec::new().into_iter(),
            position: 0,
        }
    }

    fn header(&self) -> Option<Node<'_, 'input>> {
        element_children(self.doc.root_element(), "teiHeader").next()
    }

    fn abstract_nodes(&self) -> Vec<ContentNode> {
        let Some(abs) = self
            .header()
            .and_then(|h| find_desc(h, "profileDesc"))
            .and_then(|p| find_desc(p, "abstract"))
        else {
            return Vec::new();
        };

        let mut out: Vec<ContentNode> = if abs.descendants().any(|n| is(n, "p")) {
            abs.descendants()
                .filter_map(|n| {
                    if is(n, "p") {
                        paragraph_runs(n).map(ContentNode::Abstract)
                    } else if is(n, "head") {
                        non_empty(normalize(&text_of(n))).map(ContentNode::SectionLabel)
                    } else {
                        None
                    }
                })
                .collect()
        } else {
            paragraph_runs(abs).map(ContentNode::Abstract).into_iter().collect()
        };
        if !out.is_empty() {
            out.insert(0, ContentNode::SectionLabel("Abstract".to_string()));
        }
        out
    }
}

// ── Iterator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    FrontMatter,
    Body,
    References,
    Done,
}

/// One open container in the body walk.
struct Frame<'a, 'input> {
    children: Children<'a, 'input>,
    /// Number of `div`s enclosing these children.
    depth: u8,
}

/// Lazy iterator over a [`TeiDocument`]'s content nodes.
pub struct Nodes<'a, 'input> {
    root: Node<'a, 'input>,
    doc: &'a TeiDocument<'input>,
    phase: Phase,
    pending: VecDeque<ContentNode>,
    stack: Vec<Frame<'a, 'input>>,
    references: std::vec::IntoIter<Node<'a, 'input>>,
    position: usize,
}

impl<'a, 'input> Iterator for Nodes<'a, 'input> {
    type Item = ContentNode;

    fn next(&mut self) -> Option<ContentNode> {
        loop {
            if let Some(node) = self.pending.pop_front() {
                return Some(node);
            }
            match self.phase {
                Phase::FrontMatter => {
                    if let Some(title) = self.doc.title() {
                        self.pending.push_back(ContentNode::Title(title));
                    }
                    let authors = self.doc.authors();
                    if !authors.is_empty() {
                        self.pending.push_back(ContentNode::Authors(authors));
                    }
                    self.pending.extend(self.doc.abstract_nodes());
                    if let Some(body) = text_part(self.root, "body") {
                        self.stack.push(Frame {
                            children: body.children(),
                            depth: 0,
                        });
                    }
                    self.phase = Phase::Body;
                }
                Phase::Body => match self.next_body_node() {
                    Some(node) => return Some(node),
                    None => {
                        let refs = bibliography(self.root);
                        if !refs.is_empty() {
                            self.pending
                                .push_back(ContentNode::SectionLabel("References".to_string()));
                        }
                        self.references = refs.into_iter();
                        self.phase = Phase::References;
                    }
                },
                Phase::References => match self.references.next() {
                    Some(bibl) => {
                        self.position += 1;
                        return Some(ContentNode::Reference(parse_citation(bibl, self.position)));
                    }
                    None => self.phase = Phase::Done,
                },
                Phase::Done => return None,
            }
        }
    }
}

impl<'a, 'input> Nodes<'a, 'input> {
    fn next_body_node(&mut self) -> Option<ContentNode> {
        loop {
            let frame = self.stack.last_mut()?;
            let depth = frame.depth;
            let Some(child) = frame.children.next() else {
                self.stack.pop();
                continue;
            };
            if !child.is_element() {
                continue;
            }
            match classify(child, depth) {
                Step::Descend => self.stack.push(Frame {
                    children: child.children(),
                    depth: depth.saturating_add(1),
                }),
                Step::Emit(node) => return Some(node),
                Step::Skip => {}
            }
        }
    }
}

// ── Classification ───────────────────────────────────────────────────────

/// The closed set of body elements the walker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Division,
    Heading,
    Paragraph,
    List,
    Table,
    TableFigure,
    Other,
}

impl ElementKind {
    pub fn of(node: Node) -> Self {
        match node.tag_name().name() {
            "div" => ElementKind::Division,
            "head" => ElementKind::Heading,
            "p" | "ab" => ElementKind::Paragraph,
            "list" => ElementKind::List,
            "table" => ElementKind::Table,
            "figure" if node.attribute("type") == Some("table") => ElementKind::TableFigure,
            _ => ElementKind::Other,
        }
    }
}

enum Step {
    Descend,
    Emit(ContentNode),
    Skip,
}

/// Map one body element at `depth` (number of enclosing divs) to a step.
fn classify(node: Node, depth: u8) -> Step {
    let emitted = match ElementKind::of(node) {
        ElementKind::Division => return Step::Descend,
        ElementKind::Heading => heading(node, depth),
        ElementKind::Paragraph => paragraph_runs(node).map(ContentNode::Paragraph),
        ElementKind::List => parse_list(node).map(ContentNode::List).or_else(|| degrade(node)),
        ElementKind::Table => parse_table(node, None)
            .map(ContentNode::Table)
            .or_else(|| degrade(node)),
        ElementKind::TableFigure => element_children(node, "table")
            .next()
            .and_then(|t| parse_table(t, figure_caption(node)))
            .map(ContentNode::Table)
            .or_else(|| {
                figure_caption(node).map(|c| ContentNode::Paragraph(vec![Run::Text(c)]))
            })
            .or_else(|| degrade(node)),
        ElementKind::Other => degrade(node),
    };
    match emitted {
        Some(n) => Step::Emit(n),
        None => Step::Skip,
    }
}

/// Lossy fallback: the element's text as a plain paragraph.
fn degrade(node: Node) -> Option<ContentNode> {
    non_empty(normalize(&text_of(node))).map(|t| ContentNode::Paragraph(vec![Run::Text(t)]))
}

fn heading(node: Node, depth: u8) -> Option<ContentNode> {
    let text = non_empty(normalize(&text_of(node)))?;
    let number = node
        .attribute("n")
        .map(|n| n.trim().trim_end_matches('.').to_string())
        .filter(|n| !n.is_empty());
    let level = heading_level(depth, number.as_deref());
    Some(ContentNode::Heading {
        level,
        number,
        text,
    })
}

/// Div depth, deepened by a dotted section number: GROBID usually emits flat
/// divs, so `n="2.1"` is the only trace of nesting.
pub fn heading_level(depth: u8, number: Option<&str>) -> u8 {
    let from_number = number
        .map(|n| n.split('.').filter(|s| !s.trim().is_empty()).count())
        .unwrap_or(0)
        .min(MAX_HEADING_LEVEL as usize) as u8;
    depth.max(from_number).clamp(1, MAX_HEADING_LEVEL)
}

// ── Inline runs ──────────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn normalize(s: &str) -> String {
    RE_WHITESPACE.replace_all(s, " ").trim().to_string()
}

fn collapse(s: &str) -> String {
    RE_WHITESPACE.replace_all(s, " ").into_owned()
}

/// Runs of a paragraph-like element, `None` when it has no visible text.
fn paragraph_runs(node: Node) -> Option<Vec<Run>> {
    let mut runs = Vec::new();
    collect_runs(node, &mut runs, false);
    finish_runs(runs)
}

fn collect_runs(node: Node, runs: &mut Vec<Run>, skip_lists: bool) {
    for child in node.children() {
        if child.is_text() {
            push_text(runs, child.text().unwrap_or_default());
            continue;
        }
        if !child.is_element() {
            continue;
        }
        let name = child.tag_name().name();
        match (name, child.attribute("type")) {
            ("ref", Some("bibr")) => {
                let text = normalize(&text_of(child));
                let target = child
                    .attribute("target")
                    .unwrap_or_default()
                    .trim()
                    .trim_start_matches('#');
                if target.is_empty() {
                    push_text(runs, &text);
                } else {
                    runs.push(Run::Citation {
                        text,
                        target: target.to_string(),
                    });
                }
            }
            ("ref", Some("url")) => {
                let text = normalize(&text_of(child));
                let href = child
                    .attribute("target")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| text.clone());
                runs.push(Run::Link { text, href });
            }
            ("lb", _) => push_text(runs, " "),
            ("list", _) if skip_lists => {}
            _ => collect_runs(child, runs, skip_lists),
        }
    }
}

fn push_text(runs: &mut Vec<Run>, text: &str) {
    if let Some(Run::Text(last)) = runs.last_mut() {
        last.push_str(text);
    } else {
        runs.push(Run::Text(text.to_string()));
    }
}

/// Collapse whitespace, trim the paragraph edges and drop empty runs.
fn finish_runs(runs: Vec<Run>) -> Option<Vec<Run>> {
    let mut runs: Vec<Run> = runs
        .into_iter()
        .map(|r| match r {
            Run::Text(t) => Run::Text(collapse(&t)),
            other => other,
        })
        .collect();

    if let Some(Run::Text(first)) = runs.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(Run::Text(last)) = runs.last_mut() {
        *last = last.trim_end().to_string();
    }
    runs.retain(|r| !r.text().is_empty());

    if runs.iter().all(|r| r.text().trim().is_empty()) {
        None
    } else {
        Some(runs)
    }
}

// ── Lists ────────────────────────────────────────────────────────────────

fn parse_list(node: Node) -> Option<List> {
    let items: Vec<ListItem> = element_children(node, "item")
        .map(|item| {
            let mut runs = Vec::new();
            collect_runs(item, &mut runs, true);
            ListItem {
                runs: finish_runs(runs).unwrap_or_default(),
                sublists: element_children(item, "list").filter_map(parse_list).collect(),
            }
        })
        .filter(|i| !i.runs.is_empty() || !i.sublists.is_empty())
        .collect();

    if items.is_empty() {
        return None;
    }
    Some(List {
        ordered: is_ordered(node),
        head: own_head(node),
        items,
    })
}

fn is_ordered(node: Node) -> bool {
    ["rend", "type"].iter().any(|attr| {
        node.attribute(*attr).is_some_and(|v| {
            let v = v.to_ascii_lowercase();
            ["numbered", "ordered", "decimal", "arabic"]
                .iter()
                .any(|k| v.contains(k))
        })
    })
}

// ── Tables ───────────────────────────────────────────────────────────────

fn parse_table(table: Node, caption: Option<String>) -> Option<Table> {
    let caption = caption.or_else(|| own_head(table));
    let mut rows: Vec<Vec<Cell>> = table
        .descendants()
        .filter(|n| is(*n, "row"))
        .map(|row| {
            element_children(row, "cell")
                .map(|cell| Cell {
                    text: normalize(&text_of(cell)),
                    span: cell
                        .attribute("cols")
                        .and_then(|c| c.trim().parse::<usize>().ok())
                        .unwrap_or(1)
                        .max(1),
                })
                .collect()
        })
        .collect();

    let width = rows
        .iter()
        .map(|r| r.iter().map(|c| c.span).sum::<usize>())
        .max()
        .unwrap_or(0);
    if width == 0 {
        return None;
    }
    for row in &mut rows {
        let used: usize = row.iter().map(|c| c.span).sum();
        row.extend((used..width).map(|_| Cell {
            text: String::new(),
            span: 1,
        }));
    }
    Some(Table { caption, rows })
}

/// Joined text of the `head` children of a list or table.
fn own_head(node: Node) -> Option<String> {
    let heads: Vec<String> = element_children(node, "head")
        .filter_map(|h| non_empty(normalize(&text_of(h))))
        .collect();
    non_empty(heads.join(" "))
}

/// `head` and `figDesc` of a table figure, e.g. `"Table 1: Results"`.
fn figure_caption(figure: Node) -> Option<String> {
    let parts: Vec<String> = ["head", "figDesc"]
        .into_iter()
        .filter_map(|name| element_children(figure, name).next())
        .filter_map(|n| {
            let text = normalize(&text_of(n));
            // GROBID often leaves the separator on the label: "Table 1 :"
            non_empty(text.trim_end_matches([':', ' ']).to_string())
        })
        .collect();
    non_empty(parts.join(": "))
}

// ── Bibliography ─────────────────────────────────────────────────────────

/// Top-level `biblStruct`s of `back//listBibl`, in order.
fn bibliography<'a, 'input>(root: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let Some(back) = text_part(root, "back") else {
        return Vec::new();
    };
    back.descendants()
        .filter(|n| is(*n, "biblStruct"))
        .filter(|b| {
            b.ancestors().any(|a| is(a, "listBibl"))
                && !b.ancestors().skip(1).any(|a| is(a, "biblStruct"))
        })
        .collect()
}

fn parse_citation(bibl: Node, position: usize) -> Citation {
    let id = bibl
        .attribute((XML_NS, "id"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("ref_{position}"));
    let analytic = element_children(bibl, "analytic").next();
    let monogr = element_children(bibl, "monogr").next();

    let names = |part: Option<Node>| -> Vec<String> {
        part.map(|p| {
            element_children(p, "author")
                .filter_map(|a| element_children(a, "persName").next())
                .filter_map(person_name)
                .collect()
        })
        .unwrap_or_default()
    };
    let mut authors = names(analytic);
    if authors.is_empty() {
        authors = names(monogr);
    }

    let article_title = analytic.and_then(first_title);
    let monogr_title = monogr.and_then(first_title);
    let (title, venue) = match article_title {
        Some(t) => (Some(t), monogr_title),
        None => (monogr_title, None),
    };

    let imprint = monogr.and_then(|m| element_children(m, "imprint").next());
    let scope = |unit: &str| -> Option<String> {
        let s = imprint?
            .children()
            .find(|n| is(*n, "biblScope") && n.attribute("unit") == Some(unit))?;
        match (s.attribute("from"), s.attribute("to")) {
            (Some(from), Some(to)) => Some(format!("{from}–{to}")),
            (Some(from), None) => Some(from.to_string()),
            _ => non_empty(normalize(&text_of(s))),
        }
    };
    let year = imprint
        .and_then(|i| element_children(i, "date").next())
        .and_then(|d| {
            d.attribute("when")
                .map(|w| w.chars().take(4).collect::<String>())
                .filter(|y| y.len() == 4 && y.chars().all(|c| c.is_ascii_digit()))
                .or_else(|| non_empty(normalize(&text_of(d))))
        });
    let doi = bibl
        .descendants()
        .find(|n| {
            is(*n, "idno")
                && n.attribute("type")
                    .is_some_and(|t| t.eq_ignore_ascii_case("doi"))
        })
        .and_then(|n| non_empty(normalize(&text_of(n))));

    let raw = bibl
        .descendants()
        .find(|n| is(*n, "note") && n.attribute("type") == Some("raw_reference"))
        .and_then(|n| non_empty(normalize(&text_of(n))))
        .unwrap_or_else(|| normalize(&spaced_text_of(bibl)));

    Citation {
        id,
        authors,
        title,
        venue,
        volume: scope("volume"),
        pages: scope("page"),
        year,
        doi,
        raw,
    }
}

fn first_title(part: Node) -> Option<String> {
    element_children(part, "title").find_map(|t| non_empty(normalize(&text_of(t))))
}

fn person_name(pers: Node) -> Option<String> {
    let mut parts: Vec<String> = element_children(pers, "forename")
        .filter_map(|f| non_empty(normalize(&text_of(f))))
        .collect();
    if let Some(surname) = element_children(pers, "surname")
        .next()
        .and_then(|s| non_empty(normalize(&text_of(s))))
    {
        parts.push(surname);
    }
    non_empty(parts.join(" "))
}

// ── Tree helpers ─────────────────────────────────────────────────────────

fn is(node: Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn element_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| is(*n, name))
}

fn find_desc<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants().find(|n| is(*n, name))
}

/// `text/body` or `text/back` under the TEI root.
fn text_part<'a, 'input>(root: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    root.children()
        .filter(|n| is(*n, "text"))
        .find_map(|text| text.children().find(|n| is(*n, name)))
}

fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Like [`text_of`] but with a space between text nodes, so structured
/// fields (`<surname>Smith</surname><forename>J</forename>`) stay apart.
fn spaced_text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc>
      <titleStmt><title level="a" type="main">Attention Is All You Need</title></titleStmt>
      <sourceDesc><biblStruct><analytic>
        <author><persName><forename type="first">Ashish</forename><surname>Vaswani</surname></persName></author>
        <author><persName><forename type="first">Noam</forename><surname>Shazeer</surname></persName></author>
        <author><orgName>Google</orgName></author>
      </analytic></biblStruct></sourceDesc>
    </fileDesc>
    <profileDesc><abstract><div><p>The dominant   sequence
      models are recurrent.</p></div></abstract></profileDesc>
  </teiHeader>
  <text>
    <body>
      <div><head n="1">Introduction</head>
        <p>Recurrent networks <ref type="bibr" target="#b0">[1]</ref> are slow.</p>
      </div>
      <div><head n="3.1">Encoder</head>
        <p>See <ref type="url" target="https://example.org">the code</ref>.</p>
        <formula>y = f(x)</formula>
        <figure type="table"><head>Table 1</head><figDesc>BLEU scores</figDesc>
          <table><row><cell>Model</cell><cell>BLEU</cell></row><row><cell>Ours</cell></row></table>
        </figure>
      </div>
    </body>
    <back>
      <div type="references"><listBibl>
        <biblStruct xml:id="b0">
          <analytic><title level="a" type="main">Long short-term memory</title>
            <author><persName><forename>Sepp</forename><surname>Hochreiter</surname></persName></author>
          </analytic>
          <monogr><title level="j">Neural Computation</title>
            <imprint><biblScope unit="volume">9</biblScope><biblScope unit="page" from="1735" to="1780"/><date type="published" when="1997-11-15"/></imprint>
          </monogr>
        </biblStruct>
        <biblStruct><monogr><title>Untitled notes</title></monogr><note type="raw_reference">Some notes, 2001</note></biblStruct>
      </listBibl></div>
    </back>
  </text>
</TEI>"##;

    fn nodes(xml: &str) -> Vec<ContentNode> {
        TeiDocument::parse(xml, "test.tei.xml").unwrap().nodes().collect()
    }

    fn kinds(xml: &str) -> Vec<NodeKind> {
        nodes(xml).iter().map(ContentNode::kind).collect()
    }

    fn tei_body(body: &str) -> String {
        format!(r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><text><body>{body}</body></text></TEI>"#)
    }

    #[test]
    fn document_order_is_front_body_back() {
        assert_eq!(
            kinds(SAMPLE),
            vec![
                NodeKind::Title,
                NodeKind::Authors,
                NodeKind::SectionLabel,
                NodeKind::Abstract,
                NodeKind::Heading,
                NodeKind::Paragraph,
                NodeKind::Heading,
                NodeKind::Paragraph,
                NodeKind::Paragraph,
                NodeKind::Table,
                NodeKind::SectionLabel,
                NodeKind::Reference,
                NodeKind::Reference,
            ]
        );
    }

    #[test]
    fn front_matter_fields() {
        let doc = TeiDocument::parse(SAMPLE, "t").unwrap();
        assert_eq!(doc.title().as_deref(), Some("Attention Is All You Need"));
        assert_eq!(doc.authors(), vec!["Ashish Vaswani", "Noam Shazeer"]);

        let all = nodes(SAMPLE);
        assert_eq!(
            all[3],
            ContentNode::Abstract(vec![Run::Text(
                "The dominant sequence models are recurrent.".into()
            )])
        );
    }

    #[test]
    fn citations_become_runs() {
        let all = nodes(SAMPLE);
        assert_eq!(
            all[5],
            ContentNode::Paragraph(vec![
                Run::Text("Recurrent networks ".into()),
                Run::Citation {
                    text: "[1]".into(),
                    target: "b0".into()
                },
                Run::Text(" are slow.".into()),
            ])
        );
        assert_eq!(
            all[7],
            ContentNode::Paragraph(vec![
                Run::Text("See ".into()),
                Run::Link {
                    text: "the code".into(),
                    href: "https://example.org".into()
                },
                Run::Text(".".into()),
            ])
        );
    }

    #[test]
    fn heading_level_follows_section_number() {
        let all = nodes(SAMPLE);
        assert_eq!(
            all[4],
            ContentNode::Heading {
                level: 1,
                number: Some("1".into()),
                text: "Introduction".into()
            }
        );
        assert_eq!(all[6].level(), 2);
    }

    #[test]
    fn heading_level_follows_div_nesting() {
        let xml = tei_body(
            "<div><head>A</head><div><head>B</head><div><head>C</head></div></div></div><head>Loose</head>",
        );
        let levels: Vec<u8> = nodes(&xml).iter().map(ContentNode::level).collect();
        assert_eq!(levels, vec![1, 2, 3, 1]);
    }

    #[test]
    fn heading_level_is_clamped() {
        assert_eq!(heading_level(0, None), 1);
        assert_eq!(heading_level(9, None), MAX_HEADING_LEVEL);
        assert_eq!(heading_level(1, Some("1.2.3.4.5.6.7.8")), MAX_HEADING_LEVEL);
        assert_eq!(heading_level(1, Some("2.")), 1);
        assert_eq!(heading_level(3, Some("2")), 3);
    }

    #[test]
    fn table_figure_is_padded_and_captioned() {
        let table = nodes(SAMPLE)
            .into_iter()
            .find_map(|n| match n {
                ContentNode::Table(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(table.caption.as_deref(), Some("Table 1: BLEU scores"));
        assert_eq!(table.columns(), 2);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][0].text, "Ours");
        assert_eq!(table.rows[1][1].text, "");
    }

    #[test]
    fn column_spans_count_toward_width() {
        let xml = tei_body(
            r#"<table><row><cell cols="2">Wide</cell></row><row><cell>a</cell><cell>b</cell><cell>c</cell></row></table>"#,
        );
        let ContentNode::Table(t) = &nodes(&xml)[0] else {
            panic!("expected table");
        };
        assert_eq!(t.columns(), 3);
        assert_eq!(t.rows[0].len(), 2, "span 2 + one padding cell");
        assert_eq!(t.rows[0][0].span, 2);
    }

    #[test]
    fn table_figure_without_table_degrades() {
        let xml = tei_body(r#"<figure type="table"><head>Table 2</head><figDesc>Lost grid</figDesc></figure>"#);
        assert_eq!(
            nodes(&xml),
            vec![ContentNode::Paragraph(vec![Run::Text("Table 2: Lost grid".into())])]
        );
    }

    #[test]
    fn unknown_elements_degrade_to_paragraphs() {
        let xml = tei_body("<div><formula>E = mc<hi>2</hi></formula><item>stray</item><note/></div>");
        assert_eq!(
            nodes(&xml),
            vec![
                ContentNode::Paragraph(vec![Run::Text("E = mc2".into())]),
                ContentNode::Paragraph(vec![Run::Text("stray".into())]),
            ]
        );
    }

    #[test]
    fn blank_paragraphs_are_dropped() {
        let xml = tei_body("<p>   </p><p>kept</p>");
        assert_eq!(kinds(&xml), vec![NodeKind::Paragraph]);
    }

    #[test]
    fn nested_lists() {
        let xml = tei_body(
            r#"<list rend="numbered"><item>one</item><item>two<list><item>two-a</item></list></item></list><list><item>dot</item></list>"#,
        );
        let all = nodes(&xml);
        assert_eq!(all[0].kind(), NodeKind::NumberedList);
        assert_eq!(all[1].kind(), NodeKind::BulletList);
        let ContentNode::List(list) = &all[0] else {
            panic!("expected list");
        };
        assert_eq!(list.items.len(), 2);
        assert_eq!(plain_text(&list.items[1].runs), "two");
        assert_eq!(plain_text(&list.items[1].sublists[0].items[0].runs), "two-a");
        assert!(!list.items[1].sublists[0].ordered);
    }

    #[test]
    fn list_head_is_kept() {
        let xml = tei_body("<list><head>Contributions</head><item>one</item><item>two<list><head>Details</head><item>a</item></list></item></list>");
        let all = nodes(&xml);
        assert_eq!(all.len(), 1);
        let ContentNode::List(list) = &all[0] else {
            panic!("expected list");
        };
        assert_eq!(list.head.as_deref(), Some("Contributions"));
        assert_eq!(plain_text(&list.items[0].runs), "one");
        assert_eq!(list.items[1].sublists[0].head.as_deref(), Some("Details"));
    }

    #[test]
    fn table_head_becomes_caption() {
        let xml = tei_body("<table><head>Table 3 accuracy</head><row><cell>a</cell></row></table>");
        let ContentNode::Table(table) = &nodes(&xml)[0] else {
            panic!("expected table");
        };
        assert_eq!(table.caption.as_deref(), Some("Table 3 accuracy"));
        assert_eq!(table.rows, vec![vec![Cell { text: "a".into(), span: 1 }]]);
    }

    #[test]
    fn figure_caption_wins_over_table_head() {
        let xml = tei_body(r#"<figure type="table"><head>Table 4</head><table><head>inner</head><row><cell>x</cell></row></table></figure>"#);
        let ContentNode::Table(table) = &nodes(&xml)[0] else {
            panic!("expected table");
        };
        assert_eq!(table.caption.as_deref(), Some("Table 4"));
    }

    #[test]
    fn abstract_heads_become_labels() {
        let xml = r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><teiHeader><profileDesc><abstract>
            <div><head>Background</head><p>Why.</p></div>
            <div><head>Results</head><p>What.</p></div>
        </abstract></profileDesc></teiHeader><text><body/></text></TEI>"#;
        assert_eq!(
            nodes(xml),
            vec![
                ContentNode::SectionLabel("Abstract".into()),
                ContentNode::SectionLabel("Background".into()),
                ContentNode::Abstract(vec![Run::Text("Why.".into())]),
                ContentNode::SectionLabel("Results".into()),
                ContentNode::Abstract(vec![Run::Text("What.".into())]),
            ]
        );
    }

    #[test]
    fn empty_list_degrades() {
        let xml = tei_body("<list><head>Nothing here</head></list>");
        assert_eq!(kinds(&xml), vec![NodeKind::Paragraph]);
    }

    #[test]
    fn references_are_normalised() {
        let refs: Vec<Citation> = nodes(SAMPLE)
            .into_iter()
            .filter_map(|n| match n {
                ContentNode::Reference(c) => Some(c),
                _ => None,
            })
            .collect();

        let first = &refs[0];
        assert_eq!(first.id, "b0");
        assert_eq!(first.authors, vec!["Sepp Hochreiter"]);
        assert_eq!(first.title.as_deref(), Some("Long short-term memory"));
        assert_eq!(first.venue.as_deref(), Some("Neural Computation"));
        assert_eq!(first.volume.as_deref(), Some("9"));
        assert_eq!(first.pages.as_deref(), Some("1735–1780"));
        assert_eq!(first.year.as_deref(), Some("1997"));
        assert_eq!(
            first.formatted(),
            "Sepp Hochreiter (1997). Long short-term memory. Neural Computation, 9, 1735–1780."
        );

        let second = &refs[1];
        assert_eq!(second.id, "ref_2");
        assert_eq!(second.raw, "Some notes, 2001");
        assert_eq!(second.formatted(), "Untitled notes.");
    }

    #[test]
    fn citation_without_fields_uses_raw_text() {
        let c = Citation {
            raw: "J. Doe. A paper. 2020".into(),
            ..Default::default()
        };
        assert_eq!(c.formatted(), "J. Doe. A paper. 2020");
    }

    #[test]
    fn author_lists_are_joined() {
        assert_eq!(join_names(&["A".into()]), "A");
        assert_eq!(join_names(&["A".into(), "B".into()]), "A and B");
        assert_eq!(join_names(&["A".into(), "B".into(), "C".into()]), "A, B and C");
    }

    #[test]
    fn walk_is_restartable() {
        let doc = TeiDocument::parse(SAMPLE, "t").unwrap();
        let first: Vec<_> = doc.nodes().collect();
        let second: Vec<_> = doc.nodes().collect();
        assert_eq!(first, second);
        assert_eq!(doc.nodes().take(2).count(), 2);
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = TeiDocument::parse("<TEI><text>", "broken.tei.xml")
            .err()
            .unwrap();
        match err {
            Pdf2OdtError::ParseError { path, .. } => {
                assert_eq!(path, Path::new("broken.tei.xml"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_tei_root_is_a_parse_error() {
        let err = TeiDocument::parse("<html><body/></html>", "x").err().unwrap();
        assert!(err.to_string().contains("expected <TEI>"), "got: {err}");
    }

    #[test]
    fn document_without_body_yields_front_matter_only() {
        let xml = r#"<TEI><teiHeader><fileDesc><titleStmt><title>Only a title</title></titleStmt></fileDesc></teiHeader></TEI>"#;
        assert_eq!(
            nodes(xml),
            vec![ContentNode::Title("Only a title".into())]
        );
    }
}
