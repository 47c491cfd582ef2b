//! Style lookup: `(NodeKind, level) → StyleDirective`.
//!
//! Pure and total. The emitter asks this module how a block should look and
//! also iterates [`ParagraphStyle::all`] to write `styles.xml`, so every style
//! a directive can name is guaranteed to be declared.

use super::tei::{NodeKind, MAX_HEADING_LEVEL};

/// Font family used by every paragraph style.
pub const FONT_FAMILY: &str = "Arial";

/// Named paragraph styles of the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParagraphStyle {
    Title,
    Authors,
    SectionLabel,
    Abstract,
    /// Heading of the given outline level, `1..=MAX_HEADING_LEVEL`.
    Heading(u8),
    Body,
    ListItem,
    TableCaption,
    TableCell,
    Reference,
}

/// Character and paragraph properties of a [`ParagraphStyle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleProperties {
    pub font_size_pt: f32,
    pub bold: bool,
    pub italic: bool,
    pub centered: bool,
    pub margin_top_cm: f32,
    pub margin_bottom_cm: f32,
    pub keep_with_next: bool,
}

impl ParagraphStyle {
    /// Every style, headings in level order.
    pub fn all() -> Vec<ParagraphStyle> {
        let mut styles = vec![
            ParagraphStyle::Title,
            ParagraphStyle::Authors,
            ParagraphStyle::SectionLabel,
            ParagraphStyle::Abstract,
        ];
        styles.extend((1..=MAX_HEADING_LEVEL).map(ParagraphStyle::Heading));
        styles.extend([
            ParagraphStyle::Body,
            ParagraphStyle::ListItem,
            ParagraphStyle::TableCaption,
            ParagraphStyle::TableCell,
            ParagraphStyle::Reference,
        ]);
        styles
    }

    /// `style:name`, an XML NCName.
    pub fn name(&self) -> String {
        match self {
            ParagraphStyle::Title => "Title".into(),
            ParagraphStyle::Authors => "Authors".into(),
            ParagraphStyle::SectionLabel => "Section_Label".into(),
            ParagraphStyle::Abstract => "Abstract".into(),
            ParagraphStyle::Heading(level) => format!("Heading_{}", clamp_level(*level)),
            ParagraphStyle::Body => "Text_Body".into(),
            ParagraphStyle::ListItem => "List_Item".into(),
            ParagraphStyle::TableCaption => "Table_Caption".into(),
            ParagraphStyle::TableCell => "Table_Contents".into(),
            ParagraphStyle::Reference => "Bibliography_Entry".into(),
        }
    }

    /// `style:display-name` shown in office suites.
    pub fn display_name(&self) -> String {
        self.name().replace('_', " ")
    }

    pub fn properties(&self) -> StyleProperties {
        let body = StyleProperties {
            font_size_pt: 12.0,
            bold: false,
            italic: false,
            centered: false,
            margin_top_cm: 0.0,
            margin_bottom_cm: 0.21,
            keep_with_next: false,
        };
        match self {
            ParagraphStyle::Title => StyleProperties {
                font_size_pt: 24.0,
                bold: true,
                centered: true,
                margin_bottom_cm: 0.42,
                keep_with_next: true,
                ..body
            },
            ParagraphStyle::Authors => StyleProperties {
                bold: true,
                centered: true,
                margin_bottom_cm: 0.42,
                ..body
            },
            ParagraphStyle::SectionLabel => StyleProperties {
                font_size_pt: 14.0,
                bold: true,
                margin_top_cm: 0.42,
                keep_with_next: true,
                ..body
            },
            ParagraphStyle::Abstract => StyleProperties {
                italic: true,
                ..body
            },
            ParagraphStyle::Heading(level) => StyleProperties {
                font_size_pt: heading_size(*level),
                bold: true,
                margin_top_cm: 0.42,
                keep_with_next: true,
                ..body
            },
            ParagraphStyle::Body | ParagraphStyle::ListItem => body,
            ParagraphStyle::TableCaption => StyleProperties {
                italic: true,
                margin_top_cm: 0.21,
                keep_with_next: true,
                ..body
            },
            ParagraphStyle::TableCell => StyleProperties {
                font_size_pt: 10.0,
                margin_bottom_cm: 0.0,
                ..body
            },
            ParagraphStyle::Reference => StyleProperties {
                font_size_pt: 10.0,
                margin_bottom_cm: 0.1,
                ..body
            },
        }
    }
}

/// 18pt at level 1, two points less per level, never below body size.
fn heading_size(level: u8) -> f32 {
    let level = clamp_level(level) as f32;
    (20.0 - 2.0 * level).max(12.0)
}

fn clamp_level(level: u8) -> u8 {
    level.clamp(1, MAX_HEADING_LEVEL)
}

/// How list items and references are prefixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numbering {
    None,
    Bullet,
    Decimal,
    /// `[n] `, used for bibliography entries.
    Bracketed,
}

impl Numbering {
    /// Name of the `text:list-style` the emitter declares for this scheme.
    pub fn list_style_name(&self) -> Option<&'static str> {
        match self {
            Numbering::Bullet => Some("List_Bullet"),
            Numbering::Decimal => Some("List_Numbered"),
            Numbering::None | Numbering::Bracketed => None,
        }
    }

    /// Literal prefix for the `n`th (1-based) entry of schemes rendered inline.
    pub fn prefix(&self, n: usize) -> Option<String> {
        match self {
            Numbering::Bracketed => Some(format!("[{n}] ")),
            _ => None,
        }
    }
}

/// Formatting decision for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleDirective {
    pub style: ParagraphStyle,
    /// Outline level for headings, `None` for ordinary paragraphs.
    pub outline_level: Option<u8>,
    /// List nesting depth, 0 outside lists.
    pub indent: u8,
    pub numbering: Numbering,
}

impl Default for StyleDirective {
    fn default() -> Self {
        Self {
            style: ParagraphStyle::Body,
            outline_level: None,
            indent: 0,
            numbering: Numbering::None,
        }
    }
}

/// Look up the directive for a node kind at a nesting level.
pub fn directive(kind: NodeKind, level: u8) -> StyleDirective {
    let plain = |style| StyleDirective {
        style,
        ..StyleDirective::default()
    };
    match kind {
        NodeKind::Title => plain(ParagraphStyle::Title),
        NodeKind::Authors => plain(ParagraphStyle::Authors),
        NodeKind::SectionLabel => plain(ParagraphStyle::SectionLabel),
        NodeKind::Abstract => plain(ParagraphStyle::Abstract),
        NodeKind::Heading => {
            let level = clamp_level(level);
            StyleDirective {
                style: ParagraphStyle::Heading(level),
                outline_level: Some(level),
                ..StyleDirective::default()
            }
        }
        NodeKind::BulletList | NodeKind::NumberedList => StyleDirective {
            style: ParagraphStyle::ListItem,
            indent: level.max(1),
            numbering: if kind == NodeKind::NumberedList {
                Numbering::Decimal
            } else {
                Numbering::Bullet
            },
            ..StyleDirective::default()
        },
        NodeKind::Table => plain(ParagraphStyle::TableCell),
        NodeKind::Reference => StyleDirective {
            style: ParagraphStyle::Reference,
            numbering: Numbering::Bracketed,
            ..StyleDirective::default()
        },
        NodeKind::Paragraph => StyleDirective::default(),
    }
}
