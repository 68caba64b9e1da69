use crate::html::{FragmentPiece, RunKind, fragment_pieces};
use crate::stylesheet::{LineHeightSpec, StylesheetMetrics};
use crate::types::Pt;
use folio_page_contract::TableSpec;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextRole {
    HeaderTitle,
    HeaderSubtitle,
    Intro,
    Body,
    SectionTitle,
    SectionSubtitle,
    Refs,
    Notes,
    TableCell,
}

impl TextRole {
    pub fn css_class(self) -> &'static str {
        match self {
            TextRole::HeaderTitle => "header-title",
            TextRole::HeaderSubtitle => "header-subtitle",
            TextRole::Intro => "intro",
            TextRole::Body => "content",
            TextRole::SectionTitle => "section-title",
            TextRole::SectionSubtitle => "section-subtitle",
            TextRole::Refs => "refs-text",
            TextRole::Notes => "footer-notes",
            TextRole::TableCell => "col-dep",
        }
    }

    fn from_run(kind: RunKind) -> TextRole {
        match kind {
            RunKind::Body => TextRole::Body,
            RunKind::SectionTitle => TextRole::SectionTitle,
            RunKind::SectionSubtitle => TextRole::SectionSubtitle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub font_size: Pt,
    pub line_height: f32,
    pub advance_em: f32,
    pub margin_bottom: Pt,
}

impl TextMetrics {
    fn new(font_size: f32, line_height: f32, advance_em: f32, margin_bottom: f32) -> Self {
        Self {
            font_size: Pt::from_f32(font_size),
            line_height,
            advance_em,
            margin_bottom: Pt::from_f32(margin_bottom),
        }
    }

    pub fn line_advance(&self) -> Pt {
        self.font_size * self.line_height
    }

    pub fn chars_per_line(&self, width: Pt) -> usize {
        let glyph = self.font_size.to_f64() * self.advance_em as f64;
        if glyph <= 0.0 {
            return 1;
        }
        // Tolerate f32 rounding of the advance so 444 / 5.55 stays 80.
        ((width.to_f64() / glyph + 1e-4).floor() as usize).max(1)
    }

    pub fn wrapped_lines(&self, text: &str, width: Pt) -> usize {
        let chars = text.chars().count();
        chars.div_ceil(self.chars_per_line(width)).max(1)
    }
}

const BODY_ADVANCE_EM: f32 = 0.4625;

#[derive(Debug, Clone)]
pub struct Typography {
    pub header_title: TextMetrics,
    pub header_subtitle: TextMetrics,
    pub intro: TextMetrics,
    pub body: TextMetrics,
    pub section_title: TextMetrics,
    pub section_subtitle: TextMetrics,
    pub refs: TextMetrics,
    pub notes: TextMetrics,
    pub table_cell: TextMetrics,
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            header_title: TextMetrics::new(14.0, 1.05, 0.70, 0.0),
            header_subtitle: TextMetrics::new(14.0, 1.05, 0.70, 0.0),
            intro: TextMetrics::new(12.0, 1.1, 0.53, 0.0),
            body: TextMetrics::new(12.0, 1.1, BODY_ADVANCE_EM, 4.0),
            section_title: TextMetrics::new(13.0, 1.2, 0.60, 6.0),
            section_subtitle: TextMetrics::new(11.0, 1.2, 0.50, 4.0),
            refs: TextMetrics::new(8.0, 1.1, BODY_ADVANCE_EM, 0.0),
            notes: TextMetrics::new(8.0, 1.1, BODY_ADVANCE_EM, 0.0),
            table_cell: TextMetrics::new(8.0, 1.1, BODY_ADVANCE_EM, 0.0),
        }
    }
}

impl Typography {
    pub fn get(&self, role: TextRole) -> &TextMetrics {
        match role {
            TextRole::HeaderTitle => &self.header_title,
            TextRole::HeaderSubtitle => &self.header_subtitle,
            TextRole::Intro => &self.intro,
            TextRole::Body => &self.body,
            TextRole::SectionTitle => &self.section_title,
            TextRole::SectionSubtitle => &self.section_subtitle,
            TextRole::Refs => &self.refs,
            TextRole::Notes => &self.notes,
            TextRole::TableCell => &self.table_cell,
        }
    }

    fn get_mut(&mut self, role: TextRole) -> &mut TextMetrics {
        match role {
            TextRole::HeaderTitle => &mut self.header_title,
            TextRole::HeaderSubtitle => &mut self.header_subtitle,
            TextRole::Intro => &mut self.intro,
            TextRole::Body => &mut self.body,
            TextRole::SectionTitle => &mut self.section_title,
            TextRole::SectionSubtitle => &mut self.section_subtitle,
            TextRole::Refs => &mut self.refs,
            TextRole::Notes => &mut self.notes,
            TextRole::TableCell => &mut self.table_cell,
        }
    }

    pub fn apply_stylesheet(&mut self, sheet: &StylesheetMetrics) {
        const ROLES: [TextRole; 8] = [
            TextRole::HeaderTitle,
            TextRole::HeaderSubtitle,
            TextRole::Intro,
            TextRole::Body,
            TextRole::SectionTitle,
            TextRole::SectionSubtitle,
            TextRole::Refs,
            TextRole::Notes,
        ];
        for role in ROLES {
            let Some(declared) = sheet.get(role) else {
                continue;
            };
            let metrics = self.get_mut(role);
            if let Some(size) = declared.font_size.filter(|size| size.is_positive()) {
                metrics.font_size = size;
            }
            match declared.line_height {
                Some(LineHeightSpec::Multiplier(factor)) if factor > 0.0 => {
                    metrics.line_height = factor;
                }
                Some(LineHeightSpec::Absolute(height)) if metrics.font_size.is_positive() => {
                    metrics.line_height = height.to_f32() / metrics.font_size.to_f32();
                }
                _ => {}
            }
            if let Some(margin) = declared.margin_bottom {
                metrics.margin_bottom = margin.max(Pt::ZERO);
            }
        }
    }

    pub fn apply_font_advance(&mut self, average_em: f32) {
        if !(average_em.is_finite() && average_em > 0.0) {
            return;
        }
        let scale = average_em / BODY_ADVANCE_EM;
        for metrics in [
            &mut self.header_title,
            &mut self.header_subtitle,
            &mut self.intro,
            &mut self.body,
            &mut self.section_title,
            &mut self.section_subtitle,
            &mut self.refs,
            &mut self.notes,
            &mut self.table_cell,
        ] {
            metrics.advance_em *= scale;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Estimator {
    pub typography: Typography,
    pub html_padding: Pt,
    pub figure_height: Pt,
    pub table_header_height: Pt,
    pub table_row_height: Pt,
    pub table_margin: Pt,
    pub refs_rule_height: Pt,
    pub contact_height: Pt,
    pub page_stamp_height: Pt,
    base_dir: Option<PathBuf>,
}

impl Default for Estimator {
    fn default() -> Self {
        Self {
            typography: Typography::default(),
            html_padding: Pt::from_i32(6),
            figure_height: Pt::from_i32(180),
            table_header_height: Pt::from_i32(40),
            table_row_height: Pt::from_i32(16),
            table_margin: Pt::from_i32(16),
            refs_rule_height: Pt::from_i32(6),
            contact_height: Pt::from_i32(22),
            page_stamp_height: Pt::from_i32(8),
            base_dir: None,
        }
    }
}

impl Estimator {
    pub fn with_base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn text_height(&self, text: &str, role: TextRole, width: Pt) -> Pt {
        let metrics = self.typography.get(role);
        metrics.line_advance() * metrics.wrapped_lines(text, width) as i32
    }

    pub fn html_height(&self, html: &str, width: Pt) -> Pt {
        let mut height = self.html_padding;
        for piece in fragment_pieces(html) {
            match piece {
                FragmentPiece::Text { kind, text } => {
                    height += self.text_height(&text, TextRole::from_run(kind), width);
                }
                FragmentPiece::BlockEnd { kind } => {
                    height += self.typography.get(TextRole::from_run(kind)).margin_bottom;
                }
                FragmentPiece::Image { src } => {
                    height += self.image_height(&src, width);
                }
            }
        }
        height
    }

    fn image_height(&self, src: &str, width: Pt) -> Pt {
        let Some(path) = self.resolve_asset(src) else {
            return self.figure_height;
        };
        let Ok((px_width, px_height)) = image::image_dimensions(&path) else {
            return self.figure_height;
        };
        if px_width == 0 {
            return self.figure_height;
        }
        let natural_width = Pt::from_css_px(px_width as f64);
        let natural_height = Pt::from_css_px(px_height as f64);
        if natural_width <= width {
            return natural_height;
        }
        natural_height * (width.to_f32() / natural_width.to_f32())
    }

    fn resolve_asset(&self, src: &str) -> Option<PathBuf> {
        let src = src.trim();
        if src.is_empty() || src.contains("://") || src.starts_with("data:") {
            return None;
        }
        let src = src.strip_prefix("file://").unwrap_or(src);
        let direct = Path::new(src);
        if direct.is_absolute() {
            return direct.is_file().then(|| direct.to_path_buf());
        }
        let joined = self.base_dir.as_ref()?.join(direct);
        joined.is_file().then_some(joined)
    }

    pub fn table_height(&self, table: &TableSpec) -> Pt {
        let cell = &self.typography.table_cell;
        let dep_width = Pt::from_f64(table.effective_dep_width()) - Pt::from_i32(4);
        let mut height = self.table_margin;
        if table.show_header {
            height += self.table_header_height;
        }
        for row in &table.rows {
            height += self.table_row_height * cell.wrapped_lines(&row.dep, dep_width) as i32;
        }
        height
    }

    pub fn footer_meta_height(&self, refs: &[String], notes: &[String], width: Pt) -> Pt {
        let mut height = Pt::ZERO;
        if !refs.is_empty() {
            height += self.refs_rule_height;
            for entry in refs {
                height += self.text_height(entry, TextRole::Refs, width);
            }
        }
        for note in notes {
            height += self.text_height(note, TextRole::Notes, width);
        }
        height
    }

    pub fn page_stamp(&self, page_number: &str) -> Pt {
        if page_number.is_empty() {
            Pt::ZERO
        } else {
            self.page_stamp_height
        }
    }
}
