use crate::debug::DebugLogger;
use crate::estimate::{Estimator, TextRole};
use crate::layout_config::LayoutConfig;
use crate::types::Pt;
use folio_page_contract::TableSpec;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

const MEASURE_CSS: &str = "@page { size: Letter; margin: 0; }
html, body { margin: 0; padding: 0; }
.measure-root { margin: 0; padding: 0; }
.page { position: static !important; width: auto; height: auto; }
.content, .intro, .header-title, .header-subtitle, .footer-contact,
.footer-page, .footer-meta, .refs, .footer-notes { position: static !important; }
.content, .intro, .footer-meta, .footer-contact { width: {content_width}pt; }
.table-wrap { margin-left: 0 !important; }
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Html,
    Text(TextRole),
    Table { show_header: bool },
    FooterMeta,
    FooterContact,
    PageStamp,
}

impl ProbeKind {
    pub fn label(self) -> &'static str {
        match self {
            ProbeKind::Html => "html",
            ProbeKind::Text(_) => "text",
            ProbeKind::Table { .. } => "table",
            ProbeKind::FooterMeta => "footer_meta",
            ProbeKind::FooterContact => "footer_contact",
            ProbeKind::PageStamp => "page_stamp",
        }
    }

    fn key_tag(self) -> String {
        match self {
            ProbeKind::Text(role) => format!("text:{}", role.css_class()),
            ProbeKind::Table { show_header } => format!("table:{show_header}"),
            other => other.label().to_string(),
        }
    }
}

/// Complete document handed to a rendering engine. The engine renders it with
/// the theme stylesheet followed by `measure_css` and reports the border-box
/// height, margins included, of the element whose id is `probe_id`.
#[derive(Debug, Clone)]
pub struct ProbeDocument<'a> {
    pub kind: ProbeKind,
    pub html: String,
    pub theme_css: &'a str,
    pub measure_css: String,
    pub probe_id: &'static str,
    pub width: Pt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineFailure(pub String);

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EngineFailure {}

pub trait MeasureEngine {
    /// Height of the probe element in CSS pixels.
    fn measure(&mut self, probe: &ProbeDocument<'_>) -> Result<f64, EngineFailure>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasureStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub engine_fallbacks: u64,
}

pub struct Measurer {
    engine: Option<Box<dyn MeasureEngine>>,
    estimator: Estimator,
    theme_css: String,
    content_width: Pt,
    header_title_width: Pt,
    header_subtitle_width: Pt,
    cache: HashMap<[u8; 32], Pt>,
    stats: MeasureStats,
    fallbacks: BTreeMap<String, usize>,
    debug: Option<DebugLogger>,
}

impl Measurer {
    pub fn new(layout: &LayoutConfig, estimator: Estimator) -> Self {
        Self {
            engine: None,
            estimator,
            theme_css: String::new(),
            content_width: layout.content_width,
            header_title_width: layout.header_title_width,
            header_subtitle_width: layout.header_subtitle_width,
            cache: HashMap::new(),
            stats: MeasureStats::default(),
            fallbacks: BTreeMap::new(),
            debug: None,
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn MeasureEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_theme_css(mut self, css: impl Into<String>) -> Self {
        self.theme_css = css.into();
        self
    }

    pub(crate) fn with_debug(mut self, debug: Option<DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    pub fn content_width(&self) -> Pt {
        self.content_width
    }

    pub fn stats(&self) -> MeasureStats {
        self.stats
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn take_fallbacks(&mut self) -> BTreeMap<String, usize> {
        std::mem::take(&mut self.fallbacks)
    }

    pub fn measure_html(&mut self, html: &str) -> Pt {
        let body = format!("<div class=\"content\"><div id=\"probe\">{html}</div></div>");
        let width = self.content_width;
        self.measure(ProbeKind::Html, body, "probe", width, |estimator| {
            estimator.html_height(html, width)
        })
    }

    pub fn measure_text(&mut self, text: &str, role: TextRole) -> Pt {
        let width = match role {
            TextRole::HeaderTitle => self.header_title_width,
            TextRole::HeaderSubtitle => self.header_subtitle_width,
            _ => self.content_width,
        };
        let body = format!("<div id=\"probe\" class=\"{}\">{text}</div>", role.css_class());
        self.measure(ProbeKind::Text(role), body, "probe", width, |estimator| {
            estimator.text_height(text, role, width)
        })
    }

    pub fn measure_table(&mut self, table: &TableSpec) -> Pt {
        let body = table_probe_html(table);
        let width = Pt::from_f64(table.effective_total_width());
        let kind = ProbeKind::Table {
            show_header: table.show_header,
        };
        self.measure(kind, body, "probe-table", width, |estimator| {
            estimator.table_height(table)
        })
    }

    pub fn measure_footer_meta(&mut self, refs: &[String], notes: &[String]) -> Pt {
        if refs.is_empty() && notes.is_empty() {
            return Pt::ZERO;
        }
        let refs_block = if refs.is_empty() {
            String::new()
        } else {
            let lines: String = refs
                .iter()
                .map(|entry| format!("<div class=\"refs-text\">{entry}</div>"))
                .collect();
            format!("<div class=\"refs\"><div class=\"refs-line\"></div>{lines}</div>")
        };
        let notes_block = if notes.is_empty() {
            String::new()
        } else {
            let lines: String = notes.iter().map(|note| format!("<div>{note}</div>")).collect();
            format!("<div class=\"footer-notes\">{lines}</div>")
        };
        let body =
            format!("<div id=\"probe\" class=\"footer-meta\">{refs_block}{notes_block}</div>");
        let width = self.content_width;
        self.measure(ProbeKind::FooterMeta, body, "probe", width, |estimator| {
            estimator.footer_meta_height(refs, notes, width)
        })
    }

    pub fn measure_footer_contact(&mut self, site: &str, phone: &str) -> Pt {
        let body = format!(
            "<div id=\"probe\" class=\"footer-contact\"><div>{site}</div><div>{phone}</div></div>"
        );
        let width = self.content_width;
        self.measure(ProbeKind::FooterContact, body, "probe", width, |estimator| {
            estimator.contact_height
        })
    }

    pub fn measure_page_stamp(&mut self, page_number: &str) -> Pt {
        if page_number.is_empty() {
            return Pt::ZERO;
        }
        let body = format!("<div id=\"probe\" class=\"footer-page\">{page_number}</div>");
        let width = self.content_width;
        self.measure(ProbeKind::PageStamp, body, "probe", width, |estimator| {
            estimator.page_stamp(page_number)
        })
    }

    fn measure(
        &mut self,
        kind: ProbeKind,
        body: String,
        probe_id: &'static str,
        width: Pt,
        estimate: impl FnOnce(&Estimator) -> Pt,
    ) -> Pt {
        let key = cache_key(kind, width, &body);
        if let Some(height) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            return *height;
        }
        self.stats.cache_misses += 1;

        let height = match self.engine_height(kind, body, probe_id, width) {
            Ok(height) => height,
            Err(reason) => {
                self.stats.engine_fallbacks += 1;
                *self.fallbacks.entry(kind.label().to_string()).or_insert(0) += 1;
                if let Some(debug) = &self.debug {
                    debug.measure_fallback(kind.label(), &reason);
                }
                estimate(&self.estimator)
            }
        };
        self.cache.insert(key, height);
        height
    }

    fn engine_height(
        &mut self,
        kind: ProbeKind,
        body: String,
        probe_id: &'static str,
        width: Pt,
    ) -> Result<Pt, String> {
        let Some(engine) = self.engine.as_mut() else {
            return Err("no measurement engine configured".to_string());
        };
        let probe = ProbeDocument {
            kind,
            html: probe_document(&body),
            theme_css: &self.theme_css,
            measure_css: MEASURE_CSS.replace("{content_width}", &format!("{:.2}", width.to_f64())),
            probe_id,
            width,
        };
        match engine.measure(&probe) {
            Ok(px) if px.is_finite() && px >= 0.0 => Ok(Pt::from_css_px(px)),
            Ok(px) => Err(format!("engine returned invalid height {px}")),
            Err(err) => Err(err.to_string()),
        }
    }
}

fn cache_key(kind: ProbeKind, width: Pt, body: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(kind.key_tag().as_bytes());
    hasher.update([0u8]);
    hasher.update(width.to_milli_i64().to_le_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    hasher.finalize().into()
}

fn probe_document(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n  <meta charset=\"utf-8\" />\n</head>\n<body>\n  <div class=\"measure-root\">{body}</div>\n</body>\n</html>\n"
    )
}

// Table markup as the report template renders it, with the probe id on the
// `<table>` element.
pub fn table_probe_html(table: &TableSpec) -> String {
    let total_width = table.effective_total_width();
    let dep_width = table.effective_dep_width();
    let columns = table.column_count();
    let num_width = (total_width - dep_width) / columns.max(1) as f64;

    let mut cols = format!("<col style=\"width: {dep_width:.2}pt;\">");
    for _ in 0..columns {
        cols.push_str(&format!("<col style=\"width: {num_width:.2}pt;\">"));
    }

    let mut header = String::new();
    if table.show_header {
        header.push_str("<thead><tr><th class=\"col-dep\" rowspan=\"2\">Departamento/Mes</th>");
        for group in &table.groups {
            header.push_str(&format!(
                "<th class=\"col-num\" colspan=\"{}\">{}</th>",
                group.months.len(),
                group.title
            ));
        }
        header.push_str("</tr><tr>");
        for group in &table.groups {
            for month in &group.months {
                header.push_str(&format!("<th class=\"col-num\">{month}</th>"));
            }
        }
        header.push_str("</tr></thead>");
    }

    let mut body = String::from("<tbody>");
    for row in &table.rows {
        body.push_str(&format!("<tr><td class=\"col-dep\">{}</td>", row.dep));
        for value in &row.vals {
            body.push_str(&format!("<td>{value}</td>"));
        }
        body.push_str("</tr>");
    }
    body.push_str("</tbody>");

    format!(
        "<div class=\"content\" style=\"width: {total_width:.2}pt;\"><div class=\"table-wrap\" style=\"width: {total_width:.2}pt; margin-left: 0;\"><table id=\"probe-table\" class=\"tabla-abaco\"><colgroup>{cols}</colgroup>{header}{body}</table></div></div>"
    )
}
