use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

mod sections;

pub use sections::{AuthoringBlock, MapGridItem, lower_sections};

pub const CONTRACT_ID: &str = "folio.page_contract";
pub const CONTRACT_VERSION: &str = "1";

pub const DEFAULT_TABLE_WIDTH: f64 = 532.66;
pub const DEFAULT_DEP_WIDTH: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    InvalidShape(String),
    MissingField(String),
    UnknownBlockType(String),
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractError::InvalidShape(message) => write!(f, "invalid shape: {}", message),
            ContractError::MissingField(field) => write!(f, "missing field: {}", field),
            ContractError::UnknownBlockType(kind) => write!(f, "unknown block type: {}", kind),
        }
    }
}

impl std::error::Error for ContractError {}

#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup {
    pub title: String,
    pub months: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub dep: String,
    pub vals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub groups: Vec<TableGroup>,
    pub rows: Vec<TableRow>,
    pub total_width: Option<f64>,
    pub dep_width: Option<f64>,
    pub show_header: bool,
}

impl TableSpec {
    pub fn column_count(&self) -> usize {
        self.groups.iter().map(|group| group.months.len()).sum()
    }

    pub fn effective_total_width(&self) -> f64 {
        self.total_width.unwrap_or(DEFAULT_TABLE_WIDTH)
    }

    pub fn effective_dep_width(&self) -> f64 {
        self.dep_width.unwrap_or(DEFAULT_DEP_WIDTH)
    }

    pub fn head(&self, count: usize) -> TableSpec {
        let end = count.min(self.rows.len());
        self.with_rows(&self.rows[..end], self.show_header)
    }

    pub fn tail(&self, start: usize) -> TableSpec {
        let start = start.min(self.rows.len());
        self.with_rows(&self.rows[start..], false)
    }

    pub fn with_rows(&self, rows: &[TableRow], show_header: bool) -> TableSpec {
        TableSpec {
            groups: self.groups.clone(),
            rows: rows.to_vec(),
            total_width: self.total_width,
            dep_width: self.dep_width,
            show_header,
        }
    }

    pub fn from_value(value: &Value) -> Result<TableSpec, ContractError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ContractError::InvalidShape("table must be an object".to_string()))?;
        let groups = match obj.get("groups") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|group| TableGroup {
                    title: str_field(group, "title"),
                    months: string_list(group.get("months")),
                })
                .collect(),
            Some(_) => {
                return Err(ContractError::InvalidShape(
                    "table.groups must be a list".to_string(),
                ));
            }
        };
        let rows = match obj.get("rows") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|row| TableRow {
                    dep: str_field(row, "dep"),
                    vals: string_list(row.get("vals")),
                })
                .collect(),
            Some(_) => {
                return Err(ContractError::InvalidShape(
                    "table.rows must be a list".to_string(),
                ));
            }
        };
        Ok(TableSpec {
            groups,
            rows,
            total_width: obj.get("total_width").and_then(Value::as_f64),
            dep_width: obj.get("dep_width").and_then(Value::as_f64),
            show_header: obj
                .get("show_header")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        })
    }

    pub fn to_value(&self) -> Value {
        let groups: Vec<Value> = self
            .groups
            .iter()
            .map(|group| {
                let mut out = Map::new();
                out.insert("title".to_string(), Value::from(group.title.clone()));
                out.insert("months".to_string(), Value::from(group.months.clone()));
                Value::Object(out)
            })
            .collect();
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut out = Map::new();
                out.insert("dep".to_string(), Value::from(row.dep.clone()));
                out.insert("vals".to_string(), Value::from(row.vals.clone()));
                Value::Object(out)
            })
            .collect();
        let mut out = Map::new();
        out.insert("groups".to_string(), Value::Array(groups));
        out.insert("rows".to_string(), Value::Array(rows));
        out.insert(
            "total_width".to_string(),
            self.total_width.map(Value::from).unwrap_or(Value::Null),
        );
        out.insert(
            "dep_width".to_string(),
            self.dep_width.map(Value::from).unwrap_or(Value::Null),
        );
        out.insert("show_header".to_string(), Value::Bool(self.show_header));
        Value::Object(out)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HtmlBlock {
    pub html: String,
    pub refs: Vec<String>,
    pub footer_notes: Vec<String>,
    pub keep_with_next: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub table: TableSpec,
    pub refs: Vec<String>,
    pub footer_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Html(HtmlBlock),
    Table(TableBlock),
}

impl ContentBlock {
    pub fn html(html: impl Into<String>) -> Self {
        ContentBlock::Html(HtmlBlock {
            html: html.into(),
            ..HtmlBlock::default()
        })
    }

    pub fn table(table: TableSpec) -> Self {
        ContentBlock::Table(TableBlock {
            table,
            refs: Vec::new(),
            footer_notes: Vec::new(),
        })
    }

    pub fn as_html(&self) -> Option<&str> {
        match self {
            ContentBlock::Html(block) => Some(&block.html),
            ContentBlock::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableSpec> {
        match self {
            ContentBlock::Table(block) => Some(&block.table),
            ContentBlock::Html(_) => None,
        }
    }

    pub fn refs(&self) -> &[String] {
        match self {
            ContentBlock::Html(block) => &block.refs,
            ContentBlock::Table(block) => &block.refs,
        }
    }

    pub fn footer_notes(&self) -> &[String] {
        match self {
            ContentBlock::Html(block) => &block.footer_notes,
            ContentBlock::Table(block) => &block.footer_notes,
        }
    }

    pub fn with_citations(mut self, refs: Vec<String>, footer_notes: Vec<String>) -> Self {
        match &mut self {
            ContentBlock::Html(block) => {
                block.refs = refs;
                block.footer_notes = footer_notes;
            }
            ContentBlock::Table(block) => {
                block.refs = refs;
                block.footer_notes = footer_notes;
            }
        }
        self
    }

    pub fn from_value(value: &Value) -> Result<ContentBlock, ContractError> {
        Ok(AuthoringBlock::from_value(value)?.lower())
    }

    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        match self {
            ContentBlock::Html(block) => {
                out.insert("type".to_string(), Value::from("html"));
                out.insert("html".to_string(), Value::from(block.html.clone()));
                if block.keep_with_next {
                    out.insert("keep_with_next".to_string(), Value::Bool(true));
                }
            }
            ContentBlock::Table(block) => {
                out.insert("type".to_string(), Value::from("table"));
                out.insert("table".to_string(), block.table.to_value());
            }
        }
        if !self.refs().is_empty() {
            out.insert("refs".to_string(), Value::from(self.refs().to_vec()));
        }
        if !self.footer_notes().is_empty() {
            out.insert(
                "footer_notes".to_string(),
                Value::from(self.footer_notes().to_vec()),
            );
        }
        Value::Object(out)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentPage {
    pub header_banner_path: String,
    pub header_banner_path_cont: Option<String>,
    pub header_logo_path: String,
    pub title_line1: String,
    pub title_line2: String,
    pub intro: String,
    pub blocks: Vec<ContentBlock>,
    pub refs: Vec<String>,
    pub footer_notes: Vec<String>,
    pub footer_site: String,
    pub footer_phone: String,
    pub page_number: String,
    pub refs_catalog: BTreeMap<String, String>,
}

impl ContentPage {
    pub fn from_value(value: &Value) -> Result<ContentPage, ContractError> {
        if !value.is_object() {
            return Err(ContractError::InvalidShape(
                "page must be an object".to_string(),
            ));
        }
        let blocks = match value.get("blocks") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(ContentBlock::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ContractError::InvalidShape(
                    "page.blocks must be a list".to_string(),
                ));
            }
        };
        let header_banner_path_cont = value
            .get("header_banner_path_cont")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .map(str::to_string);
        Ok(ContentPage {
            header_banner_path: str_field(value, "header_banner_path"),
            header_banner_path_cont,
            header_logo_path: str_field(value, "header_logo_path"),
            title_line1: str_field(value, "title_line1"),
            title_line2: str_field(value, "title_line2"),
            intro: str_field(value, "intro"),
            blocks,
            refs: string_list(value.get("refs")),
            footer_notes: string_list(value.get("footer_notes")),
            footer_site: str_field(value, "footer_site"),
            footer_phone: str_field(value, "footer_phone"),
            page_number: str_field(value, "page_number"),
            refs_catalog: string_map(value.get("refs_catalog")),
        })
    }

    pub fn has_meta(&self) -> bool {
        !self.refs.is_empty() || !self.footer_notes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPage {
    Cover(Map<String, Value>),
    Content(ContentPage),
}

impl LogicalPage {
    pub fn from_value(value: &Value) -> Result<LogicalPage, ContractError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ContractError::InvalidShape("page must be an object".to_string()))?;
        if obj.get("cover").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(LogicalPage::Cover(obj.clone()));
        }
        Ok(LogicalPage::Content(ContentPage::from_value(value)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub root: Map<String, Value>,
    pub pages: Vec<LogicalPage>,
}

pub fn parse_document(value: &Value) -> Result<ReportDocument, ContractError> {
    let obj = value.as_object().ok_or_else(|| {
        ContractError::InvalidShape("document must be an object".to_string())
    })?;
    let pages = match obj.get("pages") {
        Some(Value::Array(items)) => items
            .iter()
            .map(LogicalPage::from_value)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(ContractError::InvalidShape(
                "pages must be a list".to_string(),
            ));
        }
        None => match obj.get("sections") {
            Some(_) => lower_sections(obj)?,
            None => {
                return Err(ContractError::MissingField(
                    "sections or pages".to_string(),
                ));
            }
        },
    };
    let mut root = obj.clone();
    root.remove("pages");
    Ok(ReportDocument { root, pages })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

impl TextAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPage {
    pub header_banner_path: String,
    pub header_banner_path_cont: String,
    pub header_logo_path: String,
    pub title_line1: String,
    pub title_line2: String,
    pub intro: String,
    pub blocks: Vec<ContentBlock>,
    pub refs: Vec<String>,
    pub footer_notes: Vec<String>,
    pub page_number: String,
    pub footer_site: String,
    pub footer_phone: String,
    pub intro_top: f64,
    pub content_top: f64,
    pub content_height: f64,
    pub header_title_top: f64,
    pub header_subtitle_top: f64,
    pub header_title_left: f64,
    pub header_title_width: f64,
    pub header_title_align: TextAlign,
    pub header_subtitle_left: f64,
    pub header_subtitle_width: f64,
    pub header_subtitle_align: TextAlign,
    pub show_header_titles: bool,
    pub footer_meta_bottom: f64,
}

impl OutputPage {
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        let mut put = |key: &str, value: Value| {
            out.insert(key.to_string(), value);
        };
        put("header_banner_path", Value::from(self.header_banner_path.clone()));
        put(
            "header_banner_path_cont",
            Value::from(self.header_banner_path_cont.clone()),
        );
        put("header_logo_path", Value::from(self.header_logo_path.clone()));
        put("title_line1", Value::from(self.title_line1.clone()));
        put("title_line2", Value::from(self.title_line2.clone()));
        put("intro", Value::from(self.intro.clone()));
        put(
            "blocks",
            Value::Array(self.blocks.iter().map(ContentBlock::to_value).collect()),
        );
        put("refs", Value::from(self.refs.clone()));
        put("footer_notes", Value::from(self.footer_notes.clone()));
        put("page_number", Value::from(self.page_number.clone()));
        put("footer_site", Value::from(self.footer_site.clone()));
        put("footer_phone", Value::from(self.footer_phone.clone()));
        put("intro_top", Value::from(self.intro_top));
        put("content_top", Value::from(self.content_top));
        put("content_height", Value::from(self.content_height));
        put("header_title_top", Value::from(self.header_title_top));
        put("header_subtitle_top", Value::from(self.header_subtitle_top));
        put("header_title_left", Value::from(self.header_title_left));
        put("header_title_width", Value::from(self.header_title_width));
        put(
            "header_title_align",
            Value::from(self.header_title_align.as_str()),
        );
        put("header_subtitle_left", Value::from(self.header_subtitle_left));
        put("header_subtitle_width", Value::from(self.header_subtitle_width));
        put(
            "header_subtitle_align",
            Value::from(self.header_subtitle_align.as_str()),
        );
        put("show_header_titles", Value::Bool(self.show_header_titles));
        put("footer_meta_bottom", Value::from(self.footer_meta_bottom));
        Value::Object(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalPage {
    Cover(Map<String, Value>),
    Content(OutputPage),
}

impl PhysicalPage {
    pub fn is_cover(&self) -> bool {
        matches!(self, PhysicalPage::Cover(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            PhysicalPage::Cover(fields) => {
                let mut out = fields.clone();
                out.entry("page_number".to_string())
                    .or_insert_with(|| Value::from(""));
                out.entry("show_header_titles".to_string())
                    .or_insert(Value::Bool(false));
                Value::Object(out)
            }
            PhysicalPage::Content(page) => page.to_value(),
        }
    }
}

pub fn emit_document(root: &Map<String, Value>, pages: &[PhysicalPage]) -> Value {
    let mut out = root.clone();
    out.insert(
        "pages".to_string(),
        Value::Array(pages.iter().map(PhysicalPage::to_value).collect()),
    );
    Value::Object(out)
}

pub(crate) fn str_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                Value::Bool(flag) => Some(flag.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(text)) if !text.is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

pub(crate) fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(entries)) = value {
        for (key, entry) in entries {
            if let Some(text) = entry.as_str() {
                out.insert(key.clone(), text.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pages_form_parses_blocks_and_meta() {
        let doc = json!({
            "title": "Boletin",
            "pages": [{
                "header_banner_path": "banner.png",
                "header_logo_path": "logo.png",
                "title_line1": "Titulo",
                "title_line2": "Subtitulo",
                "blocks": [
                    {"type": "html", "html": "<p>Uno</p>", "refs": ["1 Fuente"]},
                    {"type": "table", "table": {
                        "groups": [{"title": "G", "months": ["Ene", "Feb"]}],
                        "rows": [{"dep": "Meta", "vals": ["0,41", 2]}],
                        "show_header": false
                    }}
                ],
                "refs": ["2 Otra"],
                "page_number": 1
            }]
        });
        let parsed = parse_document(&doc).expect("document parses");
        assert_eq!(parsed.root.get("title"), Some(&json!("Boletin")));
        assert!(!parsed.root.contains_key("pages"));
        let LogicalPage::Content(page) = &parsed.pages[0] else {
            panic!("expected content page");
        };
        assert_eq!(page.page_number, "1");
        assert_eq!(page.refs, vec!["2 Otra".to_string()]);
        assert_eq!(page.blocks[0].refs(), &["1 Fuente".to_string()]);
        let ContentBlock::Table(table) = &page.blocks[1] else {
            panic!("expected table block");
        };
        assert!(!table.table.show_header);
        assert_eq!(table.table.column_count(), 2);
        assert_eq!(table.table.rows[0].vals, vec!["0,41", "2"]);
    }

    #[test]
    fn cover_pages_pass_through() {
        let doc = json!({"pages": [{"cover": true, "image": "cover.png"}]});
        let parsed = parse_document(&doc).expect("document parses");
        let LogicalPage::Cover(fields) = &parsed.pages[0] else {
            panic!("expected cover");
        };
        let emitted = PhysicalPage::Cover(fields.clone()).to_value();
        assert_eq!(emitted.get("image"), Some(&json!("cover.png")));
        assert_eq!(emitted.get("page_number"), Some(&json!("")));
        assert_eq!(emitted.get("show_header_titles"), Some(&json!(false)));
    }

    #[test]
    fn unknown_block_type_is_rejected() {
        let doc = json!({"pages": [{"blocks": [{"type": "chart"}]}]});
        let err = parse_document(&doc).expect_err("chart is not a block type");
        assert_eq!(err, ContractError::UnknownBlockType("chart".to_string()));
    }

    #[test]
    fn document_without_pages_or_sections_is_rejected() {
        let err = parse_document(&json!({"title": "x"})).expect_err("nothing to paginate");
        assert!(matches!(err, ContractError::MissingField(_)));
    }

    #[test]
    fn table_head_and_tail_partition_rows() {
        let table = TableSpec {
            groups: vec![TableGroup {
                title: "G".to_string(),
                months: vec!["Ene".to_string()],
            }],
            rows: (0..5)
                .map(|idx| TableRow {
                    dep: format!("Dept {idx}"),
                    vals: vec![idx.to_string()],
                })
                .collect(),
            total_width: None,
            dep_width: Some(90.0),
            show_header: true,
        };
        let head = table.head(2);
        let tail = table.tail(2);
        assert_eq!(head.rows.len() + tail.rows.len(), 5);
        assert!(head.show_header);
        assert!(!tail.show_header, "continuation fragments never repeat the header");
        assert_eq!(tail.rows[0].dep, "Dept 2");
        assert_eq!(tail.effective_dep_width(), 90.0);
        assert_eq!(tail.effective_total_width(), DEFAULT_TABLE_WIDTH);
    }

    #[test]
    fn output_page_emits_template_fields() {
        let page = OutputPage {
            header_banner_path: "b.png".to_string(),
            header_banner_path_cont: "b-clean.png".to_string(),
            header_logo_path: "l.png".to_string(),
            title_line1: "T".to_string(),
            title_line2: "S".to_string(),
            intro: String::new(),
            blocks: vec![ContentBlock::html("<p>x</p>")],
            refs: vec!["1 A".to_string()],
            footer_notes: Vec::new(),
            page_number: "3".to_string(),
            footer_site: "example.org".to_string(),
            footer_phone: String::new(),
            intro_top: 122.18,
            content_top: 150.0,
            content_height: 400.0,
            header_title_top: 100.0,
            header_subtitle_top: 117.0,
            header_title_left: 94.7,
            header_title_width: 430.0,
            header_title_align: TextAlign::Left,
            header_subtitle_left: 260.8,
            header_subtitle_width: 220.0,
            header_subtitle_align: TextAlign::Left,
            show_header_titles: true,
            footer_meta_bottom: 70.0,
        };
        let value = page.to_value();
        assert_eq!(value.get("page_number"), Some(&json!("3")));
        assert_eq!(value.get("header_title_align"), Some(&json!("left")));
        assert_eq!(
            value.pointer("/blocks/0/type"),
            Some(&json!("html")),
            "blocks keep their type tag"
        );
        let root = Map::new();
        let doc = emit_document(&root, &[PhysicalPage::Content(page)]);
        assert_eq!(doc.pointer("/pages/0/refs/0"), Some(&json!("1 A")));
    }
}
