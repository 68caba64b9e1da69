use crate::{
    ContentBlock, ContentPage, ContractError, HtmlBlock, LogicalPage, TableBlock, TableSpec,
    str_field, string_list, string_map,
};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct MapGridItem {
    pub path: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthoringBlock {
    Text {
        paragraphs: Vec<String>,
        refs: Vec<String>,
        footer_notes: Vec<String>,
    },
    Table {
        table: TableSpec,
        refs: Vec<String>,
        footer_notes: Vec<String>,
    },
    Figure {
        path: String,
        caption: String,
        wide: bool,
        refs: Vec<String>,
        footer_notes: Vec<String>,
    },
    MapGrid {
        items: Vec<MapGridItem>,
        caption: String,
        source: String,
        refs: Vec<String>,
        footer_notes: Vec<String>,
    },
    Html {
        html: String,
        keep_with_next: bool,
        refs: Vec<String>,
        footer_notes: Vec<String>,
    },
}

impl AuthoringBlock {
    pub fn from_value(value: &Value) -> Result<AuthoringBlock, ContractError> {
        if !value.is_object() {
            return Err(ContractError::InvalidShape(
                "block must be an object".to_string(),
            ));
        }
        let refs = string_list(value.get("refs"));
        let footer_notes = string_list(value.get("footer_notes"));
        let kind = match value.get("type").and_then(Value::as_str) {
            Some(kind) => kind,
            None if value.get("html").is_some() => "html",
            None if value.get("table").is_some() => "table",
            None => "text",
        };
        match kind {
            "text" => Ok(AuthoringBlock::Text {
                paragraphs: paragraphs_from_text(value.get("text")),
                refs,
                footer_notes,
            }),
            "table" => {
                let table = match value.get("table") {
                    Some(table) => TableSpec::from_value(table)?,
                    None => return Err(ContractError::MissingField("table".to_string())),
                };
                Ok(AuthoringBlock::Table {
                    table,
                    refs,
                    footer_notes,
                })
            }
            "figure" => Ok(AuthoringBlock::Figure {
                path: str_field(value, "path"),
                caption: str_field(value, "caption"),
                wide: value.get("wide").and_then(Value::as_bool).unwrap_or(false),
                refs,
                footer_notes,
            }),
            "map_grid" => {
                let items = match value.get("items") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|item| MapGridItem {
                            path: str_field(item, "path"),
                            label: str_field(item, "label"),
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                Ok(AuthoringBlock::MapGrid {
                    items,
                    caption: str_field(value, "caption"),
                    source: str_field(value, "source"),
                    refs,
                    footer_notes,
                })
            }
            "html" => Ok(AuthoringBlock::Html {
                html: str_field(value, "html"),
                keep_with_next: value
                    .get("keep_with_next")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                refs,
                footer_notes,
            }),
            other => Err(ContractError::UnknownBlockType(other.to_string())),
        }
    }

    pub fn is_empty_text(&self) -> bool {
        matches!(self, AuthoringBlock::Text { paragraphs, .. } if paragraphs.is_empty())
    }

    pub fn lower(self) -> ContentBlock {
        match self {
            AuthoringBlock::Text {
                paragraphs,
                refs,
                footer_notes,
            } => {
                let html: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
                html_block(html, false, refs, footer_notes)
            }
            AuthoringBlock::Table {
                table,
                refs,
                footer_notes,
            } => ContentBlock::Table(TableBlock {
                table,
                refs,
                footer_notes,
            }),
            AuthoringBlock::Figure {
                path,
                caption,
                wide,
                refs,
                footer_notes,
            } => {
                let class = if wide { "figure figure-wide" } else { "figure" };
                let mut html = format!("<img class=\"{class}\" src=\"{path}\" alt=\"{caption}\" />");
                if !caption.is_empty() {
                    html.push_str(&format!("<div class=\"figure-caption\">{caption}</div>"));
                }
                html_block(html, false, refs, footer_notes)
            }
            AuthoringBlock::MapGrid {
                items,
                caption,
                source,
                refs,
                footer_notes,
            } => {
                let mut html = String::from("<div class=\"map-grid\">");
                for item in &items {
                    html.push_str(&format!(
                        "<div class=\"map-item\"><img class=\"map-img\" src=\"{}\" alt=\"{}\" /><div class=\"map-label\">{}</div></div>",
                        item.path, item.label, item.label
                    ));
                }
                html.push_str("</div>");
                if !caption.is_empty() {
                    html.push_str(&format!("<div class=\"figure-caption\">{caption}</div>"));
                }
                if !source.is_empty() {
                    html.push_str(&format!("<div class=\"figure-source\">{source}</div>"));
                }
                html_block(html, false, refs, footer_notes)
            }
            AuthoringBlock::Html {
                html,
                keep_with_next,
                refs,
                footer_notes,
            } => html_block(html, keep_with_next, refs, footer_notes),
        }
    }
}

fn html_block(
    html: String,
    keep_with_next: bool,
    refs: Vec<String>,
    footer_notes: Vec<String>,
) -> ContentBlock {
    ContentBlock::Html(HtmlBlock {
        html,
        refs,
        footer_notes,
        keep_with_next,
    })
}

fn paragraphs_from_text(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(text)) => text
            .split("\n\n")
            .map(|chunk| {
                chunk
                    .lines()
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim()
                    .to_string()
            })
            .filter(|chunk| !chunk.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn heading_html(title: &str, subtitle: &str) -> String {
    let mut html = String::new();
    if !title.is_empty() {
        html.push_str(&format!("<div class=\"section-title\">{title}</div>"));
    }
    if !subtitle.is_empty() {
        html.push_str(&format!("<div class=\"section-subtitle\">{subtitle}</div>"));
    }
    html
}

fn blocks_from_section(section: &Value) -> Result<Vec<ContentBlock>, ContractError> {
    let mut blocks = Vec::new();
    let heading = heading_html(&str_field(section, "title"), &str_field(section, "subtitle"));
    if !heading.is_empty() {
        blocks.push(html_block(heading, true, Vec::new(), Vec::new()));
    }
    if let Some(Value::Array(items)) = section.get("content") {
        for item in items {
            let block = AuthoringBlock::from_value(item)?;
            if block.is_empty_text() {
                continue;
            }
            blocks.push(block.lower());
        }
    }
    let section_refs = string_list(section.get("refs"));
    if !section_refs.is_empty() {
        if let Some(first) = blocks.first_mut() {
            match first {
                ContentBlock::Html(block) => block.refs.extend(section_refs),
                ContentBlock::Table(block) => block.refs.extend(section_refs),
            }
        }
    }
    Ok(blocks)
}

pub fn lower_sections(doc: &Map<String, Value>) -> Result<Vec<LogicalPage>, ContractError> {
    let theme = match doc.get("theme") {
        Some(Value::Object(theme)) => theme.clone(),
        None | Some(Value::Null) => Map::new(),
        Some(_) => {
            return Err(ContractError::InvalidShape(
                "theme must be an object".to_string(),
            ));
        }
    };
    let sections = match doc.get("sections") {
        Some(Value::Array(sections)) => sections,
        _ => {
            return Err(ContractError::InvalidShape(
                "sections must be a list".to_string(),
            ));
        }
    };

    let mut pages = Vec::new();
    if let Some(Value::Object(cover)) = doc.get("cover") {
        let mut merged = theme.clone();
        for (key, value) in cover {
            merged.insert(key.clone(), value.clone());
        }
        merged.insert("cover".to_string(), Value::Bool(true));
        pages.push(LogicalPage::Cover(merged));
    }

    let mut blocks = Vec::new();
    let mut footer_notes = Vec::new();
    for section in sections {
        blocks.extend(blocks_from_section(section)?);
        footer_notes.extend(string_list(section.get("footer_notes")));
    }

    let theme_value = Value::Object(theme);
    pages.push(LogicalPage::Content(ContentPage {
        header_banner_path: str_field(&theme_value, "header_banner_path"),
        header_banner_path_cont: theme_value
            .get("header_banner_path_cont")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .map(str::to_string),
        header_logo_path: str_field(&theme_value, "header_logo_path"),
        title_line1: str_field(&theme_value, "title_line1"),
        title_line2: str_field(&theme_value, "title_line2"),
        intro: String::new(),
        blocks,
        refs: Vec::new(),
        footer_notes,
        footer_site: str_field(&theme_value, "footer_site"),
        footer_phone: str_field(&theme_value, "footer_phone"),
        page_number: "1".to_string(),
        refs_catalog: string_map(doc.get("refs_catalog")),
    }));
    Ok(pages)
}
