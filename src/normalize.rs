use crate::html::{bracket_ref_ids, has_keep_with_next_marker, split_fragments, superscript_numbers};
use crate::measure::Measurer;
use crate::refs::redistribute_block_refs;
use crate::types::Pt;
use folio_page_contract::{ContentBlock, TableSpec};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct BlockItem {
    pub block: ContentBlock,
    pub height: Pt,
    pub keep_with_next: bool,
    pub refs: Vec<String>,
    pub notes: Vec<String>,
    pub markers: Vec<String>,
}

impl BlockItem {
    pub fn table(&self) -> Option<&TableSpec> {
        match &self.block {
            ContentBlock::Table(block) => Some(&block.table),
            ContentBlock::Html(_) => None,
        }
    }

    pub fn has_citations(&self) -> bool {
        !self.refs.is_empty() || !self.notes.is_empty()
    }

    pub fn from_table(
        table: TableSpec,
        measurer: &mut Measurer,
        refs: Vec<String>,
        notes: Vec<String>,
    ) -> BlockItem {
        let height = measurer.measure_table(&table);
        BlockItem {
            block: ContentBlock::table(table),
            height,
            keep_with_next: false,
            refs,
            notes,
            markers: Vec::new(),
        }
    }
}

pub fn normalize_blocks(
    blocks: &[ContentBlock],
    ceiling: Pt,
    measurer: &mut Measurer,
    refs_catalog: &BTreeMap<String, String>,
) -> Vec<BlockItem> {
    let mut items = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Table(table) => {
                items.push(BlockItem::from_table(
                    table.table.clone(),
                    measurer,
                    table.refs.clone(),
                    table.footer_notes.clone(),
                ));
            }
            ContentBlock::Html(html) => {
                let mut refs = html.refs.clone();
                for entry in refs_from_catalog(&html.html, refs_catalog) {
                    if !refs.contains(&entry) {
                        refs.push(entry);
                    }
                }
                let keep_with_next = html.keep_with_next || has_keep_with_next_marker(&html.html);
                let chunks = split_html_block(&html.html, ceiling, measurer);
                for (idx, (chunk, height)) in chunks.into_iter().enumerate() {
                    let first = idx == 0;
                    items.push(BlockItem {
                        markers: superscript_numbers(&chunk),
                        block: ContentBlock::html(chunk),
                        height,
                        keep_with_next: keep_with_next && first,
                        refs: if first { refs.clone() } else { Vec::new() },
                        notes: if first {
                            html.footer_notes.clone()
                        } else {
                            Vec::new()
                        },
                    });
                }
            }
        }
    }
    redistribute_block_refs(&mut items);
    items
}

pub fn refs_from_catalog(html: &str, catalog: &BTreeMap<String, String>) -> Vec<String> {
    if catalog.is_empty() {
        return Vec::new();
    }
    bracket_ref_ids(html)
        .into_iter()
        .filter_map(|id| catalog.get(&id).cloned())
        .collect()
}

pub fn split_html_block(html: &str, ceiling: Pt, measurer: &mut Measurer) -> Vec<(String, Pt)> {
    let height = measurer.measure_html(html);
    if height <= ceiling {
        return vec![(html.to_string(), height)];
    }
    let fragments = split_fragments(html);
    if fragments.len() == 1 {
        return vec![(html.to_string(), height)];
    }

    let mut packed: Vec<(String, Pt)> = Vec::new();
    let mut buffer = String::new();
    let mut buffer_height = Pt::ZERO;
    for fragment in fragments {
        let candidate = format!("{buffer}{fragment}");
        let candidate_height = measurer.measure_html(&candidate);
        if buffer.is_empty() || candidate_height <= ceiling {
            buffer = candidate;
            buffer_height = candidate_height;
            continue;
        }
        packed.push((std::mem::take(&mut buffer), buffer_height));
        buffer_height = measurer.measure_html(&fragment);
        buffer = fragment;
    }
    if !buffer.is_empty() {
        packed.push((buffer, buffer_height));
    }

    let mut out = Vec::with_capacity(packed.len());
    for (chunk, chunk_height) in packed {
        if chunk_height > ceiling && chunk.len() < html.len() {
            out.extend(split_html_block(&chunk, ceiling, measurer));
        } else {
            out.push((chunk, chunk_height));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::Estimator;
    use crate::layout_config::LayoutConfig;
    use crate::measure::{EngineFailure, MeasureEngine, ProbeDocument};
    use folio_page_contract::{HtmlBlock, TableBlock, TableGroup, TableRow};

    fn measurer() -> Measurer {
        Measurer::new(&LayoutConfig::default(), Estimator::default())
    }

    fn paragraph(words: usize) -> String {
        format!("<p>{}</p>", vec!["palabra"; words].join(" "))
    }

    #[test]
    fn short_blocks_stay_whole() {
        let mut measurer = measurer();
        let blocks = vec![ContentBlock::html("<p>uno</p><p>dos</p>")];
        let items = normalize_blocks(&blocks, Pt::from_i32(500), &mut measurer, &BTreeMap::new());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].height, measurer.measure_html("<p>uno</p><p>dos</p>"));
    }

    #[test]
    fn oversized_block_splits_into_chunks_under_ceiling() {
        let mut measurer = measurer();
        let html = format!("{}{}{}", paragraph(200), paragraph(200), paragraph(200));
        let ceiling = Pt::from_i32(300);
        assert!(measurer.measure_html(&html) > ceiling);
        let block = ContentBlock::Html(HtmlBlock {
            html: html.clone(),
            refs: vec!["1 Fuente".to_string()],
            footer_notes: vec!["nota".to_string()],
            keep_with_next: true,
        });
        let items = normalize_blocks(&[block], ceiling, &mut measurer, &BTreeMap::new());
        assert!(items.len() >= 2, "got {} chunks", items.len());
        for item in &items {
            assert!(item.height <= ceiling, "chunk of {} exceeds ceiling", item.height);
        }
        assert!(items[0].keep_with_next);
        assert!(items[1..].iter().all(|item| !item.keep_with_next));
        assert_eq!(items[0].refs, vec!["1 Fuente".to_string()]);
        assert_eq!(items[0].notes, vec!["nota".to_string()]);
        assert!(items[1..].iter().all(|item| !item.has_citations()));
        let rejoined: String = items
            .iter()
            .map(|item| match &item.block {
                ContentBlock::Html(block) => block.html.clone(),
                ContentBlock::Table(_) => String::new(),
            })
            .collect();
        assert_eq!(rejoined, html);
    }

    struct TallEngine;

    impl MeasureEngine for TallEngine {
        fn measure(&mut self, _probe: &ProbeDocument<'_>) -> Result<f64, EngineFailure> {
            Ok(5000.0)
        }
    }

    #[test]
    fn malformed_oversized_block_is_kept_whole() {
        let mut measurer = measurer().with_engine(Box::new(TallEngine));
        let html = format!("<p{}</p>", " Uno dos. Tres cuatro.".repeat(3));
        let blocks = vec![ContentBlock::html(html.clone())];
        let items = normalize_blocks(&blocks, Pt::from_i32(500), &mut measurer, &BTreeMap::new());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].block.as_html(), Some(html.as_str()));
        assert_eq!(items[0].height, Pt::from_i32(3750));
    }

    #[test]
    fn heading_markup_sets_keep_with_next() {
        let mut measurer = measurer();
        let blocks = vec![
            ContentBlock::html("<div class=\"section-title\">I. Resumen</div>"),
            ContentBlock::html("<p>texto</p>"),
        ];
        let items = normalize_blocks(&blocks, Pt::from_i32(500), &mut measurer, &BTreeMap::new());
        assert!(items[0].keep_with_next);
        assert!(!items[1].keep_with_next);
    }

    #[test]
    fn tables_are_measured_whole() {
        let mut measurer = measurer();
        let table = folio_page_contract::TableSpec {
            groups: vec![TableGroup {
                title: "G".to_string(),
                months: vec!["Ene".to_string()],
            }],
            rows: (0..100)
                .map(|idx| TableRow {
                    dep: format!("D{idx}"),
                    vals: vec!["1".to_string()],
                })
                .collect(),
            total_width: None,
            dep_width: None,
            show_header: true,
        };
        let block = ContentBlock::Table(TableBlock {
            table: table.clone(),
            refs: Vec::new(),
            footer_notes: Vec::new(),
        });
        let items = normalize_blocks(&[block], Pt::from_i32(200), &mut measurer, &BTreeMap::new());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].table().map(|t| t.rows.len()), Some(100));
        assert!(items[0].height > Pt::from_i32(200));
    }

    #[test]
    fn catalog_citations_append_refs_once() {
        let mut measurer = measurer();
        let mut catalog = BTreeMap::new();
        catalog.insert("1".to_string(), "1 Fuente 1".to_string());
        catalog.insert("3".to_string(), "3 Fuente 3".to_string());
        assert_eq!(
            refs_from_catalog("Texto [1,3]", &catalog),
            vec!["1 Fuente 1", "3 Fuente 3"]
        );
        let block = ContentBlock::Html(HtmlBlock {
            html: "<p>Texto [1,3] y [2]</p>".to_string(),
            refs: vec!["1 Fuente 1".to_string()],
            footer_notes: Vec::new(),
            keep_with_next: false,
        });
        let items = normalize_blocks(&[block], Pt::from_i32(500), &mut measurer, &catalog);
        assert_eq!(items[0].refs, vec!["1 Fuente 1", "3 Fuente 3"]);
    }

    #[test]
    fn refs_follow_their_superscripts_across_chunks() {
        let mut measurer = measurer();
        let html = format!(
            "{}<p>cita<sup>2</sup></p>{}",
            paragraph(200),
            paragraph(200)
        );
        let block = ContentBlock::Html(HtmlBlock {
            html,
            refs: vec!["2 Fuente".to_string()],
            footer_notes: Vec::new(),
            keep_with_next: false,
        });
        let items = normalize_blocks(&[block], Pt::from_i32(200), &mut measurer, &BTreeMap::new());
        let holder = items
            .iter()
            .position(|item| !item.refs.is_empty())
            .expect("ref kept");
        assert_eq!(items[holder].markers, vec!["2"]);
    }
}
