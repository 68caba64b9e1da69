mod assemble;
mod debug;
mod error;
mod estimate;
mod fitter;
mod font;
mod geometry;
mod html;
mod layout_config;
mod measure;
mod metrics;
mod normalize;
mod refs;
mod stylesheet;
mod types;
mod warning_report;

pub use assemble::{PageAssembler, PageFrame, distribute_page_citations, resolve_banners};
pub use debug::BreakReason;
use debug::DebugLogger;
pub use error::FolioError;
pub use estimate::{Estimator, TextMetrics, TextRole, Typography};
pub use fitter::{CitationPool, Fitter, PageBuild, max_rows_that_fit};
pub use folio_page_contract::{
    ContentBlock, ContentPage, ContractError, LogicalPage, OutputPage, PhysicalPage,
    ReportDocument, TableSpec, emit_document, parse_document,
};
pub use font::{FontAdvance, font_advance_from_bytes, load_font_advance};
pub use geometry::{GeometryResolver, HeaderPlacement, PageLayoutState, PageVariant, TextBox};
pub use html::{bracket_ref_ids, split_fragments};
pub use layout_config::LayoutConfig;
pub use measure::{
    EngineFailure, MeasureEngine, MeasureStats, Measurer, ProbeDocument, ProbeKind,
    table_probe_html,
};
pub use metrics::{PageMetrics, PaginationMetrics};
pub use normalize::{BlockItem, normalize_blocks, split_html_block};
pub use refs::{
    CitationList, distribute_refs, leading_ref_number, redistribute_block_refs,
    superscript_numbers,
};
pub use stylesheet::StylesheetMetrics;
pub use types::{Pt, Size};
pub use warning_report::{LayoutWarning, WarningKind, WarningReport};

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Pagination {
    pub pages: Vec<PhysicalPage>,
    pub warnings: WarningReport,
    pub metrics: PaginationMetrics,
}

/// Splits logical report pages into physical pages for a fixed page theme.
///
/// A `Paginator` keeps its measurement cache across calls, so paginating
/// several documents with the same instance reuses earlier measurements.
pub struct Paginator {
    layout: LayoutConfig,
    measurer: Measurer,
    base_dir: Option<PathBuf>,
    debug: Option<DebugLogger>,
}

pub struct PaginatorBuilder {
    layout: LayoutConfig,
    stylesheet_path: Option<PathBuf>,
    stylesheet_css: Option<String>,
    base_url: Option<PathBuf>,
    font_file: Option<PathBuf>,
    engine: Option<Box<dyn MeasureEngine>>,
    debug_path: Option<PathBuf>,
}

impl Paginator {
    pub fn builder() -> PaginatorBuilder {
        PaginatorBuilder::new()
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn measurer(&self) -> &Measurer {
        &self.measurer
    }

    pub fn measurer_mut(&mut self) -> &mut Measurer {
        &mut self.measurer
    }

    pub fn paginate(&mut self, pages: &[LogicalPage]) -> Pagination {
        let started = Instant::now();
        let stats_before = self.measurer.stats();
        let mut warnings = WarningReport::default();
        let mut out: Vec<PhysicalPage> = Vec::new();
        let mut page_metrics: Vec<PageMetrics> = Vec::new();

        let layout = self.layout.clone();
        let resolver = GeometryResolver::new(&layout, &mut self.measurer);
        for (logical_idx, page) in pages.iter().enumerate() {
            match page {
                LogicalPage::Cover(fields) => {
                    out.push(PhysicalPage::Cover(fields.clone()));
                }
                LogicalPage::Content(content) => {
                    let offset = out.len();
                    for (output, metrics) in
                        self.paginate_content(&resolver, logical_idx, content, offset, &mut warnings)
                    {
                        out.push(PhysicalPage::Content(output));
                        page_metrics.push(metrics);
                    }
                }
            }
        }

        for (position, page) in out.iter_mut().enumerate() {
            if let PhysicalPage::Content(content) = page {
                content.page_number = (position + 1).to_string();
            }
        }

        for (probe, count) in self.measurer.take_fallbacks() {
            warnings.record_fallback(&probe, count);
        }
        let stats = self.measurer.stats();
        let metrics = PaginationMetrics {
            pages: page_metrics,
            cache_hits: stats.cache_hits - stats_before.cache_hits,
            cache_misses: stats.cache_misses - stats_before.cache_misses,
            engine_fallbacks: stats.engine_fallbacks - stats_before.engine_fallbacks,
            total_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        if let Some(debug) = &self.debug {
            debug.increment("paginate.logical_pages", pages.len() as u64);
            debug.increment("paginate.physical_pages", out.len() as u64);
            debug.emit_summary("paginate");
            debug.flush();
        }
        Pagination {
            pages: out,
            warnings,
            metrics,
        }
    }

    pub fn paginate_value(&mut self, document: &Value) -> Result<Value, FolioError> {
        let document = parse_document(document)?;
        let pagination = self.paginate(&document.pages);
        let mut out = emit_document(&document.root, &pagination.pages);
        if let Value::Object(map) = &mut out {
            map.entry("layout".to_string())
                .or_insert_with(|| self.layout.template_defaults());
        }
        Ok(out)
    }

    fn paginate_content(
        &mut self,
        resolver: &GeometryResolver<'_>,
        logical_idx: usize,
        page: &ContentPage,
        page_offset: usize,
        warnings: &mut WarningReport,
    ) -> Vec<(OutputPage, PageMetrics)> {
        // Titles show on the first physical page of the document only.
        let titles_shown = page_offset == 0;
        let shown = resolver.header_placement(&mut self.measurer, page, true);
        let hidden = resolver.header_placement(&mut self.measurer, page, false);
        let first_header = if titles_shown { shown } else { hidden };
        let first_state = resolver.layout_state(
            &mut self.measurer,
            page,
            first_header.bottom,
            PageVariant::First,
        );
        let cont_state = resolver.layout_state(
            &mut self.measurer,
            page,
            hidden.bottom,
            PageVariant::Continuation,
        );

        let minimum = self.layout.min_content_height;
        if let Some(raw) = first_state.clamped_from.or(cont_state.clamped_from) {
            warnings.push(
                WarningKind::GeometryClamped,
                format!("content height {raw} is below the minimum {minimum}; clamped"),
                Some(page_offset),
            );
            if let Some(debug) = &self.debug {
                debug.geometry_clamped(logical_idx, raw, minimum);
            }
        }

        let split_ceiling = first_state.min_ceiling().min(cont_state.min_ceiling());
        let items = normalize_blocks(
            &page.blocks,
            split_ceiling,
            &mut self.measurer,
            &page.refs_catalog,
        );
        let mut pool = CitationPool::new(&page.refs, &page.footer_notes);
        let mut builds = Fitter::new(resolver, &mut self.measurer, warnings, minimum)
            .with_debug(self.debug.as_ref())
            .at_position(logical_idx, page_offset)
            .fit(items, &first_state, &cont_state, &mut pool);
        distribute_page_citations(&mut builds, &page.refs, &page.footer_notes);

        let assembler = PageAssembler::new(page, self.base_dir.as_deref());
        builds
            .into_iter()
            .enumerate()
            .map(|(idx, build)| {
                let first = idx == 0;
                let frame = PageFrame {
                    state: if first { &first_state } else { &cont_state },
                    header: if first { &first_header } else { &hidden },
                    show_titles: first && titles_shown,
                    include_intro: first,
                };
                let metrics = PageMetrics {
                    page_number: page_offset + idx + 1,
                    logical_page: logical_idx,
                    block_count: build.items.len(),
                    used_height: build.height,
                    ceiling: build.ceiling,
                    forced_overflow: build.forced_overflow,
                };
                (assembler.assemble(build, frame), metrics)
            })
            .collect()
    }
}

impl PaginatorBuilder {
    pub fn new() -> Self {
        Self {
            layout: LayoutConfig::default(),
            stylesheet_path: None,
            stylesheet_css: None,
            base_url: None,
            font_file: None,
            engine: None,
            debug_path: None,
        }
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn stylesheet_path(mut self, path: impl AsRef<Path>) -> Self {
        self.stylesheet_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn stylesheet_css(mut self, css: impl Into<String>) -> Self {
        self.stylesheet_css = Some(css.into());
        self
    }

    pub fn base_url(mut self, path: impl AsRef<Path>) -> Self {
        self.base_url = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn font_file(mut self, path: impl AsRef<Path>) -> Self {
        self.font_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn engine(mut self, engine: Box<dyn MeasureEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn debug_log(mut self, path: impl AsRef<Path>) -> Self {
        self.debug_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<Paginator, FolioError> {
        self.layout.validate()?;

        let mut css = match &self.stylesheet_path {
            Some(path) => std::fs::read_to_string(path)?,
            None => String::new(),
        };
        if let Some(extra) = &self.stylesheet_css {
            if !css.is_empty() {
                css.push('\n');
            }
            css.push_str(extra);
        }
        let base_dir = self.base_url.clone().or_else(|| {
            self.stylesheet_path
                .as_ref()
                .and_then(|path| path.parent())
                .map(Path::to_path_buf)
        });

        let mut estimator = Estimator::default().with_base_dir(base_dir.clone());
        let sheet = StylesheetMetrics::parse(&css)?;
        estimator.typography.apply_stylesheet(&sheet);
        if let Some(font) = &self.font_file {
            let advance = load_font_advance(font)?;
            estimator.typography.apply_font_advance(advance.average_em);
        }

        let debug = match &self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let mut measurer = Measurer::new(&self.layout, estimator)
            .with_theme_css(css)
            .with_debug(debug.clone());
        if let Some(engine) = self.engine {
            measurer = measurer.with_engine(engine);
        }

        Ok(Paginator {
            layout: self.layout,
            measurer,
            base_dir,
            debug,
        })
    }
}

impl Default for PaginatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
