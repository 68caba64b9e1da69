use crate::types::Pt;

#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    pub logical_page: usize,
    pub block_count: usize,
    pub used_height: Pt,
    pub ceiling: Pt,
    pub forced_overflow: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PaginationMetrics {
    pub pages: Vec<PageMetrics>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub engine_fallbacks: u64,
    pub total_ms: f64,
}

impl PaginationMetrics {
    pub fn forced_pages(&self) -> usize {
        self.pages.iter().filter(|page| page.forced_overflow).count()
    }
}
