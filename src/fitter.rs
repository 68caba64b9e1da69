use crate::debug::{BreakReason, DebugLogger};
use crate::geometry::{GeometryResolver, PageLayoutState};
use crate::measure::Measurer;
use crate::normalize::BlockItem;
use crate::refs::leading_ref_number;
use crate::types::Pt;
use crate::warning_report::{WarningKind, WarningReport};
use folio_page_contract::TableSpec;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct PageBuild {
    pub items: Vec<BlockItem>,
    pub height: Pt,
    pub ceiling: Pt,
    pub refs: Vec<String>,
    pub notes: Vec<String>,
    pub forced_overflow: bool,
}

impl PageBuild {
    fn new(ceiling: Pt) -> Self {
        Self {
            items: Vec::new(),
            height: Pt::ZERO,
            ceiling,
            refs: Vec::new(),
            notes: Vec::new(),
            forced_overflow: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CitationPool {
    refs: Vec<(String, bool)>,
    notes: Vec<(String, bool)>,
}

impl CitationPool {
    pub fn new(refs: &[String], notes: &[String]) -> Self {
        Self {
            refs: refs.iter().map(|entry| (entry.clone(), false)).collect(),
            notes: notes.iter().map(|entry| (entry.clone(), false)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty() && self.notes.is_empty()
    }

    fn attracted(&self, markers: &[String]) -> (Vec<usize>, Vec<usize>) {
        let pick = |list: &[(String, bool)]| -> Vec<usize> {
            list.iter()
                .enumerate()
                .filter(|(_, (entry, claimed))| {
                    !claimed
                        && leading_ref_number(entry)
                            .is_some_and(|number| markers.iter().any(|marker| marker == number))
                })
                .map(|(idx, _)| idx)
                .collect()
        };
        if markers.is_empty() {
            return (Vec::new(), Vec::new());
        }
        (pick(&self.refs), pick(&self.notes))
    }

    fn claim(&mut self, refs: &[usize], notes: &[usize]) {
        for &idx in refs {
            self.refs[idx].1 = true;
        }
        for &idx in notes {
            self.notes[idx].1 = true;
        }
    }
}

/// Largest row prefix of `table` whose measured height fits in `available`,
/// or 0 when not even one row fits.
pub fn max_rows_that_fit(measurer: &mut Measurer, table: &TableSpec, available: Pt) -> usize {
    let mut low = 1usize;
    let mut high = table.rows.len();
    let mut best = 0usize;
    while low <= high {
        let mid = low + (high - low) / 2;
        let height = measurer.measure_table(&table.head(mid));
        if height <= available {
            best = mid;
            low = mid + 1;
        } else {
            high = mid - 1;
        }
    }
    best
}

// Ceiling once an item joins the page, with the pool entries it attracts.
struct CitationLimit {
    ceiling: Pt,
    clamped_from: Option<Pt>,
    refs: Vec<usize>,
    notes: Vec<usize>,
}

pub struct Fitter<'a, 'g> {
    resolver: &'a GeometryResolver<'g>,
    measurer: &'a mut Measurer,
    warnings: &'a mut WarningReport,
    debug: Option<&'a DebugLogger>,
    min_height: Pt,
    logical_page: usize,
    // Physical pages emitted before this logical page, covers included.
    page_offset: usize,
    current_page: usize,
}

impl<'a, 'g> Fitter<'a, 'g> {
    pub fn new(
        resolver: &'a GeometryResolver<'g>,
        measurer: &'a mut Measurer,
        warnings: &'a mut WarningReport,
        min_height: Pt,
    ) -> Self {
        Self {
            resolver,
            measurer,
            warnings,
            debug: None,
            min_height,
            logical_page: 0,
            page_offset: 0,
            current_page: 0,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<&'a DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    pub fn at_position(mut self, logical_page: usize, page_offset: usize) -> Self {
        self.logical_page = logical_page;
        self.page_offset = page_offset;
        self
    }

    pub fn fit(
        &mut self,
        items: Vec<BlockItem>,
        first: &PageLayoutState,
        continuation: &PageLayoutState,
        pool: &mut CitationPool,
    ) -> Vec<PageBuild> {
        let has_meta = !pool.is_empty();
        let mut pending: VecDeque<BlockItem> = items.into();
        let mut builds: Vec<PageBuild> = Vec::new();

        while !pending.is_empty() {
            self.current_page = self.page_offset + builds.len();
            let state = if builds.is_empty() { first } else { continuation };
            let remaining: Pt = pending.iter().map(|item| item.height).sum();
            let ceiling = if has_meta && remaining <= state.ceiling_meta {
                state.ceiling_meta
            } else {
                state.ceiling_base
            };
            let build = self.fill_page(&mut pending, state, ceiling.max(self.min_height), pool);
            builds.push(build);
        }
        builds
    }

    fn fill_page(
        &mut self,
        pending: &mut VecDeque<BlockItem>,
        state: &PageLayoutState,
        ceiling: Pt,
        pool: &mut CitationPool,
    ) -> PageBuild {
        let mut build = PageBuild::new(ceiling);
        let mut claimed_refs: Vec<String> = Vec::new();
        let mut claimed_notes: Vec<String> = Vec::new();
        let mut clamp_reported = false;

        while let Some(item) = pending.front() {
            let used = build.height;

            if item.keep_with_next
                && pending.len() > 1
                && !build.is_empty()
                && !self.keep_chain_fits(pending, &build, &claimed_refs, &claimed_notes, pool, state)
            {
                self.log_break(&build, BreakReason::KeepWithNext);
                break;
            }

            let CitationLimit {
                ceiling: limit,
                clamped_from,
                refs: attracted_refs,
                notes: attracted_notes,
            } = self.citation_limit(item, &build, &claimed_refs, &claimed_notes, pool, state);
            if used > limit && !build.is_empty() {
                let reason = if limit < build.ceiling {
                    BreakReason::MetaShrink
                } else {
                    BreakReason::Ceiling
                };
                self.log_break(&build, reason);
                break;
            }

            let mut split = false;
            if let Some(table) = item.table() {
                let mut available = limit - used;
                if available <= Pt::ZERO {
                    if !build.is_empty() {
                        self.log_break(&build, BreakReason::Ceiling);
                        break;
                    }
                    available = limit;
                }
                if item.height > available && table.rows.len() > 1 {
                    let fit = max_rows_that_fit(self.measurer, table, available);
                    if fit == 0 && !build.is_empty() {
                        self.log_break(&build, BreakReason::Ceiling);
                        break;
                    }
                    let rows = fit.max(1);
                    if rows < table.rows.len() {
                        let head = table.head(rows);
                        let tail = table.tail(rows);
                        let refs = item.refs.clone();
                        let notes = item.notes.clone();
                        let head_item = BlockItem::from_table(head, self.measurer, refs, notes);
                        let tail_item =
                            BlockItem::from_table(tail, self.measurer, Vec::new(), Vec::new());
                        pending[0] = head_item;
                        pending.insert(1, tail_item);
                        split = true;
                    }
                }
            }

            let Some(item) = pending.front() else {
                break;
            };
            if used + item.height > limit {
                if !build.is_empty() {
                    self.log_break(&build, BreakReason::Ceiling);
                    break;
                }
                self.record_forced_overflow(item.height, limit);
                build.forced_overflow = true;
            }

            let Some(item) = pending.pop_front() else {
                break;
            };
            if let Some(computed) = clamped_from
                && !clamp_reported
            {
                self.record_clamp(computed);
                clamp_reported = true;
            }
            build.ceiling = limit;
            build.height += item.height;
            build.refs.extend(item.refs.iter().cloned());
            build.notes.extend(item.notes.iter().cloned());
            claimed_refs.extend(attracted_refs.iter().map(|&idx| pool.refs[idx].0.clone()));
            claimed_notes.extend(attracted_notes.iter().map(|&idx| pool.notes[idx].0.clone()));
            pool.claim(&attracted_refs, &attracted_notes);
            build.items.push(item);

            if split {
                self.log_break(&build, BreakReason::TableSplit);
                break;
            }
        }
        build
    }

    fn citation_limit(
        &mut self,
        item: &BlockItem,
        build: &PageBuild,
        claimed_refs: &[String],
        claimed_notes: &[String],
        pool: &CitationPool,
        state: &PageLayoutState,
    ) -> CitationLimit {
        let (attracted_refs, attracted_notes) = pool.attracted(&item.markers);
        if !item.has_citations() && attracted_refs.is_empty() && attracted_notes.is_empty() {
            return CitationLimit {
                ceiling: build.ceiling,
                clamped_from: None,
                refs: attracted_refs,
                notes: attracted_notes,
            };
        }
        let mut refs = build.refs.clone();
        refs.extend(claimed_refs.iter().cloned());
        refs.extend(item.refs.iter().cloned());
        refs.extend(attracted_refs.iter().map(|&idx| pool.refs[idx].0.clone()));
        let mut notes = build.notes.clone();
        notes.extend(claimed_notes.iter().cloned());
        notes.extend(item.notes.iter().cloned());
        notes.extend(attracted_notes.iter().map(|&idx| pool.notes[idx].0.clone()));
        let (with_meta, clamped_from) = self
            .resolver
            .content_height_with_meta(self.measurer, state, &refs, &notes);
        CitationLimit {
            ceiling: build.ceiling.min(with_meta),
            clamped_from,
            refs: attracted_refs,
            notes: attracted_notes,
        }
    }

    // The run of keep-with-next items at the front of `pending` plus the first
    // item after it must share this page.
    fn keep_chain_fits(
        &mut self,
        pending: &VecDeque<BlockItem>,
        build: &PageBuild,
        claimed_refs: &[String],
        claimed_notes: &[String],
        pool: &CitationPool,
        state: &PageLayoutState,
    ) -> bool {
        let mut used = build.height;
        let mut limit = build.ceiling;
        for (idx, member) in pending.iter().enumerate() {
            let member_limit =
                self.citation_limit(member, build, claimed_refs, claimed_notes, pool, state);
            limit = limit.min(member_limit.ceiling);
            let successor = !member.keep_with_next || idx + 1 == pending.len();
            if !successor {
                used += member.height;
                continue;
            }
            return self
                .successor_height(member, limit - used)
                .is_some_and(|height| used + height <= limit);
        }
        true
    }

    fn successor_height(&mut self, next: &BlockItem, available: Pt) -> Option<Pt> {
        let Some(table) = next.table() else {
            return Some(next.height);
        };
        if available <= Pt::ZERO {
            return None;
        }
        let rows = max_rows_that_fit(self.measurer, table, available);
        if rows == 0 {
            return Some(next.height);
        }
        Some(self.measurer.measure_table(&table.head(rows)))
    }

    fn log_break(&self, build: &PageBuild, reason: BreakReason) {
        if let Some(debug) = self.debug {
            debug.page_break(
                self.logical_page,
                self.current_page,
                reason,
                build.height,
                build.ceiling,
            );
        }
    }

    fn record_clamp(&mut self, computed: Pt) {
        let minimum = self.min_height;
        self.warnings.push(
            WarningKind::GeometryClamped,
            format!("citations leave {computed} for content; clamped to {minimum}"),
            Some(self.current_page),
        );
        if let Some(debug) = self.debug {
            debug.geometry_clamped(self.logical_page, computed, minimum);
        }
    }

    fn record_forced_overflow(&mut self, height: Pt, limit: Pt) {
        let page_index = self.current_page;
        self.warnings.push(
            WarningKind::UnplaceableBlock,
            format!("block of {height} exceeds page ceiling {limit}; placed on its own page"),
            Some(page_index),
        );
        if let Some(debug) = self.debug {
            debug.forced_overflow(self.logical_page, page_index, height, limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::Estimator;
    use crate::geometry::PageVariant;
    use crate::layout_config::LayoutConfig;
    use folio_page_contract::{ContentBlock, ContentPage, TableGroup, TableRow};

    fn block(height: i32) -> BlockItem {
        BlockItem {
            block: ContentBlock::html(format!("<p>{height}</p>")),
            height: Pt::from_i32(height),
            keep_with_next: false,
            refs: Vec::new(),
            notes: Vec::new(),
            markers: Vec::new(),
        }
    }

    fn table(rows: usize) -> TableSpec {
        TableSpec {
            groups: vec![TableGroup {
                title: "2024".to_string(),
                months: vec!["Ene".to_string(), "Feb".to_string()],
            }],
            rows: (0..rows)
                .map(|idx| TableRow {
                    dep: format!("Dep {idx}"),
                    vals: vec!["1".to_string(), "2".to_string()],
                })
                .collect(),
            total_width: None,
            dep_width: None,
            show_header: true,
        }
    }

    fn page() -> ContentPage {
        ContentPage {
            title_line1: "Boletin".to_string(),
            footer_site: "www.example.org".to_string(),
            footer_phone: "+57 1".to_string(),
            page_number: "1".to_string(),
            ..ContentPage::default()
        }
    }

    fn run(
        items: Vec<BlockItem>,
        pool: &mut CitationPool,
    ) -> (Vec<PageBuild>, WarningReport, PageLayoutState) {
        let layout = LayoutConfig::default();
        let mut measurer = Measurer::new(&layout, Estimator::default());
        let resolver = GeometryResolver::new(&layout, &mut measurer);
        let page = page();
        let header = resolver.header_placement(&mut measurer, &page, true);
        let state = resolver.layout_state(&mut measurer, &page, header.bottom, PageVariant::First);
        let mut warnings = WarningReport::default();
        let builds = Fitter::new(&resolver, &mut measurer, &mut warnings, layout.min_content_height)
            .fit(items, &state, &state, pool);
        (builds, warnings, state)
    }

    fn heights(builds: &[PageBuild]) -> Vec<Vec<Pt>> {
        builds
            .iter()
            .map(|build| build.items.iter().map(|item| item.height).collect())
            .collect()
    }

    #[test]
    fn blocks_fill_pages_greedily() {
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, warnings, state) = run(vec![block(200), block(200), block(200)], &mut pool);
        assert_eq!(state.ceiling_base, Pt::from_i32(494));
        assert_eq!(
            heights(&builds),
            vec![
                vec![Pt::from_i32(200), Pt::from_i32(200)],
                vec![Pt::from_i32(200)]
            ]
        );
        assert!(warnings.is_empty());
        assert!(builds.iter().all(|build| build.height <= build.ceiling));
    }

    #[test]
    fn keep_with_next_moves_heading_to_next_page() {
        let mut heading = block(100);
        heading.keep_with_next = true;
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, _, _) = run(vec![block(300), heading, block(150)], &mut pool);
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].items.len(), 1);
        assert!(builds[1].items[0].keep_with_next);
        assert_eq!(builds[1].items.len(), 2);
    }

    #[test]
    fn heading_chain_moves_together_with_its_body() {
        let mut title = block(20);
        title.keep_with_next = true;
        let mut subtitle = block(21);
        subtitle.keep_with_next = true;
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, _, _) = run(vec![block(400), title, subtitle, block(80)], &mut pool);
        assert_eq!(
            heights(&builds),
            vec![
                vec![Pt::from_i32(400)],
                vec![Pt::from_i32(20), Pt::from_i32(21), Pt::from_i32(80)]
            ]
        );
    }

    #[test]
    fn heading_chain_stays_when_it_fits() {
        let mut title = block(20);
        title.keep_with_next = true;
        let mut subtitle = block(21);
        subtitle.keep_with_next = true;
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, _, _) = run(vec![block(300), title, subtitle, block(80)], &mut pool);
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].items.len(), 4);
    }

    #[test]
    fn keep_with_next_on_empty_page_is_placed() {
        let mut heading = block(100);
        heading.keep_with_next = true;
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, _, _) = run(vec![heading, block(450)], &mut pool);
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].items.len(), 1);
    }

    #[test]
    fn oversized_block_is_forced_onto_its_own_page() {
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, warnings, _) = run(vec![block(100), block(600), block(50)], &mut pool);
        assert_eq!(builds.len(), 3);
        assert!(!builds[0].forced_overflow);
        assert!(builds[1].forced_overflow);
        assert_eq!(builds[1].items.len(), 1);
        assert_eq!(warnings.count(WarningKind::UnplaceableBlock), 1);
    }

    #[test]
    fn long_table_splits_with_header_only_on_first_fragment() {
        let mut measurer = Measurer::new(&LayoutConfig::default(), Estimator::default());
        let item = BlockItem::from_table(table(100), &mut measurer, vec!["1 Fuente".to_string()], Vec::new());
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, warnings, _) = run(vec![block(100), item], &mut pool);
        assert!(builds.len() >= 3);
        assert!(warnings.is_empty());

        let fragments: Vec<&TableSpec> = builds
            .iter()
            .flat_map(|build| build.items.iter().filter_map(BlockItem::table))
            .collect();
        let total: usize = fragments.iter().map(|fragment| fragment.rows.len()).sum();
        assert_eq!(total, 100);
        assert!(fragments[0].show_header);
        assert!(fragments[1..].iter().all(|fragment| !fragment.show_header));
        assert_eq!(fragments[0].rows[0].dep, "Dep 0");
        assert!(builds.iter().all(|build| build.height <= build.ceiling));
        assert_eq!(builds[0].refs, vec!["1 Fuente".to_string()]);
        assert!(builds[1..].iter().all(|build| build.refs.is_empty()));
    }

    #[test]
    fn citations_shrink_the_page_before_placing() {
        let refs: Vec<String> = (1..=20).map(|n| format!("{n} Fuente")).collect();
        let mut cited = block(60);
        cited.refs = refs.clone();
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, _, state) = run(vec![block(400), cited], &mut pool);
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[1].refs, refs);
        assert!(builds[1].ceiling < state.ceiling_base);
        assert_eq!(builds[0].ceiling, state.ceiling_base);
    }

    #[test]
    fn block_citations_that_clamp_the_ceiling_warn_once_per_page() {
        let refs: Vec<String> = (1..=80).map(|n| format!("{n} Fuente")).collect();
        let cited = |height: i32| {
            let mut item = block(height);
            item.refs = refs.clone();
            item
        };
        let mut pool = CitationPool::new(&[], &[]);
        let (builds, warnings, _) = run(vec![cited(10), cited(10)], &mut pool);
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].ceiling, LayoutConfig::default().min_content_height);
        assert_eq!(warnings.count(WarningKind::GeometryClamped), 1);

        let mut pool = CitationPool::new(&[], &[]);
        let (builds, warnings, _) = run(vec![cited(30), cited(30)], &mut pool);
        assert_eq!(builds.len(), 2);
        assert_eq!(warnings.count(WarningKind::GeometryClamped), 2);
    }

    #[test]
    fn uncited_blocks_never_warn_about_clamping() {
        let mut pool = CitationPool::new(&[], &[]);
        let (_, warnings, _) = run(vec![block(200), block(200), block(200)], &mut pool);
        assert_eq!(warnings.count(WarningKind::GeometryClamped), 0);
    }

    #[test]
    fn pool_entries_are_claimed_once() {
        let mut pool = CitationPool::new(&["2 Fuente".to_string(), "Libre".to_string()], &[]);
        let markers = vec!["2".to_string()];
        let (refs, notes) = pool.attracted(&markers);
        assert_eq!(refs, vec![0]);
        assert!(notes.is_empty());
        pool.claim(&refs, &notes);
        assert_eq!(pool.attracted(&markers), (Vec::new(), Vec::new()));
        assert_eq!(pool.attracted(&[]), (Vec::new(), Vec::new()));
    }

    #[test]
    fn row_search_finds_largest_fitting_prefix() {
        let mut measurer = Measurer::new(&LayoutConfig::default(), Estimator::default());
        let spec = table(30);
        assert_eq!(max_rows_that_fit(&mut measurer, &spec, Pt::from_i32(10)), 0);
        assert_eq!(max_rows_that_fit(&mut measurer, &spec, Pt::from_i32(2000)), 30);
        // 40pt header, 16pt margin, 16pt per row.
        assert_eq!(max_rows_that_fit(&mut measurer, &spec, Pt::from_i32(56 + 16 * 7 + 5)), 7);
    }
}
