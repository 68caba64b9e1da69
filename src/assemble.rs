use crate::fitter::PageBuild;
use crate::geometry::{HeaderPlacement, PageLayoutState};
use crate::refs::{CitationList, distribute_refs};
use folio_page_contract::{ContentPage, OutputPage};
use std::path::Path;

/// Banner paths for a logical page as `(primary, continuation)`.
///
/// The continuation banner is the explicit `header_banner_path_cont`, else a
/// `<stem>-clean.<ext>` sibling of the primary banner when that file exists,
/// else the primary banner. A distinct continuation banner replaces the primary
/// one as well.
pub fn resolve_banners(page: &ContentPage, base_dir: Option<&Path>) -> (String, String) {
    let primary = page.header_banner_path.clone();
    let continuation = page
        .header_banner_path_cont
        .clone()
        .or_else(|| clean_sibling(&primary, base_dir))
        .unwrap_or_else(|| primary.clone());
    if !continuation.is_empty() && continuation != primary {
        (continuation.clone(), continuation)
    } else {
        (primary, continuation)
    }
}

fn clean_sibling(primary: &str, base_dir: Option<&Path>) -> Option<String> {
    if primary.is_empty() {
        return None;
    }
    let path = Path::new(primary);
    let stem = path.file_stem()?.to_str()?;
    let candidate = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => path.with_file_name(format!("{stem}-clean.{ext}")),
        None => path.with_file_name(format!("{stem}-clean")),
    };
    let on_disk = match base_dir {
        Some(dir) if candidate.is_relative() => dir.join(&candidate),
        _ => candidate.clone(),
    };
    on_disk
        .is_file()
        .then(|| candidate.to_string_lossy().into_owned())
}

pub fn distribute_page_citations(builds: &mut [PageBuild], refs: &[String], notes: &[String]) {
    let mut ref_pool = refs.to_vec();
    let mut note_pool = notes.to_vec();
    for build in builds.iter_mut() {
        ref_pool = distribute_refs(&mut build.items, &ref_pool, CitationList::Refs);
        note_pool = distribute_refs(&mut build.items, &note_pool, CitationList::Notes);
        build.refs = build.items.iter().flat_map(|item| item.refs.clone()).collect();
        build.notes = build
            .items
            .iter()
            .flat_map(|item| item.notes.clone())
            .collect();
    }
    if let Some(last) = builds.last_mut() {
        last.refs.extend(ref_pool);
        last.notes.extend(note_pool);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageFrame<'a> {
    pub state: &'a PageLayoutState,
    pub header: &'a HeaderPlacement,
    pub show_titles: bool,
    pub include_intro: bool,
}

pub struct PageAssembler<'a> {
    page: &'a ContentPage,
    banner: String,
    banner_cont: String,
}

impl<'a> PageAssembler<'a> {
    pub fn new(page: &'a ContentPage, base_dir: Option<&Path>) -> Self {
        let (banner, banner_cont) = resolve_banners(page, base_dir);
        Self {
            page,
            banner,
            banner_cont,
        }
    }

    pub fn assemble(&self, build: PageBuild, frame: PageFrame<'_>) -> OutputPage {
        let page = self.page;
        let header = frame.header;
        let blocks = build.items.into_iter().map(|item| item.block).collect();
        OutputPage {
            header_banner_path: self.banner.clone(),
            header_banner_path_cont: self.banner_cont.clone(),
            header_logo_path: page.header_logo_path.clone(),
            title_line1: page.title_line1.clone(),
            title_line2: page.title_line2.clone(),
            intro: if frame.include_intro {
                page.intro.clone()
            } else {
                String::new()
            },
            blocks,
            refs: build.refs,
            footer_notes: build.notes,
            page_number: String::new(),
            footer_site: page.footer_site.clone(),
            footer_phone: page.footer_phone.clone(),
            intro_top: frame.state.intro_top.to_f64(),
            content_top: frame.state.content_top.to_f64(),
            content_height: build.ceiling.to_f64(),
            header_title_top: header.title_top.to_f64(),
            header_subtitle_top: header.subtitle_top.to_f64(),
            header_title_left: header.title_box.left.to_f64(),
            header_title_width: header.title_box.width.to_f64(),
            header_title_align: header.title_box.align,
            header_subtitle_left: header.subtitle_box.left.to_f64(),
            header_subtitle_width: header.subtitle_box.width.to_f64(),
            header_subtitle_align: header.subtitle_box.align,
            show_header_titles: frame.show_titles,
            footer_meta_bottom: frame.state.footer_meta_bottom.to_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TextBox;
    use crate::normalize::BlockItem;
    use crate::types::Pt;
    use folio_page_contract::{ContentBlock, TextAlign};
    use std::fs;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn item(html: &str, refs: &[&str]) -> BlockItem {
        BlockItem {
            block: ContentBlock::html(html),
            height: Pt::from_i32(20),
            keep_with_next: false,
            refs: strings(refs),
            notes: Vec::new(),
            markers: crate::refs::superscript_numbers(html),
        }
    }

    fn build(items: Vec<BlockItem>) -> PageBuild {
        PageBuild {
            height: items.iter().map(|item| item.height).sum(),
            ceiling: Pt::from_i32(494),
            refs: Vec::new(),
            notes: Vec::new(),
            forced_overflow: false,
            items,
        }
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("folio-assemble-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    #[test]
    fn page_refs_land_where_they_are_cited() {
        let mut builds = vec![
            build(vec![item("<p>a<sup>1</sup></p>", &[])]),
            build(vec![item("<p>b<sup>2</sup></p>", &["0 Propia"])]),
        ];
        distribute_page_citations(&mut builds, &strings(&["1 SourceA", "2 SourceB", "Suelta"]), &[]);
        assert_eq!(builds[0].refs, strings(&["1 SourceA"]));
        assert_eq!(builds[1].refs, strings(&["0 Propia", "2 SourceB", "Suelta"]));
    }

    #[test]
    fn notes_follow_the_same_rule() {
        let mut builds = vec![
            build(vec![item("<p>a</p>", &[])]),
            build(vec![item("<p>b<sup>3</sup></p>", &[])]),
        ];
        distribute_page_citations(&mut builds, &[], &strings(&["3 Nota", "Otra"]));
        assert!(builds[0].notes.is_empty());
        assert_eq!(builds[1].notes, strings(&["3 Nota", "Otra"]));
    }

    #[test]
    fn explicit_continuation_banner_wins_everywhere() {
        let page = ContentPage {
            header_banner_path: "banner.png".to_string(),
            header_banner_path_cont: Some("plain.png".to_string()),
            ..ContentPage::default()
        };
        let (primary, cont) = resolve_banners(&page, None);
        assert_eq!(primary, "plain.png");
        assert_eq!(cont, "plain.png");
    }

    #[test]
    fn clean_sibling_is_found_relative_to_base_dir() {
        let dir = scratch_dir("clean");
        fs::write(dir.join("banner-clean.png"), b"png").expect("write banner");
        let page = ContentPage {
            header_banner_path: "banner.png".to_string(),
            ..ContentPage::default()
        };
        let (primary, cont) = resolve_banners(&page, Some(&dir));
        assert_eq!(cont, "banner-clean.png");
        assert_eq!(primary, "banner-clean.png");
        let (primary, cont) = resolve_banners(&page, None);
        assert_eq!((primary.as_str(), cont.as_str()), ("banner.png", "banner.png"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn assembled_page_carries_geometry_and_drops_block_refs() {
        let page = ContentPage {
            title_line1: "Boletin".to_string(),
            intro: "Resumen".to_string(),
            footer_site: "www.example.org".to_string(),
            ..ContentPage::default()
        };
        let state = PageLayoutState {
            intro_top: Pt::from_f32(137.4),
            content_top: Pt::from_i32(150),
            ceiling_base: Pt::from_i32(494),
            ceiling_meta: Pt::from_i32(494),
            reserved_base: Pt::from_i32(142),
            footer_meta_bottom: Pt::from_i32(70),
            clamped_from: None,
        };
        let text_box = TextBox {
            left: Pt::from_f32(94.7),
            width: Pt::from_i32(430),
            align: TextAlign::Left,
        };
        let header = HeaderPlacement {
            title_top: Pt::from_i32(100),
            subtitle_top: Pt::from_f32(116.7),
            bottom: Pt::from_f32(131.4),
            title_box: text_box,
            subtitle_box: text_box,
            multi_line: false,
        };
        let mut fitted = build(vec![item("<p>a<sup>1</sup></p>", &["1 Fuente"])]);
        distribute_page_citations(std::slice::from_mut(&mut fitted), &[], &[]);
        let assembler = PageAssembler::new(&page, None);
        let frame = PageFrame {
            state: &state,
            header: &header,
            show_titles: true,
            include_intro: false,
        };
        let out = assembler.assemble(fitted, frame);
        assert_eq!(out.intro, "");
        assert_eq!(out.refs, strings(&["1 Fuente"]));
        assert_eq!(out.content_height, 494.0);
        assert_eq!(out.intro_top, 137.4);
        assert_eq!(out.header_title_align, TextAlign::Left);
        assert!(out.show_header_titles);
        let value = out.to_value();
        assert!(value["blocks"][0].get("refs").is_none());
        assert_eq!(value["footer_site"], "www.example.org");
    }
}
