use crate::estimate::TextRole;
use crate::layout_config::LayoutConfig;
use crate::measure::Measurer;
use crate::types::Pt;
use folio_page_contract::{ContentPage, TextAlign};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub left: Pt,
    pub width: Pt,
    pub align: TextAlign,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderPlacement {
    pub title_top: Pt,
    pub subtitle_top: Pt,
    pub bottom: Pt,
    pub title_box: TextBox,
    pub subtitle_box: TextBox,
    pub multi_line: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayoutState {
    pub intro_top: Pt,
    pub content_top: Pt,
    pub ceiling_base: Pt,
    pub ceiling_meta: Pt,
    pub reserved_base: Pt,
    pub footer_meta_bottom: Pt,
    pub clamped_from: Option<Pt>,
}

impl PageLayoutState {
    pub fn min_ceiling(&self) -> Pt {
        self.ceiling_base.min(self.ceiling_meta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVariant {
    First,
    Continuation,
}

pub struct GeometryResolver<'a> {
    layout: &'a LayoutConfig,
    single_line_title: Pt,
}

impl<'a> GeometryResolver<'a> {
    pub fn new(layout: &'a LayoutConfig, measurer: &mut Measurer) -> Self {
        let single_line_title = measurer.measure_text("X", TextRole::HeaderTitle);
        Self {
            layout,
            single_line_title,
        }
    }

    pub fn header_placement(
        &self,
        measurer: &mut Measurer,
        page: &ContentPage,
        show_titles: bool,
    ) -> HeaderPlacement {
        let layout = self.layout;
        let (title, subtitle) = if show_titles {
            (page.title_line1.as_str(), page.title_line2.as_str())
        } else {
            ("", "")
        };
        let title_height = measurer.measure_text(title, TextRole::HeaderTitle);
        let subtitle_height = measurer.measure_text(subtitle, TextRole::HeaderSubtitle);

        let title_top = layout.header_title_top.max(layout.header_title_min_top);
        let subtitle_top = layout
            .header_subtitle_top
            .max(title_top + title_height + layout.header_subtitle_gap);

        let multi_line = title_height > self.single_line_title * 1.15;
        let (title_box, subtitle_box) = if multi_line {
            let centered = TextBox {
                left: layout.content_left,
                width: layout.content_width,
                align: TextAlign::Center,
            };
            (centered, centered)
        } else {
            (
                TextBox {
                    left: layout.header_title_left,
                    width: layout.header_title_width,
                    align: TextAlign::Left,
                },
                TextBox {
                    left: layout.header_subtitle_left,
                    width: layout.header_subtitle_width,
                    align: TextAlign::Left,
                },
            )
        };

        let bottom = layout
            .header_banner_height
            .max(layout.header_logo_top + layout.header_logo_height)
            .max(title_top + title_height)
            .max(subtitle_top + subtitle_height);

        HeaderPlacement {
            title_top,
            subtitle_top,
            bottom,
            title_box,
            subtitle_box,
            multi_line,
        }
    }

    pub fn layout_state(
        &self,
        measurer: &mut Measurer,
        page: &ContentPage,
        header_bottom: Pt,
        variant: PageVariant,
    ) -> PageLayoutState {
        let layout = self.layout;
        let intro = match variant {
            PageVariant::First => page.intro.as_str(),
            PageVariant::Continuation => "",
        };
        let intro_top = layout.default_intro_top.max(header_bottom + layout.header_gap);
        let min_top = match variant {
            PageVariant::First => layout.default_content_top,
            PageVariant::Continuation => layout.continuation_content_top,
        };
        let content_top = if intro.is_empty() {
            min_top.max(header_bottom + layout.header_gap)
        } else {
            let intro_height = measurer.measure_text(intro, TextRole::Intro);
            min_top.max(intro_top + intro_height + layout.intro_gap)
        };

        let contact = measurer.measure_footer_contact(&page.footer_site, &page.footer_phone);
        let stamp = measurer.measure_page_stamp(&page.page_number);
        let meta = measurer.measure_footer_meta(&page.refs, &page.footer_notes);

        let reserved_base = (layout.footer_contact_bottom + contact)
            .max(layout.footer_page_bottom + stamp);
        let footer_meta_bottom = layout
            .footer_meta_bottom
            .max(layout.footer_contact_bottom + contact + layout.footer_meta_gap);
        let reserved_meta = reserved_base.max(footer_meta_bottom + meta);

        let ceiling_base = self.ceiling_for(content_top, reserved_base);
        let ceiling_meta = self.ceiling_for(content_top, reserved_meta);
        let clamped_from = (ceiling_meta < layout.min_content_height).then_some(ceiling_meta);

        PageLayoutState {
            intro_top,
            content_top,
            ceiling_base: ceiling_base.max(layout.min_content_height),
            ceiling_meta: ceiling_meta.max(layout.min_content_height),
            reserved_base,
            footer_meta_bottom,
            clamped_from,
        }
    }

    // Returns the ceiling and, when it was raised to the minimum content
    // height, the computed value.
    pub fn content_height_with_meta(
        &self,
        measurer: &mut Measurer,
        state: &PageLayoutState,
        refs: &[String],
        notes: &[String],
    ) -> (Pt, Option<Pt>) {
        if refs.is_empty() && notes.is_empty() {
            return (state.ceiling_base, None);
        }
        let meta = measurer.measure_footer_meta(refs, notes);
        let reserved = state.reserved_base.max(state.footer_meta_bottom + meta);
        let computed = self.ceiling_for(state.content_top, reserved);
        let minimum = self.layout.min_content_height;
        (computed.max(minimum), (computed < minimum).then_some(computed))
    }


    fn ceiling_for(&self, content_top: Pt, reserved: Pt) -> Pt {
        self.layout.page_height() - content_top - reserved - self.layout.safety_pad
    }
}
