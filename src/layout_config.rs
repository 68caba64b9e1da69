use crate::error::FolioError;
use crate::types::{Pt, Size};

// Fixed page geometry of the report theme. Every value is in points, measured
// from the top edge of the page unless the name says `bottom`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub page_size: Size,
    pub content_left: Pt,
    pub content_width: Pt,
    pub default_intro_top: Pt,
    pub default_content_top: Pt,
    pub continuation_content_top: Pt,
    pub header_title_top: Pt,
    pub header_subtitle_top: Pt,
    pub header_title_left: Pt,
    pub header_title_width: Pt,
    pub header_subtitle_left: Pt,
    pub header_subtitle_width: Pt,
    pub header_logo_top: Pt,
    pub header_logo_height: Pt,
    pub header_banner_height: Pt,
    pub header_title_min_top: Pt,
    pub footer_contact_bottom: Pt,
    pub footer_page_bottom: Pt,
    pub footer_meta_bottom: Pt,
    pub footer_meta_gap: Pt,
    pub header_gap: Pt,
    pub intro_gap: Pt,
    pub header_subtitle_gap: Pt,
    pub safety_pad: Pt,
    pub min_content_height: Pt,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_size: Size::letter(),
            content_left: Pt::from_f32(85.1),
            content_width: Pt::from_f32(444.0),
            default_intro_top: Pt::from_f32(122.18),
            default_content_top: Pt::from_f32(150.0),
            continuation_content_top: Pt::from_f32(110.0),
            header_title_top: Pt::from_f32(73.7),
            header_subtitle_top: Pt::from_f32(90.77),
            header_title_left: Pt::from_f32(94.7),
            header_title_width: Pt::from_f32(430.0),
            header_subtitle_left: Pt::from_f32(260.8),
            header_subtitle_width: Pt::from_f32(220.0),
            header_logo_top: Pt::from_f32(13.95),
            header_logo_height: Pt::from_f32(36.75),
            header_banner_height: Pt::from_f32(79.5),
            header_title_min_top: Pt::from_f32(100.0),
            footer_contact_bottom: Pt::from_f32(32.0),
            footer_page_bottom: Pt::from_f32(134.0),
            footer_meta_bottom: Pt::from_f32(70.0),
            footer_meta_gap: Pt::from_f32(6.0),
            header_gap: Pt::from_f32(6.0),
            intro_gap: Pt::from_f32(12.0),
            header_subtitle_gap: Pt::from_f32(2.0),
            safety_pad: Pt::from_f32(6.0),
            min_content_height: Pt::from_f32(48.0),
        }
    }
}

impl LayoutConfig {
    pub fn page_height(&self) -> Pt {
        self.page_size.height
    }

    pub fn page_width(&self) -> Pt {
        self.page_size.width
    }

    pub fn validate(&self) -> Result<(), FolioError> {
        if !self.page_width().is_positive() || !self.page_height().is_positive() {
            return Err(FolioError::InvalidConfiguration(
                "page size must be positive".to_string(),
            ));
        }
        if !self.content_width.is_positive() || !self.min_content_height.is_positive() {
            return Err(FolioError::InvalidConfiguration(
                "content width and minimum content height must be positive".to_string(),
            ));
        }
        let offsets = [
            ("content_left", self.content_left),
            ("default_intro_top", self.default_intro_top),
            ("default_content_top", self.default_content_top),
            ("continuation_content_top", self.continuation_content_top),
            ("header_title_top", self.header_title_top),
            ("header_subtitle_top", self.header_subtitle_top),
            ("header_title_left", self.header_title_left),
            ("header_title_width", self.header_title_width),
            ("header_subtitle_left", self.header_subtitle_left),
            ("header_subtitle_width", self.header_subtitle_width),
            ("header_logo_top", self.header_logo_top),
            ("header_logo_height", self.header_logo_height),
            ("header_banner_height", self.header_banner_height),
            ("header_title_min_top", self.header_title_min_top),
            ("footer_contact_bottom", self.footer_contact_bottom),
            ("footer_page_bottom", self.footer_page_bottom),
            ("footer_meta_bottom", self.footer_meta_bottom),
            ("footer_meta_gap", self.footer_meta_gap),
            ("header_gap", self.header_gap),
            ("intro_gap", self.intro_gap),
            ("header_subtitle_gap", self.header_subtitle_gap),
            ("safety_pad", self.safety_pad),
        ];
        for (name, value) in offsets {
            if value < Pt::ZERO {
                return Err(FolioError::InvalidConfiguration(format!(
                    "{name} must not be negative"
                )));
            }
        }
        if self.content_left + self.content_width > self.page_width() {
            return Err(FolioError::InvalidConfiguration(format!(
                "content column ({} + {}) exceeds page width {}",
                self.content_left,
                self.content_width,
                self.page_width()
            )));
        }
        if self.min_content_height >= self.page_height() {
            return Err(FolioError::InvalidConfiguration(
                "minimum content height must be smaller than the page".to_string(),
            ));
        }
        Ok(())
    }

    pub fn template_defaults(&self) -> serde_json::Value {
        serde_json::json!({
            "content_top": self.default_content_top.to_f64(),
            "intro_top": self.default_intro_top.to_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid_letter() {
        let layout = LayoutConfig::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.page_height(), Pt::from_i32(792));
        assert_eq!(layout.template_defaults()["intro_top"], 122.18);
    }

    #[test]
    fn rejects_column_wider_than_page() {
        let layout = LayoutConfig {
            content_width: Pt::from_f32(600.0),
            ..LayoutConfig::default()
        };
        let err = layout.validate().expect_err("column overflows page");
        assert!(
            matches!(err, FolioError::InvalidConfiguration(_)),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_negative_offsets() {
        let layout = LayoutConfig {
            safety_pad: Pt::from_f32(-1.0),
            ..LayoutConfig::default()
        };
        assert!(layout.validate().is_err());
    }
}
