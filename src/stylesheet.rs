use crate::error::FolioError;
use crate::estimate::TextRole;
use crate::types::Pt;
use lightningcss::properties::Property;
use lightningcss::properties::font::{AbsoluteFontSize, FontSize, LineHeight};
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::traits::ToCss;
use lightningcss::values::length::{LengthPercentage, LengthPercentageOrAuto, LengthValue};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHeightSpec {
    Multiplier(f32),
    Absolute(Pt),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredText {
    pub font_size: Option<Pt>,
    pub line_height: Option<LineHeightSpec>,
    pub margin_bottom: Option<Pt>,
}

impl DeclaredText {
    fn merge(&mut self, later: &DeclaredText) {
        if later.font_size.is_some() {
            self.font_size = later.font_size;
        }
        if later.line_height.is_some() {
            self.line_height = later.line_height;
        }
        if later.margin_bottom.is_some() {
            self.margin_bottom = later.margin_bottom;
        }
    }

    fn is_empty(&self) -> bool {
        self.font_size.is_none() && self.line_height.is_none() && self.margin_bottom.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StylesheetMetrics {
    roles: HashMap<TextRole, DeclaredText>,
}

impl StylesheetMetrics {
    pub fn parse(css: &str) -> Result<Self, FolioError> {
        let mut metrics = StylesheetMetrics::default();
        if css.trim().is_empty() {
            return Ok(metrics);
        }
        let sheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|err| FolioError::Stylesheet(err.to_string()))?;
        for rule in &sheet.rules.0 {
            let CssRule::Style(style) = rule else {
                continue;
            };
            let mut declared = DeclaredText::default();
            for property in style
                .declarations
                .declarations
                .iter()
                .chain(style.declarations.important_declarations.iter())
            {
                apply_property(property, &mut declared);
            }
            if declared.is_empty() {
                continue;
            }
            let selectors = style
                .selectors
                .to_css_string(PrinterOptions::default())
                .unwrap_or_default();
            for selector in selectors.split(',') {
                if let Some(role) = role_for_selector(selector.trim()) {
                    metrics.roles.entry(role).or_default().merge(&declared);
                }
            }
        }
        Ok(metrics)
    }

    pub fn get(&self, role: TextRole) -> Option<&DeclaredText> {
        self.roles.get(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

fn role_for_selector(selector: &str) -> Option<TextRole> {
    match selector {
        ".intro" => Some(TextRole::Intro),
        ".header-title" => Some(TextRole::HeaderTitle),
        ".header-subtitle" => Some(TextRole::HeaderSubtitle),
        ".content" | "p" | ".content p" => Some(TextRole::Body),
        ".section-title" | ".section-title-serif" => Some(TextRole::SectionTitle),
        ".section-subtitle" => Some(TextRole::SectionSubtitle),
        ".refs-text" => Some(TextRole::Refs),
        ".footer-notes" => Some(TextRole::Notes),
        _ => None,
    }
}

fn apply_property(property: &Property<'_>, declared: &mut DeclaredText) {
    match property {
        Property::FontSize(size) => {
            if let Some(pt) = font_size_pt(size) {
                declared.font_size = Some(pt);
            }
        }
        Property::LineHeight(line_height) => {
            if let Some(spec) = line_height_spec(line_height) {
                declared.line_height = Some(spec);
            }
        }
        Property::MarginBottom(value) => {
            if let Some(pt) = lpa_to_pt(value) {
                declared.margin_bottom = Some(pt);
            }
        }
        Property::Margin(value) => {
            if let Some(pt) = lpa_to_pt(&value.bottom) {
                declared.margin_bottom = Some(pt);
            }
        }
        _ => {}
    }
}

fn font_size_pt(value: &FontSize) -> Option<Pt> {
    match value {
        FontSize::Length(LengthPercentage::Dimension(length)) => length_value_to_pt(length),
        FontSize::Absolute(size) => Some(absolute_font_size(*size)),
        _ => None,
    }
}

fn line_height_spec(value: &LineHeight) -> Option<LineHeightSpec> {
    match value {
        LineHeight::Normal => Some(LineHeightSpec::Multiplier(1.2)),
        LineHeight::Number(value) => Some(LineHeightSpec::Multiplier(*value)),
        LineHeight::Length(LengthPercentage::Percentage(pct)) => {
            Some(LineHeightSpec::Multiplier(pct.0))
        }
        LineHeight::Length(LengthPercentage::Dimension(length)) => match length {
            LengthValue::Em(val) => Some(LineHeightSpec::Multiplier(*val)),
            _ => length_value_to_pt(length).map(LineHeightSpec::Absolute),
        },
        LineHeight::Length(_) => None,
    }
}

fn lpa_to_pt(value: &LengthPercentageOrAuto) -> Option<Pt> {
    match value {
        LengthPercentageOrAuto::LengthPercentage(LengthPercentage::Dimension(length)) => {
            length_value_to_pt(length)
        }
        _ => None,
    }
}

fn length_value_to_pt(value: &LengthValue) -> Option<Pt> {
    value.to_px().map(|px| Pt::from_css_px(px as f64))
}

fn absolute_font_size(size: AbsoluteFontSize) -> Pt {
    let px = match size {
        AbsoluteFontSize::XXSmall => 9.0,
        AbsoluteFontSize::XSmall => 10.0,
        AbsoluteFontSize::Small => 13.0,
        AbsoluteFontSize::Medium => 16.0,
        AbsoluteFontSize::Large => 18.0,
        AbsoluteFontSize::XLarge => 24.0,
        AbsoluteFontSize::XXLarge => 32.0,
        AbsoluteFontSize::XXXLarge => 40.0,
    };
    Pt::from_css_px(px)
}
