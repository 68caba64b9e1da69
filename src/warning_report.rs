use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningKind {
    OracleFallback,
    GeometryClamped,
    UnplaceableBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutWarning {
    pub kind: WarningKind,
    pub message: String,
    pub page_index: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct WarningReport {
    warnings: Vec<LayoutWarning>,
    fallbacks: BTreeMap<String, usize>,
}

impl WarningReport {
    pub fn push(&mut self, kind: WarningKind, message: impl Into<String>, page_index: Option<usize>) {
        self.warnings.push(LayoutWarning {
            kind,
            message: message.into(),
            page_index,
        });
    }

    pub fn record_fallback(&mut self, probe: &str, count: usize) {
        if count == 0 {
            return;
        }
        let entry = self.fallbacks.entry(probe.to_string()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    pub fn merge(&mut self, other: WarningReport) {
        self.warnings.extend(other.warnings);
        for (probe, count) in other.fallbacks {
            self.record_fallback(&probe, count);
        }
    }

    pub fn warnings(&self) -> Vec<LayoutWarning> {
        let mut out = self.warnings.clone();
        if !self.fallbacks.is_empty() {
            let total: usize = self.fallbacks.values().sum();
            let detail = self
                .fallbacks
                .iter()
                .map(|(probe, count)| format!("{probe}={count}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push(LayoutWarning {
                kind: WarningKind::OracleFallback,
                message: format!("{total} measurements used the analytic estimator ({detail})"),
                page_index: None,
            });
        }
        out
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings().iter().filter(|w| w.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.fallbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallbacks_collapse_into_one_warning() {
        let mut report = WarningReport::default();
        report.record_fallback("html", 3);
        report.record_fallback("table", 2);
        report.record_fallback("html", 1);
        report.push(WarningKind::UnplaceableBlock, "too tall", Some(4));
        let warnings = report.warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(report.count(WarningKind::OracleFallback), 1);
        let fallback = &warnings[1];
        assert!(fallback.message.starts_with("6 measurements"), "{}", fallback.message);
        assert!(fallback.message.contains("html=4"));
    }

    #[test]
    fn zero_fallbacks_leave_report_empty() {
        let mut report = WarningReport::default();
        report.record_fallback("html", 0);
        assert!(report.is_empty());
        assert!(report.warnings().is_empty());
    }
}
