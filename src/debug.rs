use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::types::Pt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    Ceiling,
    KeepWithNext,
    MetaShrink,
    TableSplit,
}

impl BreakReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakReason::Ceiling => "ceiling",
            BreakReason::KeepWithNext => "keep_with_next",
            BreakReason::MetaShrink => "meta_shrink",
            BreakReason::TableSplit => "table_split",
        }
    }
}

#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<Box<dyn Write + Send>>,
    counters: HashMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(writer),
                counters: HashMap::new(),
            })),
        }
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn page_break(
        &self,
        logical_page: usize,
        physical_page: usize,
        reason: BreakReason,
        used: Pt,
        ceiling: Pt,
    ) {
        let json = format!(
            "{{\"type\":\"paginate.page_break\",\"reason\":\"{}\",\"logical_page\":{},\"physical_page\":{},\"used_pt\":{},\"ceiling_pt\":{}}}",
            reason.as_str(),
            logical_page,
            physical_page,
            used.to_f64(),
            ceiling.to_f64()
        );
        self.log_json(&json);
        self.increment(&format!("paginate.page_break.{}", reason.as_str()), 1);
    }

    pub fn forced_overflow(&self, logical_page: usize, physical_page: usize, height: Pt, ceiling: Pt) {
        let json = format!(
            "{{\"type\":\"paginate.forced_overflow\",\"logical_page\":{},\"physical_page\":{},\"height_pt\":{},\"ceiling_pt\":{}}}",
            logical_page,
            physical_page,
            height.to_f64(),
            ceiling.to_f64()
        );
        self.log_json(&json);
        self.increment("paginate.forced_overflow", 1);
    }

    pub fn measure_fallback(&self, probe: &str, reason: &str) {
        let json = format!(
            "{{\"type\":\"measure.fallback\",\"probe\":\"{}\",\"reason\":\"{}\"}}",
            json_escape(probe),
            json_escape(reason)
        );
        self.log_json(&json);
        self.increment("measure.fallback", 1);
    }

    pub fn geometry_clamped(&self, logical_page: usize, computed: Pt, minimum: Pt) {
        let json = format!(
            "{{\"type\":\"geometry.clamped\",\"logical_page\":{},\"computed_pt\":{},\"minimum_pt\":{}}}",
            logical_page,
            computed.to_f64(),
            minimum.to_f64()
        );
        self.log_json(&json);
        self.increment("geometry.clamped", 1);
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let counts_json = if counters.is_empty() {
                "{}".to_string()
            } else {
                let mut out = String::from("{");
                for (idx, (key, value)) in counters.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("\"{}\":{}", json_escape(key), value));
                }
                out.push('}');
                out
            };
            let json = format!(
                "{{\"type\":\"debug.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
