use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

const KEEP_WITH_NEXT_SELECTOR: &str = ".section-title, .section-title-serif, .section-subtitle";
const SPLIT_CLOSE_TAGS: [&str; 9] = ["p", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6"];
const BLOCK_TAGS: [&str; 19] = [
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "table", "tr", "blockquote",
    "section", "figure", "figcaption", "caption", "header",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Body,
    SectionTitle,
    SectionSubtitle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentPiece {
    Text { kind: RunKind, text: String },
    BlockEnd { kind: RunKind },
    Image { src: String },
}

pub fn superscript_numbers(html: &str) -> Vec<String> {
    if !html.contains("<sup") && !html.contains("<SUP") {
        return Vec::new();
    }
    let document = kuchiki::parse_html().one(html);
    let mut out = Vec::new();
    if let Ok(sups) = document.select("sup") {
        for sup in sups {
            let text = sup.as_node().text_contents();
            let text = text.trim();
            if !text.is_empty() && text.chars().all(|ch| ch.is_ascii_digit()) {
                out.push(text.to_string());
            }
        }
    }
    out
}

pub fn has_keep_with_next_marker(html: &str) -> bool {
    let lowered = html.to_ascii_lowercase();
    if !lowered.contains("section-title") && !lowered.contains("section-subtitle") {
        return false;
    }
    let document = kuchiki::parse_html().one(html);
    document
        .select(KEEP_WITH_NEXT_SELECTOR)
        .map(|mut matches| matches.next().is_some())
        .unwrap_or(false)
}

pub fn fragment_pieces(html: &str) -> Vec<FragmentPiece> {
    let document = kuchiki::parse_html().one(html);
    let mut walker = PieceWalker::default();
    walker.visit(&document, RunKind::Body);
    walker.flush(RunKind::Body);
    walker.pieces
}

#[derive(Default)]
struct PieceWalker {
    pieces: Vec<FragmentPiece>,
    buffer: String,
}

impl PieceWalker {
    fn flush(&mut self, kind: RunKind) -> bool {
        let text = collapse_whitespace(&self.buffer);
        self.buffer.clear();
        if text.is_empty() {
            return false;
        }
        self.pieces.push(FragmentPiece::Text { kind, text });
        true
    }

    fn visit(&mut self, node: &NodeRef, kind: RunKind) {
        match node.data() {
            NodeData::Text(text) => self.buffer.push_str(&text.borrow()),
            NodeData::Element(element) => {
                let tag = element.name.local.as_ref().to_ascii_lowercase();
                match tag.as_str() {
                    "script" | "style" | "head" => return,
                    "br" => {
                        if !self.flush(kind) {
                            self.pieces.push(FragmentPiece::Text {
                                kind,
                                text: String::new(),
                            });
                        }
                        return;
                    }
                    "img" => {
                        self.flush(kind);
                        let src = element
                            .attributes
                            .borrow()
                            .get("src")
                            .unwrap_or("")
                            .to_string();
                        self.pieces.push(FragmentPiece::Image { src });
                        return;
                    }
                    _ => {}
                }
                if !BLOCK_TAGS.contains(&tag.as_str()) {
                    for child in node.children() {
                        self.visit(&child, kind);
                    }
                    return;
                }
                self.flush(kind);
                let class = element
                    .attributes
                    .borrow()
                    .get("class")
                    .unwrap_or("")
                    .to_string();
                let inner = block_kind(&tag, &class).unwrap_or(kind);
                let before = self.pieces.len();
                for child in node.children() {
                    self.visit(&child, inner);
                }
                self.flush(inner);
                let produced_text = self.pieces[before..]
                    .iter()
                    .any(|piece| matches!(piece, FragmentPiece::Text { .. }));
                if produced_text {
                    self.pieces.push(FragmentPiece::BlockEnd { kind: inner });
                }
            }
            _ => {
                for child in node.children() {
                    self.visit(&child, kind);
                }
            }
        }
    }
}

fn block_kind(tag: &str, class: &str) -> Option<RunKind> {
    let mut classes = class.split_whitespace();
    if classes.clone().any(|c| c == "section-subtitle") {
        return Some(RunKind::SectionSubtitle);
    }
    if classes.any(|c| c == "section-title" || c == "section-title-serif") {
        return Some(RunKind::SectionTitle);
    }
    if matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
        return Some(RunKind::SectionTitle);
    }
    None
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Block close tags first, then `<br>`, then sentences of a single element.
pub fn split_fragments(html: &str) -> Vec<String> {
    let lowered = html.to_ascii_lowercase();
    for tag in SPLIT_CLOSE_TAGS {
        let close = format!("</{tag}>");
        if !lowered.contains(&close) {
            continue;
        }
        let mut chunks = Vec::new();
        let mut start = 0;
        for (pos, _) in lowered.match_indices(&close) {
            let end = pos + close.len();
            let piece = &html[start..end];
            if !piece.trim().is_empty() {
                chunks.push(piece.to_string());
            }
            start = end;
        }
        let rest = &html[start..];
        if !rest.trim().is_empty() {
            chunks.push(rest.to_string());
        }
        if chunks.len() > 1 {
            return chunks;
        }
    }

    let breaks = br_tag_ends(&lowered);
    if !breaks.is_empty() {
        let mut chunks = Vec::new();
        let mut start = 0;
        for end in breaks {
            chunks.push(html[start..end].to_string());
            start = end;
        }
        let rest = &html[start..];
        if !rest.trim().is_empty() {
            chunks.push(rest.to_string());
        }
        if chunks.len() > 1 {
            return chunks;
        }
    }

    if let Some(sentences) = split_sentences(html) {
        return sentences;
    }
    vec![html.to_string()]
}

fn br_tag_ends(lowered: &str) -> Vec<usize> {
    let bytes = lowered.as_bytes();
    let mut ends = Vec::new();
    for (pos, _) in lowered.match_indices("<br") {
        let mut idx = pos + 3;
        while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
            idx += 1;
        }
        if idx < bytes.len() && bytes[idx] == b'/' {
            idx += 1;
        }
        if idx < bytes.len() && bytes[idx] == b'>' {
            ends.push(idx + 1);
        }
    }
    ends
}

fn split_sentences(html: &str) -> Option<Vec<String>> {
    let trimmed = html.trim();
    if !trimmed.starts_with('<') || trimmed.starts_with("</") {
        return None;
    }
    let open_end = trimmed.find('>')? + 1;
    let open = &trimmed[..open_end];
    let name: String = open[1..]
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric())
        .collect();
    if name.is_empty() {
        return None;
    }
    let close = format!("</{name}>");
    let lowered = trimmed.to_ascii_lowercase();
    if !lowered.ends_with(&close.to_ascii_lowercase()) {
        return None;
    }
    let inner_end = trimmed.len() - close.len();
    if open_end > inner_end {
        return None;
    }
    let inner = &trimmed[open_end..inner_end];
    let lowered_inner = inner.to_ascii_lowercase();
    if lowered_inner.contains(&format!("<{}", name.to_ascii_lowercase())) {
        return None;
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let chars: Vec<(usize, char)> = inner.char_indices().collect();
    for (idx, &(pos, ch)) in chars.iter().enumerate() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            '.' | '?' | '!' if depth == 0 => {
                let next_is_space = chars
                    .get(idx + 1)
                    .map(|&(_, next)| next.is_whitespace())
                    .unwrap_or(false);
                if next_is_space {
                    let end = pos + ch.len_utf8();
                    let sentence = inner[start..end].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence.to_string());
                    }
                    start = end;
                }
            }
            _ => {}
        }
    }
    let rest = inner[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    if sentences.len() < 2 {
        return None;
    }
    Some(
        sentences
            .into_iter()
            .map(|sentence| format!("{open}{sentence}{close}"))
            .collect(),
    )
}

pub fn bracket_ref_ids(html: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |id: String| {
        if !out.contains(&id) {
            out.push(id);
        }
    };
    let mut rest = html;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let body = &after[..close];
        let valid = !body.trim().is_empty()
            && body.chars().all(|ch| {
                ch.is_ascii_digit() || ch.is_whitespace() || matches!(ch, ',' | ';' | '-' | '\u{2013}')
            });
        if valid {
            for part in body.split([',', ';']) {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                match part.split_once(['-', '\u{2013}']) {
                    Some((low, high)) => {
                        let (Ok(low), Ok(high)) =
                            (low.trim().parse::<u32>(), high.trim().parse::<u32>())
                        else {
                            continue;
                        };
                        if low <= high {
                            for id in low..=high {
                                push(id.to_string());
                            }
                        }
                    }
                    None => {
                        if let Ok(id) = part.parse::<u32>() {
                            push(id.to_string());
                        }
                    }
                }
            }
            rest = &after[close + 1..];
        } else {
            rest = after;
        }
    }
    out
}
