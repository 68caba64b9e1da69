use crate::normalize::BlockItem;

pub use crate::html::superscript_numbers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationList {
    Refs,
    Notes,
}

impl CitationList {
    pub fn of(self, item: &BlockItem) -> &Vec<String> {
        match self {
            CitationList::Refs => &item.refs,
            CitationList::Notes => &item.notes,
        }
    }

    pub fn of_mut(self, item: &mut BlockItem) -> &mut Vec<String> {
        match self {
            CitationList::Refs => &mut item.refs,
            CitationList::Notes => &mut item.notes,
        }
    }
}

pub fn leading_ref_number(entry: &str) -> Option<&str> {
    let trimmed = entry.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    if end == 0 { None } else { Some(&trimmed[..end]) }
}

pub fn claiming_block(blocks: &[BlockItem], entry: &str) -> Option<usize> {
    let number = leading_ref_number(entry)?;
    blocks
        .iter()
        .position(|block| block.markers.iter().any(|marker| marker == number))
}

pub fn distribute_refs(
    blocks: &mut [BlockItem],
    pool: &[String],
    list: CitationList,
) -> Vec<String> {
    let mut unassigned = Vec::new();
    for entry in pool {
        match claiming_block(blocks, entry) {
            Some(idx) => list.of_mut(&mut blocks[idx]).push(entry.clone()),
            None => unassigned.push(entry.clone()),
        }
    }
    unassigned
}

pub fn redistribute_block_refs(blocks: &mut [BlockItem]) {
    for list in [CitationList::Refs, CitationList::Notes] {
        let Some(last_holder) = blocks.iter().rposition(|block| !list.of(block).is_empty()) else {
            continue;
        };
        let mut pool = Vec::new();
        for block in blocks.iter_mut() {
            pool.append(list.of_mut(block));
        }
        let unassigned = distribute_refs(blocks, &pool, list);
        list.of_mut(&mut blocks[last_holder]).extend(unassigned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pt;
    use folio_page_contract::ContentBlock;

    fn item(html: &str, refs: &[&str]) -> BlockItem {
        BlockItem {
            block: ContentBlock::html(html),
            height: Pt::from_i32(10),
            keep_with_next: false,
            refs: refs.iter().map(|entry| entry.to_string()).collect(),
            notes: Vec::new(),
            markers: superscript_numbers(html),
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn leading_number_skips_whitespace() {
        assert_eq!(leading_ref_number("  12 Fuente"), Some("12"));
        assert_eq!(leading_ref_number("3. WFP"), Some("3"));
        assert_eq!(leading_ref_number("Fuente 4"), None);
        assert_eq!(leading_ref_number(""), None);
    }

    #[test]
    fn distributes_to_citing_block_after_existing_refs() {
        let mut blocks = vec![
            item("<p>Uno<sup>1</sup></p>", &["0 Previa"]),
            item("<p>Dos<sup>2</sup> y<sup>3</sup></p>", &[]),
        ];
        let pool = strings(&["2 B", "1 A", "Sin numero", "9 Nadie", "3 C"]);
        let unassigned = distribute_refs(&mut blocks, &pool, CitationList::Refs);
        assert_eq!(blocks[0].refs, strings(&["0 Previa", "1 A"]));
        assert_eq!(blocks[1].refs, strings(&["2 B", "3 C"]));
        assert_eq!(unassigned, strings(&["Sin numero", "9 Nadie"]));
    }

    #[test]
    fn redistribution_moves_refs_to_their_markers() {
        let mut blocks = vec![
            item("<div class=\"section-title\">I</div>", &["1 A", "2 B", "x"]),
            item("<p>a<sup>2</sup></p>", &[]),
            item("<p>b<sup>1</sup></p>", &["7 Huerfana"]),
            item("<p>c</p>", &[]),
        ];
        redistribute_block_refs(&mut blocks);
        assert!(blocks[0].refs.is_empty());
        assert_eq!(blocks[1].refs, strings(&["2 B"]));
        assert_eq!(
            blocks[2].refs,
            strings(&["1 A", "x", "7 Huerfana"]),
            "unmatched refs go to the last block that held refs"
        );
        assert!(blocks[3].refs.is_empty());
    }

    #[test]
    fn redistribution_without_refs_is_a_no_op() {
        let mut blocks = vec![item("<p>a<sup>1</sup></p>", &[])];
        redistribute_block_refs(&mut blocks);
        assert!(blocks[0].refs.is_empty());
    }
}
