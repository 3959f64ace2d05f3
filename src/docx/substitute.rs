use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::mapping::ReplacementMap;

use super::xml::{XmlEvent, XmlPart};

static BRACKET_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\[\]\r\n]+\]").expect("bracket token"));

#[derive(Debug, Default)]
pub struct SubstitutionReport {
    pub replaced_paragraphs: usize,
    /// Distinct bracketed tokens still present in table cells afterwards.
    /// Informational only; a template token outside the catalog is not an
    /// error.
    pub unresolved: Vec<String>,
}

struct TextNode {
    elem_index: usize,
    text_index: usize,
}

struct CellParagraph {
    nodes: Vec<TextNode>,
    surface: String,
}

/// Applies a replacement map to every paragraph inside table cells of a
/// freshly parsed document part. Body paragraphs outside tables are not
/// scanned; the templates keep all fillable content in tables.
///
/// Each paragraph's `w:t` nodes are concatenated before matching, because a
/// placeholder may be split across run boundaries. Keys are applied longest
/// first so a key that is a prefix of another can never corrupt the longer
/// match. A modified paragraph has its entire final text written into the
/// first text node and every other text node cleared; formatting of the
/// later runs is lost. That collapse is the documented trade-off for robust
/// matching, not something to repair here.
pub fn substitute_in_part(part: &mut XmlPart, map: &ReplacementMap) -> SubstitutionReport {
    let paragraphs = collect_cell_paragraphs(part);

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut report = SubstitutionReport::default();
    let mut unresolved: BTreeSet<String> = BTreeSet::new();

    for paragraph in &paragraphs {
        let mut text = paragraph.surface.clone();
        let mut modified = false;
        for key in &keys {
            if text.contains(key.as_str()) {
                text = text.replace(key.as_str(), &map[*key]);
                modified = true;
            }
        }
        if modified {
            report.replaced_paragraphs += 1;
            collapse_paragraph_text(part, &paragraph.nodes, &text);
        }
        for m in BRACKET_TOKEN_RE.find_iter(&text) {
            unresolved.insert(m.as_str().to_string());
        }
    }

    report.unresolved = unresolved.into_iter().collect();
    report
}

fn collect_cell_paragraphs(part: &XmlPart) -> Vec<CellParagraph> {
    let mut out = Vec::new();
    let mut cell_depth = 0usize;
    let mut current: Option<CellParagraph> = None;
    // Textbox content nests whole paragraphs inside a run; their text belongs
    // to the inner paragraph, not the cell paragraph being captured.
    let mut nested_para_depth = 0usize;
    let mut current_text_elem: Option<usize> = None;

    for (idx, ev) in part.events.iter().enumerate() {
        match ev {
            XmlEvent::Start { name, .. } => match name.as_str() {
                "w:tc" => cell_depth += 1,
                "w:p" => {
                    if current.is_some() {
                        nested_para_depth += 1;
                    } else if cell_depth > 0 {
                        current = Some(CellParagraph {
                            nodes: Vec::new(),
                            surface: String::new(),
                        });
                        nested_para_depth = 0;
                    }
                }
                "w:t" => {
                    if current.is_some() && nested_para_depth == 0 {
                        current_text_elem = Some(idx);
                    }
                }
                _ => {}
            },
            XmlEvent::End { name } => match name.as_str() {
                "w:tc" => cell_depth = cell_depth.saturating_sub(1),
                "w:p" => {
                    if nested_para_depth > 0 {
                        nested_para_depth -= 1;
                    } else if let Some(paragraph) = current.take() {
                        out.push(paragraph);
                    }
                }
                "w:t" => current_text_elem = None,
                _ => {}
            },
            XmlEvent::Text { text } => {
                if let (Some(elem_index), Some(paragraph)) = (current_text_elem, current.as_mut()) {
                    paragraph.nodes.push(TextNode {
                        elem_index,
                        text_index: idx,
                    });
                    paragraph.surface.push_str(text);
                }
            }
            _ => {}
        }
    }
    out
}

fn collapse_paragraph_text(part: &mut XmlPart, nodes: &[TextNode], new_text: &str) {
    let Some((first, rest)) = nodes.split_first() else {
        return;
    };
    if let Some(XmlEvent::Text { text }) = part.events.get_mut(first.text_index) {
        *text = new_text.to_string();
    }
    if new_text.starts_with(' ') || new_text.ends_with(' ') {
        if let Some(ev) = part.events.get_mut(first.elem_index) {
            set_attr_value(ev, "xml:space", "preserve");
        }
    }
    for node in rest {
        if let Some(XmlEvent::Text { text }) = part.events.get_mut(node.text_index) {
            text.clear();
        }
    }
}

fn set_attr_value(ev: &mut XmlEvent, key: &str, value: &str) {
    match ev {
        XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } => {
            for (k, v) in attrs.iter_mut() {
                if k == key {
                    *v = value.to_string();
                    return;
                }
            }
            attrs.push((key.to_string(), value.to_string()));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::docx::xml::{parse_xml_part, verify_structure_unchanged, write_xml_part};
    use crate::mapping::ReplacementMap;

    use super::substitute_in_part;

    fn map_of(pairs: &[(&str, &str)]) -> ReplacementMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn cell_document(paragraph_runs: &str) -> String {
        format!(
            "<w:document><w:body><w:tbl><w:tr><w:tc><w:p>{paragraph_runs}</w:p></w:tc></w:tr></w:tbl></w:body></w:document>"
        )
    }

    #[test]
    fn replaces_token_split_across_runs() {
        let xml = cell_document(
            "<w:r><w:t>[Learner</w:t></w:r><w:r><w:t> Na</w:t></w:r><w:r><w:t>me]</w:t></w:r>",
        );
        let mut part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let report = substitute_in_part(&mut part, &map_of(&[("[Learner Name]", "Jane Doe")]));

        assert_eq!(report.replaced_paragraphs, 1);
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains("<w:t>Jane Doe</w:t>"));
        assert!(out.contains("<w:t></w:t>"));
        assert!(!out.contains("[Learner"));
        verify_structure_unchanged(&part).expect("text-only edit");
    }

    #[test]
    fn body_paragraphs_outside_tables_are_not_scanned() {
        let xml = "<w:document><w:body><w:p><w:r><w:t>[Learner Name]</w:t></w:r></w:p></w:body></w:document>";
        let mut part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let report = substitute_in_part(&mut part, &map_of(&[("[Learner Name]", "Jane Doe")]));

        assert_eq!(report.replaced_paragraphs, 0);
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains("[Learner Name]"));
    }

    #[test]
    fn unknown_token_passes_through_and_is_reported() {
        let xml = cell_document("<w:r><w:t>[Mystery Token]</w:t></w:r>");
        let mut part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let report = substitute_in_part(&mut part, &map_of(&[("[Learner Name]", "Jane Doe")]));

        assert_eq!(report.replaced_paragraphs, 0);
        assert_eq!(report.unresolved, vec!["[Mystery Token]".to_string()]);
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains("[Mystery Token]"));
    }

    #[test]
    fn longer_keys_are_applied_before_their_prefixes() {
        let xml = cell_document("<w:r><w:t>[Foo Bar] and [Foo]</w:t></w:r>");
        let mut part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        substitute_in_part(&mut part, &map_of(&[("[Foo]", "short"), ("[Foo Bar]", "long")]));

        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains("long and short"));
    }

    #[test]
    fn replaces_all_occurrences_in_a_paragraph() {
        let xml = cell_document("<w:r><w:t>[ICA1] [ICA1]</w:t></w:r>");
        let mut part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        substitute_in_part(&mut part, &map_of(&[("[ICA1]", "Y")]));

        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains("<w:t>Y Y</w:t>"));
    }

    #[test]
    fn edge_whitespace_sets_space_preserve() {
        let xml = cell_document("<w:r><w:t>[Learner Name]</w:t></w:r>");
        let mut part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        substitute_in_part(&mut part, &map_of(&[("[Learner Name]", "Jane ")]));

        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains(r#"<w:t xml:space="preserve">Jane </w:t>"#));
        verify_structure_unchanged(&part).expect("xml:space is not structural");
    }

    #[test]
    fn nested_table_cells_are_in_scope() {
        let xml = "<w:document><w:body><w:tbl><w:tr><w:tc><w:tbl><w:tr><w:tc><w:p><w:r><w:t>[ITC1]</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>[ITC2]</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:body></w:document>";
        let mut part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let report =
            substitute_in_part(&mut part, &map_of(&[("[ITC1]", "P1"), ("[ITC2]", "M1")]));

        assert_eq!(report.replaced_paragraphs, 2);
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains("<w:t>P1</w:t>"));
        assert!(out.contains("<w:t>M1</w:t>"));
    }

    #[test]
    fn empty_replacement_clears_the_token() {
        let xml = cell_document("<w:r><w:t>[Retake - Deadline]</w:t></w:r>");
        let mut part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let report = substitute_in_part(&mut part, &map_of(&[("[Retake - Deadline]", "")]));

        assert_eq!(report.replaced_paragraphs, 1);
        assert!(report.unresolved.is_empty());
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(!out.contains("[Retake"));
    }
}
