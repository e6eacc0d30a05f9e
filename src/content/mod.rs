//! Content Assembler
//!
//! Deterministic formatting of section outputs into one markdown document,
//! plus incremental extension of an existing document for progressive
//! persistence.
//!
//! The document is append-only during enrichment: sections are added in
//! canonical order and never rewritten or reordered by the pipeline.
//! `append_section` is deliberately NOT idempotent - appending the same
//! section twice duplicates it. The orchestrator owns the obligation to
//! append each section exactly once per enrichment attempt.

use crate::llm::prompts;
use crate::types::{Section, SectionResult};

/// Stable heading token for a section, unique within the document.
pub fn heading(section: Section) -> &'static str {
    match section {
        Section::BasicMeaning => "### 🎯 词性与基本含义",
        Section::DetailedMeaning => "### 🌟 详细释义",
        Section::UsageExamples => "### ✨ 使用场景与例句",
        Section::Synonyms => "### 🔄 近义词对比",
        Section::Collocations => "### 🎪 常用搭配表达",
    }
}

const MNEMONIC_HEADING: &str = "### 🎬 记忆金句";

fn mnemonic(word: &str) -> String {
    format!("{MNEMONIC_HEADING}\n\"{word}\" - 记住这个单词的关键是理解其核心含义和使用场景")
}

/// Build the one-section document the fast path persists on creation.
pub fn fast_document(word: &str, fast_text: &str) -> String {
    format!(
        "## {word}\n\n{}\n{fast_text}",
        heading(Section::BasicMeaning)
    )
}

/// Return `existing` followed by a newline-delimited heading and `text`.
/// Used for progressive persistence: each completed section is durably
/// appended immediately, so a crash mid-enrichment leaves a partially
/// useful, valid document.
pub fn append_section(existing: &str, section: Section, text: &str) -> String {
    format!("{existing}\n\n{}\n{text}", heading(section))
}

/// Extract the fast-section text from a document, dropping the title line,
/// the basic-meaning heading, and everything from the first deep-section
/// heading on. Best-effort: a document edited by hand outside the pipeline
/// may not contain the expected headings, in which case the whole prefix is
/// returned.
pub fn fast_section_text(document: &str) -> String {
    let mut cut = document.len();
    for section in Section::DEEP {
        if let Some(idx) = document.find(heading(section)) {
            cut = cut.min(idx);
        }
    }
    if let Some(idx) = document.find(MNEMONIC_HEADING) {
        cut = cut.min(idx);
    }

    let head = document[..cut].trim_end();
    let basic = heading(Section::BasicMeaning);
    match head.find(basic) {
        Some(idx) => head[idx + basic.len()..].trim().to_string(),
        None => head.trim().to_string(),
    }
}

/// Assemble the final document from section results supplied in any
/// completion order. Headings always appear in the canonical order
/// basicMeaning → detailedMeaning → usageExamples → synonyms →
/// collocations, followed by the closing mnemonic line. A section missing
/// from `results` gets its canned fallback so the document stays complete.
pub fn assemble_full(word: &str, results: &[SectionResult]) -> String {
    let mut document = format!("## {word}");

    for section in Section::ALL {
        let text = results
            .iter()
            .find(|r| r.section == section)
            .map(|r| r.text.clone())
            .unwrap_or_else(|| prompts::fallback(word, section));
        document.push_str("\n\n");
        document.push_str(heading(section));
        document.push('\n');
        document.push_str(&text);
    }

    document.push_str("\n\n");
    document.push_str(&mnemonic(word));
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result(section: Section, text: &str) -> SectionResult {
        SectionResult {
            section,
            text: text.to_string(),
        }
    }

    fn heading_positions(document: &str) -> Vec<usize> {
        Section::ALL
            .iter()
            .map(|s| document.find(heading(*s)).expect("heading present"))
            .collect()
    }

    #[test]
    fn test_assemble_full_canonical_order_from_scrambled_input() {
        // Results arrive in completion order, not canonical order
        let results = vec![
            result(Section::Collocations, "搭配内容"),
            result(Section::BasicMeaning, "基本含义"),
            result(Section::Synonyms, "近义词内容"),
            result(Section::DetailedMeaning, "详细内容"),
            result(Section::UsageExamples, "例句内容"),
        ];

        let document = assemble_full("run", &results);
        let positions = heading_positions(&document);
        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1], "headings out of canonical order");
        }
        // Mnemonic closes the document
        let mnemonic_pos = document.find(MNEMONIC_HEADING).expect("mnemonic present");
        assert!(mnemonic_pos > *positions.last().expect("positions"));
        assert!(document.contains("\"run\""));
    }

    #[test]
    fn test_assemble_full_missing_section_uses_fallback() {
        let results = vec![
            result(Section::BasicMeaning, "基本含义"),
            result(Section::DetailedMeaning, "详细内容"),
            result(Section::UsageExamples, "例句内容"),
            result(Section::Collocations, "搭配内容"),
        ];

        let document = assemble_full("apple", &results);
        assert!(document.contains(&prompts::fallback("apple", Section::Synonyms)));
    }

    #[test]
    fn test_append_section_is_not_idempotent() {
        let base = fast_document("run", "基本含义");
        let once = append_section(&base, Section::Synonyms, "近义词");
        let twice = append_section(&once, Section::Synonyms, "近义词");
        assert_eq!(once.matches(heading(Section::Synonyms)).count(), 1);
        assert_eq!(twice.matches(heading(Section::Synonyms)).count(), 2);
    }

    #[test]
    fn test_fast_section_text_round_trip() {
        let document = fast_document("run", "**含义：** 跑步");
        assert_eq!(fast_section_text(&document), "**含义：** 跑步");
    }

    #[test]
    fn test_fast_section_text_ignores_appended_sections() {
        let mut document = fast_document("run", "**含义：** 跑步");
        document = append_section(&document, Section::DetailedMeaning, "详细");
        document = append_section(&document, Section::Synonyms, "近义词");
        assert_eq!(fast_section_text(&document), "**含义：** 跑步");
    }

    #[test]
    fn test_fast_section_text_from_hand_edited_document() {
        // No recognized headings at all: the whole text is the baseline
        assert_eq!(fast_section_text("my own notes"), "my own notes");
    }

    #[test]
    fn test_fast_section_text_from_finalized_document() {
        let results: Vec<SectionResult> = Section::ALL
            .iter()
            .map(|s| result(*s, &format!("{s} 内容")))
            .collect();
        let document = assemble_full("run", &results);
        assert_eq!(fast_section_text(&document), "basicMeaning 内容");
    }

    proptest! {
        /// Canonical heading order holds for arbitrary section content.
        #[test]
        fn prop_assemble_order_independent_of_content(
            texts in proptest::collection::vec("[^#]{0,60}", 5)
        ) {
            let results: Vec<SectionResult> = Section::ALL
                .iter()
                .rev() // supply in reverse completion order
                .zip(texts.iter())
                .map(|(s, t)| result(*s, t))
                .collect();

            let document = assemble_full("word", &results);
            let positions = heading_positions(&document);
            for pair in positions.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}
