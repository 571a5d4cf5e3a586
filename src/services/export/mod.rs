//! Flattening of parsed sentence records into the fixed Anki import schema.
//!
//! Pure transforms only; the pipeline controller decides where the CSV goes.

use regex::Regex;

use crate::models::{ExportRecord, GrammarInfo, SentenceRecord};
use crate::utils::common::sanitize_filename;

/// Placeholder the user swaps for a real picture inside Anki.
pub const IMAGE_PLACEHOLDER: &str = r#"<image src="myimage.jpg">"#;

/// Shown when a record carries no usable grammar details at all.
pub const GRAMMAR_FALLBACK: &str = "Grammatik info nødvendig";

/// Build export records from successfully parsed sentence records: one row
/// per kept sentence, at most `kept_sentences` per word. The first row of a
/// word carries the extra-card flag.
pub fn build(records: &[&SentenceRecord], kept_sentences: usize) -> Vec<ExportRecord> {
    let mut rows = Vec::new();
    for record in records {
        for (index, sentence) in record.sentences.iter().take(kept_sentences.max(1)).enumerate() {
            let extra_info = format!(
                "{} [sound:{}.mp3]",
                grammar_details(&record.grammar),
                sanitize_filename(&record.word)
            );
            rows.push(ExportRecord {
                front_blank_sentence: blank_out(&sentence.danish, &record.word),
                front_image_placeholder: IMAGE_PLACEHOLDER.to_string(),
                front_definition_info: record.grammar.definition.clone(),
                back_word: record.word.clone(),
                full_sentence: sentence.danish.clone(),
                extra_info_ipa_gender_inflection: extra_info,
                make_extra_card_flag: if index == 0 { "y" } else { "" }.to_string(),
            });
        }
    }
    rows
}

/// Format the extra-info column: IPA, word class, gender and inflections.
/// Fields that are structurally absent for the word's class are left out.
fn grammar_details(grammar: &GrammarInfo) -> String {
    let mut grammar_parts: Vec<String> = Vec::new();
    if !grammar.word_type.is_empty() {
        grammar_parts.push(grammar.word_type.clone());
    }
    if let Some(gender) = &grammar.gender {
        grammar_parts.push(format!("køn: {gender}"));
    }
    if let Some(inflections) = &grammar.inflections {
        grammar_parts.push(format!("bøjning: {inflections}"));
    }

    match (grammar.ipa.is_empty(), grammar_parts.is_empty()) {
        (false, false) => format!("{} – {}", grammar.ipa, grammar_parts.join(", ")),
        (false, true) => grammar.ipa.clone(),
        (true, false) => grammar_parts.join(", "),
        (true, true) => GRAMMAR_FALLBACK.to_string(),
    }
}

/// Replace the word (or a common inflected form of it) in a sentence with a
/// blank. Tries the exact word first, then definite/plural endings, then the
/// Danish double-consonant stems (kat -> katten).
pub fn blank_out(sentence: &str, word: &str) -> String {
    for pattern in inflection_patterns(word) {
        let Ok(re) = Regex::new(&format!(r"(?i)\b{pattern}\b")) else {
            continue;
        };
        if re.is_match(sentence) {
            return re.replace_all(sentence, "___").to_string();
        }
    }
    sentence.to_string()
}

fn inflection_patterns(word: &str) -> Vec<String> {
    let base: String = word.trim().to_lowercase();
    let escaped = regex::escape(&base);
    let mut patterns = vec![escaped.clone()];

    let chars: Vec<char> = base.chars().collect();
    if chars.is_empty() {
        return patterns;
    }

    if base.ends_with('e') {
        // hilse -> hilsen, hilser, hilserne
        let stem: String = chars[..chars.len() - 1].iter().collect();
        let stem = regex::escape(&stem);
        for ending in ["en", "er", "erne"] {
            patterns.push(format!("{stem}{ending}"));
        }
    } else {
        for ending in ["en", "et", "e", "er", "erne"] {
            patterns.push(format!("{escaped}{ending}"));
        }
    }

    let last = chars[chars.len() - 1];
    if chars.len() >= 2 && chars[chars.len() - 2] == last {
        // Word already ends in a double consonant: drop one before endings
        let single: String = chars[..chars.len() - 1].iter().collect();
        let single = regex::escape(&single);
        for ending in ["en", "er", "erne"] {
            patterns.push(format!("{single}{ending}"));
        }
    } else if !"aeiouæøå".contains(last) {
        // kat -> katten, katter, katterne
        let doubled = format!("{base}{last}");
        let doubled = regex::escape(&doubled);
        for ending in ["en", "er", "erne"] {
            patterns.push(format!("{doubled}{ending}"));
        }
    }

    patterns
}

/// Serialize export records as CSV. No header row: the Anki importer maps
/// columns by position.
pub fn serialize_csv(records: &[ExportRecord]) -> String {
    let mut output = String::new();
    for record in records {
        let row: Vec<String> = record
            .columns()
            .iter()
            .map(|field| escape_field(field))
            .collect();
        output.push_str(&row.join(","));
        output.push('\n');
    }
    output
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExampleSentence;

    fn noun_record() -> SentenceRecord {
        SentenceRecord {
            word: "hus".to_string(),
            grammar: GrammarInfo {
                ipa: "/ˈhuˀs/".to_string(),
                word_type: "substantiv".to_string(),
                gender: Some("et".to_string()),
                plural: Some("huse".to_string()),
                inflections: Some("huset, huse, husene".to_string()),
                definition: "bygning hvor mennesker bor".to_string(),
            },
            sentences: vec![
                ExampleSentence {
                    danish: "Jeg bor i et stort hus.".to_string(),
                    english: "I live in a big house.".to_string(),
                },
                ExampleSentence {
                    danish: "Huset på hjørnet er gult.".to_string(),
                    english: "The house on the corner is yellow.".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_one_record_per_kept_sentence() {
        let record = noun_record();
        let rows = build(&[&record], 2);

        assert_eq!(rows.len(), 2);
        // Grammar columns are shared, sentence columns differ
        assert_eq!(
            rows[0].extra_info_ipa_gender_inflection,
            rows[1].extra_info_ipa_gender_inflection
        );
        assert_eq!(rows[0].front_definition_info, rows[1].front_definition_info);
        assert_ne!(rows[0].full_sentence, rows[1].full_sentence);
        assert_eq!(rows[0].make_extra_card_flag, "y");
        assert_eq!(rows[1].make_extra_card_flag, "");
        assert_eq!(rows[0].back_word, "hus");
    }

    #[test]
    fn test_kept_sentences_caps_rows() {
        let record = noun_record();
        let rows = build(&[&record], 1);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_extra_info_contents() {
        let record = noun_record();
        let rows = build(&[&record], 1);
        let extra = &rows[0].extra_info_ipa_gender_inflection;
        assert!(extra.contains("/ˈhuˀs/"));
        assert!(extra.contains("substantiv"));
        assert!(extra.contains("køn: et"));
        assert!(extra.contains("bøjning: huset, huse, husene"));
        assert!(extra.ends_with("[sound:hus.mp3]"));
    }

    #[test]
    fn test_gender_omitted_for_verbs() {
        let mut record = noun_record();
        record.grammar.word_type = "verbum".to_string();
        record.grammar.gender = None;
        record.grammar.plural = None;
        let rows = build(&[&record], 1);
        assert!(!rows[0].extra_info_ipa_gender_inflection.contains("køn"));
    }

    #[test]
    fn test_blank_out_exact_and_inflected_forms() {
        assert_eq!(blank_out("Jeg bor i et hus.", "hus"), "Jeg bor i et ___.");
        // Definite form
        assert_eq!(blank_out("Huset er rødt.", "hus"), "___ er rødt.");
        // Double consonant definite form
        assert_eq!(blank_out("Katten sover.", "kat"), "___ sover.");
        // No match leaves the sentence untouched
        assert_eq!(blank_out("Der er ingen match her.", "hus"), "Der er ingen match her.");
    }

    #[test]
    fn test_csv_serialization_and_quoting() {
        let record = noun_record();
        let rows = build(&[&record], 1);
        let csv = serialize_csv(&rows);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 1);
        // Extra info contains commas, so the field must be quoted
        assert!(lines[0].contains("\"/ˈhuˀs/ – substantiv, køn: et, bøjning: huset, huse, husene [sound:hus.mp3]\""));
    }

    #[test]
    fn test_csv_escapes_embedded_quotes() {
        assert_eq!(escape_field(r#"han sagde "hej""#), r#""han sagde ""hej""""#);
        assert_eq!(escape_field("plain"), "plain");
    }
}
