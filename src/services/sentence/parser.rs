//! Strict decomposition of the generation service's structured reply.
//!
//! The endpoint is asked for a fixed labeled-section format (see the prompt
//! in the parent module). Parsing is lenient about markdown decoration and
//! dash variants, but strict about presence: a reply that cannot be
//! decomposed into the expected sections is a parse failure for that word,
//! never a record with silently empty fields.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ExampleSentence, GrammarInfo, SentenceRecord};

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(ipa|type|gender|plural|inflections|definition)\s*:\s*(.*)$").unwrap()
});
static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)[.)]\s*(.+)$").unwrap());
static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());

/// Markers the model uses for fields that do not apply to the word's class.
const NOT_APPLICABLE: &[&str] = &[
    "", "-", "–", "n/a", "na", "null", "none", "ingen", "ikke relevant", "not applicable",
];

/// Parse a structured reply into a sentence record.
///
/// Returns `Err` with a reason when a required section is missing: IPA, word
/// type or definition absent, no usable example sentence, or a noun without
/// a gender.
pub fn parse_reply(word: &str, reply: &str) -> Result<SentenceRecord, String> {
    let mut ipa: Option<String> = None;
    let mut word_type: Option<String> = None;
    let mut gender: Option<String> = None;
    let mut plural: Option<String> = None;
    let mut inflections: Option<String> = None;
    let mut definition: Option<String> = None;
    let mut sentences: Vec<ExampleSentence> = Vec::new();

    for raw_line in reply.lines() {
        let line = strip_decoration(raw_line);
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = FIELD_RE.captures(line) {
            let value = clean_value(&captures[2]);
            match captures[1].to_lowercase().as_str() {
                "ipa" => ipa = value,
                "type" => word_type = value.map(|v| v.to_lowercase()),
                "gender" => gender = value,
                "plural" => plural = value,
                "inflections" => inflections = value,
                "definition" => definition = value,
                _ => {}
            }
            continue;
        }

        if let Some(captures) = SENTENCE_RE.captures(line) {
            sentences.push(parse_sentence_line(&captures[2])?);
        }
    }

    let ipa = normalize_ipa(ipa.ok_or_else(|| "missing IPA transcription".to_string())?);
    let word_type = word_type.ok_or_else(|| "missing word type".to_string())?;
    let definition = definition.ok_or_else(|| "missing definition".to_string())?;

    if sentences.is_empty() {
        return Err("no example sentences in reply".to_string());
    }

    let grammar = GrammarInfo {
        ipa,
        word_type,
        gender,
        plural,
        inflections,
        definition,
    };

    // Nouns must carry a gender; for other classes the field is structurally
    // not applicable and stays empty
    if grammar.is_noun() && grammar.gender.is_none() {
        return Err(format!("missing gender for noun '{word}'"));
    }

    Ok(SentenceRecord {
        word: word.to_string(),
        grammar,
        sentences,
    })
}

/// Remove markdown emphasis/heading characters and surrounding whitespace.
fn strip_decoration(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['*', '#', '>'])
        .trim_end_matches('*')
        .trim()
}

/// Normalize a field value; explicit "not applicable" markers become `None`.
/// Emphasis characters survive when the model bolds only the label
/// (`**IPA:** /x/`), so they are trimmed here as well.
fn clean_value(raw: &str) -> Option<String> {
    let cleaned = PAREN_RE.replace_all(raw, "");
    let cleaned = cleaned
        .trim()
        .trim_matches(['[', ']', '*'])
        .trim()
        .to_string();
    if NOT_APPLICABLE.contains(&cleaned.to_lowercase().as_str()) {
        None
    } else {
        Some(cleaned)
    }
}

/// The reply carries IPA in /slashes/ or [brackets]; normalize to slashes.
fn normalize_ipa(value: String) -> String {
    let trimmed = value.trim();
    let inner = trimmed
        .trim_start_matches(['/', '['])
        .trim_end_matches(['/', ']'])
        .trim();
    format!("/{inner}/")
}

/// Split a numbered sentence line into Danish text and English gloss.
fn parse_sentence_line(text: &str) -> Result<ExampleSentence, String> {
    let separators = [" – ", " — ", " - "];
    for separator in separators {
        if let Some(position) = text.find(separator) {
            let danish = strip_brackets(&text[..position]);
            let english = strip_brackets(&text[position + separator.len()..]);
            if danish.is_empty() || english.is_empty() {
                break;
            }
            return Ok(ExampleSentence { danish, english });
        }
    }
    Err(format!("sentence line missing English gloss: '{text}'"))
}

fn strip_brackets(text: &str) -> String {
    text.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOUN_REPLY: &str = r#"**hus**

**Grammar Info:**
IPA: [ˈhuˀs]
Type: Substantiv
Gender: et
Plural: huse
Inflections: huset, huse, husene
Definition: bygning hvor mennesker bor

**Example Sentences:**
1. Jeg bor i et stort hus. - I live in a big house.
2. Huset på hjørnet er gult. - The house on the corner is yellow.
3. Vi købte et hus sidste år. - We bought a house last year.

---"#;

    const VERB_REPLY: &str = r#"**løbe**

Grammar Info:
IPA: /ˈløːbə/
Type: verbum
Gender: -
Plural: n/a
Inflections: løber, løb, løbet
Definition: bevæge sig hurtigt til fods

Example Sentences:
1. Jeg løber hver morgen. - I run every morning."#;

    #[test]
    fn test_parses_complete_noun_reply() {
        let record = parse_reply("hus", NOUN_REPLY).unwrap();
        assert_eq!(record.word, "hus");
        assert_eq!(record.grammar.ipa, "/ˈhuˀs/");
        assert_eq!(record.grammar.word_type, "substantiv");
        assert_eq!(record.grammar.gender.as_deref(), Some("et"));
        assert_eq!(record.grammar.plural.as_deref(), Some("huse"));
        assert_eq!(
            record.grammar.inflections.as_deref(),
            Some("huset, huse, husene")
        );
        assert_eq!(record.grammar.definition, "bygning hvor mennesker bor");
        assert_eq!(record.sentences.len(), 3);
        assert_eq!(record.sentences[0].danish, "Jeg bor i et stort hus.");
        assert_eq!(record.sentences[0].english, "I live in a big house.");
    }

    #[test]
    fn test_verb_fields_marked_not_applicable() {
        let record = parse_reply("løbe", VERB_REPLY).unwrap();
        assert_eq!(record.grammar.word_type, "verbum");
        assert_eq!(record.grammar.gender, None);
        assert_eq!(record.grammar.plural, None);
        assert_eq!(record.sentences.len(), 1);
    }

    #[test]
    fn test_noun_without_gender_is_rejected() {
        let reply = NOUN_REPLY.replace("Gender: et", "Gender: -");
        let err = parse_reply("hus", &reply).unwrap_err();
        assert!(err.contains("gender"), "unexpected reason: {err}");
    }

    #[test]
    fn test_missing_sentences_is_rejected() {
        let reply = r#"IPA: /huˀs/
Type: substantiv
Gender: et
Definition: bygning"#;
        let err = parse_reply("hus", reply).unwrap_err();
        assert!(err.contains("sentences"), "unexpected reason: {err}");
    }

    #[test]
    fn test_missing_ipa_is_rejected() {
        let reply = r#"Type: substantiv
Gender: et
Definition: bygning
1. Jeg bor i et hus. - I live in a house."#;
        assert!(parse_reply("hus", reply).is_err());
    }

    #[test]
    fn test_sentence_without_gloss_is_rejected() {
        let reply = NOUN_REPLY.replace(
            "1. Jeg bor i et stort hus. - I live in a big house.",
            "1. Jeg bor i et stort hus.",
        );
        assert!(parse_reply("hus", &reply).is_err());
    }

    #[test]
    fn test_en_dash_separator_and_brackets() {
        let reply = r#"IPA: /kat/
Type: substantiv
Gender: en
Definition: lille kæledyr
1. [Katten sover.] – [The cat is sleeping.]"#;
        let record = parse_reply("kat", reply).unwrap();
        assert_eq!(record.sentences[0].danish, "Katten sover.");
        assert_eq!(record.sentences[0].english, "The cat is sleeping.");
    }

    #[test]
    fn test_bold_labels_are_tolerated() {
        let reply = r#"**IPA:** /kat/
**Type:** substantiv
**Gender:** en
**Definition:** lille kæledyr
1. Katten sover. - The cat is sleeping."#;
        let record = parse_reply("kat", reply).unwrap();
        assert_eq!(record.grammar.ipa, "/kat/");
        assert_eq!(record.grammar.gender.as_deref(), Some("en"));
    }

    #[test]
    fn test_parenthetical_noise_is_stripped() {
        let reply = r#"IPA: /kat/
Type: substantiv (noun)
Gender: en (common gender)
Definition: lille kæledyr
1. Katten sover. - The cat is sleeping."#;
        let record = parse_reply("kat", reply).unwrap();
        assert_eq!(record.grammar.word_type, "substantiv");
        assert_eq!(record.grammar.gender.as_deref(), Some("en"));
    }
}
