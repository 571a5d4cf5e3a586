// Domain models module
// Core data structures tracked across both pipeline phases.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AudioFailure, SentenceFailure};

/// One unit of work: a single input word tracked through both phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordTask {
    /// Trimmed original input line, case preserved for display.
    pub display: String,
    /// Case-folded dedup key; also the basis of the audio filename.
    pub key: String,
}

impl WordTask {
    pub fn new(line: &str) -> Self {
        let display = line.trim().to_string();
        let key = display.to_lowercase();
        WordTask { display, key }
    }
}

/// Parse the raw input text into tasks. Blank lines are ignored; duplicate
/// words (case-insensitive) are processed once, first occurrence wins for
/// ordering.
pub fn parse_word_list(text: &str) -> Vec<WordTask> {
    let mut tasks: Vec<WordTask> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let task = WordTask::new(line);
        if tasks.iter().any(|t| t.key == task.key) {
            continue;
        }
        tasks.push(task);
    }
    tasks
}

/// Address of a remote audio resource, distinct from the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocator {
    pub url: String,
}

/// Audio container formats the validator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
        }
    }
}

/// A validated audio file written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub format: AudioFormat,
}

/// Terminal per-word outcome of the audio phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AudioOutcome {
    Succeeded(AudioFile),
    Failed {
        reason: AudioFailure,
        /// Network attempts consumed before giving up.
        attempts: u32,
    },
}

impl AudioOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AudioOutcome::Succeeded(_))
    }
}

/// One generated example sentence with its English gloss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub danish: String,
    pub english: String,
}

/// Grammar metadata for a word. `None` means the field is structurally not
/// applicable for the word's class (a verb has no gender), never that a value
/// failed to parse - parse failures fail the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarInfo {
    /// IPA transcription in /slashes/.
    pub ipa: String,
    /// Danish word class: substantiv, verbum, adjektiv, ...
    pub word_type: String,
    /// en/et, nouns only.
    pub gender: Option<String>,
    /// Plural form, nouns only.
    pub plural: Option<String>,
    /// Other declensions/conjugations.
    pub inflections: Option<String>,
    /// Short Danish definition.
    pub definition: String,
}

impl GrammarInfo {
    pub fn is_noun(&self) -> bool {
        let t = self.word_type.to_lowercase();
        t.contains("substantiv") || t.contains("noun")
    }
}

/// Fully parsed result of the sentence phase for one word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub word: String,
    pub grammar: GrammarInfo,
    /// Never empty for a successfully parsed record.
    pub sentences: Vec<ExampleSentence>,
}

/// Terminal per-word outcome of the sentence phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SentenceOutcome {
    Succeeded(SentenceRecord),
    Failed(SentenceFailure),
    /// Excluded by the configured sentence scope.
    Skipped,
}

/// One flat row of the Anki import file. Column order is fixed by the note
/// type and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    pub front_blank_sentence: String,
    pub front_image_placeholder: String,
    pub front_definition_info: String,
    pub back_word: String,
    pub full_sentence: String,
    pub extra_info_ipa_gender_inflection: String,
    pub make_extra_card_flag: String,
}

impl ExportRecord {
    pub fn columns(&self) -> [&str; 7] {
        [
            &self.front_blank_sentence,
            &self.front_image_placeholder,
            &self.front_definition_info,
            &self.back_word,
            &self.full_sentence,
            &self.extra_info_ipa_gender_inflection,
            &self.make_extra_card_flag,
        ]
    }
}

/// Per-word slot in the run report. `None` in a phase column means the word
/// was never attempted in that phase (e.g. the run was cancelled first) -
/// distinct from both success and failure.
#[derive(Debug, Clone, Serialize)]
pub struct WordEntry {
    pub task: WordTask,
    pub audio: Option<AudioOutcome>,
    pub sentence: Option<SentenceOutcome>,
}

/// Aggregate outcome of an entire pipeline invocation. Built incrementally as
/// workers report completion; the single source of truth for the failed-words
/// file and the end-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    entries: Vec<WordEntry>,
}

impl RunReport {
    pub fn new(tasks: &[WordTask]) -> Self {
        RunReport {
            started_at: Utc::now(),
            finished_at: None,
            entries: tasks
                .iter()
                .map(|task| WordEntry {
                    task: task.clone(),
                    audio: None,
                    sentence: None,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[WordEntry] {
        &self.entries
    }

    fn entry_mut(&mut self, key: &str) -> Option<&mut WordEntry> {
        self.entries.iter_mut().find(|e| e.task.key == key)
    }

    pub fn record_audio(&mut self, key: &str, outcome: AudioOutcome) {
        if let Some(entry) = self.entry_mut(key) {
            entry.audio = Some(outcome);
        }
    }

    pub fn record_sentence(&mut self, key: &str, outcome: SentenceOutcome) {
        if let Some(entry) = self.entry_mut(key) {
            entry.sentence = Some(outcome);
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn audio_succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.audio, Some(AudioOutcome::Succeeded(_))))
            .count()
    }

    pub fn audio_failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.audio, Some(AudioOutcome::Failed { .. })))
            .count()
    }

    pub fn audio_not_attempted(&self) -> usize {
        self.entries.iter().filter(|e| e.audio.is_none()).count()
    }

    /// Failed words with reasons, in input order.
    pub fn failed_audio_words(&self) -> Vec<(&str, &AudioFailure)> {
        self.entries
            .iter()
            .filter_map(|e| match &e.audio {
                Some(AudioOutcome::Failed { reason, .. }) => {
                    Some((e.task.display.as_str(), reason))
                }
                _ => None,
            })
            .collect()
    }

    /// Tasks whose audio phase succeeded, in input order.
    pub fn audio_survivors(&self) -> Vec<WordTask> {
        self.entries
            .iter()
            .filter(|e| matches!(e.audio, Some(AudioOutcome::Succeeded(_))))
            .map(|e| e.task.clone())
            .collect()
    }

    pub fn sentence_succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.sentence, Some(SentenceOutcome::Succeeded(_))))
            .count()
    }

    pub fn sentence_failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.sentence, Some(SentenceOutcome::Failed(_))))
            .count()
    }

    /// Successfully parsed sentence records, in input order.
    pub fn succeeded_sentence_records(&self) -> Vec<&SentenceRecord> {
        self.entries
            .iter()
            .filter_map(|e| match &e.sentence {
                Some(SentenceOutcome::Succeeded(record)) => Some(record),
                _ => None,
            })
            .collect()
    }

    /// One-line human summary for the end of the run.
    pub fn summary(&self) -> String {
        format!(
            "audio: {} ok, {} failed, {} not attempted; sentences: {} ok, {} failed",
            self.audio_succeeded(),
            self.audio_failed(),
            self.audio_not_attempted(),
            self.sentence_succeeded(),
            self.sentence_failed(),
        )
    }
}
