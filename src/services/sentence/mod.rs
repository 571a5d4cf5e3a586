//! Sentence generation phase: one structured chat-completion request per
//! word, rate-limited and single-streamed - the generation service is the
//! binding rate constraint, so parallelizing buys nothing but throttling.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub mod parser;

use crate::config::{CefrLevel, GenerationConfig, PipelineConfig};
use crate::errors::{ApiFailure, SentenceFailure};
use crate::events::{EventSink, Phase, PipelineEvent};
use crate::models::{RunReport, SentenceOutcome, SentenceRecord, WordTask};

pub const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const SYSTEM_PROMPT: &str = "You are a helpful Danish language teacher who provides \
     accurate example sentences and usage tips for Danish words.";

/// Minimal chat-completion client; the seam the generator is tested through.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ApiFailure>;
}

// Chat message structure for the completions API
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Client for the OpenAI chat completions endpoint.
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    config: GenerationConfig,
}

impl OpenAiChat {
    pub fn new(client: Client, api_key: String, config: GenerationConfig) -> Self {
        OpenAiChat {
            client,
            api_key,
            config,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ApiFailure> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("sending generation request ({})", self.config.model);
        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiFailure::Transient("request timed out".to_string())
                } else {
                    ApiFailure::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ApiFailure::InvalidCredential);
        }
        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiFailure::Transient(format!("HTTP {status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiFailure::Permanent(format!("HTTP {status}: {body}")));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ApiFailure::Permanent(format!("undecodable reply: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ApiFailure::Permanent("reply contains no choices".to_string()))?;

        Ok(content)
    }
}

/// Fixed prompt asking for the labeled-section reply format the parser
/// understands.
pub fn build_prompt(word: &str, cefr_level: CefrLevel, sentence_count: usize) -> String {
    format!(
        r#"For the Danish word "{word}", please provide:

1. **Grammar Information (in Danish):**
   - IPA pronunciation (in slashes like /pronunciation/)
   - Word type in Danish (substantiv, verbum, adjektiv, etc.)
   - If it's a noun: gender (en/et) and plural forms
   - If it's a verb: infinitive form and all conjugations
   - If it's an adjective: comparative and superlative forms
   - A brief Danish definition

2. **Example Sentences:**
   - Provide exactly {sentence_count} different example sentences using "{word}"
   - Use the exact word "{word}" in each sentence (not inflected forms)
   - Make sentences appropriate for {cefr_level} level
   - Provide English translations
   - Make sure sentences show different contexts/uses

Format your response exactly like this:
**{word}**

**Grammar Info:**
IPA: /pronunciation/
Type: [substantiv/verbum/adjektiv/etc.]
Gender: [en/et] (if noun)
Plural: [plural form] (if noun)
Inflections: [other forms, declensions, conjugations]
Definition: [Danish definition/explanation]

**Example Sentences:**
1. [Danish sentence using "{word}"] - [English translation]
2. [Danish sentence using "{word}"] - [English translation]
3. [Danish sentence using "{word}"] - [English translation]

---"#
    )
}

/// Settings consumed by the sentence phase.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub cefr_level: CefrLevel,
    pub sentences_per_word: usize,
    pub retry_cap: u32,
    /// Courtesy delay between consecutive generation calls.
    pub call_delay: Duration,
    /// Base for the linear backoff between retries of a transient failure.
    pub retry_backoff: Duration,
}

impl GenerationSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        GenerationSettings {
            cefr_level: config.cefr_level,
            sentences_per_word: config.generation.sentences_per_word,
            retry_cap: config.retry_cap,
            call_delay: config.sentence_delay,
            retry_backoff: config.backoff_base,
        }
    }
}

/// Outcome of one generation attempt, separating per-word failures from
/// conditions that end the whole phase.
enum GenerateError {
    Word(SentenceFailure),
    /// Bad credential: every remaining word would fail the same way.
    Fatal(SentenceFailure),
}

/// Calls the generation endpoint per word and parses the structured reply.
pub struct SentenceGenerator {
    chat: Arc<dyn ChatClient>,
    settings: GenerationSettings,
}

impl SentenceGenerator {
    pub fn new(chat: Arc<dyn ChatClient>, settings: GenerationSettings) -> Self {
        SentenceGenerator { chat, settings }
    }

    /// Run the sentence phase over `tasks`, strictly in input order.
    pub async fn process(
        &self,
        tasks: &[WordTask],
        report: Arc<Mutex<RunReport>>,
        sink: Arc<dyn EventSink>,
        token: CancellationToken,
    ) {
        let total = tasks.len();
        sink.emit(PipelineEvent::PhaseStarted {
            phase: Phase::Sentences,
            total,
        });
        info!("starting sentence phase: {} words", total);

        for (index, task) in tasks.iter().enumerate() {
            if token.is_cancelled() {
                info!("sentence phase cancelled after {index} words");
                break;
            }

            sink.emit(PipelineEvent::WordStarted {
                phase: Phase::Sentences,
                word: task.display.clone(),
            });

            let fatal = match self.generate_one(&task.display).await {
                Ok(record) => {
                    sink.emit(PipelineEvent::WordSucceeded {
                        phase: Phase::Sentences,
                        word: task.display.clone(),
                    });
                    report
                        .lock()
                        .unwrap()
                        .record_sentence(&task.key, SentenceOutcome::Succeeded(record));
                    false
                }
                Err(GenerateError::Word(failure)) => {
                    warn!("sentence generation failed for '{}': {}", task.display, failure);
                    sink.emit(PipelineEvent::WordFailed {
                        phase: Phase::Sentences,
                        word: task.display.clone(),
                        reason: failure.to_string(),
                    });
                    report
                        .lock()
                        .unwrap()
                        .record_sentence(&task.key, SentenceOutcome::Failed(failure));
                    false
                }
                Err(GenerateError::Fatal(failure)) => {
                    error!(
                        "aborting sentence phase: {} (word '{}')",
                        failure, task.display
                    );
                    sink.emit(PipelineEvent::WordFailed {
                        phase: Phase::Sentences,
                        word: task.display.clone(),
                        reason: failure.to_string(),
                    });
                    sink.emit(PipelineEvent::Log {
                        message: "generation credential rejected; remaining words skipped"
                            .to_string(),
                    });
                    report
                        .lock()
                        .unwrap()
                        .record_sentence(&task.key, SentenceOutcome::Failed(failure));
                    true
                }
            };

            sink.emit(PipelineEvent::Progress {
                phase: Phase::Sentences,
                done: index + 1,
                total,
            });

            if fatal {
                break;
            }

            // Rate-limit courtesy between calls
            sleep(self.settings.call_delay).await;
        }

        sink.emit(PipelineEvent::PhaseFinished {
            phase: Phase::Sentences,
        });
    }

    /// Generate and parse the record for one word, retrying transient API
    /// failures up to the cap.
    async fn generate_one(&self, word: &str) -> Result<SentenceRecord, GenerateError> {
        let prompt = build_prompt(word, self.settings.cefr_level, self.settings.sentences_per_word);
        let retry_cap = self.settings.retry_cap.max(1);
        let mut attempts: u32 = 0;

        let reply = loop {
            attempts += 1;
            match self.chat.complete(SYSTEM_PROMPT, &prompt).await {
                Ok(reply) => break reply,
                Err(ApiFailure::InvalidCredential) => {
                    return Err(GenerateError::Fatal(SentenceFailure::Api(
                        ApiFailure::InvalidCredential.to_string(),
                    )));
                }
                Err(ApiFailure::Transient(message)) if attempts < retry_cap => {
                    debug!(
                        "transient API error for '{word}' (attempt {attempts}/{retry_cap}): {message}"
                    );
                    sleep(self.settings.retry_backoff * attempts).await;
                }
                Err(failure) => {
                    return Err(GenerateError::Word(SentenceFailure::Api(
                        failure.to_string(),
                    )));
                }
            }
        };

        parser::parse_reply(word, &reply)
            .map_err(|reason| GenerateError::Word(SentenceFailure::Parse(reason)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_reply, NullSink, ScriptedChat};
    use std::sync::atomic::Ordering;

    fn test_settings() -> GenerationSettings {
        GenerationSettings {
            cefr_level: CefrLevel::B1,
            sentences_per_word: 3,
            retry_cap: 3,
            call_delay: Duration::from_millis(0),
            retry_backoff: Duration::from_millis(1),
        }
    }

    async fn run_generator(chat: Arc<ScriptedChat>, words: &str) -> RunReport {
        let tasks = crate::models::parse_word_list(words);
        let report = Arc::new(Mutex::new(RunReport::new(&tasks)));
        let generator = SentenceGenerator::new(chat, test_settings());
        generator
            .process(
                &tasks,
                Arc::clone(&report),
                Arc::new(NullSink),
                CancellationToken::new(),
            )
            .await;
        Arc::try_unwrap(report).unwrap().into_inner().unwrap()
    }

    #[tokio::test]
    async fn test_transient_error_is_retried_then_succeeds() {
        let chat = ScriptedChat::new(vec![
            Err(ApiFailure::Transient("HTTP 429".to_string())),
            Ok(sample_reply("hus")),
        ]);
        let report = run_generator(Arc::clone(&chat), "hus").await;

        assert_eq!(chat.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.sentence_succeeded(), 1);
        let records = report.succeeded_sentence_records();
        assert_eq!(records[0].sentences.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_credential_aborts_remaining_words() {
        let chat = ScriptedChat::new(vec![Err(ApiFailure::InvalidCredential)]);
        let report = run_generator(Arc::clone(&chat), "hus\nbil\nkat").await;

        // First word recorded failed, remaining words never attempted
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.sentence_failed(), 1);
        assert!(report.entries()[1].sentence.is_none());
        assert!(report.entries()[2].sentence.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_recorded_as_parse_failure() {
        let chat = ScriptedChat::new(vec![Ok("I'm sorry, I can't help with that.".to_string())]);
        let report = run_generator(chat, "hus").await;

        assert_eq!(report.sentence_succeeded(), 0);
        match &report.entries()[0].sentence {
            Some(SentenceOutcome::Failed(SentenceFailure::Parse(_))) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_api_error_fails_only_that_word() {
        let chat = ScriptedChat::new(vec![
            Err(ApiFailure::Permanent("HTTP 400".to_string())),
            Ok(sample_reply("bil")),
        ]);
        let report = run_generator(Arc::clone(&chat), "hus\nbil").await;

        assert_eq!(chat.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.sentence_failed(), 1);
        assert_eq!(report.sentence_succeeded(), 1);
    }

    #[test]
    fn test_prompt_carries_word_level_and_count() {
        let prompt = build_prompt("hus", CefrLevel::B2, 3);
        assert!(prompt.contains("\"hus\""));
        assert!(prompt.contains("B2 level"));
        assert!(prompt.contains("exactly 3 different example sentences"));
    }
}
