//! User language detection
//!
//! Decides which natural language the model should answer in, based on the
//! latest user message. Detection is CPU-only and deterministic for a given
//! input.

use whatlang::Lang;

/// Confidence reported when the detector returns no result.
pub const UNDECIDED_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedLanguage {
    pub lang: Lang,
    pub confidence: f64,
}

impl DetectedLanguage {
    pub fn english(confidence: f64) -> Self {
        Self { lang: Lang::Eng, confidence }
    }

    pub fn is_english(&self) -> bool {
        self.lang == Lang::Eng
    }

    /// ISO 639-3 code, e.g. `fra`
    pub fn code(&self) -> &'static str {
        self.lang.code()
    }

    /// English name of the language, e.g. `French`
    pub fn name(&self) -> &'static str {
        self.lang.eng_name()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageService;

impl LanguageService {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, text: &str) -> DetectedLanguage {
        if text.trim().is_empty() {
            tracing::warn!("Text is empty, assuming English");
            return DetectedLanguage::english(1.0);
        }

        match whatlang::detect(text) {
            Some(info) => {
                let detected = DetectedLanguage { lang: info.lang(), confidence: info.confidence() };
                tracing::info!(
                    code = detected.code(),
                    confidence = detected.confidence,
                    reliable = info.is_reliable(),
                    "Language detected: {}",
                    detected.name()
                );
                detected
            },
            None => {
                tracing::warn!("Language detection failed, assuming English");
                DetectedLanguage::english(UNDECIDED_CONFIDENCE)
            },
        }
    }
}

/// One-line instruction that pins the reply language.
///
/// English needs no instruction since the base prompt is already English.
pub fn build_language_instruction(language: &DetectedLanguage) -> Option<String> {
    if language.is_english() {
        return None;
    }
    Some(format!(
        "Respond strictly in {}, the language the user is writing in.",
        language.name()
    ))
}
