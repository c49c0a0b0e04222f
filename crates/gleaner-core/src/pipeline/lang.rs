//! Language detection plus per-language token and lemma annotation.

use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer};
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

pub const SUPPORTED_LANGUAGES: [&str; 3] = ["en", "fr", "ar"];

const DETECTION_MIN_CHARS: usize = 10;
const DETECTION_SAMPLE_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum AnnotatorError {
    #[error("Empty stopword list for language: {0}")]
    EmptyStopwords(&'static str),
}

/// Token and lemma lists for one document. All three lists are empty when the
/// language is unknown or unsupported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub tokens: Vec<String>,
    pub tokens_filtered: Vec<String>,
    pub lemmas: Vec<String>,
}

/// Best-effort language guess over at most the first 500 characters.
/// Returns `None` for whitespace-only or very short input, where detection
/// is noise.
#[must_use]
pub fn detect_language(text: &str) -> Option<&'static str> {
    if text.trim().is_empty() || text.chars().count() < DETECTION_MIN_CHARS {
        return None;
    }
    let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
    whatlang::detect(&sample).and_then(|info| iso_639_1(info.lang().code()))
}

/// Holds the stemmers and stopword sets for every supported language.
/// Loading is all-or-nothing; a service that cannot annotate one supported
/// language should not pretend it can process at all.
pub struct Annotator {
    english: StemPipeline,
    french: StemPipeline,
    arabic: ArabicPipeline,
}

impl Annotator {
    pub fn load() -> crate::Result<Self> {
        let english = StemPipeline::load(Algorithm::English, stop_words::LANGUAGE::English, "en")?;
        let french = StemPipeline::load(Algorithm::French, stop_words::LANGUAGE::French, "fr")?;
        let arabic = ArabicPipeline::load()?;
        tracing::info!(
            en_stopwords = english.stopwords.len(),
            fr_stopwords = french.stopwords.len(),
            ar_stopwords = arabic.stopwords.len(),
            "annotation resources loaded"
        );
        Ok(Self { english, french, arabic })
    }

    #[must_use]
    pub fn annotate(&self, text: &str, lang: &str) -> Annotation {
        if text.is_empty() {
            return Annotation::default();
        }
        match lang {
            "en" => self.english.annotate(text),
            "fr" => self.french.annotate(text),
            "ar" => self.arabic.annotate(text),
            other => {
                tracing::warn!(lang = other, "no annotation pipeline for this language");
                Annotation::default()
            }
        }
    }
}

/// Lowercasing pipeline shared by English and French: alphabetic tokens,
/// stopword filter, then a Snowball stem as the lemma.
struct StemPipeline {
    stemmer: Stemmer,
    stopwords: HashSet<String>,
}

impl StemPipeline {
    fn load(
        algorithm: Algorithm,
        language: stop_words::LANGUAGE,
        name: &'static str,
    ) -> Result<Self, AnnotatorError> {
        let stopwords: HashSet<String> = stop_words::get(language).into_iter().collect();
        if stopwords.is_empty() {
            return Err(AnnotatorError::EmptyStopwords(name));
        }
        Ok(Self { stemmer: Stemmer::create(algorithm), stopwords })
    }

    fn annotate(&self, text: &str) -> Annotation {
        let lowered = text.to_lowercase();
        let tokens: Vec<String> = lowered
            .unicode_words()
            .filter(|w| is_alphabetic(w))
            .map(String::from)
            .collect();
        let tokens_filtered: Vec<String> = tokens
            .iter()
            .filter(|w| !self.stopwords.contains(*w))
            .cloned()
            .collect();
        let lemmas = tokens_filtered
            .iter()
            .map(|w| self.stemmer.stem(w).into_owned())
            .collect();
        Annotation { tokens, tokens_filtered, lemmas }
    }
}

/// Arabic keeps the original surface forms: no case folding, every word kept
/// as a token, and the stopword filter compares against the lowercased stem.
struct ArabicPipeline {
    stemmer: Stemmer,
    stopwords: HashSet<String>,
}

impl ArabicPipeline {
    fn load() -> Result<Self, AnnotatorError> {
        let stopwords: HashSet<String> =
            stop_words::get(stop_words::LANGUAGE::Arabic).into_iter().collect();
        if stopwords.is_empty() {
            return Err(AnnotatorError::EmptyStopwords("ar"));
        }
        Ok(Self { stemmer: Stemmer::create(Algorithm::Arabic), stopwords })
    }

    fn annotate(&self, text: &str) -> Annotation {
        let tokens: Vec<String> = text.unicode_words().map(String::from).collect();
        let mut tokens_filtered = Vec::new();
        let mut lemmas = Vec::new();
        for token in &tokens {
            if !is_alphabetic(token) {
                continue;
            }
            let lemma = self.stemmer.stem(token).into_owned();
            if self.stopwords.contains(&lemma.to_lowercase()) {
                continue;
            }
            tokens_filtered.push(token.clone());
            lemmas.push(lemma);
        }
        Annotation { tokens, tokens_filtered, lemmas }
    }
}

fn is_alphabetic(word: &str) -> bool {
    !word.is_empty() && word.chars().all(char::is_alphabetic)
}

// Detection reports ISO 639-3; the sink schema stores two-letter codes.
fn iso_639_1(code: &str) -> Option<&'static str> {
    let two = match code {
        "afr" => "af",
        "aka" => "ak",
        "amh" => "am",
        "ara" => "ar",
        "aze" => "az",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "he",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "hye" => "hy",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jv",
        "jpn" => "ja",
        "kan" => "kn",
        "kat" => "ka",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "nb",
        "ori" => "or",
        "pan" => "pa",
        "pes" => "fa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "sna" => "sn",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tuk" => "tk",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "uzb" => "uz",
        "vie" => "vi",
        "yid" => "yi",
        "zul" => "zu",
        _ => return None,
    };
    Some(two)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_rejects_short_or_blank_text() {
        assert_eq!(detect_language(""), None);
        assert_eq!(detect_language("      \t\n  "), None);
        assert_eq!(detect_language("hi there"), None); // under 10 chars
    }

    #[test]
    fn test_detects_english_and_arabic() {
        let english = "The quick brown fox jumps over the lazy dog and runs far away into the quiet evening fields";
        assert_eq!(detect_language(english), Some("en"));

        let arabic = "هذه هي المرة الأولى التي أكتب فيها نصا طويلا باللغة العربية من أجل اختبار قدرة النظام على تحديد اللغة بشكل صحيح";
        assert_eq!(detect_language(arabic), Some("ar"));
    }

    #[test]
    fn test_iso_mapping() {
        assert_eq!(iso_639_1("eng"), Some("en"));
        assert_eq!(iso_639_1("fra"), Some("fr"));
        assert_eq!(iso_639_1("ara"), Some("ar"));
        assert_eq!(iso_639_1("deu"), Some("de"));
        assert_eq!(iso_639_1("xyz"), None);
    }

    #[test]
    fn test_english_annotation_filters_and_stems() {
        let annotator = Annotator::load().unwrap();
        let annotation = annotator.annotate("The cats are running in the gardens", "en");

        assert_eq!(
            annotation.tokens,
            vec!["the", "cats", "are", "running", "in", "the", "gardens"]
        );
        for stop in ["the", "are", "in"] {
            assert!(!annotation.tokens_filtered.contains(&stop.to_string()));
        }
        assert!(annotation.tokens_filtered.contains(&"cats".to_string()));
        assert!(annotation.tokens_filtered.contains(&"gardens".to_string()));
        assert!(annotation.lemmas.contains(&"cat".to_string()));
        assert!(annotation.lemmas.contains(&"garden".to_string()));
        assert_eq!(annotation.lemmas.len(), annotation.tokens_filtered.len());
    }

    #[test]
    fn test_tokens_exclude_digits_and_mixed_words() {
        let annotator = Annotator::load().unwrap();
        let annotation = annotator.annotate("Prices rose 2024 by 15x overall", "en");

        assert!(!annotation.tokens.contains(&"2024".to_string()));
        assert!(!annotation.tokens.contains(&"15x".to_string()));
        assert!(annotation.tokens.contains(&"prices".to_string()));
    }

    #[test]
    fn test_french_annotation_lowercases() {
        let annotator = Annotator::load().unwrap();
        let annotation = annotator.annotate("Les Maisons Anciennes", "fr");

        assert_eq!(annotation.tokens, vec!["les", "maisons", "anciennes"]);
        assert!(!annotation.tokens_filtered.contains(&"les".to_string()));
        assert!(annotation.tokens_filtered.contains(&"maisons".to_string()));
    }

    #[test]
    fn test_arabic_annotation_keeps_surface_forms() {
        let annotator = Annotator::load().unwrap();
        let annotation = annotator.annotate("المدرسة كبيرة", "ar");

        assert_eq!(annotation.tokens, vec!["المدرسة", "كبيرة"]);
        assert_eq!(annotation.tokens_filtered.len(), annotation.lemmas.len());
        for kept in &annotation.tokens_filtered {
            assert!(annotation.tokens.contains(kept));
        }
    }

    #[test]
    fn test_every_supported_language_has_a_pipeline() {
        let annotator = Annotator::load().unwrap();
        let samples = [
            ("en", "these words should all come through as tokens"),
            ("fr", "ces mots devraient produire des jetons"),
            ("ar", "هذه الكلمات تنتج رموزا"),
        ];
        for lang in SUPPORTED_LANGUAGES {
            let (_, text) = samples.iter().find(|(code, _)| *code == lang).unwrap();
            let annotation = annotator.annotate(text, lang);
            assert!(!annotation.tokens.is_empty(), "no tokens for {lang}");
        }
    }

    #[test]
    fn test_unsupported_language_yields_empty_annotation() {
        let annotator = Annotator::load().unwrap();
        assert_eq!(annotator.annotate("ein deutscher Satz", "de"), Annotation::default());
        assert_eq!(annotator.annotate("", "en"), Annotation::default());
    }
}
