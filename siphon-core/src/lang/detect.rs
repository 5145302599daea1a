//! Page language detection.
//!
//! Detection ladder: markup declarations first, then URL shape, then
//! content analysis (script ranges, then stop-word overlap), finally a
//! low-confidence English default.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

/// Where the verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionSource {
    HtmlLang,
    MetaContentLanguage,
    OgLocale,
    UrlPattern,
    ContentScript,
    StopWords,
    Default,
}

/// Detection result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDetection {
    /// Primary language subtag, lowercase (e.g. `es`).
    pub language: String,
    pub confidence: f64,
    pub source: DetectionSource,
    /// Full locale when one was declared (e.g. `es-ES`).
    pub locale: Option<String>,
}

static HTML_LANG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<html[^>]*\blang=["']([a-zA-Z][a-zA-Z0-9_-]*)["']"#).unwrap()
});
static META_CONTENT_LANGUAGE: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(
            r#"(?i)<meta[^>]+http-equiv=["']content-language["'][^>]*content=["']([^"']+)["']"#,
        )
        .unwrap(),
        Regex::new(
            r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]*http-equiv=["']content-language["']"#,
        )
        .unwrap(),
    ]
});
static OG_LOCALE: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"(?i)<meta[^>]+property=["']og:locale["'][^>]*content=["']([^"']+)["']"#)
            .unwrap(),
        Regex::new(r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]*property=["']og:locale["']"#)
            .unwrap(),
    ]
});
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Detect the page language from markup, URL shape, and content.
pub fn detect_language(html: &str, url: &str) -> LanguageDetection {
    if let Some(code) = HTML_LANG.captures(html).and_then(|c| c.get(1)) {
        return verdict(code.as_str(), 0.95, DetectionSource::HtmlLang);
    }

    for re in META_CONTENT_LANGUAGE.iter() {
        if let Some(code) = re.captures(html).and_then(|c| c.get(1)) {
            return verdict(code.as_str(), 0.9, DetectionSource::MetaContentLanguage);
        }
    }

    for re in OG_LOCALE.iter() {
        if let Some(code) = re.captures(html).and_then(|c| c.get(1)) {
            return verdict(code.as_str(), 0.85, DetectionSource::OgLocale);
        }
    }

    if let Some(code) = language_from_url(url) {
        return verdict(&code, 0.75, DetectionSource::UrlPattern);
    }

    let text = TAGS.replace_all(html, " ");
    if let Some((language, confidence)) = detect_script(&text) {
        return LanguageDetection {
            language: language.to_string(),
            confidence,
            source: DetectionSource::ContentScript,
            locale: None,
        };
    }
    if let Some((language, confidence)) = detect_stop_words(&text) {
        return LanguageDetection {
            language: language.to_string(),
            confidence,
            source: DetectionSource::StopWords,
            locale: None,
        };
    }

    LanguageDetection {
        language: "en".to_string(),
        confidence: 0.3,
        source: DetectionSource::Default,
        locale: None,
    }
}

fn verdict(code: &str, confidence: f64, source: DetectionSource) -> LanguageDetection {
    // og:locale and some CMSes use underscores (es_ES)
    let normalized = code.replace('_', "-");
    let primary = normalized
        .split('-')
        .next()
        .unwrap_or(&normalized)
        .to_lowercase();
    let locale = if normalized.contains('-') {
        let mut parts = normalized.splitn(2, '-');
        let lang = parts.next().unwrap_or_default().to_lowercase();
        let region = parts.next().unwrap_or_default().to_uppercase();
        Some(format!("{lang}-{region}"))
    } else {
        None
    };

    LanguageDetection {
        language: primary,
        confidence,
        source,
        locale,
    }
}

/// Recognize `xx.example`, `/xx/` prefixes, and `lang|locale|hl=` params.
fn language_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;

    if let Some(host) = parsed.host_str() {
        let first = host.split('.').next().unwrap_or("");
        if first.len() == 2 && is_known_language(first) {
            return Some(first.to_lowercase());
        }
    }

    if let Some(mut segments) = parsed.path_segments() {
        if let Some(first) = segments.next() {
            let candidate = first.split('-').next().unwrap_or(first);
            if first.len() <= 5 && candidate.len() == 2 && is_known_language(candidate) {
                return Some(candidate.to_lowercase());
            }
        }
    }

    for (key, value) in parsed.query_pairs() {
        if matches!(key.as_ref(), "lang" | "locale" | "hl") {
            let candidate = value.split(['-', '_']).next().unwrap_or(&value);
            if candidate.len() == 2 && is_known_language(candidate) {
                return Some(candidate.to_lowercase());
            }
        }
    }

    None
}

/// Character-range counters for non-Latin scripts.
fn detect_script(text: &str) -> Option<(&'static str, f64)> {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    let mut letters = 0usize;

    for c in text.chars() {
        if c.is_alphabetic() {
            letters += 1;
        }
        let script = match c {
            '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' => "kana",
            '\u{4E00}'..='\u{9FFF}' => "cjk",
            '\u{AC00}'..='\u{D7AF}' => "hangul",
            '\u{0600}'..='\u{06FF}' => "arabic",
            '\u{0590}'..='\u{05FF}' => "hebrew",
            '\u{0E00}'..='\u{0E7F}' => "thai",
            '\u{0900}'..='\u{097F}' => "devanagari",
            '\u{0980}'..='\u{09FF}' => "bengali",
            '\u{0B80}'..='\u{0BFF}' => "tamil",
            '\u{0400}'..='\u{04FF}' => "cyrillic",
            '\u{0370}'..='\u{03FF}' => "greek",
            _ => continue,
        };
        *counts.entry(script).or_insert(0) += 1;
    }

    let (script, count) = counts.into_iter().max_by_key(|(_, count)| *count)?;
    if count < 10 || letters == 0 || count * 20 < letters {
        return None;
    }

    // Kana distinguishes Japanese from Chinese within shared CJK ideographs
    Some(match script {
        "kana" => ("ja", 0.85),
        "cjk" => ("zh", 0.8),
        "hangul" => ("ko", 0.85),
        "arabic" => ("ar", 0.8),
        "hebrew" => ("he", 0.85),
        "thai" => ("th", 0.85),
        "devanagari" => ("hi", 0.8),
        "bengali" => ("bn", 0.85),
        "tamil" => ("ta", 0.85),
        "cyrillic" => ("ru", 0.7),
        "greek" => ("el", 0.85),
        _ => unreachable!(),
    })
}

/// Stop-word tables for Latin-script languages.
static STOP_WORDS: Lazy<Vec<(&'static str, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        ("en", &["the", "and", "for", "with", "that", "this", "from", "have"] as &[_]),
        ("es", &["el", "la", "los", "las", "que", "para", "con", "una", "por"]),
        ("fr", &["le", "la", "les", "des", "une", "pour", "avec", "dans", "est"]),
        ("de", &["der", "die", "das", "und", "ist", "mit", "für", "nicht", "ein"]),
        ("it", &["il", "la", "che", "per", "con", "una", "sono", "della", "questo"]),
        ("pt", &["o", "a", "os", "as", "que", "para", "com", "uma", "não"]),
        ("nl", &["de", "het", "een", "van", "voor", "met", "dat", "niet", "zijn"]),
        ("sv", &["och", "att", "det", "som", "för", "med", "den", "inte"]),
        ("no", &["og", "det", "som", "til", "med", "den", "ikke", "har"]),
        ("da", &["og", "det", "til", "med", "den", "ikke", "har", "som"]),
        ("fi", &["ja", "on", "että", "ei", "ovat", "joka", "mutta", "myös"]),
        ("pl", &["jest", "nie", "się", "dla", "oraz", "które", "przez", "jak"]),
        ("cs", &["je", "pro", "jsou", "které", "nebo", "jako", "ale", "tak"]),
        ("sk", &["je", "pre", "ktoré", "alebo", "ako", "ale", "tak", "aj"]),
        ("ro", &["și", "este", "pentru", "care", "din", "sau", "dar", "mai"]),
        ("hu", &["és", "egy", "hogy", "nem", "van", "vagy", "mint", "csak"]),
        ("tr", &["ve", "bir", "için", "ile", "olarak", "ancak", "gibi", "daha"]),
        ("id", &["yang", "dan", "untuk", "dengan", "dari", "atau", "pada", "adalah"]),
        ("ms", &["yang", "dan", "untuk", "dengan", "dari", "atau", "pada", "ialah"]),
        ("vi", &["của", "và", "các", "cho", "với", "được", "trong", "này"]),
        ("ca", &["els", "les", "amb", "per", "una", "que", "dels", "més"]),
        ("hr", &["je", "za", "koji", "ili", "ali", "kao", "što", "biti"]),
        ("sl", &["je", "za", "ki", "ali", "kot", "tudi", "pri", "lahko"]),
        ("et", &["ja", "on", "ei", "see", "kui", "oma", "mis", "või"]),
        ("lv", &["un", "ir", "kas", "vai", "par", "bet", "arī", "tiek"]),
        ("lt", &["ir", "yra", "kad", "arba", "bet", "taip", "kaip", "bus"]),
        ("sq", &["dhe", "për", "një", "është", "nga", "ose", "por", "kjo"]),
        ("eu", &["eta", "bat", "da", "ez", "dira", "edo", "baina", "ere"]),
        ("gl", &["e", "os", "as", "que", "para", "cunha", "unha", "non"]),
        ("is", &["og", "að", "er", "sem", "með", "fyrir", "ekki", "það"]),
        ("ga", &["agus", "an", "na", "ar", "le", "atá", "ach", "nach"]),
        ("mt", &["u", "li", "ta", "il", "ma", "jew", "bħal", "dan"]),
        ("af", &["die", "en", "het", "van", "vir", "met", "nie", "wat"]),
        ("sw", &["na", "ya", "wa", "kwa", "ni", "katika", "hii", "lakini"]),
        ("tl", &["ang", "ng", "sa", "mga", "ay", "para", "ito", "hindi"]),
        ("cy", &["a", "yn", "ar", "gyda", "ond", "hefyd", "mae", "wedi"]),
        ("az", &["və", "bir", "üçün", "ilə", "bu", "ki", "daha", "olan"]),
        ("uz", &["va", "bir", "uchun", "bilan", "bu", "ham", "yoki", "lekin"]),
        ("so", &["iyo", "oo", "ka", "ku", "waa", "in", "ama", "sida"]),
        ("eo", &["kaj", "la", "de", "en", "estas", "por", "kun", "sed"]),
    ]
});

fn is_known_language(code: &str) -> bool {
    let lower = code.to_lowercase();
    STOP_WORDS.iter().any(|(lang, _)| *lang == lower)
        || matches!(
            lower.as_str(),
            "zh" | "ja" | "ko" | "ar" | "he" | "th" | "hi" | "bn" | "ta" | "ru" | "el" | "uk"
        )
}

/// Count stop-word overlap per language; the winner needs at least three
/// hits. Confidence grows with the hit count, staying within 0.3..=0.85.
fn detect_stop_words(text: &str) -> Option<(&'static str, f64)> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(2000)
        .map(|w| w.to_lowercase())
        .collect();
    if words.len() < 10 {
        return None;
    }

    let mut best: Option<(&'static str, usize)> = None;
    for (language, stop_words) in STOP_WORDS.iter() {
        let hits = words
            .iter()
            .filter(|w| stop_words.contains(&w.as_str()))
            .count();
        if best.map_or(true, |(_, b)| hits > b) {
            best = Some((language, hits));
        }
    }

    let (language, hits) = best?;
    if hits < 3 {
        return None;
    }
    let confidence = (0.3 + hits as f64 * 0.05).min(0.85);
    Some((language, confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_lang_wins() {
        let detection = detect_language(
            r#"<html lang="es-ES"><body>requisitos documentos</body></html>"#,
            "https://example.com/page",
        );
        assert_eq!(detection.language, "es");
        assert_eq!(detection.confidence, 0.95);
        assert_eq!(detection.source, DetectionSource::HtmlLang);
        assert_eq!(detection.locale.as_deref(), Some("es-ES"));
    }

    #[test]
    fn test_meta_content_language() {
        let html = r#"<head><meta http-equiv="content-language" content="fr"></head>"#;
        let detection = detect_language(html, "https://example.com");
        assert_eq!(detection.language, "fr");
        assert_eq!(detection.confidence, 0.9);
        assert_eq!(detection.source, DetectionSource::MetaContentLanguage);
    }

    #[test]
    fn test_og_locale_with_underscore() {
        let html = r#"<meta property="og:locale" content="pt_BR">"#;
        let detection = detect_language(html, "https://example.com");
        assert_eq!(detection.language, "pt");
        assert_eq!(detection.locale.as_deref(), Some("pt-BR"));
        assert_eq!(detection.source, DetectionSource::OgLocale);
    }

    #[test]
    fn test_url_subdomain() {
        let detection = detect_language("<html></html>", "https://de.example.com/artikel");
        assert_eq!(detection.language, "de");
        assert_eq!(detection.confidence, 0.75);
        assert_eq!(detection.source, DetectionSource::UrlPattern);
    }

    #[test]
    fn test_url_path_prefix() {
        let detection = detect_language("<html></html>", "https://example.com/ja/docs");
        assert_eq!(detection.language, "ja");
        assert_eq!(detection.source, DetectionSource::UrlPattern);
    }

    #[test]
    fn test_url_query_param() {
        let detection = detect_language("<html></html>", "https://example.com/page?hl=tr");
        assert_eq!(detection.language, "tr");
    }

    #[test]
    fn test_api_path_is_not_a_language() {
        let detection = detect_language("<html></html>", "https://example.com/api/items");
        assert_eq!(detection.source, DetectionSource::Default);
    }

    #[test]
    fn test_script_detection_japanese() {
        let body = "これはテストです。".repeat(10);
        let html = format!("<html><body>{body}</body></html>");
        let detection = detect_language(&html, "https://example.com");
        assert_eq!(detection.language, "ja");
        assert_eq!(detection.source, DetectionSource::ContentScript);
    }

    #[test]
    fn test_script_detection_korean() {
        let body = "안녕하세요 세계 테스트 문서".repeat(10);
        let html = format!("<html><body>{body}</body></html>");
        let detection = detect_language(&html, "https://example.com");
        assert_eq!(detection.language, "ko");
    }

    #[test]
    fn test_stop_words_spanish() {
        let html = "<p>el proceso para obtener los documentos que necesita una persona \
                    con los requisitos para la solicitud y el plazo que corresponde \
                    para una respuesta de las autoridades con el resultado</p>";
        let detection = detect_language(html, "https://example.com");
        assert_eq!(detection.language, "es");
        assert_eq!(detection.source, DetectionSource::StopWords);
        assert!(detection.confidence >= 0.3 && detection.confidence <= 0.85);
    }

    #[test]
    fn test_default_fallback() {
        let detection = detect_language("<html><body>x</body></html>", "https://example.com");
        assert_eq!(detection.language, "en");
        assert_eq!(detection.confidence, 0.3);
        assert_eq!(detection.source, DetectionSource::Default);
    }
}
