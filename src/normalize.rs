//! Text normalizer: URL stripping, emoji stripping and an English-only gate.
//! All functions are total; nothing here returns an error.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use std::sync::OnceLock;
use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};

const URL_PATTERN: &str = r"https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)";
const PLACEHOLDER_PATTERN: &str = r":\w+:";
const VARIATION_SELECTOR_16: char = '\u{FE0F}';

/// Only the first this-many words are shown to the language detector.
pub const LANGUAGE_SAMPLE_WORDS: usize = 20;

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(URL_PATTERN).expect("URL pattern is valid"))
}

fn language_detector() -> &'static LanguageDetector {
    static DETECTOR: OnceLock<LanguageDetector> = OnceLock::new();
    DETECTOR.get_or_init(|| LanguageDetectorBuilder::from_all_languages().build())
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"))
}

/// Matcher over every known emoji glyph (skin-tone variants included) and the
/// `:shortcode:` each one decodes to.
struct EmojiTable {
    matcher: AhoCorasick,
    codes: Vec<String>,
}

fn emoji_table() -> &'static EmojiTable {
    static TABLE: OnceLock<EmojiTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut glyphs: Vec<String> = Vec::new();
        let mut codes: Vec<String> = Vec::new();
        let mut push = |e: &'static emojis::Emoji, code: &str| {
            glyphs.push(e.as_str().to_string());
            codes.push(format!(":{code}:"));
            // text-style form, written without the variation selector
            let bare: String = e.as_str().chars().filter(|&c| c != VARIATION_SELECTOR_16).collect();
            if !bare.is_empty() && bare != e.as_str() {
                glyphs.push(bare);
                codes.push(format!(":{code}:"));
            }
        };
        for e in emojis::iter() {
            // aliases like `+1` would escape the placeholder pattern
            let code = e
                .shortcodes()
                .find(|c| c.chars().all(|ch| ch.is_alphanumeric() || ch == '_'))
                .map(str::to_string)
                .unwrap_or_else(|| shortcode_from_name(e.name()));
            push(e, &code);
            if let Some(tones) = e.skin_tones() {
                for toned in tones {
                    push(toned, &code);
                }
            }
        }
        let matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&glyphs)
            .expect("emoji table builds");
        EmojiTable { matcher, codes }
    })
}

fn shortcode_from_name(name: &str) -> String {
    let code: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if code.is_empty() { "emoji".to_string() } else { code }
}

/// Split on whitespace, apply `f` to every token, drop tokens left empty,
/// and rejoin with single spaces.
fn map_tokens(text: &str, f: impl Fn(&str) -> String) -> String {
    text.split_whitespace()
        .map(f)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove every URL from every whitespace-separated token.
pub fn remove_urls(text: &str) -> String {
    let re = url_re();
    map_tokens(text, |tok| re.replace_all(tok, "").into_owned())
}

/// Replace each emoji glyph with its `:shortcode:`.
pub fn decode_emojis(text: &str) -> String {
    let table = emoji_table();
    table.matcher.replace_all(text, &table.codes)
}

/// Decode emojis to `:shortcode:` placeholders, then strip every placeholder.
pub fn remove_emojis(text: &str) -> String {
    let decoded = decode_emojis(text);
    let re = placeholder_re();
    map_tokens(&decoded, |tok| re.replace_all(tok, "").into_owned())
}

/// Keep `text` only when it reads as English.
///
/// - nothing left after removing ASCII punctuation: `None`
/// - a single word: kept as-is (too short to classify reliably)
/// - otherwise the first [`LANGUAGE_SAMPLE_WORDS`] words go to the detector,
///   and the text is kept only if English has the strictly highest confidence
pub fn check_language(text: &str) -> Option<String> {
    let stripped: String = text.chars().filter(|c| !c.is_ascii_punctuation()).collect();
    let words: Vec<&str> = stripped.split_whitespace().collect();
    match words.len() {
        0 => None,
        1 => Some(text.to_string()),
        _ => {
            let sample = words[..words.len().min(LANGUAGE_SAMPLE_WORDS)].join(" ");
            let ranked = language_detector().compute_language_confidence_values(&sample);
            match ranked.as_slice() {
                [(Language::English, top), rest @ ..] if rest.first().map_or(true, |(_, next)| top > next) => {
                    Some(text.to_string())
                }
                [(lang, _), ..] => {
                    tracing::debug!(lang = %lang.iso_code_639_1(), "dropping non-English text");
                    None
                }
                [] => None,
            }
        }
    }
}

/// The full cleaning chain applied to collected comments:
/// emojis, then URLs, then the language gate.
pub fn clean_text(text: &str) -> Option<String> {
    check_language(&remove_urls(&remove_emojis(text)))
}
