use snowroll::{check_language, clean_text, remove_emojis, remove_urls};

#[test]
fn urls_are_removed_and_spacing_normalized() {
    assert_eq!(remove_urls("check https://example.com/page now"), "check now");
    assert_eq!(remove_urls("two http://a.io and https://www.b.org/x?y=1#z links"), "two and links");
    assert_eq!(remove_urls("plain text"), "plain text");
    assert_eq!(remove_urls(""), "");
}

#[test]
fn emojis_are_removed() {
    assert_eq!(remove_emojis("hello 😀 world"), "hello world");
    assert_eq!(remove_emojis("great👍"), "great");
    assert_eq!(remove_emojis("no emoji here"), "no emoji here");
}

/// Glyphs typed without the emoji variation selector are removed too.
#[test]
fn text_style_emojis_are_removed() {
    assert_eq!(remove_emojis("love \u{2764} it"), "love it");
    assert_eq!(remove_emojis("love \u{2764}\u{FE0F} it"), "love it");
}

#[test]
fn language_gate_cases() {
    // nothing left once punctuation is gone
    assert_eq!(check_language(""), None);
    assert_eq!(check_language("?!..."), None);
    // single words are trusted
    assert_eq!(check_language("ok"), Some("ok".to_string()));
    assert_eq!(check_language("bonjour!"), Some("bonjour!".to_string()));
    // longer text goes through the detector
    let en = "I really think this is the best explanation of the problem that I have read so far";
    assert_eq!(check_language(en), Some(en.to_string()));
    let fr = "Je pense vraiment que c'est la meilleure explication du problème que j'ai lue jusqu'à présent";
    assert_eq!(check_language(fr), None);
    assert_eq!(check_language("Bonjour tout le monde, comment allez-vous"), None);
}

/// Typical two to five word replies are still recognised as English.
#[test]
fn short_english_comments_are_kept() {
    for text in ["thank you so much", "I agree", "What a game", "great point man", "lol same here"] {
        assert_eq!(check_language(text).as_deref(), Some(text), "{text}");
    }
}

#[test]
fn original_text_is_returned_not_the_stripped_sample() {
    let en = "Well, that's exactly what I was going to say about the weather today!";
    assert_eq!(check_language(en).as_deref(), Some(en));
}

#[test]
fn clean_text_chains_emojis_urls_and_language() {
    assert_eq!(
        clean_text("I completely agree with you 😀 and here is the source https://example.com/a for anyone reading").as_deref(),
        Some("I completely agree with you and here is the source for anyone reading")
    );
    assert_eq!(clean_text("😀 https://example.com"), None);
    assert_eq!(
        clean_text("Das ist wirklich die beste Erklärung, die ich bisher zu diesem Thema gelesen habe"),
        None
    );
}
