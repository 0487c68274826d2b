//! Greedy word wrapping.

/// Break `text` into lines no wider than `max_width` where possible.
///
/// Words are separated by any whitespace. The running line plus the next
/// word is measured; when it exceeds `max_width` and the line already holds
/// a word, the line breaks before that word. A single word wider than
/// `max_width` is kept whole on its own line. Blank input yields no lines.
pub fn wrap_words<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }

        let candidate = format!("{line} {word}");
        if measure(&candidate) > max_width {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        } else {
            line = candidate;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mono(text: &str) -> f32 {
        text.chars().count() as f32 * 10.0
    }

    #[test]
    fn test_breaks_before_overflowing_word() {
        let lines = wrap_words("the quick brown fox jumps", 110.0, mono);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn test_long_word_kept_whole() {
        let lines = wrap_words("a supercalifragilistic b", 50.0, mono);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_blank_input_has_no_lines() {
        assert!(wrap_words("", 100.0, mono).is_empty());
        assert!(wrap_words(" \t\n ", 100.0, mono).is_empty());
    }

    #[test]
    fn test_exact_fit_does_not_break() {
        assert_eq!(wrap_words("abc def", 70.0, mono), vec!["abc def"]);
    }

    proptest! {
        #[test]
        fn prop_rewrap_is_idempotent(
            words in proptest::collection::vec("[a-z]{1,9}", 0..30),
            max_width in 20.0f32..200.0,
        ) {
            let text = words.join(" ");
            let lines = wrap_words(&text, max_width, mono);

            let rewrapped = wrap_words(&lines.join(" "), max_width, mono);
            prop_assert_eq!(&rewrapped, &lines);

            for line in &lines {
                let single = wrap_words(line, max_width, mono);
                if mono(line) <= max_width {
                    prop_assert_eq!(single, vec![line.clone()]);
                }
            }
        }

        #[test]
        fn prop_multi_word_lines_fit(
            words in proptest::collection::vec("[a-z]{1,9}", 1..30),
            max_width in 20.0f32..200.0,
        ) {
            for line in wrap_words(&words.join(" "), max_width, mono) {
                if line.contains(' ') {
                    prop_assert!(mono(&line) <= max_width);
                }
            }
        }
    }
}
