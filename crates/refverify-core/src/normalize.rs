use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalize free text for comparison.
///
/// Punctuation and symbols become spaces, the result is lowercased, runs of
/// whitespace collapse to a single space and the ends are trimmed. `\w` is
/// Unicode-aware, so accented letters and non-Latin scripts survive intact.
///
/// Never use the result for display.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let spaced = NON_WORD_RE.replace_all(&lowered, " ");
    WHITESPACE_RE.replace_all(&spaced, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_punctuation_and_case() {
        assert_eq!(
            normalize("Attention Is All You Need!"),
            "attention is all you need"
        );
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  Deep\t\tResidual \n Learning  "), "deep residual learning");
    }

    #[test]
    fn punctuation_becomes_separator() {
        assert_eq!(normalize("BERT: Pre-training"), "bert pre training");
        assert_eq!(normalize("Vaswani, A."), "vaswani a");
    }

    #[test]
    fn keeps_underscores_and_digits() {
        assert_eq!(normalize("snake_case v2.0"), "snake_case v2 0");
    }

    #[test]
    fn keeps_unicode_letters() {
        assert_eq!(normalize("Rényi Divergence"), "rényi divergence");
        assert_eq!(normalize("Łukasz Kaiser"), "łukasz kaiser");
    }

    #[test]
    fn empty_and_punctuation_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!... --"), "");
    }

    proptest! {
        #[test]
        fn idempotent(s in "\\PC{0,64}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn no_edge_or_double_spaces(s in "\\PC{0,64}") {
            let n = normalize(&s);
            prop_assert!(!n.starts_with(' ') && !n.ends_with(' '));
            prop_assert!(!n.contains("  "));
        }
    }
}
