use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Headings that open the bibliography, compared case-insensitively against
/// the trimmed line.
pub const DEFAULT_HEADINGS: &[&str] = &["references", "bibliography", "works cited"];

/// Section names that close the bibliography when they appear alone on a
/// line, optionally followed by a short label ("Appendix A", "Proof 2").
pub const STOP_HEADINGS: &[&str] = &[
    "appendix",
    "acknowledgments",
    "acknowledgements",
    "supplementary",
    "supplemental",
    "algorithm",
    "proof",
    "proofs",
];

/// Longest line the uppercase-heading rule will consider.
const UPPERCASE_HEADING_MAX_CHARS: usize = 40;

static STOP_HEADING_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:[a-z]|\d+|[ivx]{1,4})[.:]?$").unwrap());

static NUMBERED_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:algorithm|figure|table)\s+\d+").unwrap());

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

/// Why the reference block ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A known section heading such as "Appendix" or "Acknowledgments".
    StopHeading,
    /// An "Algorithm 1" / "Figure 3" / "Table 2" caption.
    NumberedLabel,
    /// A short all-caps line with no year in it.
    UppercaseHeading,
    Custom(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::StopHeading => f.write_str("section heading"),
            StopReason::NumberedLabel => f.write_str("numbered figure/table/algorithm label"),
            StopReason::UppercaseHeading => f.write_str("uppercase heading"),
            StopReason::Custom(name) => f.write_str(name),
        }
    }
}

/// One end-of-section test. The predicate sees the trimmed, non-blank line.
pub struct StopRule {
    reason: StopReason,
    predicate: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl StopRule {
    pub fn new(reason: StopReason, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            reason,
            predicate: Box::new(predicate),
        }
    }

    /// A caller-defined rule, reported as [`StopReason::Custom`].
    pub fn custom(
        name: impl Into<String>,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(StopReason::Custom(name.into()), predicate)
    }

    pub fn reason(&self) -> &StopReason {
        &self.reason
    }

    pub fn matches(&self, trimmed: &str) -> bool {
        (self.predicate)(trimmed)
    }
}

impl fmt::Debug for StopRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopRule")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// The built-in rules, in evaluation order.
pub fn default_rules() -> Vec<StopRule> {
    vec![
        StopRule::new(StopReason::StopHeading, is_stop_heading),
        StopRule::new(StopReason::NumberedLabel, |line| {
            NUMBERED_LABEL_RE.is_match(line)
        }),
        StopRule::new(StopReason::UppercaseHeading, is_uppercase_heading),
    ]
}

fn is_stop_heading(line: &str) -> bool {
    let lower = line.to_lowercase();
    let mut words = lower.split_whitespace();
    let Some(first) = words.next() else {
        return false;
    };
    if !STOP_HEADINGS.iter().any(|h| *h == first) {
        return false;
    }
    match (words.next(), words.next()) {
        (None, _) => true,
        (Some(label), None) => STOP_HEADING_LABEL_RE.is_match(label),
        _ => false,
    }
}

fn is_uppercase_heading(line: &str) -> bool {
    line.chars().count() <= UPPERCASE_HEADING_MAX_CHARS
        && line.chars().any(char::is_uppercase)
        && !line.chars().any(char::is_lowercase)
        && !YEAR_RE.is_match(line)
}

/// Where and why the block stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEnd {
    /// 0-based index of the line that fired the rule; it is not in the block.
    pub line: usize,
    pub reason: StopReason,
}

/// The part of the document believed to hold the bibliography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceBlock {
    /// The lines after the heading up to the stop line, joined with `\n`.
    /// Blank lines are kept as empty lines. Without a heading this is the
    /// whole input, unchanged.
    pub text: String,
    /// 0-based index of the heading line.
    pub heading_line: Option<usize>,
    /// `None` if the block ran to the end of the document.
    pub end: Option<SectionEnd>,
}

impl ReferenceBlock {
    pub fn found_heading(&self) -> bool {
        self.heading_line.is_some()
    }
}

/// Line-based bibliography finder.
///
/// The block opens on the line after the first heading line and closes
/// before the first line any stop rule matches. Rules are tried in order and
/// the first match is the one reported.
#[derive(Debug)]
pub struct SectionLocator {
    headings: Vec<String>,
    rules: Vec<StopRule>,
}

impl Default for SectionLocator {
    fn default() -> Self {
        Self {
            headings: DEFAULT_HEADINGS.iter().map(|h| h.to_string()).collect(),
            rules: default_rules(),
        }
    }
}

impl SectionLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also accept `heading` as the start of the bibliography.
    pub fn with_heading(mut self, heading: &str) -> Self {
        self.headings.push(heading.trim().to_lowercase());
        self
    }

    /// Append a rule, evaluated after the existing ones.
    pub fn with_rule(mut self, rule: StopRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[StopRule] {
        &self.rules
    }

    fn is_heading(&self, line: &str) -> bool {
        let lower = line.trim().to_lowercase();
        self.headings.iter().any(|h| *h == lower)
    }

    fn stop_rule_for(&self, trimmed: &str) -> Option<&StopRule> {
        self.rules.iter().find(|rule| rule.matches(trimmed))
    }

    pub fn locate(&self, text: &str) -> ReferenceBlock {
        let lines: Vec<&str> = text.lines().collect();

        let Some(heading_line) = lines.iter().position(|line| self.is_heading(line)) else {
            return ReferenceBlock {
                text: text.to_string(),
                heading_line: None,
                end: None,
            };
        };

        let mut collected: Vec<&str> = Vec::new();
        let mut end = None;
        for (offset, line) in lines[heading_line + 1..].iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                collected.push("");
                continue;
            }
            if let Some(rule) = self.stop_rule_for(trimmed) {
                end = Some(SectionEnd {
                    line: heading_line + 1 + offset,
                    reason: rule.reason().clone(),
                });
                break;
            }
            collected.push(line);
        }

        ReferenceBlock {
            text: collected.join("\n"),
            heading_line: Some(heading_line),
            end,
        }
    }
}

/// Locate the reference block with the default headings and rules.
pub fn locate(text: &str) -> ReferenceBlock {
    SectionLocator::default().locate(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stops_before_appendix() {
        let text = "Body text.\nReferences\n[1] A. Author. First paper. 2019.\n[2] B. Author. Second paper. 2020.\nAppendix A\nExtra material.";
        let block = locate(text);
        assert_eq!(
            block.text,
            "[1] A. Author. First paper. 2019.\n[2] B. Author. Second paper. 2020."
        );
        assert_eq!(block.heading_line, Some(1));
        assert_eq!(
            block.end,
            Some(SectionEnd {
                line: 4,
                reason: StopReason::StopHeading
            })
        );
    }

    #[test]
    fn no_heading_returns_input_unchanged() {
        let text = "Intro\n\nNothing to see here.\r\n";
        let block = locate(text);
        assert_eq!(block.text, text);
        assert!(!block.found_heading());
        assert_eq!(block.end, None);
    }

    #[test]
    fn heading_is_case_and_space_insensitive() {
        for heading in ["REFERENCES", "  Bibliography  ", "Works Cited", "\tworks cited"] {
            let block = locate(&format!("x\n{heading}\nentry one"));
            assert_eq!(block.heading_line, Some(1), "heading {heading:?}");
            assert_eq!(block.text, "entry one");
        }
        // "works  cited" with two spaces is not a heading.
        assert!(!locate("works  cited\nentry").found_heading());
        // Heading words inside a sentence do not count.
        assert!(!locate("See the references below.\nentry").found_heading());
    }

    #[test]
    fn only_first_heading_is_used() {
        let text = "References\nfirst entry\nBibliography\nsecond entry";
        let block = locate(text);
        assert_eq!(block.heading_line, Some(0));
        assert_eq!(block.text, "first entry\nBibliography\nsecond entry");
    }

    #[test]
    fn blank_lines_are_kept_empty() {
        let text = "References\n\n[1] one.\n   \n[2] two.\n";
        let block = locate(text);
        assert_eq!(block.text, "\n[1] one.\n\n[2] two.");
        assert_eq!(block.end, None);
    }

    #[test]
    fn content_lines_keep_their_indentation() {
        let block = locate("References\n  [1] indented entry\n");
        assert_eq!(block.text, "  [1] indented entry");
    }

    #[test]
    fn heading_on_last_line_gives_empty_block() {
        let block = locate("Body.\nReferences");
        assert_eq!(block.text, "");
        assert_eq!(block.heading_line, Some(1));
    }

    #[test]
    fn stop_heading_variants() {
        for stop in [
            "Acknowledgments",
            "ACKNOWLEDGEMENTS",
            "Supplementary",
            "supplemental",
            "Proofs",
            "Proof 3",
            "Appendix B.",
            "Appendix IV",
        ] {
            let block = locate(&format!("References\nentry\n{stop}\nafter"));
            assert_eq!(block.text, "entry", "stop line {stop:?}");
            assert_eq!(block.end.unwrap().reason, StopReason::StopHeading);
        }
    }

    #[test]
    fn stop_heading_inside_reference_does_not_stop() {
        let text = "References\n[1] An appendix to the theory of proofs. 2001.\nAppendix: Artifact description\n[2] next.";
        let block = locate(text);
        assert_eq!(block.end, None);
        assert!(block.text.contains("[2] next."));
    }

    #[test]
    fn numbered_labels_stop() {
        for stop in ["Table 2: Results", "figure 10 shows", "Algorithm 1 Training loop"] {
            let block = locate(&format!("References\nentry\n{stop}\nafter"));
            assert_eq!(block.text, "entry");
            assert_eq!(block.end.unwrap().reason, StopReason::NumberedLabel);
        }
        // No number, no stop.
        assert_eq!(locate("References\nentry\nTable of results").end, None);
    }

    #[test]
    fn short_uppercase_line_stops() {
        let block = locate("References\nentry\nA PROOF OF THEOREM 1\nafter");
        assert_eq!(block.text, "entry");
        assert_eq!(block.end.unwrap().reason, StopReason::UppercaseHeading);
    }

    #[test]
    fn uppercase_rule_spares_years_and_long_lines() {
        let text = "References\nIEEE TRANS. PAMI, 2016\nA VERY LONG UPPERCASE LINE THAT EXCEEDS FORTY CHARACTERS\n[1] entry";
        let block = locate(text);
        assert_eq!(block.end, None);
        // Digits and punctuation alone are not uppercase.
        assert_eq!(locate("References\nentry\n[12]\nmore").end, None);
    }

    #[test]
    fn rules_fire_in_order() {
        // "TABLE 3" matches the numbered-label and uppercase rules; the
        // earlier rule is reported.
        let block = locate("References\nentry\nTABLE 3");
        assert_eq!(block.end.unwrap().reason, StopReason::NumberedLabel);
    }

    #[test]
    fn custom_rule_and_heading() {
        let locator = SectionLocator::new()
            .with_heading("Literatur")
            .with_rule(StopRule::custom("checklist", |line| {
                line.to_lowercase().ends_with("checklist")
            }));
        assert_eq!(locator.rules().len(), 4);

        let block = locator.locate("Text\nLITERATUR\n[1] one\nNeurIPS Paper Checklist\n[2] gone");
        assert_eq!(block.heading_line, Some(1));
        assert_eq!(block.text, "[1] one");
        let end = block.end.unwrap();
        assert_eq!(end.line, 3);
        assert_eq!(end.reason, StopReason::Custom("checklist".into()));
        assert_eq!(end.reason.to_string(), "checklist");
    }

    proptest! {
        #[test]
        fn without_heading_text_is_untouched(lines in prop::collection::vec("[a-z ]{0,20}", 0..20)) {
            prop_assume!(lines.iter().all(|l| {
                let t = l.trim();
                t != "references" && t != "bibliography" && t != "works cited"
            }));
            let text = lines.join("\n");
            let block = locate(&text);
            prop_assert_eq!(block.text, text);
            prop_assert_eq!(block.heading_line, None);
        }

        #[test]
        fn block_starts_after_heading(
            prefix in prop::collection::vec("[a-h]{3,8}( [a-h]{3,8}){1,3}", 0..10),
            body in prop::collection::vec("[a-h]{3,8}( [a-h]{3,8}){1,3}", 1..10),
        ) {
            let text = format!("{}\nReferences\n{}", prefix.join("\n"), body.join("\n"));
            let text = text.trim_start_matches('\n');
            let block = locate(text);
            prop_assert_eq!(block.heading_line, Some(prefix.len()));
            prop_assert!(!block.text.to_lowercase().contains("references"));
            prop_assert_eq!(block.text, body.join("\n"));
        }
    }
}
