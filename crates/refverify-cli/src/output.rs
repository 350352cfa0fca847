use std::io::Write;
use std::path::Path;

use owo_colors::OwoColorize;
use refverify_core::{Classification, Config, ProgressEvent, Report, VerificationEntry};
use refverify_parsing::ReferenceBlock;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print what the section locator found.
pub fn print_extraction_summary(
    w: &mut dyn Write,
    file_name: &str,
    block: &ReferenceBlock,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Extracting references from {}...", file_name)?;
    match block.heading_line {
        Some(line) => {
            let lines = block.text.lines().filter(|l| !l.trim().is_empty()).count();
            writeln!(
                w,
                "Found reference heading on line {} ({} non-blank lines)",
                line + 1,
                lines
            )?;
        }
        None => {
            let msg = "No reference heading found; sending the whole document";
            if color.enabled() {
                writeln!(w, "{}", msg.yellow())?;
            } else {
                writeln!(w, "{}", msg)?;
            }
        }
    }
    if let Some(end) = &block.end {
        let msg = format!("(Section ends at line {}: {})", end.line + 1, end.reason);
        if color.enabled() {
            writeln!(w, "{}", msg.dimmed())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }
    Ok(())
}

/// One line per finished citation, for the progress bar to print above
/// itself. Other events produce nothing.
pub fn progress_line(event: &ProgressEvent, color: ColorMode) -> Option<String> {
    let ProgressEvent::Result {
        index,
        total,
        entry,
    } = event
    else {
        return None;
    };

    let title = truncate(entry.title.as_deref().unwrap_or("(untitled)"), 50);
    let line = match entry.classification {
        Classification::Verified => {
            let source = entry
                .best_source()
                .map(|s| s.source.as_str())
                .unwrap_or("unknown");
            let verdict = if color.enabled() {
                "VERIFIED".green().to_string()
            } else {
                "VERIFIED".to_string()
            };
            format!(
                "[{}/{}] \"{}\" -> {} ({:.2}, {})",
                index + 1,
                total,
                title,
                verdict,
                entry.score,
                source
            )
        }
        Classification::Unverified => {
            let verdict = if color.enabled() {
                "UNVERIFIED".red().to_string()
            } else {
                "UNVERIFIED".to_string()
            };
            format!(
                "[{}/{}] \"{}\" -> {} ({:.2})",
                index + 1,
                total,
                title,
                verdict,
                entry.score
            )
        }
    };
    Some(line)
}

/// Print the located reference block for `--dry-run`.
pub fn print_dry_run(
    w: &mut dyn Write,
    file_name: &str,
    block: &ReferenceBlock,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}\n", "DRY RUN:".bold().cyan(), file_name.bold())?;
    } else {
        writeln!(w, "DRY RUN: {}\n", file_name)?;
    }
    print_extraction_summary(w, file_name, block, color)?;
    writeln!(w)?;
    writeln!(w, "{}", block.text)?;
    writeln!(w)?;
    writeln!(
        w,
        "Total: {} characters would be sent for citation extraction",
        block.text.chars().count()
    )?;
    Ok(())
}

/// Print every unverified citation with the closest candidate, if any.
pub fn print_unverified(
    w: &mut dyn Write,
    report: &Report,
    color: ColorMode,
) -> std::io::Result<()> {
    if report.unverified.is_empty() {
        return Ok(());
    }

    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold().red())?;
        writeln!(w, "{}", "UNVERIFIED CITATIONS".bold().red())?;
        writeln!(w, "{}", sep.bold().red())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "UNVERIFIED CITATIONS")?;
        writeln!(w, "{}", sep)?;
    }

    for entry in &report.unverified {
        print_unverified_entry(w, entry, color)?;
    }
    writeln!(w)?;
    Ok(())
}

fn print_unverified_entry(
    w: &mut dyn Write,
    entry: &VerificationEntry,
    color: ColorMode,
) -> std::io::Result<()> {
    let title = entry.title.as_deref().unwrap_or("(untitled)");
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{} {}", "Title:".bold(), title.cyan())?;
    } else {
        writeln!(w, "Title: {}", title)?;
    }
    if !entry.authors.is_empty() {
        writeln!(w, "  Authors: {}", entry.authors.join("; "))?;
    }

    match entry.best_source().and_then(|s| s.result.as_ref()) {
        Some(best) => {
            let msg = format!(
                "Closest match ({}, {:.2}): {}",
                best.source,
                best.score,
                best.title.as_deref().unwrap_or("(no title)")
            );
            if color.enabled() {
                writeln!(w, "  {}", msg.dimmed())?;
            } else {
                writeln!(w, "  {}", msg)?;
            }
        }
        None => {
            if color.enabled() {
                writeln!(w, "  {}", "No candidate from any source".red())?;
            } else {
                writeln!(w, "  No candidate from any source")?;
            }
        }
    }
    Ok(())
}

/// Print the final summary.
pub fn print_summary(
    w: &mut dyn Write,
    report: &Report,
    min_score: f64,
    color: ColorMode,
) -> std::io::Result<()> {
    let stats = report.stats();

    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  Citations checked: {}", stats.total)?;
    writeln!(w, "  Threshold: {:.2}", min_score)?;
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "  {} {}", "Verified:".green(), stats.verified)?;
        writeln!(w, "  {} {}", "Unverified:".red(), stats.unverified)?;
    } else {
        writeln!(w, "  Verified: {}", stats.verified)?;
        writeln!(w, "  Unverified: {}", stats.unverified)?;
    }

    if !stats.source_hits.is_empty() {
        let hits: Vec<String> = stats
            .source_hits
            .iter()
            .map(|(source, n)| format!("{} {}", source, n))
            .collect();
        let msg = format!("Candidates returned: {}", hits.join(", "));
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print the resolved configuration for `refverify config`. Keys are masked.
pub fn print_config(
    w: &mut dyn Write,
    platform_path: Option<&Path>,
    cwd_path: &Path,
    config: &Config,
) -> std::io::Result<()> {
    let location = |p: &Path| {
        if p.exists() {
            format!("{}", p.display())
        } else {
            format!("{} (not present)", p.display())
        }
    };
    match platform_path {
        Some(p) => writeln!(w, "Config file:   {}", location(p))?,
        None => writeln!(w, "Config file:   (no platform config directory)")?,
    }
    writeln!(w, "Local config:  {}", location(cwd_path))?;
    writeln!(w)?;
    writeln!(w, "deepseek_api_key     = {}", mask(config.extractor.api_key.as_deref()))?;
    writeln!(w, "s2_api_key           = {}", mask(config.s2_api_key.as_deref()))?;
    writeln!(w, "model                = {}", config.extractor.model)?;
    writeln!(w, "base_url             = {}", config.extractor.base_url)?;
    writeln!(w, "min_score            = {}", config.min_score)?;
    writeln!(w, "num_workers          = {}", config.num_workers)?;
    writeln!(w, "lookup_timeout_secs  = {}", config.lookup_timeout_secs)?;
    writeln!(
        w,
        "disabled_sources     = [{}]",
        config.disabled_sources.join(", ")
    )?;
    writeln!(
        w,
        "scoring              = title {} / author {} ({:?})",
        config.scoring.weights.title, config.scoring.weights.author, config.scoring.author_overlap
    )?;
    Ok(())
}

/// Keep the last four characters of a key.
fn mask(key: Option<&str>) -> String {
    match key {
        None => "(not set)".to_string(),
        Some(k) => {
            let chars: Vec<char> = k.chars().collect();
            if chars.len() <= 8 {
                "****".to_string()
            } else {
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("****{}", tail)
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refverify_core::{MatchResult, SourceMatch};
    use refverify_parsing::locate;

    const PLAIN: ColorMode = ColorMode(false);

    fn entry(title: &str, score: f64, candidate: Option<&str>) -> VerificationEntry {
        VerificationEntry {
            title: Some(title.to_string()),
            authors: vec!["Ada Lovelace".into()],
            sources: vec![SourceMatch {
                source: "arxiv".into(),
                result: candidate.map(|t| MatchResult {
                    source: "arxiv".into(),
                    title: Some(t.to_string()),
                    authors: vec![],
                    score,
                }),
            }],
            score,
            classification: Classification::from_score(score, 0.5),
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn progress_line_for_results_only() {
        let event = ProgressEvent::Result {
            index: 0,
            total: 2,
            entry: Box::new(entry("Attention Is All You Need", 0.93, Some("Attention"))),
        };
        assert_eq!(
            progress_line(&event, PLAIN).unwrap(),
            "[1/2] \"Attention Is All You Need\" -> VERIFIED (0.93, arxiv)"
        );

        let event = ProgressEvent::Checking {
            index: 0,
            total: 2,
            title: "x".into(),
        };
        assert!(progress_line(&event, PLAIN).is_none());
    }

    #[test]
    fn unverified_block_lists_closest_match() {
        let report = Report::from_entries(vec![
            entry("Real Paper", 0.9, Some("Real Paper")),
            entry("Invented Paper", 0.3, Some("Somewhat Related")),
            entry("Nothing Like It", 0.0, None),
        ]);
        let out = render(|w| print_unverified(w, &report, PLAIN));
        assert!(out.contains("UNVERIFIED CITATIONS"));
        assert!(!out.contains("Title: Real Paper"));
        assert!(out.contains("Closest match (arxiv, 0.30): Somewhat Related"));
        assert!(out.contains("Title: Nothing Like It\n  Authors: Ada Lovelace\n  No candidate from any source"));
    }

    #[test]
    fn nothing_printed_when_all_verified() {
        let report = Report::from_entries(vec![entry("Real Paper", 0.9, Some("Real Paper"))]);
        assert_eq!(render(|w| print_unverified(w, &report, PLAIN)), "");
    }

    #[test]
    fn summary_counts() {
        let report = Report::from_entries(vec![
            entry("a", 0.9, Some("a")),
            entry("b", 0.1, None),
        ]);
        let out = render(|w| print_summary(w, &report, 0.5, PLAIN));
        assert!(out.contains("Citations checked: 2"));
        assert!(out.contains("Verified: 1"));
        assert!(out.contains("Unverified: 1"));
        assert!(out.contains("Candidates returned: arxiv 1"));
    }

    #[test]
    fn extraction_summary_reports_stop() {
        let block = locate("Body\nReferences\n[1] One.\n\n[2] Two.\nAppendix\nmore");
        let out = render(|w| print_extraction_summary(w, "paper.pdf", &block, PLAIN));
        assert!(out.contains("heading on line 2 (2 non-blank lines)"));
        assert!(out.contains("Section ends at line 6: section heading"));

        let block = locate("no heading here");
        let out = render(|w| print_extraction_summary(w, "paper.pdf", &block, PLAIN));
        assert!(out.contains("No reference heading found"));
    }

    #[test]
    fn keys_are_masked() {
        assert_eq!(mask(None), "(not set)");
        assert_eq!(mask(Some("short")), "****");
        assert_eq!(mask(Some("sk-1234567890abcd")), "****abcd");

        let config = Config {
            s2_api_key: Some("s2-secret-value-9876".into()),
            ..Config::default()
        };
        let out = render(|w| print_config(w, None, Path::new(".refverify.toml"), &config));
        assert!(!out.contains("s2-secret-value"));
        assert!(out.contains("****9876"));
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
        assert_eq!(truncate("short", 10), "short");
    }
}
