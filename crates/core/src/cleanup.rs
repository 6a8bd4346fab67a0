// Source text cleanup
//
// Scraped chapters carry site boilerplate (banners, donation pleas, "read at"
// notices) that varies slightly between chapters. Lines close enough to a
// known pattern are dropped before translation.

use std::collections::HashMap;

/// Sørensen–Dice coefficient over character bigrams
///
/// Case-insensitive; whitespace runs are collapsed first. Two empty strings are
/// identical; strings shorter than two characters only match exactly.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.len() < 2 || b_chars.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::new();
    for pair in a_chars.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_default() += 1;
    }

    let mut shared = 0usize;
    for pair in b_chars.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }

    (2 * shared) as f64 / (a_chars.len() + b_chars.len() - 2) as f64
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Drop lines matching any pattern at or above `threshold`
///
/// Runs of blank lines left behind collapse to one; leading and trailing blank
/// lines are removed.
pub fn strip<'a, L, P>(lines: L, patterns: &[P], threshold: f64) -> Vec<&'a str>
where
    L: IntoIterator<Item = &'a str>,
    P: AsRef<str>,
{
    let mut kept: Vec<&'a str> = Vec::new();
    let mut previous_blank = true;

    for line in lines {
        let blank = line.trim().is_empty();
        if blank {
            if !previous_blank {
                kept.push("");
            }
            previous_blank = true;
            continue;
        }

        let boilerplate = patterns
            .iter()
            .any(|p| similarity(line, p.as_ref()) >= threshold);
        if boilerplate {
            continue;
        }

        kept.push(line);
        previous_blank = false;
    }

    while kept.last().is_some_and(|l| l.is_empty()) {
        kept.pop();
    }
    kept
}

/// Line-wise [`strip`] over a whole text, with line endings normalized
pub fn clean_text<P: AsRef<str>>(text: &str, patterns: &[P], threshold: f64) -> String {
    let text = text.trim_start_matches('\u{feff}');
    strip(text.lines().map(str::trim_end), patterns, threshold).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("Read more at site", "read  more AT site"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("a", "b"), 0.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
    }

    #[test]
    fn test_similarity_near_duplicate() {
        let score = similarity(
            "Read the latest chapters at example.com",
            "Read the latest chapter at example.com!",
        );
        assert!(score > 0.85, "score was {score}");
        assert!(similarity("He drew his sword.", "Read the latest chapters at example.com") < 0.3);
    }

    #[test]
    fn test_strip_removes_boilerplate_and_collapses_blanks() {
        let patterns = ["Read the latest chapters at example.com"];
        let lines = vec![
            "",
            "Chapter 12",
            "",
            "Read the latest chapters at example.com!",
            "",
            "",
            "He drew his sword.",
            "",
            "read the latest chapters at EXAMPLE.com",
            "",
        ];

        let kept = strip(lines, &patterns, 0.85);
        assert_eq!(kept, vec!["Chapter 12", "", "He drew his sword."]);
    }

    #[test]
    fn test_clean_text_without_patterns() {
        let text = "\u{feff}Line one  \r\n\r\n\r\nLine two\r\n";
        assert_eq!(clean_text::<&str>(text, &[], 0.85), "Line one\n\nLine two");
    }

    #[test]
    fn test_clean_text_all_boilerplate_is_empty() {
        let text = "Support us on Patreon\n\nSupport us on patreon!\n";
        assert_eq!(clean_text(text, &["Support us on Patreon"], 0.85), "");
    }
}
