// File: ./src/pipeline/similarity.rs
//! Order-insensitive token-set similarity on a 0..=100 scale.
use std::collections::BTreeSet;

/// Apostrophes are dropped rather than split on, so "Farmer's" and
/// "Farmers" tokenize the same.
fn tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn join(parts: &[&String]) -> String {
    parts.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
}

/// Length of the longest common subsequence, by chars.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        let mut diag = 0;
        for (j, cb) in b.iter().enumerate() {
            let up = row[j + 1];
            row[j + 1] = if ca == cb { diag + 1 } else { up.max(row[j]) };
            diag = up;
        }
    }
    row[b.len()]
}

/// Indel similarity: `2 * lcs / (len(a) + len(b))`, scaled to 0..=100.
/// Only insertions and deletions count, so a substitution costs two edits.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// Token-set similarity of two strings.
///
/// Empty input on either side scores 0. When the shared tokens are non-empty
/// and one side's tokens are a subset of the other's the score is 100.
/// Otherwise the best ratio among the shared tokens and each side's
/// shared-plus-remaining tokens is returned.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let sect: Vec<&String> = ta.intersection(&tb).collect();
    let diff_ab: Vec<&String> = ta.difference(&tb).collect();
    let diff_ba: Vec<&String> = tb.difference(&ta).collect();

    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect_str = join(&sect);
    let combined_ab = join(&sect.iter().chain(diff_ab.iter()).copied().collect::<Vec<_>>());
    let combined_ba = join(&sect.iter().chain(diff_ba.iter()).copied().collect::<Vec<_>>());

    let mut best = ratio(&combined_ab, &combined_ba);
    if !sect_str.is_empty() {
        best = best
            .max(ratio(&sect_str, &combined_ab))
            .max(ratio(&sect_str, &combined_ba));
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_side_scores_zero() {
        assert_eq!(token_set_ratio("", "market"), 0.0);
        assert_eq!(token_set_ratio("!!!", "market"), 0.0);
    }

    #[test]
    fn test_subset_scores_full() {
        assert_eq!(
            token_set_ratio("Oxford Farmers Market", "Oxford Farmers Market - Weekly"),
            100.0
        );
        assert_eq!(token_set_ratio("Trivia NIGHT", "night trivia"), 100.0);
        assert_eq!(
            token_set_ratio("Oxford Farmers Market", "Oxford Farmer\u{2019}s Market \u{2014} Weekly"),
            100.0
        );
    }

    #[test]
    fn test_disjoint_titles_score_low() {
        assert!(token_set_ratio("Trivia Night", "Jazz Quartet") < 75.0);
    }

    #[test]
    fn test_ratio_counts_insertions_and_deletions() {
        assert_eq!(ratio("", ""), 100.0);
        assert_eq!(ratio("abc", ""), 0.0);
        // lcs "ac" of 6 chars
        assert!((ratio("abc", "ac") - 80.0).abs() < 1e-9);
        assert!((ratio("kitten", "sitting") - 61.538).abs() < 0.01);
    }

    #[test]
    fn test_abbreviated_day_clears_title_threshold() {
        let score = token_set_ratio("Oxford Farmers Market Saturday", "Oxford Farmers Market Sat");
        assert!(score >= 88.0 && score < 92.0, "score was {}", score);
    }

    #[test]
    fn test_partial_overlap_is_between_floor_and_threshold() {
        let score = token_set_ratio("Jazz Night Downtown", "Jazz Night Uptown");
        assert!(score >= 75.0 && score < 88.0, "score was {}", score);
    }
}
