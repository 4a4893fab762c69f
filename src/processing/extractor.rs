use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::models::DocumentFormat;

/// Real MRZ lines are 30, 36 or 44 characters; anything shorter than
/// this after cleanup is noise.
pub const MIN_CANDIDATE_LEN: usize = 28;

/// Cleaned lines at or below this length are treated as TD1 rows.
const TD1_MAX_LINE_LEN: usize = 32;

/// A two-line window whose longer line reaches this length is a
/// passport-format zone rather than a TD2 card.
const TD3_MIN_LINE_LEN: usize = 40;

fn strip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Z0-9<]").expect("fixed pattern compiles"))
}

/// The selected 2 or 3 line window, each line padded to the fixed length
/// the decoder expects.
#[derive(Debug, Clone)]
pub struct MrzCandidate {
    pub format: DocumentFormat,
    pub lines: Vec<String>,
}

impl MrzCandidate {
    /// Variant with the common misread of the filler as `C` substituted
    /// back. The substitution is a heuristic with no confidence attached
    /// and also hits legitimate letters, so callers use it only as a
    /// second parse attempt after the raw window fails.
    pub fn corrected_lines(&self) -> Vec<String> {
        self.lines.iter().map(|line| line.replace('C', "<")).collect()
    }

    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

/// Finds the machine-readable zone inside raw recognizer output.
#[derive(Debug, Default)]
pub struct MrzExtractor;

impl MrzExtractor {
    pub fn new() -> Self {
        MrzExtractor
    }

    /// Cleaned lines that survive the candidate filter, in top-to-bottom
    /// order: uppercased, stripped of everything outside `A-Z0-9<`, at
    /// least [`MIN_CANDIDATE_LEN`] long, containing a filler and at
    /// least one alphanumeric character.
    pub fn candidate_lines(&self, text: &str) -> Vec<String> {
        text.lines()
            .map(|line| {
                strip_pattern()
                    .replace_all(&line.to_uppercase(), "")
                    .into_owned()
            })
            .filter(|line| Self::qualifies(line))
            .collect()
    }

    /// Select the best window of candidate lines, or `None` when the
    /// frame holds no plausible zone. The zone always sits at the bottom
    /// of the capture, so the bottom-most qualifying lines win over any
    /// text recognized above them.
    pub fn extract(&self, text: &str) -> Option<MrzCandidate> {
        let candidates = self.candidate_lines(text);
        if candidates.len() < 2 {
            return None;
        }

        let (format, window) = if candidates.len() >= 3
            && candidates[candidates.len() - 3..]
                .iter()
                .all(|line| line.len() <= TD1_MAX_LINE_LEN)
        {
            (
                DocumentFormat::TD1,
                candidates[candidates.len() - 3..].to_vec(),
            )
        } else {
            let window = candidates[candidates.len() - 2..].to_vec();
            let longest = window.iter().map(|line| line.len()).max().unwrap_or(0);
            let format = if longest >= TD3_MIN_LINE_LEN {
                DocumentFormat::TD3
            } else {
                DocumentFormat::TD2
            };
            (format, window)
        };

        // A real zone always mixes letters and digits somewhere in the
        // window; a window without both is recognizer noise.
        let has_digit = window
            .iter()
            .any(|line| line.chars().any(|c| c.is_ascii_digit()));
        let has_alpha = window
            .iter()
            .any(|line| line.chars().any(|c| c.is_ascii_uppercase()));
        if !has_digit || !has_alpha {
            debug!("candidate window rejected: letters or digits missing");
            return None;
        }

        let target = format.line_length();
        let lines = window
            .into_iter()
            .map(|line| Self::pad_to(line, target))
            .collect();
        Some(MrzCandidate { format, lines })
    }

    fn qualifies(line: &str) -> bool {
        line.len() >= MIN_CANDIDATE_LEN
            && line.contains('<')
            && line.chars().any(|c| c.is_ascii_alphanumeric())
    }

    // Column positions in the decoder are absolute, so every line gets
    // the exact expected width.
    fn pad_to(mut line: String, target: usize) -> String {
        line.truncate(target);
        while line.len() < target {
            line.push('<');
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TD3_LINE1: &str = "P<UTOMUSTERMANN<<ERIKA<<<<<<<<<<<<<<<<<<<<<<";
    const TD3_LINE2: &str = "C01X00T478UTO7408122F1204159<<<<<<<<<<<<<<04";

    #[test]
    fn noise_line_without_filler_or_digit_is_dropped() {
        let noise = "QWERTYUIOPASDFGHJKLZXCVBNMQWERTYUIOPASDF";
        assert_eq!(noise.len(), 40);
        let text = format!("{}\n{}", noise, TD3_LINE2);
        let extractor = MrzExtractor::new();
        let candidates = extractor.candidate_lines(&text);
        assert_eq!(candidates, vec![TD3_LINE2.to_string()]);
    }

    #[test]
    fn two_line_passport_window_is_found_below_noise() {
        let text = format!("VISIT UTOPIA\n{}\n{}", TD3_LINE1, TD3_LINE2);
        let candidate = MrzExtractor::new().extract(&text).unwrap();
        assert_eq!(candidate.format, DocumentFormat::TD3);
        assert_eq!(candidate.lines.len(), 2);
        assert_eq!(candidate.lines[0], TD3_LINE1);
        assert_eq!(candidate.lines[1], TD3_LINE2);
    }

    #[test]
    fn cleanup_uppercases_and_strips_foreign_characters() {
        let dirty = format!("  {}  ", TD3_LINE2.to_lowercase().replace("uto", "ut-o"));
        let candidates = MrzExtractor::new().candidate_lines(&dirty);
        assert_eq!(candidates, vec![TD3_LINE2.to_string()]);
    }

    #[test]
    fn single_candidate_is_not_a_window() {
        let text = format!("ONE LINE ONLY\n{}", TD3_LINE2);
        assert!(MrzExtractor::new().extract(&text).is_none());
    }

    #[test]
    fn three_short_lines_select_the_card_format() {
        let l1 = "I<UTOD231458907<<<<<<<<<<<<<<<";
        let l2 = "7408122F1204159UTO<<<<<<<<<<<6";
        let l3 = "MUSTERMANN<<ERIKA<<<<<<<<<<<<<";
        let text = format!("HEADER TEXT\n{}\n{}\n{}", l1, l2, l3);
        let candidate = MrzExtractor::new().extract(&text).unwrap();
        assert_eq!(candidate.format, DocumentFormat::TD1);
        assert_eq!(candidate.lines, vec![l1, l2, l3]);
    }

    #[test]
    fn short_lines_are_padded_to_format_length() {
        let truncated = &TD3_LINE2[0..41];
        let text = format!("{}\n{}", TD3_LINE1, truncated);
        let candidate = MrzExtractor::new().extract(&text).unwrap();
        assert_eq!(candidate.format, DocumentFormat::TD3);
        assert_eq!(candidate.lines[1].len(), 44);
        assert!(candidate.lines[1].ends_with("<<<"));
    }

    #[test]
    fn window_without_digits_is_rejected() {
        let a = "ABCDEFGH<IJKLMNOP<QRSTUVWX<YZAB<<<<<";
        let b = "ZYXWVUTS<RQPONMLK<JIHGFEDC<BAZY<<<<<";
        let text = format!("{}\n{}", a, b);
        assert!(MrzExtractor::new().extract(&text).is_none());
    }

    #[test]
    fn corrected_variant_substitutes_filler_for_c() {
        let candidate = MrzCandidate {
            format: DocumentFormat::TD3,
            lines: vec![TD3_LINE2.to_string()],
        };
        let corrected = candidate.corrected_lines();
        assert!(corrected[0].starts_with("<01X00T478"));
        assert!(!corrected[0].contains('C'));
    }
}
