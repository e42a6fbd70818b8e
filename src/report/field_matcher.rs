// Locates the vote count of a candidate in the text of a result page.
//
// A result line reads `<NAME> <votes> <percent> %`, for instance
// `DANIEL NOBOA AZIN 1.500.000 54,88 %`. The grouping separator of the vote
// count may be a dot or a comma depending on the source.

use log::debug;
use regex::Regex;
use snafu::prelude::*;

use crate::report::*;

pub struct FieldMatcher {
    candidates: Vec<(String, Regex)>,
}

/// The pattern of the result line of one candidate. Whitespace inside the
/// name matches any run of whitespace, since extracted text may break lines.
pub fn candidate_pattern(name: &str) -> Result<Regex, regex::Error> {
    let words: Vec<String> = name.split_whitespace().map(regex::escape).collect();
    let boundary = match name.trim_start().chars().next() {
        Some(c) if c.is_alphanumeric() => r"\b",
        _ => "",
    };
    Regex::new(&format!(
        r"{}{}\s+([\d.,]+)\s+([\d.,]+)\s*%",
        boundary,
        words.join(r"\s+")
    ))
}

/// Parses a vote count written with grouping separators.
/// Anything left after removing the separators must be digits.
pub fn parse_grouped_count(s: &str) -> Option<u64> {
    let digits: String = s.chars().filter(|c| *c != '.' && *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// The vote count following the first line that matches `pattern`.
pub fn match_votes(text: &str, pattern: &Regex) -> Option<u64> {
    let caps = pattern.captures(text)?;
    parse_grouped_count(caps.get(1)?.as_str())
}

impl FieldMatcher {
    pub fn new(candidate_a: &str, candidate_b: &str) -> ReportResult<FieldMatcher> {
        let mut candidates = Vec::new();
        for name in [candidate_a, candidate_b] {
            let re = candidate_pattern(name).context(InvalidPatternSnafu { candidate: name })?;
            debug!("FieldMatcher: pattern for {}: {}", name, re.as_str());
            candidates.push((name.to_string(), re));
        }
        Ok(FieldMatcher { candidates })
    }

    /// Reads both vote counts. If either one is missing or unreadable, the
    /// document yields no record at all.
    pub fn extract_record(
        &self,
        path: &str,
        province: &str,
        text: &str,
    ) -> ReportResult<ExtractedRecord> {
        let mut votes: Vec<u64> = Vec::with_capacity(2);
        for (name, re) in self.candidates.iter() {
            let v = match_votes(text, re).context(FieldMatchSnafu {
                path,
                candidate: name.as_str(),
            })?;
            votes.push(v);
        }
        Ok(ExtractedRecord {
            province: province.to_string(),
            votes_a: votes[0],
            votes_b: votes[1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> FieldMatcher {
        FieldMatcher::new("LUISA GONZALEZ", "DANIEL NOBOA AZIN").unwrap()
    }

    #[test]
    fn comma_grouped_single_line() {
        let text = "LUISA GONZALEZ 1,234,567 45.12 %  DANIEL NOBOA AZIN 1,500,000 54.88 %";
        let r = matcher().extract_record("azuay.pdf", "Azuay", text).unwrap();
        assert_eq!(
            r,
            ExtractedRecord {
                province: "Azuay".to_string(),
                votes_a: 1234567,
                votes_b: 1500000,
            }
        );
    }

    #[test]
    fn dot_grouped_lines() {
        let text = "CANDIDATO VOTOS %\nDANIEL NOBOA\nAZIN 412.003 58,31 %\nLUISA   GONZALEZ 294.576 41,69 %\n";
        let r = matcher().extract_record("x.pdf", "Azuay", text).unwrap();
        assert_eq!(r.votes_a, 294576);
        assert_eq!(r.votes_b, 412003);
    }

    #[test]
    fn missing_candidate() {
        let text = "LUISA GONZALEZ 1,234,567 45.12 %";
        let e = matcher().extract_record("guayas.pdf", "Guayas", text).unwrap_err();
        match e {
            ReportError::FieldMatch { path, candidate } => {
                assert_eq!(path, "guayas.pdf");
                assert_eq!(candidate, "DANIEL NOBOA AZIN");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn separators_only_is_rejected() {
        let text = "LUISA GONZALEZ ., 45.12 %  DANIEL NOBOA AZIN 1,500,000 54.88 %";
        assert!(matcher().extract_record("x.pdf", "X", text).is_err());
    }

    #[test]
    fn name_must_start_a_word() {
        let re = candidate_pattern("LUISA GONZALEZ").unwrap();
        assert_eq!(match_votes("MARIALUISA GONZALEZ 12 1,00 %", &re), None);
        assert_eq!(match_votes("(LUISA GONZALEZ) 12 1,00 %", &re), None);
        assert_eq!(match_votes("- LUISA GONZALEZ 12 1,00 %", &re), Some(12));
    }

    #[test]
    fn grouped_counts() {
        assert_eq!(parse_grouped_count("1.234.567"), Some(1234567));
        assert_eq!(parse_grouped_count("1,234,567"), Some(1234567));
        assert_eq!(parse_grouped_count("0"), Some(0));
        assert_eq!(parse_grouped_count(".,"), None);
        assert_eq!(parse_grouped_count(""), None);
    }
}
