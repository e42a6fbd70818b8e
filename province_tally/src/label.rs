/*!
Normalization of province labels.

Source documents are named after the province they cover, wrapped in fixed
literal text (`elecciones-generales-2025-azuay.pdf`). The rules here turn such
a file name into a display label and flag the labels that still carry a year,
which happens when a file name does not follow the expected pattern.
*/

/// The literal substrings removed from a file name to obtain a province label.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LabelRules {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
}

impl LabelRules {
    pub fn new(prefixes: &[&str], suffixes: &[&str]) -> LabelRules {
        LabelRules {
            prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LabelRules {
    fn default() -> Self {
        LabelRules::new(&["elecciones-generales-2025-"], &[".pdf"])
    }
}

/// Turns a document file name into a title-cased province label.
///
/// Every occurrence of the configured prefixes and suffixes is removed, the
/// remaining whitespace is collapsed and the result is title-cased.
/// Returns `None` when nothing is left.
pub fn province_label(file_name: &str, rules: &LabelRules) -> Option<String> {
    let mut s = file_name.to_string();
    for literal in rules.prefixes.iter().chain(rules.suffixes.iter()) {
        if !literal.is_empty() {
            s = s.replace(literal.as_str(), "");
        }
    }
    let collapsed: Vec<&str> = s.split_whitespace().collect();
    if collapsed.is_empty() {
        None
    } else {
        Some(title_case(&collapsed.join(" ")))
    }
}

/// True if the label contains a run of four or more digits.
pub fn has_year_token(label: &str) -> bool {
    let mut run = 0;
    for c in label.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= 4 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Upper-cases the first letter of every word and lower-cases the rest.
///
/// A word starts after any character that is not a letter, so
/// `"santo-domingo"` becomes `"Santo-Domingo"`.
pub fn title_case(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                res.extend(c.to_lowercase());
            } else {
                res.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            res.push(c);
            prev_is_letter = false;
        }
    }
    res
}
