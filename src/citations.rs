//! Pure-function citation formatters: apa, mla, chicago, ieee, gbt7714.
//!
//! These have no external dependency and nothing non-deterministic about
//! them, so — unlike the stage executors — there's no reason for them to be
//! anything but fully implemented.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyle {
    Apa,
    Mla,
    Chicago,
    Ieee,
    Gbt7714,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CitationData {
    pub id: String,
    pub authors: Vec<String>,
    pub year: Option<u32>,
    pub title: String,
    pub venue: Option<String>,
    pub doi: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Formatted {
    pub in_text: std::collections::HashMap<String, String>,
    pub reference: std::collections::HashMap<String, String>,
    pub list: Vec<String>,
}

fn authors_surname_first(authors: &[String]) -> Vec<String> {
    authors
        .iter()
        .map(|a| {
            let parts: Vec<&str> = a.split_whitespace().collect();
            match parts.as_slice() {
                [] => String::new(),
                [single] => single.to_string(),
                [given @ .., surname] => format!("{surname}, {}", given.join(" ")),
            }
        })
        .collect()
}

fn join_authors_and(authors: &[String]) -> String {
    match authors {
        [] => "Anonymous".to_string(),
        [one] => one.clone(),
        [one, two] => format!("{one} & {two}"),
        [one, rest @ ..] => format!("{one}, {}", join_authors_and(rest)),
    }
}

fn apa_reference(c: &CitationData) -> String {
    let authors = authors_surname_first(&c.authors);
    let year = c.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".into());
    let venue = c.venue.as_deref().map(|v| format!(" {v}.")).unwrap_or_default();
    let doi = c.doi.as_deref().map(|d| format!(" https://doi.org/{d}")).unwrap_or_default();
    format!("{} ({year}). {}.{venue}{doi}", join_authors_and(&authors), c.title)
}

fn apa_in_text(c: &CitationData) -> String {
    let surname = c.authors.first().and_then(|a| a.split_whitespace().last()).unwrap_or("Anonymous");
    let year = c.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".into());
    format!("({surname}, {year})")
}

fn mla_reference(c: &CitationData) -> String {
    let authors = authors_surname_first(&c.authors);
    let venue = c.venue.as_deref().map(|v| format!(", {v}")).unwrap_or_default();
    let year = c.year.map(|y| format!(", {y}")).unwrap_or_default();
    format!("{}. \"{}\"{venue}{year}.", join_authors_and(&authors), c.title)
}

fn mla_in_text(c: &CitationData) -> String {
    let surname = c.authors.first().and_then(|a| a.split_whitespace().last()).unwrap_or("Anonymous");
    format!("({surname})")
}

fn chicago_reference(c: &CitationData) -> String {
    let authors = authors_surname_first(&c.authors);
    let year = c.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".into());
    let venue = c.venue.as_deref().map(|v| format!(" {v}.")).unwrap_or_default();
    format!("{}. \"{}\". {year}.{venue}", join_authors_and(&authors), c.title)
}

fn chicago_in_text(c: &CitationData) -> String {
    apa_in_text(c)
}

fn ieee_reference(index: usize, c: &CitationData) -> String {
    let authors = c.authors.join(", ");
    let venue = c.venue.as_deref().map(|v| format!(", {v}")).unwrap_or_default();
    let year = c.year.map(|y| format!(", {y}")).unwrap_or_default();
    format!("[{index}] {authors}, \"{}\"{venue}{year}.", c.title)
}

fn gbt7714_reference(index: usize, c: &CitationData) -> String {
    let authors = c.authors.join(", ");
    let venue = c.venue.as_deref().map(|v| format!(". {v}")).unwrap_or_default();
    let year = c.year.map(|y| format!(", {y}")).unwrap_or_default();
    format!("[{index}] {authors}. {}{venue}{year}.", c.title)
}

/// Numeric styles (ieee, gbt7714) sort by first appearance in `citations`;
/// author-year styles (apa, mla, chicago) sort by first-author surname.
pub fn format(style: CitationStyle, citations: &[CitationData]) -> Formatted {
    let mut in_text = std::collections::HashMap::new();
    let mut reference = std::collections::HashMap::new();
    let mut ordered: Vec<&CitationData> = citations.iter().collect();

    match style {
        CitationStyle::Ieee | CitationStyle::Gbt7714 => {
            for (index, c) in ordered.iter().enumerate() {
                let n = index + 1;
                in_text.insert(c.id.clone(), format!("[{n}]"));
                let reference_str = match style {
                    CitationStyle::Ieee => ieee_reference(n, c),
                    _ => gbt7714_reference(n, c),
                };
                reference.insert(c.id.clone(), reference_str);
            }
        }
        CitationStyle::Apa | CitationStyle::Mla | CitationStyle::Chicago => {
            ordered.sort_by_key(|c| c.authors.first().cloned().unwrap_or_default());
            for c in &ordered {
                let (text, reference_str) = match style {
                    CitationStyle::Apa => (apa_in_text(c), apa_reference(c)),
                    CitationStyle::Mla => (mla_in_text(c), mla_reference(c)),
                    _ => (chicago_in_text(c), chicago_reference(c)),
                };
                in_text.insert(c.id.clone(), text);
                reference.insert(c.id.clone(), reference_str);
            }
        }
    }

    let list = ordered.iter().filter_map(|c| reference.get(&c.id).cloned()).collect();

    Formatted { in_text, reference, list }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(id: &str, surname: &str, year: u32) -> CitationData {
        CitationData {
            id: id.to_string(),
            authors: vec![format!("First {surname}")],
            year: Some(year),
            title: "A Study".into(),
            venue: Some("Journal of Things".into()),
            doi: Some("10.1/x".into()),
        }
    }

    #[test]
    fn apa_in_text_uses_surname_and_year() {
        let result = format(CitationStyle::Apa, &[citation("p1", "Smith", 2020)]);
        assert_eq!(result.in_text["p1"], "(Smith, 2020)");
    }

    #[test]
    fn ieee_numbers_by_appearance_order() {
        let result = format(CitationStyle::Ieee, &[citation("a", "Zed", 2020), citation("b", "Adams", 2019)]);
        assert_eq!(result.in_text["a"], "[1]");
        assert_eq!(result.in_text["b"], "[2]");
    }

    #[test]
    fn apa_sorts_by_author_surname() {
        let result = format(CitationStyle::Apa, &[citation("a", "Zed", 2020), citation("b", "Adams", 2019)]);
        assert!(result.list[0].contains("Adams"));
    }
}
