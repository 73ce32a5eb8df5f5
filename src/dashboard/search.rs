//! Client-side search over the cached petitions and polls.

use log::warn;
use regex::{Captures, RegexBuilder};

use crate::dashboard::normalize::{PetitionView, PollView};

/// Results shown in the search-as-you-type dropdown.
pub const DROPDOWN_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchHit<'a> {
    Petition(&'a PetitionView),
    Poll(&'a PollView),
}

impl<'a> SearchHit<'a> {
    pub fn title(&self) -> &'a str {
        match self {
            Self::Petition(petition) => &petition.title,
            Self::Poll(poll) => &poll.question,
        }
    }
}

fn matches_any(needle: &str, fields: &[&str]) -> bool {
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Case-insensitive substring search. Petitions come before polls; `limit`
/// caps the total. A blank query matches nothing.
pub fn search<'a>(
    query: &str,
    petitions: &'a [PetitionView],
    polls: &'a [PollView],
    limit: Option<usize>,
) -> Vec<SearchHit<'a>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let petition_hits = petitions
        .iter()
        .filter(|p| {
            matches_any(
                &needle,
                &[
                    p.title.as_str(),
                    p.description.as_str(),
                    p.location.as_str(),
                    p.category.as_str(),
                ],
            )
        })
        .map(SearchHit::Petition);
    let poll_hits = polls
        .iter()
        .filter(|p| {
            matches_any(
                &needle,
                &[p.question.as_str(), p.description.as_str(), p.location.as_str()],
            )
        })
        .map(SearchHit::Poll);
    petition_hits
        .chain(poll_hits)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Wrap every case-insensitive occurrence of `term` in a highlight mark,
/// keeping the original casing. The term is matched literally.
/// Surrounding whitespace is ignored, as in [`search`].
pub fn highlight_search_term(text: &str, term: &str) -> String {
    let term = term.trim();
    if term.is_empty() {
        return text.to_string();
    }
    let pattern = match RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!("Search term could not be highlighted: {e}");
            return text.to_string();
        }
    };
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            format!("<mark class=\"search-highlight\">{}</mark>", &caps[0])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::dashboard::normalize::examples::{raw_petition, raw_poll};

    use super::*;

    #[test]
    fn highlights_preserve_case() {
        assert_eq!(
            highlight_search_term("Clean Water Act", "water"),
            "Clean <mark class=\"search-highlight\">Water</mark> Act"
        );
        assert_eq!(highlight_search_term("Clean Water Act", ""), "Clean Water Act");
        assert_eq!(highlight_search_term("Clean Water Act", "   "), "Clean Water Act");
        assert_eq!(
            highlight_search_term("Clean Water Act", " water "),
            "Clean <mark class=\"search-highlight\">Water</mark> Act"
        );
    }

    #[test]
    fn metacharacters_are_literal() {
        assert_eq!(
            highlight_search_term("Budget (2024) +5%", "(2024) +"),
            "Budget <mark class=\"search-highlight\">(2024) +</mark>5%"
        );
        assert_eq!(
            highlight_search_term("a.b axb", "."),
            "a<mark class=\"search-highlight\">.</mark>b axb"
        );
        assert_eq!(highlight_search_term("no match", "[unclosed"), "no match");
    }

    #[test]
    fn petitions_come_first_and_dropdown_is_capped() {
        let now = Utc::now();
        let petitions: Vec<_> = (0..6)
            .map(|i| PetitionView::from_raw(raw_petition(&format!("p{i}"), "active", 0, 1), now))
            .collect();
        let polls: Vec<_> = (0..6)
            .map(|i| PollView::from_raw(raw_poll(&format!("q{i}"), &[0, 0], None), now))
            .collect();

        // Petition titles are "Petition pN"; poll questions are "Question qN".
        let hits = search("ION", &petitions, &polls, Some(DROPDOWN_LIMIT));
        assert_eq!(hits.len(), DROPDOWN_LIMIT);
        assert!(matches!(hits[0], SearchHit::Petition(_)));
        assert!(matches!(hits[6], SearchHit::Poll(_)));

        let all = search("ion", &petitions, &polls, None);
        assert_eq!(all.len(), 12);
        assert!(search("   ", &petitions, &polls, None).is_empty());
        assert_eq!(search("riverside", &petitions, &polls, None).len(), 6);
    }
}
