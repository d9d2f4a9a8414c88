//! Candidate selection for the self-consistency and tree-of-thought
//! strategies.
//!
//! All tie-breaks prefer the earliest candidate.

use std::sync::LazyLock;

use regex::Regex;

const BALLOT_PHRASE: &str = "best answer is";

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// The most frequent string. Ties go to the one seen first.
pub fn majority(candidates: &[String]) -> Option<&str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for candidate in candidates {
        match counts.iter_mut().find(|(seen, _)| *seen == candidate.as_str()) {
            Some((_, n)) => *n += 1,
            None => counts.push((candidate.as_str(), 1)),
        }
    }
    let best = counts.iter().map(|(_, n)| *n).max()?;
    counts.into_iter().find(|(_, n)| *n == best).map(|(s, _)| s)
}

/// The 1-based candidate id a voter chose.
///
/// Takes the first integer after the last occurrence of "best answer is"
/// that has one, across line breaks. `None` when no occurrence is followed
/// by an integer.
pub fn parse_vote(text: &str) -> Option<usize> {
    text.rmatch_indices(BALLOT_PHRASE).find_map(|(at, _)| {
        INTEGER_RE
            .find(&text[at + BALLOT_PHRASE.len()..])?
            .as_str()
            .parse()
            .ok()
    })
}

/// Vote counts per candidate plus the ballots that could not be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    /// Votes per candidate, indexed from 0.
    pub counts: Vec<u32>,
    /// Positions of ballots with no recognizable vote.
    pub unparsed: Vec<usize>,
    /// Ballots naming a candidate that does not exist.
    pub out_of_range: usize,
}

/// Count ballots against `candidate_count` candidates.
pub fn tally<S: AsRef<str>>(votes: &[S], candidate_count: usize) -> VoteTally {
    let mut tally = VoteTally {
        counts: vec![0; candidate_count],
        ..VoteTally::default()
    };
    for (pos, vote) in votes.iter().enumerate() {
        match parse_vote(vote.as_ref()) {
            Some(id) if (1..=candidate_count).contains(&id) => tally.counts[id - 1] += 1,
            Some(_) => tally.out_of_range += 1,
            None => tally.unparsed.push(pos),
        }
    }
    tally
}

/// Index with the most votes, lowest index on ties. `None` for no candidates.
pub fn select(counts: &[u32]) -> Option<usize> {
    let best = counts.iter().copied().max()?;
    counts.iter().position(|c| *c == best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn majority_picks_most_common() {
        let c = strings(&["A", "A", "B", "A", "C"]);
        assert_eq!(majority(&c), Some("A"));
    }

    #[test]
    fn majority_tie_goes_to_first_seen() {
        assert_eq!(majority(&strings(&["B", "A", "A", "B"])), Some("B"));
        assert_eq!(majority(&strings(&["x", "y", "z"])), Some("x"));
        assert_eq!(majority(&[]), None);
    }

    #[test]
    fn parse_vote_variants() {
        assert_eq!(parse_vote("The best answer is 2"), Some(2));
        assert_eq!(parse_vote("Thinking...\nThe best answer is\n3."), Some(3));
        assert_eq!(parse_vote("best answer is 1, no wait, the best answer is 2"), Some(2));
        assert_eq!(parse_vote("The best answer is Answer 12 because"), Some(12));
        assert_eq!(parse_vote("I pick 2"), None);
        assert_eq!(parse_vote("The best answer is unclear"), None);
    }

    #[test]
    fn parse_vote_falls_back_to_earlier_phrase() {
        assert_eq!(
            parse_vote("The best answer is 2. Looking again, I still think the best answer is clear."),
            Some(2)
        );
        assert_eq!(parse_vote("best answer is ?\nbest answer is also unclear"), None);
    }

    #[test]
    fn tally_counts_and_discards() {
        let votes = [
            "The best answer is 2",
            "The best answer is 2",
            "no idea",
            "The best answer is 1",
            "The best answer is 9",
        ];
        let t = tally(&votes, 3);
        assert_eq!(t.counts, vec![1, 2, 0]);
        assert_eq!(t.unparsed, vec![2]);
        assert_eq!(t.out_of_range, 1);
    }

    #[test]
    fn three_votes_for_second_candidate_select_it() {
        let votes = [
            "The best answer is 2",
            "The best answer is 1",
            "The best answer is 2",
            "I cannot decide",
            "After comparing, the best answer is 2.",
        ];
        let t = tally(&votes, 3);
        assert_eq!(t.counts, vec![1, 3, 0]);
        assert_eq!(t.unparsed, vec![3]);
        assert_eq!(select(&t.counts), Some(1));
    }

    #[test]
    fn select_highest_then_lowest_index() {
        assert_eq!(select(&[1, 3, 0]), Some(1));
        assert_eq!(select(&[2, 2, 1]), Some(0));
        assert_eq!(select(&[0, 0, 0]), Some(0));
        assert_eq!(select(&[]), None);
    }
}
