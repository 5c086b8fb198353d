// src/extract.rs
//! Pure text analysis over fetched posts: community questions and
//! high-frequency keywords. No I/O; runs alongside the LLM analysis.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::reddit::RedditPost;

/// Upper bound on returned questions and keywords.
pub const MAX_RESULTS: usize = 10;

/// Body text considered per post for keyword extraction.
const KEYWORD_BODY_CHARS: usize = 500;

static SENTENCE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!]\s+").expect("sentence split regex"));

/// A sentence counts as a question when it starts with a question word and
/// ends in a question mark.
static QUESTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(what|why|how|when|where|who|which|can|should|would|is|are|do|does)\b.*\?$",
    )
    .expect("question regex")
});

static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z]{3,}\b").expect("keyword regex"));

/// Common English function words dropped before counting.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "may", "might", "must", "can", "i",
        "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "this", "that",
        "these", "those", "what", "which", "who", "when", "where", "why", "how", "all", "each",
        "every", "both", "few", "more", "most", "other", "some", "such", "no", "not", "only",
        "own", "same", "so", "than", "too", "very", "just", "my", "your", "their",
    ]
    .into_iter()
    .collect()
});

/// Extract up to ten community questions from post titles and bodies,
/// deduplicated and ranked by the originating post's upvotes.
pub fn extract_questions(posts: &[RedditPost]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut found: Vec<(String, i64)> = Vec::new();

    for post in posts {
        for text in [post.title.as_str(), post.body.as_str()] {
            if !text.contains('?') {
                continue;
            }
            for sentence in SENTENCE_SPLIT_RE.split(text) {
                let sentence = sentence.trim();
                if sentence.contains('?')
                    && QUESTION_RE.is_match(sentence)
                    && sentence.chars().count() > 10
                    && seen.insert(sentence.to_lowercase())
                {
                    found.push((sentence.to_string(), post.upvotes));
                }
            }
        }
    }

    found.sort_by(|a, b| b.1.cmp(&a.1));
    found
        .into_iter()
        .take(MAX_RESULTS)
        .map(|(q, _)| q)
        .collect()
}

/// Extract up to ten keywords: top-3 bigrams first, then top-7 unigrams,
/// counted over all titles plus the first 500 chars of each body.
pub fn extract_keywords(posts: &[RedditPost]) -> Vec<String> {
    let mut pieces = Vec::with_capacity(posts.len() * 2);
    for post in posts {
        pieces.push(post.title.clone());
        if !post.body.is_empty() {
            pieces.push(post.body.chars().take(KEYWORD_BODY_CHARS).collect());
        }
    }
    let combined = pieces.join(" ").to_lowercase();

    let words: Vec<&str> = KEYWORD_RE.find_iter(&combined).map(|m| m.as_str()).collect();

    let mut word_counts: FrequencyTable = FrequencyTable::new();
    for w in &words {
        if !STOPWORDS.contains(*w) {
            word_counts.bump((*w).to_string());
        }
    }

    // A bigram survives when at least one of its words carries meaning.
    let mut bigram_counts: FrequencyTable = FrequencyTable::new();
    for pair in words.windows(2) {
        if !STOPWORDS.contains(pair[0]) || !STOPWORDS.contains(pair[1]) {
            bigram_counts.bump(format!("{} {}", pair[0], pair[1]));
        }
    }

    let mut keywords = bigram_counts.most_common(3);
    keywords.extend(word_counts.most_common(7));
    keywords.truncate(MAX_RESULTS);
    keywords
}

/// Frequency counter that breaks count ties by first-seen order.
struct FrequencyTable {
    counts: HashMap<String, (usize, usize)>,
    next_index: usize,
}

impl FrequencyTable {
    fn new() -> Self {
        Self {
            counts: HashMap::new(),
            next_index: 0,
        }
    }

    fn bump(&mut self, key: String) {
        let next = self.next_index;
        let entry = self.counts.entry(key).or_insert_with(|| {
            (0, next)
        });
        entry.0 += 1;
        self.next_index += 1;
    }

    fn most_common(&self, n: usize) -> Vec<String> {
        let mut entries: Vec<(&String, usize, usize)> = self
            .counts
            .iter()
            .map(|(k, (count, first))| (k, *count, *first))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        entries.into_iter().take(n).map(|(k, _, _)| k.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, body: &str, upvotes: i64) -> RedditPost {
        RedditPost {
            id: "t3_test".into(),
            title: title.into(),
            body: body.into(),
            upvotes,
            subreddit: "testing".into(),
        }
    }

    #[test]
    fn questions_require_leading_question_word() {
        let posts = vec![
            post("How do I charge an EV at home?", "", 50),
            post("Charging an EV at home?", "", 80), // no question word
            post("Tips for winter driving", "", 10),
        ];
        let qs = extract_questions(&posts);
        assert_eq!(qs, vec!["How do I charge an EV at home?".to_string()]);
    }

    #[test]
    fn questions_rank_by_upvotes_and_dedupe() {
        let posts = vec![
            post("What is the best home charger?", "", 10),
            post("what is the best home charger?", "", 900), // dup (case)
            post("Should I buy a used EV?", "", 400),
        ];
        let qs = extract_questions(&posts);
        assert_eq!(qs.len(), 2);
        // First occurrence wins the dedupe; ranking follows its post's upvotes.
        assert_eq!(qs[0], "Should I buy a used EV?");
    }

    #[test]
    fn questions_found_inside_bodies() {
        let posts = vec![post(
            "Long trip report",
            "We drove 600 miles. Why does charging slow down at 80%?",
            120,
        )];
        let qs = extract_questions(&posts);
        assert_eq!(qs, vec!["Why does charging slow down at 80%?".to_string()]);
    }

    #[test]
    fn short_questions_are_dropped() {
        let posts = vec![post("Why me?", "", 5)];
        assert!(extract_questions(&posts).is_empty());
    }

    #[test]
    fn keywords_prioritize_bigrams_over_unigrams() {
        let posts = vec![
            post("range anxiety is real", "range anxiety ruins road trips", 10),
            post("range anxiety again", "battery degradation concerns", 5),
        ];
        let kws = extract_keywords(&posts);
        assert_eq!(kws[0], "range anxiety");
        assert!(kws.contains(&"range".to_string()));
        assert!(kws.contains(&"anxiety".to_string()));
    }

    #[test]
    fn stopwords_are_excluded_from_unigrams() {
        let posts = vec![post(
            "the the the battery battery",
            "the and with from battery",
            1,
        )];
        let kws = extract_keywords(&posts);
        assert!(!kws.contains(&"the".to_string()));
        assert!(kws.contains(&"battery".to_string()));
    }

    #[test]
    fn keyword_list_is_bounded() {
        let body = "alpha bravo charlie delta echo foxtrot golf hotel india juliett kilo lima";
        let posts = vec![post(body, body, 1)];
        assert!(extract_keywords(&posts).len() <= MAX_RESULTS);
    }
}
