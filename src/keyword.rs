//! Keyword competition scoring.
//!
//! Everything here is derived from the total number of search results for a
//! term, so a live result and a synthetic demo result go through the same
//! functions.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::error::StudioResult;
use crate::parser::strip_markup;
use crate::providers::{KeywordSearch, SearchResult};

const BASE_SCORE: i32 = 70;
const RELATED_KEYWORD_LIMIT: usize = 10;
const DEMO_RELATED_LIMIT: usize = 5;
const DEMO_COUNT_UPPER: u64 = 150_000;
const DEMO_SUFFIXES: [&str; 8] = [
    "방법", "추천", "가이드", "팁", "정보", "비교", "순위", "리뷰",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Competition {
    Low,
    Medium,
    High,
}

impl Competition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Competition::Low => "low",
            Competition::Medium => "medium",
            Competition::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordAnalysis {
    pub keyword: String,
    pub total_count: u64,
    pub competition: Competition,
    pub score: u8,
    pub monthly_searches: String,
    pub related_keywords: Vec<String>,
    pub strategy: String,
    /// Set when the numbers were synthesized because search was unreachable.
    pub is_demo: bool,
}

pub fn competition_tier(count: u64) -> Competition {
    if count > 100_000 {
        Competition::High
    } else if count > 10_000 {
        Competition::Medium
    } else {
        Competition::Low
    }
}

pub fn recommendation_score(count: u64) -> u8 {
    let mut score = BASE_SCORE;
    if count < 10_000 {
        score += 20;
    } else if count > 100_000 {
        score -= 20;
    }
    score.clamp(0, 100) as u8
}

pub fn estimate_monthly_searches(count: u64) -> &'static str {
    if count > 100_000 {
        "10,000+"
    } else if count > 50_000 {
        "5,000 - 10,000"
    } else if count > 10_000 {
        "1,000 - 5,000"
    } else if count > 1_000 {
        "100 - 1,000"
    } else {
        "< 100"
    }
}

/// First-seen unique words from result titles, markup removed.
pub fn extract_related_keywords<'a>(
    titles: impl IntoIterator<Item = &'a str>,
    keyword: &str,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut related = Vec::new();
    for title in titles {
        let plain = strip_markup(title);
        for word in plain.split_whitespace() {
            if word.chars().count() <= 1 || word == keyword {
                continue;
            }
            if seen.insert(word.to_string()) {
                related.push(word.to_string());
            }
        }
    }
    related.truncate(RELATED_KEYWORD_LIMIT);
    related
}

pub fn seo_strategy(competition: Competition) -> String {
    let (headline, tips): (&str, [&str; 3]) = match competition {
        Competition::Low => (
            "Good opportunity: competition for this keyword is low.",
            [
                "Works well as a long-tail keyword",
                "High chance of ranking near the top",
                "Combine it with related keywords",
            ],
        ),
        Competition::Medium => (
            "Moderate competition: a deliberate approach is needed.",
            [
                "Stand out with high-quality content",
                "Strengthen E-E-A-T signals",
                "Optimize internal linking",
            ],
        ),
        Competition::High => (
            "High competition: plan carefully.",
            [
                "Split it into narrower long-tail keywords",
                "Offer a distinctive angle and in-depth coverage",
                "Keep the content updated",
            ],
        ),
    };
    let mut strategy = String::from(headline);
    for tip in tips {
        strategy.push_str("\n- ");
        strategy.push_str(tip);
    }
    strategy
}

pub fn analyze_search_result(keyword: &str, result: &SearchResult) -> KeywordAnalysis {
    let competition = competition_tier(result.total);
    KeywordAnalysis {
        keyword: keyword.to_string(),
        total_count: result.total,
        competition,
        score: recommendation_score(result.total),
        monthly_searches: estimate_monthly_searches(result.total).to_string(),
        related_keywords: extract_related_keywords(
            result.items.iter().map(|item| item.title.as_str()),
            keyword,
        ),
        strategy: seo_strategy(competition),
        is_demo: false,
    }
}

pub fn demo_analysis(keyword: &str) -> KeywordAnalysis {
    let count = rand::rng().random_range(0..DEMO_COUNT_UPPER);
    demo_analysis_with_count(keyword, count)
}

pub fn demo_analysis_with_count(keyword: &str, count: u64) -> KeywordAnalysis {
    let competition = competition_tier(count);
    KeywordAnalysis {
        keyword: keyword.to_string(),
        total_count: count,
        competition,
        score: recommendation_score(count),
        monthly_searches: estimate_monthly_searches(count).to_string(),
        related_keywords: DEMO_SUFFIXES
            .iter()
            .take(DEMO_RELATED_LIMIT)
            .map(|suffix| format!("{} {}", keyword, suffix))
            .collect(),
        strategy: seo_strategy(competition),
        is_demo: true,
    }
}

/// Runs a live search and falls back to demo data when the search service
/// cannot be reached or refuses the credentials. Other failures propagate.
pub async fn analyze_keyword<S: KeywordSearch + ?Sized>(
    search: &S,
    keyword: &str,
) -> StudioResult<KeywordAnalysis> {
    match search.search(keyword).await {
        Ok(result) => Ok(analyze_search_result(keyword, &result)),
        Err(err) if err.is_fallback_eligible() => {
            warn!(
                "keyword search unavailable ({}); using demo data for '{}'",
                err, keyword
            );
            Ok(demo_analysis(keyword))
        }
        Err(err) => Err(err),
    }
}
