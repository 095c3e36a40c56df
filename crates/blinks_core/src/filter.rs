use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{Blink, BlinkKind};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Latest,
    Trending,
    Rumors,
}

impl FromStr for Tab {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(Tab::Latest),
            "trending" => Ok(Tab::Trending),
            "rumors" | "rumours" => Ok(Tab::Rumors),
            other => Err(Error::InvalidInput(format!("Unknown tab: {}", other))),
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tab::Latest => "latest",
            Tab::Trending => "trending",
            Tab::Rumors => "rumors",
        };
        f.write_str(name)
    }
}

/// What the reader currently has selected: a tab plus optional narrowing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlinkFilter {
    pub tab: Tab,
    pub category: Option<String>,
    pub query: Option<String>,
}

impl BlinkFilter {
    pub fn new(tab: Tab) -> Self {
        Self { tab, ..Default::default() }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_blank(category.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = non_blank(query.into());
        self
    }

    pub fn matches(&self, blink: &Blink) -> bool {
        let wanted_kind = match self.tab {
            Tab::Latest | Tab::Trending => BlinkKind::News,
            Tab::Rumors => BlinkKind::Rumor,
        };
        if blink.kind != wanted_kind {
            return false;
        }

        if let Some(category) = self.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            let same = blink
                .category
                .as_deref()
                .map(|c| c.trim().eq_ignore_ascii_case(category))
                .unwrap_or(false);
            if !same {
                return false;
            }
        }

        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            if !blink.title.to_lowercase().contains(&query)
                && !blink.summary.to_lowercase().contains(&query)
            {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, blinks: &[Blink]) -> Vec<Blink> {
        let mut selected: Vec<Blink> = blinks.iter().filter(|b| self.matches(b)).cloned().collect();
        match self.tab {
            Tab::Latest | Tab::Rumors => {
                selected.sort_by(|a, b| b.published_at.cmp(&a.published_at));
            }
            Tab::Trending => {
                selected.sort_by(|a, b| {
                    b.votes
                        .total()
                        .cmp(&a.votes.total())
                        .then_with(|| b.published_at.cmp(&a.published_at))
                });
            }
        }
        selected
    }
}

/// Sorted, de-duplicated categories present in `blinks`.
pub fn categories(blinks: &[Blink]) -> Vec<String> {
    let mut found: Vec<String> = blinks
        .iter()
        .filter_map(|b| b.category.as_deref())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    found.sort_by_key(|c| c.to_lowercase());
    found.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    found
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VoteCounts;
    use chrono::{Duration, Utc};

    fn blink(id: &str, title: &str, category: &str, kind: BlinkKind, age_hours: i64, votes: (u64, u64)) -> Blink {
        Blink {
            id: id.to_string(),
            title: title.to_string(),
            summary: format!("Summary of {}", title),
            content: None,
            image_url: None,
            category: Some(category.to_string()),
            kind,
            published_at: Utc::now() - Duration::hours(age_hours),
            votes: VoteCounts::new(votes.0, votes.1),
        }
    }

    fn fixture() -> Vec<Blink> {
        vec![
            blink("1", "Markets rally", "Economy", BlinkKind::News, 5, (40, 2)),
            blink("2", "New chip announced", "Technology", BlinkKind::News, 1, (3, 1)),
            blink("3", "Merger whispers", "Economy", BlinkKind::Rumor, 2, (9, 9)),
            blink("4", "Election results", "Politics", BlinkKind::News, 3, (10, 30)),
        ]
    }

    fn ids(blinks: &[Blink]) -> Vec<&str> {
        blinks.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_latest_sorts_newest_first_and_skips_rumors() {
        let result = BlinkFilter::new(Tab::Latest).apply(&fixture());
        assert_eq!(ids(&result), vec!["2", "4", "1"]);
    }

    #[test]
    fn test_trending_sorts_by_total_votes() {
        let result = BlinkFilter::new(Tab::Trending).apply(&fixture());
        assert_eq!(ids(&result), vec!["1", "4", "2"]);
    }

    #[test]
    fn test_rumors_tab() {
        let result = BlinkFilter::new(Tab::Rumors).apply(&fixture());
        assert_eq!(ids(&result), vec!["3"]);
    }

    #[test]
    fn test_category_and_query_narrowing() {
        let result = BlinkFilter::new(Tab::Latest).with_category("economy").apply(&fixture());
        assert_eq!(ids(&result), vec!["1"]);

        let result = BlinkFilter::new(Tab::Latest).with_query("CHIP").apply(&fixture());
        assert_eq!(ids(&result), vec!["2"]);

        let result = BlinkFilter::new(Tab::Latest).with_query("   ").apply(&fixture());
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_categories_are_deduplicated() {
        let mut blinks = fixture();
        blinks.push(blink("5", "Budget", "economy", BlinkKind::News, 8, (0, 0)));
        assert_eq!(categories(&blinks), vec!["Economy", "Politics", "Technology"]);
    }

    #[test]
    fn test_tab_parse() {
        assert_eq!("Trending".parse::<Tab>().unwrap(), Tab::Trending);
        assert!("hot".parse::<Tab>().is_err());
    }
}
