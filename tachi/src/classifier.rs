//! User-Agent classification of AI crawler traffic.
//!
//! Only identified crawlers are charged; everything else is proxied straight
//! through to the origin. The pattern set is configuration, not code: deploys
//! can replace it wholesale without a rebuild.

use regex::RegexSet;

/// Default User-Agent patterns for known AI and indexing crawlers.
///
/// Matched case-insensitively, anywhere in the User-Agent string.
pub const DEFAULT_CRAWLER_PATTERNS: &[&str] = &[
    "GPTBot",
    "ChatGPT-User",
    "Claude-Web",
    "anthropic-ai",
    "Claude",
    "PerplexityBot",
    "CCBot",
    "Google-Extended",
    "Bingbot",
    "YandexBot",
    "Baiduspider",
    "Meta-ExternalAgent",
    "facebookexternalhit",
];

/// Matches User-Agent strings against a closed set of crawler patterns.
#[derive(Debug)]
pub struct CrawlerClassifier {
    set: RegexSet,
}

impl CrawlerClassifier {
    /// Builds a classifier over [`DEFAULT_CRAWLER_PATTERNS`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_patterns(DEFAULT_CRAWLER_PATTERNS.iter().copied())
            .expect("default patterns are valid regexes")
    }

    /// Builds a classifier over a custom pattern set.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`regex::Error`] if any pattern fails to
    /// compile.
    pub fn with_patterns<'a, I>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let set = regex::RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { set })
    }

    /// Returns `true` if the User-Agent belongs to a known AI crawler.
    #[must_use]
    pub fn is_ai_crawler(&self, user_agent: &str) -> bool {
        self.set.is_match(user_agent)
    }
}

impl Default for CrawlerClassifier {
    fn default() -> Self {
        Self::new()
    }
}
