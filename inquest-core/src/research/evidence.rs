//! Evidence model: facts, conflicts, and the accumulated evidence set.
//!
//! Pure, side-effect-free operations over fact collections: source-quality
//! scoring, deduplication, acceptability filtering, and ranking. Every
//! pipeline stage goes through these; none of them touch the network.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use url::Url;

/// An atomic, attributed claim extracted from search evidence.
///
/// Immutable once accepted into an [`EvidenceSet`]; never individually
/// deleted, only superseded by deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fact {
    /// The claim text.
    pub text: String,
    /// Absolute URL of the source the claim came from.
    pub source_url: String,
    /// Source title, when reported. Never fabricated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Publication date string, when reported. Never fabricated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Author-provided plausibility, 1-5.
    pub confidence: u8,
    /// Source trust tier, 1-5, derived from the URL.
    pub source_quality: u8,
}

impl Fact {
    /// Build a normalized fact: trimmed fields, derived source quality, and
    /// the low-trust confidence cap applied.
    ///
    /// Invariant: confidence is capped at 3 whenever source quality is 2 or
    /// lower, so low-trust sources cannot report high confidence.
    pub fn new(
        text: impl Into<String>,
        source_url: impl Into<String>,
        title: Option<String>,
        published: Option<String>,
        confidence: u8,
    ) -> Self {
        let text = text.into().trim().to_string();
        let source_url = source_url.into().trim().to_string();
        let source_quality = score_source_quality(&source_url);
        let mut confidence = confidence.clamp(1, 5);
        if source_quality <= 2 {
            confidence = confidence.min(3);
        }
        Self {
            text,
            source_url,
            title: title.filter(|t| !t.trim().is_empty()),
            published: published.filter(|p| !p.trim().is_empty()),
            confidence,
            source_quality,
        }
    }

    /// Dedup key: trimmed, lowercased claim text.
    fn key(&self) -> String {
        self.text.trim().to_lowercase()
    }
}

/// A pair of contradictory claims about one topic.
///
/// Conflicts are accumulated as-is: never deduplicated, never scored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Conflict {
    /// What the disagreement is about.
    pub topic: String,
    pub claim_a: String,
    pub source_a: String,
    pub claim_b: String,
    pub source_b: String,
}

/// Source trust tiers, checked in priority order; the first matching tier
/// wins. Matching is suffix-based against the URL host.
const QUALITY_TIERS: &[(&[&str], u8)] = &[
    (&[".gov", ".edu", ".mil", "gov.uk", "europa.eu"], 5),
    (
        &[
            "w3.org",
            "ietf.org",
            "iso.org",
            "ieee.org",
            "rfc-editor.org",
            "arxiv.org",
            "acm.org",
            "nature.com",
            "science.org",
            "sciencedirect.com",
            "springer.com",
            "nejm.org",
            "thelancet.com",
            "docs.rs",
            "developer.mozilla.org",
        ],
        4,
    ),
    (&["wikipedia.org", "britannica.com", "wiktionary.org"], 3),
    (
        &[
            "medium.com",
            "substack.com",
            "blogspot.com",
            "wordpress.com",
            "tumblr.com",
            "dev.to",
            "hashnode.com",
        ],
        2,
    ),
    (
        &[
            "x.com",
            "twitter.com",
            "facebook.com",
            "instagram.com",
            "tiktok.com",
            "reddit.com",
            "threads.net",
            "linkedin.com",
            "youtube.com",
        ],
        1,
    ),
];

/// Score the trustworthiness of a source URL, 1 (lowest) to 5 (highest).
///
/// Deterministic and total: unparseable or unrecognized hosts score 2
/// (unknown is low-but-not-lowest trust).
pub fn score_source_quality(url: &str) -> u8 {
    let Some(host) = host_of(url) else {
        return 2;
    };
    for (patterns, score) in QUALITY_TIERS {
        if patterns.iter().any(|p| host_matches(&host, p)) {
            return *score;
        }
    }
    2
}

/// Extract the lowercased host from a URL string.
fn host_of(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Host-against-suffix matching: a pattern starting with `.` matches by
/// suffix; otherwise the host must equal the pattern or be a subdomain of it.
fn host_matches(host: &str, pattern: &str) -> bool {
    if let Some(bare) = pattern.strip_prefix('.') {
        host == bare || host.ends_with(pattern)
    } else {
        host == pattern || host.ends_with(&format!(".{pattern}"))
    }
}

/// Deduplicate facts, keeping the first occurrence of each claim.
///
/// Keyed by trimmed lowercase claim text; facts with empty claims are
/// dropped. Order is otherwise preserved.
pub fn dedupe(facts: Vec<Fact>) -> Vec<Fact> {
    let mut seen = HashSet::new();
    facts
        .into_iter()
        .filter(|f| {
            let key = f.key();
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// Filter facts down to those acceptable for accumulation.
///
/// A fact is retained when its claim and URL are both present, its final
/// confidence is at least 2, and, when `force_domains` is non-empty, its
/// URL host matches one of the allowed domain suffixes. A fact whose URL
/// fails to parse is rejected when the allow-list is non-empty.
pub fn filter_acceptable(facts: Vec<Fact>, force_domains: &[String]) -> Vec<Fact> {
    facts
        .into_iter()
        .filter(|f| {
            if f.text.is_empty() || f.source_url.is_empty() || f.confidence < 2 {
                return false;
            }
            if force_domains.is_empty() {
                return true;
            }
            match host_of(&f.source_url) {
                Some(host) => force_domains.iter().any(|d| host_matches(&host, d)),
                None => false,
            }
        })
        .collect()
}

/// Rank facts for synthesis: stable sort, best sources first, confidence
/// breaking ties.
pub fn rank(mut facts: Vec<Fact>) -> Vec<Fact> {
    facts.sort_by(|a, b| {
        b.source_quality
            .cmp(&a.source_quality)
            .then(b.confidence.cmp(&a.confidence))
    });
    facts
}

/// Accumulated evidence across search rounds.
///
/// Owned exclusively by one research invocation; never shared across
/// requests. Facts are insertion-ordered and unique by normalized claim
/// text; conflicts are a simple concatenation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EvidenceSet {
    facts: Vec<Fact>,
    conflicts: Vec<Conflict>,
    #[serde(skip)]
    keys: HashSet<String>,
    sources: BTreeSet<String>,
}

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a round's accepted facts, returning how many were new.
    pub fn merge_facts(&mut self, facts: Vec<Fact>) -> usize {
        let mut added = 0;
        for fact in facts {
            let key = fact.key();
            if key.is_empty() || !self.keys.insert(key) {
                continue;
            }
            self.sources.insert(fact.source_url.clone());
            self.facts.push(fact);
            added += 1;
        }
        added
    }

    /// Append a round's conflicts unconditionally.
    pub fn add_conflicts(&mut self, conflicts: Vec<Conflict>) {
        self.conflicts.extend(conflicts);
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Number of distinct source URLs observed, used for coverage decisions.
    pub fn distinct_sources(&self) -> usize {
        self.sources.len()
    }

    /// Consume the set, yielding facts and conflicts.
    pub fn into_parts(self) -> (Vec<Fact>, Vec<Conflict>) {
        (self.facts, self.conflicts)
    }
}
