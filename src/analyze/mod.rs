// src/analyze/mod.rs
//! Analysis stages: keyword prefilter, AI relevance, impact scoring, summaries.
//!
//! Stages never mutate a shared record; each one consumes an [`AnnotatedNews`]
//! and returns a new one carrying its annotation.

pub mod ai_adapter;
pub mod impact;
pub mod keywords;
pub mod relevance;
pub mod summarize;

use serde::Serialize;

use crate::analyze::impact::ImpactScore;
use crate::analyze::keywords::KeywordHits;
use crate::analyze::relevance::RelevanceVerdict;
use crate::ingest::types::NewsItem;

// Re-export convenient types.
pub use crate::analyze::ai_adapter::{DynOracle, Oracle, OracleHandle, OracleReply};
pub use crate::analyze::keywords::KeywordCategories;

/// A news item plus everything the stages learned about it so far.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnnotatedNews {
    pub item: NewsItem,
    pub keywords: KeywordHits,
    pub relevance: Option<RelevanceVerdict>,
    pub impact: Option<ImpactScore>,
}

impl AnnotatedNews {
    pub fn new(item: NewsItem, keywords: KeywordHits) -> Self {
        Self {
            item,
            keywords,
            relevance: None,
            impact: None,
        }
    }

    pub fn with_relevance(self, relevance: RelevanceVerdict) -> Self {
        Self {
            relevance: Some(relevance),
            ..self
        }
    }

    pub fn with_impact(self, impact: ImpactScore) -> Self {
        Self {
            impact: Some(impact),
            ..self
        }
    }

    /// Total impact score; unscored items rank as 0.
    pub fn total_score(&self) -> u8 {
        self.impact.as_ref().map_or(0, |i| i.total_score)
    }
}
