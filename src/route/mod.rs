//! Query Classifier.
//!
//! Maps a raw user query to one of three processing routes using an explicit
//! ordered rule table. Plot keywords take precedence over analytical keywords:
//! a request to "plot the average by month" wants a chart, not a number.
//! Queries matching neither set fall through to the contextual route.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The chosen processing path for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Route {
    /// Chart/visualization request, handled by the plotting pipeline.
    Plot,
    /// Aggregation/filtering request, handled via SQL.
    Analytical,
    /// Free-form question, handled by contextual reasoning.
    Contextual,
}

impl Route {
    /// Returns the route as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plot => "PLOT",
            Self::Analytical => "ANALYTICAL",
            Self::Contextual => "CONTEXTUAL",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of classifying a query. Produced fresh per query; not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// The original query text, unmodified.
    pub query: String,
    /// The chosen route.
    pub route: Route,
    /// Every keyword that matched, across all rule sets.
    pub matched_keywords: BTreeSet<String>,
}

/// Keywords indicating a visualization request. Entries may be multi-word
/// phrases; matching is by case-insensitive containment.
const PLOT_KEYWORDS: &[&str] = &[
    "chart",
    "graph",
    "plot",
    "visualize",
    "visualization",
    "histogram",
    "scatter",
    "heatmap",
    "pie",
    "show me a",
];

/// Keywords indicating an aggregation/filtering request answerable via SQL.
const ANALYTICAL_KEYWORDS: &[&str] = &[
    "average",
    "avg",
    "sum",
    "count",
    "max",
    "min",
    "total",
    "group",
    "filter",
    "compare",
    "trend",
    "top",
    "bottom",
    "highest",
    "lowest",
    "most",
    "least",
    "greater",
    "less",
    "between",
    "median",
    "how many",
];

/// The classification rule table, in precedence order: the first category
/// with any keyword match wins. Contextual is the default when nothing
/// matches and so carries no keywords of its own.
const RULES: &[(Route, &[&str])] = &[
    (Route::Plot, PLOT_KEYWORDS),
    (Route::Analytical, ANALYTICAL_KEYWORDS),
];

/// Classifies a raw query string.
///
/// Total and deterministic: every input string, including the empty string,
/// yields a decision. Pure function with no side effects.
pub fn classify_query(query: &str) -> RouteDecision {
    let lowered = query.to_lowercase();

    let mut route = Route::Contextual;
    let mut matched_keywords = BTreeSet::new();

    for (candidate_route, keywords) in RULES {
        let mut any = false;
        for keyword in *keywords {
            if lowered.contains(keyword) {
                matched_keywords.insert((*keyword).to_string());
                any = true;
            }
        }
        // First matching category in table order wins, but keep collecting
        // matches from lower-precedence sets for the decision record.
        if any && route == Route::Contextual {
            route = *candidate_route;
        }
    }

    RouteDecision {
        query: query.to_string(),
        route,
        matched_keywords,
    }
}
