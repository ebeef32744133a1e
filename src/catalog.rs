//! Category registry: named groups of public output names, plus descriptive
//! tags for human-facing grouping.
//!
//! Pure metadata. Built once at startup, immutable afterwards, and never
//! touches evaluation state. Selection requests expand through
//! [`CategoryRegistry::expand`] into a concrete ordered name list before
//! evaluation starts.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// Selector shorthand that expands to every registered category.
pub const ALL: &str = "all";

/// A selector is not a registered output name or category tag.
#[derive(Debug, Error, Diagnostic)]
#[error("unknown selector `{0}`: not a registered output name or category tag")]
#[diagnostic(
    code(cadenza::catalog::unknown_selector),
    help("Use a public feature name, a category tag, or `all`.")
)]
pub struct UnknownSelectorError(pub String);

/// Static mapping from category tags to ordered output-name lists, and from
/// output names to descriptive tags.
#[derive(Clone, Debug, Default)]
pub struct CategoryRegistry {
    /// Categories in declaration order; each holds its names in declared order.
    categories: Vec<(String, Vec<String>)>,
    tags: FxHashMap<String, Vec<String>>,
    names: FxHashSet<String>,
}

impl CategoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a category and its ordered member names.
    #[must_use]
    pub fn with_category<I, S>(mut self, tag: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        for name in &members {
            self.names.insert(name.clone());
        }
        self.categories.push((tag.into(), members));
        self
    }

    /// Attach descriptive tags to an output name.
    #[must_use]
    pub fn with_tags<I, S>(mut self, name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .insert(name.into(), tags.into_iter().map(Into::into).collect());
        self
    }

    /// Member names of a category, in declared order.
    #[must_use]
    pub fn category(&self, tag: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|(candidate, _)| candidate == tag)
            .map(|(_, members)| members.as_slice())
    }

    /// Category tags in declaration order.
    pub fn category_tags(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(tag, _)| tag.as_str())
    }

    /// Descriptive tags for an output name (empty if none declared).
    #[must_use]
    pub fn tags_for(&self, name: &str) -> &[String] {
        self.tags.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Expand selectors (concrete names, category tags, or [`ALL`]) into an
    /// ordered, de-duplicated name list.
    ///
    /// Category members expand in declared order; duplicates across selectors
    /// keep their first occurrence. Fails on the first unregistered selector.
    pub fn expand<I, S>(&self, selectors: I) -> Result<Vec<String>, UnknownSelectorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = FxHashSet::default();
        let mut expanded = Vec::new();
        let mut push = |name: &str, expanded: &mut Vec<String>| {
            if seen.insert(name.to_string()) {
                expanded.push(name.to_string());
            }
        };

        for selector in selectors {
            let selector = selector.as_ref();
            if selector == ALL {
                for (_, members) in &self.categories {
                    for name in members {
                        push(name, &mut expanded);
                    }
                }
            } else if let Some(members) = self.category(selector) {
                for name in members {
                    push(name, &mut expanded);
                }
            } else if self.names.contains(selector) {
                push(selector, &mut expanded);
            } else {
                return Err(UnknownSelectorError(selector.to_string()));
            }
        }
        Ok(expanded)
    }
}
