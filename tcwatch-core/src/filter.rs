//! Build filter
//!
//! A subscriber-side matcher over two dimensions: the branch name and the
//! build configuration id. Each dimension holds a regular expression that
//! must match the whole value.
//!
//! Patterns can be swapped while other tasks evaluate `matches`. Each
//! dimension stores an `Arc<Pattern>` that is replaced as a whole, so a
//! reader always sees either the old or the new pattern.

use regex::Regex;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use crate::domain::build::Build;

/// Errors returned by filter updates
#[derive(Debug, Error)]
pub enum FilterError {
    /// Pattern is not a valid regular expression
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Name does not refer to a filter dimension
    #[error("unknown filter name `{0}`, expected one of: branch, build_configuration")]
    UnknownFilterName(String),
}

/// The dimensions a build can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterDimension {
    Branch,
    BuildConfiguration,
}

impl FilterDimension {
    pub const ALL: [FilterDimension; 2] =
        [FilterDimension::Branch, FilterDimension::BuildConfiguration];

    /// Name used by collaborators to address this dimension
    pub fn name(self) -> &'static str {
        match self {
            FilterDimension::Branch => "branch",
            FilterDimension::BuildConfiguration => "build_configuration",
        }
    }
}

impl FromStr for FilterDimension {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "branch" => Ok(FilterDimension::Branch),
            "build_configuration" => Ok(FilterDimension::BuildConfiguration),
            other => Err(FilterError::UnknownFilterName(other.to_string())),
        }
    }
}

impl std::fmt::Display for FilterDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A compiled, whole-input regular expression
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Source of the pattern that matches everything
    pub const MATCH_ALL: &'static str = ".*";

    /// Compiles `source` so that it has to match the entire input
    pub fn new(source: &str) -> Result<Self, FilterError> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            FilterError::InvalidPattern {
                pattern: source.to_string(),
                source: e,
            }
        })?;

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn match_all() -> Self {
        Self {
            source: Self::MATCH_ALL.to_string(),
            regex: Regex::new("^(?:.*)$").expect("match-all pattern compiles"),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// The pattern as the user wrote it
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::match_all()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Branch and build configuration filter for a subscriber
#[derive(Debug, Default)]
pub struct Filter {
    branch: RwLock<Arc<Pattern>>,
    build_configuration: RwLock<Arc<Pattern>>,
}

impl Filter {
    /// Creates a filter that matches every build
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter from two pattern sources
    pub fn with_patterns(branch: &str, build_configuration: &str) -> Result<Self, FilterError> {
        let filter = Self::new();
        filter.set(FilterDimension::Branch, Pattern::new(branch)?);
        filter.set(
            FilterDimension::BuildConfiguration,
            Pattern::new(build_configuration)?,
        );
        Ok(filter)
    }

    /// Checks a build against both dimensions
    ///
    /// Builds without a branch name always pass the branch dimension.
    pub fn matches(&self, build: &Build) -> bool {
        let branch_ok = match &build.branch_name {
            Some(name) => self.get(FilterDimension::Branch).matches(name),
            None => true,
        };

        branch_ok
            && self
                .get(FilterDimension::BuildConfiguration)
                .matches(build.configuration_id.as_str())
    }

    /// Returns the current pattern of a dimension
    pub fn get(&self, dimension: FilterDimension) -> Arc<Pattern> {
        let slot = self.slot(dimension);
        let guard = slot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replaces the pattern of a dimension
    pub fn set(&self, dimension: FilterDimension, pattern: Pattern) {
        let slot = self.slot(dimension);
        let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(pattern);
    }

    /// Looks up a pattern by dimension name
    pub fn get_by_name(&self, name: &str) -> Result<Arc<Pattern>, FilterError> {
        let dimension = name.parse::<FilterDimension>()?;
        Ok(self.get(dimension))
    }

    /// Compiles `pattern` and installs it under the dimension `name`
    ///
    /// On error the previous pattern stays in place.
    pub fn set_by_name(&self, name: &str, pattern: &str) -> Result<(), FilterError> {
        let dimension = name.parse::<FilterDimension>()?;
        let pattern = Pattern::new(pattern)?;
        self.set(dimension, pattern);
        Ok(())
    }

    fn slot(&self, dimension: FilterDimension) -> &RwLock<Arc<Pattern>> {
        match dimension {
            FilterDimension::Branch => &self.branch,
            FilterDimension::BuildConfiguration => &self.build_configuration,
        }
    }
}
