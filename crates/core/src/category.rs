use serde::{Deserialize, Serialize};
use std::fmt;

/// A budget category paired with one of its sub-categories ("sub-headers").
/// Both ids are opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryRef {
    pub category_id: String,
    pub sub_header_id: String,
}

impl CategoryRef {
    pub fn new(category_id: impl Into<String>, sub_header_id: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            sub_header_id: sub_header_id.into(),
        }
    }
}

impl fmt::Display for CategoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category_id, self.sub_header_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubHeaderOption {
    pub id: String,
    pub name: String,
}

impl SubHeaderOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A category the caller is willing to accept, with display names for the
/// remote classifier's benefit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOption {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_headers: Vec<SubHeaderOption>,
}

/// The caller-supplied candidate set. Every non-local suggestion must name a
/// pair that appears here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet {
    categories: Vec<CategoryOption>,
}

impl CandidateSet {
    pub fn new(categories: Vec<CategoryOption>) -> Self {
        Self { categories }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &[CategoryOption] {
        &self.categories
    }

    /// True when no (category, sub-header) pair is available.
    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.sub_headers.is_empty())
    }

    pub fn contains(&self, target: &CategoryRef) -> bool {
        self.contains_ids(&target.category_id, &target.sub_header_id)
    }

    pub fn contains_ids(&self, category_id: &str, sub_header_id: &str) -> bool {
        self.categories
            .iter()
            .filter(|c| c.id == category_id)
            .any(|c| c.sub_headers.iter().any(|s| s.id == sub_header_id))
    }

    /// Every valid pair, in declaration order.
    pub fn refs(&self) -> impl Iterator<Item = CategoryRef> + '_ {
        self.categories.iter().flat_map(|c| {
            c.sub_headers
                .iter()
                .map(move |s| CategoryRef::new(c.id.clone(), s.id.clone()))
        })
    }
}

impl From<Vec<CategoryOption>> for CandidateSet {
    fn from(categories: Vec<CategoryOption>) -> Self {
        Self::new(categories)
    }
}

/// Provenance of a categorization, used downstream to decide how much to trust it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    LocalPattern,
    Api,
    Uncategorized,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::LocalPattern => write!(f, "local_pattern"),
            Method::Api => write!(f, "api"),
            Method::Uncategorized => write!(f, "uncategorized"),
        }
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local_pattern" => Ok(Method::LocalPattern),
            "api" => Ok(Method::Api),
            "uncategorized" => Ok(Method::Uncategorized),
            other => Err(format!("Unknown categorization method: '{other}'")),
        }
    }
}

/// Terminal result of categorizing one transaction. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationOutcome {
    category_id: Option<String>,
    sub_header_id: Option<String>,
    confidence: f32,
    method: Method,
}

impl CategorizationOutcome {
    pub fn uncategorized() -> Self {
        Self {
            category_id: None,
            sub_header_id: None,
            confidence: 0.0,
            method: Method::Uncategorized,
        }
    }

    pub fn categorized(target: CategoryRef, confidence: f32, method: Method) -> Self {
        if method == Method::Uncategorized {
            return Self::uncategorized();
        }
        Self {
            category_id: Some(target.category_id),
            sub_header_id: Some(target.sub_header_id),
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }

    pub fn category_id(&self) -> Option<&str> {
        self.category_id.as_deref()
    }

    pub fn sub_header_id(&self) -> Option<&str> {
        self.sub_header_id.as_deref()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn is_categorized(&self) -> bool {
        self.method != Method::Uncategorized
    }

    pub fn target(&self) -> Option<CategoryRef> {
        match (&self.category_id, &self.sub_header_id) {
            (Some(c), Some(s)) => Some(CategoryRef::new(c.clone(), s.clone())),
            _ => None,
        }
    }
}

impl Default for CategorizationOutcome {
    fn default() -> Self {
        Self::uncategorized()
    }
}
