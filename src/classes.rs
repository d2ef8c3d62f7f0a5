//! Class vocabulary and class selection.

use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

/// Label that selects every class.
pub const ALL_CLASSES: &str = "All";

/// Ordered class names; the position is the detector's class id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassVocabulary {
    names: Vec<String>,
}

impl ClassVocabulary {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// One class per line. Lines are trimmed; trailing blank lines are
    /// dropped, blank lines in the middle keep their id.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class list {}", path.display()))?;
        let mut names: Vec<String> = raw.lines().map(|l| l.trim().to_string()).collect();
        while names.last().is_some_and(|n| n.is_empty()) {
            names.pop();
        }
        if names.is_empty() {
            return Err(anyhow!("class list {} is empty", path.display()));
        }
        log::info!("loaded {} classes from {}", names.len(), path.display());
        Ok(Self { names })
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Which detections count, by label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ClassFilter {
    #[default]
    All,
    Only(String),
}

impl ClassFilter {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == ALL_CLASSES {
            ClassFilter::All
        } else {
            ClassFilter::Only(value.to_string())
        }
    }

    /// Exact, case-sensitive label match.
    pub fn matches(&self, label: &str) -> bool {
        match self {
            ClassFilter::All => true,
            ClassFilter::Only(name) => name == label,
        }
    }
}

impl fmt::Display for ClassFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassFilter::All => f.write_str(ALL_CLASSES),
            ClassFilter::Only(name) => f.write_str(name),
        }
    }
}
