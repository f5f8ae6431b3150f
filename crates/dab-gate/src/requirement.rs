//! Requirement model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability category a requirement belongs to.
///
/// The variant order is the evaluation order: operations first, then
/// settings, keys, voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Operations,
    Settings,
    Keys,
    Voices,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operations => write!(f, "operations"),
            Self::Settings => write!(f, "settings"),
            Self::Keys => write!(f, "keys"),
            Self::Voices => write!(f, "voices"),
        }
    }
}

/// One named requirement, e.g. the `KEY_HOME` entry of a `keys:` segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub category: Category,
    pub name: String,
}

impl Requirement {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let req = Requirement::new(Category::Keys, "KEY_HOME");
        assert_eq!(req.to_string(), "keys: KEY_HOME");
        assert_eq!(Category::Operations.to_string(), "operations");
    }
}
