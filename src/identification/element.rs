use std::fmt;

/// Name and descriptor of a field or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementDescription {
    /// Member name
    pub name: String,
    /// Member descriptor
    pub desc: String,
}

impl ElementDescription {
    /// Create a description.
    #[must_use]
    pub fn new(name: &str, desc: &str) -> Self {
        ElementDescription {
            name: name.to_string(),
            desc: desc.to_string(),
        }
    }

    /// Returns `true` if `name` and `desc` match exactly.
    #[must_use]
    pub fn matches(&self, name: &str, desc: &str) -> bool {
        self.name == name && self.desc == desc
    }
}

impl fmt::Display for ElementDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.desc)
    }
}
