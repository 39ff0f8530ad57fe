//! Filter and preference values understood by PostgREST

/// Operator for filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,
}

impl FilterOperator {
    /// Convert the operator to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
        }
    }

    /// Render `<op>.<value>` as used in a query string
    pub fn apply(&self, value: &str) -> String {
        format!("{}.{}", self.as_str(), value)
    }
}

/// Options for returning data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOption {
    /// Return the affected rows
    Representation,

    /// Return nothing
    Minimal,
}

impl ReturnOption {
    /// Convert the option to its `Prefer` header fragment
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnOption::Representation => "return=representation",
            ReturnOption::Minimal => "return=minimal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        assert_eq!(FilterOperator::Eq.apply("2024-05-01"), "eq.2024-05-01");
        assert_eq!(ReturnOption::Minimal.as_str(), "return=minimal");
    }
}
