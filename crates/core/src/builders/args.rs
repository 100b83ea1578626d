//! Small helper for assembling argument vectors.

/// Ordered argument list with helpers that never emit empty tokens.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArgList(Vec<String>);

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bare flag.
    pub fn flag(&mut self, flag: &str) -> &mut Self {
        self.0.push(flag.to_string());
        self
    }

    /// Append a bare flag when `enabled`.
    pub fn flag_if(&mut self, enabled: bool, flag: &str) -> &mut Self {
        if enabled {
            self.flag(flag);
        }
        self
    }

    /// Append `flag value`.
    pub fn value(&mut self, flag: &str, value: impl ToString) -> &mut Self {
        self.0.push(flag.to_string());
        self.0.push(value.to_string());
        self
    }

    /// Append `flag value` unless `value` is blank.
    pub fn non_empty(&mut self, flag: &str, value: &str) -> &mut Self {
        let value = value.trim();
        if !value.is_empty() {
            self.value(flag, value);
        }
        self
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}
