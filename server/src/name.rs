//! Display name validation

pub const DEFAULT_MIN_NAME_LEN: usize = 2;
pub const DEFAULT_MAX_NAME_LEN: usize = 20;

/// Syntactic rules for leaderboard display names.
///
/// A name is accepted when, after trimming surrounding whitespace, its length
/// in characters lies in `[min_len, max_len]` and it only contains ASCII
/// letters, digits, underscores, hyphens and spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameValidator {
    pub min_len: usize,
    pub max_len: usize,
}

impl NameValidator {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }

    /// `None` stands for a missing or non-string name.
    pub fn is_valid(&self, name: Option<&str>) -> bool {
        let Some(name) = name else {
            return false;
        };

        let trimmed = name.trim();
        let len = trimmed.chars().count();
        if len < self.min_len || len > self.max_len {
            return false;
        }

        trimmed.chars().all(is_name_char)
    }

    /// The form of the name that gets stored.
    pub fn normalize(name: &str) -> String {
        name.trim().to_string()
    }
}

impl Default for NameValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_NAME_LEN, DEFAULT_MAX_NAME_LEN)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' '
}
