use crate::paths::{self, SEPARATOR};
use crate::{StoreError, StoreResult};

pub const DEFAULT_MAX_DEPTH: usize = 9;
pub const DEFAULT_MAX_SEGMENT_LEN: usize = 100;
pub const DEFAULT_MAX_LEN: usize = 768;

/// Structural rules a path value must satisfy before it is persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathPolicy {
    pub max_depth: usize,
    pub max_segment_len: usize,
    /// Characters in the whole value, separators included.
    pub max_len: usize,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_segment_len: DEFAULT_MAX_SEGMENT_LEN,
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

impl PathPolicy {
    pub fn validate_path(&self, value: &str) -> StoreResult<()> {
        if value.is_empty() {
            return Err(StoreError::invalid_path("path is empty"));
        }
        if value.starts_with(SEPARATOR) || value.ends_with(SEPARATOR) {
            return Err(StoreError::invalid_path(format!(
                "'{value}' starts or ends with '{SEPARATOR}'"
            )));
        }
        let len = value.chars().count();
        if len > self.max_len {
            return Err(StoreError::invalid_path(format!(
                "path is {len} characters, at most {} allowed",
                self.max_len
            )));
        }
        let depth = paths::depth(value);
        if depth > self.max_depth {
            return Err(StoreError::invalid_path(format!(
                "'{value}' has {depth} segments, at most {} allowed",
                self.max_depth
            )));
        }
        for segment in paths::segments(value) {
            self.validate_segment(segment)
                .map_err(|err| err.context(format!("path '{value}'")))?;
        }
        Ok(())
    }

    pub fn validate_segment(&self, segment: &str) -> StoreResult<()> {
        if segment.is_empty() {
            return Err(StoreError::invalid_path("empty segment"));
        }
        if segment == "." || segment == ".." {
            return Err(StoreError::invalid_path(format!(
                "segment '{segment}' is reserved"
            )));
        }
        let len = segment.chars().count();
        if len > self.max_segment_len {
            return Err(StoreError::invalid_path(format!(
                "segment '{segment}' is {len} characters, at most {} allowed",
                self.max_segment_len
            )));
        }
        if let Some(bad) = segment
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')))
        {
            return Err(StoreError::invalid_path(format!(
                "segment '{segment}' contains disallowed character '{bad}'"
            )));
        }
        Ok(())
    }
}
