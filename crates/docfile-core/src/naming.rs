//! File naming rules: sanitizing, collision-free resolution and validation.

use std::collections::HashSet;

use crate::DocfileError;

/// Characters a stored file name may not contain (whitespace is rejected too).
pub const FORBIDDEN_CHARS: &[char] = &[
    '~', '!', '@', '#', '$', '%', '[', ']', '{', '}', '\\', '|', '§', '/', '&', '<', '>', '?',
    '"', '€', '=', '+', '^', '`', '°',
];

/// Longest accepted name, extension included.
pub const MAX_NAME_LENGTH: usize = 222;

/// Check whether a character is rejected in file names.
pub fn is_forbidden(c: char) -> bool {
    c.is_whitespace() || FORBIDDEN_CHARS.contains(&c)
}

/// Replace every forbidden character with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect()
}

/// Split a name at its last `.` into stem and extension (the dot stays
/// with the extension). A leading dot belongs to the stem.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// Build the full name from what a user typed into a rename prompt:
/// spaces become `_` and the fixed extension is appended.
pub fn compose_rename_input(stem_input: &str, extension: &str) -> String {
    format!("{}{}", stem_input.replace(' ', "_"), extension)
}

/// Computes and validates collision-free file names.
#[derive(Debug, Clone, Copy)]
pub struct NameResolver {
    max_length: usize,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new(MAX_NAME_LENGTH)
    }
}

impl NameResolver {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Sanitize `candidate` and make it unique among `existing`.
    ///
    /// For "a.txt" tries "a_(1).txt", "a_(2).txt", etc.
    pub fn resolve(&self, existing: &HashSet<String>, candidate: &str) -> String {
        let cleaned = sanitize(candidate);
        if !existing.contains(&cleaned) {
            return cleaned;
        }

        let (stem, extension) = split_extension(&cleaned);

        // At most |existing| names can be taken, so |existing| + 1 probes always hit a free one.
        let probes = existing.len() as u64 + 1;
        (1..=probes)
            .map(|i| format!("{stem}_({i}){extension}"))
            .find(|name| !existing.contains(name))
            .unwrap_or_else(|| {
                let timestamp = chrono::Utc::now().timestamp_millis();
                format!("{stem}_({timestamp}){extension}")
            })
    }

    /// Validate a complete file name against the forbidden-character class
    /// and the length bounds `[extension length + 1, max]`.
    pub fn validate(&self, name: &str, extension: &str) -> Result<(), DocfileError> {
        let length = name.chars().count();
        let min = extension.chars().count() + 1;

        if length < min {
            return Err(DocfileError::invalid_name(name, "Name is too short"));
        }
        if length > self.max_length {
            return Err(DocfileError::invalid_name(
                name,
                format!("Name is too long (max {} characters)", self.max_length),
            ));
        }
        if let Some(c) = name.chars().find(|c| is_forbidden(*c)) {
            return Err(DocfileError::invalid_name(
                name,
                format!("Name cannot contain '{}'", c.escape_default()),
            ));
        }

        Ok(())
    }

    /// Validate a proposed new name for an item currently called `current`.
    ///
    /// Returns `Ok(None)` when the name is unchanged, `Ok(Some(name))` when
    /// the rename should be applied.
    pub fn validate_rename(
        &self,
        existing: &HashSet<String>,
        current: &str,
        proposed: &str,
    ) -> Result<Option<String>, DocfileError> {
        if proposed == current {
            return Ok(None);
        }

        let (_, extension) = split_extension(current);
        self.validate(proposed, extension)?;

        if existing.contains(proposed) {
            return Err(DocfileError::NameCollision {
                name: proposed.to_string(),
            });
        }

        Ok(Some(proposed.to_string()))
    }
}
