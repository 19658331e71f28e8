//! Projection model - which attributes are editable and how each is
//! renamed in the output document.
//!
//! Each [`ProjectionEntry`] is the single owner of an attribute's
//! `(name, output, editable)` triple, so the editable set and the output
//! map cannot drift apart. Attributes without an entry are neither shown
//! nor serialized.

use serde::Serialize;

use crate::error::CompileError;

/// One attribute of a projection: internal name, output key and whether
/// a form may edit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionEntry {
    name: String,
    output: String,
    editable: bool,
}

impl ProjectionEntry {
    /// Create an editable entry. An empty `output` defaults to `name`.
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        let name = name.into();
        let mut output = output.into();
        if output.is_empty() {
            output = name.clone();
        }
        Self {
            name,
            output,
            editable: true,
        }
    }

    /// Editable entry whose output key equals its name.
    pub fn identity(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }

    /// Mark the entry as a read-only passthrough.
    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }
}

/// Ordered projection of an object's attributes.
///
/// Entry order is both display order and serialization order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectionModel {
    entries: Vec<ProjectionEntry>,
}

impl ProjectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every name editable and emitted under its own name.
    pub fn identity<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .fold(Self::new(), |model, name| model.with(ProjectionEntry::identity(name)))
    }

    /// Build from the parallel `editable` list and `output_map`.
    ///
    /// Entries follow `output_map` order. A mapped name missing from
    /// `editable` becomes a read-only passthrough. An editable name with no
    /// mapping is rejected with [`CompileError::ProjectionMismatch`] rather
    /// than silently never serialized.
    pub fn from_parallel<E, M, O>(
        editable: &[E],
        output_map: &[(M, O)],
        path: &str,
    ) -> Result<Self, CompileError>
    where
        E: AsRef<str>,
        M: AsRef<str>,
        O: AsRef<str>,
    {
        for name in editable {
            let name = name.as_ref();
            if !output_map.iter().any(|(m, _)| m.as_ref() == name) {
                return Err(CompileError::ProjectionMismatch {
                    name: name.to_string(),
                    path: path.to_string(),
                });
            }
        }

        let model = output_map.iter().fold(Self::new(), |model, (name, output)| {
            let name = name.as_ref();
            let entry = ProjectionEntry::new(name, output.as_ref());
            if editable.iter().any(|e| e.as_ref() == name) {
                model.with(entry)
            } else {
                model.with(entry.read_only())
            }
        });
        Ok(model)
    }

    /// Append `entry`, replacing any existing entry with the same name in
    /// place.
    pub fn with(mut self, entry: ProjectionEntry) -> Self {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn entries(&self) -> &[ProjectionEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, name: &str) -> Option<&ProjectionEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Output key for an internal attribute, if it is projected.
    pub fn output_name(&self, name: &str) -> Option<&str> {
        self.entry(name).map(|e| e.output.as_str())
    }

    /// Internal attribute emitted under `output`.
    pub fn internal_name(&self, output: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.output == output)
            .map(|e| e.name.as_str())
    }

    pub fn is_editable(&self, name: &str) -> bool {
        self.entry(name).map(|e| e.editable).unwrap_or(false)
    }

    /// Editable attribute names in display order.
    pub fn editable_attributes(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.editable)
            .map(|e| e.name.as_str())
    }

    /// First output key claimed by more than one entry.
    pub fn duplicate_output(&self) -> Option<&str> {
        self.entries.iter().enumerate().find_map(|(i, e)| {
            self.entries[..i]
                .iter()
                .any(|prev| prev.output == e.output)
                .then_some(e.output.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_defaults_to_name() {
        let entry = ProjectionEntry::new("title", "");
        assert_eq!(entry.output(), "title");
        assert!(entry.is_editable());

        let entry = ProjectionEntry::new("logo", "x-logo");
        assert_eq!(entry.name(), "logo");
        assert_eq!(entry.output(), "x-logo");
    }

    #[test]
    fn parallel_lists_follow_output_map_order() {
        let model = ProjectionModel::from_parallel(
            &["description", "title"],
            &[("title", ""), ("description", "x-description")],
            "/",
        )
        .unwrap();

        let names: Vec<_> = model.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["title", "description"]);
        assert_eq!(model.output_name("description"), Some("x-description"));
    }

    #[test]
    fn mapped_but_not_editable_is_read_only() {
        let model =
            ProjectionModel::from_parallel(&["title"], &[("title", ""), ("version", "")], "/")
                .unwrap();

        assert!(model.is_editable("title"));
        assert!(!model.is_editable("version"));
        assert_eq!(model.output_name("version"), Some("version"));
        let editable: Vec<_> = model.editable_attributes().collect();
        assert_eq!(editable, ["title"]);
    }

    #[test]
    fn editable_without_mapping_is_rejected() {
        let result =
            ProjectionModel::from_parallel(&["title", "summary"], &[("title", "")], "/info");
        assert!(matches!(
            result,
            Err(CompileError::ProjectionMismatch { name, path }) if name == "summary" && path == "/info"
        ));
    }

    #[test]
    fn with_replaces_in_place() {
        let model = ProjectionModel::identity(["a", "b", "c"])
            .with(ProjectionEntry::new("b", "bee").read_only());

        let outputs: Vec<_> = model.entries().iter().map(|e| e.output()).collect();
        assert_eq!(outputs, ["a", "bee", "c"]);
        assert!(!model.is_editable("b"));
    }

    #[test]
    fn reverse_lookup_by_output() {
        let model = ProjectionModel::new().with(ProjectionEntry::new("logo", "x-logo"));
        assert_eq!(model.internal_name("x-logo"), Some("logo"));
        assert_eq!(model.internal_name("logo"), None);
    }

    #[test]
    fn unknown_attribute_is_not_editable() {
        let model = ProjectionModel::identity(["title"]);
        assert!(!model.is_editable("missing"));
        assert_eq!(model.output_name("missing"), None);
    }

    #[test]
    fn detects_duplicate_outputs() {
        let model = ProjectionModel::new()
            .with(ProjectionEntry::new("a", "key"))
            .with(ProjectionEntry::new("b", "key"));
        assert_eq!(model.duplicate_output(), Some("key"));
        assert_eq!(ProjectionModel::identity(["a", "b"]).duplicate_output(), None);
    }
}
