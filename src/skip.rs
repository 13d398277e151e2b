//! Skip paths: positions inside one requested type where deep copying stops.
//!
//! A path is a sequence of segments, not a string, so `a.b` can never be
//! confused with a field literally named `a.b`. Text notation is only used at
//! the edges (CLI input, error messages):
//!
//! - `Map`        the field `Map` itself (no corrective statement at all)
//! - `Map[k]`     values of map `Map` (map is still re-allocated)
//! - `List[i]`    elements of slice/array `List` (storage still re-allocated)
//! - `[i]`        elements of a requested named slice type
use std::fmt;
use indexmap::IndexSet;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    /// `[i]`
    Elem,
    /// `[k]`
    Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SkipPath(Vec<Segment>);

impl SkipPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    fn with(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn field(&self, name: &str) -> Self {
        self.with(Segment::Field(name.to_string()))
    }

    pub fn elem(&self) -> Self {
        self.with(Segment::Elem)
    }

    pub fn value(&self) -> Self {
        self.with(Segment::Value)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let fail = |message: &str| Error::SkipSyntax { text: text.to_string(), message: message.to_string() };
        if text.is_empty() {
            return Err(fail("empty path"));
        }

        let mut segments = Vec::new();
        let mut rest = text;
        let mut expect_name = false;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                if expect_name {
                    return Err(fail("expected a field name after `.`"));
                }
                let close = after.find(']').ok_or_else(|| fail("missing `]`"))?;
                segments.push(match &after[..close] {
                    "i" => Segment::Elem,
                    "k" => Segment::Value,
                    other => return Err(fail(&format!("unknown position marker `[{other}]`, expected `[i]` or `[k]`"))),
                });
                rest = &after[close + 1..];
                if !(rest.is_empty() || rest.starts_with('.') || rest.starts_with('[')) {
                    return Err(fail("position marker must be followed by `.`, `[` or the end"));
                }
            } else if let Some(after) = rest.strip_prefix('.') {
                if segments.is_empty() || expect_name {
                    return Err(fail("empty field name"));
                }
                expect_name = true;
                rest = after;
            } else {
                if !segments.is_empty() && !expect_name {
                    return Err(fail("field names must be separated by `.`"));
                }
                let len = rest.find(['.', '[']).unwrap_or(rest.len());
                let name = &rest[..len];
                if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(fail(&format!("`{name}` is not a field name")));
                }
                segments.push(Segment::Field(name.to_string()));
                expect_name = false;
                rest = &rest[len..];
            }
        }
        if expect_name {
            return Err(fail("trailing `.`"));
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for SkipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Elem => f.write_str("[i]")?,
                Segment::Value => f.write_str("[k]")?,
            }
        }
        Ok(())
    }
}

/// Skip paths for exactly one requested type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    paths: IndexSet<SkipPath>,
}

impl SkipSet {
    /// Parses a comma-separated list such as `Map[k],ch`.
    pub fn parse_list(text: &str) -> Result<Self> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SkipPath::parse)
            .collect()
    }

    /// Exact match only: skipping `a` never implies skipping `a.b`.
    pub fn is_skipped(&self, path: &SkipPath) -> bool {
        self.paths.contains(path)
    }

    pub fn insert(&mut self, path: SkipPath) -> bool {
        self.paths.insert(path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkipPath> {
        self.paths.iter()
    }
}

impl FromIterator<SkipPath> for SkipSet {
    fn from_iter<I: IntoIterator<Item = SkipPath>>(iter: I) -> Self {
        Self { paths: iter.into_iter().collect() }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_fields_and_markers() {
        let path = SkipPath::parse("Map[k].Slice[i]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Field("Map".into()),
                Segment::Value,
                Segment::Field("Slice".into()),
                Segment::Elem,
            ]
        );
        assert_eq!(path.to_string(), "Map[k].Slice[i]");
    }

    #[test]
    fn built_paths_equal_parsed_paths() {
        let built = SkipPath::root().field("baz").field("Inner").value();
        assert_eq!(built, SkipPath::parse("baz.Inner[k]").unwrap());
        assert_eq!(SkipPath::root().elem(), SkipPath::parse("[i]").unwrap());
    }

    #[test]
    fn matching_is_exact() {
        let set = SkipSet::parse_list("Map, ch").unwrap();
        assert!(set.is_skipped(&SkipPath::root().field("Map")));
        assert!(set.is_skipped(&SkipPath::root().field("ch")));
        assert!(!set.is_skipped(&SkipPath::root().field("Map").value()));
        assert!(!set.is_skipped(&SkipPath::root().field("Map").value().field("Slice")));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for bad in ["", ".a", "a.", "a..b", "a[j]", "a[k]b", "a-b", "a[i"] {
            assert!(
                matches!(SkipPath::parse(bad), Err(Error::SkipSyntax { .. })),
                "`{bad}` should not parse"
            );
        }
    }

    #[test]
    fn empty_entries_in_lists_are_ignored() {
        let set = SkipSet::parse_list("a, ,b,").unwrap();
        assert_eq!(set.iter().count(), 2);
        assert!(SkipSet::parse_list("").unwrap().is_empty());
    }
}
