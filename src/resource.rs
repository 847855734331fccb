//! In-memory resource tree and ignore rules.
//!
//! A [`Resource`] is a snapshot of one file (its bytes) or one directory (its
//! children) taken during collection. Children are kept sorted by name and a
//! directory can never hold two children with the same name.

use crate::fs::{DEFAULT_DIR_MODE, ResourceInfo, ROOT_NAME};
use glob::{MatchOptions, Pattern, PatternError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate entry name: {0}")]
pub struct DuplicateName(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    File(Vec<u8>),
    Dir(Vec<Resource>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    info: ResourceInfo,
    content: Content,
}

impl Resource {
    pub fn file(info: ResourceInfo, data: Vec<u8>) -> Self {
        Self {
            info: ResourceInfo {
                size: data.len() as u64,
                is_dir: false,
                ..info
            },
            content: Content::File(data),
        }
    }

    /// A directory; children are sorted by name.
    pub fn dir(info: ResourceInfo, mut children: Vec<Resource>) -> Result<Self, DuplicateName> {
        children.sort_by(|a, b| a.info.name.cmp(&b.info.name));
        if let Some(pair) = children.windows(2).find(|w| w[0].info.name == w[1].info.name) {
            return Err(DuplicateName(pair[0].info.name.clone()));
        }
        Ok(Self {
            info: ResourceInfo {
                size: 0,
                is_dir: true,
                ..info
            },
            content: Content::Dir(children),
        })
    }

    /// A directory recorded without its contents.
    pub fn empty_dir(info: ResourceInfo) -> Self {
        Self {
            info: ResourceInfo {
                size: 0,
                is_dir: true,
                ..info
            },
            content: Content::Dir(Vec::new()),
        }
    }

    /// The root of an empty tree.
    pub fn empty_root() -> Self {
        Self::empty_dir(ResourceInfo::dir(ROOT_NAME, DEFAULT_DIR_MODE, 0))
    }

    pub fn info(&self) -> &ResourceInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn is_dir(&self) -> bool {
        self.info.is_dir
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// File bytes, or `None` for a directory.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.content {
            Content::File(data) => Some(data),
            Content::Dir(_) => None,
        }
    }

    /// Children of a directory; empty for files.
    pub fn children(&self) -> &[Resource] {
        match &self.content {
            Content::Dir(children) => children,
            Content::File(_) => &[],
        }
    }

    /// Look up a descendant by `/`-separated relative path.
    pub fn find(&self, path: &str) -> Option<&Resource> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self, |node, part| {
                node.children().iter().find(|child| child.name() == part)
            })
    }

    /// Number of files below this node (or 1 for a file).
    pub fn file_count(&self) -> usize {
        match &self.content {
            Content::File(_) => 1,
            Content::Dir(children) => children.iter().map(Resource::file_count).sum(),
        }
    }

    /// Number of directories strictly below this node.
    pub fn dir_count(&self) -> usize {
        self.children()
            .iter()
            .filter(|c| c.is_dir())
            .map(|c| 1 + c.dir_count())
            .sum()
    }

    /// Total size of all file contents below this node.
    pub fn total_bytes(&self) -> u64 {
        match &self.content {
            Content::File(data) => data.len() as u64,
            Content::Dir(children) => children.iter().map(Resource::total_bytes).sum(),
        }
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Glob patterns excluding resources from a bundle.
///
/// A rule matches when it matches either the entry's path relative to the
/// resource root or its base name, so `*.psd` drops Photoshop files at any
/// depth while `drafts/*.md` only matches inside `drafts/`.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Add a rule matching exactly `path` (glob metacharacters escaped).
    pub fn push_literal(&mut self, path: &str) -> Result<(), PatternError> {
        self.patterns.push(Pattern::new(&Pattern::escape(path))?);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn matches(&self, path: &str, name: &str) -> bool {
        self.patterns.iter().any(|p| {
            p.matches_with(path, MATCH_OPTIONS) || p.matches_with(name, MATCH_OPTIONS)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, data: &str) -> Resource {
        Resource::file(ResourceInfo::file(name, 0, 0o644, 0), data.as_bytes().to_vec())
    }

    fn dir(name: &str, children: Vec<Resource>) -> Resource {
        Resource::dir(ResourceInfo::dir(name, 0o755, 0), children).unwrap()
    }

    #[test]
    fn dir_sorts_children_by_name() {
        let d = dir("d", vec![file("b", ""), file("a", ""), file("c", "")]);
        let names: Vec<&str> = d.children().iter().map(Resource::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn dir_rejects_duplicate_names() {
        let err = Resource::dir(
            ResourceInfo::dir("d", 0o755, 0),
            vec![file("x", "1"), file("x", "2")],
        )
        .unwrap_err();
        assert_eq!(err, DuplicateName("x".to_string()));
    }

    #[test]
    fn file_size_follows_content() {
        let f = file("a", "hello");
        assert_eq!(f.info().size, 5);
        assert_eq!(f.data(), Some(&b"hello"[..]));
        assert!(f.children().is_empty());
    }

    #[test]
    fn counts_and_totals() {
        let tree = dir(
            ".",
            vec![
                file("a", "hi"),
                dir("sub", vec![file("b", "bye"), dir("empty", vec![])]),
            ],
        );
        assert_eq!(tree.file_count(), 2);
        assert_eq!(tree.dir_count(), 2);
        assert_eq!(tree.total_bytes(), 5);
    }

    #[test]
    fn find_walks_paths() {
        let tree = dir(".", vec![dir("sub", vec![file("b", "bye")])]);
        assert_eq!(tree.find("sub/b").and_then(Resource::data), Some(&b"bye"[..]));
        assert!(tree.find("sub/c").is_none());
        assert_eq!(tree.find("").map(Resource::name), Some("."));
    }

    #[test]
    fn ignore_matches_base_name_at_any_depth() {
        let rules = IgnoreRules::new(["*.log"]).unwrap();
        assert!(rules.matches("debug.log", "debug.log"));
        assert!(rules.matches("deep/nested/debug.log", "debug.log"));
        assert!(!rules.matches("debug.txt", "debug.txt"));
    }

    #[test]
    fn ignore_path_pattern_is_anchored() {
        let rules = IgnoreRules::new(["drafts/*.md"]).unwrap();
        assert!(rules.matches("drafts/a.md", "a.md"));
        assert!(!rules.matches("other/drafts/a.md", "a.md"));
        assert!(!rules.matches("a.md", "a.md"));
    }

    #[test]
    fn ignore_literal_escapes_metacharacters() {
        let mut rules = IgnoreRules::default();
        rules.push_literal("out/[gen].rs").unwrap();
        assert!(rules.matches("out/[gen].rs", "[gen].rs"));
        assert!(!rules.matches("out/g.rs", "g.rs"));
    }

    #[test]
    fn invalid_pattern_is_error() {
        assert!(IgnoreRules::new(["[unclosed"]).is_err());
    }

    #[test]
    fn empty_rules_match_nothing() {
        let rules = IgnoreRules::default();
        assert!(rules.is_empty());
        assert!(!rules.matches("a", "a"));
    }
}
