//! Slash-separated definition paths (spec.md §4.8 `get_path`/`search_path`).
//!
//! Shaped after the teacher's `ModPath` (`graphix-compiler/src/expr/mod.rs`):
//! a small vector of interned path segments rather than a single owned
//! string, so `push`/`pop` during a walk up or down the definition tree
//! don't reallocate the whole path each time.

use arcstr::ArcStr;
use smallvec::SmallVec;

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct NodePath(SmallVec<[ArcStr; 4]>);

impl NodePath {
    pub fn root() -> Self {
        NodePath(SmallVec::new())
    }

    pub fn push(&self, segment: impl Into<ArcStr>) -> Self {
        let mut v = self.0.clone();
        v.push(segment.into());
        NodePath(v)
    }

    pub fn segments(&self) -> &[ArcStr] {
        &self.0
    }

    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            return Self::root();
        }
        NodePath(trimmed.split('/').map(ArcStr::from).collect())
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/")?;
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{s}")?;
        }
        Ok(())
    }
}
