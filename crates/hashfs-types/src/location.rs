use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Where an object lives: a container plus the object's backend-relative name.
///
/// Names use `/` separators and never start or end with one. The container
/// root itself is represented by an empty name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectLocation {
    container: String,
    name: String,
}

impl ObjectLocation {
    /// Build a location from its parts, trimming stray separators.
    pub fn new(container: impl Into<String>, name: impl AsRef<str>) -> Result<Self, TypeError> {
        let container = container.into();
        if container.is_empty() || container.contains('/') {
            return Err(TypeError::InvalidLocation(format!(
                "bad container name {container:?}"
            )));
        }
        let name = normalize(name.as_ref());
        Ok(Self { container, name })
    }

    /// Parse `scheme://container/a/b`, `/container/a/b` or `container/a/b`.
    pub fn parse(path: &str) -> Result<Self, TypeError> {
        let without_scheme = match path.find("://") {
            Some(idx) => &path[idx + 3..],
            None => path,
        };
        let trimmed = without_scheme.trim_start_matches('/');
        let (container, name) = match trimmed.split_once('/') {
            Some((c, n)) => (c, n),
            None => (trimmed, ""),
        };
        if container.is_empty() {
            return Err(TypeError::InvalidLocation(path.to_string()));
        }
        Self::new(container, name)
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` for the container root.
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// Last path segment, or `None` at the container root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.name.rsplit('/').next()
    }

    /// Location of the parent directory, or `None` at the container root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let parent = match self.name.rfind('/') {
            Some(idx) => &self.name[..idx],
            None => "",
        };
        Some(Self {
            container: self.container.clone(),
            name: parent.to_string(),
        })
    }

    /// Append a relative child path.
    pub fn join(&self, child: &str) -> Self {
        let child = normalize(child);
        let name = match (self.name.is_empty(), child.is_empty()) {
            (true, _) => child,
            (false, true) => self.name.clone(),
            (false, false) => format!("{}/{}", self.name, child),
        };
        Self {
            container: self.container.clone(),
            name,
        }
    }

    /// Returns `true` if any path segment equals `segment` exactly.
    pub fn has_segment(&self, segment: &str) -> bool {
        self.segments().any(|s| s == segment)
    }

    /// Keep only the segments before the first `segment`.
    ///
    /// `out/_temporary/0/task` truncated at `_temporary` is `out`. Returns
    /// `None` when the segment does not occur.
    pub fn truncate_at_segment(&self, segment: &str) -> Option<Self> {
        let position = self.segments().position(|s| s == segment)?;
        let kept: Vec<&str> = self.segments().take(position).collect();
        Some(Self {
            container: self.container.clone(),
            name: kept.join("/"),
        })
    }

    /// Returns `true` if `self` is `other` or lies below it.
    pub fn starts_with(&self, other: &Self) -> bool {
        if self.container != other.container {
            return false;
        }
        if other.is_root() || self.name == other.name {
            return true;
        }
        self.name
            .strip_prefix(other.name.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Name relative to `ancestor`, if `self` lies strictly below it.
    pub fn relative_to(&self, ancestor: &Self) -> Option<&str> {
        if self == ancestor || !self.starts_with(ancestor) {
            return None;
        }
        if ancestor.is_root() {
            return Some(&self.name);
        }
        Some(&self.name[ancestor.name.len() + 1..])
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.name.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.container)
        } else {
            write!(f, "{}/{}", self.container, self.name)
        }
    }
}

fn normalize(name: &str) -> String {
    name.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
