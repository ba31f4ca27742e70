use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Kind of filesystem change reported for a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Added,
    Changed,
    Removed,
}

impl FileEventKind {
    pub const ALL: [FileEventKind; 3] = [
        FileEventKind::Added,
        FileEventKind::Changed,
        FileEventKind::Removed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileEventKind::Added => "added",
            FileEventKind::Changed => "changed",
            FileEventKind::Removed => "removed",
        }
    }
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" | "added" => Ok(FileEventKind::Added),
            "change" | "changed" => Ok(FileEventKind::Changed),
            "unlink" | "remove" | "removed" => Ok(FileEventKind::Removed),
            other => Err(format!(
                "invalid event: {other} (expected \"added\", \"changed\", \"removed\" or \"all\")"
            )),
        }
    }
}

/// Subset of [`FileEventKind`]s that feed the run scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSet {
    added: bool,
    changed: bool,
    removed: bool,
}

impl EventSet {
    pub const fn empty() -> Self {
        Self {
            added: false,
            changed: false,
            removed: false,
        }
    }

    pub const fn all() -> Self {
        Self {
            added: true,
            changed: true,
            removed: true,
        }
    }

    pub fn only(kind: FileEventKind) -> Self {
        let mut set = Self::empty();
        set.insert(kind);
        set
    }

    pub fn insert(&mut self, kind: FileEventKind) {
        match kind {
            FileEventKind::Added => self.added = true,
            FileEventKind::Changed => self.changed = true,
            FileEventKind::Removed => self.removed = true,
        }
    }

    pub fn contains(&self, kind: FileEventKind) -> bool {
        match kind {
            FileEventKind::Added => self.added,
            FileEventKind::Changed => self.changed,
            FileEventKind::Removed => self.removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.added || self.changed || self.removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = FileEventKind> + '_ {
        FileEventKind::ALL.into_iter().filter(|k| self.contains(*k))
    }

    /// Parse a list of event names. `"all"` expands to every kind.
    pub fn from_names<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::empty();
        for name in names {
            let name = name.as_ref();
            if name.trim().eq_ignore_ascii_case("all") {
                return Ok(Self::all());
            }
            set.insert(name.parse()?);
        }
        Ok(set)
    }
}

impl Default for EventSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<FileEventKind> for EventSet {
    fn from_iter<T: IntoIterator<Item = FileEventKind>>(iter: T) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// A value that may be written as a single item or as a list.
///
/// Used for config fields like `patterns = "src/**"` vs `patterns = ["src/**"]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(x) => vec![x],
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(value: Vec<T>) -> Self {
        OneOrMany::Many(value)
    }
}
