use std::fmt;

/// A path-qualified class name, split into its bare name and enclosing path.
///
/// The host only understands bare class names, so registration strips the
/// module path that `std::any::type_name` reports.
///
/// # Examples
///
/// ```
/// use hostbind_core::QualifiedName;
///
/// let name = QualifiedName::from_qualified_string("my_game::actors::Player");
/// assert_eq!(name.simple_name(), "Player");
/// assert_eq!(name.namespace_string(), "my_game::actors");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// Bare name (e.g., "Player")
    pub name: String,
    /// Enclosing path (e.g., ["my_game", "actors"]); empty at top level
    pub namespace: Vec<String>,
}

impl QualifiedName {
    /// Create a qualified name at top level.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Vec::new(),
        }
    }

    /// Split a `::`-separated path. The last segment is the name.
    ///
    /// Leading `::` is ignored. Generic arguments stay attached to the name
    /// (`Wrapper<i32>`), which lets callers reject them.
    pub fn from_qualified_string(s: &str) -> Self {
        let mut parts: Vec<String> = split_outside_generics(s)
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        match parts.pop() {
            Some(name) => Self {
                name,
                namespace: parts,
            },
            None => Self::global(""),
        }
    }

    /// Check if this name has no enclosing path.
    pub fn is_global(&self) -> bool {
        self.namespace.is_empty()
    }

    /// The bare name.
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// The enclosing path joined with `::`.
    pub fn namespace_string(&self) -> String {
        self.namespace.join("::")
    }

    /// Class hash of the bare name.
    pub fn to_type_hash(&self) -> crate::TypeHash {
        crate::TypeHash::from_name(&self.name)
    }
}

fn split_outside_generics(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let bytes = s.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                parts.push(&s[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}::{}", self.namespace.join("::"), self.name)
        }
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        Self::from_qualified_string(s)
    }
}
