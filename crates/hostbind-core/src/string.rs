//! String-like host values.
//!
//! The host distinguishes three string flavours: mutable text ([`GString`]),
//! interned identifiers ([`StringName`]) and scene-tree paths ([`NodePath`]).
//! Each is carried by its own Variant tag.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Host text value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct GString(String);

impl GString {
    pub fn new() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// UTF-8 bytes, as handed to the host string constructor.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Build from a UTF-8 buffer handed back by the host. Invalid sequences are
    /// replaced with U+FFFD.
    pub fn from_utf8_lossy(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl From<&str> for GString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<GString> for String {
    fn from(s: GString) -> Self {
        s.0
    }
}

impl fmt::Display for GString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interned identifier used for class, method, property and signal names.
///
/// Cloning is a reference-count bump, so names can be stored in dispatch
/// tables and handed across the boundary freely.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringName(Arc<str>);

impl StringName {
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StringName {
    fn default() -> Self {
        Self::new("")
    }
}

impl From<&str> for StringName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StringName {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Borrow<str> for StringName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for StringName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StringName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StringName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for StringName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Debug for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{:?}", &*self.0)
    }
}

impl fmt::Display for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to a node in the host's scene tree, e.g. `"Player/Sprite"` or `"../Hud"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(String);

impl NodePath {
    pub fn new(path: &str) -> Self {
        Self(path.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    /// Node names along the path, without the property subpath.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let nodes = self.0.split(':').next().unwrap_or_default();
        nodes.split('/').filter(|s| !s.is_empty())
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_name_compares_with_str() {
        let name = StringName::from("_process");
        assert_eq!(name, "_process");
        assert_eq!(format!("{name:?}"), "&\"_process\"");
    }

    #[test]
    fn lossy_utf8() {
        let s = GString::from_utf8_lossy(&[b'o', b'k', 0xff]);
        assert_eq!(s.as_str(), "ok\u{fffd}");
    }

    #[test]
    fn node_path_names() {
        let path = NodePath::from("/root/Level/Player:position");
        assert!(path.is_absolute());
        assert_eq!(path.names().collect::<Vec<_>>(), vec!["root", "Level", "Player"]);
    }
}
