//! Native framework classes.
//!
//! Each host class a subclass may extend is represented by a zero-sized marker
//! implementing [`FrameworkClass`]. Generated wrapper code declares one marker
//! per class in the host's API description with [`framework_class!`]; the core
//! set below is declared by hand so the bridge works without generated code.

/// A native class known to the host.
pub trait FrameworkClass: Send + Sync + 'static {
    /// Bare class name as the host knows it.
    const CLASS_NAME: &'static str;
    /// Direct native parent, `None` for the root class.
    const PARENT_NAME: Option<&'static str>;
    /// Whether instances are reference counted by the host.
    const IS_REFCOUNTED: bool;
}

/// Declare a framework class marker.
///
/// ```
/// use hostbind::framework_class;
/// use hostbind::classes::{FrameworkClass, Node2D};
///
/// framework_class!(Sprite2D: Node2D);
///
/// assert_eq!(Sprite2D::CLASS_NAME, "Sprite2D");
/// assert_eq!(Sprite2D::PARENT_NAME, Some("Node2D"));
/// ```
#[macro_export]
macro_rules! framework_class {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name;

        impl $crate::classes::FrameworkClass for $name {
            const CLASS_NAME: &'static str = stringify!($name);
            const PARENT_NAME: Option<&'static str> = None;
            const IS_REFCOUNTED: bool = false;
        }
    };
    ($(#[$meta:meta])* $name:ident : $parent:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name;

        impl $crate::classes::FrameworkClass for $name {
            const CLASS_NAME: &'static str = stringify!($name);
            const PARENT_NAME: Option<&'static str> =
                Some(<$parent as $crate::classes::FrameworkClass>::CLASS_NAME);
            const IS_REFCOUNTED: bool = <$parent as $crate::classes::FrameworkClass>::IS_REFCOUNTED;
        }
    };
    ($(#[$meta:meta])* $name:ident : $parent:ident, refcounted) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name;

        impl $crate::classes::FrameworkClass for $name {
            const CLASS_NAME: &'static str = stringify!($name);
            const PARENT_NAME: Option<&'static str> =
                Some(<$parent as $crate::classes::FrameworkClass>::CLASS_NAME);
            const IS_REFCOUNTED: bool = true;
        }
    };
}

framework_class!(
    /// Root of the host class hierarchy.
    Object
);
framework_class!(RefCounted: Object, refcounted);
framework_class!(Resource: RefCounted);
framework_class!(Node: Object);
framework_class!(CanvasItem: Node);
framework_class!(Node2D: CanvasItem);
framework_class!(Node3D: Node);

/// `(class, parent, refcounted)` for the hand-declared classes, root first.
pub const CORE_CLASSES: &[(&str, Option<&str>, bool)] = &[
    (Object::CLASS_NAME, Object::PARENT_NAME, Object::IS_REFCOUNTED),
    (RefCounted::CLASS_NAME, RefCounted::PARENT_NAME, RefCounted::IS_REFCOUNTED),
    (Resource::CLASS_NAME, Resource::PARENT_NAME, Resource::IS_REFCOUNTED),
    (Node::CLASS_NAME, Node::PARENT_NAME, Node::IS_REFCOUNTED),
    (CanvasItem::CLASS_NAME, CanvasItem::PARENT_NAME, CanvasItem::IS_REFCOUNTED),
    (Node2D::CLASS_NAME, Node2D::PARENT_NAME, Node2D::IS_REFCOUNTED),
    (Node3D::CLASS_NAME, Node3D::PARENT_NAME, Node3D::IS_REFCOUNTED),
];

/// Well-known notification codes.
pub mod notify {
    pub const POSTINITIALIZE: i32 = 0;
    pub const PREDELETE: i32 = 1;
    pub const ENTER_TREE: i32 = 10;
    pub const EXIT_TREE: i32 = 11;
    pub const READY: i32 = 13;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy() {
        assert_eq!(Node2D::PARENT_NAME, Some("CanvasItem"));
        assert_eq!(Object::PARENT_NAME, None);
        assert!(Resource::IS_REFCOUNTED);
        assert!(!Node3D::IS_REFCOUNTED);
    }

    #[test]
    fn core_classes_are_root_first() {
        for (i, (_, parent, _)) in CORE_CLASSES.iter().enumerate() {
            if let Some(parent) = parent {
                assert!(CORE_CLASSES[..i].iter().any(|(name, _, _)| name == parent));
            }
        }
    }
}
