//! Property metadata handed to the host.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use hostbind_core::{ElementType, StringName, VariantType, VariantTyped};

/// Editor hint attached to a property. Values are part of the host ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum PropertyHint {
    #[default]
    None = 0,
    Range = 1,
    Enum = 2,
    EnumSuggestion = 3,
    ExpEasing = 4,
    Link = 5,
    Flags = 6,
    Layers2DRender = 7,
    Layers2DPhysics = 8,
    Layers2DNavigation = 9,
    Layers3DRender = 10,
    Layers3DPhysics = 11,
    Layers3DNavigation = 12,
    File = 13,
    Dir = 14,
    GlobalFile = 15,
    GlobalDir = 16,
    ResourceType = 17,
    MultilineText = 18,
    Expression = 19,
    PlaceholderText = 20,
    ColorNoAlpha = 21,
    ObjectId = 22,
    TypeString = 23,
    NodePathToEditedNode = 24,
    ObjectTooBig = 25,
    NodePathValidTypes = 26,
    SaveFile = 27,
    GlobalSaveFile = 28,
    IntIsObjectId = 29,
    IntIsPointer = 30,
    ArrayType = 31,
    LocaleId = 32,
    LocalizableString = 33,
    NodeType = 34,
    HideQuaternionEdit = 35,
    Password = 36,
    LayersAvoidance = 37,
    DictionaryType = 38,
}

bitflags! {
    /// How the host stores, shows and serializes a property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyUsage: u32 {
        const NONE = 0;
        const STORAGE = 1 << 1;
        const EDITOR = 1 << 2;
        const INTERNAL = 1 << 3;
        const CHECKABLE = 1 << 4;
        const CHECKED = 1 << 5;
        const GROUP = 1 << 6;
        const CATEGORY = 1 << 7;
        const SUBGROUP = 1 << 8;
        const NO_INSTANCE_STATE = 1 << 11;
        const SCRIPT_VARIABLE = 1 << 13;
        const READ_ONLY = 1 << 28;
        const DEFAULT = Self::STORAGE.bits() | Self::EDITOR.bits();
    }
}

impl Default for PropertyUsage {
    fn default() -> Self {
        PropertyUsage::DEFAULT
    }
}

/// Description of one property, argument or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: StringName,
    pub variant_type: VariantType,
    /// Class constraint for object-typed values.
    pub class_name: Option<StringName>,
    pub hint: PropertyHint,
    pub hint_string: String,
    pub usage: PropertyUsage,
}

impl PropertyInfo {
    pub fn new(name: impl Into<StringName>, variant_type: VariantType) -> Self {
        Self {
            name: name.into(),
            variant_type,
            class_name: None,
            hint: PropertyHint::None,
            hint_string: String::new(),
            usage: PropertyUsage::DEFAULT,
        }
    }

    /// Property info derived from a Rust type's Variant tag.
    pub fn of<T: VariantTyped>(name: impl Into<StringName>) -> Self {
        Self {
            class_name: T::class_name(),
            ..Self::new(name, T::VARIANT_TYPE)
        }
        .with_element_types(&T::element_types())
    }

    /// Record the element types of a typed container: `Array[int]` with an
    /// [`PropertyHint::ArrayType`] hint, `Dictionary[String, int]` with a
    /// [`PropertyHint::DictionaryType`] hint. Untyped containers and other
    /// values are returned unchanged.
    pub fn with_element_types(mut self, elements: &[ElementType]) -> Self {
        match (self.variant_type, elements) {
            (VariantType::Array, [element]) if element.is_typed() => {
                self.class_name = Some(StringName::from(format!("Array[{element}]")));
                self.hint = PropertyHint::ArrayType;
                self.hint_string = element.to_string();
            }
            (VariantType::Dictionary, [key, value]) if key.is_typed() || value.is_typed() => {
                self.class_name = Some(StringName::from(format!("Dictionary[{key}, {value}]")));
                self.hint = PropertyHint::DictionaryType;
                self.hint_string = format!("{key};{value}");
            }
            _ => {}
        }
        self
    }

    pub fn with_hint(mut self, hint: PropertyHint, hint_string: impl Into<String>) -> Self {
        self.hint = hint;
        self.hint_string = hint_string.into();
        self
    }

    pub fn with_usage(mut self, usage: PropertyUsage) -> Self {
        self.usage = usage;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbind_core::Vector3;

    #[test]
    fn info_from_type() {
        let info = PropertyInfo::of::<Vector3>("velocity");
        assert_eq!(info.variant_type, VariantType::Vector3);
        assert_eq!(info.usage, PropertyUsage::STORAGE | PropertyUsage::EDITOR);
        assert!(info.class_name.is_none());
    }

    #[test]
    fn typed_containers_describe_their_elements() {
        let array = PropertyInfo::new("slots", VariantType::Array).with_element_types(&[ElementType::new(VariantType::Int)]);
        assert_eq!(array.class_name.as_deref(), Some("Array[int]"));
        assert_eq!(array.hint, PropertyHint::ArrayType);
        assert_eq!(array.hint_string, "int");

        let nodes = PropertyInfo::new("nodes", VariantType::Array).with_element_types(&[ElementType::object("Node")]);
        assert_eq!(nodes.class_name.as_deref(), Some("Array[Node]"));
        assert_eq!(nodes.hint_string, "Node");

        let scores = PropertyInfo::new("scores", VariantType::Dictionary)
            .with_element_types(&[ElementType::new(VariantType::String), ElementType::UNTYPED]);
        assert_eq!(scores.class_name.as_deref(), Some("Dictionary[String, Variant]"));
        assert_eq!(scores.hint, PropertyHint::DictionaryType);
        assert_eq!(scores.hint_string, "String;Variant");

        let untyped = PropertyInfo::new("items", VariantType::Array).with_element_types(&[ElementType::UNTYPED]);
        assert_eq!(untyped.hint, PropertyHint::None);
        assert!(untyped.class_name.is_none());
    }

    #[test]
    fn hint_values() {
        assert_eq!(u32::from(PropertyHint::Range), 1);
        assert_eq!(PropertyHint::try_from(17u32).ok(), Some(PropertyHint::ResourceType));
        let info = PropertyInfo::of::<i64>("speed").with_hint(PropertyHint::Range, "0,100,1");
        assert_eq!(info.hint_string, "0,100,1");
    }
}
