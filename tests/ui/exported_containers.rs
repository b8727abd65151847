//! Container and math fields can be exported.

use hostbind::prelude::*;

#[derive(Class)]
#[hostbind(name = "Inventory")]
struct InventoryImpl {
    base: Base,
    #[hostbind(export)]
    slots: TypedArray<i64>,
    #[hostbind(export)]
    origin: Vector2,
    #[hostbind(export, read_only)]
    owner: GString,
}

impl Subclass for InventoryImpl {
    type Parent = Node2D;

    fn init(base: Base) -> Self {
        Self {
            base,
            slots: TypedArray::new(),
            origin: Vector2::default(),
            owner: GString::default(),
        }
    }
}

fn main() {
    assert_eq!(InventoryImpl::exported_properties().len(), 3);
}
