//! A class with no exports compiles with only `base`.

use hostbind::prelude::*;

#[derive(Class)]
struct Empty {
    base: Base,
}

impl Subclass for Empty {
    type Parent = Node;

    fn init(base: Base) -> Self {
        Self { base }
    }
}

fn main() {
    assert!(Empty::exported_properties().is_empty());
}
