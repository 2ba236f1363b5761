//! Owned data-layout objects.
//!
//! A [`DataLayout`] owns a parsed native layout and releases it on drop.
//! Installing a layout on a module hands the module ownership of the object;
//! installing a replacement drops (and thereby disposes) the previous one.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::engine::NativeEngine;
use crate::handle::Handle;
use crate::registry::Registry;

/// An owned, parsed data-layout description.
pub struct DataLayout {
    engine: Rc<dyn NativeEngine>,
    handle: Cell<Handle>,
    repr: String,
}

impl DataLayout {
    /// Parse a layout string into an owned layout object.
    #[must_use]
    pub fn new(registry: &Registry, layout: &str) -> Self {
        let engine = registry.engine();
        let handle = engine.create_target_data(layout);
        let repr = engine.target_data_repr(handle);
        DataLayout {
            engine,
            handle: Cell::new(handle),
            repr,
        }
    }

    /// The native layout handle.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle.get()
    }

    /// The canonical string form of this layout.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.repr
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl fmt::Debug for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLayout")
            .field("handle", &self.handle.get())
            .field("repr", &self.repr)
            .finish()
    }
}

impl Drop for DataLayout {
    fn drop(&mut self) {
        let handle = self.handle.replace(Handle::NULL);
        if !handle.is_null() {
            self.engine.dispose_target_data(handle);
        }
    }
}
