//! Scenario tests over the in-memory engine double.
//!
//! Unit tests for the classification tables and error display live next to
//! their modules; everything here exercises the public API end to end.

pub(crate) mod fake;

mod classification;

use std::rc::Rc;

use crate::Registry;
use fake::FakeEngine;

/// Fresh engine plus a registry over it. Keeping the concrete engine around
/// lets tests author native state and inspect liveness counters.
pub(crate) fn setup() -> (Rc<FakeEngine>, Registry) {
    crate::init_tracing();
    let engine = Rc::new(FakeEngine::new());
    let registry = Registry::new(Rc::clone(&engine) as Rc<dyn crate::NativeEngine>);
    (engine, registry)
}
