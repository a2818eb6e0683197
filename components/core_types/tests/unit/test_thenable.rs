//! Unit tests for the Thenable capability

use core_types::{SettleFn, Thenable, Value};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Records subscriptions so a test can settle them later.
#[derive(Default)]
struct Deferred {
    waiters: RefCell<Vec<(SettleFn, SettleFn)>>,
}

impl Thenable for Deferred {
    fn subscribe(&self, on_fulfilled: SettleFn, on_rejected: SettleFn) -> Result<(), Value> {
        self.waiters.borrow_mut().push((on_fulfilled, on_rejected));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn thenable_values_compare_by_identity() {
    let shared: Rc<dyn Thenable> = Rc::new(Deferred::default());
    let a = Value::Thenable(shared.clone());
    let b = Value::Thenable(shared);
    let c = Value::Thenable(Rc::new(Deferred::default()));

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn thenable_can_be_downcast() {
    let value = Value::Thenable(Rc::new(Deferred::default()));
    match &value {
        Value::Thenable(t) => assert!(t.as_any().downcast_ref::<Deferred>().is_some()),
        other => panic!("expected thenable, got {:?}", other),
    }
}

#[test]
fn subscribe_delivers_to_callbacks() {
    let deferred = Deferred::default();
    let seen = Rc::new(RefCell::new(None));

    let s = seen.clone();
    deferred
        .subscribe(
            Box::new(move |v| *s.borrow_mut() = Some(v)),
            Box::new(|_| panic!("should not reject")),
        )
        .unwrap();

    let (on_fulfilled, _) = deferred.waiters.borrow_mut().remove(0);
    on_fulfilled(Value::Smi(9));
    assert_eq!(*seen.borrow(), Some(Value::Smi(9)));
}

#[test]
fn thenable_display_and_type() {
    let value = Value::Thenable(Rc::new(Deferred::default()));
    assert!(value.is_thenable());
    assert!(value.is_truthy());
    assert_eq!(value.to_string(), "[object Promise]");
    assert_eq!(format!("{:?}", value), "Thenable(...)");
}
