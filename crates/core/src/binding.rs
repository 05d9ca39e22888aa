//! Typed storage slots and the type-erased bindings behind parameter
//! definitions.
//!
//! Callers keep a cloneable slot handle and read results from it after
//! parsing; [`crate::Parser::def`] erases the slot into a `Box<dyn Binding>`
//! that knows how to convert and write values, grow sequences, validate
//! untouched defaults against custom scanners, and render the current
//! contents for diagnostics. Clones of a slot share the same storage, and
//! that shared storage is also the identity used for duplicate-target
//! detection.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::convert::FromArg;

/// What a target stores, as seen by the assignment engine.
#[doc(hidden)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Scalar,
    Array,
    List,
    Map,
}

/// Custom per-value scanner: parses text into the element type.
pub(crate) type ScanFn<T> = Rc<dyn Fn(&str) -> Result<T, String>>;

// ──────────────────────────────────────────────
// Slots
// ──────────────────────────────────────────────

/// Scalar target: takes exactly one value (or at most one with
/// [`crate::Param::opt`]).
pub struct Slot<T> {
    inner: Rc<RefCell<T>>,
}

impl<T: Default> Slot<T> {
    pub fn new() -> Slot<T> {
        Slot::with(T::default())
    }
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Slot::new()
    }
}

impl<T> Slot<T> {
    /// A slot starting out with `value`, which doubles as the default for
    /// optional parameters.
    pub fn with(value: T) -> Slot<T> {
        Slot {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }
}

impl<T: Clone> Slot<T> {
    /// The current value.
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Fixed-length sequence target: takes exactly `N` values.
pub struct ArraySlot<T, const N: usize> {
    inner: Rc<RefCell<[T; N]>>,
}

impl<T: Default, const N: usize> ArraySlot<T, N> {
    pub fn new() -> Self {
        ArraySlot::with([(); N].map(|_| T::default()))
    }
}

impl<T: Default, const N: usize> Default for ArraySlot<T, N> {
    fn default() -> Self {
        ArraySlot::new()
    }
}

impl<T, const N: usize> ArraySlot<T, N> {
    pub fn with(values: [T; N]) -> Self {
        ArraySlot {
            inner: Rc::new(RefCell::new(values)),
        }
    }
}

impl<T: Clone, const N: usize> ArraySlot<T, N> {
    pub fn get(&self) -> [T; N] {
        self.inner.borrow().clone()
    }
}

impl<T, const N: usize> Clone for ArraySlot<T, N> {
    fn clone(&self) -> Self {
        ArraySlot {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Growable sequence target.
pub struct ListSlot<T> {
    inner: Rc<RefCell<Vec<T>>>,
    limit: usize,
}

impl<T> ListSlot<T> {
    /// A list taking any number of values.
    pub fn new() -> Self {
        ListSlot {
            inner: Rc::new(RefCell::new(Vec::new())),
            limit: 0,
        }
    }

    /// A list taking at most `max` values; 0 means unbounded.
    pub fn bounded(max: usize) -> Self {
        ListSlot {
            inner: Rc::new(RefCell::new(Vec::new())),
            limit: max,
        }
    }

    /// An unbounded list with initial default elements.
    pub fn with_default(values: Vec<T>) -> Self {
        ListSlot {
            inner: Rc::new(RefCell::new(values)),
            limit: 0,
        }
    }

    /// A bounded list with initial default elements.
    pub fn bounded_with_default(max: usize, values: Vec<T>) -> Self {
        ListSlot {
            inner: Rc::new(RefCell::new(values)),
            limit: max,
        }
    }
}

impl<T> Default for ListSlot<T> {
    fn default() -> Self {
        ListSlot::new()
    }
}

impl<T: Clone> ListSlot<T> {
    /// The current elements.
    pub fn get(&self) -> Vec<T> {
        self.inner.borrow().clone()
    }
}

impl<T> Clone for ListSlot<T> {
    fn clone(&self) -> Self {
        ListSlot {
            inner: Rc::clone(&self.inner),
            limit: self.limit,
        }
    }
}

/// Keyed map target; pairs are parsed out of the value text.
pub struct MapSlot<K, V> {
    inner: Rc<RefCell<BTreeMap<K, V>>>,
}

impl<K, V> MapSlot<K, V> {
    pub fn new() -> Self {
        MapSlot {
            inner: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }
}

impl<K, V> Default for MapSlot<K, V> {
    fn default() -> Self {
        MapSlot::new()
    }
}

impl<K: Clone + Ord, V: Clone> MapSlot<K, V> {
    /// A copy of the current entries.
    pub fn get(&self) -> BTreeMap<K, V> {
        self.inner.borrow().clone()
    }
}

impl<K, V> Clone for MapSlot<K, V> {
    fn clone(&self) -> Self {
        MapSlot {
            inner: Rc::clone(&self.inner),
        }
    }
}

// ──────────────────────────────────────────────
// Type erasure
// ──────────────────────────────────────────────

mod sealed {
    pub trait Sealed {}
}

/// Types accepted as [`crate::Parser::def`] targets.
pub trait Bindable: sealed::Sealed {
    #[doc(hidden)]
    fn binding(&self) -> Box<dyn Binding>;
}

/// Type-erased view of a target used by the assignment engine.
#[doc(hidden)]
pub trait Binding {
    fn kind(&self) -> TargetKind;
    /// Identity of the shared storage, for duplicate-target detection.
    fn target_id(&self) -> usize;
    /// Value limit derived from the target shape: array length, list bound
    /// (0 for unbounded), 1 otherwise.
    fn initial_limit(&self) -> usize;
    /// Current element count; scalars and maps report 0.
    fn current_len(&self) -> usize;
    /// Grow a list to `total` elements, keeping existing ones.
    fn grow(&mut self, total: usize);
    /// Convert and write a scalar value.
    fn assign(&mut self, value: &str) -> Result<(), String>;
    /// Convert and write the element at `index`.
    fn assign_at(&mut self, index: usize, value: &str) -> Result<(), String>;
    /// Convert and insert a key-value pair (maps only).
    fn assign_pair(&mut self, key: &str, value: &str) -> Result<(), String>;
    fn takes_bool(&self) -> bool;
    fn takes_string(&self) -> bool;
    fn has_scan(&self) -> bool;
    /// Install a custom scanner; `f` must box a `ScanFn` over the element
    /// type.
    fn set_scan(&mut self, f: Box<dyn Any>) -> Result<(), String>;
    /// Run the custom scanner against the default value (scalar) or the
    /// default element at `index`, discarding the result.
    fn check_default(&self, index: Option<usize>) -> Result<(), String>;
    /// Render the current contents for diagnostics.
    fn render(&self) -> String;
    /// Short element/target type name for documentation.
    fn type_name(&self) -> String;
}

fn convert<T: FromArg>(scan: &Option<ScanFn<T>>, value: &str) -> Result<T, String> {
    match scan {
        Some(f) => f(value),
        None => T::from_arg(value),
    }
}

fn install_scan<T: FromArg>(
    slot: &mut Option<ScanFn<T>>,
    f: Box<dyn Any>,
) -> Result<(), String> {
    match f.downcast::<ScanFn<T>>() {
        Ok(f) => {
            *slot = Some(*f);
            Ok(())
        }
        Err(_) => Err(format!(
            "scan function does not produce the target type {}",
            short_type_name::<T>()
        )),
    }
}

fn render_seq<T: std::fmt::Display>(items: &[T]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{item}");
    }
    out.push(']');
    out
}

fn short_type_name<T: 'static>() -> String {
    std::any::type_name::<T>()
        .rsplit("::")
        .next()
        .unwrap_or("?")
        .to_string()
}

// ── Scalar ───────────────────────────────────

struct ScalarBinding<T: FromArg> {
    slot: Slot<T>,
    scan: Option<ScanFn<T>>,
}

impl<T: FromArg> Binding for ScalarBinding<T> {
    fn kind(&self) -> TargetKind {
        TargetKind::Scalar
    }

    fn target_id(&self) -> usize {
        Rc::as_ptr(&self.slot.inner) as *const () as usize
    }

    fn initial_limit(&self) -> usize {
        1
    }

    fn current_len(&self) -> usize {
        0
    }

    fn grow(&mut self, _total: usize) {}

    fn assign(&mut self, value: &str) -> Result<(), String> {
        let v = convert(&self.scan, value)?;
        self.slot.set(v);
        Ok(())
    }

    fn assign_at(&mut self, _index: usize, value: &str) -> Result<(), String> {
        self.assign(value)
    }

    fn assign_pair(&mut self, _key: &str, _value: &str) -> Result<(), String> {
        Err("target does not take key-value pairs".to_string())
    }

    fn takes_bool(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<bool>()
    }

    fn takes_string(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<String>()
    }

    fn has_scan(&self) -> bool {
        self.scan.is_some()
    }

    fn set_scan(&mut self, f: Box<dyn Any>) -> Result<(), String> {
        install_scan(&mut self.scan, f)
    }

    fn check_default(&self, _index: Option<usize>) -> Result<(), String> {
        match &self.scan {
            Some(f) => f(&self.slot.inner.borrow().to_string()).map(|_| ()),
            None => Ok(()),
        }
    }

    fn render(&self) -> String {
        self.slot.inner.borrow().to_string()
    }

    fn type_name(&self) -> String {
        short_type_name::<T>()
    }
}

impl<T: FromArg> sealed::Sealed for Slot<T> {}

impl<T: FromArg> Bindable for Slot<T> {
    fn binding(&self) -> Box<dyn Binding> {
        Box::new(ScalarBinding {
            slot: self.clone(),
            scan: None,
        })
    }
}

// ── Array ────────────────────────────────────

struct ArrayBinding<T: FromArg, const N: usize> {
    slot: ArraySlot<T, N>,
    scan: Option<ScanFn<T>>,
}

impl<T: FromArg, const N: usize> Binding for ArrayBinding<T, N> {
    fn kind(&self) -> TargetKind {
        TargetKind::Array
    }

    fn target_id(&self) -> usize {
        Rc::as_ptr(&self.slot.inner) as *const () as usize
    }

    fn initial_limit(&self) -> usize {
        N
    }

    fn current_len(&self) -> usize {
        N
    }

    fn grow(&mut self, _total: usize) {}

    fn assign(&mut self, _value: &str) -> Result<(), String> {
        Err("target takes indexed values".to_string())
    }

    fn assign_at(&mut self, index: usize, value: &str) -> Result<(), String> {
        let v = convert(&self.scan, value)?;
        self.slot.inner.borrow_mut()[index] = v;
        Ok(())
    }

    fn assign_pair(&mut self, _key: &str, _value: &str) -> Result<(), String> {
        Err("target does not take key-value pairs".to_string())
    }

    fn takes_bool(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<bool>()
    }

    fn takes_string(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<String>()
    }

    fn has_scan(&self) -> bool {
        self.scan.is_some()
    }

    fn set_scan(&mut self, f: Box<dyn Any>) -> Result<(), String> {
        install_scan(&mut self.scan, f)
    }

    fn check_default(&self, _index: Option<usize>) -> Result<(), String> {
        Ok(())
    }

    fn render(&self) -> String {
        render_seq(&*self.slot.inner.borrow())
    }

    fn type_name(&self) -> String {
        short_type_name::<T>()
    }
}

impl<T: FromArg, const N: usize> sealed::Sealed for ArraySlot<T, N> {}

impl<T: FromArg, const N: usize> Bindable for ArraySlot<T, N> {
    fn binding(&self) -> Box<dyn Binding> {
        Box::new(ArrayBinding {
            slot: self.clone(),
            scan: None,
        })
    }
}

// ── List ─────────────────────────────────────

struct ListBinding<T: FromArg> {
    slot: ListSlot<T>,
    scan: Option<ScanFn<T>>,
}

impl<T: FromArg> Binding for ListBinding<T> {
    fn kind(&self) -> TargetKind {
        TargetKind::List
    }

    fn target_id(&self) -> usize {
        Rc::as_ptr(&self.slot.inner) as *const () as usize
    }

    fn initial_limit(&self) -> usize {
        self.slot.limit
    }

    fn current_len(&self) -> usize {
        self.slot.inner.borrow().len()
    }

    fn grow(&mut self, total: usize) {
        let mut v = self.slot.inner.borrow_mut();
        if total > v.len() {
            v.resize_with(total, T::default);
        }
    }

    fn assign(&mut self, _value: &str) -> Result<(), String> {
        Err("target takes indexed values".to_string())
    }

    fn assign_at(&mut self, index: usize, value: &str) -> Result<(), String> {
        let v = convert(&self.scan, value)?;
        self.slot.inner.borrow_mut()[index] = v;
        Ok(())
    }

    fn assign_pair(&mut self, _key: &str, _value: &str) -> Result<(), String> {
        Err("target does not take key-value pairs".to_string())
    }

    fn takes_bool(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<bool>()
    }

    fn takes_string(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<String>()
    }

    fn has_scan(&self) -> bool {
        self.scan.is_some()
    }

    fn set_scan(&mut self, f: Box<dyn Any>) -> Result<(), String> {
        install_scan(&mut self.scan, f)
    }

    fn check_default(&self, index: Option<usize>) -> Result<(), String> {
        let (Some(f), Some(i)) = (&self.scan, index) else {
            return Ok(());
        };
        f(&self.slot.inner.borrow()[i].to_string()).map(|_| ())
    }

    fn render(&self) -> String {
        render_seq(&self.slot.inner.borrow())
    }

    fn type_name(&self) -> String {
        short_type_name::<T>()
    }
}

impl<T: FromArg> sealed::Sealed for ListSlot<T> {}

impl<T: FromArg> Bindable for ListSlot<T> {
    fn binding(&self) -> Box<dyn Binding> {
        Box::new(ListBinding {
            slot: self.clone(),
            scan: None,
        })
    }
}

// ── Map ──────────────────────────────────────

struct MapBinding<K: FromArg + Ord, V: FromArg> {
    slot: MapSlot<K, V>,
}

impl<K: FromArg + Ord, V: FromArg> Binding for MapBinding<K, V> {
    fn kind(&self) -> TargetKind {
        TargetKind::Map
    }

    fn target_id(&self) -> usize {
        Rc::as_ptr(&self.slot.inner) as *const () as usize
    }

    fn initial_limit(&self) -> usize {
        1
    }

    fn current_len(&self) -> usize {
        0
    }

    fn grow(&mut self, _total: usize) {}

    fn assign(&mut self, _value: &str) -> Result<(), String> {
        Err("target takes key-value pairs".to_string())
    }

    fn assign_at(&mut self, _index: usize, _value: &str) -> Result<(), String> {
        Err("target takes key-value pairs".to_string())
    }

    fn assign_pair(&mut self, key: &str, value: &str) -> Result<(), String> {
        let k = K::from_arg(key).map_err(|e| format!("key cannot be converted: {e}"))?;
        let v = V::from_arg(value)
            .map_err(|e| format!(r#"value for key "{key}" cannot be converted: {e}"#))?;
        self.slot.inner.borrow_mut().insert(k, v);
        Ok(())
    }

    fn takes_bool(&self) -> bool {
        false
    }

    fn takes_string(&self) -> bool {
        false
    }

    fn has_scan(&self) -> bool {
        false
    }

    fn set_scan(&mut self, _f: Box<dyn Any>) -> Result<(), String> {
        Err("not supported for map parameters".to_string())
    }

    fn check_default(&self, _index: Option<usize>) -> Result<(), String> {
        Ok(())
    }

    fn render(&self) -> String {
        let map = self.slot.inner.borrow();
        let mut out = String::from("{");
        for (i, (k, v)) in map.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{k}: {v}");
        }
        out.push('}');
        out
    }

    fn type_name(&self) -> String {
        format!("{} -> {}", short_type_name::<K>(), short_type_name::<V>())
    }
}

impl<K: FromArg + Ord, V: FromArg> sealed::Sealed for MapSlot<K, V> {}

impl<K: FromArg + Ord, V: FromArg> Bindable for MapSlot<K, V> {
    fn binding(&self) -> Box<dyn Binding> {
        Box::new(MapBinding { slot: self.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_share_storage() {
        let a = Slot::<i64>::new();
        let b = a.clone();
        a.set(7);
        assert_eq!(b.get(), 7);
        assert_eq!(a.binding().target_id(), b.binding().target_id());
        let c = Slot::<i64>::new();
        assert_ne!(a.binding().target_id(), c.binding().target_id());
    }

    #[test]
    fn test_scalar_binding() {
        let slot = Slot::<u16>::new();
        let mut b = slot.binding();
        assert_eq!(b.kind(), TargetKind::Scalar);
        assert_eq!(b.initial_limit(), 1);
        b.assign("0x10").unwrap();
        assert_eq!(slot.get(), 16);
        assert!(b.assign("70000").is_err());
    }

    #[test]
    fn test_array_binding() {
        let slot = ArraySlot::<f64, 3>::new();
        let mut b = slot.binding();
        assert_eq!(b.initial_limit(), 3);
        b.assign_at(0, "1").unwrap();
        b.assign_at(2, "3.5").unwrap();
        assert_eq!(slot.get(), [1.0, 0.0, 3.5]);
        assert_eq!(b.render(), "[1 0 3.5]");
    }

    #[test]
    fn test_list_binding_grow_preserves_defaults() {
        let slot = ListSlot::<String>::with_default(vec!["a".into(), "b".into()]);
        let mut b = slot.binding();
        b.grow(3);
        b.assign_at(2, "c").unwrap();
        assert_eq!(slot.get(), vec!["a", "b", "c"]);
        b.grow(2); // never shrinks
        assert_eq!(slot.get().len(), 3);
    }

    #[test]
    fn test_map_binding() {
        let slot = MapSlot::<String, i64>::new();
        let mut b = slot.binding();
        b.assign_pair("x", "1").unwrap();
        b.assign_pair("y", "0x2").unwrap();
        assert_eq!(slot.get()["x"], 1);
        assert_eq!(slot.get()["y"], 2);
        let err = b.assign_pair("x", "oops").unwrap_err();
        assert!(err.contains(r#"key "x""#), "{err}");
    }

    #[test]
    fn test_takes_bool_and_string() {
        assert!(Slot::<bool>::new().binding().takes_bool());
        assert!(ListSlot::<bool>::new().binding().takes_bool());
        assert!(!Slot::<i64>::new().binding().takes_bool());
        assert!(Slot::<String>::new().binding().takes_string());
        assert!(ArraySlot::<String, 2>::new().binding().takes_string());
        assert!(!MapSlot::<String, String>::new().binding().takes_string());
    }

    #[test]
    fn test_custom_scan() {
        let slot = Slot::<i64>::new();
        let mut b = slot.binding();
        let f: ScanFn<i64> = Rc::new(|s| {
            s.parse::<i64>()
                .map_err(|e| e.to_string())
                .and_then(|n| if n % 2 == 0 { Ok(n) } else { Err("odd".into()) })
        });
        b.set_scan(Box::new(f)).unwrap();
        b.assign("4").unwrap();
        assert_eq!(slot.get(), 4);
        assert!(b.assign("5").is_err());
        // default 0 passes the scanner
        assert!(b.check_default(None).is_ok());
    }

    #[test]
    fn test_scan_type_mismatch() {
        let slot = Slot::<i64>::new();
        let mut b = slot.binding();
        let f: ScanFn<f64> = Rc::new(|s| s.parse::<f64>().map_err(|e| e.to_string()));
        assert!(b.set_scan(Box::new(f)).is_err());
    }
}
