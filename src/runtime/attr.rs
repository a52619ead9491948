//! Typed, introspectable module attributes
//!
//! Every module declares its tunable parameters once at construction time as
//! named, constrained slots in an [`AttrStore`]. Hosts read and write them by
//! name; a failed write leaves the previous value untouched. The store is a
//! pure metadata/configuration layer: it never touches the frame path, and
//! the owning module drains change flags only at negotiation time or at a
//! frame boundary.

use super::errors::AttrError;

/// Value of an attribute: one tagged union covering scalars and arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strs(Vec<String>),
}

impl AttrValue {
    fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Str(_) => "string",
            AttrValue::Ints(_) => "int array",
            AttrValue::Floats(_) => "float array",
            AttrValue::Strs(_) => "string array",
        }
    }
}

/// Element type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Bool,
    Int,
    Float,
    Str,
    /// Integer index into a closed set of named values.
    Enum,
}

/// Shape of an attribute: a single value, a fixed-length array, or a
/// variable-length array bounded by a maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Scalar(AttrType),
    Array(AttrType, usize),
    VarArray(AttrType, usize),
}

/// Optional value constraint checked on every set.
#[derive(Debug, Clone, Copy)]
pub enum AttrConstraint {
    None,
    IntRange { min: i64, max: i64 },
    FloatRange { min: f64, max: f64 },
}

/// Static description of one attribute slot.
#[derive(Debug, Clone)]
pub struct AttrDescriptor {
    pub name: &'static str,
    pub doc: &'static str,
    pub kind: AttrKind,
    pub constraint: AttrConstraint,
    /// Named values for `AttrType::Enum`; empty otherwise.
    pub items: &'static [&'static str],
    /// True if changing this attribute changes the module's output stream
    /// format, requiring renegotiation to take effect.
    pub changes_stream: bool,
}

impl AttrDescriptor {
    fn new(name: &'static str, doc: &'static str, kind: AttrKind, changes_stream: bool) -> Self {
        Self {
            name,
            doc,
            kind,
            constraint: AttrConstraint::None,
            items: &[],
            changes_stream,
        }
    }

    pub fn bool(name: &'static str, doc: &'static str, changes_stream: bool) -> Self {
        Self::new(name, doc, AttrKind::Scalar(AttrType::Bool), changes_stream)
    }

    pub fn int(name: &'static str, doc: &'static str, changes_stream: bool) -> Self {
        Self::new(name, doc, AttrKind::Scalar(AttrType::Int), changes_stream)
    }

    pub fn float(name: &'static str, doc: &'static str, changes_stream: bool) -> Self {
        Self::new(name, doc, AttrKind::Scalar(AttrType::Float), changes_stream)
    }

    pub fn str(name: &'static str, doc: &'static str, changes_stream: bool) -> Self {
        Self::new(name, doc, AttrKind::Scalar(AttrType::Str), changes_stream)
    }

    /// Enumerated scalar over a closed list of named values.
    pub fn enumerated(
        name: &'static str,
        doc: &'static str,
        changes_stream: bool,
        items: &'static [&'static str],
    ) -> Self {
        let mut desc = Self::new(name, doc, AttrKind::Scalar(AttrType::Enum), changes_stream);
        desc.items = items;
        desc
    }

    /// Fixed-length float array.
    pub fn floats(
        name: &'static str,
        doc: &'static str,
        changes_stream: bool,
        len: usize,
    ) -> Self {
        Self::new(name, doc, AttrKind::Array(AttrType::Float, len), changes_stream)
    }

    /// Variable-length int array bounded by `max_len`.
    pub fn var_ints(
        name: &'static str,
        doc: &'static str,
        changes_stream: bool,
        max_len: usize,
    ) -> Self {
        Self::new(name, doc, AttrKind::VarArray(AttrType::Int, max_len), changes_stream)
    }

    /// Variable-length float array bounded by `max_len`.
    pub fn var_floats(
        name: &'static str,
        doc: &'static str,
        changes_stream: bool,
        max_len: usize,
    ) -> Self {
        Self::new(name, doc, AttrKind::VarArray(AttrType::Float, max_len), changes_stream)
    }

    /// Variable-length string array bounded by `max_len`.
    pub fn var_strs(
        name: &'static str,
        doc: &'static str,
        changes_stream: bool,
        max_len: usize,
    ) -> Self {
        Self::new(name, doc, AttrKind::VarArray(AttrType::Str, max_len), changes_stream)
    }

    /// Attach a numeric range constraint.
    pub fn range_int(mut self, min: i64, max: i64) -> Self {
        self.constraint = AttrConstraint::IntRange { min, max };
        self
    }

    /// Attach a float range constraint.
    pub fn range_float(mut self, min: f64, max: f64) -> Self {
        self.constraint = AttrConstraint::FloatRange { min, max };
        self
    }
}

/// Introspection record returned by attribute listing.
#[derive(Debug, Clone)]
pub struct AttrInfo {
    /// Dotted path from the listing root (e.g. `slicer.size`).
    pub path: String,
    pub doc: &'static str,
    pub kind: AttrKind,
    pub changes_stream: bool,
    pub value: AttrValue,
}

struct AttrSlot {
    desc: AttrDescriptor,
    value: AttrValue,
    changed: bool,
}

/// Ordered collection of attribute slots owned by one module.
#[derive(Default)]
pub struct AttrStore {
    slots: Vec<AttrSlot>,
}

impl AttrStore {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Declare a slot with its initial value. Called from module
    /// constructors only; duplicate names and initial values that violate
    /// the declared kind are construction bugs.
    pub fn declare(&mut self, desc: AttrDescriptor, initial: AttrValue) {
        assert!(
            !self.slots.iter().any(|s| s.desc.name == desc.name),
            "duplicate attribute name '{}'",
            desc.name
        );
        check_kind(&desc, &initial).expect("initial attribute value violates declared kind");
        self.slots.push(AttrSlot {
            desc,
            value: initial,
            changed: false,
        });
    }

    fn slot(&self, name: &str) -> Result<&AttrSlot, AttrError> {
        self.slots
            .iter()
            .find(|s| s.desc.name == name)
            .ok_or_else(|| AttrError::Unknown { path: name.to_string() })
    }

    /// Read a value by name.
    pub fn get(&self, name: &str) -> Result<AttrValue, AttrError> {
        self.slot(name).map(|s| s.value.clone())
    }

    /// Write a value by name: the value must match the declared kind and
    /// satisfy the constraint, else the previous value is retained and an
    /// error describing the violated rule is returned.
    ///
    /// Enum attributes accept `Int(index)` or `Str(item_name)`.
    pub fn set(&mut self, name: &str, value: AttrValue) -> Result<(), AttrError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.desc.name == name)
            .ok_or_else(|| AttrError::Unknown { path: name.to_string() })?;

        let value = coerce(&slot.desc, value)?;
        check_kind(&slot.desc, &value)?;
        check_constraint(&slot.desc, &value)?;

        slot.value = value;
        slot.changed = true;
        Ok(())
    }

    /// Drain the changed flag for one attribute.
    pub fn take_changed(&mut self, name: &str) -> bool {
        match self.slots.iter_mut().find(|s| s.desc.name == name) {
            Some(slot) => std::mem::take(&mut slot.changed),
            None => false,
        }
    }

    /// Append an [`AttrInfo`] per slot, with `prefix` prepended to each path.
    pub fn describe(&self, prefix: &str, out: &mut Vec<AttrInfo>) {
        for slot in &self.slots {
            out.push(AttrInfo {
                path: format!("{}{}", prefix, slot.desc.name),
                doc: slot.desc.doc,
                kind: slot.desc.kind,
                changes_stream: slot.desc.changes_stream,
                value: slot.value.clone(),
            });
        }
    }

    // ── Typed accessors for the owning module ────────────────────────────
    //
    // These read attributes the module itself declared; a kind mismatch
    // here is a bug in the module's declaration, not a runtime condition.

    pub fn int(&self, name: &str) -> i64 {
        match self.get(name) {
            Ok(AttrValue::Int(v)) => v,
            _ => panic!("attribute '{}' is not a declared int - bug in module", name),
        }
    }

    pub fn float(&self, name: &str) -> f64 {
        match self.get(name) {
            Ok(AttrValue::Float(v)) => v,
            _ => panic!("attribute '{}' is not a declared float - bug in module", name),
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        match self.get(name) {
            Ok(AttrValue::Bool(v)) => v,
            _ => panic!("attribute '{}' is not a declared bool - bug in module", name),
        }
    }

    pub fn ints(&self, name: &str) -> Vec<i64> {
        match self.get(name) {
            Ok(AttrValue::Ints(v)) => v,
            _ => panic!("attribute '{}' is not a declared int array - bug in module", name),
        }
    }

    pub fn floats(&self, name: &str) -> Vec<f64> {
        match self.get(name) {
            Ok(AttrValue::Floats(v)) => v,
            _ => panic!("attribute '{}' is not a declared float array - bug in module", name),
        }
    }

    pub fn strs(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Ok(AttrValue::Strs(v)) => v,
            _ => panic!("attribute '{}' is not a declared string array - bug in module", name),
        }
    }
}

/// Resolve enum-by-name sets and int-to-float widening before kind checking.
fn coerce(desc: &AttrDescriptor, value: AttrValue) -> Result<AttrValue, AttrError> {
    match desc.kind {
        AttrKind::Scalar(AttrType::Enum) => match value {
            AttrValue::Str(s) => match desc.items.iter().position(|item| *item == s) {
                Some(idx) => Ok(AttrValue::Int(idx as i64)),
                None => Err(AttrError::NotInEnum {
                    name: desc.name.to_string(),
                    value: s,
                    allowed: desc.items.join(", "),
                }),
            },
            other => Ok(other),
        },
        AttrKind::Scalar(AttrType::Float) => match value {
            AttrValue::Int(i) => Ok(AttrValue::Float(i as f64)),
            other => Ok(other),
        },
        _ => Ok(value),
    }
}

fn check_kind(desc: &AttrDescriptor, value: &AttrValue) -> Result<(), AttrError> {
    let mismatch = |expected: &'static str| AttrError::TypeMismatch {
        name: desc.name.to_string(),
        expected,
        got: value.type_name(),
    };

    match desc.kind {
        AttrKind::Scalar(ty) => match (ty, value) {
            (AttrType::Bool, AttrValue::Bool(_)) => Ok(()),
            (AttrType::Int, AttrValue::Int(_)) => Ok(()),
            (AttrType::Float, AttrValue::Float(_)) => Ok(()),
            (AttrType::Str, AttrValue::Str(_)) => Ok(()),
            (AttrType::Enum, AttrValue::Int(idx)) => {
                if (0..desc.items.len() as i64).contains(idx) {
                    Ok(())
                } else {
                    Err(AttrError::NotInEnum {
                        name: desc.name.to_string(),
                        value: idx.to_string(),
                        allowed: desc.items.join(", "),
                    })
                }
            }
            (AttrType::Bool, _) => Err(mismatch("bool")),
            (AttrType::Int, _) => Err(mismatch("int")),
            (AttrType::Float, _) => Err(mismatch("float")),
            (AttrType::Str, _) => Err(mismatch("string")),
            (AttrType::Enum, _) => Err(mismatch("enum index or item name")),
        },
        AttrKind::Array(ty, len) => {
            let got_len = array_len(ty, value).ok_or_else(|| mismatch(array_name(ty)))?;
            if got_len != len {
                return Err(AttrError::LengthMismatch {
                    name: desc.name.to_string(),
                    len: got_len,
                    expected: len,
                });
            }
            Ok(())
        }
        AttrKind::VarArray(ty, max_len) => {
            let got_len = array_len(ty, value).ok_or_else(|| mismatch(array_name(ty)))?;
            if got_len > max_len {
                return Err(AttrError::LengthExceeded {
                    name: desc.name.to_string(),
                    len: got_len,
                    max: max_len,
                });
            }
            Ok(())
        }
    }
}

fn array_len(ty: AttrType, value: &AttrValue) -> Option<usize> {
    match (ty, value) {
        (AttrType::Int, AttrValue::Ints(v)) => Some(v.len()),
        (AttrType::Float, AttrValue::Floats(v)) => Some(v.len()),
        (AttrType::Str, AttrValue::Strs(v)) => Some(v.len()),
        _ => None,
    }
}

fn array_name(ty: AttrType) -> &'static str {
    match ty {
        AttrType::Int => "int array",
        AttrType::Float => "float array",
        AttrType::Str => "string array",
        AttrType::Bool => "bool array",
        AttrType::Enum => "enum array",
    }
}

fn check_constraint(desc: &AttrDescriptor, value: &AttrValue) -> Result<(), AttrError> {
    match desc.constraint {
        AttrConstraint::None => Ok(()),
        AttrConstraint::IntRange { min, max } => {
            let check_one = |v: i64| -> Result<(), AttrError> {
                if v < min || v > max {
                    Err(AttrError::OutOfRange {
                        name: desc.name.to_string(),
                        value: v.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    })
                } else {
                    Ok(())
                }
            };
            match value {
                AttrValue::Int(v) => check_one(*v),
                AttrValue::Ints(vs) => vs.iter().try_for_each(|v| check_one(*v)),
                _ => Ok(()),
            }
        }
        AttrConstraint::FloatRange { min, max } => {
            let check_one = |v: f64| -> Result<(), AttrError> {
                if v < min || v > max {
                    Err(AttrError::OutOfRange {
                        name: desc.name.to_string(),
                        value: v.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    })
                } else {
                    Ok(())
                }
            };
            match value {
                AttrValue::Float(v) => check_one(*v),
                AttrValue::Floats(vs) => vs.iter().try_for_each(|v| check_one(*v)),
                _ => Ok(()),
            }
        }
    }
}
