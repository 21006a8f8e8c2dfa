//! Decoded field values.
//!
//! Composite values and pooled strings are reference counted so a constant
//! decoded once can be shared by every event and pool entry pointing at it.

use super::metadata::TypeMetadata;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Value {
    /// Explicit null: nullable reference with no target, or a null string
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(Arc<str>),
    Array(Vec<Value>),
    Object(Arc<Object>),
}

/// Instance of a composite type
#[derive(Debug)]
pub struct Object {
    ty: Arc<TypeMetadata>,
    values: Vec<Value>,
}

impl Object {
    pub(crate) fn new(ty: Arc<TypeMetadata>, values: Vec<Value>) -> Self {
        Self { ty, values }
    }

    pub fn type_name(&self) -> &str {
        &self.ty.name
    }

    pub fn type_id(&self) -> u64 {
        self.ty.type_id
    }

    pub fn metadata(&self) -> &Arc<TypeMetadata> {
        &self.ty
    }

    /// Field value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty.field_index(name).and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// (field name, value) pairs in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ty
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        // Type ids are chunk-local, names are stable
        self.ty.name == other.ty.name
            && self.values.len() == other.values.len()
            && self.values.iter().zip(&other.values).all(|(a, b)| a == b)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_to_depth(state, 0);
    }
}

impl Object {
    fn hash_to_depth<H: Hasher>(&self, state: &mut H, depth: usize) {
        self.ty.name.hash(state);
        self.values.len().hash(state);
        if depth < HASH_DEPTH {
            for value in &self.values {
                value.hash_to_depth(state, depth + 1);
            }
        }
    }
}

impl Drop for Object {
    // Unwind uniquely owned children here so a long chain of objects is
    // released without one stack frame per link.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.values);
        while let Some(value) = pending.pop() {
            match value {
                Value::Object(object) => {
                    if let Ok(mut object) = Arc::try_unwrap(object) {
                        pending.append(&mut object.values);
                    }
                }
                Value::Array(mut items) => pending.append(&mut items),
                _ => {}
            }
        }
    }
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Nested field lookup, `None` unless this is an object with that field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(name))
    }

    /// String content, unwrapping pooled wrappers such as symbols
    ///
    /// An object yields its first string-valued field.
    pub fn text(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Object(o) => o.values().iter().find_map(Value::as_str),
            _ => None,
        }
    }

    /// Whether both values point at the same shared allocation
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::String(a), Value::String(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            let same = match (a, b) {
                (Value::Absent, Value::Absent) => true,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
                (Value::Char(a), Value::Char(b)) => a == b,
                (Value::String(a), Value::String(b)) => a == b,
                (Value::Array(a), Value::Array(b)) => {
                    pending.extend(a.iter().zip(b.iter()));
                    a.len() == b.len()
                }
                (Value::Object(a), Value::Object(b)) => {
                    if Arc::ptr_eq(a, b) {
                        true
                    } else {
                        pending.extend(a.values.iter().zip(b.values.iter()));
                        a.ty.name == b.ty.name && a.values.len() == b.values.len()
                    }
                }
                _ => false,
            };
            if !same {
                return false;
            }
        }
        true
    }
}

impl Eq for Value {}

/// Levels of nesting that contribute to a hash; deeper levels only to equality
const HASH_DEPTH: usize = 8;

/// Levels of nesting written out by `Display` before eliding
const DISPLAY_DEPTH: usize = 32;

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_to_depth(state, 0);
    }
}

impl Value {
    fn hash_to_depth<H: Hasher>(&self, state: &mut H, depth: usize) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Absent => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Char(c) => c.hash(state),
            Value::String(s) => s.hash(state),
            Value::Array(items) => {
                items.len().hash(state);
                if depth < HASH_DEPTH {
                    for item in items {
                        item.hash_to_depth(state, depth + 1);
                    }
                }
            }
            Value::Object(o) => o.hash_to_depth(state, depth),
        }
    }

    fn write_to_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Value::Absent => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_to_depth(f, depth + 1)?;
                }
                f.write_str("]")
            }
            Value::Object(o) => o.write_to_depth(f, depth),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to_depth(f, 0)
    }
}

impl Object {
    fn write_to_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{} {{", self.ty.name)?;
        if depth >= DISPLAY_DEPTH {
            return f.write_str(" ... }");
        }
        for (i, (name, value)) in self.fields().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {} = ", name)?;
            value.write_to_depth(f, depth + 1)?;
        }
        f.write_str(" }")
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to_depth(f, 0)
    }
}

/// Key of one structural class: scalars by value, containers by the
/// classes of their children
#[derive(PartialEq, Eq, Hash)]
enum Shape {
    Absent,
    Bool(bool),
    Int(i64),
    Float(u64),
    Char(char),
    String(Arc<str>),
    Array(Vec<usize>),
    Object(String, Vec<usize>),
}

/// Numbers values so that two values share a class exactly when they are
/// equal
///
/// Composites are memoized by allocation, so values sharing pooled
/// sub-values are classified in time linear in the distinct allocations,
/// and nesting is walked with an explicit stack.
#[derive(Default)]
pub(crate) struct StructuralClasses {
    by_object: HashMap<*const Object, usize>,
    interned: HashMap<Shape, usize>,
}

impl StructuralClasses {
    pub(crate) fn class_of(&mut self, root: &Value) -> usize {
        enum Visit<'v> {
            Enter(&'v Value),
            Exit(&'v Value),
        }

        let mut visits = vec![Visit::Enter(root)];
        let mut classes: Vec<usize> = Vec::new();
        while let Some(visit) = visits.pop() {
            match visit {
                Visit::Enter(value) => {
                    if let Value::Object(o) = value {
                        if let Some(class) = self.by_object.get(&Arc::as_ptr(o)) {
                            classes.push(*class);
                            continue;
                        }
                    }
                    visits.push(Visit::Exit(value));
                    visits.extend(children(value).iter().rev().map(Visit::Enter));
                }
                Visit::Exit(value) => {
                    let inner = classes.split_off(classes.len() - children(value).len());
                    let shape = match value {
                        Value::Absent => Shape::Absent,
                        Value::Bool(b) => Shape::Bool(*b),
                        Value::Int(i) => Shape::Int(*i),
                        Value::Float(x) => Shape::Float(x.to_bits()),
                        Value::Char(c) => Shape::Char(*c),
                        Value::String(s) => Shape::String(Arc::clone(s)),
                        Value::Array(_) => Shape::Array(inner),
                        Value::Object(o) => Shape::Object(o.ty.name.clone(), inner),
                    };
                    let next = self.interned.len();
                    let class = *self.interned.entry(shape).or_insert(next);
                    if let Value::Object(o) = value {
                        self.by_object.insert(Arc::as_ptr(o), class);
                    }
                    classes.push(class);
                }
            }
        }
        classes.pop().unwrap_or_default()
    }
}

fn children(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(o) => &o.values,
        _ => &[],
    }
}
