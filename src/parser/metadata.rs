//! Self-describing type catalogue of a chunk.
//!
//! Section layout: `typeCount`, then per type `typeId name fieldCount` and per
//! field `name fieldTypeId flags`. Field types may reference types declared
//! later in the section, so all ids are materialized before any link is
//! checked.

use super::cursor::ByteCursor;
use super::event::EventKind;
use crate::utils::config::{
    DURATION_FIELD, FIELD_FLAG_ARRAY, FIELD_FLAG_CONSTANT_POOL, FIELD_FLAG_NULLABLE,
    START_TIME_FIELD,
};
use crate::utils::error::{DecodeError, FormatError};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Built-in value kinds, recognised by type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
}

impl PrimitiveKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "boolean" => PrimitiveKind::Boolean,
            "byte" => PrimitiveKind::Byte,
            "char" => PrimitiveKind::Char,
            "short" => PrimitiveKind::Short,
            "int" => PrimitiveKind::Int,
            "long" => PrimitiveKind::Long,
            "float" => PrimitiveKind::Float,
            "double" => PrimitiveKind::Double,
            "java.lang.String" => PrimitiveKind::String,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Composite,
}

/// One declared field of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_id: u64,
    pub is_array: bool,
    pub is_constant_pool: bool,
    pub is_nullable: bool,
}

/// Which leading fields of an event type carry ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventTiming {
    pub has_start_time: bool,
    pub has_duration: bool,
}

/// A type definition from the metadata section
#[derive(Debug)]
pub struct TypeMetadata {
    pub type_id: u64,
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    kind: TypeKind,
    event_kind: EventKind,
    timing: EventTiming,
    field_index: HashMap<String, usize>,
}

impl TypeMetadata {
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeKind::Primitive(p) => Some(p),
            TypeKind::Composite => None,
        }
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    pub fn timing(&self) -> EventTiming {
        self.timing
    }

    /// Position of a field by name, from the index built at decode time
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_index(name).map(|i| &self.fields[i])
    }
}

/// All type definitions of one chunk, keyed by chunk-local type id
#[derive(Debug, Default)]
pub struct Metadata {
    types: HashMap<u64, Arc<TypeMetadata>>,
    by_name: HashMap<String, u64>,
}

/// Field as read, before links are checked
struct RawField {
    descriptor: FieldDescriptor,
    offset: u64,
}

struct RawType {
    type_id: u64,
    name: String,
    fields: Vec<RawField>,
    offset: u64,
}

impl Metadata {
    /// Decode the metadata section at the cursor position
    ///
    /// **Public** - second step of every chunk decode
    ///
    /// # Errors
    /// * `FormatError::DuplicateType` - a type id declared twice
    /// * `FormatError::UnresolvedFieldType` - field type id never declared
    /// * `FormatError::UnsupportedFieldType` - primitive name with fields
    /// * `FormatError::RecursiveInlineType` - composite embedding itself inline
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        // Pass 1: materialize every type id
        let raw_types = read_raw_types(cursor)?;
        let mut declared: HashMap<u64, u64> = HashMap::with_capacity(raw_types.len());
        for raw in &raw_types {
            if declared.insert(raw.type_id, raw.offset).is_some() {
                return Err(DecodeError::format(
                    raw.offset,
                    FormatError::DuplicateType(raw.type_id),
                ));
            }
        }

        let long_ids: HashSet<u64> = raw_types
            .iter()
            .filter(|t| t.name == "long" && t.fields.is_empty())
            .map(|t| t.type_id)
            .collect();

        // Pass 2: resolve field links and build the catalogue
        let mut metadata = Metadata::default();
        for raw in raw_types {
            for field in &raw.fields {
                if !declared.contains_key(&field.descriptor.type_id) {
                    return Err(DecodeError::format(
                        field.offset,
                        FormatError::UnresolvedFieldType {
                            owner: raw.name.clone(),
                            field: field.descriptor.name.clone(),
                            type_id: field.descriptor.type_id,
                        },
                    ));
                }
            }
            let ty = build_type(raw, &long_ids)?;
            metadata.by_name.insert(ty.name.clone(), ty.type_id);
            metadata.types.insert(ty.type_id, Arc::new(ty));
        }

        metadata.check_inline_recursion(&declared)?;

        debug!("Decoded metadata: {} types", metadata.types.len());
        Ok(metadata)
    }

    pub fn get(&self, type_id: u64) -> Option<&Arc<TypeMetadata>> {
        self.types.get(&type_id)
    }

    /// Look up a type, failing with `UnknownType` at `offset`
    pub fn require(&self, type_id: u64, offset: u64) -> Result<&Arc<TypeMetadata>, DecodeError> {
        self.get(type_id)
            .ok_or_else(|| DecodeError::format(offset, FormatError::UnknownType(type_id)))
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<TypeMetadata>> {
        self.by_name.get(name).and_then(|id| self.types.get(id))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeMetadata>> {
        self.types.values()
    }

    /// A composite whose non-array, non-pool fields lead back to itself
    /// would need infinitely many bytes.
    fn check_inline_recursion(&self, declared: &HashMap<u64, u64>) -> Result<(), DecodeError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Visit {
            Active,
            Done,
        }

        let mut state: HashMap<u64, Visit> = HashMap::new();
        for root in self.types.keys() {
            if state.contains_key(root) {
                continue;
            }
            state.insert(*root, Visit::Active);
            // (type id, index of the next field to follow)
            let mut stack = vec![(*root, 0usize)];
            while let Some((type_id, next)) = stack.last_mut() {
                let child = self.get(*type_id).and_then(|ty| {
                    let found = ty.fields[*next..]
                        .iter()
                        .position(|f| !f.is_array && !f.is_constant_pool)?;
                    *next += found + 1;
                    Some(ty.fields[*next - 1].type_id)
                });
                let Some(child) = child else {
                    state.insert(*type_id, Visit::Done);
                    stack.pop();
                    continue;
                };
                match state.get(&child) {
                    Some(Visit::Done) => {}
                    Some(Visit::Active) => {
                        let name = self.get(child).map(|t| t.name.clone()).unwrap_or_default();
                        let offset = declared.get(root).copied().unwrap_or(0);
                        return Err(DecodeError::format(
                            offset,
                            FormatError::RecursiveInlineType(name),
                        ));
                    }
                    None => {
                        state.insert(child, Visit::Active);
                        stack.push((child, 0));
                    }
                }
            }
        }
        Ok(())
    }
}

fn read_raw_types(cursor: &mut ByteCursor<'_>) -> Result<Vec<RawType>, DecodeError> {
    let type_count = cursor.read_length()?;
    let mut types = Vec::with_capacity(type_count);

    for _ in 0..type_count {
        let offset = cursor.absolute_position();
        let type_id = cursor.read_varint()?;
        let name = cursor.read_utf8()?;
        let field_count = cursor.read_length()?;

        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let field_offset = cursor.absolute_position();
            let field_name = cursor.read_utf8()?;
            let field_type = cursor.read_varint()?;
            let flags = cursor.read_u8()?;
            fields.push(RawField {
                descriptor: FieldDescriptor {
                    name: field_name,
                    type_id: field_type,
                    is_array: flags & FIELD_FLAG_ARRAY != 0,
                    is_constant_pool: flags & FIELD_FLAG_CONSTANT_POOL != 0,
                    is_nullable: flags & FIELD_FLAG_NULLABLE != 0,
                },
                offset: field_offset,
            });
        }

        types.push(RawType {
            type_id,
            name,
            fields,
            offset,
        });
    }

    Ok(types)
}

fn build_type(raw: RawType, long_ids: &HashSet<u64>) -> Result<TypeMetadata, DecodeError> {
    let kind = match PrimitiveKind::from_type_name(&raw.name) {
        Some(_) if !raw.fields.is_empty() => {
            return Err(DecodeError::format(
                raw.offset,
                FormatError::UnsupportedFieldType(format!(
                    "primitive '{}' declares {} fields",
                    raw.name,
                    raw.fields.len()
                )),
            ));
        }
        Some(p) => TypeKind::Primitive(p),
        None => TypeKind::Composite,
    };

    let fields: Vec<FieldDescriptor> = raw.fields.into_iter().map(|f| f.descriptor).collect();
    let field_index = fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.clone(), i))
        .collect();

    let is_tick_field = |index: usize, name: &str| {
        fields.get(index).is_some_and(|f| {
            f.name == name && long_ids.contains(&f.type_id) && !f.is_array && !f.is_constant_pool
        })
    };
    let timing = EventTiming {
        has_start_time: is_tick_field(0, START_TIME_FIELD),
        has_duration: is_tick_field(1, DURATION_FIELD),
    };

    Ok(TypeMetadata {
        type_id: raw.type_id,
        event_kind: EventKind::from_type_name(&raw.name),
        name: raw.name,
        fields,
        kind,
        timing,
        field_index,
    })
}


#[cfg(test)]
mod tests {
    use super::tests_support::section;
    use super::*;

    #[test]
    fn test_forward_references_resolve() {
        // Event declared before the long and thread types it uses
        let bytes = section(&[
            (
                10,
                "jdk.ThreadStart",
                &[("startTime", 1, 0), ("thread", 20, FIELD_FLAG_CONSTANT_POOL)],
            ),
            (1, "long", &[]),
            (20, "java.lang.Thread", &[("javaName", 2, 0)]),
            (2, "java.lang.String", &[]),
        ]);
        let md = Metadata::read(&mut ByteCursor::new(&bytes)).unwrap();

        assert_eq!(md.len(), 4);
        let event = md.get(10).unwrap();
        assert_eq!(event.kind(), TypeKind::Composite);
        assert_eq!(event.field_index("thread"), Some(1));
        assert!(event.field("thread").unwrap().is_constant_pool);
        assert!(event.timing().has_start_time);
        assert!(!event.timing().has_duration);
        assert_eq!(md.by_name("long").unwrap().primitive(), Some(PrimitiveKind::Long));
    }

    #[test]
    fn test_unresolved_field_type() {
        let bytes = section(&[(10, "jdk.Foo", &[("bar", 99, 0)])]);
        let err = Metadata::read(&mut ByteCursor::new(&bytes)).unwrap_err();
        assert_eq!(
            err.format_kind(),
            Some(&FormatError::UnresolvedFieldType {
                owner: "jdk.Foo".to_string(),
                field: "bar".to_string(),
                type_id: 99,
            })
        );
    }

    #[test]
    fn test_duplicate_type_id() {
        let bytes = section(&[(1, "long", &[]), (1, "int", &[])]);
        let err = Metadata::read(&mut ByteCursor::new(&bytes)).unwrap_err();
        assert_eq!(err.format_kind(), Some(&FormatError::DuplicateType(1)));
    }

    #[test]
    fn test_primitive_with_fields_unsupported() {
        let bytes = section(&[(1, "long", &[("x", 1, 0)])]);
        let err = Metadata::read(&mut ByteCursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err.format_kind(),
            Some(FormatError::UnsupportedFieldType(_))
        ));
    }

    #[test]
    fn test_inline_self_embedding_rejected() {
        let bytes = section(&[(5, "Node", &[("next", 5, 0)])]);
        let err = Metadata::read(&mut ByteCursor::new(&bytes)).unwrap_err();
        assert_eq!(
            err.format_kind(),
            Some(&FormatError::RecursiveInlineType("Node".to_string()))
        );
    }

    #[test]
    fn test_long_inline_chain() {
        // T0 embeds T1 embeds T2 ... the last embeds a long
        const DEPTH: u64 = 50_000;
        let names: Vec<String> = (0..DEPTH).map(|i| format!("T{}", i)).collect();
        let fields: Vec<[(&str, u64, u8); 1]> = (0..DEPTH)
            .map(|i| [("inner", if i + 1 == DEPTH { 1 } else { 100 + i + 1 }, 0)])
            .collect();
        let mut types: Vec<(u64, &str, &[(&str, u64, u8)])> = (0..DEPTH)
            .map(|i| (100 + i, names[i as usize].as_str(), &fields[i as usize][..]))
            .collect();
        types.push((1, "long", &[]));

        let md = Metadata::read(&mut ByteCursor::new(&section(&types))).unwrap();
        assert_eq!(md.len(), DEPTH as usize + 1);

        // Closing the chain back onto T0 makes it infinite
        let closed = [("inner", 100, 0)];
        let last = types.len() - 2;
        types[last].2 = &closed;
        let err = Metadata::read(&mut ByteCursor::new(&section(&types))).unwrap_err();
        assert!(matches!(
            err.format_kind(),
            Some(FormatError::RecursiveInlineType(_))
        ));
    }

    #[test]
    fn test_self_reference_through_pool_or_array_allowed() {
        let bytes = section(&[(
            5,
            "Node",
            &[
                ("next", 5, FIELD_FLAG_CONSTANT_POOL | FIELD_FLAG_NULLABLE),
                ("children", 5, FIELD_FLAG_ARRAY),
            ],
        )]);
        let md = Metadata::read(&mut ByteCursor::new(&bytes)).unwrap();
        let node = md.get(5).unwrap();
        assert!(node.fields[0].is_nullable);
        assert!(node.fields[1].is_array);
    }

    #[test]
    fn test_start_time_must_be_long() {
        let bytes = section(&[
            (10, "jdk.Odd", &[("startTime", 2, 0)]),
            (2, "java.lang.String", &[]),
        ]);
        let md = Metadata::read(&mut ByteCursor::new(&bytes)).unwrap();
        assert!(!md.get(10).unwrap().timing().has_start_time);
    }

    #[test]
    fn test_event_kind_assigned_once() {
        let bytes = section(&[
            (1, "long", &[]),
            (30, "jdk.GarbageCollection", &[("startTime", 1, 0), ("duration", 1, 0)]),
        ]);
        let md = Metadata::read(&mut ByteCursor::new(&bytes)).unwrap();
        let gc = md.get(30).unwrap();
        assert_eq!(gc.event_kind(), EventKind::GarbageCollection);
        assert!(gc.timing().has_duration);
    }
}
