//! Structural field decoding.
//!
//! Values are first read with constant-pool references left as ids
//! ([`RawValue::Ref`]); [`materialize`] later swaps each reference for the
//! shared value it points at.

use super::cursor::ByteCursor;
use super::metadata::{FieldDescriptor, Metadata, PrimitiveKind, TypeKind, TypeMetadata};
use super::value::{Object, Value};
use crate::utils::config::{
    MAX_NESTING_DEPTH, STRING_ENCODING_CHAR_ARRAY, STRING_ENCODING_CONSTANT_POOL, STRING_ENCODING_EMPTY,
    STRING_ENCODING_LATIN1, STRING_ENCODING_NULL, STRING_ENCODING_UTF8,
};
use crate::utils::error::{DecodeError, FormatError};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) enum RawValue {
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(String),
    Array(Vec<RawValue>),
    Object {
        ty: Arc<TypeMetadata>,
        values: Vec<RawValue>,
    },
    Ref {
        type_id: u64,
        id: u64,
        nullable: bool,
        offset: u64,
    },
}

impl RawValue {
    #[cfg(test)]
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            RawValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Resolves constant-pool references while materializing
pub(crate) trait ResolveRef {
    fn resolve_ref(
        &mut self,
        type_id: u64,
        id: u64,
        nullable: bool,
        offset: u64,
    ) -> Result<Value, DecodeError>;
}

/// Read one field according to its descriptor
///
/// `depth` is the nesting level of the composite owning the field.
pub(crate) fn read_field(
    cursor: &mut ByteCursor<'_>,
    metadata: &Metadata,
    field: &FieldDescriptor,
    depth: usize,
) -> Result<RawValue, DecodeError> {
    if !field.is_array {
        return read_element(cursor, metadata, field, depth);
    }
    let len = cursor.read_length()?;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(read_element(cursor, metadata, field, depth)?);
    }
    Ok(RawValue::Array(items))
}

fn read_element(
    cursor: &mut ByteCursor<'_>,
    metadata: &Metadata,
    field: &FieldDescriptor,
    depth: usize,
) -> Result<RawValue, DecodeError> {
    let offset = cursor.absolute_position();
    if field.is_constant_pool {
        let id = cursor.read_varint()?;
        return Ok(RawValue::Ref {
            type_id: field.type_id,
            id,
            nullable: field.is_nullable,
            offset,
        });
    }
    let ty = metadata.require(field.type_id, offset)?;
    read_type_value(cursor, metadata, ty, depth + 1)
}

/// Read a complete value of `ty`: a primitive, or every field inline
///
/// # Errors
/// * `FormatError::NestingTooDeep` - composites nested past `MAX_NESTING_DEPTH`
pub(crate) fn read_type_value(
    cursor: &mut ByteCursor<'_>,
    metadata: &Metadata,
    ty: &Arc<TypeMetadata>,
    depth: usize,
) -> Result<RawValue, DecodeError> {
    match ty.kind() {
        TypeKind::Primitive(kind) => read_primitive(cursor, kind, ty.type_id),
        TypeKind::Composite => {
            if depth > MAX_NESTING_DEPTH {
                return Err(cursor.format_error(FormatError::NestingTooDeep(MAX_NESTING_DEPTH)));
            }
            let mut values = Vec::with_capacity(ty.fields.len());
            for field in &ty.fields {
                values.push(read_field(cursor, metadata, field, depth)?);
            }
            Ok(RawValue::Object {
                ty: Arc::clone(ty),
                values,
            })
        }
    }
}

fn read_primitive(
    cursor: &mut ByteCursor<'_>,
    kind: PrimitiveKind,
    type_id: u64,
) -> Result<RawValue, DecodeError> {
    let value = match kind {
        PrimitiveKind::Boolean => RawValue::Bool(cursor.read_u8()? != 0),
        PrimitiveKind::Byte => RawValue::Int(cursor.read_i8()? as i64),
        PrimitiveKind::Short => RawValue::Int(cursor.read_varint()? as i16 as i64),
        PrimitiveKind::Int => RawValue::Int(cursor.read_varint()? as i32 as i64),
        PrimitiveKind::Long => RawValue::Int(cursor.read_varint()? as i64),
        PrimitiveKind::Float => RawValue::Float(cursor.read_f32()? as f64),
        PrimitiveKind::Double => RawValue::Float(cursor.read_f64()?),
        PrimitiveKind::Char => RawValue::Char(read_char(cursor)?),
        PrimitiveKind::String => read_string(cursor, type_id)?,
    };
    Ok(value)
}

fn read_char(cursor: &mut ByteCursor<'_>) -> Result<char, DecodeError> {
    let offset = cursor.absolute_position();
    let code = cursor.read_varint()?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| DecodeError::format(offset, FormatError::InvalidChar(code)))
}

fn read_string(cursor: &mut ByteCursor<'_>, string_type_id: u64) -> Result<RawValue, DecodeError> {
    let offset = cursor.absolute_position();
    let encoding = cursor.read_u8()?;
    let value = match encoding {
        STRING_ENCODING_NULL => RawValue::Absent,
        STRING_ENCODING_EMPTY => RawValue::String(String::new()),
        STRING_ENCODING_CONSTANT_POOL => RawValue::Ref {
            type_id: string_type_id,
            id: cursor.read_varint()?,
            nullable: false,
            offset,
        },
        STRING_ENCODING_UTF8 => RawValue::String(cursor.read_utf8()?),
        STRING_ENCODING_CHAR_ARRAY => {
            let len = cursor.read_length()?;
            let mut s = String::with_capacity(len);
            for _ in 0..len {
                s.push(read_char(cursor)?);
            }
            RawValue::String(s)
        }
        STRING_ENCODING_LATIN1 => {
            let len = cursor.read_length()?;
            let bytes = cursor.read_bytes(len)?;
            RawValue::String(bytes.iter().map(|&b| b as char).collect())
        }
        other => {
            return Err(DecodeError::format(
                offset,
                FormatError::UnsupportedStringEncoding(other),
            ))
        }
    };
    Ok(value)
}

/// Turn a structural value into a decoded one, resolving every reference
pub(crate) fn materialize<R: ResolveRef>(raw: &RawValue, resolver: &mut R) -> Result<Value, DecodeError> {
    let value = match raw {
        RawValue::Absent => Value::Absent,
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Int(i) => Value::Int(*i),
        RawValue::Float(f) => Value::Float(*f),
        RawValue::Char(c) => Value::Char(*c),
        RawValue::String(s) => Value::String(Arc::from(s.as_str())),
        RawValue::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| materialize(item, resolver))
                .collect::<Result<_, _>>()?,
        ),
        RawValue::Object { ty, values } => {
            let values = values
                .iter()
                .map(|v| materialize(v, resolver))
                .collect::<Result<_, _>>()?;
            Value::Object(Arc::new(Object::new(Arc::clone(ty), values)))
        }
        RawValue::Ref {
            type_id,
            id,
            nullable,
            offset,
        } => resolver.resolve_ref(*type_id, *id, *nullable, *offset)?,
    };
    Ok(value)
}
