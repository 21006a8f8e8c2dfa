//! Event records.
//!
//! Each record is `size:varint typeId:varint` followed by the fields of that
//! type. The leading `startTime` (and optional `duration`) tick fields are
//! converted to nanoseconds before the event is handed out.

use super::constant_pool::{ConstantPools, PoolLookup};
use super::cursor::ByteCursor;
use super::metadata::{Metadata, TypeMetadata};
use super::raw::{materialize, read_field};
use super::time::TimeConverter;
use super::value::Value;
use crate::utils::error::{DecodeError, FormatError};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Event types with dedicated handling downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ExecutionSample,
    GarbageCollection,
    G1GarbageCollection,
    HeapSummary,
    G1HeapSummary,
    GcConfiguration,
    /// Any other type; its fields are still available by name
    Unrecognized,
}

const KNOWN_EVENTS: &[(&str, EventKind)] = &[
    ("jdk.ExecutionSample", EventKind::ExecutionSample),
    ("jdk.GarbageCollection", EventKind::GarbageCollection),
    ("jdk.G1GarbageCollection", EventKind::G1GarbageCollection),
    ("jdk.GCHeapSummary", EventKind::HeapSummary),
    ("jdk.G1HeapSummary", EventKind::G1HeapSummary),
    ("jdk.GCConfiguration", EventKind::GcConfiguration),
];

fn kind_table() -> &'static HashMap<&'static str, EventKind> {
    static TABLE: OnceLock<HashMap<&'static str, EventKind>> = OnceLock::new();
    TABLE.get_or_init(|| KNOWN_EVENTS.iter().copied().collect())
}

impl EventKind {
    pub fn from_type_name(name: &str) -> Self {
        kind_table()
            .get(name)
            .copied()
            .unwrap_or(EventKind::Unrecognized)
    }

    /// Canonical type name, `None` for `Unrecognized`
    pub fn type_name(self) -> Option<&'static str> {
        KNOWN_EVENTS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
    }
}

/// One decoded event
///
/// `startTime` and `duration` fields hold converted nanoseconds.
#[derive(Debug, Clone)]
pub struct Event {
    ty: Arc<TypeMetadata>,
    start_nanos: i64,
    duration_nanos: Option<i64>,
    values: Vec<Value>,
    offset: u64,
}

impl Event {
    pub fn type_id(&self) -> u64 {
        self.ty.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.ty.name
    }

    pub fn kind(&self) -> EventKind {
        self.ty.event_kind()
    }

    pub fn metadata(&self) -> &Arc<TypeMetadata> {
        &self.ty
    }

    /// Absolute start time in nanoseconds since the epoch
    pub fn start_nanos(&self) -> i64 {
        self.start_nanos
    }

    pub fn duration_nanos(&self) -> Option<i64> {
        self.duration_nanos
    }

    pub fn end_nanos(&self) -> i64 {
        self.start_nanos
            .saturating_add(self.duration_nanos.unwrap_or(0))
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

    /// Absolute byte offset of the record
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

#[derive(Debug)]
struct RecordHeader {
    start: usize,
    offset: u64,
    size: u64,
    type_id: u64,
}

impl RecordHeader {
    fn end(&self) -> usize {
        self.start + self.size as usize
    }
}

fn read_record_header(cursor: &mut ByteCursor<'_>) -> Result<RecordHeader, DecodeError> {
    let start = cursor.position();
    let offset = cursor.absolute_position();
    let size = cursor.read_varint()?;
    if size == 0 {
        return Err(DecodeError::format(offset, FormatError::InvalidRecordSize(0)));
    }
    let available = (cursor.len() - start) as u64;
    if size > available {
        return Err(DecodeError::Truncation {
            offset,
            needed: size,
            available,
        });
    }
    let type_id = cursor.read_varint()?;
    if (cursor.position() - start) as u64 > size {
        return Err(DecodeError::format(offset, FormatError::InvalidRecordSize(size)));
    }
    Ok(RecordHeader {
        start,
        offset,
        size,
        type_id,
    })
}

fn event_type<'m>(
    metadata: &'m Metadata,
    record: &RecordHeader,
) -> Result<&'m Arc<TypeMetadata>, DecodeError> {
    let ty = metadata.require(record.type_id, record.offset)?;
    if !ty.timing().has_start_time {
        return Err(DecodeError::format(
            record.offset,
            FormatError::MissingStartTime(ty.name.clone()),
        ));
    }
    Ok(ty)
}

/// Decode every record up to the end of the cursor and count them
///
/// The decoded events are dropped; a record that would fail on a later
/// `events()` pass fails here instead.
///
/// # Errors
/// * `DecodeError::DanglingReference` - non-nullable reference to a missing constant
/// * `FormatError::RecordOverrun` - fields read past the declared record size
/// * `FormatError::MissingStartTime` - record of a type without a leading `startTime`
pub(crate) fn scan_events(
    cursor: &mut ByteCursor<'_>,
    metadata: &Metadata,
    pools: &ConstantPools,
    time: &TimeConverter,
) -> Result<usize, DecodeError> {
    let mut count = 0;
    while !cursor.at_end() {
        decode_event(cursor, metadata, pools, time)?;
        count += 1;
    }
    Ok(count)
}

/// Decode the record at the cursor position
pub(crate) fn decode_event(
    cursor: &mut ByteCursor<'_>,
    metadata: &Metadata,
    pools: &ConstantPools,
    time: &TimeConverter,
) -> Result<Event, DecodeError> {
    let record = read_record_header(cursor)?;
    let ty = event_type(metadata, &record)?;
    let timing = ty.timing();

    let mut lookup = PoolLookup(pools);
    let mut values = Vec::with_capacity(ty.fields.len());
    for field in &ty.fields {
        let raw = read_field(cursor, metadata, field, 0)?;
        values.push(materialize(&raw, &mut lookup)?);
    }

    let consumed = (cursor.position() - record.start) as u64;
    if consumed > record.size {
        return Err(DecodeError::format(
            record.offset,
            FormatError::RecordOverrun {
                declared: record.size,
                overrun: consumed - record.size,
            },
        ));
    }
    if consumed < record.size {
        debug!(
            "Skipping {} trailing bytes of {} record at {}",
            record.size - consumed,
            ty.name,
            record.offset
        );
        cursor.seek(record.end())?;
    }

    // Timing fields are plain longs, checked at metadata decode
    let ticks = |v: &Value| v.as_i64().unwrap_or_default() as u64;
    let start_nanos = time.convert_timestamp(ticks(&values[0]));
    values[0] = Value::Int(start_nanos);

    let duration_nanos = if timing.has_duration {
        let nanos = time.convert_timespan(ticks(&values[1]));
        values[1] = Value::Int(nanos);
        Some(nanos)
    } else {
        None
    };

    Ok(Event {
        ty: Arc::clone(ty),
        start_nanos,
        duration_nanos,
        values,
        offset: record.offset,
    })
}
