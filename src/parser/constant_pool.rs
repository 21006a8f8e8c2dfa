//! Constant pools: interned values referenced from events by local id.
//!
//! Decoding is two-phase. The section is first read structurally, leaving
//! references as ids. A resolution pass then materializes every entry,
//! memoized per (type id, local id) so a shared sub-structure is decoded
//! once and handed out as the same allocation everywhere.

use super::cursor::ByteCursor;
use super::metadata::{Metadata, TypeMetadata};
use super::raw::{materialize, read_type_value, RawValue, ResolveRef};
use super::value::{StructuralClasses, Value};
use crate::utils::error::{DecodeError, FormatError};
use log::{debug, trace};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Entry counts of one pool, feeding statistics reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolCounts {
    pub count: usize,
    pub distinct: usize,
    /// Exact bytes the entries occupy in the constant-pool section
    pub encoded_bytes: u64,
}

impl PoolCounts {
    pub fn add(&mut self, other: PoolCounts) {
        self.count += other.count;
        self.distinct += other.distinct;
        self.encoded_bytes += other.encoded_bytes;
    }
}

/// Resolved pool of one type within a chunk
#[derive(Debug)]
pub struct ConstantPool {
    ty: Arc<TypeMetadata>,
    entries: BTreeMap<u64, Value>,
    encoded_bytes: u64,
}

impl ConstantPool {
    pub fn name(&self) -> &str {
        &self.ty.name
    }

    pub fn type_id(&self) -> u64 {
        self.ty.type_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Value> {
        self.entries.get(&id)
    }

    /// Entries in local id order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Value)> {
        self.entries.iter().map(|(id, v)| (*id, v))
    }

    /// Number of structurally distinct values
    pub fn distinct_count(&self) -> usize {
        let mut classes = StructuralClasses::default();
        self.entries
            .values()
            .map(|value| classes.class_of(value))
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn encoded_bytes(&self) -> u64 {
        self.encoded_bytes
    }

    pub fn counts(&self) -> PoolCounts {
        PoolCounts {
            count: self.len(),
            distinct: self.distinct_count(),
            encoded_bytes: self.encoded_bytes,
        }
    }
}

/// All resolved pools of a chunk, keyed by type id
///
/// Immutable once built; safe to share between readers.
#[derive(Debug, Default)]
pub struct ConstantPools {
    pools: BTreeMap<u64, ConstantPool>,
}

impl ConstantPools {
    /// Decode and resolve the constant-pool section at the cursor position
    ///
    /// **Public** - third step of every chunk decode
    ///
    /// Leaves the cursor at the first byte after the section.
    ///
    /// # Errors
    /// * `FormatError::DuplicateConstant` - local id repeated within a pool
    /// * `FormatError::CyclicReference` - an entry transitively requires itself
    /// * `DecodeError::DanglingReference` - non-nullable reference to a missing id
    pub fn read(cursor: &mut ByteCursor<'_>, metadata: &Metadata) -> Result<Self, DecodeError> {
        let raw = read_raw_pools(cursor, metadata)?;
        let pools = resolve_pools(&raw)?;
        debug!(
            "Resolved {} constant pools ({} entries)",
            pools.pools.len(),
            pools.pools.values().map(ConstantPool::len).sum::<usize>()
        );
        Ok(pools)
    }

    pub fn get(&self, type_id: u64) -> Option<&ConstantPool> {
        self.pools.get(&type_id)
    }

    pub fn by_name(&self, name: &str) -> Option<&ConstantPool> {
        self.pools.values().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstantPool> {
        self.pools.values()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Resolved value of a pooled constant
    ///
    /// Repeated lookups return the same shared value.
    pub fn resolve(&self, type_id: u64, id: u64) -> Result<&Value, DecodeError> {
        self.get(type_id)
            .and_then(|pool| pool.get(id))
            .ok_or_else(|| DecodeError::DanglingReference {
                offset: 0,
                pool: self.pool_name(type_id),
                id,
            })
    }

    /// Counts per pool name
    pub fn entry_counts(&self) -> BTreeMap<String, PoolCounts> {
        let mut counts: BTreeMap<String, PoolCounts> = BTreeMap::new();
        for pool in self.pools.values() {
            counts
                .entry(pool.name().to_string())
                .or_default()
                .add(pool.counts());
        }
        counts
    }

    fn pool_name(&self, type_id: u64) -> String {
        self.get(type_id)
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| format!("type {}", type_id))
    }
}

/// Lookup into fully resolved pools, used while decoding events
pub(crate) struct PoolLookup<'a>(pub(crate) &'a ConstantPools);

impl ResolveRef for PoolLookup<'_> {
    fn resolve_ref(
        &mut self,
        type_id: u64,
        id: u64,
        nullable: bool,
        offset: u64,
    ) -> Result<Value, DecodeError> {
        match self.0.get(type_id).and_then(|pool| pool.get(id)) {
            Some(value) => Ok(value.clone()),
            None if nullable => Ok(Value::Absent),
            None => Err(DecodeError::DanglingReference {
                offset,
                pool: self.0.pool_name(type_id),
                id,
            }),
        }
    }
}

struct RawEntry {
    offset: u64,
    value: RawValue,
}

pub(crate) struct RawPool {
    ty: Arc<TypeMetadata>,
    entries: BTreeMap<u64, RawEntry>,
    encoded_bytes: u64,
}

/// Structural pass: read every pool block without resolving references
pub(crate) fn read_raw_pools(
    cursor: &mut ByteCursor<'_>,
    metadata: &Metadata,
) -> Result<BTreeMap<u64, RawPool>, DecodeError> {
    let mut pools: BTreeMap<u64, RawPool> = BTreeMap::new();
    let pool_count = cursor.read_length()?;

    for _ in 0..pool_count {
        let block_offset = cursor.absolute_position();
        let type_id = cursor.read_varint()?;
        let ty = Arc::clone(metadata.require(type_id, block_offset)?);
        let entry_count = cursor.read_length()?;
        let body_start = cursor.position();

        let pool = pools.entry(type_id).or_insert_with(|| RawPool {
            ty: Arc::clone(&ty),
            entries: BTreeMap::new(),
            encoded_bytes: 0,
        });

        for _ in 0..entry_count {
            let offset = cursor.absolute_position();
            let id = cursor.read_varint()?;
            let value = read_type_value(cursor, metadata, &ty, 0)?;
            if pool.entries.insert(id, RawEntry { offset, value }).is_some() {
                return Err(DecodeError::format(
                    offset,
                    FormatError::DuplicateConstant {
                        pool: ty.name.clone(),
                        id,
                    },
                ));
            }
        }

        pool.encoded_bytes += (cursor.position() - body_start) as u64;
        trace!("Read {} entries for pool {}", entry_count, ty.name);
    }

    Ok(pools)
}

enum Slot {
    InProgress,
    Done(Value),
}

/// A pool reference found inside a structural value
#[derive(Clone, Copy)]
struct RefSite {
    type_id: u64,
    id: u64,
    nullable: bool,
    offset: u64,
}

/// Entry waiting for the references it contains
struct Pending<'a> {
    key: (u64, u64),
    value: &'a RawValue,
    refs: Vec<RefSite>,
    next: usize,
}

enum Step<'a> {
    Ready(Value),
    Pending(Pending<'a>),
}

/// References of one entry; bounded by the inline nesting limit
fn collect_refs(raw: &RawValue, out: &mut Vec<RefSite>) {
    match raw {
        RawValue::Ref {
            type_id,
            id,
            nullable,
            offset,
        } => out.push(RefSite {
            type_id: *type_id,
            id: *id,
            nullable: *nullable,
            offset: *offset,
        }),
        RawValue::Array(items) => items.iter().for_each(|item| collect_refs(item, out)),
        RawValue::Object { values, .. } => values.iter().for_each(|v| collect_refs(v, out)),
        _ => {}
    }
}

/// Memoizing resolver over the structural pools
///
/// Reference chains are followed with an explicit stack, so their length
/// is limited by memory only.
struct Resolver<'a> {
    raw: &'a BTreeMap<u64, RawPool>,
    memo: HashMap<(u64, u64), Slot>,
}

impl<'a> Resolver<'a> {
    fn resolve(&mut self, type_id: u64, id: u64, nullable: bool, from: u64) -> Result<Value, DecodeError> {
        let mut stack = match self.enter(type_id, id, nullable, from)? {
            Step::Ready(value) => return Ok(value),
            Step::Pending(pending) => vec![pending],
        };

        let mut resolved = Value::Absent;
        while let Some(top) = stack.last_mut() {
            if let Some(site) = top.refs.get(top.next).copied() {
                top.next += 1;
                if let Step::Pending(child) =
                    self.enter(site.type_id, site.id, site.nullable, site.offset)?
                {
                    stack.push(child);
                }
                continue;
            }

            // Every reference of the entry is memoized by now
            if let Some(done) = stack.pop() {
                let value = materialize(done.value, self)?;
                self.memo.insert(done.key, Slot::Done(value.clone()));
                resolved = value;
            }
        }
        Ok(resolved)
    }

    /// Memoized value, nullable absence, or a new entry to work on
    fn enter(&mut self, type_id: u64, id: u64, nullable: bool, from: u64) -> Result<Step<'a>, DecodeError> {
        match self.memo.get(&(type_id, id)) {
            Some(Slot::Done(value)) => return Ok(Step::Ready(value.clone())),
            Some(Slot::InProgress) => {
                return Err(DecodeError::format(
                    from,
                    FormatError::CyclicReference {
                        pool: self.pool_name(type_id),
                        id,
                    },
                ));
            }
            None => {}
        }

        let raw = self.raw;
        let Some(entry) = raw.get(&type_id).and_then(|p| p.entries.get(&id)) else {
            if nullable {
                return Ok(Step::Ready(Value::Absent));
            }
            return Err(DecodeError::DanglingReference {
                offset: from,
                pool: self.pool_name(type_id),
                id,
            });
        };

        self.memo.insert((type_id, id), Slot::InProgress);
        let mut refs = Vec::new();
        collect_refs(&entry.value, &mut refs);
        Ok(Step::Pending(Pending {
            key: (type_id, id),
            value: &entry.value,
            refs,
            next: 0,
        }))
    }

    fn pool_name(&self, type_id: u64) -> String {
        self.raw
            .get(&type_id)
            .map(|p| p.ty.name.clone())
            .unwrap_or_else(|| format!("type {}", type_id))
    }
}

impl ResolveRef for Resolver<'_> {
    fn resolve_ref(
        &mut self,
        type_id: u64,
        id: u64,
        nullable: bool,
        offset: u64,
    ) -> Result<Value, DecodeError> {
        self.resolve(type_id, id, nullable, offset)
    }
}

/// Resolution pass: materialize every entry of every pool
pub(crate) fn resolve_pools(raw: &BTreeMap<u64, RawPool>) -> Result<ConstantPools, DecodeError> {
    let mut resolver = Resolver {
        raw,
        memo: HashMap::new(),
    };

    let mut pools = BTreeMap::new();
    for (type_id, raw_pool) in raw {
        let mut entries = BTreeMap::new();
        for (id, entry) in &raw_pool.entries {
            let value = resolver.resolve(*type_id, *id, false, entry.offset)?;
            entries.insert(*id, value);
        }
        pools.insert(
            *type_id,
            ConstantPool {
                ty: Arc::clone(&raw_pool.ty),
                entries,
                encoded_bytes: raw_pool.encoded_bytes,
            },
        );
    }

    Ok(ConstantPools { pools })
}
