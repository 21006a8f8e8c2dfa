//! Synthetic chunk encoder for integration tests.
//!
//! Produces chunks laid out as header, metadata, constant pools, events.
#![allow(dead_code)]

pub const HEADER_SIZE: usize = 68;

pub const ARRAY: u8 = 0x1;
pub const POOL: u8 = 0x2;
pub const NULLABLE: u8 = 0x4;

// Catalogue ids used by `with_standard_types`
pub const LONG: u64 = 1;
pub const STRING: u64 = 2;
pub const INT: u64 = 3;
pub const BOOLEAN: u64 = 4;
pub const SYMBOL: u64 = 10;
pub const CLASS: u64 = 11;
pub const METHOD: u64 = 12;
pub const FRAME: u64 = 13;
pub const STACK_TRACE: u64 = 14;
pub const THREAD: u64 = 20;
pub const VIRTUAL_SPACE: u64 = 21;
pub const EXECUTION_SAMPLE: u64 = 100;
pub const GARBAGE_COLLECTION: u64 = 101;
pub const G1_GARBAGE_COLLECTION: u64 = 102;
pub const HEAP_SUMMARY: u64 = 103;
pub const G1_HEAP_SUMMARY: u64 = 104;
pub const GC_CONFIGURATION: u64 = 105;

pub fn put_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let b = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(b);
            return;
        }
        out.push(b | 0x80);
    }
}

fn varint_len(v: u64) -> usize {
    let mut out = Vec::new();
    put_varint(&mut out, v);
    out.len()
}

fn put_utf8(out: &mut Vec<u8>, s: &str) {
    put_varint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

/// Encoded field values, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Fields(pub Vec<u8>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn varint(mut self, v: u64) -> Self {
        put_varint(&mut self.0, v);
        self
    }

    pub fn long(self, v: i64) -> Self {
        self.varint(v as u64)
    }

    pub fn int(self, v: i32) -> Self {
        self.varint(v as i64 as u64)
    }

    pub fn boolean(mut self, v: bool) -> Self {
        self.0.push(v as u8);
        self
    }

    /// Constant pool reference by local id
    pub fn reference(self, id: u64) -> Self {
        self.varint(id)
    }

    /// Inline UTF-8 string
    pub fn string(mut self, s: &str) -> Self {
        self.0.push(3);
        put_utf8(&mut self.0, s);
        self
    }

    pub fn null_string(mut self) -> Self {
        self.0.push(0);
        self
    }

    pub fn pooled_string(mut self, id: u64) -> Self {
        self.0.push(2);
        put_varint(&mut self.0, id);
        self
    }

    pub fn latin1(mut self, bytes: &[u8]) -> Self {
        self.0.push(5);
        put_varint(&mut self.0, bytes.len() as u64);
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn array_len(self, n: usize) -> Self {
        self.varint(n as u64)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }
}

struct TypeDef {
    id: u64,
    name: String,
    fields: Vec<(String, u64, u8)>,
}

/// Builder for one chunk
pub struct ChunkBuilder {
    pub major: u16,
    pub start_nanos: u64,
    pub duration_nanos: u64,
    pub start_ticks: u64,
    pub ticks_per_second: u64,
    pub complete: bool,
    types: Vec<TypeDef>,
    pools: Vec<(u64, Vec<(u64, Vec<u8>)>)>,
    events: Vec<u8>,
}

impl Default for ChunkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self {
            major: 2,
            start_nanos: 1_000_000_000_000,
            duration_nanos: 5_000_000,
            start_ticks: 5_000,
            ticks_per_second: 1_000_000_000,
            complete: true,
            types: Vec::new(),
            pools: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn add_type(mut self, id: u64, name: &str, fields: &[(&str, u64, u8)]) -> Self {
        self.types.push(TypeDef {
            id,
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(n, t, f)| (n.to_string(), *t, *f))
                .collect(),
        });
        self
    }

    /// Primitives, symbols, classes, methods, stack traces, threads and
    /// the GC and sampling events
    pub fn with_standard_types(self) -> Self {
        self.add_type(LONG, "long", &[])
            .add_type(STRING, "java.lang.String", &[])
            .add_type(INT, "int", &[])
            .add_type(BOOLEAN, "boolean", &[])
            .add_type(SYMBOL, "jdk.types.Symbol", &[("string", STRING, 0)])
            .add_type(CLASS, "java.lang.Class", &[("name", SYMBOL, POOL | NULLABLE)])
            .add_type(
                METHOD,
                "jdk.types.Method",
                &[("type", CLASS, POOL | NULLABLE), ("name", SYMBOL, POOL | NULLABLE)],
            )
            .add_type(
                FRAME,
                "jdk.types.StackFrame",
                &[("method", METHOD, POOL | NULLABLE), ("lineNumber", INT, 0)],
            )
            .add_type(
                STACK_TRACE,
                "jdk.types.StackTrace",
                &[("truncated", BOOLEAN, 0), ("frames", FRAME, ARRAY)],
            )
            .add_type(THREAD, "java.lang.Thread", &[("javaName", STRING, 0)])
            .add_type(
                VIRTUAL_SPACE,
                "jdk.types.VirtualSpace",
                &[("committedSize", LONG, 0), ("reservedSize", LONG, 0)],
            )
            .add_type(
                EXECUTION_SAMPLE,
                "jdk.ExecutionSample",
                &[
                    ("startTime", LONG, 0),
                    ("sampledThread", THREAD, POOL | NULLABLE),
                    ("stackTrace", STACK_TRACE, POOL | NULLABLE),
                ],
            )
            .add_type(
                GARBAGE_COLLECTION,
                "jdk.GarbageCollection",
                &[
                    ("startTime", LONG, 0),
                    ("duration", LONG, 0),
                    ("gcId", INT, 0),
                    ("name", STRING, 0),
                    ("cause", STRING, 0),
                ],
            )
            .add_type(
                G1_GARBAGE_COLLECTION,
                "jdk.G1GarbageCollection",
                &[("startTime", LONG, 0), ("gcId", INT, 0), ("type", STRING, 0)],
            )
            .add_type(
                HEAP_SUMMARY,
                "jdk.GCHeapSummary",
                &[
                    ("startTime", LONG, 0),
                    ("gcId", INT, 0),
                    ("when", STRING, 0),
                    ("heapSpace", VIRTUAL_SPACE, 0),
                    ("heapUsed", LONG, 0),
                ],
            )
            .add_type(
                G1_HEAP_SUMMARY,
                "jdk.G1HeapSummary",
                &[
                    ("startTime", LONG, 0),
                    ("gcId", INT, 0),
                    ("when", STRING, 0),
                    ("edenUsedSize", LONG, 0),
                    ("survivorUsedSize", LONG, 0),
                ],
            )
            .add_type(
                GC_CONFIGURATION,
                "jdk.GCConfiguration",
                &[
                    ("startTime", LONG, 0),
                    ("youngCollector", STRING, 0),
                    ("oldCollector", STRING, 0),
                ],
            )
    }

    /// Add a pool block; repeated type ids produce repeated blocks
    pub fn pool(mut self, type_id: u64, entries: Vec<(u64, Fields)>) -> Self {
        self.pools
            .push((type_id, entries.into_iter().map(|(id, f)| (id, f.0)).collect()));
        self
    }

    /// Add an event record whose size covers exactly its fields
    pub fn event(self, type_id: u64, fields: Fields) -> Self {
        self.padded_event(type_id, fields, 0)
    }

    /// Add an event record declaring `padding` extra trailing bytes
    pub fn padded_event(mut self, type_id: u64, fields: Fields, padding: usize) -> Self {
        let mut body = Vec::new();
        put_varint(&mut body, type_id);
        body.extend_from_slice(&fields.0);
        body.extend(std::iter::repeat(0u8).take(padding));
        let size = (1..=10)
            .map(|n| body.len() + n)
            .find(|size| varint_len(*size as u64) + body.len() == *size)
            .unwrap();
        put_varint(&mut self.events, size as u64);
        self.events.extend_from_slice(&body);
        self
    }

    /// Add an event record with an explicit declared size
    pub fn sized_event(mut self, declared_size: u64, type_id: u64, fields: Fields) -> Self {
        put_varint(&mut self.events, declared_size);
        put_varint(&mut self.events, type_id);
        self.events.extend_from_slice(&fields.0);
        self
    }

    pub fn metadata_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_varint(&mut out, self.types.len() as u64);
        for ty in &self.types {
            put_varint(&mut out, ty.id);
            put_utf8(&mut out, &ty.name);
            put_varint(&mut out, ty.fields.len() as u64);
            for (name, type_id, flags) in &ty.fields {
                put_utf8(&mut out, name);
                put_varint(&mut out, *type_id);
                out.push(*flags);
            }
        }
        out
    }

    pub fn pool_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_varint(&mut out, self.pools.len() as u64);
        for (type_id, entries) in &self.pools {
            put_varint(&mut out, *type_id);
            put_varint(&mut out, entries.len() as u64);
            for (id, value) in entries {
                put_varint(&mut out, *id);
                out.extend_from_slice(value);
            }
        }
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let metadata = self.metadata_bytes();
        let pools = self.pool_bytes();
        let metadata_offset = HEADER_SIZE as u64;
        let pool_offset = metadata_offset + metadata.len() as u64;
        let chunk_size = pool_offset + pools.len() as u64 + self.events.len() as u64;

        let mut out = header_bytes(self, chunk_size, pool_offset, metadata_offset);
        out.extend_from_slice(&metadata);
        out.extend_from_slice(&pools);
        out.extend_from_slice(&self.events);
        out
    }
}

fn header_bytes(b: &ChunkBuilder, chunk_size: u64, pool_offset: u64, metadata_offset: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE);
    out.extend_from_slice(b"FLR\0");
    out.extend_from_slice(&b.major.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    for v in [
        chunk_size,
        pool_offset,
        metadata_offset,
        b.start_nanos,
        b.duration_nanos,
        b.start_ticks,
        b.ticks_per_second,
    ] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out.extend_from_slice(&(b.complete as u32).to_be_bytes());
    out
}

/// Overwrite the 8-byte big-endian header field at `offset`
pub fn patch_u64(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
}

/// Offset of the chunk size field within a header
pub const CHUNK_SIZE_FIELD: usize = 8;

/// Standard pools: two threads, symbols, classes, methods, frames inline in
/// two stack traces that share the `Worker.run` method
pub fn with_sampling_pools(b: ChunkBuilder) -> ChunkBuilder {
    b.pool(
        SYMBOL,
        vec![
            (1, Fields::new().string("com/example/Worker")),
            (2, Fields::new().string("run")),
            (3, Fields::new().string("compute")),
            (4, Fields::new().string("java/lang/Thread")),
        ],
    )
    .pool(
        CLASS,
        vec![(1, Fields::new().reference(1)), (2, Fields::new().reference(4))],
    )
    .pool(
        METHOD,
        vec![
            (1, Fields::new().reference(1).reference(2)),
            (2, Fields::new().reference(1).reference(3)),
            (3, Fields::new().reference(2).reference(2)),
        ],
    )
    .pool(
        STACK_TRACE,
        vec![
            // leaf-first: Worker.compute <- Worker.run <- Thread.run
            (
                1,
                Fields::new()
                    .boolean(false)
                    .array_len(3)
                    .reference(2)
                    .int(10)
                    .reference(1)
                    .int(20)
                    .reference(3)
                    .int(30),
            ),
            // Worker.run <- Thread.run
            (
                2,
                Fields::new()
                    .boolean(false)
                    .array_len(2)
                    .reference(1)
                    .int(20)
                    .reference(3)
                    .int(30),
            ),
        ],
    )
    .pool(
        THREAD,
        vec![
            (1, Fields::new().string("main")),
            (2, Fields::new().string("worker-1")),
        ],
    )
}

/// Execution sample at `ticks` on `thread` with `stack`
pub fn sample(ticks: u64, thread: u64, stack: u64) -> Fields {
    Fields::new().varint(ticks).reference(thread).reference(stack)
}

/// A complete sampling chunk with `samples` events
pub fn sampling_chunk(samples: &[(u64, u64, u64)]) -> ChunkBuilder {
    let mut b = with_sampling_pools(ChunkBuilder::new().with_standard_types());
    for (ticks, thread, stack) in samples {
        b = b.event(EXECUTION_SAMPLE, sample(*ticks, *thread, *stack));
    }
    b
}

/// Events describing one G1 young collection
pub fn g1_collection(b: ChunkBuilder, gc_id: i32, ticks: u64) -> ChunkBuilder {
    b.event(
        HEAP_SUMMARY,
        Fields::new()
            .varint(ticks)
            .int(gc_id)
            .string("Before GC")
            .long(8 * 1024 * 1024)
            .long(16 * 1024 * 1024)
            .long(4 * 1024 * 1024),
    )
    .event(
        G1_HEAP_SUMMARY,
        Fields::new()
            .varint(ticks)
            .int(gc_id)
            .string("Before GC")
            .long(3 * 1024 * 1024)
            .long(1024 * 1024),
    )
    .event(
        GARBAGE_COLLECTION,
        Fields::new()
            .varint(ticks)
            .varint(2_500_000)
            .int(gc_id)
            .string("G1New")
            .string("G1 Evacuation Pause"),
    )
    .event(
        G1_GARBAGE_COLLECTION,
        Fields::new().varint(ticks).int(gc_id).string("Normal"),
    )
    .event(
        HEAP_SUMMARY,
        Fields::new()
            .varint(ticks + 2_500_000)
            .int(gc_id)
            .string("After GC")
            .long(8 * 1024 * 1024)
            .long(16 * 1024 * 1024)
            .long(1024 * 1024),
    )
}

/// `jdk.GCConfiguration` event
pub fn gc_configuration(b: ChunkBuilder, young: &str, old: &str) -> ChunkBuilder {
    b.event(
        GC_CONFIGURATION,
        Fields::new().varint(5_000).string(young).string(old),
    )
}
