mod common;

use common::*;
use jfr_inspect::commands::dump::run_dump;
use jfr_inspect::commands::flamegraph::run_flamegraph;
use jfr_inspect::commands::gc::run_gc;
use jfr_inspect::commands::stats::{run_stats, validate_args};
use jfr_inspect::commands::{DumpArgs, FlamegraphArgs, GcArgs, StatsArgs};
use jfr_inspect::output::read_report;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_recording(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn sampling_file(dir: &TempDir) -> PathBuf {
    let bytes =
        sampling_chunk(&[(5_000, 1, 1), (5_001, 2, 1), (5_002, 1, 2), (5_003, 1, 1)]).build();
    write_recording(dir, "sampling.jfr", &bytes)
}

fn output_of(result: anyhow::Result<()>, out: Vec<u8>) -> String {
    result.unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_stats_table() {
    let dir = TempDir::new().unwrap();
    let args = StatsArgs {
        file: sampling_file(&dir),
        ..StatsArgs::default()
    };

    let mut out = Vec::new();
    let text = output_of(run_stats(&args, &mut out), out);
    assert_eq!(
        text,
        "Constant pool name size(B) count distinct\n\
         jdk.types.Symbol 56 4\n\
         jdk.types.Method 9 3\n\
         java.lang.Class 4 2\n\
         java.lang.Thread 18 2\n\
         jdk.types.StackTrace 16 2\n\
         Total pools size: 103\n"
    );
}

#[test]
fn test_stats_shows_distinct_for_repeated_values() {
    let dir = TempDir::new().unwrap();
    let bytes = sampling_chunk(&[])
        .pool(THREAD, vec![(3, Fields::new().string("main"))])
        .build();
    let args = StatsArgs {
        file: write_recording(&dir, "dup.jfr", &bytes),
        ..StatsArgs::default()
    };

    let mut out = Vec::new();
    let text = output_of(run_stats(&args, &mut out), out);
    assert!(text.lines().any(|l| l == "java.lang.Thread 25 3 2"), "{}", text);
}

#[test]
fn test_stats_json_report() {
    let dir = TempDir::new().unwrap();
    let json = dir.path().join("stats.json");
    let args = StatsArgs {
        file: sampling_file(&dir),
        json: Some(json.clone()),
        keep_partial: false,
    };
    validate_args(&args).unwrap();

    let mut out = Vec::<u8>::new();
    run_stats(&args, &mut out).unwrap();

    let report = read_report(&json).unwrap();
    assert_eq!(report.status, "complete");
    assert_eq!(report.chunks, 1);
    assert_eq!(report.events, 4);
    assert_eq!(report.pools.len(), 5);
    assert_eq!(report.total_size_bytes, 103);
}

#[test]
fn test_stats_missing_file() {
    let dir = TempDir::new().unwrap();
    let args = StatsArgs {
        file: dir.path().join("absent.jfr"),
        ..StatsArgs::default()
    };
    let err = run_stats(&args, &mut Vec::<u8>::new()).unwrap_err();
    assert!(err.to_string().contains("Recording not found"));
}

#[test]
fn test_stats_keep_partial_on_truncated_file() {
    let dir = TempDir::new().unwrap();
    let mut bytes = sampling_chunk(&[(5_000, 1, 1)]).build();
    let second = sampling_chunk(&[(5_000, 1, 1)]).build();
    bytes.extend_from_slice(&second[..second.len() / 2]);
    let file = write_recording(&dir, "cut.jfr", &bytes);

    let strict = StatsArgs {
        file: file.clone(),
        ..StatsArgs::default()
    };
    assert!(run_stats(&strict, &mut Vec::<u8>::new()).is_err());

    let partial = StatsArgs {
        file,
        keep_partial: true,
        ..StatsArgs::default()
    };
    let mut out = Vec::new();
    let text = output_of(run_stats(&partial, &mut out), out);
    assert!(text.ends_with("Total pools size: 103\n"));
}

#[test]
fn test_dump_thread_pool() {
    let dir = TempDir::new().unwrap();
    let args = DumpArgs {
        pool: "java.lang.Thread".to_string(),
        file: sampling_file(&dir),
        keep_partial: false,
    };

    let mut out = Vec::new();
    let text = output_of(run_dump(&args, &mut out), out);
    assert_eq!(
        text,
        "java.lang.Thread { javaName = \"main\" }\n\
         java.lang.Thread { javaName = \"worker-1\" }\n"
    );
}

#[test]
fn test_dump_unknown_pool() {
    let dir = TempDir::new().unwrap();
    let args = DumpArgs {
        pool: "jdk.types.Package".to_string(),
        file: sampling_file(&dir),
        keep_partial: false,
    };
    let err = run_dump(&args, &mut Vec::<u8>::new()).unwrap_err();
    assert!(err.to_string().contains("No constant pool named 'jdk.types.Package'"));
}

#[test]
fn test_flamegraph_output() {
    let dir = TempDir::new().unwrap();
    let args = FlamegraphArgs {
        file: sampling_file(&dir),
        ..FlamegraphArgs::default()
    };

    let mut out = Vec::new();
    let text = output_of(run_flamegraph(&args, &mut out), out);
    assert_eq!(
        text,
        "java.lang.Thread.run;com.example.Worker.run;com.example.Worker.compute 3\n\
         java.lang.Thread.run;com.example.Worker.run 1\n"
    );
}

#[test]
fn test_flamegraph_without_matching_events() {
    let dir = TempDir::new().unwrap();
    let args = FlamegraphArgs {
        file: sampling_file(&dir),
        events: vec!["jdk.GarbageCollection".to_string()],
        keep_partial: false,
    };
    let err = run_flamegraph(&args, &mut Vec::<u8>::new()).unwrap_err();
    assert!(err.to_string().contains("No events found"));
}

#[test]
fn test_gc_timeline() {
    let dir = TempDir::new().unwrap();
    let builder = gc_configuration(ChunkBuilder::new().with_standard_types(), "G1New", "G1Old");
    let bytes = g1_collection(builder, 1, 5_000 + 123_000_000).build();
    let args = GcArgs {
        file: write_recording(&dir, "gc.jfr", &bytes),
        keep_partial: false,
    };

    let mut out = Vec::new();
    let text = output_of(run_gc(&args, &mut out), out);
    assert_eq!(
        text,
        "young: G1New, old: G1Old\n\
         1970-01-01T00:16:40.123: [GC(1) (G1 Evacuation Pause) (Normal), 0.002500 secs] \
         [Heap: 4096K(8192K)->1024K(8192K)]\n"
    );
}

#[test]
fn test_gc_rejects_other_collectors() {
    let dir = TempDir::new().unwrap();
    let bytes = gc_configuration(
        ChunkBuilder::new().with_standard_types(),
        "ParallelScavenge",
        "ParallelOld",
    )
    .build();
    let args = GcArgs {
        file: write_recording(&dir, "parallel.jfr", &bytes),
        keep_partial: false,
    };

    let mut out = Vec::new();
    let err = run_gc(&args, &mut out).unwrap_err();
    assert!(err.to_string().contains("only G1 is supported"));
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "young: ParallelScavenge, old: ParallelOld\n"
    );
}

#[test]
fn test_gc_requires_configuration() {
    let dir = TempDir::new().unwrap();
    let args = GcArgs {
        file: sampling_file(&dir),
        keep_partial: false,
    };
    let err = run_gc(&args, &mut Vec::<u8>::new()).unwrap_err();
    assert!(err.to_string().contains("No GC configuration events"));
}
