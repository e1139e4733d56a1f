//! End-to-end export sessions writing real destination files.

use flate2::read::DeflateDecoder;
use rand::Rng;
use scenecast::{
    descriptor_hash, Category, ChangeCache, ChannelRouter, Descriptor, EncodingMode, ExportConfig,
    ExportOutcome, ExportSession, MemorySink, TaskScheduler, Value, Vector, Writer, WriterOptions,
};
use std::io::Read;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn hex_payloads(text: &str) -> Vec<Vec<u8>> {
    text.match_indices("Hex(\"")
        .map(|(i, _)| {
            let start = i + 5;
            let end = start + text[start..].find('"').unwrap();
            hex::decode(&text[start..end]).unwrap()
        })
        .collect()
}

fn le_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn test_cache_scenario_through_session() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        encoding: "literal".into(),
        ..ExportConfig::in_dir(dir.path())
    };
    let session = ExportSession::open(config.clone()).unwrap();

    let a1 = Descriptor::new("A", "Node", Category::Nodes).with("x", 1);
    let a2 = Descriptor::new("A", "Node", Category::Nodes).with("x", 2);
    assert_eq!(session.export(&a1), ExportOutcome::Full);
    assert_eq!(session.export(&a1), ExportOutcome::Skipped);
    assert_eq!(session.export(&a2), ExportOutcome::Delta(1));
    assert_eq!(session.export(&a2), ExportOutcome::Skipped);

    let report = session.finish();
    assert_eq!((report.full, report.deltas, report.skipped), (1, 1, 2));

    let nodes = std::fs::read_to_string(config.destination_path(Category::Nodes)).unwrap();
    assert_eq!(nodes, "Node A {\n\tx=1;\n}\n\nNode A {\n\tx=2;\n}\n\n");
}

#[test]
fn test_main_file_includes_every_destination() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        encoding: "literal".into(),
        file_prefix: "shot".into(),
        ..ExportConfig::in_dir(dir.path())
    };
    let session = ExportSession::open(config.clone()).unwrap();
    session.export(&Descriptor::new("opts", "SettingsOutput", Category::Settings).with("w", 640));
    drop(session);

    let main = std::fs::read_to_string(dir.path().join("shot.scn")).unwrap();
    assert!(main.starts_with("SettingsOutput opts {\n\tw=640;\n}\n\n"));
    for category in Category::ALL {
        if category == Category::Settings {
            continue;
        }
        let line = format!("#include \"shot_{}.scn\"\n", category.as_str());
        assert_eq!(main.matches(&line).count(), 1, "missing {}", line);
        assert!(config.destination_path(category).exists());
    }
}

#[test]
fn test_single_file_mode() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        encoding: "literal".into(),
        separate_files: false,
        ..ExportConfig::in_dir(dir.path())
    };
    let session = ExportSession::open(config.clone()).unwrap();
    session.export(&Descriptor::new("m", "GeomStaticMesh", Category::Geometry).with("a", 1));
    session.export(&Descriptor::new("l", "SunLight", Category::Lights).with("b", 2));
    session.finish();

    let main = std::fs::read_to_string(config.main_path()).unwrap();
    assert_eq!(main, "GeomStaticMesh m {\n\ta=1;\n}\n\nSunLight l {\n\tb=2;\n}\n\n");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_deflate_round_trip_with_workers() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        encoding: "deflate".into(),
        async_threshold: 64,
        worker_threads: 4,
        ..ExportConfig::in_dir(dir.path())
    };
    let session = ExportSession::open(config.clone()).unwrap();

    let mut rng = rand::thread_rng();
    let arrays: Vec<Vec<i32>> = (0..20)
        .map(|_| (0..rng.gen_range(64..4000)).map(|_| rng.gen()).collect())
        .collect();
    for (i, faces) in arrays.iter().enumerate() {
        let d = Descriptor::new(format!("mesh{}", i), "GeomStaticMesh", Category::Geometry)
            .with("faces", faces.clone());
        assert_eq!(session.export(&d), ExportOutcome::Full);
    }
    let report = session.finish();
    let geometry = report
        .destinations
        .iter()
        .find(|d| d.category == Category::Geometry)
        .unwrap();
    assert_eq!(geometry.stats.background_encodes, 20);

    let text = std::fs::read_to_string(config.destination_path(Category::Geometry)).unwrap();
    let payloads = hex_payloads(&text);
    assert_eq!(payloads.len(), arrays.len());
    for (compressed, faces) in payloads.iter().zip(&arrays) {
        let mut raw = Vec::new();
        DeflateDecoder::new(&compressed[..]).read_to_end(&mut raw).unwrap();
        assert_eq!(raw, le_bytes(faces));
    }
}

#[test]
fn test_submission_order_survives_many_workers() {
    let scheduler = Arc::new(TaskScheduler::new(8, 10_000).unwrap());
    let sink = MemorySink::new();
    let options = WriterOptions {
        mode: EncodingMode::Hex,
        async_threshold: 1,
        ..WriterOptions::default()
    };
    let mut writer = Writer::from_sink(Box::new(sink.clone()), options, Some(scheduler.clone()));

    let mut rng = rand::thread_rng();
    let mut expected = Vec::new();
    for i in 0..200 {
        // Mixed sizes so small encodes finish before large earlier ones
        let len = if rng.gen_bool(0.3) { 50_000 } else { rng.gen_range(1..50) };
        let values: Vec<i32> = (0..len).map(|k| k ^ i).collect();
        writer.write(
            &Descriptor::new(format!("e{:03}", i), "GeomStaticMesh", Category::Geometry)
                .with("v", values.clone()),
        );
        expected.push((format!("e{:03}", i), values));
    }
    writer.block_flush_all();
    drop(writer);
    scheduler.stop();

    let text = sink.contents();
    let names: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("GeomStaticMesh "))
        .map(|l| l.trim_end_matches(" {"))
        .collect();
    let expected_names: Vec<&str> = expected.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, expected_names);

    for (payload, (_, values)) in hex_payloads(&text).iter().zip(&expected) {
        assert_eq!(payload, &le_bytes(values));
    }
}

#[test]
fn test_concurrent_producers() {
    let scheduler = Arc::new(TaskScheduler::new(2, 1024).unwrap());
    let sink = MemorySink::new();
    let options = WriterOptions {
        mode: EncodingMode::Literal,
        ..WriterOptions::default()
    };
    let mut router = ChannelRouter::new();
    router.register(
        Category::Settings,
        Writer::from_sink(Box::new(sink.clone()), options, Some(scheduler.clone())),
    );
    let session = Arc::new(ExportSession::from_parts(
        ExportConfig::default(),
        ChangeCache::new(),
        scheduler,
        router,
    ));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..100 {
                    let d = Descriptor::new(format!("t{}_{}", t, i), "Node", Category::Nodes)
                        .with("p", Vector::new(i as f32, 0.0, 0.0));
                    assert_eq!(session.export(&d), ExportOutcome::Full);
                }
                // Every thread re-exports one shared name; only the first wins
                let shared = Descriptor::new("shared", "Node", Category::Nodes).with("v", 1);
                session.export(&shared)
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outcomes.iter().filter(|o| **o == ExportOutcome::Full).count(), 1);

    let session = Arc::try_unwrap(session).ok().unwrap();
    let report = session.finish();
    assert_eq!(report.full, 801);
    assert_eq!(report.skipped, 7);

    let text = sink.contents();
    assert_eq!(text.matches("Node ").count(), 801);
    // Blocks never interleave
    assert_eq!(text.matches(" {\n").count(), text.matches("}\n\n").count());
    for block in text.split("}\n\n").filter(|b| !b.is_empty()) {
        assert_eq!(block.matches('{').count(), 1);
    }
}

#[test]
fn test_last_block_matches_cache_under_contention() {
    let sink = MemorySink::new();
    let options = WriterOptions {
        mode: EncodingMode::Literal,
        ..WriterOptions::default()
    };
    let mut router = ChannelRouter::new();
    router.register(
        Category::Settings,
        Writer::from_sink(Box::new(sink.clone()), options, None),
    );
    let session = Arc::new(ExportSession::from_parts(
        ExportConfig::default(),
        ChangeCache::new(),
        Arc::new(TaskScheduler::inline()),
        router,
    ));

    for round in 0..200 {
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [1, 2]
            .into_iter()
            .map(|x| {
                let session = Arc::clone(&session);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    session.export(&Descriptor::new("A", "Node", Category::Nodes).with("x", x));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = sink.contents();
        let last = text.lines().filter(|l| l.starts_with("\tx=")).last().unwrap();
        let written: i32 = last.trim_start_matches("\tx=").trim_end_matches(';').parse().unwrap();
        let cached = Descriptor::new("A", "Node", Category::Nodes).with("x", written);
        assert_eq!(
            session.cache().stored_hash("A"),
            Some(descriptor_hash(&cached)),
            "round {}",
            round
        );
    }
}

#[test]
fn test_unopenable_destination_does_not_fail_session() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        encoding: "literal".into(),
        ..ExportConfig::in_dir(dir.path())
    };
    // A directory squatting on the geometry file name makes it unopenable
    std::fs::create_dir(config.destination_path(Category::Geometry)).unwrap();
    let session = ExportSession::open(config).unwrap();
    let d = Descriptor::new("m", "GeomStaticMesh", Category::Geometry).with("a", Value::Int(1));
    assert_eq!(session.export(&d), ExportOutcome::Full);
    let report = session.finish();
    let geometry = report
        .destinations
        .iter()
        .find(|d| d.category == Category::Geometry)
        .unwrap();
    assert!(!geometry.good);
}

#[test]
fn test_invalid_encoding_rejected() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        encoding: "base64".into(),
        ..ExportConfig::in_dir(dir.path())
    };
    assert!(ExportSession::open(config).is_err());
}

mod round_trip {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn hex_output_reconstructs_array_bytes(
            values in proptest::collection::vec(any::<i32>(), 1..512)
        ) {
            let sink = MemorySink::new();
            let options = WriterOptions { mode: EncodingMode::Hex, ..WriterOptions::default() };
            let mut writer = Writer::from_sink(Box::new(sink.clone()), options, None);
            let mesh = Descriptor::new("m", "GeomStaticMesh", Category::Geometry);
            writer.write(&mesh.with("v", values.clone()));
            let payloads = hex_payloads(&sink.contents());
            prop_assert_eq!(payloads.len(), 1);
            prop_assert_eq!(&payloads[0], &le_bytes(&values));
        }

        #[test]
        fn deflate_output_inflates_to_array_bytes(
            values in proptest::collection::vec(any::<f32>(), 1..512)
        ) {
            let sink = MemorySink::new();
            let options = WriterOptions {
                mode: EncodingMode::Deflate,
                ..WriterOptions::default()
            };
            let mut writer = Writer::from_sink(Box::new(sink.clone()), options, None);
            let mesh = Descriptor::new("m", "GeomStaticMesh", Category::Geometry);
            writer.write(&mesh.with("v", values.clone()));
            let payloads = hex_payloads(&sink.contents());
            let mut raw = Vec::new();
            DeflateDecoder::new(&payloads[0][..]).read_to_end(&mut raw).unwrap();
            let expected: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            prop_assert_eq!(raw, expected);
        }
    }
}
