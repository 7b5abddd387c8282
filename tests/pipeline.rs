//! Integration tests for sdf-mesh-converter.
//!
//! Every test builds its own scene tree in a temp directory. Most use a
//! counting fake transcoder so the tests exercise resolution, caching and
//! rewriting without depending on mesh parsing; the `native_*` tests run the
//! real transcoder on small hand-written meshes.

use sdf_mesh_converter::{
    convert_batch, convert_directory, convert_document, convert_document_with,
    ConversionCache, ConversionProgressCallback, ConverterConfig, ConverterConfigBuilder,
    MeshConvError, MeshTranscoder, OutputFormat, ReferenceError, ReferenceOutcome, RewriteMode,
    Scheme, TranscodeError, UriResolver,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Records every call and writes a small marker file.
#[derive(Default)]
struct CountingTranscoder {
    calls: Mutex<Vec<(PathBuf, [f64; 3])>>,
}

impl CountingTranscoder {
    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl MeshTranscoder for CountingTranscoder {
    fn transcode(&self, source: &Path, scale: [f64; 3], output: &Path) -> Result<(), TranscodeError> {
        self.calls.lock().unwrap().push((source.to_path_buf(), scale));
        fs::write(output, format!("converted {}", source.display())).map_err(|e| {
            TranscodeError::Io {
                path: output.to_path_buf(),
                source: e,
            }
        })
    }
}

/// Route library logs through the test harness. Run with `RUST_LOG=debug`
/// and `--nocapture` to see them.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

/// Config with no default model roots, so the host's Gazebo install never
/// leaks into the tests.
fn builder(root: &Path, transcoder: &Arc<CountingTranscoder>) -> ConverterConfigBuilder {
    ConverterConfig::builder()
        .output_dir(root.join("assets/converted"))
        .model_roots(Vec::new())
        .transcoder(transcoder.clone())
}

fn sdf(uris: &[&str]) -> String {
    let mut s = String::from("<?xml version=\"1.0\"?>\n<sdf version=\"1.7\">\n  <model name=\"robot\">\n");
    for (i, uri) in uris.iter().enumerate() {
        s.push_str(&format!(
            "    <link name=\"l{i}\"><visual name=\"v\"><geometry><mesh><uri>{uri}</uri></mesh></geometry></visual></link>\n"
        ));
    }
    s.push_str("  </model>\n</sdf>\n");
    s
}

// ── Single document ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_shared_mesh_is_converted_once_and_rewritten_everywhere() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "world/parts/arm.dae", "<COLLADA/>");
    let doc = write(root, "world/robot.sdf", &sdf(&["parts/arm.dae", "parts/arm.dae"]));

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    assert_eq!(report.total(), 2);
    assert_eq!(report.converted(), 2);
    assert_eq!(transcoder.count(), 1);
    assert!(matches!(report.references[1], ReferenceOutcome::Converted { cached: true, .. }));

    let out_doc = root.join("world/robot_converted.sdf");
    assert_eq!(report.output_document.as_deref(), Some(out_doc.as_path()));
    let text = fs::read_to_string(&out_doc).unwrap();
    assert_eq!(text.matches("<uri>../assets/converted/arm.glb</uri>").count(), 2);
    assert!(!text.contains("parts/arm.dae"));
    assert!(root.join("assets/converted/arm.glb").exists());
    // The input is never modified.
    assert!(fs::read_to_string(&doc).unwrap().contains("parts/arm.dae"));
}

#[tokio::test]
async fn test_scheme_spellings_share_one_cache_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let mesh = write(root, "world/meshes/base.stl", "solid");
    let file_uri = format!("file://{}", mesh.display());
    let doc = write(
        root,
        "world/robot.sdf",
        &sdf(&["meshes/base.stl", "./meshes/../meshes/base.stl", &file_uri]),
    );

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let cache = ConversionCache::new(transcoder.clone(), &config.output_dir, config.format);
    let resolver = UriResolver::new(Vec::new());

    let report = convert_document_with(&doc, &config, &cache, &resolver, None)
        .await
        .unwrap();

    assert_eq!(report.converted(), 3);
    assert_eq!(transcoder.count(), 1);
    assert_eq!(cache.entries().len(), 1);
    assert_eq!(cache.stats().hits, 2);
    let schemes: Vec<Scheme> = report
        .references
        .iter()
        .map(|r| match r {
            ReferenceOutcome::Converted { scheme, .. } => *scheme,
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect();
    assert_eq!(schemes, vec![Scheme::Plain, Scheme::Plain, Scheme::File]);
}

#[tokio::test]
async fn test_repeat_runs_are_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "world/meshes/a.stl", "solid");
    write(root, "world/meshes/b.obj", "v 0 0 0");
    let doc = write(
        root,
        "world/robot.sdf",
        &sdf(&["meshes/a.stl", "meshes/missing.stl", "meshes/b.obj", "meshes/a.stl"]),
    );

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let transcoder = Arc::new(CountingTranscoder::default());
        let config = builder(root, &transcoder).build().unwrap();
        let report = convert_document(&doc, &config).await.unwrap();
        assert_eq!(transcoder.count(), 2);
        assert_eq!(report.converted(), 3);
        assert_eq!(report.unresolved(), 1);
        outputs.push(fs::read_to_string(report.output_document.unwrap()).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
    assert!(outputs[0].contains("<uri>meshes/missing.stl</uri>"));
}

#[tokio::test]
async fn test_document_without_meshes_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let doc = write(root, "world/empty.sdf", "<sdf version=\"1.7\"><world name=\"w\"/></sdf>");

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(report.output_document.is_none());
    assert!(report.is_success());
    assert!(!root.join("world/empty_converted.sdf").exists());
    assert_eq!(transcoder.count(), 0);
}

#[tokio::test]
async fn test_missing_mesh_is_unresolved_and_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let doc = write(root, "world/robot.sdf", &sdf(&["meshes/gone.stl"]));

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    assert_eq!(report.converted(), 0);
    assert!(report.output_document.is_none());
    match &report.references[0] {
        ReferenceOutcome::Unresolved { uri, error } => {
            assert_eq!(uri, "meshes/gone.stl");
            assert!(matches!(error, ReferenceError::Unresolved { .. }));
        }
        other => panic!("expected Unresolved, got {other:?}"),
    }
    assert!(!root.join("world/robot_converted.sdf").exists());

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, MeshConvError::NothingConverted { total: 1, .. }));
}

#[tokio::test]
async fn test_unsupported_format_is_reported_and_others_still_convert() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "world/meshes/a.fbx", "fbx");
    write(root, "world/meshes/b.stl", "solid");
    let doc = write(root, "world/robot.sdf", &sdf(&["meshes/a.fbx", "meshes/b.stl"]));

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.converted(), 1);
    assert!(matches!(
        report.references[0].error(),
        Some(ReferenceError::UnsupportedFormat { .. })
    ));
    let text = fs::read_to_string(report.output_document.unwrap()).unwrap();
    assert!(text.contains("<uri>meshes/a.fbx</uri>"));
    assert!(text.contains("<uri>../assets/converted/b.glb</uri>"));
}

#[tokio::test]
async fn test_model_uri_uses_first_matching_root() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "models_a/other/meshes/base.stl", "solid");
    write(root, "models_b/robot/meshes/base.stl", "solid");
    write(root, "models_c/robot/meshes/base.stl", "solid");
    let doc = write(root, "world/robot.sdf", &sdf(&["model://robot/meshes/base.stl"]));

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder)
        .model_roots(vec![root.join("models_c")])
        .extra_model_root(root.join("models_a"))
        .extra_model_root(root.join("models_b"))
        .build()
        .unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    match &report.references[0] {
        ReferenceOutcome::Converted { scheme, source, .. } => {
            assert_eq!(*scheme, Scheme::Model);
            assert!(source.ends_with("models_b/robot/meshes/base.stl"), "{}", source.display());
        }
        other => panic!("expected Converted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_explicit_output_path_and_scale() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "world/meshes/a.stl", "solid");
    let doc = write(
        root,
        "world/robot.sdf",
        "<sdf><model name=\"m\"><link name=\"l\"><visual name=\"v\"><geometry><mesh><uri>meshes/a.stl</uri><scale>0.5 2 3</scale></mesh></geometry></visual></link></model></sdf>",
    );

    let transcoder = Arc::new(CountingTranscoder::default());
    let out = root.join("build/out.sdf");
    let config = builder(root, &transcoder).output_path(&out).build().unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    assert_eq!(report.output_document.as_deref(), Some(out.as_path()));
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("<uri>../assets/converted/a.glb</uri>"));
    assert_eq!(transcoder.calls.lock().unwrap()[0].1, [0.5, 2.0, 3.0]);
}

#[tokio::test]
async fn test_structural_mode_leaves_unplanned_nodes_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "world/a.stl", "solid");
    let doc = write(
        root,
        "world/robot.sdf",
        "<sdf>\n  <mesh><uri>a.stl</uri></mesh>\n  <include><uri>a.stl</uri></include>\n</sdf>\n",
    );

    let transcoder = Arc::new(CountingTranscoder::default());

    let structural = builder(root, &transcoder)
        .rewrite_mode(RewriteMode::Structural)
        .suffix("_structural")
        .build()
        .unwrap();
    let report = convert_document(&doc, &structural).await.unwrap();
    let text = fs::read_to_string(report.output_document.unwrap()).unwrap();
    assert_eq!(
        text,
        "<sdf>\n  <mesh><uri>../assets/converted/a.glb</uri></mesh>\n  <include><uri>a.stl</uri></include>\n</sdf>\n"
    );

    let textual = builder(root, &transcoder).suffix("_textual").build().unwrap();
    let report = convert_document(&doc, &textual).await.unwrap();
    let text = fs::read_to_string(report.output_document.unwrap()).unwrap();
    assert_eq!(text.matches("../assets/converted/a.glb").count(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_mesh_keeps_referenced_name() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let blob = write(root, "store/blob123", "solid");
    fs::create_dir_all(root.join("world/meshes")).unwrap();
    std::os::unix::fs::symlink(&blob, root.join("world/meshes/base.stl")).unwrap();
    let doc = write(root, "world/robot.sdf", &sdf(&["meshes/base.stl"]));

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    assert_eq!(report.converted(), 1, "got {:?}", report.references);
    assert!(root.join("assets/converted/base.glb").exists());
    let calls = transcoder.calls.lock().unwrap();
    assert!(calls[0].0.ends_with("world/meshes/base.stl"));
    let text = fs::read_to_string(root.join("world/robot_converted.sdf")).unwrap();
    assert!(text.contains("<uri>../assets/converted/base.glb</uri>"));
}

#[tokio::test]
async fn test_escaped_uri_is_rewritten_in_output() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "world/R&D.stl", "solid");
    let doc = write(root, "world/robot.sdf", &sdf(&["R&amp;D.stl", "R&amp;D.stl"]));

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    assert_eq!(report.converted(), 2);
    assert_eq!(report.references[0].uri(), "R&D.stl");
    let text = fs::read_to_string(report.output_document.unwrap()).unwrap();
    assert_eq!(text.matches("<uri>../assets/converted/R&amp;D.glb</uri>").count(), 2);
    assert!(!text.contains("R&amp;D.stl"));
}

#[tokio::test]
async fn test_single_document_error_reaches_callback() {
    #[derive(Default)]
    struct Errors(AtomicUsize);
    impl ConversionProgressCallback for Errors {
        fn on_document_error(&self, _d: &Path, _e: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let doc = write(root, "world/bad.sdf", "<sdf><model></sdf>");

    let errors = Arc::new(Errors::default());
    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder)
        .progress_callback(errors.clone())
        .build()
        .unwrap();

    assert!(convert_document(&doc, &config).await.is_err());
    assert!(convert_document(root.join("world/gone.sdf"), &config).await.is_err());
    assert_eq!(errors.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_malformed_document_is_parse_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let doc = write(root, "world/bad.sdf", "<sdf><model></sdf>");

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let err = convert_document(&doc, &config).await.unwrap_err();
    assert!(matches!(err, MeshConvError::ParseFailure { .. }), "got {err:?}");
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_isolates_failures_and_shares_cache() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "shared/base.stl", "solid");
    let docs = vec![
        write(root, "w1/one.sdf", &sdf(&["../shared/base.stl"])),
        write(root, "w2/bad.sdf", "<sdf><mesh>"),
        write(root, "w3/three.sdf", &sdf(&["../shared/base.stl", "../shared/base.stl"])),
        root.join("w4/missing.sdf"),
    ];

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).concurrency(3).build().unwrap();
    let report = convert_batch(&docs, &config).await.unwrap();

    assert_eq!(report.documents.len(), 4);
    let names: Vec<&Path> = report.documents.iter().map(|d| d.document.as_path()).collect();
    assert_eq!(names, docs.iter().map(PathBuf::as_path).collect::<Vec<_>>());

    assert!(report.documents[0].is_success());
    assert!(report.documents[1].error.as_deref().unwrap().contains("bad.sdf"));
    assert!(report.documents[2].is_success());
    assert!(report.documents[3].error.is_some());

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.errored(), 2);
    assert_eq!(report.meshes_converted(), 3);
    assert_eq!(transcoder.count(), 1);
    assert_eq!(report.cache.transcodes, 1);
    assert_eq!(report.cache.entries, 1);
}

#[tokio::test]
async fn test_rewrite_failure_keeps_outcomes_and_batch_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "shared/base.stl", "solid");
    let docs = vec![
        write(root, "w1/robot.sdf", &sdf(&["../shared/base.stl", "../shared/gone.stl"])),
        write(root, "w2/two.sdf", &sdf(&["../shared/base.stl"])),
    ];
    // The output document path is taken by a directory.
    fs::create_dir_all(root.join("w1/robot_converted.sdf")).unwrap();

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let report = convert_batch(&docs, &config).await.unwrap();

    let failed = &report.documents[0];
    assert!(failed.error.as_deref().unwrap().contains("robot_converted.sdf"));
    assert!(failed.output_document.is_none());
    assert_eq!(failed.total(), 2);
    assert_eq!(failed.converted(), 1);
    assert_eq!(failed.unresolved(), 1);
    assert!(!root.join("w1/robot_converted.sdf.tmp").exists());

    assert!(report.documents[1].is_success());
    assert!(root.join("w2/two_converted.sdf").is_file());
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.errored(), 1);
    assert_eq!(report.meshes_converted(), 2);
    assert_eq!(transcoder.count(), 1);

    assert!(matches!(
        report.documents[0].clone().into_result(),
        Err(MeshConvError::DocumentFailed { .. })
    ));
}

#[tokio::test]
async fn test_same_stem_sources_share_one_output() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "w/a/base.stl", "solid a");
    write(root, "w/b/base.stl", "solid b");
    let one = write(root, "w/one.sdf", &sdf(&["a/base.stl"]));
    let two = write(root, "w/two.sdf", &sdf(&["b/base.stl"]));

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let cache = ConversionCache::new(transcoder.clone(), &config.output_dir, config.format);
    let resolver = UriResolver::new(Vec::new());

    let (r1, r2) = tokio::join!(
        convert_document_with(&one, &config, &cache, &resolver, None),
        convert_document_with(&two, &config, &cache, &resolver, None),
    );
    assert_eq!(r1.unwrap().converted(), 1);
    assert_eq!(r2.unwrap().converted(), 1);

    assert_eq!(transcoder.count(), 2);
    let output = root.join("assets/converted/base.glb");
    let entries = cache.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.output_path == output));
    assert_eq!(fs::read_dir(root.join("assets/converted")).unwrap().count(), 1);

    // Whichever transcode ran last owns the file.
    let contents = fs::read_to_string(&output).unwrap();
    assert!(contents.ends_with("a/base.stl") || contents.ends_with("b/base.stl"));
}

#[tokio::test]
async fn test_directory_skips_previous_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "worlds/meshes/a.stl", "solid");
    write(root, "worlds/one.sdf", &sdf(&["meshes/a.stl"]));
    write(root, "worlds/nested/two.sdf", &sdf(&["../meshes/a.stl"]));
    write(root, "worlds/readme.txt", "not a scene");

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();

    let first = convert_directory(root.join("worlds"), &config).await.unwrap();
    assert_eq!(first.documents.len(), 2);
    assert!(root.join("worlds/one_converted.sdf").exists());
    assert!(root.join("worlds/nested/two_converted.sdf").exists());

    // The outputs of the first run are not picked up as inputs.
    let second = convert_directory(root.join("worlds"), &config).await.unwrap();
    assert_eq!(second.documents.len(), 2);
    assert!(!root.join("worlds/one_converted_converted.sdf").exists());
}

#[tokio::test]
async fn test_directory_enumeration_failure() {
    let config = ConverterConfig::builder().model_roots(Vec::new()).build().unwrap();
    let err = convert_directory("/definitely/not/a/dir", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, MeshConvError::EnumerationFailed { .. }));
}

#[tokio::test]
async fn test_progress_callback_sees_every_reference() {
    #[derive(Default)]
    struct Tracker {
        documents: AtomicUsize,
        converted: AtomicUsize,
        skipped: AtomicUsize,
        errors: AtomicUsize,
        batch_total: AtomicUsize,
    }
    impl ConversionProgressCallback for Tracker {
        fn on_batch_start(&self, total: usize) {
            self.batch_total.store(total, Ordering::SeqCst);
        }
        fn on_mesh_converted(&self, _d: &Path, _u: &str, _o: &Path) {
            self.converted.fetch_add(1, Ordering::SeqCst);
        }
        fn on_mesh_skipped(&self, _d: &Path, _u: &str, _r: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
        fn on_document_complete(&self, _d: &Path, _c: usize, _t: usize, _o: Option<&Path>) {
            self.documents.fetch_add(1, Ordering::SeqCst);
        }
        fn on_document_error(&self, _d: &Path, _e: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "w/a.stl", "solid");
    let docs = vec![
        write(root, "w/one.sdf", &sdf(&["a.stl", "gone.stl"])),
        write(root, "w/bad.sdf", "not xml at all <"),
    ];

    let tracker = Arc::new(Tracker::default());
    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder)
        .progress_callback(tracker.clone())
        .build()
        .unwrap();
    convert_batch(&docs, &config).await.unwrap();

    assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.converted.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.documents.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
}

// ── Native transcoder ────────────────────────────────────────────────────────

const ARM_DAE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  <library_geometries>
    <geometry id="arm">
      <mesh>
        <source id="arm-pos">
          <float_array id="arm-pos-array" count="12">0 0 0 1 0 0 1 1 0 0 1 0</float_array>
          <technique_common><accessor source="#arm-pos-array" count="4" stride="3"/></technique_common>
        </source>
        <vertices id="arm-verts"><input semantic="POSITION" source="#arm-pos"/></vertices>
        <triangles count="2">
          <input semantic="VERTEX" source="#arm-verts" offset="0"/>
          <p>0 1 2 0 2 3</p>
        </triangles>
      </mesh>
    </geometry>
  </library_geometries>
</COLLADA>
"##;

#[tokio::test]
async fn test_native_collada_to_glb() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "world/parts/arm.dae", ARM_DAE);
    let doc = write(root, "world/robot.sdf", &sdf(&["parts/arm.dae", "parts/arm.dae"]));

    let config = ConverterConfig::builder()
        .output_dir(root.join("assets/converted"))
        .model_roots(Vec::new())
        .build()
        .unwrap();
    let report = convert_document(&doc, &config).await.unwrap();
    assert_eq!(report.converted(), 2);

    let glb = fs::read(root.join("assets/converted/arm.glb")).unwrap();
    assert_eq!(&glb[0..4], b"glTF");
    let json_len = u32::from_le_bytes([glb[12], glb[13], glb[14], glb[15]]) as usize;
    let gltf: serde_json::Value = serde_json::from_slice(&glb[20..20 + json_len]).unwrap();
    assert_eq!(gltf["accessors"][0]["count"], 4);
    assert_eq!(gltf["accessors"][1]["count"], 6);
}

#[tokio::test]
async fn test_native_failure_is_reported_per_reference() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "world/broken.stl", "this is not an stl file");
    write(root, "world/ok.obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
    let doc = write(root, "world/robot.sdf", &sdf(&["broken.stl", "ok.obj"]));

    let config = ConverterConfig::builder()
        .output_dir(root.join("out"))
        .format(OutputFormat::Gltf)
        .model_roots(Vec::new())
        .build()
        .unwrap();
    let report = convert_document(&doc, &config).await.unwrap();

    assert!(matches!(
        report.references[0].error(),
        Some(ReferenceError::ConversionFailed { .. })
    ));
    assert!(report.references[1].is_converted());
    let text = fs::read_to_string(report.output_document.unwrap()).unwrap();
    assert!(text.contains("<uri>../out/ok.gltf</uri>"));
}

#[test]
fn test_report_serialises_to_json() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "w/a.stl", "solid");
    let doc = write(root, "w/one.sdf", &sdf(&["a.stl", "gone.stl"]));

    let transcoder = Arc::new(CountingTranscoder::default());
    let config = builder(root, &transcoder).build().unwrap();
    let report = sdf_mesh_converter::convert_batch_sync(&[doc], &config).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    let refs = &json["documents"][0]["references"];
    assert_eq!(refs[0]["status"], "converted");
    assert_eq!(refs[0]["scheme"], "plain");
    assert_eq!(refs[1]["status"], "unresolved");
    assert_eq!(json["cache"]["transcodes"], 1);
}
