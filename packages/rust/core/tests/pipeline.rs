//! End-to-end pipeline tests over a miniature two-tradition project.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use verseweave_core::{
    Project, SilentProgress, run_clean, run_csv, run_mapping_skeleton, run_parse, run_tex,
    run_unpack,
};
use verseweave_shared::{AlignmentConfig, AppConfig, SourceEntry};

const LXX_USFM: &str = "\\id JER Greek-order translation\n\
\\c 1\n\
\\p\n\
\\v 1 The word of God which came to Jeremiah.\n\
\\v 2 Hear the word of the Lord,\n\
\\q1 O house of Jacob,\n\
\\q2 and all the families of Israel.\n\
\\c 2\n\
\\v 1 This verse stands only in the Greek.\n";

const MT_USFM: &str = "\\id JER World English Bible\n\
\\c 1\n\
\\p\n\
\\v 1 The words of Jeremiah the son of Hilkiah.\n\
\\v 2 Yahweh\u{2019}s word came to him in the days of Josiah,\n\
\\v 3 in the thirteenth year of his reign.\n\
\\c 2\n\
\\v 1 Moreover Yahweh\u{2019}s word came to me.\n";

const MAPPING: &str = "lxx_ref,mt_ref\n\
1:1,1:1\n\
1:2,1:2-1:3\n\
2:1,\n\
,2:1\n";

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn test_config() -> AppConfig {
    AppConfig {
        sources: vec![
            SourceEntry {
                name: "lxx".into(),
                archive: Some("lxx_usfm.zip".into()),
                file: None,
            },
            SourceEntry {
                name: "mt".into(),
                archive: None,
                file: Some("25-JER-mt.usfm".into()),
            },
        ],
        alignment: AlignmentConfig {
            lxx_source: "lxx".into(),
            mt_source: "mt".into(),
            ..AlignmentConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Lay out a project directory with sources and a curated mapping table.
fn make_project(root: &Path) -> Project {
    let sources = root.join("sources");
    std::fs::create_dir_all(&sources).unwrap();
    write_zip(&sources.join("lxx_usfm.zip"), &[("JER.usfm", LXX_USFM)]);
    std::fs::write(sources.join("25-JER-mt.usfm"), MT_USFM).unwrap();

    let data = root.join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("mapping_lxx_to_mt.csv"), MAPPING).unwrap();

    Project::new(root, test_config(), "0.1.0-test")
}

fn run_through_tex(project: &Project) {
    run_unpack(project, &SilentProgress, false).unwrap();
    run_parse(project, &SilentProgress, false).unwrap();
    run_csv(project, &SilentProgress, false).unwrap();
    run_tex(project, &SilentProgress, false).unwrap();
}

#[test]
fn full_pipeline_produces_aligned_table_and_document() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    run_through_tex(&project);

    // Row count equals mapping entry count
    let csv = std::fs::read_to_string(project.parallel_csv_path()).unwrap();
    let data_lines: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(data_lines.len(), 4);

    // Both-present row: both texts populated
    assert!(data_lines[0].contains("The word of God"));
    assert!(data_lines[0].contains("The words of Jeremiah"));
    assert!(data_lines[0].ends_with("true,true"));

    // Range row: MT texts concatenated in verse order
    assert!(data_lines[1].contains("in the days of Josiah"));
    assert!(data_lines[1].contains("thirteenth year"));
    let josiah = data_lines[1].find("Josiah").unwrap();
    let reign = data_lines[1].find("reign").unwrap();
    assert!(josiah < reign);

    // LXX-only row: MT side carries the absence marker
    assert!(data_lines[2].contains("only in the Greek"));
    assert!(data_lines[2].contains('\u{2014}'));
    assert!(data_lines[2].ends_with("true,false"));

    // MT-only row: LXX side absent
    assert!(data_lines[3].starts_with('\u{2014}'));
    assert!(data_lines[3].ends_with("false,true"));

    // Document: one VersePair per row, chapters from the LXX sequence
    let tex = std::fs::read_to_string(project.document_path()).unwrap();
    assert_eq!(tex.matches("\\VersePair").count(), 4);
    assert_eq!(tex.matches("\\ChapterHeading").count(), 2);
    assert!(tex.contains("\\poemline{1}{O house of Jacob,}"));
    assert!(project.preamble_path().exists());

    // Manifest records every stage that wrote files
    let manifest = verseweave_core::manifest::load_manifest(&project.build_dir())
        .unwrap()
        .expect("manifest written");
    for stage in ["unpack", "parse", "csv", "tex"] {
        assert!(manifest.stages.contains_key(stage), "missing stage {stage}");
    }
}

#[test]
fn fresh_outputs_are_skipped_and_rebuilds_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    run_through_tex(&project);

    let json_before = std::fs::read(project.json_path("lxx")).unwrap();
    let csv_before = std::fs::read(project.parallel_csv_path()).unwrap();
    let tex_before = std::fs::read(project.document_path()).unwrap();

    // Second run with unchanged inputs: every stage reports fresh
    assert!(!run_parse(&project, &SilentProgress, false).unwrap().ran);
    assert!(!run_csv(&project, &SilentProgress, false).unwrap().ran);
    assert!(!run_tex(&project, &SilentProgress, false).unwrap().ran);

    // Forced re-run rewrites the same bytes
    assert!(run_parse(&project, &SilentProgress, true).unwrap().ran);
    assert!(run_csv(&project, &SilentProgress, true).unwrap().ran);
    assert!(run_tex(&project, &SilentProgress, true).unwrap().ran);

    assert_eq!(json_before, std::fs::read(project.json_path("lxx")).unwrap());
    assert_eq!(csv_before, std::fs::read(project.parallel_csv_path()).unwrap());
    assert_eq!(tex_before, std::fs::read(project.document_path()).unwrap());
}

#[test]
fn unresolved_mapping_reference_fails_the_csv_stage() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    run_unpack(&project, &SilentProgress, false).unwrap();
    run_parse(&project, &SilentProgress, false).unwrap();

    // Point a mapping row at a verse neither tradition has
    std::fs::write(
        project.mapping_path(),
        "lxx_ref,mt_ref\n1:1,1:1\n3:9,1:1\n",
    )
    .unwrap();

    let err = run_csv(&project, &SilentProgress, true).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("3:9"), "unexpected error: {msg}");
    assert!(msg.contains("row 3"), "unexpected error: {msg}");

    // No partial output left behind
    assert!(!project.parallel_csv_path().exists());
}

#[test]
fn mapping_skeleton_is_identity_and_respects_curation() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    run_unpack(&project, &SilentProgress, false).unwrap();
    run_parse(&project, &SilentProgress, false).unwrap();

    // The curated table already exists: refuse to clobber
    assert!(run_mapping_skeleton(&project, &SilentProgress, false).is_err());
    let preserved = std::fs::read_to_string(project.mapping_path()).unwrap();
    assert_eq!(preserved, MAPPING);

    // Forced: identity rows over the skeleton source's verse list
    run_mapping_skeleton(&project, &SilentProgress, true).unwrap();
    let skeleton = std::fs::read_to_string(project.mapping_path()).unwrap();
    assert_eq!(skeleton, "lxx_ref,mt_ref\n1:1,1:1\n1:2,1:2\n2:1,2:1\n");
}

#[test]
fn build_runs_all_stages_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());

    let summary = verseweave_core::run_build(&project, &SilentProgress, false).unwrap();
    let stages: Vec<&str> = summary.outcomes.iter().map(|o| o.stage).collect();
    assert_eq!(stages, vec!["unpack", "parse", "csv", "tex"]);
    assert!(summary.outcomes.iter().all(|o| o.ran));
    assert_eq!(summary.rows, Some(4));
}

#[test]
fn build_requires_the_mapping_table() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    std::fs::remove_file(project.mapping_path()).unwrap();

    let err = verseweave_core::run_build(&project, &SilentProgress, false).unwrap_err();
    assert!(err.to_string().contains("mapping"));
}

#[test]
fn clean_removes_build_dir_and_document_only() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    run_through_tex(&project);

    let outcome = run_clean(&project, &SilentProgress).unwrap();
    assert!(outcome.ran);

    assert!(!project.build_dir().exists());
    assert!(!project.document_path().exists());
    // Hand-curated and hand-editable files survive
    assert!(project.mapping_path().exists());
    assert!(project.preamble_path().exists());
    assert!(project.sources_dir().join("lxx_usfm.zip").exists());
}
