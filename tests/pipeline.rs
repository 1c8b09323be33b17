use mediaconvert::convert::{Atlas, SubImage};
use mediaconvert::metadata::{DumpBatch, DumpTable, PrecomputedProducer};
use mediaconvert::{
    Config, MediaConvert, MediaError, MemorySource, MetadataFormat, MetadataProducer, Palette,
    ProducerContext, Result, RunMode, SpriteDecoder,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use walkdir::WalkDir;

/// One 4x4 frame per input byte with hotspot (byte, byte).
struct TileDecoder;

impl SpriteDecoder for TileDecoder {
    fn decode(&self, data: &[u8], palette: &Palette) -> Result<Atlas> {
        let [r, g, b] = palette.get(data.len()).unwrap_or([0, 0, 0]);
        let width = 4 * data.len().max(1) as u32;
        let frames = data
            .iter()
            .enumerate()
            .map(|(i, &v)| SubImage {
                x: 4 * i as u32,
                y: 0,
                width: 4,
                height: 4,
                cx: v as i32,
                cy: v as i32,
            })
            .collect();

        Ok(Atlas {
            width,
            height: 4,
            pixels: [r, g, b, 255].repeat((width * 4) as usize),
            frames,
        })
    }
}

struct RejectingDecoder;

impl SpriteDecoder for RejectingDecoder {
    fn decode(&self, _data: &[u8], _palette: &Palette) -> Result<Atlas> {
        Err(MediaError::conversion("slp", "malformed sprite"))
    }
}

struct MissingStrings;

impl MetadataProducer for MissingStrings {
    fn name(&self) -> String {
        "strings".to_string()
    }

    fn produce(&self, _ctx: &ProducerContext<'_>) -> Result<DumpBatch> {
        Err(MediaError::conversion("language.dll", "string resources not found"))
    }
}

fn jasc_palette() -> Vec<u8> {
    let mut text = String::from("JASC-PAL\r\n0100\r\n256\r\n");
    for i in 0..256u32 {
        text.push_str(&format!("{} {} {}\r\n", i, (i * 3) % 256, 255 - i));
    }
    text.into_bytes()
}

fn game_source() -> MemorySource {
    MemorySource::new()
        .with_file("interfac", 50500, "bin", jasc_palette())
        .with_file("terrain", 15000, "slp", vec![1, 2, 3])
        .with_file("graphics", 200, "slp", vec![7])
        .with_file("sounds", 5000, "wav", b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec())
}

fn config_for(output: Option<&Path>, extract: &[&str], no_opus: bool, encoder: &str) -> Config {
    let mut config = Config::default();
    config.output.directory = output.map(Path::to_path_buf);
    config.extraction.extract = extract.iter().map(|r| r.to_string()).collect();
    config.extraction.jobs = 1;
    config.audio.no_opus = no_opus;
    config.audio.encoder = encoder.to_string();
    config
}

fn converter(config: Config) -> MediaConvert {
    MediaConvert::headless(config).with_sprite_decoder(Arc::new(TileDecoder))
}

fn files_under(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().to_string()
}

#[cfg(unix)]
#[test]
fn test_terrain_and_sounds_with_encoder() {
    let out = tempdir().unwrap();
    let config = config_for(Some(out.path()), &["terrain:*.*", "sounds:*.*"], false, "cp");

    let summary = converter(config).run(&game_source()).unwrap();

    assert_eq!(summary.mode, RunMode::Convert);
    assert_eq!(summary.files_extracted(), 2);
    assert_eq!(summary.exit_code(), 0);

    let csv = std::fs::read_to_string(out.path().join("terrain/15000.csv")).unwrap();
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.ends_with(",48,24")));
    assert!(out.path().join("terrain/15000.png").exists());

    assert!(out.path().join("sounds/5000.opus").exists());
    assert!(!out.path().join("sounds/5000.wav").exists());
    assert!(!out.path().join("graphics").exists());
}

#[test]
fn test_terrain_and_sounds_without_encoder() {
    let out = tempdir().unwrap();
    let config = config_for(
        Some(out.path()),
        &["terrain:*.*", "sounds:*.*"],
        true,
        "encoder-that-must-not-run",
    );

    let summary = converter(config).run(&game_source()).unwrap();

    assert_eq!(summary.files_extracted(), 2);
    assert_eq!(summary.exit_code(), 0);
    assert!(out.path().join("terrain/15000.png").exists());
    assert_eq!(
        std::fs::read(out.path().join("sounds/5000.wav")).unwrap(),
        b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec()
    );
    assert!(!out.path().join("sounds/5000.opus").exists());
}

#[cfg(unix)]
#[test]
fn test_failing_encoder_keeps_wave_file() {
    let out = tempdir().unwrap();
    let config = config_for(Some(out.path()), &["sounds:*.wav"], false, "false");

    let summary = converter(config).run(&game_source()).unwrap();

    assert_eq!(summary.files_extracted(), 1);
    assert_eq!(summary.progress.warnings.len(), 1);
    assert_eq!(summary.exit_code(), 2);
    assert!(out.path().join("sounds/5000.wav").exists());
    assert!(!out.path().join("sounds/5000.opus").exists());

    let report = std::fs::read_to_string(summary.report_path.unwrap()).unwrap();
    assert!(report.contains("sounds:5000.wav"));
}

#[test]
fn test_missing_encoder_program_keeps_wave_file() {
    let out = tempdir().unwrap();
    let config = config_for(
        Some(out.path()),
        &["sounds:*.wav"],
        false,
        "/nonexistent/mediaconvert-test-encoder",
    );

    let summary = converter(config).run(&game_source()).unwrap();

    assert_eq!(summary.files_extracted(), 1);
    assert!(out.path().join("sounds/5000.wav").exists());
    assert_eq!(summary.exit_code(), 2);
}

#[test]
fn test_exact_rule_selects_single_entry() {
    let out = tempdir().unwrap();
    let config = config_for(Some(out.path()), &["interfac:50500.bin"], true, "opusenc");

    let summary = converter(config).run(&game_source()).unwrap();

    assert_eq!(summary.progress.entries_seen, 4);
    assert_eq!(summary.progress.entries_selected, 1);
    assert_eq!(summary.files_extracted(), 1);
    assert_eq!(
        std::fs::read(out.path().join("interfac/50500.bin")).unwrap(),
        jasc_palette()
    );
    assert!(!out.path().join("terrain").exists());
    assert!(!out.path().join("sounds").exists());
}

#[test]
fn test_zero_rules_select_everything() {
    let out = tempdir().unwrap();
    let config = config_for(Some(out.path()), &[], true, "opusenc");

    let summary = converter(config).run(&game_source()).unwrap();

    assert_eq!(summary.progress.entries_selected, 4);
    assert_eq!(summary.files_extracted(), 4);
    assert!(out.path().join("graphics/200.png").exists());
}

#[test]
fn test_listing_mode_leaves_filesystem_unchanged() {
    let out = tempdir().unwrap();
    let mut config = config_for(Some(out.path()), &["*:*.*"], false, "cp");
    config.extraction.list_files = true;

    let summary = converter(config).run(&game_source()).unwrap();

    let listing = summary.listing.as_ref().unwrap();
    assert_eq!(
        listing.lines(),
        vec![
            "200 = [ graphics/200.slp ]",
            "5000 = [ sounds/5000.wav ]",
            "15000 = [ terrain/15000.slp ]",
            "50500 = [ interfac/50500.bin ]",
        ]
    );
    assert_eq!(summary.files_extracted(), 0);
    assert!(files_under(out.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_no_output_spawns_nothing_and_writes_nothing() {
    let scratch = tempdir().unwrap();
    let marker = scratch.path().join("encoder-ran");
    let encoder = write_script(
        scratch.path(),
        "encoder.sh",
        &format!("touch '{}'\ncp \"$1\" \"$2\"", marker.display()),
    );
    let config = config_for(None, &["*:*.*"], false, &encoder);

    let summary = converter(config).run(&game_source()).unwrap();

    assert_eq!(summary.mode, RunMode::Inspect);
    assert_eq!(summary.progress.entries_selected, 4);
    assert_eq!(summary.files_extracted(), 0);
    assert!(summary.metadata.is_none());
    assert!(summary.report_path.is_none());
    assert!(!marker.exists());
    assert_eq!(files_under(scratch.path()), vec!["encoder.sh"]);
}

#[test]
fn test_metadata_export_with_failing_producer() {
    let out = tempdir().unwrap();
    let mut config = config_for(Some(out.path()), &["interfac:*.*"], true, "opusenc");
    config.output.metadata_formats = vec![MetadataFormat::Csv, MetadataFormat::Json];

    let mut civs = DumpTable::new("civilizations", &["id", "name"]);
    civs.push_row(vec![json!(1), json!("Britons")]).unwrap();
    civs.push_row(vec![json!(2), json!("Franks")]).unwrap();

    let media = converter(config)
        .with_metadata_producer(Arc::new(MissingStrings))
        .with_metadata_producer(Arc::new(PrecomputedProducer::new(
            "gamedata",
            DumpBatch::new(vec![civs]).with_prefix("gamedata"),
        )));

    let summary = media.run(&game_source()).unwrap();

    let metadata = summary.metadata.as_ref().unwrap();
    assert_eq!(metadata.failures.len(), 1);
    assert_eq!(metadata.failures[0].producer, "strings");
    assert_eq!(summary.exit_code(), 2);

    for file in [
        "palette_50500.csv",
        "palette_50500.json",
        "player_palette_50500.csv",
        "termcolors.csv",
        "termcolors.json",
        "gamedata/civilizations.csv",
        "gamedata/civilizations.json",
    ] {
        assert!(out.path().join(file).exists(), "missing {}", file);
    }

    let civs_csv = std::fs::read_to_string(out.path().join("gamedata/civilizations.csv")).unwrap();
    assert_eq!(civs_csv, "id,name\n1,Britons\n2,Franks\n");

    let termcolors = std::fs::read_to_string(out.path().join("termcolors.csv")).unwrap();
    assert_eq!(termcolors.lines().count(), 257);
}

#[test]
fn test_extrafiles_write_swatches() {
    let out = tempdir().unwrap();
    let mut config = config_for(Some(out.path()), &["interfac:*.*"], true, "opusenc");
    config.output.extrafiles = true;

    let summary = converter(config).run(&game_source()).unwrap();

    assert_eq!(summary.extra_files.len(), 2);
    let colortable = image::open(out.path().join("info/colortable.pal.png")).unwrap();
    assert_eq!((colortable.width(), colortable.height()), (256, 256));
    let players = image::open(out.path().join("info/playercolortable.pal.png")).unwrap();
    assert_eq!((players.width(), players.height()), (128, 128));
}

#[test]
fn test_slp_without_decoder_is_copied() {
    let out = tempdir().unwrap();
    let config = config_for(Some(out.path()), &["graphics:*.slp"], true, "opusenc");

    let summary = MediaConvert::headless(config).run(&game_source()).unwrap();

    assert_eq!(summary.files_extracted(), 1);
    assert_eq!(std::fs::read(out.path().join("graphics/200.slp")).unwrap(), vec![7]);
    assert!(!out.path().join("graphics/200.png").exists());
}

#[test]
fn test_run_report_is_written() {
    let out = tempdir().unwrap();
    let config = config_for(Some(out.path()), &["terrain:*.*"], true, "opusenc");

    let summary = converter(config).run(&game_source()).unwrap();

    let report_path = out.path().join(".mediaconvert/extraction_report.json");
    assert_eq!(summary.report_path.as_deref(), Some(report_path.as_path()));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(report["mode"], "convert");
    assert_eq!(report["extraction_summary"]["total_files_processed"], 1);
    assert_eq!(report["extraction_summary"]["files_by_extension"]["slp"], 1);
    assert_eq!(report["metadata"]["failures"].as_array().unwrap().len(), 0);
}

#[test]
fn test_rejected_sprite_counts_as_extracted() {
    let out = tempdir().unwrap();
    let config = config_for(Some(out.path()), &["graphics:*.slp"], true, "opusenc");

    let summary = MediaConvert::headless(config)
        .with_sprite_decoder(Arc::new(RejectingDecoder))
        .run(&game_source())
        .unwrap();

    assert_eq!(summary.files_extracted(), 1);
    assert_eq!(summary.progress.errors.len(), 1);
    assert!(summary.progress.errors[0].contains("graphics:200.slp"));
    assert_eq!(summary.exit_code(), 2);
    assert!(!out.path().join("graphics/200.png").exists());
}
