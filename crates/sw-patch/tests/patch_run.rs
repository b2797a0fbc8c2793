//! End-to-end patch runs against scratch game and work directories

use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use sw_archive::{ARCHIVE_KEY, extract_entry, list_entries, xor_file};
use sw_patch::{
    CancellationToken, Error, ErrorKind, PatchOptions, Patcher, ProgressCallback,
    ResourceDescriptor,
};
use sw_res::{FormatGrammar, RecordReader, encode_utf16le};
use tempfile::TempDir;
use zip::write::FileOptions;

const ITEM_FORMAT: &str = "0 4 4 len 2";

struct Fixture {
    _dir: TempDir,
    game: PathBuf,
    work: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let game = dir.path().join("game");
        let work = dir.path().join("work");
        fs::create_dir_all(&game).unwrap();
        fs::create_dir_all(work.join("en")).unwrap();
        Self {
            _dir: dir,
            game,
            work,
        }
    }

    fn options(&self) -> PatchOptions {
        PatchOptions::new(&self.game, &self.work, "en")
    }

    fn language_dir(&self) -> PathBuf {
        self.work.join("en")
    }

    /// Write an obfuscated archive into the game root
    fn game_archive(&self, relative: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.game.join(relative);
        write_zip(&path, entries);
        xor_file(&path, ARCHIVE_KEY).unwrap();
        path
    }

    /// Write a per-language input file
    fn input(&self, relative: &str, data: &[u8]) -> PathBuf {
        let path = self.language_dir().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, data).unwrap();
        path
    }
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for (name, data) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

fn item_resource(records: &[(u32, &str)]) -> Vec<u8> {
    let mut data = (records.len() as u32).to_le_bytes().to_vec();
    for (key, text) in records {
        data.extend_from_slice(&key.to_le_bytes());
        data.extend_from_slice(&(text.encode_utf16().count() as u16).to_le_bytes());
        data.extend_from_slice(&encode_utf16le(text));
    }
    data
}

fn texts(resource: &[u8], format: &str) -> Vec<String> {
    let grammar = FormatGrammar::parse(format).unwrap();
    RecordReader::new(resource, &grammar)
        .unwrap()
        .map(|record| record.unwrap().texts().remove(0))
        .collect()
}

/// Read an entry from an obfuscated output archive
fn output_entry(archive: &Path, entry: &str) -> Vec<u8> {
    let dir = TempDir::new().unwrap();
    let copy = dir.path().join("copy.v");
    fs::copy(archive, &copy).unwrap();
    xor_file(&copy, ARCHIVE_KEY).unwrap();
    extract_entry(&copy, entry).unwrap()
}

fn output_entries(archive: &Path) -> Vec<String> {
    let dir = TempDir::new().unwrap();
    let copy = dir.path().join("copy.v");
    fs::copy(archive, &copy).unwrap();
    xor_file(&copy, ARCHIVE_KEY).unwrap();
    let mut entries = list_entries(&copy).unwrap();
    entries.sort();
    entries
}

fn item_descriptor(entry: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(
        "datas/data12.v",
        entry,
        format!("Translations/{}.txt", entry.trim_end_matches(".res")),
        ITEM_FORMAT,
    )
}

fn leftover_staging(language_dir: &Path) -> bool {
    fs::read_dir(language_dir)
        .unwrap()
        .any(|entry| entry.unwrap().file_name().to_string_lossy().starts_with(".staging-"))
}

#[test]
fn test_formatted_unit_is_patched_into_output_archive() {
    let fixture = Fixture::new();
    let resource = item_resource(&[(1, "Sword"), (2, "Shield")]);
    let game_archive = fixture.game_archive(
        "datas/data12.v",
        &[("tb_item.res", resource.as_slice()), ("readme.txt", b"keep me".as_slice())],
    );
    let game_bytes = fs::read(&game_archive).unwrap();
    fixture.input("datas/data12/tb_item.txt", b"ID=2\nSchild\n\n".as_slice());

    let patcher = Patcher::new(vec![item_descriptor("tb_item.res")], fixture.options());
    let outcome = patcher.run(&CancellationToken::new(), None).unwrap();

    let summary = outcome.summary().unwrap();
    assert_eq!(summary.units, 1);
    assert_eq!(summary.archives, 1);
    assert_eq!(summary.records, 2);
    assert_eq!(summary.translated_records, 1);

    let output = fixture.language_dir().join("datas/data12.v");
    assert_eq!(summary.outputs, vec![output.clone()]);

    let patched = output_entry(&output, "tb_item.res");
    assert_eq!(texts(&patched, ITEM_FORMAT), vec!["Sword", "Schild"]);
    assert_eq!(output_entry(&output, "readme.txt"), b"keep me");

    // The game root is only read
    assert_eq!(fs::read(&game_archive).unwrap(), game_bytes);
    assert!(!leftover_staging(&fixture.language_dir()));
}

#[test]
fn test_archive_is_staged_once_for_many_units() {
    let fixture = Fixture::new();
    let items = item_resource(&[(1, "Sword")]);
    let skills = item_resource(&[(7, "Slash")]);
    fixture.game_archive(
        "datas/data12.v",
        &[("tb_item.res", items.as_slice()), ("tb_skill.res", skills.as_slice())],
    );
    fixture.input("datas/data12/tb_item.txt", b"ID=1\nSchwert\n\n".as_slice());
    fixture.input("datas/data12/tb_skill.txt", b"ID=7\nHieb\n\n".as_slice());

    let patcher = Patcher::new(
        vec![item_descriptor("tb_item.res"), item_descriptor("tb_skill.res")],
        fixture.options(),
    );
    let outcome = patcher.run(&CancellationToken::new(), None).unwrap();
    assert_eq!(outcome.summary().unwrap().archives, 1);

    let output = fixture.language_dir().join("datas/data12.v");
    assert_eq!(
        texts(&output_entry(&output, "tb_item.res"), ITEM_FORMAT),
        vec!["Schwert"]
    );
    assert_eq!(
        texts(&output_entry(&output, "tb_skill.res"), ITEM_FORMAT),
        vec!["Hieb"]
    );
}

#[test]
fn test_verbatim_units_replace_and_merge() {
    let fixture = Fixture::new();
    fixture.game_archive(
        "datas/data12.v",
        &[
            ("fonts/main.ttf", b"old font".as_slice()),
            ("ui/a.txt", b"old a".as_slice()),
            ("ui/keep.txt", b"keep".as_slice()),
        ],
    );
    fixture.input("datas/data12/main.ttf", b"new font".as_slice());
    write_zip(
        &fixture.language_dir().join("datas/data12/ui.zip"),
        &[("a.txt", b"new a".as_slice()), ("nested/b.txt", b"new b".as_slice())],
    );

    let patcher = Patcher::new(
        vec![
            ResourceDescriptor::new("datas/data12.v", "fonts/main.ttf", "Fonts/main.ttf", ""),
            ResourceDescriptor::new("datas/data12.v", "ui", "Ui/ui.zip", ""),
        ],
        fixture.options(),
    );
    let outcome = patcher.run(&CancellationToken::new(), None).unwrap();
    assert!(!outcome.is_cancelled());

    let output = fixture.language_dir().join("datas/data12.v");
    assert_eq!(
        output_entries(&output),
        vec!["fonts/main.ttf", "ui/a.txt", "ui/b.txt", "ui/keep.txt"]
    );
    assert_eq!(output_entry(&output, "fonts/main.ttf"), b"new font");
    assert_eq!(output_entry(&output, "ui/a.txt"), b"new a");
    assert_eq!(output_entry(&output, "ui/b.txt"), b"new b");
    assert_eq!(output_entry(&output, "ui/keep.txt"), b"keep");
}

#[test]
fn test_standalone_unit_is_written_without_obfuscation() {
    let fixture = Fixture::new();
    let resource = item_resource(&[(3, "Start"), (4, "Quit")]);
    let game_file = fixture.game.join("bin/menu.res");
    fs::create_dir_all(game_file.parent().unwrap()).unwrap();
    fs::write(&game_file, &resource).unwrap();
    fixture.input("bin/menu/menu.txt", b"ID=4\nBeenden\n\n".as_slice());

    let patcher = Patcher::new(
        vec![ResourceDescriptor::new("bin/menu.res", "", "Bin/menu.txt", ITEM_FORMAT)],
        fixture.options(),
    );
    let outcome = patcher.run(&CancellationToken::new(), None).unwrap();
    assert_eq!(outcome.summary().unwrap().archives, 0);

    let patched = fs::read(fixture.language_dir().join("bin/menu.res")).unwrap();
    assert_eq!(texts(&patched, ITEM_FORMAT), vec!["Start", "Beenden"]);
    assert_eq!(fs::read(&game_file).unwrap(), resource);
}

#[test]
fn test_cancelled_run_leaves_destination_untouched() {
    let fixture = Fixture::new();
    let items = item_resource(&[(1, "Sword")]);
    let skills = item_resource(&[(7, "Slash")]);
    fixture.game_archive(
        "datas/data12.v",
        &[("tb_item.res", items.as_slice()), ("tb_skill.res", skills.as_slice())],
    );
    fixture.input("datas/data12/tb_item.txt", b"ID=1\nSchwert\n\n".as_slice());
    fixture.input("datas/data12/tb_skill.txt", b"ID=7\nHieb\n\n".as_slice());
    let descriptors = vec![item_descriptor("tb_item.res"), item_descriptor("tb_skill.res")];

    // A first run puts an output in place
    Patcher::new(descriptors.clone(), fixture.options())
        .run(&CancellationToken::new(), None)
        .unwrap();
    let output = fixture.language_dir().join("datas/data12.v");
    let before = fs::read(&output).unwrap();

    fixture.input("datas/data12/tb_item.txt", b"ID=1\nEpee\n\n".as_slice());

    let token = CancellationToken::new();
    let trigger = token.clone();
    let progress: ProgressCallback = Box::new(move |done, _, _| {
        if done == 1 {
            trigger.cancel();
        }
    });

    let outcome = Patcher::new(descriptors, fixture.options())
        .run(&token, Some(&progress))
        .unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(fs::read(&output).unwrap(), before);
    assert!(!leftover_staging(&fixture.language_dir()));
}

#[test]
fn test_grammar_error_is_reported_before_any_file_is_touched() {
    let fixture = Fixture::new();
    let patcher = Patcher::new(
        vec![
            item_descriptor("tb_item.res"),
            ResourceDescriptor::new("datas/data13.v", "tb_npc.res", "tb_npc.txt", "0 4 4 len"),
        ],
        fixture.options(),
    );

    let err = patcher.run(&CancellationToken::new(), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GrammarSyntax);
    assert_eq!(err.unit(), Some("datas/data13.v:tb_npc.res"));

    // The game archives do not even exist; nothing was staged or written
    assert_eq!(fs::read_dir(fixture.language_dir()).unwrap().count(), 0);
}

#[test]
fn test_missing_entry_names_the_unit() {
    let fixture = Fixture::new();
    fixture.game_archive("datas/data12.v", &[("readme.txt", b"keep me".as_slice())]);
    fixture.input("datas/data12/tb_item.txt", b"ID=1\nSchwert\n\n".as_slice());

    let patcher = Patcher::new(vec![item_descriptor("tb_item.res")], fixture.options());
    let err = patcher.run(&CancellationToken::new(), None).unwrap_err();

    match &err {
        Error::ArchiveIo {
            unit,
            language,
            source,
        } => {
            assert_eq!(unit, "datas/data12.v:tb_item.res");
            assert_eq!(language, "en");
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fixture.language_dir().join("datas/data12.v").exists());
    assert!(!leftover_staging(&fixture.language_dir()));
}

#[test]
fn test_missing_substitute_names_the_unit() {
    let fixture = Fixture::new();
    fixture.game_archive("datas/data12.v", &[("fonts/main.ttf", b"old font".as_slice())]);

    let patcher = Patcher::new(
        vec![ResourceDescriptor::new("datas/data12.v", "fonts/main.ttf", "Fonts/main.ttf", "")],
        fixture.options(),
    );
    let err = patcher.run(&CancellationToken::new(), None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveIo);
    assert_eq!(err.unit(), Some("datas/data12.v:fonts/main.ttf"));
    match &err {
        Error::UnitIo { language, path, .. } => {
            assert_eq!(language, "en");
            assert_eq!(path, &fixture.language_dir().join("datas/data12/main.ttf"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fixture.language_dir().join("datas/data12.v").exists());
    assert!(!leftover_staging(&fixture.language_dir()));
}

#[test]
fn test_missing_translation_is_a_translation_error() {
    let fixture = Fixture::new();
    let resource = item_resource(&[(1, "Sword")]);
    fixture.game_archive("datas/data12.v", &[("tb_item.res", resource.as_slice())]);

    let patcher = Patcher::new(vec![item_descriptor("tb_item.res")], fixture.options());
    let err = patcher.run(&CancellationToken::new(), None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TranslationParse);
    match err {
        Error::TranslationParse { path, .. } => {
            assert_eq!(path, fixture.language_dir().join("datas/data12/tb_item.txt"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_spawned_run_reports_progress() {
    let fixture = Fixture::new();
    let items = item_resource(&[(1, "Sword")]);
    let skills = item_resource(&[(7, "Slash")]);
    fixture.game_archive(
        "datas/data12.v",
        &[("tb_item.res", items.as_slice()), ("tb_skill.res", skills.as_slice())],
    );
    fixture.input("datas/data12/tb_item.txt", b"ID=1\nSchwert\n\n".as_slice());
    fixture.input("datas/data12/tb_skill.txt", b"".as_slice());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: ProgressCallback = Box::new(move |done, total, unit| {
        sink.lock().unwrap().push((done, total, unit.to_string()));
    });

    let handle = Patcher::new(
        vec![item_descriptor("tb_item.res"), item_descriptor("tb_skill.res")],
        fixture.options(),
    )
    .spawn(Some(progress))
    .unwrap();

    let outcome = handle.join().unwrap();
    assert_eq!(outcome.summary().unwrap().units, 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (1, 2, "datas/data12.v:tb_item.res".to_string()),
            (2, 2, "datas/data12.v:tb_skill.res".to_string()),
        ]
    );
}

#[cfg(feature = "serde")]
#[test]
fn test_descriptors_load_from_json() {
    let json = r#"[
        {"archive_path": "datas/data12.v", "entry_path": "tb_item.res",
         "download_path": "Translations/tb_item.txt", "format": "0 4 4 len 2"},
        {"archive_path": "bin/font.ttf", "download_path": "font.ttf"}
    ]"#;
    let descriptors: Vec<ResourceDescriptor> = serde_json::from_str(json).unwrap();
    assert_eq!(descriptors[0], item_descriptor("tb_item.res"));
    assert!(!descriptors[1].is_archive_entry());
    assert!(!descriptors[1].is_formatted());
}
