//! End-to-end scenarios for the codec, rewriter and archive rewriter.

use domain_patcher::archive::{self, is_text_entry};
use domain_patcher::codec::{CodecError, DomainPattern, Encoding, ORIGINAL_DOMAIN};
use domain_patcher::patcher::{PatchError, Patcher, Platform, RewriteResult};
use domain_patcher::rewrite;
use domain_patcher::state;
use std::fs;
use std::io::{Cursor, Read, Write};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

fn pattern() -> DomainPattern {
    DomainPattern::new(ORIGINAL_DOMAIN, "sanasol.ws").unwrap()
}

fn wide(text: &str) -> Vec<u8> {
    Encoding::Wide.encode(text)
}

#[test]
fn wide_rewrite_skips_lookalike() {
    // Three real occurrences plus one that differs only in the last character.
    let mut data = vec![0xAA; 7];
    data.extend(wide("https://hytale.com/a"));
    data.extend([0x00, 0x13, 0x37]);
    data.extend(wide("hytale.com"));
    data.extend(wide("|hytale.coX|"));
    data.extend(wide("sessions.hytale.com"));
    let len = data.len();

    let encoded = pattern().encode(Encoding::Wide);
    assert_eq!(rewrite::count(&data, &encoded), 3);
    assert_eq!(rewrite::rewrite(&mut data, &encoded), 3);

    assert_eq!(data.len(), len);
    assert!(rewrite::find(&data, &wide("hytale.coX")).is_some());
    assert!(rewrite::find(&data, &wide("sessions.sanasol.ws")).is_some());
    assert!(rewrite::find(&data, &wide("https://sanasol.ws/a")).is_some());
    assert_eq!(rewrite::count(&data, &encoded), 0);
}

#[test]
fn narrow_rewrite_in_place() {
    let mut data = b"url=https://hytale.com;auth=sessions.hytale.com;".to_vec();
    let count = rewrite::rewrite(&mut data, &pattern().encode(Encoding::Narrow));
    assert_eq!(count, 2);
    assert_eq!(data, b"url=https://sanasol.ws;auth=sessions.sanasol.ws;".to_vec());
}

#[test]
fn mismatched_target_is_rejected_or_replaced() {
    assert!(matches!(
        DomainPattern::new(ORIGINAL_DOMAIN, "abc"),
        Err(CodecError::LengthMismatch {
            original_len: 10,
            target_len: 3,
            ..
        })
    ));
    assert!(matches!(
        Patcher::try_new("abc"),
        Err(PatchError::LengthMismatch(_))
    ));

    assert_eq!(Patcher::new("abc").target_domain(), "sanasol.ws");
    assert_eq!(Patcher::new("").target_domain(), "sanasol.ws");
    assert_eq!(Patcher::new("example.io").target_domain(), "example.io");
}

#[test]
fn archive_rewrite_only_touches_allow_listed_entries() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.add_directory("com/game/", stored).unwrap();
    writer.start_file("com/game/Auth.class", deflated).unwrap();
    writer
        .write_all(b"\xCA\xFE\xBA\xBE..https://sessions.hytale.com/..hytale.com")
        .unwrap();
    writer.start_file("server.properties", stored).unwrap();
    writer.write_all(b"host=hytale.com\n").unwrap();
    writer.start_file("native/libgame.so", deflated).unwrap();
    writer.write_all(b"\x7fELF hytale.com").unwrap();
    writer.start_file("README.txt", stored).unwrap();
    writer.write_all(b"visit hytale.com").unwrap();
    let original = writer.finish().unwrap().into_inner();

    let rebuilt =
        archive::rewrite_archive_from(Cursor::new(&original), &pattern().encode(Encoding::Narrow))
            .unwrap();

    assert_eq!(rebuilt.entries, 5);
    assert_eq!(rebuilt.occurrences, 3);
    assert_eq!(
        rebuilt.rewritten,
        vec!["com/game/Auth.class".to_string(), "server.properties".to_string()]
    );

    let mut before = ZipArchive::new(Cursor::new(&original)).unwrap();
    let mut after = ZipArchive::new(Cursor::new(&rebuilt.bytes)).unwrap();
    assert_eq!(after.len(), before.len());

    for index in 0..before.len() {
        let mut old_entry = before.by_index(index).unwrap();
        let mut new_entry = after.by_index(index).unwrap();
        assert_eq!(old_entry.name(), new_entry.name());
        assert_eq!(old_entry.compression(), new_entry.compression());

        let mut old_data = Vec::new();
        let mut new_data = Vec::new();
        old_entry.read_to_end(&mut old_data).unwrap();
        new_entry.read_to_end(&mut new_data).unwrap();
        assert_eq!(old_data.len(), new_data.len());

        if is_text_entry(old_entry.name()) {
            assert!(rewrite::find(&new_data, b"hytale.com").is_none());
        } else {
            assert_eq!(old_data, new_data, "{} changed", old_entry.name());
        }
    }
}

#[test]
fn repeated_patch_is_a_no_op() {
    let temp_dir = TempDir::new().unwrap();
    let client = temp_dir.path().join("Client/HytaleClient");
    fs::create_dir_all(client.parent().unwrap()).unwrap();
    let mut data = vec![0u8; 32];
    data.extend(wide("hytale.com"));
    fs::write(&client, &data).unwrap();

    let patcher = Patcher::new("sanasol.ws").with_platform(Platform::Linux);
    let first = patcher.ensure_patched(temp_dir.path(), &mut |_, _| {});
    assert!(first.success && !first.already_patched);
    assert_eq!(first.patch_count, 1);

    let patched = fs::read(&client).unwrap();
    let marker_text = fs::read_to_string(state::marker_path(&client)).unwrap();

    let second = patcher.ensure_patched(temp_dir.path(), &mut |_, _| {});
    assert!(second.success && second.already_patched);
    assert_eq!(second.patch_count, 0);
    assert_eq!(fs::read(&client).unwrap(), patched);
    assert_eq!(
        fs::read_to_string(state::marker_path(&client)).unwrap(),
        marker_text
    );
}

#[test]
fn backup_is_never_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let client = temp_dir.path().join("Client/HytaleClient");
    fs::create_dir_all(client.parent().unwrap()).unwrap();
    let pristine = wide("hytale.com");
    fs::write(&client, &pristine).unwrap();

    let first = Patcher::new("sanasol.ws").with_platform(Platform::Linux);
    assert!(first.patch_client(&client, &mut |_, _| {}).success);

    // Retargeting rewrites from the backup and leaves it as it was.
    let second = Patcher::new("example.io").with_platform(Platform::Linux);
    assert_eq!(
        second.patch_client(&client, &mut |_, _| {}),
        RewriteResult::patched(1)
    );
    assert_eq!(fs::read(&client).unwrap(), wide("example.io"));
    assert_eq!(fs::read(state::backup_path(&client)).unwrap(), pristine);
}
