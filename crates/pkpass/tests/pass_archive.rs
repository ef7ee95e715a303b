//! End-to-end tests for pass archive building.
//!
//! Every test reads the produced bytes back with `zip::ZipArchive` and checks
//! entry contents and the parsed `manifest.json`.

use pkpass::{
    sha1_hex, Descriptor, Error, PassBuilder, PassOptions, MANIFEST_JSON, PASS_JSON, SIGNATURE,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Read};
use tempfile::TempDir;
use zip::ZipArchive;

fn open(bytes: &[u8]) -> ZipArchive<Cursor<&[u8]>> {
    ZipArchive::new(Cursor::new(bytes)).expect("archive should be a valid zip")
}

fn entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = open(bytes);
    let mut file = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).unwrap();
    buf
}

fn entry_names(bytes: &[u8]) -> BTreeSet<String> {
    open(bytes).file_names().map(str::to_string).collect()
}

fn manifest(bytes: &[u8]) -> BTreeMap<String, String> {
    serde_json::from_slice(&entry(bytes, MANIFEST_JSON)).expect("manifest.json should parse")
}

fn descriptor() -> serde_json::Value {
    json!({
        "formatVersion": 1,
        "passTypeIdentifier": "pass.com.example.boarding",
        "serialNumber": "E5982H-I2",
        "teamIdentifier": "A93A5CM278",
        "organizationName": "Example Air",
        "description": "Boarding pass",
    })
}

#[test]
fn test_descriptor_only_pass() {
    let expected_pass_json = serde_json::to_vec(&descriptor()).unwrap();
    let mut builder = PassBuilder::new(descriptor()).unwrap();

    let bytes = builder.create_manifest().unwrap();

    assert_eq!(
        entry_names(&bytes),
        BTreeSet::from([PASS_JSON.to_string(), MANIFEST_JSON.to_string()])
    );
    assert_eq!(entry(&bytes, PASS_JSON), expected_pass_json);

    let manifest = manifest(&bytes);
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[PASS_JSON], sha1_hex(&expected_pass_json));
}

#[test]
fn test_manifest_lists_every_hashed_entry() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    builder.add_data("icon.png", b"ICON").unwrap();
    builder.add_data("Logo@2x.png", b"LOGO").unwrap();
    builder.add_data_direct("en.lproj/pass.strings", b"\"GATE\" = \"Gate\";").unwrap();
    builder.add_data_direct("fr.lproj/pass.strings", b"\"GATE\" = \"Porte\";").unwrap();

    let bytes = builder.create_manifest().unwrap();
    let manifest = manifest(&bytes);

    let keys: BTreeSet<_> = manifest.keys().cloned().collect();
    assert_eq!(
        keys,
        BTreeSet::from([
            "en.lproj/pass.strings".to_string(),
            "fr.lproj/pass.strings".to_string(),
            "icon.png".to_string(),
            "logo@2x.png".to_string(),
            PASS_JSON.to_string(),
        ])
    );
    assert_eq!(manifest["logo@2x.png"], sha1_hex(b"LOGO"));
    assert_eq!(manifest["fr.lproj/pass.strings"], sha1_hex(b"\"GATE\" = \"Porte\";"));
    assert!(!manifest.contains_key(MANIFEST_JSON));

    // Names are preserved verbatim in the archive
    assert!(entry_names(&bytes).contains("Logo@2x.png"));
    assert_eq!(entry(&bytes, "en.lproj/pass.strings"), b"\"GATE\" = \"Gate\";");
}

#[test]
fn test_unhashed_entries_never_in_manifest() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    builder.add_unhashed("before.bin", b"early").unwrap();
    builder.add_data("icon.png", b"ICON").unwrap();

    let unsigned = builder.create_manifest().unwrap();
    builder.add_unhashed(SIGNATURE, b"SIGNATURE_BYTES").unwrap();
    let signed = builder.archived_data().unwrap();

    for bytes in [&unsigned, &signed] {
        let manifest = manifest(bytes);
        assert!(!manifest.contains_key("before.bin"));
        assert!(!manifest.contains_key(SIGNATURE));
        assert!(manifest.contains_key("icon.png"));
    }
    assert!(!entry_names(&unsigned).contains(SIGNATURE));
    assert_eq!(entry(&signed, SIGNATURE), b"SIGNATURE_BYTES");
    assert_eq!(entry(&signed, "before.bin"), b"early");
}

#[test]
fn test_signed_archive_keeps_unsigned_content() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    builder.add_data("strip.png", b"STRIP").unwrap();

    let unsigned = builder.create_manifest().unwrap();
    builder.add_unhashed(SIGNATURE, b"SIG").unwrap();
    let signed = builder.archived_data().unwrap();

    let mut expected = entry_names(&unsigned);
    expected.insert(SIGNATURE.to_string());
    assert_eq!(entry_names(&signed), expected);
    assert_eq!(entry(&signed, MANIFEST_JSON), entry(&unsigned, MANIFEST_JSON));
    assert_eq!(entry(&signed, "strip.png"), b"STRIP");
}

#[test]
#[should_panic(expected = "create_manifest called more than once")]
fn test_second_finalize_panics() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    let _first = builder.create_manifest().unwrap();
    let _second = builder.create_manifest();
}

#[test]
fn test_case_variants_share_manifest_key() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    builder.add_data("Icon.png", b"UPPER").unwrap();
    builder.add_data("icon.png", b"lower").unwrap();

    let bytes = builder.create_manifest().unwrap();
    let manifest = manifest(&bytes);

    assert!(!manifest.contains_key("Icon.png"));
    assert_eq!(manifest["icon.png"], sha1_hex(b"lower"));
    assert_eq!(entry(&bytes, "Icon.png"), b"UPPER");
    assert_eq!(entry(&bytes, "icon.png"), b"lower");
}

#[test]
fn test_readding_name_last_write_wins() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    builder.add_data("strip.png", b"first").unwrap();
    builder.add_data("icon.png", b"ICON").unwrap();
    builder.add_data("strip.png", b"second").unwrap();

    let bytes = builder.create_manifest().unwrap();
    let manifest = manifest(&bytes);

    assert_eq!(open(&bytes).len(), 4);
    assert_eq!(entry(&bytes, "strip.png"), b"second");
    assert_eq!(manifest["strip.png"], sha1_hex(b"second"));
    assert_eq!(entry(&bytes, "icon.png"), b"ICON");
}

#[test]
fn test_manifest_bytes_match_archive_entry() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    builder.add_data("icon.png", b"ICON").unwrap();

    let bytes = builder.create_manifest().unwrap();
    assert_eq!(builder.manifest().unwrap(), entry(&bytes, MANIFEST_JSON).as_slice());
}

#[test]
fn test_seal_signs_exact_manifest_bytes() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    builder.add_data("icon.png", b"ICON").unwrap();

    let signer = |manifest: &[u8]| -> pkpass::Result<Vec<u8>> {
        let mut signature = b"SIGNED:".to_vec();
        signature.extend_from_slice(sha1_hex(manifest).as_bytes());
        Ok(signature)
    };
    let bytes = builder.seal(&signer).unwrap();

    let manifest_bytes = entry(&bytes, MANIFEST_JSON);
    let expected = format!("SIGNED:{}", sha1_hex(&manifest_bytes));
    assert_eq!(entry(&bytes, SIGNATURE), expected.as_bytes());
    assert!(!manifest(&bytes).contains_key(SIGNATURE));
}

#[test]
fn test_add_after_finalize() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    builder.create_manifest().unwrap();

    assert!(matches!(builder.add_data("late.png", b"LATE"), Err(Error::Finalized(_))));
    let bytes = builder.archived_data().unwrap();
    assert!(!entry_names(&bytes).contains("late.png"));
}

#[test]
fn test_traversal_names_rejected() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();

    for name in ["../evil.png", "/abs.png", "en.lproj/../../evil", "a\\b.png"] {
        assert!(matches!(
            builder.add_data_direct(name, b"x"),
            Err(Error::InvalidEntryName(_))
        ));
    }

    let bytes = builder.create_manifest().unwrap();
    assert_eq!(entry_names(&bytes).len(), 2);
}

#[test]
fn test_pass_from_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let pass_json = serde_json::to_vec_pretty(&descriptor()).unwrap();
    fs::write(root.join("pass.json"), &pass_json).unwrap();
    fs::write(root.join("icon.png"), b"ICON").unwrap();
    fs::write(root.join("icon@2x.png"), b"ICON2X").unwrap();
    fs::create_dir_all(root.join("de.lproj")).unwrap();
    fs::write(root.join("de.lproj/pass.strings"), b"\"GATE\" = \"Flugsteig\";").unwrap();
    fs::write(root.join("manifest.json"), b"{\"stale\":\"manifest\"}").unwrap();

    let mut builder = PassBuilder::new(Descriptor::File(root.join("pass.json"))).unwrap();
    assert_eq!(builder.add_directory(root).unwrap(), 3);
    let bytes = builder.create_manifest().unwrap();

    // File descriptors are stored byte-for-byte
    assert_eq!(entry(&bytes, PASS_JSON), pass_json);

    let manifest = manifest(&bytes);
    assert_eq!(manifest.len(), 4);
    assert_eq!(manifest["de.lproj/pass.strings"], sha1_hex(b"\"GATE\" = \"Flugsteig\";"));
    assert!(!manifest.contains_key("stale"));
}

#[test]
fn test_stored_compression() {
    let options = PassOptions::new().compression_level(0);
    let mut builder = PassBuilder::with_options(descriptor(), &options).unwrap();
    builder.add_data("icon.png", &[0u8; 4096]).unwrap();

    let bytes = builder.create_manifest().unwrap();
    let mut archive = open(&bytes);
    let file = archive.by_name("icon.png").unwrap();
    assert_eq!(file.compression(), zip::CompressionMethod::Stored);
    assert_eq!(file.compressed_size(), 4096);
}

#[test]
fn test_archive_path_matches_archived_data() {
    let mut builder = PassBuilder::new(descriptor()).unwrap();
    let bytes = builder.create_manifest().unwrap();

    assert_eq!(fs::read(builder.archive_path()).unwrap(), bytes);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_digest_distinguishes_inputs(
        a in proptest::collection::vec(any::<u8>(), 0..256),
        b in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        prop_assert_eq!(sha1_hex(&a), sha1_hex(&a.clone()));
        prop_assert_eq!(sha1_hex(&a) == sha1_hex(&b), a == b);
    }

    #[test]
    fn prop_entries_round_trip(
        files in proptest::collection::btree_map(
            "[a-z]{1,8}(/[a-z]{1,8})?\\.(png|strings)",
            proptest::collection::vec(any::<u8>(), 0..512),
            1..8,
        ),
    ) {
        let mut builder = PassBuilder::new(descriptor()).unwrap();
        for (name, data) in &files {
            if name.contains('/') {
                builder.add_data_direct(name, data).unwrap();
            } else {
                builder.add_data(name, data).unwrap();
            }
        }

        let bytes = builder.create_manifest().unwrap();
        let manifest = manifest(&bytes);

        prop_assert_eq!(manifest.len(), files.len() + 1);
        for (name, data) in &files {
            prop_assert_eq!(&entry(&bytes, name), data);
            prop_assert_eq!(&manifest[name.as_str()], &sha1_hex(data));
        }
    }
}
