//! End-to-end extraction of synthetic HPI archives.

mod common;

use common::{ChunkSpec, Node, build_archive, dir, file};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use unhpi::{HpiError, HpiExtractor, LocalFileReader, MemoryReader};

fn sample_data(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

async fn open(archive: Vec<u8>) -> HpiExtractor<MemoryReader> {
    HpiExtractor::open(Arc::new(MemoryReader::new(archive))).await.unwrap()
}

#[tokio::test]
async fn raw_file_in_unencrypted_archive() {
    let payload = b"[UNITINFO]\n{\n\tUnitName=ARMCOM;\n}\n".to_vec();
    let archive = build_archive(0, vec![file("armcom.fbi", vec![ChunkSpec::stored(&payload)])]);

    let extractor = open(archive).await;
    assert_eq!(extractor.header().derived_key(), 0);

    let out = tempfile::tempdir().unwrap();
    let summary = extractor.extract_all(out.path()).await.unwrap();
    assert_eq!(summary.files, 1);
    assert_eq!(summary.bytes, payload.len() as u64);

    assert_eq!(fs::read(out.path().join("armcom.fbi")).unwrap(), payload);
}

#[tokio::test]
async fn two_level_tree_creates_one_dir_and_one_file() {
    let archive = build_archive(
        0,
        vec![dir("units", vec![file("corcom.fbi", vec![ChunkSpec::stored(b"corcom")])])],
    );

    let out = tempfile::tempdir().unwrap();
    open(archive).await.extract_all(out.path()).await.unwrap();

    let top: Vec<_> = fs::read_dir(out.path()).unwrap().map(|e| e.unwrap()).collect();
    assert_eq!(top.len(), 1);
    assert!(top[0].file_type().unwrap().is_dir());
    assert_eq!(top[0].file_name(), "units");

    let inner: Vec<_> = fs::read_dir(top[0].path()).unwrap().map(|e| e.unwrap()).collect();
    assert_eq!(inner.len(), 1);
    assert!(inner[0].file_type().unwrap().is_file());
    assert_eq!(inner[0].path(), out.path().join("units").join("corcom.fbi"));
    assert_eq!(fs::read(inner[0].path()).unwrap(), b"corcom");
}

#[tokio::test]
async fn encrypted_archive_with_every_chunk_kind() {
    let big = sample_data(65536 + 100, 7);
    let small = sample_data(300, 99);
    let archive = build_archive(
        0x7D,
        vec![
            dir(
                "anims",
                vec![
                    file(
                        "armcom.gaf",
                        vec![ChunkSpec::zlib(&big[..65536]), ChunkSpec::lz_literals(&big[65536..])],
                    ),
                    dir("empty", vec![]),
                ],
            ),
            file("sidedata.tdf", vec![ChunkSpec::stored(&small).encrypted()]),
            file("cormex.fbi", vec![ChunkSpec::lz_literals(&small[..64]).encrypted()]),
        ],
    );

    let extractor = open(archive).await;
    assert_eq!(extractor.header().derived_key(), ((0x7Du32 << 2) | (0x7D >> 6)) as u8);

    let paths: Vec<_> = extractor
        .list_files()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(paths, ["anims/armcom.gaf", "sidedata.tdf", "cormex.fbi"]);

    let out = tempfile::tempdir().unwrap();
    let summary = extractor.extract_all(out.path()).await.unwrap();
    assert_eq!(summary.files, 3);

    assert_eq!(fs::read(out.path().join("anims/armcom.gaf")).unwrap(), big);
    assert_eq!(fs::read(out.path().join("sidedata.tdf")).unwrap(), small);
    assert_eq!(fs::read(out.path().join("cormex.fbi")).unwrap(), &small[..64]);
    // directories without files are not created
    assert!(!out.path().join("anims/empty").exists());
}

#[tokio::test]
async fn unknown_method_keeps_only_completed_chunks() {
    let first = sample_data(65536, 1);
    let bad = ChunkSpec {
        method: 3,
        encrypted: false,
        payload: b"????".to_vec(),
        decompressed_size: 4,
    };
    let archive = build_archive(0x31, vec![file("broken.pcx", vec![ChunkSpec::stored(&first), bad])]);

    let extractor = open(archive).await;
    let entries = extractor.list_files().await.unwrap();
    assert_eq!(entries[0].data.chunk_count(), 2);

    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("broken.pcx");
    let err = extractor.extract_to_file(&entries[0], &target).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HpiError>(),
        Some(HpiError::UnknownCompressionMethod(3))
    ));

    assert_eq!(fs::read(&target).unwrap(), first);
}

#[tokio::test]
async fn extract_to_memory_writer() {
    let text = sample_data(5000, 42);
    let archive = build_archive(0x55, vec![file("gamedata.tdf", vec![ChunkSpec::zlib(&text)])]);

    let extractor = open(archive).await;
    let entry = &extractor.list_files().await.unwrap()[0];

    let mut sink = Vec::new();
    let written = extractor.extract_to_writer(entry, &mut sink).await.unwrap();
    assert_eq!(written, text.len() as u64);
    assert_eq!(sink, text);
}

#[tokio::test]
async fn empty_file_is_created() {
    let archive = build_archive(0x12, vec![file("blank.txt", vec![])]);

    let out = tempfile::tempdir().unwrap();
    open(archive).await.extract_all(out.path()).await.unwrap();
    assert_eq!(fs::read(out.path().join("blank.txt")).unwrap(), b"");
}

#[tokio::test]
async fn bad_marker_is_rejected() {
    let mut archive = build_archive(0, vec![file("a", vec![ChunkSpec::stored(b"a")])]);
    archive[..4].copy_from_slice(b"HAPX");

    let err = HpiExtractor::open(Arc::new(MemoryReader::new(archive)))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<HpiError>(),
        Some(HpiError::InvalidMagic { .. })
    ));
}

#[tokio::test]
async fn truncated_archive_fails_on_chunk_read() {
    let mut archive = build_archive(0x40, vec![file("big.bin", vec![ChunkSpec::stored(&sample_data(1000, 3))])]);
    archive.truncate(archive.len() - 10);

    let extractor = open(archive).await;
    let entry = &extractor.list_files().await.unwrap()[0];
    let err = extractor.extract_to_writer(entry, &mut Vec::<u8>::new()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HpiError>(),
        Some(HpiError::ReadOutOfRange { .. })
    ));
}

#[tokio::test]
async fn directory_region_past_end_is_rejected() {
    let archive = build_archive(0, vec![file("a", vec![ChunkSpec::stored(b"a")])]);
    let directory_size = u32::from_le_bytes(archive[8..12].try_into().unwrap()) as usize;

    let err = HpiExtractor::open(Arc::new(MemoryReader::new(archive[..directory_size - 1].to_vec())))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<HpiError>(),
        Some(HpiError::DirectoryRegionOutOfRange { .. })
    ));
}

#[tokio::test]
async fn local_file_source() {
    let payload = sample_data(70000, 9);
    let archive = build_archive(
        0xA3,
        vec![dir(
            "textures",
            vec![file(
                "logos.gaf",
                vec![ChunkSpec::lz_literals(&payload[..65536]), ChunkSpec::zlib(&payload[65536..])],
            )],
        )],
    );

    let src = tempfile::NamedTempFile::new().unwrap();
    fs::write(src.path(), &archive).unwrap();

    let reader = Arc::new(LocalFileReader::new(src.path()).unwrap());
    let extractor = HpiExtractor::open(reader).await.unwrap();

    let out = tempfile::tempdir().unwrap();
    extractor.extract_all(out.path()).await.unwrap();
    assert_eq!(fs::read(out.path().join("textures/logos.gaf")).unwrap(), payload);
}

#[tokio::test]
async fn corrupt_chunk_size_table_is_a_format_error() {
    let chunks: Vec<_> = (0..256).map(|i| ChunkSpec::stored(&[i as u8])).collect();
    let archive = build_archive(
        0,
        vec![Node::File {
            name: "huge.bin".to_string(),
            file_size: 256 * 65536,
            chunks,
        }],
    );

    let extractor = open(archive.clone()).await;
    let entry = extractor.list_files().await.unwrap().remove(0);
    assert_eq!(entry.data.chunk_count(), 256);

    // every chunk claims u32::MAX bytes, about a terabyte in total
    let mut archive = archive;
    let table = entry.data.data_offset as usize;
    archive[table..table + 256 * 4].fill(0xFF);

    let extractor = open(archive).await;
    let err = extractor
        .extract_to_writer(&entry, &mut Vec::<u8>::new())
        .await
        .unwrap_err();
    match err.downcast_ref::<HpiError>() {
        Some(HpiError::ReadOutOfRange { offset, len, .. }) => {
            assert_eq!(*offset, table as u64 + 1024);
            assert_eq!(*len, 256 * u64::from(u32::MAX));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn first_error_stops_extract_all_and_keeps_earlier_files() {
    let bad = ChunkSpec {
        method: 9,
        encrypted: false,
        payload: b"??".to_vec(),
        decompressed_size: 2,
    };
    let archive = build_archive(
        0x66,
        vec![
            file("first.txt", vec![ChunkSpec::stored(b"kept on disk")]),
            file("second.txt", vec![bad]),
            file("third.txt", vec![ChunkSpec::stored(b"never reached")]),
        ],
    );

    let out = tempfile::tempdir().unwrap();
    let err = open(archive).await.extract_all(out.path()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HpiError>(),
        Some(HpiError::UnknownCompressionMethod(9))
    ));

    assert_eq!(fs::read(out.path().join("first.txt")).unwrap(), b"kept on disk");
    assert_eq!(fs::read(out.path().join("second.txt")).unwrap(), b"");
    assert!(!out.path().join("third.txt").exists());
}
