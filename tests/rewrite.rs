//! End-to-end tests of archive rewriting on real files.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use zipcyr::{LocalFileReader, NameTranscoder, Rewriter, TranscodeError, ZipParser, rewrite};

mod common;

use common::{BROKEN_UTF16, FixtureEntry, PRIVET_866, build_archive, read_with_zip_crate, write_temp};

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

async fn headers(path: &Path) -> (Vec<zipcyr::ZipFileEntry>, Vec<u8>) {
    let parser = ZipParser::new(Arc::new(LocalFileReader::new(path).unwrap()));
    let directory = parser.read_directory().await.unwrap();
    (directory.entries, directory.comment)
}

// =============================================================================
// Names
// =============================================================================

#[tokio::test]
async fn test_names_become_utf8() {
    let bytes = build_archive(
        &[
            FixtureEntry::new(PRIVET_866, b"hello"),
            FixtureEntry::new(b"readme.txt", b"plain"),
            FixtureEntry::new("папка/файл.txt".as_bytes(), b"already utf-8"),
        ],
        b"",
    );
    let (dir, source) = write_temp("names.zip", &bytes);
    let destination = dir.path().join("names_transcoded.zip");

    let report = rewrite(&source, &destination).await.unwrap();
    assert_eq!(report.len(), 3);

    let entries = read_with_zip_crate(&destination);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names[0], "Привет.txt");
    assert_eq!(report.entries[0].transcoded, "Привет.txt");
    assert_eq!(names[1], "readme.txt");
    assert_eq!(names[2], "папка/файл.txt");
}

#[tokio::test]
async fn test_rewrite_is_idempotent() {
    let bytes = build_archive(
        &[
            FixtureEntry::new(PRIVET_866, b"one"),
            FixtureEntry::new(b"two.txt", b"two"),
        ],
        b"",
    );
    let (dir, source) = write_temp("twice.zip", &bytes);
    let first = dir.path().join("first.zip");
    let second = dir.path().join("second.zip");

    rewrite(&source, &first).await.unwrap();
    let report = rewrite(&first, &second).await.unwrap();

    assert_eq!(report.renamed(), 0);
    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );
}

#[tokio::test]
async fn test_fallback_is_configurable() {
    // "Привет.txt" in windows-1251
    let name = b"\xcf\xf0\xe8\xe2\xe5\xf2.txt";
    let bytes = build_archive(
        &[
            FixtureEntry::new(name, b"x"),
            FixtureEntry::new(b"plain.txt", b"y"),
        ],
        b"",
    );
    let (dir, source) = write_temp("ansi.zip", &bytes);
    let destination = dir.path().join("ansi_transcoded.zip");

    let rewriter = Rewriter::new(NameTranscoder::with_fallback(encoding_rs::WINDOWS_1251));
    let report = rewriter.rewrite(&source, &destination).await.unwrap();
    assert_eq!(report.entries[0].transcoded, "Привет.txt");
    assert_eq!(report.entries[1].transcoded, "plain.txt");
}

// =============================================================================
// Content and headers
// =============================================================================

#[tokio::test]
async fn test_content_and_headers_preserved() {
    let big: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 251) as u8).collect();
    let bytes = build_archive(
        &[
            FixtureEntry::new(PRIVET_866, &big),
            FixtureEntry::new(b"deflated.txt", &big).deflated(),
            FixtureEntry::new(b"dir/", b""),
            FixtureEntry::new(b"noted.txt", b"with comment")
                .with_comment(b"entry comment")
                .with_extra(b"UT\x05\x00\x01\x10\x20\x30\x40"),
        ],
        b"archive comment",
    );
    let (dir, source) = write_temp("content.zip", &bytes);
    let destination = dir.path().join("content_transcoded.zip");

    let report = rewrite(&source, &destination).await.unwrap();

    let (before, _) = headers(&source).await;
    let (after, comment) = headers(&destination).await;
    assert_eq!(before.len(), after.len());
    assert_eq!(comment, b"archive comment");

    for ((old, new), renamed) in before.iter().zip(&after).zip(&report.entries) {
        let mut expected = old.renamed(&renamed.transcoded);
        expected.lfh_offset = new.lfh_offset;
        assert_eq!(&expected, new);
    }

    let entries = read_with_zip_crate(&destination);
    assert_eq!(entries[0].1, big);
    assert_eq!(entries[1].1, big);
    assert!(entries[2].1.is_empty());
    assert_eq!(entries[3].1, b"with comment");
}

#[tokio::test]
async fn test_data_descriptor_entry() {
    let bytes = build_archive(
        &[
            FixtureEntry::new(b"streamed.txt", b"streamed content")
                .deflated()
                .with_data_descriptor(),
            FixtureEntry::new(b"after.txt", b"next"),
        ],
        b"",
    );
    let (dir, source) = write_temp("streamed.zip", &bytes);
    let destination = dir.path().join("streamed_transcoded.zip");

    rewrite(&source, &destination).await.unwrap();

    let entries = read_with_zip_crate(&destination);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].1, b"streamed content");
    assert_eq!(entries[1].1, b"next");
}

#[tokio::test]
async fn test_archive_from_zip_crate() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("made_by_zip.zip");
    {
        let file = std::fs::File::create(&source).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer.start_file("данные.txt", options).unwrap();
        writer.write_all(b"data data data data").unwrap();
        writer.start_file("plain.bin", options).unwrap();
        writer.write_all(&[0u8, 1, 2, 3, 255]).unwrap();
        writer.finish().unwrap();
    }
    let destination = dir.path().join("made_by_zip_transcoded.zip");

    let report = rewrite(&source, &destination).await.unwrap();
    assert_eq!(report.renamed(), 0);

    let entries = read_with_zip_crate(&destination);
    assert_eq!(entries[0].0, "данные.txt");
    assert_eq!(entries[0].1, b"data data data data");
    assert_eq!(entries[1].0, "plain.bin");
    assert_eq!(entries[1].1, [0u8, 1, 2, 3, 255]);
}

#[tokio::test]
async fn test_empty_archive() {
    let (dir, source) = write_temp("empty.zip", &build_archive(&[], b""));
    let destination = dir.path().join("empty_transcoded.zip");

    let report = rewrite(&source, &destination).await.unwrap();
    assert!(report.is_empty());
    assert!(read_with_zip_crate(&destination).is_empty());
}

#[tokio::test]
async fn test_existing_destination_is_overwritten() {
    let bytes = build_archive(&[FixtureEntry::new(b"a.txt", b"a")], b"");
    let (dir, source) = write_temp("a.zip", &bytes);
    let destination = dir.path().join("a_transcoded.zip");
    std::fs::write(&destination, vec![0xAAu8; 100_000]).unwrap();

    rewrite(&source, &destination).await.unwrap();

    assert_eq!(read_with_zip_crate(&destination).len(), 1);
    assert!(std::fs::metadata(&destination).unwrap().len() < 1000);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_bad_name_aborts_run() {
    let bytes = build_archive(
        &[
            FixtureEntry::new(b"first.txt", b"1"),
            FixtureEntry::new(BROKEN_UTF16, b"2"),
            FixtureEntry::new(b"third.txt", b"3"),
        ],
        b"",
    );
    let (dir, source) = write_temp("bad.zip", &bytes);
    let destination = dir.path().join("bad_transcoded.zip");

    let err = rewrite(&source, &destination).await.unwrap_err();
    assert!(err.downcast_ref::<TranscodeError>().is_some());

    // The destination is left unfinished
    let file = std::fs::File::open(&destination).unwrap();
    assert!(zip::ZipArchive::new(file).is_err());

    // and holds the first entry only
    let partial = std::fs::read(&destination).unwrap();
    assert!(contains(&partial, b"first.txt"));
    assert!(!contains(&partial, b"third.txt"));
}

#[tokio::test]
async fn test_crc_mismatch_stops_before_later_entries() {
    let bytes = build_archive(
        &[
            FixtureEntry::new(b"first.txt", b"1"),
            FixtureEntry::new(b"second.txt", b"payload").with_crc(0x1234_5678),
            FixtureEntry::new(b"third.txt", b"3"),
        ],
        b"",
    );
    let (dir, source) = write_temp("stop.zip", &bytes);
    let destination = dir.path().join("stop_transcoded.zip");

    assert!(rewrite(&source, &destination).await.is_err());

    let partial = std::fs::read(&destination).unwrap();
    assert!(contains(&partial, b"first.txt"));
    assert!(!contains(&partial, b"third.txt"));
}

#[tokio::test]
async fn test_crc_mismatch_aborts_run() {
    let bytes = build_archive(
        &[FixtureEntry::new(b"corrupt.txt", b"payload").with_crc(0x1234_5678)],
        b"",
    );
    let (dir, source) = write_temp("corrupt.zip", &bytes);
    let destination = dir.path().join("corrupt_transcoded.zip");

    let err = rewrite(&source, &destination).await.unwrap_err();
    assert!(err.to_string().contains("CRC mismatch"));
}

#[tokio::test]
async fn test_not_a_zip() {
    let (dir, source) = write_temp("junk.zip", b"this is not an archive at all");
    let destination = dir.path().join("junk_transcoded.zip");

    assert!(rewrite(&source, &destination).await.is_err());
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_missing_source() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("missing.zip");
    let destination = dir.path().join("missing_transcoded.zip");

    assert!(rewrite(&source, &destination).await.is_err());
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_truncated_archive() {
    let bytes = build_archive(&[FixtureEntry::new(b"a.txt", b"abcdef")], b"");
    let truncated = bytes[10..].to_vec();
    let (dir, source) = write_temp("truncated.zip", &truncated);
    let destination = dir.path().join("truncated_transcoded.zip");

    assert!(rewrite(&source, &destination).await.is_err());
}
