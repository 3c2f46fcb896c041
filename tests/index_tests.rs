//! Tests for sparse index generation and loading
//!
//! These tests verify:
//! - Exact index bytes for both granularities
//! - Failed generation leaves no index behind
//! - Blank data lines are errors for generation and seeking alike
//! - Loading checks the format version and entry order

use std::fs;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use gorseek::index::{generate, generate_with, index_path_for, load, IndexGranularity};
use gorseek::{CacheRegistry, Config, FileSource, Key, SeekError, SeekableIterator, SeekableSource};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// 10-byte header, then lines of 9 bytes (chr1, chr2) and 10 bytes (chr10)
const DATA: &str = "CHROM\tPOS\n\
chr1\t1\tx\n\
chr1\t2\tx\n\
chr1\t3\tx\n\
chr10\t5\tx\n\
chr10\t6\tx\n\
chr2\t1\tx\n\
chr2\t2\tx\n";

fn write_data(dir: &TempDir, data: &str) -> PathBuf {
    let path = dir.path().join("data.gor");
    fs::write(&path, data).unwrap();
    path
}

// =============================================================================
// Generation Tests
// =============================================================================

#[test]
fn test_chromosome_index_bytes() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, DATA);

    let index_path = generate(&path, IndexGranularity::Chromosome).unwrap();
    assert_eq!(index_path, index_path_for(&path));
    assert_eq!(
        fs::read_to_string(&index_path).unwrap(),
        "## fileformat=GORIv2\nchr1\t1\t19\nchr10\t5\t47\nchr2\t1\t66\n"
    );
}

#[test]
fn test_full_index_bytes() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, DATA);

    let index_path = generate(&path, IndexGranularity::Full).unwrap();
    assert_eq!(
        fs::read_to_string(&index_path).unwrap(),
        "## fileformat=GORIv2\n\
         chr1\t1\t19\nchr1\t2\t28\nchr1\t3\t37\n\
         chr10\t5\t47\nchr10\t6\t57\n\
         chr2\t1\t66\nchr2\t2\t75\n"
    );
}

#[test]
fn test_full_index_skips_repeated_keys() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, "H\nchr1\t1\ta\nchr1\t1\tb\nchr1\t2\tc\n");

    let index_path = generate(&path, IndexGranularity::Full).unwrap();
    assert_eq!(
        fs::read_to_string(&index_path).unwrap(),
        "## fileformat=GORIv2\nchr1\t1\t11\nchr1\t2\t29\n"
    );
}

#[test]
fn test_empty_file_gives_header_only_index() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, "");

    let index_path = generate(&path, IndexGranularity::Full).unwrap();
    assert_eq!(fs::read_to_string(&index_path).unwrap(), "## fileformat=GORIv2\n");
}

#[test]
fn test_headerless_file() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, "chr1\t1\tx\nchr1\t2\tx\n");
    let index_path = dir.path().join("out.gori");
    let config = Config::builder().has_header(false).build();

    assert_eq!(
        generate_with(&path, &index_path, IndexGranularity::Full, &config).unwrap(),
        2
    );
    assert_eq!(
        fs::read_to_string(&index_path).unwrap(),
        "## fileformat=GORIv2\nchr1\t1\t9\nchr1\t2\t18\n"
    );
}

#[test]
fn test_unsorted_file_leaves_no_index() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, "CHROM\tPOS\nchr2\t1\tx\nchr1\t1\tx\n");
    let index_path = index_path_for(&path);

    let err = generate(&path, IndexGranularity::Full).unwrap_err();
    assert!(matches!(err, SeekError::DataFormat(_)));
    assert!(!index_path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_blank_trailing_line_is_data_error() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, "CHROM\tPOS\nchr1\t1\ta\nchr1\t2\tb\n\n");

    let err = generate(&path, IndexGranularity::Full).unwrap_err();
    assert!(matches!(err, SeekError::DataFormat(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

    // Seeking through the same file reports it the same way
    let source: Arc<dyn SeekableSource> = Arc::new(FileSource::open(&path).unwrap());
    let registry = CacheRegistry::default();
    let mut iter = SeekableIterator::open(source, None, &registry, &Config::default()).unwrap();
    assert!(matches!(
        iter.seek(&Key::new("chr1", 3)),
        Err(SeekError::DataFormat(_))
    ));
}

#[test]
fn test_failed_generation_keeps_previous_index() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, "CHROM\tPOS\nchr1\t5\tx\nchr1\t4\tx\n");
    let index_path = index_path_for(&path);
    fs::write(&index_path, "previous").unwrap();

    assert!(generate(&path, IndexGranularity::Chromosome).is_err());
    assert_eq!(fs::read_to_string(&index_path).unwrap(), "previous");
}

// =============================================================================
// Loading Tests
// =============================================================================

#[test]
fn test_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = write_data(&dir, DATA);
    let index_path = generate(&path, IndexGranularity::Full).unwrap();

    let reader = BufReader::new(fs::File::open(&index_path).unwrap());
    let cache = load(reader, 10, DATA.len() as u64, 100).unwrap();
    assert!(cache.is_index_loaded());
    assert_eq!(cache.len(), 7);

    let (lower, upper) = cache.bracket(&Key::new("chr10", 6));
    assert_eq!(lower.key, Some(Key::new("chr10", 5)));
    assert_eq!(lower.offset, 47);
    assert_eq!(upper.key, Some(Key::new("chr10", 6)));
    assert_eq!(upper.offset, 57);
}

#[test]
fn test_load_rejects_other_versions() {
    let text = "## fileformat=GORIv1\nchr1\t1\t10\n";
    let err = load(text.as_bytes(), 0, 100, 10).unwrap_err();
    assert!(matches!(err, SeekError::Index(_)));

    let text = "chr1\t1\t10\n";
    assert!(matches!(load(text.as_bytes(), 0, 100, 10), Err(SeekError::Index(_))));
}

#[test]
fn test_load_rejects_bad_entries() {
    let unordered = "## fileformat=GORIv2\nchr1\t2\t20\nchr1\t1\t10\n";
    assert!(matches!(load(unordered.as_bytes(), 0, 100, 10), Err(SeekError::Index(_))));

    let short = "## fileformat=GORIv2\nchr1\t2\n";
    assert!(matches!(load(short.as_bytes(), 0, 100, 10), Err(SeekError::Index(_))));
}
