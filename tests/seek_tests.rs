//! Tests for SeekableIterator
//!
//! These tests verify:
//! - Seeking to present keys returns their first occurrence
//! - Seeking to absent keys lands on the next larger key
//! - Seeking past the end, empty files, header-only files
//! - Unterminated last lines and Windows line endings
//! - Sequential reads across window boundaries
//! - Index-assisted seeks and cache reuse per file identity

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gorseek::index::{generate, generate_with, IndexGranularity};
use gorseek::{
    CacheRegistry, Config, FileSource, Key, MemorySource, SeekError, SeekableIterator,
    SeekableSource,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const HEADER: &str = "CHROM\tPOS\tNUM\tCOL";

/// Tiny windows so that every seek goes through several narrowing steps
fn small_config() -> Config {
    Config::builder()
        .initial_window_size(32)
        .max_window_size(128)
        .max_line_size(4096)
        .build()
}

struct Row {
    chrom: String,
    pos: u64,
    line: String,
}

/// Rows for each chromosome (given in file order), `dups(pos)` copies per position
fn make_rows(chroms: &[&str], positions: u64, dups: impl Fn(u64) -> u64) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut seq = 0;
    for chrom in chroms {
        for pos in 1..=positions {
            for _ in 0..dups(pos) {
                rows.push(Row {
                    chrom: chrom.to_string(),
                    pos,
                    line: format!("{}\t{}\t{}\tc{}", chrom, pos, seq, seq % 7),
                });
                seq += 1;
            }
        }
    }
    rows
}

fn render(rows: &[Row]) -> Vec<u8> {
    let mut data = format!("{}\n", HEADER).into_bytes();
    for row in rows {
        data.extend_from_slice(row.line.as_bytes());
        data.push(b'\n');
    }
    data
}

/// Line of the first row with key >= `key`
fn expected_after<'a>(rows: &'a [Row], key: &Key) -> Option<&'a str> {
    let idx = rows.partition_point(|r| {
        (r.chrom.as_bytes(), r.pos) < (key.chromosome.as_bytes(), key.position)
    });
    rows.get(idx).map(|r| r.line.as_str())
}

fn memory_iter(data: Vec<u8>, registry: &CacheRegistry, config: &Config) -> SeekableIterator {
    let source: Arc<dyn SeekableSource> = Arc::new(MemorySource::new("mem.gor", data));
    SeekableIterator::open(source, None, registry, config).unwrap()
}

fn file_iter(
    path: &Path,
    index: Option<&Path>,
    registry: &CacheRegistry,
    config: &Config,
) -> SeekableIterator {
    let source: Arc<dyn SeekableSource> = Arc::new(FileSource::open(path).unwrap());
    let index = index.map(|p| FileSource::open(p).unwrap());
    let index = index.as_ref().map(|s| s as &dyn SeekableSource);
    SeekableIterator::open(source, index, registry, config).unwrap()
}

fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

fn next_string(iter: &mut SeekableIterator) -> Option<String> {
    iter.next_line()
        .unwrap()
        .map(|line| String::from_utf8(line.to_vec()).unwrap())
}

/// Deterministic pseudo-random sequence
fn shuffled(count: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..count).collect();
    let mut state = seed;
    for i in (1..count).rev() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = (state >> 33) as usize % (i + 1);
        order.swap(i, j);
    }
    order
}

// =============================================================================
// Basic Seek Tests
// =============================================================================

#[test]
fn test_seek_two_chromosomes() {
    let rows = make_rows(&["chr1", "chr2"], 10, |_| 1);
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(render(&rows), &registry, &Config::default());

    assert_eq!(iter.header().as_deref(), Some(HEADER));

    assert!(iter.seek(&Key::new("chr1", 5)).unwrap());
    assert!(next_string(&mut iter).unwrap().starts_with("chr1\t5\t"));

    // chr10 sorts after every chr1 row and before chr2
    assert!(iter.seek(&Key::new("chr10", 1)).unwrap());
    assert!(next_string(&mut iter).unwrap().starts_with("chr2\t1\t"));

    assert!(iter.seek(&Key::new("chr1", 1)).unwrap());
    assert!(next_string(&mut iter).unwrap().starts_with("chr1\t1\t"));
}

#[test]
fn test_every_key_finds_first_duplicate() {
    let rows = make_rows(&["chr1", "chr10", "chr2"], 60, |pos| pos % 4 + 1);
    let registry = CacheRegistry::default();
    let config = small_config();
    let mut iter = memory_iter(render(&rows), &registry, &config);

    let keys: Vec<Key> = rows.iter().map(|r| Key::new(r.chrom.clone(), r.pos)).collect();
    for i in shuffled(keys.len(), 7) {
        let key = &keys[i];
        assert!(iter.seek(key).unwrap(), "seek {}", key);
        assert_eq!(
            next_string(&mut iter).as_deref(),
            expected_after(&rows, key),
            "seek {}",
            key
        );
    }
}

#[test]
fn test_absent_keys_land_on_next_key() {
    let rows = make_rows(&["chr1", "chr3"], 40, |pos| if pos % 2 == 0 { 2 } else { 0 });
    let registry = CacheRegistry::default();
    let config = small_config();
    let mut iter = memory_iter(render(&rows), &registry, &config);

    for chrom in ["chr0", "chr1", "chr2", "chr3"] {
        for pos in (1..40).step_by(2) {
            let key = Key::new(chrom, pos);
            let expected = expected_after(&rows, &key);
            assert_eq!(iter.seek(&key).unwrap(), expected.is_some(), "seek {}", key);
            assert_eq!(next_string(&mut iter).as_deref(), expected, "seek {}", key);
        }
    }
}

#[test]
fn test_seek_past_end() {
    let rows = make_rows(&["chr1"], 20, |_| 1);
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(render(&rows), &registry, &small_config());

    assert!(!iter.seek(&Key::new("chr1", 21)).unwrap());
    assert!(!iter.has_next());
    assert!(iter.next_line().unwrap().is_none());

    // The iterator stays usable
    assert!(iter.seek(&Key::new("chr1", 20)).unwrap());
    assert!(next_string(&mut iter).unwrap().starts_with("chr1\t20\t"));
    assert!(!iter.has_next());
}

#[test]
fn test_repeated_seek_is_idempotent() {
    let rows = make_rows(&["chr1", "chr2"], 80, |pos| pos % 3 + 1);
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(render(&rows), &registry, &small_config());

    for pos in [1, 17, 40, 80] {
        let key = Key::new("chr2", pos);
        assert!(iter.seek(&key).unwrap());
        let first = next_string(&mut iter);
        let size = iter.cache().len();

        assert!(iter.seek(&key).unwrap());
        assert_eq!(next_string(&mut iter), first);
        assert!(iter.seek(&key).unwrap());
        assert_eq!(next_string(&mut iter), first);
        assert_eq!(iter.cache().len(), size);
    }
}

// =============================================================================
// Sequential Read Tests
// =============================================================================

#[test]
fn test_scan_whole_file_without_seek() {
    let rows = make_rows(&["chr1", "chr2"], 50, |pos| pos % 2 + 1);
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(render(&rows), &registry, &small_config());

    let mut lines = Vec::new();
    while let Some(line) = next_string(&mut iter) {
        lines.push(line);
    }
    let expected: Vec<&str> = rows.iter().map(|r| r.line.as_str()).collect();
    assert_eq!(lines, expected);
}

#[test]
fn test_read_on_after_seek_crosses_windows() {
    let rows = make_rows(&["chr1", "chr2", "chr3"], 50, |_| 1);
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(render(&rows), &registry, &small_config());

    assert!(iter.seek(&Key::new("chr2", 25)).unwrap());
    let start = rows
        .iter()
        .position(|r| r.chrom == "chr2" && r.pos == 25)
        .unwrap();
    for row in &rows[start..] {
        assert_eq!(next_string(&mut iter).as_deref(), Some(row.line.as_str()));
    }
    assert!(!iter.has_next());
    assert!(next_string(&mut iter).is_none());
}

#[test]
fn test_peek_key_does_not_consume() {
    let rows = make_rows(&["chr1"], 5, |_| 1);
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(render(&rows), &registry, &Config::default());

    assert!(iter.seek(&Key::new("chr1", 3)).unwrap());
    assert_eq!(iter.peek_key().unwrap(), Some(Key::new("chr1", 3)));
    assert!(next_string(&mut iter).unwrap().starts_with("chr1\t3\t"));
}

// =============================================================================
// Edge Case Tests
// =============================================================================

#[test]
fn test_empty_file() {
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(Vec::new(), &registry, &Config::default());

    assert_eq!(iter.header().as_deref(), Some(""));
    assert!(!iter.has_next());
    assert!(!iter.seek(&Key::new("chr1", 1)).unwrap());
    assert!(iter.next_line().unwrap().is_none());
}

#[test]
fn test_header_only_file() {
    let registry = CacheRegistry::default();
    for data in [b"CHROM\tPOS\n".to_vec(), b"CHROM\tPOS".to_vec()] {
        let mut iter = memory_iter(data, &registry, &Config::default());
        assert_eq!(iter.header().as_deref(), Some("CHROM\tPOS"));
        assert!(!iter.has_next());
        assert!(!iter.seek(&Key::new("chr1", 1)).unwrap());
    }
}

#[test]
fn test_metadata_lines_before_header() {
    let data = b"##fileformat=GOR\n##source=test\nCHROM\tPOS\nchr1\t1\nchr1\t2\n".to_vec();
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(data, &registry, &Config::default());

    assert_eq!(iter.header().as_deref(), Some("CHROM\tPOS"));
    assert!(iter.seek(&Key::new("chr1", 2)).unwrap());
    assert_eq!(next_string(&mut iter).as_deref(), Some("chr1\t2"));
}

#[test]
fn test_header_spanning_several_windows() {
    let metadata = format!("##note={}\n", "m".repeat(100));
    let header = format!("CHROM\tPOS\t{}", "H".repeat(70));
    let data = format!("{}{}\nchr1\t1\tx\nchr1\t2\ty\n", metadata, header).into_bytes();
    let data_start = (metadata.len() + header.len() + 1) as u64;
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(data, &registry, &small_config());

    assert_eq!(iter.header().as_deref(), Some(header.as_str()));
    assert_eq!(iter.data_start(), data_start);

    // The iterator works on the registered cache from the start
    let shared = registry.peek("mem.gor").unwrap();
    assert!(Arc::ptr_eq(iter.cache(), &shared));
    assert_eq!(shared.data_start(), data_start);

    assert!(iter.seek(&Key::new("chr1", 2)).unwrap());
    assert_eq!(next_string(&mut iter).as_deref(), Some("chr1\t2\ty"));
}

#[test]
fn test_no_header() {
    let registry = CacheRegistry::default();
    let config = Config::builder().has_header(false).build();
    let mut iter = memory_iter(b"chr1\t1\tx\nchr1\t2\ty\n".to_vec(), &registry, &config);

    assert!(iter.header().is_none());
    assert_eq!(next_string(&mut iter).as_deref(), Some("chr1\t1\tx"));
    assert!(iter.seek(&Key::new("chr1", 1)).unwrap());
    assert_eq!(next_string(&mut iter).as_deref(), Some("chr1\t1\tx"));
}

#[test]
fn test_last_line_without_terminator() {
    let mut data = render(&make_rows(&["chr1"], 30, |_| 1));
    data.extend_from_slice(b"chr1\t31\tlast");
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(data, &registry, &small_config());

    assert!(iter.seek(&Key::new("chr1", 31)).unwrap());
    assert_eq!(next_string(&mut iter).as_deref(), Some("chr1\t31\tlast"));
    assert!(!iter.has_next());

    assert!(iter.seek(&Key::new("chr1", 30)).unwrap());
    assert!(next_string(&mut iter).unwrap().starts_with("chr1\t30\t"));
    assert_eq!(next_string(&mut iter).as_deref(), Some("chr1\t31\tlast"));
}

#[test]
fn test_windows_line_endings() {
    let rows = make_rows(&["chr1", "chr2"], 20, |_| 1);
    let text = String::from_utf8(render(&rows)).unwrap().replace('\n', "\r\n");
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(text.into_bytes(), &registry, &small_config());

    assert_eq!(iter.header().as_deref(), Some(HEADER));
    let key = Key::new("chr2", 7);
    assert!(iter.seek(&key).unwrap());
    assert_eq!(next_string(&mut iter).as_deref(), expected_after(&rows, &key));
}

#[test]
fn test_long_lines_grow_the_window() {
    let rows: Vec<Row> = (1..=20u64)
        .map(|pos| Row {
            chrom: "chr1".to_string(),
            pos,
            line: format!("chr1\t{}\t{}", pos, "g".repeat(300 + pos as usize)),
        })
        .collect();
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(render(&rows), &registry, &small_config());

    for pos in [1, 9, 20, 2, 15] {
        let key = Key::new("chr1", pos);
        assert!(iter.seek(&key).unwrap());
        assert_eq!(next_string(&mut iter).as_deref(), expected_after(&rows, &key));
    }
}

#[test]
fn test_line_over_max_size_is_data_error() {
    let mut data = format!("{}\n", HEADER).into_bytes();
    data.extend_from_slice(format!("chr1\t1\t{}\n", "n".repeat(10_000)).as_bytes());
    data.extend_from_slice(b"chr1\t2\tx\n");
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(data, &registry, &small_config());

    let err = iter.seek(&Key::new("chr1", 2)).unwrap_err();
    assert!(err.is_data_error());
}

#[test]
fn test_malformed_key_is_data_error() {
    let data = format!("{}\nchr1\t1\tx\nchr1\tX\ty\nchr1\t3\tz\n", HEADER).into_bytes();
    let registry = CacheRegistry::default();
    let mut iter = memory_iter(data, &registry, &Config::default());

    assert!(matches!(
        iter.seek(&Key::new("chr1", 2)),
        Err(SeekError::DataFormat(_))
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let registry = CacheRegistry::default();
    let config = Config::builder().initial_window_size(0).build();
    let source: Arc<dyn SeekableSource> = Arc::new(MemorySource::new("x", Vec::new()));
    assert!(matches!(
        SeekableIterator::open(source, None, &registry, &config),
        Err(SeekError::Config(_))
    ));
}

// =============================================================================
// Index and Cache Tests
// =============================================================================

#[test]
fn test_full_index_gives_exact_brackets() {
    let dir = TempDir::new().unwrap();
    let rows = make_rows(&["chr1", "chr11", "chr2"], 40, |pos| pos % 3 + 1);
    let path = write_file(&dir, "data.gor", &render(&rows));
    let index_path = generate(&path, IndexGranularity::Full).unwrap();

    let config = small_config();
    let indexed_registry = CacheRegistry::default();
    let plain_registry = CacheRegistry::default();
    let mut indexed = file_iter(&path, Some(&index_path), &indexed_registry, &config);
    let mut unindexed = file_iter(&path, None, &plain_registry, &config);

    assert!(indexed.cache().is_index_loaded());
    let entries = indexed.cache().entries();
    assert_eq!(entries.len(), 120);

    for (key, _) in &entries {
        let (_, upper) = indexed.cache().bracket(key);
        assert_eq!(upper.key.as_ref(), Some(key));

        assert!(indexed.seek(key).unwrap());
        assert!(unindexed.seek(key).unwrap());
        let expected = expected_after(&rows, key);
        assert_eq!(next_string(&mut indexed).as_deref(), expected);
        assert_eq!(next_string(&mut unindexed).as_deref(), expected);
    }
}

#[test]
fn test_chromosome_index_falls_back_to_search() {
    let dir = TempDir::new().unwrap();
    let rows = make_rows(&["chr1", "chr10", "chr2", "chrX"], 50, |pos| pos % 2 + 1);
    let path = write_file(&dir, "data.gor", &render(&rows));
    let index_path = dir.path().join("data.chrom.gori");
    let config = small_config();
    assert_eq!(
        generate_with(&path, &index_path, IndexGranularity::Chromosome, &config).unwrap(),
        4
    );

    let registry = CacheRegistry::default();
    let mut iter = file_iter(&path, Some(&index_path), &registry, &config);
    assert_eq!(iter.cache().len(), 4);

    for i in shuffled(rows.len(), 3).into_iter().take(80) {
        let key = Key::new(rows[i].chrom.clone(), rows[i].pos);
        assert!(iter.seek(&key).unwrap());
        assert_eq!(next_string(&mut iter).as_deref(), expected_after(&rows, &key));
    }
}

#[test]
fn test_seeks_refine_the_shared_cache() {
    let dir = TempDir::new().unwrap();
    let rows = make_rows(&["chr1"], 200, |_| 1);
    let path = write_file(&dir, "data.gor", &render(&rows));
    let registry = CacheRegistry::default();
    let config = small_config();

    let mut first = file_iter(&path, None, &registry, &config);
    assert!(first.cache().is_empty());
    assert!(first.seek(&Key::new("chr1", 120)).unwrap());
    let learned = first.cache().len();
    assert!(learned > 0);

    // A second iterator on the same file starts from what the first learned
    let mut second = file_iter(&path, None, &registry, &config);
    assert!(Arc::ptr_eq(first.cache(), second.cache()));
    assert!(second.seek(&Key::new("chr1", 121)).unwrap());
    assert!(next_string(&mut second).unwrap().starts_with("chr1\t121\t"));
    assert_eq!(registry.num_files(), 1);
}

#[test]
fn test_changed_file_gets_fresh_cache() {
    let dir = TempDir::new().unwrap();
    let rows = make_rows(&["chr1"], 50, |_| 1);
    let path = write_file(&dir, "data.gor", &render(&rows));
    let registry = CacheRegistry::default();
    let config = small_config();

    let mut before = file_iter(&path, None, &registry, &config);
    assert!(before.seek(&Key::new("chr1", 25)).unwrap());

    // Rewrite with different content and length
    let rows = make_rows(&["chr1"], 50, |_| 2);
    fs::write(&path, render(&rows)).unwrap();

    let mut after = file_iter(&path, None, &registry, &config);
    assert!(!Arc::ptr_eq(before.cache(), after.cache()));
    let key = Key::new("chr1", 25);
    assert!(after.seek(&key).unwrap());
    assert_eq!(next_string(&mut after).as_deref(), expected_after(&rows, &key));
}

#[test]
fn test_unidentified_source_is_not_shared() {
    let rows = make_rows(&["chr1"], 10, |_| 1);
    let registry = CacheRegistry::default();
    let config = Config::default();
    let open = || {
        let source: Arc<dyn SeekableSource> =
            Arc::new(MemorySource::without_unique_id("anon.gor", render(&rows)));
        SeekableIterator::open(source, None, &registry, &config).unwrap()
    };

    let mut a = open();
    assert!(a.seek(&Key::new("chr1", 5)).unwrap());
    let b = open();
    assert!(!Arc::ptr_eq(a.cache(), b.cache()));
    assert!(b.cache().is_empty());
    assert_eq!(registry.num_files(), 0);
}
