//! gorseek CLI
//!
//! Index, compress and seek in sorted genomic files.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gorseek::gorz::{is_gorz_path, BlockCompression, GorzWriter};
use gorseek::index::{generate_with, index_path_for};
use gorseek::{
    CacheRegistry, Config, FileSource, GorzSeekableIterator, IndexGranularity, Key, KeyLayout,
    SeekableIterator, SeekableSource,
};
use tracing_subscriber::{fmt, EnvFilter};

/// gorseek
#[derive(Parser, Debug)]
#[command(name = "gorseek")]
#[command(about = "Random-access seek in sorted genomic files")]
#[command(version)]
struct Args {
    /// Plain files have no header line
    #[arg(long, global = true)]
    no_header: bool,

    /// Zero-based column of the chromosome
    #[arg(long, global = true, default_value = "0")]
    chrom_col: usize,

    /// Zero-based column of the position
    #[arg(long, global = true, default_value = "1")]
    pos_col: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a sparse index for a sorted file
    Index {
        /// Data file (plain or .gorz)
        file: PathBuf,

        /// full | chromosome
        #[arg(short, long, default_value = "full")]
        granularity: IndexGranularity,

        /// Index path (defaults to <file>.gori)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Block-compress a sorted file
    Compress {
        /// Sorted plain input file
        input: PathBuf,

        /// Output .gorz file
        output: PathBuf,

        /// Use zstd instead of zlib
        #[arg(long)]
        zstd: bool,

        /// Also write <output>.gori with this granularity
        #[arg(long)]
        index: Option<IndexGranularity>,
    },

    /// Print lines starting at the first key >= chrom:pos
    Seek {
        /// Data file (plain or .gorz)
        file: PathBuf,

        /// Chromosome
        chrom: String,

        /// Position
        pos: u64,

        /// Number of lines to print
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Index file (defaults to <file>.gori when present)
        #[arg(short, long)]
        index: Option<PathBuf>,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gorseek=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .has_header(!args.no_header)
        .layout(KeyLayout::new(args.chrom_col, args.pos_col))
        .build();

    let result = match args.command {
        Commands::Index {
            file,
            granularity,
            output,
        } => run_index(&file, granularity, output, &config),
        Commands::Compress {
            input,
            output,
            zstd,
            index,
        } => run_compress(&input, &output, zstd, index, &config),
        Commands::Seek {
            file,
            chrom,
            pos,
            count,
            index,
        } => run_seek(&file, Key::new(chrom, pos), count, index, &config),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run_index(
    file: &Path,
    granularity: IndexGranularity,
    output: Option<PathBuf>,
    config: &Config,
) -> gorseek::Result<()> {
    let output = output.unwrap_or_else(|| index_path_for(file));
    let entries = generate_with(file, &output, granularity, config)?;
    tracing::info!("Wrote {} entries to {}", entries, output.display());
    Ok(())
}

fn run_compress(
    input: &Path,
    output: &Path,
    zstd: bool,
    index: Option<IndexGranularity>,
    config: &Config,
) -> gorseek::Result<()> {
    let compression = if zstd {
        BlockCompression::Zstd
    } else {
        BlockCompression::Zlib
    };
    let mut writer = GorzWriter::create(output, compression, index)?.with_layout(config.layout);
    let mut reader = BufReader::new(File::open(input)?);

    let mut line = String::new();
    let mut in_header = config.has_header;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if in_header {
            if !line.starts_with("##") {
                writer.set_header(&line)?;
                in_header = false;
            }
            continue;
        }
        writer.write_line(line.trim_end_matches(['\n', '\r']).as_bytes())?;
    }

    let blocks = writer.blocks_written();
    writer.finish()?;
    tracing::info!("Wrote {} blocks to {}", blocks, output.display());
    Ok(())
}

fn run_seek(
    file: &Path,
    key: Key,
    count: usize,
    index: Option<PathBuf>,
    config: &Config,
) -> gorseek::Result<()> {
    let source: Arc<dyn SeekableSource> = Arc::new(FileSource::open(file)?);
    let index_path = index.or_else(|| Some(index_path_for(file)).filter(|p| p.exists()));
    let index_source = index_path.map(FileSource::open).transpose()?;
    let index_source = index_source.as_ref().map(|s| s as &dyn SeekableSource);

    let registry = CacheRegistry::new(config);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if is_gorz_path(file) {
        let mut iter = GorzSeekableIterator::open(source, index_source, &registry, config)?;
        writeln!(out, "{}", iter.header())?;
        if iter.seek(&key)? {
            for _ in 0..count {
                match iter.next_line()? {
                    Some(line) => {
                        out.write_all(line)?;
                        out.write_all(b"\n")?;
                    }
                    None => break,
                }
            }
        }
    } else {
        let mut iter = SeekableIterator::open(source, index_source, &registry, config)?;
        if let Some(header) = iter.header_bytes() {
            out.write_all(header)?;
            out.write_all(b"\n")?;
        }
        if iter.seek(&key)? {
            for _ in 0..count {
                match iter.next_line()? {
                    Some(line) => {
                        out.write_all(line)?;
                        out.write_all(b"\n")?;
                    }
                    None => break,
                }
            }
        }
    }

    out.flush()?;
    Ok(())
}
