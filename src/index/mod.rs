//! Sparse Index Module
//!
//! On-disk `(key → offset)` samples of a sorted data file.
//!
//! ## File Format (GORIv2)
//! ```text
//! ## fileformat=GORIv2\n
//! <chromosome>\t<position>\t<offset>\n
//! <chromosome>\t<position>\t<offset>\n
//! ...
//! ```
//!
//! Entries are strictly increasing in key order. `offset` is the end of a
//! line carrying that key (the start of the next line), which is exactly
//! the position cache entry semantics, so loading is a straight copy.
//!
//! ## Granularity
//! - `Full`: one entry per distinct key
//! - `Chromosome`: one entry per chromosome, its first key
//!
//! ## Modules
//! - `writer`: Appends entries under a granularity policy
//! - `reader`: Loads an index into a [`PositionCache`](crate::cache::PositionCache)
//! - `generate`: Builds `<file>.gori` from a finished data file, atomically

mod generate;
mod reader;
mod writer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SeekError;

pub use generate::{generate, generate_with};
pub use reader::{load, load_into};
pub use writer::{IndexFile, IndexWriter};

/// Format tag written in the header line
pub const GORI_VERSION: &str = "GORIv2";

/// Header line prefix
pub const HEADER_PREFIX: &str = "## fileformat=";

/// Extension appended to a data file name to locate its index
pub const INDEX_EXTENSION: &str = "gori";

/// Which entries an index keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexGranularity {
    /// Every key change
    #[default]
    Full,
    /// The first key of each chromosome
    Chromosome,
}

impl fmt::Display for IndexGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexGranularity::Full => write!(f, "full"),
            IndexGranularity::Chromosome => write!(f, "chromosome"),
        }
    }
}

impl FromStr for IndexGranularity {
    type Err = SeekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(IndexGranularity::Full),
            "chromosome" | "chrom" => Ok(IndexGranularity::Chromosome),
            other => Err(SeekError::Config(format!("unknown index granularity: {}", other))),
        }
    }
}

/// Conventional index path for a data file: `<data>.gori`
pub fn index_path_for(data_path: impl AsRef<Path>) -> PathBuf {
    let mut name = data_path.as_ref().as_os_str().to_os_string();
    name.push(".");
    name.push(INDEX_EXTENSION);
    PathBuf::from(name)
}
