//! Discovery and stitched reads over date/time structured file trees.
//!
//! A stream's files live under a root folder in a hierarchy named after
//! date/time templates (`2020-01/2020-01-02/2020-01-02_00-00-00.dat`). The
//! [`StructuredFileEngine`] answers three questions about such a tree:
//! which time range a stream covers, how much of a window is backed by
//! files, and what the samples of a window are. The file format itself is
//! left to a [`StructuredFileSource`] implementation.

pub mod cancel;
pub mod config;
pub mod convention;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod finder;
pub mod flat;
pub mod matcher;
pub mod source;
mod stitch;
pub mod template;

pub use cancel::CancellationToken;
pub use config::SourceConfig;
pub use convention::{CompiledConvention, NamingConvention};
pub use discovery::{candidate_files, resolve_path_begin, CandidateFile, SearchWindow};
pub use engine::{AvailabilityOptions, StructuredFileEngine};
pub use error::{Error, Result};
pub use finder::{find_file_paths, FoundFiles};
pub use flat::FlatFileSource;
pub use matcher::Specificity;
pub use source::{
    ConventionMap, ReadInfo, ReadRequest, Representation, StructuredFileSource, TimeRange,
};
pub use template::{DateTimeTemplate, ZERO_DATE};
