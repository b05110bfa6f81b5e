//! The capability set a concrete data source plugs into the engine.

use std::collections::HashMap;
use std::path::Path;

use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::convention::{CompiledConvention, NamingConvention};
use crate::discovery::CandidateFile;
use crate::finder::{find_file_paths, FoundFiles};
use crate::{Error, Result};

/// Naming conventions per stream id. A stream may be stored under several
/// conventions at once (for example after a layout change).
pub type ConventionMap = HashMap<String, Vec<NamingConvention>>;

/// Sample layout of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Representation {
    pub sample_period: Duration,
    /// Bytes per sample in the data buffer.
    pub element_size: usize,
}

impl Representation {
    pub fn new(sample_period: Duration, element_size: usize) -> Self {
        Self {
            sample_period,
            element_size,
        }
    }

    /// Number of samples in `[begin, end)`.
    pub fn sample_count(&self, begin: OffsetDateTime, end: OffsetDateTime) -> Result<usize> {
        if !self.sample_period.is_positive() {
            return Err(Error::invalid(format!(
                "sample period must be positive, got {}",
                self.sample_period
            )));
        }
        if self.element_size == 0 {
            return Err(Error::invalid("element size must not be zero"));
        }
        let span = (end - begin).whole_nanoseconds();
        let period = self.sample_period.whole_nanoseconds();
        if span < 0 || span % period != 0 {
            return Err(Error::invalid(format!(
                "time span {} is not a multiple of the sample period {}",
                end - begin,
                self.sample_period
            )));
        }
        usize::try_from(span / period)
            .map_err(|_| Error::invalid("time span holds too many samples"))
    }

    /// Zeroed data and status buffers sized for `[begin, end)`.
    pub fn create_buffers(
        &self,
        begin: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let count = self.sample_count(begin, end)?;
        Ok((vec![0u8; count * self.element_size], vec![0u8; count]))
    }
}

/// Caller-owned destination of one read.
///
/// `status` holds one byte per sample: 1 once the sample is confirmed, 0
/// otherwise. `data` holds `element_size` bytes per sample.
#[derive(Debug)]
pub struct ReadRequest<'a> {
    pub stream_id: &'a str,
    pub representation: Representation,
    pub data: &'a mut [u8],
    pub status: &'a mut [u8],
}

impl<'a> ReadRequest<'a> {
    pub fn new(
        stream_id: &'a str,
        representation: Representation,
        data: &'a mut [u8],
        status: &'a mut [u8],
    ) -> Self {
        Self {
            stream_id,
            representation,
            data,
            status,
        }
    }

    /// Number of samples in `[begin, end)`, checked against the buffer sizes.
    pub fn sample_count(&self, begin: OffsetDateTime, end: OffsetDateTime) -> Result<usize> {
        let element_size = self.representation.element_size;
        let total = self.representation.sample_count(begin, end)?;
        if self.status.len() != total || self.data.len() != total * element_size {
            return Err(Error::invalid(format!(
                "buffers hold {} samples / {} bytes, the window needs {} samples of {} bytes",
                self.status.len(),
                self.data.len(),
                total,
                element_size
            )));
        }
        Ok(total)
    }
}

/// One extraction job handed to [`StructuredFileSource::extract`].
///
/// `data` and `status` cover exactly `file_block` samples. The engine copies
/// back only the samples whose status byte was set to 1, and only when the
/// hook returns `Ok`.
#[derive(Debug)]
pub struct ReadInfo<'a> {
    pub path: &'a Path,
    pub stream_id: &'a str,
    pub convention: &'a CompiledConvention,
    pub representation: Representation,
    /// UTC begin of the file period.
    pub file_begin: OffsetDateTime,
    /// First sample to read, counted from the start of the file.
    pub file_offset: usize,
    /// Number of samples to read.
    pub file_block: usize,
    /// Nominal samples per file.
    pub file_length: usize,
    pub data: &'a mut [u8],
    pub status: &'a mut [u8],
}

/// UTC bounds of a stream. Empty ranges have `begin` after `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub begin: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl TimeRange {
    pub fn empty() -> Self {
        Self {
            begin: PrimitiveDateTime::MAX.assume_utc(),
            end: PrimitiveDateTime::MIN.assume_utc(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::empty()
    }
}

/// A data source whose files live in date/time structured folders.
///
/// Only [`extract`](Self::extract) and
/// [`naming_conventions`](Self::naming_conventions) are required; the other
/// hooks have defaults matching plain template-named files.
pub trait StructuredFileSource: Send + Sync {
    /// Called once when the engine is built.
    fn naming_conventions(&self, root: &Path) -> anyhow::Result<ConventionMap>;

    /// Pick the convention used for reads of `stream_id`.
    fn select_convention<'c>(
        &self,
        _stream_id: &str,
        _representation: &Representation,
        conventions: &'c [CompiledConvention],
    ) -> Option<&'c CompiledConvention> {
        conventions.first()
    }

    /// Locate the file(s) responsible for the period containing `begin`.
    fn find_files(
        &self,
        root: &Path,
        convention: &CompiledConvention,
        begin: OffsetDateTime,
    ) -> anyhow::Result<FoundFiles> {
        Ok(find_file_paths(root, convention, begin)?)
    }

    /// Fraction of a file period the file actually holds, in `[0, 1]`.
    fn availability_score(
        &self,
        _file: &CandidateFile,
        _convention: &CompiledConvention,
    ) -> anyhow::Result<f64> {
        Ok(1.0)
    }

    /// Decode samples `[file_offset, file_offset + file_block)` of one file.
    fn extract(&self, info: ReadInfo<'_>) -> anyhow::Result<()>;
}
