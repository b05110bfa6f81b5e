//! The public face of the crate: time range, availability and reads over a
//! root folder, driven by a [`StructuredFileSource`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use rayon::prelude::*;
use time::OffsetDateTime;

use crate::cancel::CancellationToken;
use crate::convention::{CompiledConvention, NamingConvention};
use crate::discovery::{candidate_files, CandidateFile, SearchWindow};
use crate::source::{ReadRequest, StructuredFileSource, TimeRange};
use crate::stitch::ReadStitcher;
use crate::{Error, Result};

/// Tuning for [`StructuredFileEngine::availability_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityOptions {
    /// Worker threads used to score candidate files. `1` scores inline.
    pub parallelism: usize,
}

impl Default for AvailabilityOptions {
    fn default() -> Self {
        Self { parallelism: 1 }
    }
}

pub struct StructuredFileEngine<S> {
    root: PathBuf,
    source: S,
    streams: HashMap<String, Vec<CompiledConvention>>,
}

impl<S: StructuredFileSource> StructuredFileEngine<S> {
    /// Ask `source` for its naming conventions and compile them.
    ///
    /// A missing root is not an error; every query then reports no data.
    pub fn new(root: impl Into<PathBuf>, source: S) -> Result<Self> {
        let root = root.into();
        let conventions = source.naming_conventions(&root).map_err(Error::Source)?;

        let mut streams = HashMap::with_capacity(conventions.len());
        for (stream_id, list) in conventions {
            let compiled = list
                .iter()
                .map(NamingConvention::compile)
                .collect::<Result<Vec<_>>>()
                .map_err(|err| match err {
                    Error::Configuration(msg) => {
                        Error::Configuration(format!("stream '{stream_id}': {msg}"))
                    }
                    other => other,
                })?;
            streams.insert(stream_id, compiled);
        }

        info!(
            "structured file engine over {} with {} stream(s)",
            root.display(),
            streams.len()
        );
        Ok(Self {
            root,
            source,
            streams,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stream_ids(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn conventions(&self, stream_id: &str) -> Result<&[CompiledConvention]> {
        self.streams
            .get(stream_id)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownStream(stream_id.to_string()))
    }

    /// Earliest and latest data of a stream, across all its conventions.
    ///
    /// The end is the begin of the latest file plus one file period. Returns
    /// [`TimeRange::empty`] when no file is found.
    pub fn time_range(&self, stream_id: &str, cancel: &CancellationToken) -> Result<TimeRange> {
        let mut range = TimeRange::empty();

        for convention in self.conventions(stream_id)? {
            cancel.check()?;

            let earliest = candidate_files(&self.root, convention, SearchWindow::Earliest, cancel)?
                .into_iter()
                .map(|file| file.begin)
                .min();
            let latest = candidate_files(&self.root, convention, SearchWindow::Latest, cancel)?
                .into_iter()
                .map(|file| file.begin)
                .max();

            if let Some(first) = earliest {
                range.begin = range.begin.min(convention.to_utc(first));
            }
            if let Some(last) = latest {
                let end = convention
                    .to_utc(last)
                    .saturating_add(convention.file_period());
                range.end = range.end.max(end);
            }
        }

        debug!("time range of {}: {:?}", stream_id, range);
        Ok(range)
    }

    /// Share of `[begin, end)` covered by files, averaged over conventions.
    pub fn availability(
        &self,
        stream_id: &str,
        begin: OffsetDateTime,
        end: OffsetDateTime,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        self.availability_with(
            stream_id,
            begin,
            end,
            &AvailabilityOptions::default(),
            cancel,
        )
    }

    pub fn availability_with(
        &self,
        stream_id: &str,
        begin: OffsetDateTime,
        end: OffsetDateTime,
        options: &AvailabilityOptions,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        validate_window(begin, end)?;
        let conventions = self.conventions(stream_id)?;
        if conventions.is_empty() {
            return Ok(0.0);
        }

        let pool = if options.parallelism > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.parallelism)
                .build()
                .map_err(|err| Error::config(format!("availability thread pool: {err}")))?;
            Some(pool)
        } else {
            None
        };

        let mut total = 0.0;
        for convention in conventions {
            cancel.check()?;

            let window = SearchWindow::Range {
                begin: convention.to_local(begin),
                end: convention.to_local(end),
            };
            let files = candidate_files(&self.root, convention, window, cancel)?;
            let score = |file: &CandidateFile| self.score(file, convention, cancel);
            let summed: f64 = match &pool {
                Some(pool) => pool.install(|| files.par_iter().map(score).sum()),
                None => files.iter().map(score).sum(),
            };
            cancel.check()?;

            let expected = (end - begin) / convention.file_period();
            let ratio = (summed / expected).clamp(0.0, 1.0);
            debug!(
                "{} file(s) of {} score {:.3} under {:?}",
                files.len(),
                stream_id,
                ratio,
                convention.convention().path_segments
            );
            total += ratio;
        }

        Ok(total / conventions.len() as f64)
    }

    fn score(
        &self,
        file: &CandidateFile,
        convention: &CompiledConvention,
        cancel: &CancellationToken,
    ) -> f64 {
        if cancel.is_cancelled() {
            return 0.0;
        }
        match self.source.availability_score(file, convention) {
            Ok(score) if score.is_finite() => score.clamp(0.0, 1.0),
            Ok(score) => {
                error!("non-finite availability {} for {}", score, file.path.display());
                0.0
            }
            Err(err) => {
                error!("failed to score {}: {:#}", file.path.display(), err);
                0.0
            }
        }
    }

    /// Fill `request` with the samples of `[begin, end)`.
    ///
    /// Only samples backed by a successfully extracted file are written;
    /// everything else keeps its previous content.
    pub fn read(
        &self,
        begin: OffsetDateTime,
        end: OffsetDateTime,
        request: &mut ReadRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        validate_window(begin, end)?;
        request.sample_count(begin, end)?;
        let conventions = self.conventions(request.stream_id)?;
        let Some(convention) =
            self.source
                .select_convention(request.stream_id, &request.representation, conventions)
        else {
            debug!("no convention selected for {}", request.stream_id);
            return Ok(());
        };

        ReadStitcher::new(
            &self.root,
            &self.source,
            convention,
            request.representation.sample_period,
            end,
        )?
        .run(begin, request, cancel)
    }

    /// Read several streams over the same window, reporting progress in
    /// `(0, 1]` after each one.
    pub fn read_all<F>(
        &self,
        begin: OffsetDateTime,
        end: OffsetDateTime,
        requests: &mut [ReadRequest<'_>],
        mut progress: F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        F: FnMut(f64),
    {
        let count = requests.len();
        for (index, request) in requests.iter_mut().enumerate() {
            self.read(begin, end, request, cancel)?;
            progress((index + 1) as f64 / count as f64);
        }
        Ok(())
    }
}

fn validate_window(begin: OffsetDateTime, end: OffsetDateTime) -> Result<()> {
    if !begin.offset().is_utc() || !end.offset().is_utc() {
        return Err(Error::invalid(format!(
            "timestamps must be UTC, got {begin} and {end}"
        )));
    }
    if begin >= end {
        return Err(Error::invalid(format!(
            "begin {begin} must be before end {end}"
        )));
    }
    Ok(())
}
