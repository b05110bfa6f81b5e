//! File-period stitching for reads.
//!
//! A read walks `[begin, end)` one file period at a time. Each step asks the
//! source where the period containing the cursor lives, then either extracts
//! a block from the found files, jumps over a gap up to the next file, or
//! stops when nothing further lies inside the window.

use std::path::{Path, PathBuf};

use log::{debug, error, trace};
use time::{Duration, OffsetDateTime};

use crate::cancel::CancellationToken;
use crate::convention::CompiledConvention;
use crate::discovery::resolve_path_begin;
use crate::source::{ReadInfo, ReadRequest, StructuredFileSource};
use crate::{Error, Result};

#[derive(Debug)]
enum State {
    Locating,
    Filling {
        paths: Vec<PathBuf>,
        file_begin: OffsetDateTime,
        offset: usize,
        block: usize,
    },
    Skipping {
        block: usize,
    },
    Done,
}

/// Position of the read inside the destination buffers.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    current: OffsetDateTime,
    remaining: usize,
    buffer_offset: usize,
}

impl Cursor {
    fn advance(&mut self, samples: usize, sample_period: Duration) {
        self.current +=
            Duration::nanoseconds_i128(sample_period.whole_nanoseconds() * samples as i128);
        self.remaining -= samples;
        self.buffer_offset += samples;
    }
}

pub(crate) struct ReadStitcher<'a, S: ?Sized> {
    root: &'a Path,
    source: &'a S,
    convention: &'a CompiledConvention,
    end: OffsetDateTime,
    sample_period: Duration,
    file_length: usize,
}

impl<'a, S> ReadStitcher<'a, S>
where
    S: StructuredFileSource + ?Sized,
{
    pub(crate) fn new(
        root: &'a Path,
        source: &'a S,
        convention: &'a CompiledConvention,
        sample_period: Duration,
        end: OffsetDateTime,
    ) -> Result<Self> {
        let file_length = file_length(convention.file_period(), sample_period)?;
        Ok(Self {
            root,
            source,
            convention,
            end,
            sample_period,
            file_length,
        })
    }

    /// Fill `request` with the samples of `[begin, end)`.
    ///
    /// Samples no file covers are left untouched. On cancellation the
    /// samples written so far stay in the buffers.
    pub(crate) fn run(
        &self,
        begin: OffsetDateTime,
        request: &mut ReadRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let total = request.sample_count(begin, self.end)?;

        let mut cursor = Cursor {
            current: begin,
            remaining: total,
            buffer_offset: 0,
        };
        let mut state = State::Locating;

        loop {
            state = match state {
                State::Locating => {
                    if cursor.remaining == 0 {
                        State::Done
                    } else {
                        cancel.check()?;
                        self.locate(&cursor)?
                    }
                }
                State::Filling {
                    paths,
                    file_begin,
                    offset,
                    block,
                } => {
                    trace!(
                        "filling {} samples at {} from {} file(s)",
                        block,
                        cursor.current,
                        paths.len()
                    );
                    for path in &paths {
                        self.extract(path, file_begin, offset, block, &cursor, request);
                    }
                    cursor.advance(block, self.sample_period);
                    State::Locating
                }
                State::Skipping { block } => {
                    trace!("skipping {} samples at {}", block, cursor.current);
                    cursor.advance(block, self.sample_period);
                    State::Locating
                }
                State::Done => break,
            };
        }

        debug!(
            "read of {} stopped with {} of {} samples unvisited",
            request.stream_id, cursor.remaining, total
        );
        Ok(())
    }

    fn locate(&self, cursor: &Cursor) -> Result<State> {
        let found = self
            .source
            .find_files(self.root, self.convention, cursor.current)
            .map_err(Error::Source)?;

        let file_begin = found.file_begin.or_else(|| {
            found
                .paths
                .first()
                .and_then(|path| resolve_path_begin(self.convention, path))
                .map(|(local, _)| self.convention.to_utc(local))
        });
        let Some(file_begin) = file_begin else {
            return Ok(State::Done);
        };

        let period = self.convention.file_period();
        let current = cursor.current;

        let within = file_begin <= current
            && current
                .checked_sub(period)
                .map_or(true, |low| file_begin > low);
        let ahead = file_begin < self.end
            && current
                .checked_add(period)
                .is_some_and(|high| file_begin >= high);

        if within {
            let offset = self.samples_between(file_begin, current);
            let block = (self.file_length - offset).min(cursor.remaining);
            Ok(State::Filling {
                paths: found.paths,
                file_begin,
                offset,
                block,
            })
        } else if ahead {
            let block = self
                .samples_between(current, file_begin)
                .min(cursor.remaining);
            Ok(State::Skipping { block })
        } else {
            Ok(State::Done)
        }
    }

    fn extract(
        &self,
        path: &Path,
        file_begin: OffsetDateTime,
        offset: usize,
        block: usize,
        cursor: &Cursor,
        request: &mut ReadRequest<'_>,
    ) {
        let element_size = request.representation.element_size;
        let mut data = vec![0u8; block * element_size];
        let mut status = vec![0u8; block];

        let info = ReadInfo {
            path,
            stream_id: request.stream_id,
            convention: self.convention,
            representation: request.representation,
            file_begin,
            file_offset: offset,
            file_block: block,
            file_length: self.file_length,
            data: &mut data,
            status: &mut status,
        };

        if let Err(err) = self.source.extract(info) {
            error!("failed to read {}: {:#}", path.display(), err);
            return;
        }

        let start = cursor.buffer_offset;
        let samples = data.chunks_exact(element_size).zip(&status);
        for (index, (sample, &flag)) in samples.enumerate() {
            if flag != 1 {
                continue;
            }
            let target = start + index;
            request.data[target * element_size..(target + 1) * element_size]
                .copy_from_slice(sample);
            request.status[target] = 1;
        }
    }

    fn samples_between(&self, from: OffsetDateTime, to: OffsetDateTime) -> usize {
        let span = (to - from).whole_nanoseconds();
        (span / self.sample_period.whole_nanoseconds()) as usize
    }
}

fn file_length(file_period: Duration, sample_period: Duration) -> Result<usize> {
    let period = file_period.whole_nanoseconds();
    let sample = sample_period.whole_nanoseconds();
    if sample <= 0 {
        return Err(Error::invalid(format!(
            "sample period must be positive, got {sample_period}"
        )));
    }
    if period % sample != 0 {
        return Err(Error::config(format!(
            "file period {file_period} is not a multiple of the sample period {sample_period}"
        )));
    }
    usize::try_from(period / sample)
        .map_err(|_| Error::config("file period holds too many samples"))
}
