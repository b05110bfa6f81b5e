//! A ready-made source for files holding raw, fixed-size samples back to back.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::Context;

use crate::config::SourceConfig;
use crate::convention::CompiledConvention;
use crate::discovery::CandidateFile;
use crate::source::{ConventionMap, ReadInfo, StructuredFileSource};

/// Each file stores `file_length` samples of `element_size` bytes starting at
/// its file period begin. Short files simply hold fewer samples.
#[derive(Debug, Clone, Default)]
pub struct FlatFileSource {
    streams: ConventionMap,
    expected_file_size: Option<u64>,
}

impl FlatFileSource {
    pub fn new(streams: ConventionMap) -> Self {
        Self {
            streams,
            expected_file_size: None,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.streams.clone())
    }

    /// Score availability as file size over `bytes` instead of presence.
    pub fn with_expected_file_size(mut self, bytes: u64) -> Self {
        self.expected_file_size = Some(bytes);
        self
    }
}

impl StructuredFileSource for FlatFileSource {
    fn naming_conventions(&self, _root: &Path) -> anyhow::Result<ConventionMap> {
        Ok(self.streams.clone())
    }

    fn availability_score(
        &self,
        file: &CandidateFile,
        _convention: &CompiledConvention,
    ) -> anyhow::Result<f64> {
        let len = fs::metadata(&file.path)
            .with_context(|| format!("stat {}", file.path.display()))?
            .len();
        Ok(match self.expected_file_size {
            Some(0) | None => {
                if len > 0 {
                    1.0
                } else {
                    0.0
                }
            }
            Some(expected) => (len as f64 / expected as f64).min(1.0),
        })
    }

    fn extract(&self, info: ReadInfo<'_>) -> anyhow::Result<()> {
        let element_size = info.representation.element_size;
        let mut file =
            File::open(info.path).with_context(|| format!("open {}", info.path.display()))?;
        file.seek(SeekFrom::Start((info.file_offset * element_size) as u64))?;

        let mut filled = 0;
        while filled < info.data.len() {
            match file.read(&mut info.data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(err).with_context(|| format!("read {}", info.path.display()))
                }
            }
        }

        let complete = filled / element_size;
        info.status[..complete].fill(1);
        Ok(())
    }
}
