mod common;

use std::path::Path;

use anyhow::bail;
use chronicle_files::{
    AvailabilityOptions, CancellationToken, CandidateFile, CompiledConvention, ConventionMap,
    Error, FlatFileSource, ReadInfo, StructuredFileEngine, StructuredFileSource,
};
use common::{daily_convention, streams, ten_minute_convention, touch, write_bytes};
use tempfile::tempdir;
use time::macros::datetime;
use time::Duration;

#[test]
fn full_window_is_fully_available() -> anyhow::Result<()> {
    let dir = tempdir()?;
    touch(dir.path(), "2020-01/2020-01-01.dat");
    touch(dir.path(), "2020-01/2020-01-02.dat");

    let engine = StructuredFileEngine::new(
        dir.path(),
        FlatFileSource::new(streams("T1", vec![daily_convention()])),
    )?;
    let availability = engine.availability(
        "T1",
        datetime!(2020-01-01 00:00 UTC),
        datetime!(2020-01-03 00:00 UTC),
        &CancellationToken::new(),
    )?;

    assert_eq!(availability, 1.0);
    Ok(())
}

#[test]
fn missing_file_halves_availability() -> anyhow::Result<()> {
    let dir = tempdir()?;
    touch(dir.path(), "2020-01/2020-01-01.dat");

    let engine = StructuredFileEngine::new(
        dir.path(),
        FlatFileSource::new(streams("T1", vec![daily_convention()])),
    )?;
    let availability = engine.availability(
        "T1",
        datetime!(2020-01-01 00:00 UTC),
        datetime!(2020-01-03 00:00 UTC),
        &CancellationToken::new(),
    )?;

    assert_eq!(availability, 0.5);
    Ok(())
}

#[test]
fn files_outside_the_window_do_not_count() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    touch(root, "2020-01/2020-01-01/2020-01-01_23-50-00.dat");
    touch(root, "2020-01/2020-01-02/2020-01-02_00-00-00.dat");
    touch(root, "2020-01/2020-01-02/2020-01-02_00-10-00.dat");
    touch(root, "2020-01/2020-01-02/2020-01-02_01-00-00.dat");

    let engine = StructuredFileEngine::new(
        root,
        FlatFileSource::new(streams("T1", vec![ten_minute_convention()])),
    )?;
    let availability = engine.availability(
        "T1",
        datetime!(2020-01-02 00:00 UTC),
        datetime!(2020-01-02 01:00 UTC),
        &CancellationToken::new(),
    )?;

    assert!((availability - 2.0 / 6.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn size_based_scores_are_averaged() -> anyhow::Result<()> {
    let dir = tempdir()?;
    write_bytes(dir.path(), "2020-01/2020-01-01.dat", &[0u8; 100]);
    write_bytes(dir.path(), "2020-01/2020-01-02.dat", &[0u8; 50]);

    let source =
        FlatFileSource::new(streams("T1", vec![daily_convention()])).with_expected_file_size(100);
    let engine = StructuredFileEngine::new(dir.path(), source)?;
    let availability = engine.availability(
        "T1",
        datetime!(2020-01-01 00:00 UTC),
        datetime!(2020-01-03 00:00 UTC),
        &CancellationToken::new(),
    )?;

    assert_eq!(availability, 0.75);
    Ok(())
}

#[test]
fn parallel_scoring_matches_sequential() -> anyhow::Result<()> {
    let dir = tempdir()?;
    for day in [1, 2, 3, 5, 8, 13, 21] {
        touch(dir.path(), &format!("2020-01/2020-01-{day:02}.dat"));
    }

    let engine = StructuredFileEngine::new(
        dir.path(),
        FlatFileSource::new(streams("T1", vec![daily_convention()])),
    )?;
    let begin = datetime!(2020-01-01 00:00 UTC);
    let end = datetime!(2020-02-01 00:00 UTC);
    let cancel = CancellationToken::new();

    let sequential = engine.availability("T1", begin, end, &cancel)?;
    let parallel = engine.availability_with(
        "T1",
        begin,
        end,
        &AvailabilityOptions { parallelism: 4 },
        &cancel,
    )?;

    assert!((sequential - 7.0 / 31.0).abs() < 1e-9);
    assert!((sequential - parallel).abs() < 1e-9);
    Ok(())
}

#[test]
fn conventions_are_averaged() -> anyhow::Result<()> {
    let dir = tempdir()?;
    touch(dir.path(), "2020-01/2020-01-01.dat");
    touch(dir.path(), "2020-01/2020-01-02.dat");

    let hourly = chronicle_files::NamingConvention::new(
        ["'hourly'"],
        "yyyy-MM-dd_HH'.dat'",
        Duration::HOUR,
    );
    let engine = StructuredFileEngine::new(
        dir.path(),
        FlatFileSource::new(streams("T1", vec![daily_convention(), hourly])),
    )?;
    let availability = engine.availability(
        "T1",
        datetime!(2020-01-01 00:00 UTC),
        datetime!(2020-01-03 00:00 UTC),
        &CancellationToken::new(),
    )?;

    assert_eq!(availability, 0.5);
    Ok(())
}

struct FailingScores {
    streams: ConventionMap,
}

impl StructuredFileSource for FailingScores {
    fn naming_conventions(&self, _root: &Path) -> anyhow::Result<ConventionMap> {
        Ok(self.streams.clone())
    }

    fn availability_score(
        &self,
        file: &CandidateFile,
        _convention: &CompiledConvention,
    ) -> anyhow::Result<f64> {
        if file.path.ends_with("2020-01-02.dat") {
            bail!("corrupt header");
        }
        Ok(1.0)
    }

    fn extract(&self, _info: ReadInfo<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn scoring_failures_count_as_missing() -> anyhow::Result<()> {
    let dir = tempdir()?;
    touch(dir.path(), "2020-01/2020-01-01.dat");
    touch(dir.path(), "2020-01/2020-01-02.dat");

    let source = FailingScores {
        streams: streams("T1", vec![daily_convention()]),
    };
    let engine = StructuredFileEngine::new(dir.path(), source)?;
    let availability = engine.availability(
        "T1",
        datetime!(2020-01-01 00:00 UTC),
        datetime!(2020-01-03 00:00 UTC),
        &CancellationToken::new(),
    )?;

    assert_eq!(availability, 0.5);
    Ok(())
}

#[test]
fn invalid_windows_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let engine = StructuredFileEngine::new(
        dir.path(),
        FlatFileSource::new(streams("T1", vec![daily_convention()])),
    )
    .expect("engine");
    let cancel = CancellationToken::new();
    let begin = datetime!(2020-01-01 00:00 UTC);

    let err = engine
        .availability("T1", begin, begin, &cancel)
        .expect_err("empty window");
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = engine
        .availability("T1", datetime!(2020-01-01 00:00 +01:00), begin + Duration::DAY, &cancel)
        .expect_err("non-UTC begin");
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn cancelled_availability_returns_cancelled() {
    let dir = tempdir().expect("tempdir");
    touch(dir.path(), "2020-01/2020-01-01.dat");
    let engine = StructuredFileEngine::new(
        dir.path(),
        FlatFileSource::new(streams("T1", vec![daily_convention()])),
    )
    .expect("engine");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine
        .availability(
            "T1",
            datetime!(2020-01-01 00:00 UTC),
            datetime!(2020-01-02 00:00 UTC),
            &cancel,
        )
        .expect_err("cancelled");
    assert!(matches!(err, Error::Cancelled));
}
