//! Compression job: read, search on a blocking worker, write

use crate::Settings;
use gpx_compress_lib::{BudgetSearch, CompressError, SearchOutcome, TrackCodec, format_size};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Errors surfaced by the command line front end
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compress(#[from] CompressError),

    #[error("Compression worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// What a run did
#[derive(Debug, Clone, PartialEq)]
pub enum RunSummary {
    /// The input already fits; nothing was written
    AlreadySmall { size: usize },
    /// A compressed track was written
    Compressed {
        output: PathBuf,
        original_size: usize,
        compressed_size: usize,
        original_points: usize,
        retained_points: u64,
    },
    /// Even the segment endpoints alone exceed the target
    Infeasible { trials: usize },
}

impl RunSummary {
    /// Size reduction in percent
    pub fn reduction_percent(&self) -> Option<f64> {
        match self {
            RunSummary::Compressed {
                original_size,
                compressed_size,
                ..
            } => Some((1.0 - *compressed_size as f64 / *original_size as f64) * 100.0),
            _ => None,
        }
    }
}

/// Compress `settings.input` into `settings.output_path()`
pub async fn run(settings: Settings) -> Result<RunSummary, CliError> {
    profiling::scope!("run");

    let bytes = tokio::fs::read(&settings.input)
        .await
        .map_err(|source| CliError::Io {
            path: settings.input.clone(),
            source,
        })?;
    let original_size = bytes.len();
    let target = settings.target_size;

    if original_size <= target && !settings.force {
        tracing::info!(
            "{} is already {} (target {}), nothing to do",
            settings.input.display(),
            format_size(original_size),
            format_size(target)
        );
        return Ok(RunSummary::AlreadySmall {
            size: original_size,
        });
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after the current trial");
                cancel.store(true, Ordering::Relaxed);
            }
        })
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<(u8, String)>();
    let method = settings.method;
    let search = BudgetSearch::with_config(settings.search_config()).with_cancel_flag(cancel);

    // Trials are CPU-bound and strictly sequential: one blocking worker runs them all
    let worker = tokio::task::spawn_blocking(move || {
        let track = search.codec().parse(&bytes)?;
        tracing::info!(
            "Loaded {} points in {} segments ({})",
            track.total_points(),
            track.segments().len(),
            format_size(bytes.len())
        );
        let mut sink = move |percent: u8, message: &str| {
            let _ = tx.send((percent, message.to_string()));
        };
        let outcome = search.run(&track, target, method, &mut sink)?;
        Ok::<_, CompressError>((outcome, track.total_points()))
    });

    while let Some((percent, message)) = rx.recv().await {
        tracing::info!("[{:>3}%] {}", percent, message);
    }

    let joined = worker.await;
    ctrl_c.abort();
    let (outcome, original_points) = joined??;

    match outcome {
        SearchOutcome::Converged { result, .. } => {
            let output = settings.output_path();
            tokio::fs::write(&output, &result.serialized_bytes)
                .await
                .map_err(|source| CliError::Io {
                    path: output.clone(),
                    source,
                })?;

            tracing::info!(
                "Wrote {}: {} -> {}, {} of {} points kept",
                output.display(),
                format_size(original_size),
                format_size(result.size()),
                result.retained_point_count,
                original_points
            );

            let summary = RunSummary::Compressed {
                output,
                original_size,
                compressed_size: result.size(),
                original_points,
                retained_points: result.retained_point_count,
            };
            if let Some(percent) = summary.reduction_percent() {
                tracing::info!("Size reduced by {:.1}%", percent);
            }
            Ok(summary)
        }
        SearchOutcome::Exhausted { trials } => {
            tracing::error!(
                "Cannot reach {}: the track is too large even with only segment endpoints",
                format_size(target)
            );
            Ok(RunSummary::Infeasible { trials })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use gpx::{Gpx, TrackSegment, Waypoint};
    use gpx_compress_lib::GpxCodec;
    use std::path::Path;

    fn write_test_gpx(dir: &Path, points: usize) -> (PathBuf, usize) {
        let mut gpx = Gpx::default();
        gpx.version = gpx::GpxVersion::Gpx11;
        let mut track = gpx::Track::default();
        let mut segment = TrackSegment::default();
        for i in 0..points {
            let t = i as f64 / points as f64;
            let mut waypoint = Waypoint::new(geo::Point::new(
                2.35 + t * 0.1 + (t * 60.0).cos() * 0.002,
                48.85 + t * 0.1 + (t * 90.0).sin() * 0.002,
            ));
            waypoint.elevation = Some(35.0 + t * 10.0);
            segment.points.push(waypoint);
        }
        track.segments.push(segment);
        gpx.tracks.push(track);

        let bytes = GpxCodec.write(&gpx).unwrap();
        let path = dir.join("ride.gpx");
        std::fs::write(&path, &bytes).unwrap();
        (path, bytes.len())
    }

    fn settings_for(path: &Path, extra: &[&str]) -> Settings {
        let mut args = vec!["gpx-compress", path.to_str().unwrap()];
        args.extend_from_slice(extra);
        Settings::parse_from(args)
    }

    #[tokio::test]
    async fn test_already_small_input_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (path, size) = write_test_gpx(dir.path(), 20);

        let settings = settings_for(&path, &[]);
        let output = settings.output_path();
        let summary = run(settings).await.unwrap();

        assert_eq!(summary, RunSummary::AlreadySmall { size });
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_compresses_below_target() {
        let dir = tempfile::tempdir().unwrap();
        let (path, size) = write_test_gpx(dir.path(), 2_000);
        let target = (size / 3).to_string();

        for method in ["basic", "smart"] {
            let settings = settings_for(&path, &["--target-size", &target, "--method", method]);
            let output = settings.output_path();
            let summary = run(settings).await.unwrap();

            let RunSummary::Compressed {
                compressed_size,
                retained_points,
                ..
            } = summary
            else {
                panic!("expected a compressed result, got {:?}", summary);
            };
            assert!(compressed_size <= size / 3);
            assert!(summary.reduction_percent().unwrap() > 60.0);

            let written = std::fs::read(&output).unwrap();
            assert_eq!(written.len(), compressed_size);
            let track = GpxCodec.parse(&written).unwrap();
            assert_eq!(track.total_points() as u64, retained_points);
        }
    }

    #[tokio::test]
    async fn test_force_recompresses_small_input() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = write_test_gpx(dir.path(), 20);

        let summary = run(settings_for(&path, &["--force"])).await.unwrap();
        assert!(matches!(
            summary,
            RunSummary::Compressed {
                retained_points: 20,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_infeasible_target() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = write_test_gpx(dir.path(), 500);

        let summary = run(settings_for(&path, &["--target-size", "100"]))
            .await
            .unwrap();
        assert_eq!(summary, RunSummary::Infeasible { trials: 2 });
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(settings_for(&dir.path().join("missing.gpx"), &[])).await;
        assert!(matches!(result, Err(CliError::Io { .. })));
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gpx");
        std::fs::write(&path, "<gpx><trk><trkseg><trkpt lat=").unwrap();

        let result = run(settings_for(&path, &["--target-size", "10"])).await;
        assert!(matches!(
            result,
            Err(CliError::Compress(CompressError::Parse(_)))
        ));
    }
}
