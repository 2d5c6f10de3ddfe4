use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::config::{ChunkSpec, RunConfig};
use crate::error::Result;
use crate::event::frame::{FrameReader, read_parquet};
use crate::histoer::accumulator::Accumulator;
use crate::processor::TTGammaProcessor;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFailure {
    pub path: PathBuf,
    pub dataset: String,
    pub error: String,
}

/// Merged output of every chunk that succeeded, plus the chunks that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub output: Accumulator,
    pub failures: Vec<ChunkFailure>,
}

impl RunSummary {
    fn from_chunk(processor: &TTGammaProcessor, chunk: &ChunkSpec) -> Self {
        match process_chunk(processor, chunk) {
            Ok(output) => Self {
                output,
                failures: Vec::new(),
            },
            Err(e) => {
                log::error!("Chunk {} ({}) failed: {}", chunk.path.display(), chunk.dataset, e);
                Self {
                    output: Accumulator::default(),
                    failures: vec![ChunkFailure {
                        path: chunk.path.clone(),
                        dataset: chunk.dataset.clone(),
                        error: e.to_string(),
                    }],
                }
            }
        }
    }

    fn merged(mut self, other: Self) -> Result<Self> {
        self.output.merge(&other.output)?;
        self.failures.extend(other.failures);
        Ok(self)
    }
}

pub fn process_chunk(processor: &TTGammaProcessor, chunk: &ChunkSpec) -> Result<Accumulator> {
    let df = read_parquet(&chunk.path)?;
    let batch = FrameReader::new(&df).batch(&chunk.dataset, chunk.is_data())?;
    processor.process(&batch)
}

/// Process every chunk in parallel and merge the results. A chunk that fails
/// is logged and left out of the merged output.
pub fn process_chunks(config: &RunConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let processor = TTGammaProcessor::new(
        config.settings.clone(),
        Arc::new(config.calibration.clone()),
    );

    let bar = ProgressBar::new(config.chunks.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks")
    {
        bar.set_style(style);
    }

    let mut summary = config
        .chunks
        .par_iter()
        .progress_with(bar.clone())
        .map(|chunk| -> Result<RunSummary> { Ok(RunSummary::from_chunk(&processor, chunk)) })
        .try_reduce(RunSummary::default, RunSummary::merged)?;
    bar.finish_and_clear();

    summary.failures.sort_by(|a, b| a.path.cmp(&b.path));
    summary.output = summary.output.finalize();
    log::info!(
        "Processed {} chunk(s) in {:?}, {} failed",
        config.chunks.len(),
        start.elapsed(),
        summary.failures.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_chunks_gives_identity() {
        let summary = process_chunks(&RunConfig::default()).unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn unreadable_chunks_are_reported_not_merged() {
        let config = RunConfig {
            chunks: vec![
                ChunkSpec {
                    path: PathBuf::from("/nonexistent/b.parquet"),
                    dataset: "TTGamma_SingleLept_2016".to_string(),
                    is_data: None,
                },
                ChunkSpec {
                    path: PathBuf::from("/nonexistent/a.parquet"),
                    dataset: "Data_SingleMu_b_2016".to_string(),
                    is_data: None,
                },
            ],
            ..Default::default()
        };
        let summary = process_chunks(&config).unwrap();
        assert_eq!(summary.output.event_count, 0);
        assert!(summary.output.histograms.is_empty());
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].path, PathBuf::from("/nonexistent/a.parquet"));
    }
}
