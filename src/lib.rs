#![warn(clippy::all, rust_2018_idioms)]

//! Chunked event selection and systematic-aware histogramming for the
//! top-pair plus photon analysis in the lepton + jets channel.

pub mod ancestry;
pub mod categorizer;
pub mod config;
pub mod error;
pub mod event;
pub mod histoer;
pub mod kinematics;
pub mod processor;
pub mod runner;
pub mod selection;
pub mod systematics;
pub mod weights;

pub use error::{AnalysisError, Result};
pub use histoer::accumulator::Accumulator;
pub use processor::TTGammaProcessor;
