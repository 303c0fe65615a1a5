//! Analysis orchestration and export coordination.
//!
//! The engine owns the single analysis slot (one external detection process
//! at a time, overflow queued FIFO), persists job lifecycle through
//! `clipsmith-store`, and sequences export tasks against the ffmpeg layer
//! in `clipsmith-media`.

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod orchestrator;
pub mod protocol;
pub mod steps;

pub use cache::{hash_file, CacheLayout};
pub use coalesce::ProgressCoalescer;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use export::{
    CaptionRequest, ExportCoordinator, ExportRequest, ExportSummary, ExportTaskError,
};
pub use logging::JobLogger;
pub use orchestrator::{AnalysisRequest, DetectionOrchestrator, JobEvent};
pub use protocol::{classify_line, AnalysisEvent, LineBuffer};
pub use steps::{infer_step, StepHint};
