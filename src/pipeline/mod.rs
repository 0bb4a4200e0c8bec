//! Chapter identity, per-run output accumulation, and the orchestrator
//! state machine that wires C1–C8 together (C9).

pub mod chapter;
pub mod orchestrator;
pub mod record;

pub use chapter::{format_chapter_filename, Chapter};
pub use orchestrator::Orchestrator;
pub use record::{ChapterPaths, ChapterStatus, JarvisOccurrence, OutputLog, PipelineRecord};
