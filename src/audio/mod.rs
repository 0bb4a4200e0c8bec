//! Audio sample extraction from the external media transcoder (C2) and WAV
//! staging for the speech-to-text collaborator (§6).

pub mod reader;
pub mod writer;

pub use reader::read_pcm;
