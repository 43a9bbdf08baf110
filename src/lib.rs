//! Copysubs - Subtitle Placement for Finished Downloads
//!
//! Finds the folder holding the best matching subtitles for each video folder
//! of a finished download and copies them next to the videos with
//! language-tagged names.

pub mod cli;
pub mod config;
pub mod copy;
pub mod error;
pub mod events;
pub mod language;
pub mod scan;
pub mod scoring;
pub mod selector;
pub mod subtitle;
pub mod workflow;
