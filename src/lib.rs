//! In-memory music catalog with background filesystem indexing.
//!
//! The catalog normalizes scanned audio files into an artist/album/song
//! hierarchy persisted in SQLite, while a background worker discovers
//! and tags new files and hands them to the owning thread through a
//! pollable progress channel.

pub mod catalog;
pub mod config;
pub mod file_discovery;
pub mod indexer;
pub mod protocol;
pub mod song;
pub mod song_store;
pub mod tag_reader;
