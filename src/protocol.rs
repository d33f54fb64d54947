//! Typed catalog events delivered to interested collaborators.
//!
//! The catalog owns a broadcast sender for these payloads; consumers
//! subscribe at construction time instead of registering with a
//! process-wide observer bus.

use crate::song::Song;

/// Notifications emitted from the owning thread during song placement.
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    /// An artist reached its second song.
    NewArtist(ArtistSummary),
    /// An album reached its second song.
    NewAlbum(AlbumSummary),
    /// A song was placed into the catalog. Emitted for every placement.
    NewSong(Song),
}

/// Aggregate view of one artist at emission time.
#[derive(Debug, Clone)]
pub struct ArtistSummary {
    pub name: String,
    pub song_count: u32,
}

/// Aggregate view of one album at emission time.
#[derive(Debug, Clone)]
pub struct AlbumSummary {
    pub name: String,
    /// Owning artist name; "Various Artists" once reassigned.
    pub artist: String,
    pub song_count: u32,
}
