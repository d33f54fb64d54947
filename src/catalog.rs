//! Normalized artist/album/song hierarchy and the scan scheduler.
//!
//! The catalog is owned by a single thread. The background scan worker
//! only communicates through the shared progress state in `indexer`; all
//! placement, persistence, and event emission happens here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::config::LibraryConfig;
use crate::indexer::{self, ScanProgress, ScanSnapshot, SharedScanProgress};
use crate::protocol::{AlbumSummary, ArtistSummary, CatalogEvent};
use crate::song::{validated_rating, Song};
use crate::song_store::SongStore;

/// Sentinel artist for songs without an artist tag.
pub const UNKNOWN_ARTIST_NAME: &str = "Unknown Artist";
/// Sentinel artist owning albums whose songs disagree on artist.
pub const VARIOUS_ARTISTS_NAME: &str = "Various Artists";
/// Display name of each artist's bucket for songs without an album tag.
pub const UNKNOWN_ALBUM_NAME: &str = "Unknown Album";

const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub type SongId = usize;
pub type ArtistId = usize;
pub type AlbumId = usize;

/// One artist aggregate. Sentinel artists are created with the catalog.
#[derive(Debug)]
pub struct Artist {
    pub name: String,
    pub song_count: u32,
    albums: HashMap<String, AlbumId>,
    /// Lazily created per-artist bucket for songs without an album tag.
    unknown_album: Option<AlbumId>,
    announced: bool,
}

/// One album aggregate with its ordered song list.
#[derive(Debug)]
pub struct Album {
    pub name: String,
    /// Owning artist; rewritten to Various Artists on conflict, never back.
    artist: ArtistId,
    /// First non-zero year seen; not re-evaluated afterward.
    pub year: i32,
    songs: Vec<SongId>,
    is_unknown: bool,
    announced: bool,
}

impl Album {
    /// Song ids in placement order.
    pub fn songs(&self) -> &[SongId] {
        &self.songs
    }

    pub fn song_count(&self) -> u32 {
        self.songs.len() as u32
    }

    pub fn artist_id(&self) -> ArtistId {
        self.artist
    }

    /// True for the per-artist bucket holding songs without an album tag.
    pub fn is_unknown(&self) -> bool {
        self.is_unknown
    }
}

struct ScanScheduler {
    worker: Option<JoinHandle<()>>,
    shared: SharedScanProgress,
    /// Set when a scan is requested while one is active; honored once
    /// the active run completes.
    unhandled_request: bool,
}

/// In-memory music catalog backed by a [`SongStore`].
pub struct Catalog {
    store: SongStore,
    songs: Vec<Song>,
    songs_by_filename: HashMap<String, SongId>,
    songs_by_store_id: HashMap<i64, SongId>,
    artists: Vec<Artist>,
    artists_by_name: HashMap<String, ArtistId>,
    albums: Vec<Album>,
    albums_by_name: HashMap<String, AlbumId>,
    unknown_artist: ArtistId,
    various_artists: ArtistId,
    events: broadcast::Sender<CatalogEvent>,
    library_config: LibraryConfig,
    scan: ScanScheduler,
}

impl Catalog {
    pub fn new(store: SongStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut catalog = Self {
            store,
            songs: Vec::new(),
            songs_by_filename: HashMap::new(),
            songs_by_store_id: HashMap::new(),
            artists: Vec::new(),
            artists_by_name: HashMap::new(),
            albums: Vec::new(),
            albums_by_name: HashMap::new(),
            unknown_artist: 0,
            various_artists: 0,
            events,
            library_config: LibraryConfig::default(),
            scan: ScanScheduler {
                worker: None,
                shared: Arc::new(Mutex::new(ScanProgress::default())),
                unhandled_request: false,
            },
        };
        catalog.unknown_artist = catalog.get_or_create_artist(UNKNOWN_ARTIST_NAME);
        catalog.various_artists = catalog.get_or_create_artist(VARIOUS_ARTISTS_NAME);
        catalog
    }

    /// Subscribes to catalog change events.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    /// Replaces the indexing preferences used by subsequent scans.
    pub fn set_library_config(&mut self, library_config: LibraryConfig) {
        self.library_config = library_config;
    }

    /// Loads every persisted song and places it into the hierarchy.
    ///
    /// Any store failure aborts the load; the caller is expected to treat
    /// it as fatal to startup.
    pub fn open(&mut self) -> Result<(), rusqlite::Error> {
        let songs = self.store.load_all()?;
        let count = songs.len();
        for song in songs {
            self.add_song(song);
        }
        info!("Catalog opened with {} song(s)", count);
        Ok(())
    }

    /// Places one validated song into the hierarchy.
    ///
    /// Resolves the artist (Unknown Artist for an empty tag), the album
    /// (per-artist Unknown Album for an empty tag, otherwise by name with
    /// Various Artists reassignment on artist conflict), adopts the first
    /// non-zero year, inserts at the sorted position, updates aggregates,
    /// and emits change events.
    pub fn add_song(&mut self, song: Song) -> Option<SongId> {
        if self.songs_by_filename.contains_key(&song.filename) {
            warn!("Ignoring duplicate catalog entry for {}", song.filename);
            return None;
        }

        let artist_id = if song.artist.is_empty() {
            self.unknown_artist
        } else {
            self.get_or_create_artist(&song.artist)
        };

        let album_id = if song.album.is_empty() {
            self.unknown_album_for(artist_id)
        } else {
            self.named_album_for(artist_id, &song.album)
        };

        if self.albums[album_id].year == 0 && song.year != 0 {
            self.albums[album_id].year = song.year;
        }

        let song_id = self.songs.len();
        let position = self.sorted_position(album_id, &song);
        self.albums[album_id].songs.insert(position, song_id);

        self.artists[artist_id].song_count += 1;
        let owner = self.albums[album_id].artist;
        if owner == self.various_artists && artist_id != self.various_artists {
            self.artists[self.various_artists].song_count += 1;
        }

        self.songs_by_filename.insert(song.filename.clone(), song_id);
        if song.id != 0 {
            self.songs_by_store_id.insert(song.id, song_id);
        }
        let _ = self.events.send(CatalogEvent::NewSong(song.clone()));
        self.songs.push(song);

        self.announce_artist_if_ready(artist_id);
        if owner == self.various_artists && artist_id != self.various_artists {
            self.announce_artist_if_ready(self.various_artists);
        }
        self.announce_album_if_ready(album_id);

        Some(song_id)
    }

    /// Persists a freshly discovered song to obtain its id, then places
    /// it. A persistence failure is logged and does not prevent in-memory
    /// placement; the song then carries an unset id for the session.
    pub fn add_indexed_song(&mut self, mut song: Song) -> Option<SongId> {
        match self.store.insert_song(&song) {
            Ok(id) => song.id = id,
            Err(err) => {
                warn!(
                    "Failed to persist {}: {}; keeping it in memory only",
                    song.filename, err
                );
            }
        }
        self.add_song(song)
    }

    /// Updates a song's rating in memory and in the store. The rating is
    /// subject to the same lossy range policy as tag fields.
    pub fn set_song_rating(&mut self, store_id: i64, rating: u32) -> Result<(), rusqlite::Error> {
        let rating = validated_rating(rating);
        if let Some(&song_id) = self.songs_by_store_id.get(&store_id) {
            self.songs[song_id].rating = rating;
        }
        self.store.update_rating(store_id, rating)
    }

    fn get_or_create_artist(&mut self, name: &str) -> ArtistId {
        if let Some(&artist_id) = self.artists_by_name.get(name) {
            return artist_id;
        }
        let artist_id = self.artists.len();
        self.artists.push(Artist {
            name: name.to_string(),
            song_count: 0,
            albums: HashMap::new(),
            unknown_album: None,
            announced: false,
        });
        self.artists_by_name.insert(name.to_string(), artist_id);
        artist_id
    }

    fn unknown_album_for(&mut self, artist_id: ArtistId) -> AlbumId {
        if let Some(album_id) = self.artists[artist_id].unknown_album {
            return album_id;
        }
        let album_id = self.albums.len();
        self.albums.push(Album {
            name: UNKNOWN_ALBUM_NAME.to_string(),
            artist: artist_id,
            year: 0,
            songs: Vec::new(),
            is_unknown: true,
            announced: false,
        });
        self.artists[artist_id].unknown_album = Some(album_id);
        album_id
    }

    /// Resolves a named album, reassigning it to Various Artists the
    /// moment a second distinct artist contributes to it. The album also
    /// stays in its original artist's map; reassignment is never undone.
    fn named_album_for(&mut self, artist_id: ArtistId, name: &str) -> AlbumId {
        if let Some(&album_id) = self.albums_by_name.get(name) {
            let owner = self.albums[album_id].artist;
            if owner != artist_id && owner != self.various_artists {
                self.albums[album_id].artist = self.various_artists;
                self.artists[self.various_artists]
                    .albums
                    .insert(name.to_string(), album_id);
                // Songs placed before the conflict now count toward the
                // Various Artists aggregate as well.
                self.artists[self.various_artists].song_count +=
                    self.albums[album_id].song_count();
                debug!("Album '{}' reassigned to {}", name, VARIOUS_ARTISTS_NAME);
            }
            return album_id;
        }

        let album_id = self.albums.len();
        self.albums.push(Album {
            name: name.to_string(),
            artist: artist_id,
            year: 0,
            songs: Vec::new(),
            is_unknown: false,
            announced: false,
        });
        self.albums_by_name.insert(name.to_string(), album_id);
        self.artists[artist_id]
            .albums
            .insert(name.to_string(), album_id);
        album_id
    }

    /// Sorted insertion position within an album's song list.
    ///
    /// Named albums order by track number (0 sorts last) then filename;
    /// albums owned by Unknown Artist order by title instead.
    fn sorted_position(&self, album_id: AlbumId, song: &Song) -> usize {
        let by_title = self.albums[album_id].artist == self.unknown_artist;
        let songs = &self.songs;
        self.albums[album_id].songs.partition_point(|&existing_id| {
            let existing = &songs[existing_id];
            if by_title {
                existing.title.as_str() <= song.title.as_str()
            } else {
                (effective_track(existing), existing.filename.as_str())
                    <= (effective_track(song), song.filename.as_str())
            }
        })
    }

    fn announce_artist_if_ready(&mut self, artist_id: ArtistId) {
        let artist = &mut self.artists[artist_id];
        if artist.song_count >= 2 && !artist.announced {
            artist.announced = true;
            let summary = ArtistSummary {
                name: artist.name.clone(),
                song_count: artist.song_count,
            };
            let _ = self.events.send(CatalogEvent::NewArtist(summary));
        }
    }

    fn announce_album_if_ready(&mut self, album_id: AlbumId) {
        let album = &self.albums[album_id];
        if album.song_count() >= 2 && !album.announced {
            let summary = AlbumSummary {
                name: album.name.clone(),
                artist: self.artists[album.artist].name.clone(),
                song_count: album.song_count(),
            };
            self.albums[album_id].announced = true;
            let _ = self.events.send(CatalogEvent::NewAlbum(summary));
        }
    }

    /// Starts a background scan, or records a pending request when one
    /// is already active. Requests made while busy coalesce into a
    /// single re-run after the active scan completes.
    pub fn run_indexer_thread(&mut self) {
        if self.scan.worker.is_some() {
            debug!("Indexer already running; queuing a re-run request");
            self.scan.unhandled_request = true;
            return;
        }

        {
            let mut progress = self.scan.shared.lock().expect("scan progress lock poisoned");
            *progress = ScanProgress::default();
        }

        let mut folders = Vec::new();
        for folder in &self.library_config.folders {
            if folder.trim().is_empty() {
                continue;
            }
            let path = PathBuf::from(folder);
            if !path.exists() {
                warn!("Library folder does not exist: {}", path.display());
                continue;
            }
            folders.push(path.canonicalize().unwrap_or(path));
        }

        let snapshot = ScanSnapshot {
            folders,
            extensions: self.library_config.extensions.clone(),
            existing_files: self.songs_by_filename.keys().cloned().collect(),
        };
        self.scan.worker = Some(indexer::spawn_scan_worker(
            snapshot,
            Arc::clone(&self.scan.shared),
        ));
        info!("Library scan started");
    }

    /// Non-blocking query of scan state.
    pub fn is_indexer_running(&self) -> bool {
        self.scan.worker.is_some()
    }

    /// Drains the scan outbox, persists and places the drained songs,
    /// and returns scan progress: `NaN` while the candidate total is
    /// still unknown, a fraction in `[0, 1)` while under way, and
    /// exactly `1.0` once finished (or when there was nothing to do).
    ///
    /// Once the worker has processed every candidate its handle is
    /// joined and released, and a request that arrived mid-run starts
    /// the next scan immediately.
    pub fn process_indexer_results(&mut self) -> f64 {
        let (drained, total, completed) = {
            let mut progress = self.scan.shared.lock().expect("scan progress lock poisoned");
            (
                std::mem::take(&mut progress.results),
                progress.total,
                progress.completed,
            )
        };

        for song in drained {
            self.add_indexed_song(song);
        }

        let fraction = match total {
            None => f64::NAN,
            Some(0) => 1.0,
            Some(total) => completed as f64 / total as f64,
        };

        if total.is_some_and(|total| completed == total) {
            if let Some(worker) = self.scan.worker.take() {
                if worker.join().is_err() {
                    warn!("Indexer worker thread panicked");
                }
                info!("Library scan finished: {} file(s) processed", completed);
                if self.scan.unhandled_request {
                    self.scan.unhandled_request = false;
                    self.run_indexer_thread();
                }
            }
        }

        fraction
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    /// Number of artists with at least one placed song.
    pub fn artist_count(&self) -> usize {
        self.artists
            .iter()
            .filter(|artist| artist.song_count > 0)
            .count()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn song(&self, song_id: SongId) -> &Song {
        &self.songs[song_id]
    }

    pub fn song_by_filename(&self, filename: &str) -> Option<&Song> {
        self.songs_by_filename
            .get(filename)
            .map(|&song_id| &self.songs[song_id])
    }

    pub fn song_by_store_id(&self, store_id: i64) -> Option<&Song> {
        self.songs_by_store_id
            .get(&store_id)
            .map(|&song_id| &self.songs[song_id])
    }

    pub fn artist(&self, name: &str) -> Option<&Artist> {
        self.artists_by_name
            .get(name)
            .map(|&artist_id| &self.artists[artist_id])
    }

    /// Names of artists with at least one placed song.
    pub fn artist_names(&self) -> Vec<&str> {
        self.artists
            .iter()
            .filter(|artist| artist.song_count > 0)
            .map(|artist| artist.name.as_str())
            .collect()
    }

    pub fn album(&self, album_id: AlbumId) -> &Album {
        &self.albums[album_id]
    }

    pub fn artist_name(&self, artist_id: ArtistId) -> &str {
        &self.artists[artist_id].name
    }

    /// Albums mapped under the given artist, including its Unknown Album
    /// bucket when present.
    pub fn albums_of(&self, artist_name: &str) -> Vec<&Album> {
        let Some(&artist_id) = self.artists_by_name.get(artist_name) else {
            return Vec::new();
        };
        let artist = &self.artists[artist_id];
        let mut albums: Vec<&Album> = artist
            .albums
            .values()
            .map(|&album_id| &self.albums[album_id])
            .collect();
        if let Some(album_id) = artist.unknown_album {
            albums.push(&self.albums[album_id]);
        }
        albums.sort_by(|left, right| left.name.cmp(&right.name));
        albums
    }
}

/// Track number used for ordering; 0 means "unset" and sorts last.
fn effective_track(song: &Song) -> u32 {
    if song.track == 0 {
        u32::MAX
    } else {
        song.track
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast::error::TryRecvError;

    fn test_catalog() -> Catalog {
        let store = SongStore::new_in_memory().expect("failed to create in-memory store");
        Catalog::new(store)
    }

    fn song(filename: &str, title: &str, artist: &str, album: &str, track: u32) -> Song {
        Song::validated(
            filename.to_string(),
            title.to_string(),
            artist.to_string(),
            album.to_string(),
            String::new(),
            0,
            track,
            0,
            180,
        )
    }

    fn drain_events(
        receiver: &mut tokio::sync::broadcast::Receiver<CatalogEvent>,
    ) -> Vec<CatalogEvent> {
        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    #[test]
    fn test_empty_artist_goes_to_unknown_artist() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/a.mp3", "A", "", "", 1));

        let unknown = catalog.artist(UNKNOWN_ARTIST_NAME).unwrap();
        assert_eq!(unknown.song_count, 1);
        let albums = catalog.albums_of(UNKNOWN_ARTIST_NAME);
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].name, UNKNOWN_ALBUM_NAME);
    }

    #[test]
    fn test_unknown_album_is_scoped_per_artist() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/a.mp3", "A", "X", "", 1));
        catalog.add_song(song("/m/b.mp3", "B", "Y", "", 1));

        let x_albums = catalog.albums_of("X");
        let y_albums = catalog.albums_of("Y");
        assert_eq!(x_albums.len(), 1);
        assert_eq!(y_albums.len(), 1);
        assert_eq!(x_albums[0].song_count(), 1);
        assert_eq!(y_albums[0].song_count(), 1);
        assert!(x_albums[0].is_unknown());
        assert!(y_albums[0].is_unknown());
    }

    #[test]
    fn test_various_artists_reassignment() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1));
        catalog.add_song(song("/m/b.mp3", "B", "Y", "Z", 2));

        let albums = catalog.albums_of(VARIOUS_ARTISTS_NAME);
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].name, "Z");
        assert_eq!(
            catalog.artist_name(albums[0].artist_id()),
            VARIOUS_ARTISTS_NAME
        );
        assert!(catalog.artist(VARIOUS_ARTISTS_NAME).unwrap().song_count >= 2);
        // The original artist keeps its historical contribution.
        assert_eq!(catalog.artist("X").unwrap().song_count, 1);
        assert_eq!(catalog.artist("Y").unwrap().song_count, 1);
    }

    #[test]
    fn test_reassignment_is_never_undone() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1));
        catalog.add_song(song("/m/b.mp3", "B", "Y", "Z", 2));
        catalog.add_song(song("/m/c.mp3", "C", "X", "Z", 3));

        let albums = catalog.albums_of(VARIOUS_ARTISTS_NAME);
        assert_eq!(
            catalog.artist_name(albums[0].artist_id()),
            VARIOUS_ARTISTS_NAME
        );
        assert_eq!(albums[0].song_count(), 3);
    }

    #[test]
    fn test_sorted_placement_puts_unset_track_last() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/three.mp3", "T3", "X", "Z", 3));
        catalog.add_song(song("/m/one.mp3", "T1", "X", "Z", 1));
        catalog.add_song(song("/m/zero.mp3", "T0", "X", "Z", 0));
        catalog.add_song(song("/m/two.mp3", "T2", "X", "Z", 2));

        let albums = catalog.albums_of("X");
        let order: Vec<u32> = albums[0]
            .songs()
            .iter()
            .map(|&song_id| catalog.song(song_id).track)
            .collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_equal_track_numbers_tie_break_on_filename() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/b.mp3", "B", "X", "Z", 1));
        catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1));

        let albums = catalog.albums_of("X");
        let filenames: Vec<&str> = albums[0]
            .songs()
            .iter()
            .map(|&song_id| catalog.song(song_id).filename.as_str())
            .collect();
        assert_eq!(filenames, vec!["/m/a.mp3", "/m/b.mp3"]);
    }

    #[test]
    fn test_unknown_artist_albums_order_by_title() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/1.mp3", "Zebra", "", "", 1));
        catalog.add_song(song("/m/2.mp3", "Apple", "", "", 2));
        catalog.add_song(song("/m/3.mp3", "Mango", "", "", 0));

        let albums = catalog.albums_of(UNKNOWN_ARTIST_NAME);
        let titles: Vec<&str> = albums[0]
            .songs()
            .iter()
            .map(|&song_id| catalog.song(song_id).title.as_str())
            .collect();
        assert_eq!(titles, vec!["Apple", "Mango", "Zebra"]);
    }

    #[test]
    fn test_album_year_first_nonzero_wins() {
        let mut catalog = test_catalog();
        let mut first = song("/m/a.mp3", "A", "X", "Z", 1);
        first.year = 0;
        let mut second = song("/m/b.mp3", "B", "X", "Z", 2);
        second.year = 1999;
        let mut third = song("/m/c.mp3", "C", "X", "Z", 3);
        third.year = 2005;
        catalog.add_song(first);
        catalog.add_song(second);
        catalog.add_song(third);

        assert_eq!(catalog.albums_of("X")[0].year, 1999);
    }

    #[test]
    fn test_artist_count_matches_album_sums() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1));
        catalog.add_song(song("/m/b.mp3", "B", "X", "Z", 2));
        catalog.add_song(song("/m/c.mp3", "C", "X", "W", 1));

        let artist = catalog.artist("X").unwrap();
        let album_sum: u32 = catalog
            .albums_of("X")
            .iter()
            .map(|album| album.song_count())
            .sum();
        assert_eq!(artist.song_count, album_sum);
        assert_eq!(artist.song_count, 3);
    }

    #[test]
    fn test_new_song_emitted_unconditionally() {
        let mut catalog = test_catalog();
        let mut receiver = catalog.subscribe();
        catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1));

        let events = drain_events(&mut receiver);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CatalogEvent::NewSong(_)));
    }

    #[test]
    fn test_artist_and_album_announced_at_second_song() {
        let mut catalog = test_catalog();
        let mut receiver = catalog.subscribe();
        catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1));
        catalog.add_song(song("/m/b.mp3", "B", "X", "Z", 2));
        catalog.add_song(song("/m/c.mp3", "C", "X", "Z", 3));

        let events = drain_events(&mut receiver);
        let artist_events: Vec<&ArtistSummary> = events
            .iter()
            .filter_map(|event| match event {
                CatalogEvent::NewArtist(summary) => Some(summary),
                _ => None,
            })
            .collect();
        let album_events: Vec<&AlbumSummary> = events
            .iter()
            .filter_map(|event| match event {
                CatalogEvent::NewAlbum(summary) => Some(summary),
                _ => None,
            })
            .collect();
        assert_eq!(artist_events.len(), 1);
        assert_eq!(artist_events[0].name, "X");
        assert_eq!(artist_events[0].song_count, 2);
        assert_eq!(album_events.len(), 1);
        assert_eq!(album_events[0].name, "Z");
    }

    #[test]
    fn test_duplicate_filename_is_ignored() {
        let mut catalog = test_catalog();
        assert!(catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1)).is_some());
        assert!(catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1)).is_none());
        assert_eq!(catalog.song_count(), 1);
    }

    #[test]
    fn test_open_places_persisted_songs() {
        let store = SongStore::new_in_memory().expect("failed to create in-memory store");
        store
            .insert_song(&song("/m/a.mp3", "A", "X", "Z", 1))
            .unwrap();
        store
            .insert_song(&song("/m/b.mp3", "B", "X", "Z", 2))
            .unwrap();

        let mut catalog = Catalog::new(store);
        catalog.open().unwrap();

        assert_eq!(catalog.song_count(), 2);
        assert_eq!(catalog.artist("X").unwrap().song_count, 2);
        assert!(catalog.song_by_store_id(1).is_some());
        assert!(catalog.song_by_filename("/m/a.mp3").is_some());
    }

    #[test]
    fn test_add_indexed_song_assigns_store_id() {
        let mut catalog = test_catalog();
        catalog.add_indexed_song(song("/m/a.mp3", "A", "X", "Z", 1));

        let placed = catalog.song_by_filename("/m/a.mp3").unwrap();
        assert!(placed.id > 0);
        assert!(catalog.song_by_store_id(placed.id).is_some());
    }

    #[test]
    fn test_persist_failure_still_places_song_without_id() {
        let store = SongStore::new_in_memory().expect("failed to create in-memory store");
        // Occupy the filename so the catalog's own insert hits the
        // UNIQUE constraint.
        let conflicting_id = store.insert_song(&song("/m/a.mp3", "A", "X", "Z", 1)).unwrap();

        let mut catalog = Catalog::new(store);
        assert!(catalog.add_indexed_song(song("/m/a.mp3", "A", "X", "Z", 1)).is_some());

        let placed = catalog.song_by_filename("/m/a.mp3").unwrap();
        assert_eq!(placed.id, 0);
        assert!(catalog.song_by_store_id(conflicting_id).is_none());
        assert_eq!(catalog.song_count(), 1);
        assert_eq!(catalog.artist("X").unwrap().song_count, 1);
    }

    #[test]
    fn test_set_song_rating_updates_memory_and_store() {
        let mut catalog = test_catalog();
        catalog.add_indexed_song(song("/m/a.mp3", "A", "X", "Z", 1));
        let store_id = catalog.song_by_filename("/m/a.mp3").unwrap().id;

        catalog.set_song_rating(store_id, 11).unwrap();
        assert_eq!(catalog.song_by_store_id(store_id).unwrap().rating, 11);

        catalog.set_song_rating(store_id, 12).unwrap();
        assert_eq!(catalog.song_by_store_id(store_id).unwrap().rating, 0);
    }

    // Scheduler tests below drive real worker threads over scratch dirs.

    static DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn scratch_dir(label: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tunedex-catalog-{}-{}-{}",
            label,
            std::process::id(),
            DIR_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).expect("failed to create scratch dir");
        dir
    }

    /// Minimal valid mono 16-bit PCM WAV file.
    fn write_wav(path: &std::path::Path) {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&52u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&16000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        fs::write(path, bytes).expect("failed to write wav fixture");
    }

    fn library_config_for(dir: &std::path::Path) -> LibraryConfig {
        LibraryConfig {
            folders: vec![dir.to_string_lossy().to_string()],
            ..LibraryConfig::default()
        }
    }

    fn poll_until_complete(catalog: &mut Catalog, timeout: Duration) -> f64 {
        let deadline = Instant::now() + timeout;
        let mut last = f64::NAN;
        loop {
            let progress = catalog.process_indexer_results();
            if !last.is_nan() && !progress.is_nan() {
                assert!(progress >= last, "progress went backwards");
            }
            if !progress.is_nan() {
                last = progress;
            }
            if progress == 1.0 {
                return progress;
            }
            assert!(Instant::now() < deadline, "scan never completed");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_scan_places_discovered_songs() {
        let dir = scratch_dir("scan");
        write_wav(&dir.join("song.wav"));
        fs::write(dir.join("notes.txt"), b"not audio").unwrap();

        let mut catalog = test_catalog();
        catalog.set_library_config(library_config_for(&dir));
        catalog.run_indexer_thread();
        assert!(catalog.is_indexer_running());

        assert_eq!(poll_until_complete(&mut catalog, Duration::from_secs(10)), 1.0);
        assert!(!catalog.is_indexer_running());
        assert_eq!(catalog.song_count(), 1);
        // A tagless file lands under Unknown Artist with its stem title.
        let placed = catalog.song_by_filename(
            dir.canonicalize().unwrap().join("song.wav").to_string_lossy().as_ref(),
        );
        assert!(placed.is_some());
        assert_eq!(placed.unwrap().title, "song");
        assert_eq!(catalog.artist(UNKNOWN_ARTIST_NAME).unwrap().song_count, 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rescan_skips_already_indexed_files() {
        let dir = scratch_dir("rescan");
        write_wav(&dir.join("song.wav"));

        let mut catalog = test_catalog();
        catalog.set_library_config(library_config_for(&dir));
        catalog.run_indexer_thread();
        poll_until_complete(&mut catalog, Duration::from_secs(10));
        assert_eq!(catalog.song_count(), 1);

        catalog.run_indexer_thread();
        poll_until_complete(&mut catalog, Duration::from_secs(10));
        assert_eq!(catalog.song_count(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_scan_reports_complete() {
        let mut catalog = test_catalog();
        catalog.set_library_config(LibraryConfig::default());
        catalog.run_indexer_thread();
        assert_eq!(poll_until_complete(&mut catalog, Duration::from_secs(5)), 1.0);
        assert!(!catalog.is_indexer_running());
        assert_eq!(catalog.song_count(), 0);
    }

    #[test]
    fn test_requests_while_busy_coalesce_into_one_rerun() {
        let mut catalog = test_catalog();
        catalog.set_library_config(LibraryConfig::default());
        catalog.run_indexer_thread();
        catalog.run_indexer_thread();
        catalog.run_indexer_thread();

        poll_until_complete(&mut catalog, Duration::from_secs(5));
        // The coalesced request starts exactly one follow-up run.
        assert!(catalog.is_indexer_running());
        poll_until_complete(&mut catalog, Duration::from_secs(5));
        assert!(!catalog.is_indexer_running());

        let progress = catalog.process_indexer_results();
        assert_eq!(progress, 1.0);
        assert!(!catalog.is_indexer_running());
    }

    #[test]
    fn test_progress_is_nan_while_total_unknown() {
        let mut catalog = test_catalog();
        // The shared state still carries its unset total, as it does
        // while the worker is walking the filesystem.
        assert!(catalog.process_indexer_results().is_nan());
    }

    #[test]
    fn test_progress_fraction_while_partially_complete() {
        let mut catalog = test_catalog();
        {
            let mut progress = catalog.scan.shared.lock().unwrap();
            progress.total = Some(4);
            progress.completed = 1;
        }
        assert_eq!(catalog.process_indexer_results(), 0.25);
    }

    #[test]
    fn test_existing_snapshot_matches_catalog_paths() {
        let mut catalog = test_catalog();
        catalog.add_song(song("/m/a.mp3", "A", "X", "Z", 1));
        let existing: HashSet<String> =
            catalog.songs_by_filename.keys().cloned().collect();
        assert!(existing.contains("/m/a.mp3"));
    }
}
