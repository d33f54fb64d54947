use std::thread;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::broadcast::error::TryRecvError;

use tunedex::catalog::Catalog;
use tunedex::config;
use tunedex::protocol::CatalogEvent;
use tunedex::song_store::SongStore;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn log_pending_events(receiver: &mut tokio::sync::broadcast::Receiver<CatalogEvent>) {
    loop {
        match receiver.try_recv() {
            Ok(CatalogEvent::NewArtist(artist)) => {
                info!("New artist: {}", artist.name);
            }
            Ok(CatalogEvent::NewAlbum(album)) => {
                info!("New album: {} ({})", album.name, album.artist);
            }
            Ok(CatalogEvent::NewSong(song)) => {
                debug!("Indexed {}", song.filename);
            }
            Err(TryRecvError::Lagged(skipped)) => {
                debug!("Skipped {} catalog event(s)", skipped);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return,
        }
    }
}

fn log_library_listing(catalog: &Catalog) {
    for name in catalog.artist_names() {
        let albums = catalog.albums_of(name);
        debug!("{}: {} album(s)", name, albums.len());
        for album in albums {
            debug!(
                "  {} [{}] ({} song(s))",
                album.name,
                catalog.artist_name(album.artist_id()),
                album.song_count()
            );
            for &song_id in album.songs() {
                debug!("    {}", catalog.song(song_id).filename);
            }
        }
    }
}

fn main() {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    let app_config = config::load_or_default();
    if app_config.library.folders.is_empty() {
        info!("No library folders configured; nothing to scan");
    }

    let store = SongStore::new().expect("Failed to initialize library database");
    let mut catalog = Catalog::new(store);
    let mut events = catalog.subscribe();

    catalog
        .open()
        .expect("Failed to load the persisted catalog");
    catalog.set_library_config(app_config.library);
    catalog.run_indexer_thread();

    loop {
        thread::sleep(POLL_INTERVAL);
        let progress = catalog.process_indexer_results();
        log_pending_events(&mut events);

        if progress.is_nan() {
            info!("Scanning library folders...");
            continue;
        }
        info!("Indexing: {:.0}%", progress * 100.0);
        if progress >= 1.0 && !catalog.is_indexer_running() {
            break;
        }
    }

    log_library_listing(&catalog);
    info!(
        "Library ready: {} artist(s), {} album(s), {} song(s)",
        catalog.artist_count(),
        catalog.album_count(),
        catalog.song_count()
    );
}
