use crate::song::Song;
use rusqlite::{params, Connection};

/// Durable table of songs keyed by a store-generated integer id.
pub struct SongStore {
    conn: Connection,
}

impl SongStore {
    /// Opens (creating if needed) the library database in the user data
    /// directory.
    pub fn new() -> Result<Self, rusqlite::Error> {
        let data_dir = dirs::data_dir()
            .expect("Could not find data directory")
            .join("tunedex");

        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).expect("Could not create data directory");
        }

        let db_path = data_dir.join("library.db");
        let conn = Connection::open(db_path)?;

        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS songs (
                id INTEGER PRIMARY KEY,
                filename TEXT NOT NULL UNIQUE,
                title TEXT,
                artist TEXT,
                album TEXT,
                genre TEXT,
                year INTEGER,
                track INTEGER,
                disc INTEGER,
                length INTEGER,
                rating INTEGER
            )",
            [],
        )?;
        Ok(())
    }

    /// Loads every persisted song in insertion order.
    pub fn load_all(&self) -> Result<Vec<Song>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, title, artist, album, genre, year, track, disc, length, rating
             FROM songs ORDER BY id ASC",
        )?;
        let song_iter = stmt.query_map([], |row| {
            let mut song = Song {
                id: row.get(0)?,
                filename: row.get(1)?,
                title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                artist: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                album: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                genre: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                year: row.get::<_, Option<i32>>(6)?.unwrap_or_default(),
                track: row.get::<_, Option<u32>>(7)?.unwrap_or_default(),
                disc: row.get::<_, Option<u32>>(8)?.unwrap_or_default(),
                length: row.get::<_, Option<u32>>(9)?.unwrap_or_default(),
                rating: row.get::<_, Option<u32>>(10)?.unwrap_or_default(),
            };
            song.validate();
            Ok(song)
        })?;

        let mut songs = Vec::new();
        for song in song_iter {
            songs.push(song?);
        }
        Ok(songs)
    }

    /// Inserts a song and returns the generated id.
    pub fn insert_song(&self, song: &Song) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO songs (filename, title, artist, album, genre, year, track, disc, length, rating)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                song.filename,
                song.title,
                song.artist,
                song.album,
                song.genre,
                song.year,
                song.track,
                song.disc,
                song.length,
                song.rating
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Updates the rating column of one persisted song.
    pub fn update_rating(&self, id: i64, rating: u32) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE songs SET rating = ?1 WHERE id = ?2",
            params![rating, id],
        )?;
        Ok(())
    }
}
