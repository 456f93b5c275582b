//! Fixture builders shared by the integration tests.
//!
//! Packages are assembled in memory: collections are written through sqlx to
//! a temporary file and read back, then zipped with a minimal writer.

#![allow(dead_code)]

use std::io::Write;

use apkg_decode::proto::{FieldConfig, NotetypeConfig, NotetypeKind, TemplateConfig};
use flate2::Crc;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use prost::Message;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tempfile::{NamedTempFile, TempPath};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn zstd(data: &[u8]) -> Vec<u8> {
    zstd::encode_all(data, 3).expect("zstd encode")
}

// ─── ZIP writer ───────────────────────────────────────────────────────────

struct PendingEntry {
    name: String,
    data: Vec<u8>,
    deflate: bool,
    zip64_size: Option<u64>,
}

/// Writes a single-disk archive without ZIP64 records.
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<PendingEntry>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(mut self, name: &str, data: impl AsRef<[u8]>) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            data: data.as_ref().to_vec(),
            deflate: false,
            zip64_size: None,
        });
        self
    }

    pub fn deflated(mut self, name: &str, data: impl AsRef<[u8]>) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            data: data.as_ref().to_vec(),
            deflate: true,
            zip64_size: None,
        });
        self
    }

    /// Make the last entry's directory record declare `size` through a ZIP64 extra field.
    pub fn zip64_size(mut self, size: u64) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.zip64_size = Some(size);
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let mut crc = Crc::new();
            crc.update(&entry.data);
            let (method, payload) = if entry.deflate {
                let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
                enc.write_all(&entry.data).unwrap();
                (8u16, enc.finish().unwrap())
            } else {
                (0u16, entry.data.clone())
            };
            let offset = out.len() as u32;
            let name = entry.name.as_bytes();

            out.extend_from_slice(b"PK\x03\x04");
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
            out.extend_from_slice(&method.to_le_bytes());
            out.extend_from_slice(&[0, 0, 0, 0]); // time, date
            out.extend_from_slice(&crc.sum().to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra length
            out.extend_from_slice(name);
            out.extend_from_slice(&payload);

            central.extend_from_slice(b"PK\x01\x02");
            central.extend_from_slice(&20u16.to_le_bytes()); // version made by
            central.extend_from_slice(&20u16.to_le_bytes()); // version needed
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&method.to_le_bytes());
            central.extend_from_slice(&[0, 0, 0, 0]);
            central.extend_from_slice(&crc.sum().to_le_bytes());
            central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            let mut extra = Vec::new();
            let declared = match entry.zip64_size {
                Some(size) => {
                    extra.extend_from_slice(&1u16.to_le_bytes());
                    extra.extend_from_slice(&8u16.to_le_bytes());
                    extra.extend_from_slice(&size.to_le_bytes());
                    u32::MAX
                }
                None => entry.data.len() as u32,
            };
            central.extend_from_slice(&declared.to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // comment length
            central.extend_from_slice(&[0, 0, 0, 0]); // disk start, internal attrs
            central.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name);
            central.extend_from_slice(&extra);
        }

        let cd_offset = out.len() as u32;
        let count = self.entries.len() as u16;
        out.extend_from_slice(&central);
        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&[0, 0, 0, 0]); // disk numbers
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // comment length
        out
    }
}

// ─── SQLite fixtures ──────────────────────────────────────────────────────

/// A collection database under construction.
pub struct FixtureDb {
    pub pool: SqlitePool,
    path: TempPath,
}

impl FixtureDb {
    pub async fn new() -> Self {
        let path = NamedTempFile::new().unwrap().into_temp_path();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .collation("unicase", |a: &str, b: &str| {
                a.to_lowercase().cmp(&b.to_lowercase())
            });
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        Self { pool, path }
    }

    pub async fn exec(&self, sql: &str) {
        sqlx::query(sql).execute(&self.pool).await.unwrap();
    }

    /// Close the database and return its file contents.
    pub async fn into_bytes(self) -> Vec<u8> {
        self.pool.close().await;
        std::fs::read(&self.path).unwrap()
    }
}

// ─── Legacy collections ───────────────────────────────────────────────────

pub const BASIC_MODEL_ID: i64 = 1_342_697_561_419;
pub const SPANISH_DECK_ID: i64 = 1_400_000_000_000;

pub fn basic_models_json() -> String {
    format!(
        r#"{{
        "{id}": {{
            "id": {id}, "name": "Basic", "type": 0, "css": ".card {{ font-family: arial; }}",
            "latexPre": "", "latexPost": "", "sortf": 0, "did": 1,
            "flds": [
                {{"name": "Front", "ord": 0, "font": "Arial", "size": 20}},
                {{"name": "Back", "ord": 1, "font": "Arial", "size": 20}}
            ],
            "tmpls": [
                {{"name": "Card 1", "ord": 0, "qfmt": "{{{{Front}}}}", "afmt": "{{{{FrontSide}}}}<hr id=answer>{{{{Back}}}}"}}
            ]
        }}
    }}"#,
        id = BASIC_MODEL_ID
    )
}

pub fn spanish_decks_json() -> String {
    format!(
        r#"{{
        "1": {{"id": 1, "name": "Default", "conf": 1}},
        "{id}": {{"id": {id}, "name": "Spanish::Greetings", "conf": 1}}
    }}"#,
        id = SPANISH_DECK_ID
    )
}

/// A legacy collection; every note gets one card in the Spanish deck.
pub async fn legacy_collection(models: &str, decks: &str, notes: &[(i64, i64, &str, &str)]) -> Vec<u8> {
    let db = FixtureDb::new().await;
    db.exec(
        "CREATE TABLE col (id integer primary key, crt integer not null, mod integer not null,
            scm integer not null, ver integer not null, dty integer not null, usn integer not null,
            ls integer not null, conf text not null, models text not null, decks text not null,
            dconf text not null, tags text not null)",
    )
    .await;
    db.exec(
        "CREATE TABLE notes (id integer primary key, guid text not null, mid integer not null,
            mod integer not null, usn integer not null, tags text not null, flds text not null,
            sfld integer not null, csum integer not null, flags integer not null, data text not null)",
    )
    .await;
    db.exec(
        "CREATE TABLE cards (id integer primary key, nid integer not null, did integer not null,
            ord integer not null, mod integer not null, usn integer not null, type integer not null,
            queue integer not null, due integer not null)",
    )
    .await;

    sqlx::query("INSERT INTO col VALUES (1, 0, 0, 0, 11, 0, 0, 0, '{}', ?, ?, '{}', '{}')")
        .bind(models)
        .bind(decks)
        .execute(&db.pool)
        .await
        .unwrap();
    for (i, &(id, mid, tags, flds)) in notes.iter().enumerate() {
        sqlx::query(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
             VALUES (?, ?, ?, 0, -1, ?, ?, '', 0, 0, '')",
        )
        .bind(id)
        .bind(format!("guid{id}"))
        .bind(mid)
        .bind(tags)
        .bind(flds)
        .execute(&db.pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO cards VALUES (?, ?, ?, 0, 0, -1, 0, 0, ?)")
            .bind(i as i64 + 1)
            .bind(id)
            .bind(SPANISH_DECK_ID)
            .bind(i as i64)
            .execute(&db.pool)
            .await
            .unwrap();
    }
    db.into_bytes().await
}

/// The collection.anki2 placeholder newer exporters ship next to the real one.
pub async fn placeholder_collection() -> Vec<u8> {
    legacy_collection(
        &basic_models_json(),
        r#"{"1": {"id": 1, "name": "Default"}}"#,
        &[(1, BASIC_MODEL_ID, "", "Please update to the latest Anki version\u{1f}")],
    )
    .await
}

// ─── Modern collections ───────────────────────────────────────────────────

pub const NOTETYPE_ID: i64 = 1_700_000_000_000;
pub const VERBS_DECK_ID: i64 = 1_700_000_000_001;

/// A modern collection with one "Basic (and reversed card)" notetype.
///
/// Each note gets two cards (one per template) in `Spanish\x1fVerbs`.
pub async fn modern_collection(notes: &[(i64, i64, &str, &str)]) -> Vec<u8> {
    let db = FixtureDb::new().await;
    for ddl in [
        "CREATE TABLE col (id integer primary key, crt integer not null, mod integer not null,
            scm integer not null, ver integer not null, dty integer not null, usn integer not null,
            ls integer not null, conf text not null, models text not null, decks text not null,
            dconf text not null, tags text not null)",
        "CREATE TABLE notetypes (id integer NOT NULL PRIMARY KEY, name text NOT NULL COLLATE unicase,
            mtime_secs integer NOT NULL, usn integer NOT NULL, config blob NOT NULL)",
        "CREATE UNIQUE INDEX idx_notetypes_name ON notetypes (name)",
        "CREATE TABLE fields (ntid integer NOT NULL, ord integer NOT NULL,
            name text NOT NULL COLLATE unicase, config blob NOT NULL,
            PRIMARY KEY (ntid, ord)) without rowid",
        "CREATE TABLE templates (ntid integer NOT NULL, ord integer NOT NULL,
            name text NOT NULL COLLATE unicase, mtime_secs integer NOT NULL, usn integer NOT NULL,
            config blob NOT NULL, PRIMARY KEY (ntid, ord)) without rowid",
        "CREATE TABLE decks (id integer PRIMARY KEY NOT NULL, name text NOT NULL COLLATE unicase,
            mtime_secs integer NOT NULL, usn integer NOT NULL, common blob NOT NULL,
            kind blob NOT NULL)",
        "CREATE TABLE notes (id integer primary key, guid text not null, mid integer not null,
            mod integer not null, usn integer not null, tags text not null, flds text not null,
            sfld integer not null, csum integer not null, flags integer not null, data text not null)",
        "CREATE TABLE cards (id integer primary key, nid integer not null, did integer not null,
            ord integer not null, mod integer not null, usn integer not null, type integer not null,
            queue integer not null, due integer not null)",
        "INSERT INTO col VALUES (1, 0, 0, 0, 18, 0, 0, 0, '', '', '', '', '')",
    ] {
        db.exec(ddl).await;
    }

    let notetype = NotetypeConfig {
        kind: NotetypeKind::Normal as i32,
        css: ".card { text-align: center; }".into(),
        latex_pre: "\\documentclass{article}".into(),
        ..Default::default()
    };
    sqlx::query("INSERT INTO notetypes VALUES (?, 'Basic (and reversed card)', 0, 0, ?)")
        .bind(NOTETYPE_ID)
        .bind(notetype.encode_to_vec())
        .execute(&db.pool)
        .await
        .unwrap();

    for (ord, name) in [(0i64, "Front"), (1, "Back")] {
        let config = FieldConfig {
            font_name: "Liberation Sans".into(),
            font_size: 20,
            ..Default::default()
        };
        sqlx::query("INSERT INTO fields VALUES (?, ?, ?, ?)")
            .bind(NOTETYPE_ID)
            .bind(ord)
            .bind(name)
            .bind(config.encode_to_vec())
            .execute(&db.pool)
            .await
            .unwrap();
    }
    for (ord, name, q, a) in [
        (0i64, "Card 1", "{{Front}}", "{{FrontSide}}<hr id=answer>{{Back}}"),
        (1, "Card 2", "{{Back}}", "{{FrontSide}}<hr id=answer>{{Front}}"),
    ] {
        let config = TemplateConfig {
            q_format: q.into(),
            a_format: a.into(),
            ..Default::default()
        };
        sqlx::query("INSERT INTO templates VALUES (?, ?, ?, 0, 0, ?)")
            .bind(NOTETYPE_ID)
            .bind(ord)
            .bind(name)
            .bind(config.encode_to_vec())
            .execute(&db.pool)
            .await
            .unwrap();
    }
    sqlx::query("INSERT INTO decks VALUES (1, 'Default', 0, 0, x'', x''), (?, ?, 0, 0, x'', x'')")
        .bind(VERBS_DECK_ID)
        .bind("Spanish\u{1f}Verbs")
        .execute(&db.pool)
        .await
        .unwrap();

    let mut card_id = 1i64;
    for &(id, mid, tags, flds) in notes {
        sqlx::query(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
             VALUES (?, ?, ?, 0, -1, ?, ?, '', 0, 0, '')",
        )
        .bind(id)
        .bind(format!("guid{id}"))
        .bind(mid)
        .bind(tags)
        .bind(flds)
        .execute(&db.pool)
        .await
        .unwrap();
        for ord in [1i64, 0] {
            sqlx::query("INSERT INTO cards VALUES (?, ?, ?, ?, 0, -1, 0, 0, 0)")
                .bind(card_id)
                .bind(id)
                .bind(VERBS_DECK_ID)
                .bind(ord)
                .execute(&db.pool)
                .await
                .unwrap();
            card_id += 1;
        }
    }
    db.into_bytes().await
}

// ─── Media manifests ──────────────────────────────────────────────────────

/// Protobuf `MediaEntries` with one entry per filename.
pub fn proto_manifest(filenames: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for name in filenames {
        let mut entry = vec![0x0A, name.len() as u8];
        entry.extend_from_slice(name.as_bytes());
        entry.extend_from_slice(&[0x10, 0x04]); // size
        out.push(0x0A);
        out.push(entry.len() as u8);
        out.extend(entry);
    }
    out
}

/// Protobuf `PackageMetadata { version }`.
pub fn package_meta(version: u8) -> Vec<u8> {
    vec![0x08, version]
}
