//! Event journal using RocksDB
//!
//! Append-only record of every committed [`RegistryEvent`], read by
//! external indexers.
//!
//! # Column Families
//!
//! - `events` - Event log (key: big-endian sequence number, from 1)
//! - `meta` - Journal metadata (key: `last_sequence`)

use crate::{
    config::Config,
    error::{Error, Result},
    events::RegistryEvent,
};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode,
    Options, WriteBatch, DB,
};
use std::sync::Arc;

/// Column family names
const CF_EVENTS: &str = "events";
const CF_META: &str = "meta";

const KEY_LAST_SEQUENCE: &[u8] = b"last_sequence";

/// Event journal backed by RocksDB
pub struct Journal {
    db: Arc<DB>,

    /// Serializes appends so sequence numbers stay dense
    last_sequence: Mutex<u64>,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("last_sequence", &*self.last_sequence.lock())
            .finish_non_exhaustive()
    }
}

impl Journal {
    /// Open or create journal
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Append-only workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_events()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let last_sequence = {
            let cf = db
                .cf_handle(CF_META)
                .ok_or_else(|| Error::Storage(format!("Column family {} not found", CF_META)))?;
            match db.get_cf(&cf, KEY_LAST_SEQUENCE)? {
                Some(bytes) => decode_sequence(&bytes)?,
                None => 0,
            }
        };

        tracing::info!(?path, last_sequence, "Opened event journal");

        Ok(Self {
            db: Arc::new(db),
            last_sequence: Mutex::new(last_sequence),
        })
    }

    fn cf_options_events() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Append events atomically, returning the sequence of the last one
    pub fn append_events(&self, events: &[RegistryEvent]) -> Result<u64> {
        let mut last_sequence = self.last_sequence.lock();
        if events.is_empty() {
            return Ok(*last_sequence);
        }

        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_meta = self.cf_handle(CF_META)?;

        let mut batch = WriteBatch::default();
        let mut sequence = *last_sequence;
        for event in events {
            sequence += 1;
            batch.put_cf(&cf_events, sequence.to_be_bytes(), bincode::serialize(event)?);
        }
        batch.put_cf(&cf_meta, KEY_LAST_SEQUENCE, sequence.to_be_bytes());

        self.db.write(batch)?;
        *last_sequence = sequence;

        tracing::debug!(count = events.len(), last_sequence = sequence, "Events journaled");

        Ok(sequence)
    }

    /// Get event by sequence number
    pub fn get_event(&self, sequence: u64) -> Result<RegistryEvent> {
        let cf = self.cf_handle(CF_EVENTS)?;

        let value = self
            .db
            .get_cf(&cf, sequence.to_be_bytes())?
            .ok_or_else(|| Error::Storage(format!("Event {} not found", sequence)))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Events with a sequence number greater than `after`, in order
    pub fn events_since(&self, after: u64) -> Result<Vec<(u64, RegistryEvent)>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let start = after.saturating_add(1).to_be_bytes();

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start[..], Direction::Forward));

        let mut events = Vec::new();
        for item in iter {
            let (key, value) = item?;
            events.push((decode_sequence(&key)?, bincode::deserialize(&value)?));
        }
        Ok(events)
    }

    /// Sequence number of the newest event (0 when empty)
    pub fn last_sequence(&self) -> u64 {
        *self.last_sequence.lock()
    }
}

fn decode_sequence(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Storage(format!("Malformed sequence key of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}
