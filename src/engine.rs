// src/engine.rs
//
// The Channel Engine — coordinates the alpha sequence, the disk log, and
// the hot window into the put/get/release/destroy surface, plus recovery.
//
// ORDERING GUARANTEE:
// `alpha_seq.next()` is internally locked, so the order of file creation
// equals program order of `put()` calls across all producer threads. The
// hot window is a FIFO, so consumers always see messages in ascending ID
// order — the refill step preserves this by always pulling the smallest
// disk-resident ID next (`alpha_seq_cache` only ever moves forward).
//
// RECOVERY NOTE (see DESIGN.md "Open Questions" for the full writeup):
// on resume, `alpha_seq` is set to the name of the highest on-disk file,
// not one past it — the first subsequent `put()` mints that ID again and
// overwrites the file. This is the upstream source's behavior and is
// preserved deliberately rather than patched.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alpha_sequence::AlphaSequence;
use crate::config::{dir_exists, validate_config, PChannelConfig};
use crate::disk_log;
use crate::error::PChannelError;
use crate::hot_window::HotWindow;

/// A message recovered or delivered by the engine, paired with its ID.
#[derive(Debug, Clone)]
pub struct PMessage<T> {
    pub id: String,
    pub data: T,
}

struct CacheState {
    count: u64,
}

/// A persistent, bounded, in-process message channel.
///
/// `S` serializes a payload to bytes for the disk log; `D` deserializes
/// bytes back into a payload during recovery, refill, or a direct `get`
/// of a disk-only message. Both are caller-supplied capabilities — the
/// engine never inspects `T`.
pub struct Engine<T, S, D>
where
    S: Fn(&T) -> Vec<u8>,
    D: Fn(&[u8]) -> Result<T, String>,
{
    config: PChannelConfig,
    channel_id: String,
    persist_path: PathBuf,
    alpha_seq: AlphaSequence,
    alpha_seq_cache: AlphaSequence,
    cache: Mutex<CacheState>,
    window: HotWindow<(String, T)>,
    serialize: S,
    deserialize: D,
}

impl<T, S, D> Engine<T, S, D>
where
    S: Fn(&T) -> Vec<u8>,
    D: Fn(&[u8]) -> Result<T, String>,
{
    /// Initialize a channel. A `None` `channel_id` in `cfg` mints a fresh
    /// UUID v4 and creates its directory; `Some(id)` resumes an existing
    /// channel directory and runs recovery.
    pub fn init(cfg: PChannelConfig, serialize: S, deserialize: D) -> Result<Self, PChannelError> {
        validate_config(&cfg)?;

        let alpha_seq = AlphaSequence::new(cfg.id_len, false)?;
        let alpha_seq_cache = AlphaSequence::new(cfg.id_len, false)?;
        let window = HotWindow::new(cfg.max_cache_count);

        let (channel_id, persist_path, resuming) = match &cfg.channel_id {
            None => {
                let id = Uuid::new_v4().to_string();
                let path = cfg.disk_path.join(&id);
                disk_log::create_dir(&path)?;
                info!(channel_id = %id, path = %path.display(), "created new channel");
                (id, path, false)
            }
            Some(id) => {
                let path = cfg.disk_path.join(id);
                dir_exists(&path)?;
                (id.clone(), path, true)
            }
        };

        let engine = Self {
            config: cfg,
            channel_id,
            persist_path,
            alpha_seq,
            alpha_seq_cache,
            cache: Mutex::new(CacheState { count: 0 }),
            window,
            serialize,
            deserialize,
        };

        if resuming {
            engine.recover()?;
        }

        Ok(engine)
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    // -----------------------------------------------------------------------
    // RECOVERY (component F)
    // -----------------------------------------------------------------------

    fn recover(&self) -> Result<(), PChannelError> {
        let mut entries = disk_log::list(&self.persist_path)?;
        if entries.is_empty() {
            debug!(channel_id = %self.channel_id, "resumed channel has no pending messages");
            return Ok(());
        }

        // mtime-major, name-minor: filename order already equals enqueue
        // order within one sequence; mtime repairs ordering across a
        // wraparound boundary.
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let last_name = entries.last().unwrap().0.clone();
        self.alpha_seq.set_string(&last_name);

        let cache = self.cache.lock().unwrap();
        let mut count = cache.count;
        drop(cache);

        let mut lifted_through: Option<String> = None;
        for (name, _) in &entries {
            if count >= self.config.max_cache_count {
                break;
            }
            let bytes = disk_log::read(&self.persist_path, name)?;
            let data = (self.deserialize)(&bytes).map_err(|reason| PChannelError::Decode {
                id: name.clone(),
                reason,
            })?;
            if !self.window.try_push((name.clone(), data)) {
                // Window reported full concurrently with our own count
                // check; stop rather than lose the message.
                break;
            }
            count += 1;
            lifted_through = Some(name.clone());
        }

        {
            let mut cache = self.cache.lock().unwrap();
            cache.count = count;
        }

        match lifted_through {
            Some(last_lifted) if count as usize == entries.len() => {
                // Every on-disk message made it into the window: park the
                // cache cursor one past the last lift so the next refill
                // doesn't re-read a message already resident in memory.
                self.alpha_seq_cache.set_string(&last_lifted);
                self.alpha_seq_cache.next();
            }
            Some(last_lifted) => {
                // Some messages remain disk-only: point the cursor at the
                // first one still on disk.
                let idx = entries.iter().position(|(n, _)| *n == last_lifted).unwrap();
                self.alpha_seq_cache.set_string(&entries[idx + 1].0);
            }
            None => {
                // Window had no room at all (max_cache_count == 0 never
                // happens per config validation, but be defensive).
                self.alpha_seq_cache.set_string(&entries[0].0);
            }
        }

        info!(
            channel_id = %self.channel_id,
            on_disk = entries.len(),
            prefilled = count,
            "recovered channel from disk"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // PUT
    // -----------------------------------------------------------------------

    /// Persist `payload`, returning its assigned alpha ID. Never blocks on
    /// hot-window capacity: when the window is full the message is left
    /// disk-only and lifted later by a consumer's refill.
    pub fn put(&self, payload: T) -> Result<String, PChannelError> {
        let id = self.alpha_seq.next();
        let bytes = (self.serialize)(&payload);
        disk_log::write(&self.persist_path, &id, &bytes)?;

        let mut cache = self.cache.lock().unwrap();
        if cache.count < self.config.max_cache_count {
            if self.window.try_push((id.clone(), payload)) {
                cache.count += 1;
                self.alpha_seq_cache.next();
            } else {
                warn!(id = %id, "hot window rejected push despite counted room");
            }
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // GET
    // -----------------------------------------------------------------------

    /// Block until a message is available, then return it together with
    /// its ID. At most one disk-tail message is lifted into the window
    /// per call, bounding the work done on the consumer's thread.
    pub fn get(&self) -> Result<(T, String), PChannelError> {
        let (id, payload) = self.window.pop_blocking();

        let mut cache = self.cache.lock().unwrap();
        cache.count -= 1;

        if self.alpha_seq.get() > self.alpha_seq_cache.get() {
            let next_id = self.alpha_seq_cache.next();
            let bytes = disk_log::read(&self.persist_path, &next_id)?;
            let data = (self.deserialize)(&bytes).map_err(|reason| PChannelError::Decode {
                id: next_id.clone(),
                reason,
            })?;
            if self.window.try_push((next_id, data)) {
                cache.count += 1;
            }
        }

        Ok((payload, id))
    }

    // -----------------------------------------------------------------------
    // RELEASE (ack)
    // -----------------------------------------------------------------------

    /// Commit delivery of `id` by deleting its file. Once this returns,
    /// the message is gone; callers must release each delivered ID at
    /// most once.
    pub fn release(&self, id: &str) -> Result<(), PChannelError> {
        disk_log::remove(&self.persist_path, id)
    }

    // -----------------------------------------------------------------------
    // DESTROY
    // -----------------------------------------------------------------------

    /// Discard all persisted messages and remove the channel directory.
    /// Consumes `self`, so no further calls are reachable afterward.
    pub fn destroy(self) -> Result<(), PChannelError> {
        disk_log::remove_all(&self.persist_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_engine(
        dir: &std::path::Path,
        max_msg: u64,
        max_cache: u64,
    ) -> Engine<String, impl Fn(&String) -> Vec<u8>, impl Fn(&[u8]) -> Result<String, String>>
    {
        let cfg = PChannelConfig::new(dir, max_msg, max_cache);
        Engine::init(
            cfg,
            |s: &String| s.as_bytes().to_vec(),
            |b: &[u8]| {
                String::from_utf8(b.to_vec()).map_err(|e| e.to_string())
            },
        )
        .unwrap()
    }

    #[test]
    fn fifo_delivery_with_full_cache() {
        let dir = tempfile::tempdir().unwrap();
        let engine = string_engine(dir.path(), 10, 10);

        engine.put("v1".to_string()).unwrap();
        engine.put("v2".to_string()).unwrap();
        engine.put("v3".to_string()).unwrap();

        let (v, _) = engine.get().unwrap();
        assert_eq!(v, "v1");
        let (v, _) = engine.get().unwrap();
        assert_eq!(v, "v2");
        let (v, _) = engine.get().unwrap();
        assert_eq!(v, "v3");
    }

    #[test]
    fn logs_channel_creation() {
        use std::io::Write;
        use std::sync::Arc;

        #[derive(Clone, Default)]
        struct VecWriter(Arc<Mutex<Vec<u8>>>);

        impl Write for VecWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Arc::new(Mutex::new(Vec::new()));
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || VecWriter(writer.clone()))
            .with_ansi(false)
            .finish();

        let dir = tempfile::tempdir().unwrap();
        tracing::subscriber::with_default(subscriber, || {
            string_engine(dir.path(), 5, 5);
        });

        let output = String::from_utf8(captured.lock().unwrap().clone()).unwrap();
        assert!(output.contains("created new channel"));
    }

    #[test]
    fn small_cache_forces_refill_scenario() {
        // Matches spec.md §8 scenario 5.
        let dir = tempfile::tempdir().unwrap();
        let engine = string_engine(dir.path(), 5, 1);

        engine.put("123".to_string()).unwrap();
        engine.put("456".to_string()).unwrap();
        engine.put("789".to_string()).unwrap();

        let (v, id) = engine.get().unwrap();
        assert_eq!((v.as_str(), id.as_str()), ("123", "aaaaa"));
        engine.release(&id).unwrap();

        let (v, id) = engine.get().unwrap();
        assert_eq!((v.as_str(), id.as_str()), ("456", "aaaab"));
        engine.release(&id).unwrap();
    }

    #[test]
    fn durability_and_recovery_resumes_undelivered_prefix() {
        // Matches spec.md §8 scenario 6.
        let dir = tempfile::tempdir().unwrap();
        let channel_id;
        {
            let engine = string_engine(dir.path(), 5, 1);
            channel_id = engine.channel_id().to_string();

            engine.put("123".to_string()).unwrap();
            engine.put("456".to_string()).unwrap();
            engine.put("789".to_string()).unwrap();
            engine.put("901".to_string()).unwrap();

            let (v, id) = engine.get().unwrap();
            assert_eq!(v, "123");
            engine.release(&id).unwrap();
            // Engine dropped here without calling destroy().
        }

        let cfg = PChannelConfig::resume(dir.path(), channel_id, 5, 1);
        let resumed = Engine::init(
            cfg,
            |s: &String| s.as_bytes().to_vec(),
            |b: &[u8]| String::from_utf8(b.to_vec()).map_err(|e| e.to_string()),
        )
        .unwrap();

        let (v, id) = resumed.get().unwrap();
        assert_eq!((v.as_str(), id.as_str()), ("456", "aaaab"));
        resumed.release(&id).unwrap();

        let (v, id) = resumed.get().unwrap();
        assert_eq!((v.as_str(), id.as_str()), ("789", "aaaac"));
        resumed.release(&id).unwrap();
    }

    #[test]
    fn release_removes_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = string_engine(dir.path(), 5, 5);
        engine.put("v1".to_string()).unwrap();
        let (_, id) = engine.get().unwrap();

        let path = dir.path().join(engine.channel_id()).join(&id);
        assert!(path.exists());
        engine.release(&id).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn release_of_missing_id_errors() {
        let dir = tempfile::tempdir().unwrap();
        let engine = string_engine(dir.path(), 5, 5);
        assert!(engine.release("zzzzz").is_err());
    }

    #[test]
    fn destroy_removes_channel_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = string_engine(dir.path(), 5, 5);
        engine.put("v1".to_string()).unwrap();
        let channel_path = dir.path().join(engine.channel_id());
        assert!(channel_path.exists());
        engine.destroy().unwrap();
        assert!(!channel_path.exists());
    }

    #[test]
    fn concurrent_producers_never_collide_on_ids() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(string_engine(dir.path(), 1000, 50));

        let mut handles = Vec::new();
        for t in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                let mut ids = Vec::new();
                for i in 0..20 {
                    ids.push(engine.put(format!("t{t}-{i}")).unwrap());
                }
                ids
            }));
        }

        let mut all_ids = Vec::new();
        for h in handles {
            all_ids.extend(h.join().unwrap());
        }
        let before = all_ids.len();
        all_ids.sort();
        all_ids.dedup();
        assert_eq!(all_ids.len(), before);
    }

    #[test]
    fn cache_occupancy_never_exceeds_max_cache_count() {
        let dir = tempfile::tempdir().unwrap();
        let max_cache = 3;
        let engine = string_engine(dir.path(), 20, max_cache);

        for i in 0..10 {
            engine.put(format!("v{i}")).unwrap();
            let occupancy = engine.cache.lock().unwrap().count;
            assert!(occupancy <= max_cache);
        }
    }

    #[test]
    fn config_rejects_cache_count_at_or_above_msg_count() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PChannelConfig::new(dir.path(), 5, 5);
        let result = Engine::init(
            cfg,
            |s: &String| s.as_bytes().to_vec(),
            |b: &[u8]| String::from_utf8(b.to_vec()).map_err(|e| e.to_string()),
        );
        assert!(result.is_err());
    }
}
