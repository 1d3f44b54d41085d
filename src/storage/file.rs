//! File-backed message store
//!
//! Messages are kept in an append-only JSON Lines log, one record per line.
//! An append either lands as a complete, synced line or is rolled back by
//! truncating the file to its previous length. Reads and appends both go
//! through the held handle, which is reopened if the log at `path` was
//! removed or replaced underneath it.

use chrono::{DateTime, FixedOffset};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::error::{StorageError, StorageResult};
use super::message::Message;
use super::MessageStore;
use crate::logger;

/// Append-only JSON Lines message log
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Log handle; the lock also serialises reads against appends
    file: Mutex<File>,
}

impl FileStore {
    /// Open or create the log at `path`, creating parent directories.
    ///
    /// A final line without a trailing newline is terminated if it holds a
    /// complete record, and cut off if it is a torn write.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_log(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the handle, reopening the log if `path` no longer names it
    fn lock(&self) -> StorageResult<MutexGuard<'_, File>> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| StorageError::LockPoisoned("message log".to_string()))?;

        if !is_current(&self.path, &file)? {
            logger::log_warning(&format!(
                "Message log {} was moved or removed; reopening",
                self.path.display()
            ));
            *file = open_log(&self.path)?;
        }

        Ok(file)
    }
}

impl MessageStore for FileStore {
    fn save_message(
        &self,
        author: &str,
        content: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> StorageResult<Message> {
        let message = Message::new(author, content, timestamp, self.verify_username(author));

        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');

        let mut file = self.lock()?;
        append_line(&mut file, &line)?;

        Ok(message)
    }

    fn get_messages(&self) -> StorageResult<Vec<Message>> {
        let file = self.lock()?;
        let raw = read_all(&file)?;

        let mut messages = Vec::new();
        for (index, line) in raw.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Message>(line) {
                Ok(message) => messages.push(message),
                Err(e) => logger::log_warning(&format!(
                    "Skipping unreadable record at {}:{}: {e}",
                    self.path.display(),
                    index + 1
                )),
            }
        }

        Ok(messages)
    }
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(path)?;

    repair_tail(path, &file)?;
    Ok(file)
}

/// Whether `path` still refers to the file behind `file`
fn is_current(path: &Path, file: &File) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(on_disk) => Ok(same_file(&on_disk, &file.metadata()?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_: &fs::Metadata, _: &fs::Metadata) -> bool {
    true
}

/// Read the whole log from the start; appends still land at the end
fn read_all(mut file: &File) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut raw)?;
    Ok(raw)
}

/// Write one complete line and sync it, or leave the file as it was
fn append_line(file: &mut File, line: &[u8]) -> io::Result<()> {
    let previous_len = file.metadata()?.len();

    if let Err(e) = file.write_all(line).and_then(|()| file.sync_data()) {
        if let Err(rollback) = file.set_len(previous_len) {
            logger::log_error(&format!(
                "Failed to roll back partial message write: {rollback}"
            ));
        }
        return Err(e);
    }

    Ok(())
}

/// Make sure the log ends with a newline before the next append.
///
/// An unterminated final record that parses is kept and terminated; one that
/// does not parse is a torn write and is truncated away.
fn repair_tail(path: &Path, file: &File) -> io::Result<()> {
    let raw = read_all(file)?;
    if raw.is_empty() || raw.ends_with(b"\n") {
        return Ok(());
    }

    let keep = raw.iter().rposition(|b| *b == b'\n').map_or(0, |pos| pos + 1);
    let tail = &raw[keep..];

    if serde_json::from_slice::<Message>(tail).is_ok() {
        logger::log_warning(&format!(
            "Message log {} ends without a newline; terminating the last record",
            path.display()
        ));
        let mut writer = file;
        writer.write_all(b"\n")?;
        return writer.sync_data();
    }

    logger::log_warning(&format!(
        "Message log {} ends with a partial record; dropping {} trailing bytes",
        path.display(),
        tail.len()
    ));
    file.set_len(keep as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("board").join("messages.jsonl");

        let store = FileStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
        assert!(store.get_messages().unwrap().is_empty());
    }

    #[test]
    fn test_messages_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");

        {
            let store = FileStore::open(&path).unwrap();
            store
                .save_message("alice", "hello", ts("2025-01-16T10:45:32-05:00"))
                .unwrap();
            store
                .save_message("bob", "multi\nline", ts("2025-01-16T10:50:00-05:00"))
                .unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        let messages = store.get_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].author, "alice");
        assert_eq!(messages[0].timestamp_string(), "2025-01-16T10:45:32-05:00");
        assert_eq!(messages[1].content, "multi\nline");
    }

    #[test]
    fn test_one_record_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let store = FileStore::open(&path).unwrap();
        store
            .save_message("alice", "a\nb\nc", ts("2025-01-16T10:45:32-05:00"))
            .unwrap();
        store
            .save_message("bob", "d", ts("2025-01-16T10:45:33-05:00"))
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn test_torn_tail_is_dropped_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        {
            let store = FileStore::open(&path).unwrap();
            store
                .save_message("alice", "kept", ts("2025-01-16T10:45:32-05:00"))
                .unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(br#"{"content":"tru"#).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        store
            .save_message("bob", "after", ts("2025-01-16T10:46:00-05:00"))
            .unwrap();

        let contents: Vec<String> = store
            .get_messages()
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["kept", "after"]);
    }

    #[test]
    fn test_unreadable_line_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let store = FileStore::open(&path).unwrap();
        store
            .save_message("alice", "one", ts("2025-01-16T10:45:32-05:00"))
            .unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b"not json at all\n").unwrap();
        }
        store
            .save_message("bob", "two", ts("2025-01-16T10:45:33-05:00"))
            .unwrap();

        let messages = store.get_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].author, "bob");
    }

    #[test]
    fn test_deleted_log_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let store = FileStore::open(&path).unwrap();
        store
            .save_message("alice", "gone", ts("2025-01-16T10:45:32-05:00"))
            .unwrap();
        fs::remove_file(&path).unwrap();
        assert!(store.get_messages().unwrap().is_empty());
    }

    #[test]
    fn test_save_after_delete_is_listed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let store = FileStore::open(&path).unwrap();
        fs::remove_file(&path).unwrap();

        store
            .save_message("alice", "hello", ts("2025-01-16T10:45:32-05:00"))
            .unwrap();

        let messages = store.get_messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_after_rotation_goes_to_new_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let rotated = dir.path().join("messages.jsonl.1");
        let store = FileStore::open(&path).unwrap();
        store
            .save_message("alice", "before", ts("2025-01-16T10:45:32-05:00"))
            .unwrap();

        fs::rename(&path, &rotated).unwrap();
        fs::write(&path, b"").unwrap();
        store
            .save_message("bob", "after", ts("2025-01-16T10:46:00-05:00"))
            .unwrap();

        let contents: Vec<String> = store
            .get_messages()
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["after"]);
        assert_eq!(fs::read_to_string(&rotated).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_complete_unterminated_record_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let record = Message::new("alice", "last", ts("2025-01-16T10:45:32-05:00"), true);
        fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        let store = FileStore::open(&path).unwrap();
        store
            .save_message("bob", "next", ts("2025-01-16T10:46:00-05:00"))
            .unwrap();

        let messages = store.get_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], record);
        assert_eq!(messages[1].author, "bob");
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_concurrent_writers_and_reader() {
        const WRITERS: usize = 6;
        const PER_WRITER: usize = 20;

        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let store = Arc::new(FileStore::open(&path).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut last_seen = 0;
                while !done.load(Ordering::SeqCst) {
                    let count = store.get_messages().unwrap().len();
                    assert!(count >= last_seen);
                    last_seen = count;
                }
            })
        };

        let writers: Vec<_> = (0..WRITERS)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..PER_WRITER {
                        store
                            .save_message(
                                &format!("user{i}"),
                                &format!("message {j}"),
                                ts("2025-01-16T10:45:32-05:00"),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        reader.join().unwrap();

        assert_eq!(store.get_messages().unwrap().len(), WRITERS * PER_WRITER);
        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), WRITERS * PER_WRITER);
        for line in raw.lines() {
            serde_json::from_str::<Message>(line).unwrap();
        }
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let result = FileStore::open(blocker.join("messages.jsonl"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
