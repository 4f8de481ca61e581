// File-Backed Log Store
//
// Journals every append and trim as one JSON line in
// `<path>/<log_name>.log`. Opening an existing journal replays it,
// dropping a torn final line left by a failed write.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::memory::EntryTable;
use super::{LogError, LogStore, Position};

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Frame {
    Append { position: Position, data: Vec<u8> },
    Trim { position: Position },
}

#[derive(Debug)]
struct Journal {
    entries: EntryTable,
    file: File,
}

impl Journal {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(frame).map_err(io::Error::from)?;
        line.push(b'\n');
        append_line(&mut self.file, &line)?;
        Ok(())
    }
}

/// Journal target that can be cut back to an earlier length.
trait Truncate: Write {
    fn len(&self) -> io::Result<u64>;

    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write one complete line or leave the journal as it was.
fn append_line<F: Truncate>(file: &mut F, line: &[u8]) -> io::Result<()> {
    let len = file.len()?;
    let written = file.write_all(line).and_then(|()| file.flush());

    if let Err(err) = written {
        if let Err(rollback) = file.truncate(len) {
            // replay drops the torn line on the next open
            warn!(len, %err, %rollback, "failed to roll back journal write");
        }
        return Err(err);
    }
    Ok(())
}

/// Log store persisted to a JSON-lines journal.
#[derive(Debug)]
pub struct FileLogStore {
    path: PathBuf,
    journal: Mutex<Journal>,
}

impl FileLogStore {
    /// Open (or create) the journal for `log_name` under `dir`.
    pub fn open(
        dir: &Path,
        log_name: &str,
        max_entry_size: Option<usize>,
    ) -> Result<Self, LogError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{log_name}.log"));

        let mut entries = EntryTable::new(max_entry_size);
        let mut torn_at = None;
        if path.exists() {
            torn_at = replay(&path, &mut entries)?;
            debug!(path = %path.display(), tail = entries.tail(), "replayed journal");
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if let Some(len) = torn_at {
            warn!(path = %path.display(), len, "truncating torn journal tail");
            file.set_len(len)?;
        }

        Ok(Self {
            path,
            journal: Mutex::new(Journal { entries, file }),
        })
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Rebuild `entries` from the journal.
///
/// A final line without its newline was never acknowledged; its offset
/// is returned so the caller can cut it off. Any other bad line is
/// corruption.
fn replay(path: &Path, entries: &mut EntryTable) -> Result<Option<u64>, LogError> {
    let corrupt = |line_no: usize, reason: String| LogError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("line {line_no}: {reason}"),
    };

    let mut reader = BufReader::new(File::open(path)?);
    let mut line = Vec::new();
    let mut offset = 0u64;
    let mut line_no = 0;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(None);
        }
        line_no += 1;

        if line.last() != Some(&b'\n') {
            return Ok(Some(offset));
        }
        offset += read as u64;

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let frame: Frame =
            serde_json::from_slice(&line).map_err(|err| corrupt(line_no, err.to_string()))?;

        match frame {
            Frame::Append { position, data } => {
                let expected = entries.tail();
                if position != expected {
                    return Err(corrupt(
                        line_no,
                        format!("append at {position}, expected {expected}"),
                    ));
                }
                entries.push(data);
            }
            Frame::Trim { position } => entries
                .invalidate(position)
                .map_err(|err| corrupt(line_no, err.to_string()))?,
        }
    }
}

impl LogStore for FileLogStore {
    fn append(&self, data: &[u8]) -> Result<Position, LogError> {
        let mut journal = self.journal.lock();
        journal.entries.check_size(data)?;

        let position = journal.entries.tail();
        let frame = Frame::Append {
            position,
            data: data.to_vec(),
        };
        journal.write_frame(&frame)?;

        if let Frame::Append { data, .. } = frame {
            journal.entries.push(data);
        }
        Ok(position)
    }

    fn read(&self, position: Position) -> Result<Vec<u8>, LogError> {
        self.journal.lock().entries.get(position).map(<[u8]>::to_vec)
    }

    fn trim(&self, position: Position) -> Result<(), LogError> {
        let mut journal = self.journal.lock();
        if journal.entries.is_trimmed(position)? {
            return Ok(());
        }

        journal.write_frame(&Frame::Trim { position })?;
        journal.entries.invalidate(position)
    }

    fn tail(&self) -> Position {
        self.journal.lock().entries.tail()
    }
}
