//! Level-by-level checkpoints of the discovery history.
//!
//! A checkpoint holds every construction record in discovery order and the
//! per-level buckets, encoded with bincode. Files are written to a temporary
//! name and renamed into place, so a reader only ever sees complete files.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::func::{Func, Record, Universe};

#[derive(Debug)]
pub enum CheckpointError {
    Io(io::Error),
    Encode(Box<bincode::ErrorKind>),
    Inconsistent(String),
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for CheckpointError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        Self::Encode(e)
    }
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "checkpoint i/o: {e}"),
            Self::Encode(e) => write!(f, "checkpoint encoding: {e}"),
            Self::Inconsistent(msg) => write!(f, "inconsistent checkpoint: {msg}"),
        }
    }
}

impl std::error::Error for CheckpointError {}

/// Everything needed to resume a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Savepoint {
    /// Construction records in discovery order.
    pub howto: Vec<Record>,
    /// `by_size[k]` lists the canonical functions of minimal size `k`.
    pub by_size: Vec<Vec<Func>>,
}

/// Borrowed view of a [`Savepoint`]; encodes to the same bytes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SavepointRef<'a> {
    pub howto: &'a [Record],
    pub by_size: &'a [Vec<Func>],
}

impl Savepoint {
    pub fn view(&self) -> SavepointRef<'_> {
        SavepointRef {
            howto: &self.howto,
            by_size: &self.by_size,
        }
    }

    /// Index of the last level held.
    pub const fn level(&self) -> Option<usize> {
        self.by_size.len().checked_sub(1)
    }

    /// Checks that the records list exactly the bucket members, in order.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        let total: usize = self.by_size.iter().map(Vec::len).sum();
        if total != self.howto.len() {
            return Err(CheckpointError::Inconsistent(format!(
                "{} records for {total} bucket entries",
                self.howto.len()
            )));
        }
        let bucket_entries = self
            .by_size
            .iter()
            .enumerate()
            .flat_map(|(size, bucket)| bucket.iter().map(move |&f| (size, f)));
        for (n, ((size, f), record)) in bucket_entries.zip(&self.howto).enumerate() {
            if record.f != f {
                return Err(CheckpointError::Inconsistent(format!(
                    "record {n} is {} but level {size} lists {f}",
                    record.f
                )));
            }
        }
        Ok(())
    }

    /// Checks that every value is a function of `universe` and every
    /// recorded `f` has its top bit clear.
    pub fn check_range(&self, universe: &Universe) -> Result<(), CheckpointError> {
        for (n, r) in self.howto.iter().enumerate() {
            if ![r.f, r.p, r.q].into_iter().all(|v| universe.contains(v)) {
                return Err(CheckpointError::Inconsistent(format!(
                    "record {n} ({}, {}, {}) is wider than {} variables",
                    r.f,
                    r.p,
                    r.q,
                    universe.vars()
                )));
            }
            if !universe.top_clear(r.f) {
                return Err(CheckpointError::Inconsistent(format!(
                    "record {n} has {} with the top bit set",
                    r.f
                )));
            }
        }
        Ok(())
    }
}

/// Opens `path`, or the concatenation of `path.aa` and `path.ab` when only
/// the split halves exist.
pub fn open_maybe_split(path: &Path) -> io::Result<Box<dyn Read>> {
    match File::open(path) {
        Ok(f) => Ok(Box::new(f)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let with_suffix = |suffix: &str| {
                let mut name = path.as_os_str().to_owned();
                name.push(suffix);
                PathBuf::from(name)
            };
            let first = File::open(with_suffix(".aa")).map_err(|_| e)?;
            let second = File::open(with_suffix(".ab"))?;
            Ok(Box::new(first.chain(second)))
        }
        Err(e) => Err(e),
    }
}

pub fn read_savepoint(path: &Path) -> Result<Savepoint, CheckpointError> {
    let reader = BufReader::new(open_maybe_split(path)?);
    let sp: Savepoint = bincode::deserialize_from(reader)?;
    sp.validate()?;
    Ok(sp)
}

/// Directory of checkpoints for one (variable count, operator set) run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    prefix: String,
    vars: usize,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(dir: P, vars: usize, xor: bool) -> Self {
        let xor_prefix = if xor { "xor." } else { "" };
        Self {
            dir: dir.into(),
            prefix: format!("{xor_prefix}npn.{vars}"),
            vars,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, level: usize) -> PathBuf {
        self.dir.join(format!("{}.{level}.ckpt", self.prefix))
    }

    /// Writes the checkpoint for `level`.
    ///
    /// The data goes to a temporary file in the same directory that is
    /// synced and then renamed over the final name; on failure the previous
    /// file for `level`, if any, is left as it was.
    pub fn save(&self, sp: SavepointRef<'_>, level: usize) -> Result<PathBuf, CheckpointError> {
        let path = self.path(level);
        self.write_atomic(&path, |w| Ok(bincode::serialize_into(w, &sp)?))?;
        log::debug!("wrote {}", path.display());
        Ok(path)
    }

    fn write_atomic<F>(&self, path: &Path, write: F) -> Result<(), CheckpointError>
    where
        F: FnOnce(&mut BufWriter<&mut tempfile::NamedTempFile>) -> Result<(), CheckpointError>,
    {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut w = BufWriter::new(&mut tmp);
            write(&mut w)?;
            w.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| CheckpointError::Io(e.error))?;
        // the rename itself is only durable once the directory is synced
        #[cfg(unix)]
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    /// Reads the checkpoint for `level` and checks it against the run's
    /// variable count.
    pub fn load(&self, level: usize) -> Result<Savepoint, CheckpointError> {
        let universe =
            Universe::new(self.vars).map_err(|e| CheckpointError::Inconsistent(e.to_string()))?;
        let sp = read_savepoint(&self.path(level))?;
        if sp.level() != Some(level) {
            return Err(CheckpointError::Inconsistent(format!(
                "file for level {level} holds {} levels",
                sp.by_size.len()
            )));
        }
        sp.check_range(&universe)?;
        Ok(sp)
    }

    /// Loadable checkpoints at or below `max_level`, newest first.
    ///
    /// Missing files are skipped silently, unreadable ones with a warning.
    /// Level 0 is never checkpointed.
    pub fn newest_first(&self, max_level: usize) -> impl Iterator<Item = (usize, Savepoint)> + '_ {
        (1..=max_level).rev().filter_map(|level| match self.load(level) {
            Ok(sp) => Some((level, sp)),
            Err(CheckpointError::Io(e)) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("skipping {}: {e}", self.path(level).display());
                None
            }
        })
    }

    /// Finds the newest loadable checkpoint at or below `max_level`.
    pub fn latest(&self, max_level: usize) -> Option<(usize, Savepoint)> {
        self.newest_first(max_level).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Savepoint {
        Savepoint {
            howto: vec![
                Record::new(Func(0x3), Func(0x3), Func(0)),
                Record::new(Func(0x1), Func(0x3), Func(0x5)),
                Record::new(Func(0x0), Func(0xC), Func(0x3)),
            ],
            by_size: vec![vec![Func(0x3)], vec![Func(0x1), Func(0x0)]],
        }
    }

    #[test]
    fn validate_accepts_matching_records() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_order_records() {
        let mut sp = sample();
        sp.howto.swap(1, 2);
        assert!(matches!(sp.validate(), Err(CheckpointError::Inconsistent(_))));
        sp.howto.pop();
        assert!(matches!(sp.validate(), Err(CheckpointError::Inconsistent(_))));
    }

    #[test]
    fn borrowed_view_encodes_like_owned() {
        let sp = sample();
        let owned = bincode::serialize(&sp).expect("encode");
        let borrowed = bincode::serialize(&sp.view()).expect("encode");
        assert_eq!(owned, borrowed);
    }

    #[test]
    fn check_range_rejects_values_outside_the_universe() {
        let u = Universe::new(2).expect("two variables");
        assert!(sample().check_range(&u).is_ok());

        let mut wide = sample();
        wide.howto[2].q = Func(0x13);
        assert!(matches!(wide.check_range(&u), Err(CheckpointError::Inconsistent(_))));

        let mut top = sample();
        top.howto[1].f = Func(0x9);
        top.by_size[1][0] = Func(0x9);
        assert!(top.validate().is_ok());
        assert!(matches!(top.check_range(&u), Err(CheckpointError::Inconsistent(_))));
    }

    #[test]
    fn failed_write_keeps_the_previous_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(dir.path(), 2, false);
        let sp = sample();
        let path = store.save(sp.view(), 1).expect("save");
        let before = std::fs::read(&path).expect("read");

        let result = store.write_atomic(&path, |w| {
            w.write_all(b"half a checkpoint")?;
            Err(CheckpointError::Inconsistent("interrupted".to_owned()))
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).expect("read"), before);
        assert_eq!(store.load(1).expect("load"), sp);
        // the temporary file is gone too
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 1);
    }

    #[test]
    fn store_names_files_by_run_and_level() {
        let store = CheckpointStore::new("/tmp/ckpt", 4, true);
        assert_eq!(store.path(7), PathBuf::from("/tmp/ckpt/xor.npn.4.7.ckpt"));
        let store = CheckpointStore::new("/tmp/ckpt", 5, false);
        assert_eq!(store.path(28), PathBuf::from("/tmp/ckpt/npn.5.28.ckpt"));
    }
}
