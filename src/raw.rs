//! Compact fixed-width table format for read-only consumers.
//!
//! Layout, all integers big-endian `u32`:
//!
//! ```text
//! record_count
//! record_count x (f, p, q)
//! level_count
//! level_count x (len, len x f)
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::checkpoint::{read_savepoint, Savepoint};
use crate::error::{Error, InvariantViolation};
use crate::func::{Func, Record};

fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn write_len<W: Write>(w: &mut W, len: usize) -> io::Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "count exceeds u32"))?;
    write_u32(w, len)
}

/// Caps up-front allocation so a corrupt count fails on read, not on alloc.
fn capacity(count: u32) -> usize {
    (count as usize).min(1 << 16)
}

pub fn write_raw<W: Write>(w: &mut W, sp: &Savepoint) -> io::Result<()> {
    write_len(w, sp.howto.len())?;
    for r in &sp.howto {
        write_u32(w, r.f.0)?;
        write_u32(w, r.p.0)?;
        write_u32(w, r.q.0)?;
    }
    write_len(w, sp.by_size.len())?;
    for level in &sp.by_size {
        write_len(w, level.len())?;
        for f in level {
            write_u32(w, f.0)?;
        }
    }
    Ok(())
}

pub fn read_raw<R: Read>(r: &mut R) -> io::Result<Savepoint> {
    let count = read_u32(r)?;
    let mut howto = Vec::with_capacity(capacity(count));
    for _ in 0..count {
        let f = Func(read_u32(r)?);
        let p = Func(read_u32(r)?);
        let q = Func(read_u32(r)?);
        howto.push(Record::new(f, p, q));
    }
    let levels = read_u32(r)?;
    let mut by_size = Vec::with_capacity(capacity(levels));
    for _ in 0..levels {
        let len = read_u32(r)?;
        let mut level = Vec::with_capacity(capacity(len));
        for _ in 0..len {
            level.push(Func(read_u32(r)?));
        }
        by_size.push(level);
    }
    Ok(Savepoint { howto, by_size })
}

pub fn load_raw(path: &Path) -> io::Result<Savepoint> {
    let mut r = BufReader::new(File::open(path)?);
    read_raw(&mut r)
}

/// Converts a checkpoint into the raw format, then reads the output back
/// and checks it against the checkpoint.
pub fn convert(input: &Path, output: &Path) -> Result<Savepoint, Error> {
    let sp = read_savepoint(input)?;
    log::info!(
        "read {} records in {} levels from {}",
        sp.howto.len(),
        sp.by_size.len(),
        input.display()
    );

    let mut w = BufWriter::new(File::create(output)?);
    write_raw(&mut w, &sp)?;
    w.flush()?;
    drop(w);

    let back = load_raw(output)?;
    if back != sp {
        return Err(InvariantViolation::ConversionMismatch.into());
    }
    log::info!("wrote {}", output.display());
    Ok(sp)
}
