//! # Store — append-only record file
//!
//! A single file holding variable-length records, each addressed by the byte
//! offset (its **position**) at which the record begins.
//!
//! Appends go through an in-memory write buffer. Every read path flushes that
//! buffer first, so a read issued right after an append on the same store
//! always observes it, even though nothing has been fsynced.
//!
//! ## Binary Record Format
//!
//! ```text
//! [len: u64 BE][payload: len bytes]
//! ```
//!
//! Records are packed back-to-back with no header, footer, checksum, or
//! padding. A position always points at a length prefix.
//!
//! ## Example
//!
//! ```rust,no_run
//! use store::Store;
//!
//! let store = Store::open("store.log").unwrap();
//! let (n, pos) = store.append(b"hello").unwrap();
//! assert_eq!(n, 13);
//! assert_eq!(store.read(pos).unwrap(), b"hello");
//! store.close().unwrap();
//! ```

mod pread;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, trace, warn};

/// Width in bytes of the length prefix in front of every record.
pub const LEN_WIDTH: u64 = 8;

/// Write buffer capacity used by [`Store::new`] and [`Store::open`] (8 KiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An underlying I/O error, including short reads.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The store has already been closed.
    #[error("store is closed")]
    Closed,
}

/// State guarded by the store's lock. The file is only reachable through
/// `writer`, so every touch of the handle happens inside the critical section.
struct Inner {
    writer: BufWriter<File>,
    /// Offset at which the next append lands.
    size: u64,
}

/// Append-only record store over a single file.
///
/// All operations take the same mutex for their whole duration (including
/// any flush they trigger), so operations on one store never interleave.
/// Share it between threads with `Arc<Store>`.
///
/// The store is **Open** until [`close`](Store::close) succeeds or fails;
/// after that every call returns [`StoreError::Closed`].
pub struct Store {
    inner: Mutex<Option<Inner>>,
}

impl Store {
    /// Opens (or creates) the file at `path` without truncating it and wraps
    /// it in a store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_capacity(path, DEFAULT_BUFFER_CAPACITY)
    }

    /// Like [`open`](Store::open) but with an explicit write buffer capacity.
    pub fn open_with_capacity<P: AsRef<Path>>(
        path: P,
        capacity: usize,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        debug!(path = %path.display(), "opening record store");
        Self::with_capacity(file, capacity)
    }

    /// Wraps an already-open, readable and writable file.
    ///
    /// The current file length becomes the store's size, so pre-existing
    /// content is preserved and the first append lands right after it. No
    /// scan of record boundaries is performed.
    pub fn new(file: File) -> Result<Self, StoreError> {
        Self::with_capacity(file, DEFAULT_BUFFER_CAPACITY)
    }

    /// Like [`new`](Store::new) but with an explicit write buffer capacity.
    pub fn with_capacity(mut file: File, capacity: usize) -> Result<Self, StoreError> {
        let size = file.metadata()?.len();
        // Appends must land at the tail even if the handle was not opened in
        // append mode or its cursor was moved by the caller.
        file.seek(SeekFrom::Start(size))?;
        debug!(size, capacity, "record store ready");
        Ok(Self {
            inner: Mutex::new(Some(Inner {
                writer: BufWriter::with_capacity(capacity, file),
                size,
            })),
        })
    }

    /// Appends `data` as a new record.
    ///
    /// Returns `(bytes_written, position)` where `bytes_written` is
    /// `8 + data.len()` and `position` is the offset of the record's length
    /// prefix. The size only advances once both the prefix and the payload
    /// were accepted by the buffer.
    ///
    /// The record may sit in the write buffer until the next read, close, or
    /// buffer overflow.
    pub fn append(&self, data: &[u8]) -> Result<(u64, u64), StoreError> {
        let mut guard = self.lock();
        let inner = guard.as_mut().ok_or(StoreError::Closed)?;

        let pos = inner.size;
        // If the payload write fails after the prefix was buffered, the prefix
        // stays in the buffer and the next record lands after it, past `size`.
        inner.writer.write_u64::<BigEndian>(data.len() as u64)?;
        inner.writer.write_all(data)?;

        let written = LEN_WIDTH + data.len() as u64;
        inner.size += written;
        trace!(pos, written, "appended record");
        Ok((written, pos))
    }

    /// Reads the record whose length prefix starts at `pos`.
    ///
    /// `pos` must be a value previously returned by [`append`](Store::append).
    /// Reading past the end of the store fails with an I/O error of kind
    /// `UnexpectedEof`; no other validation is done.
    pub fn read(&self, pos: u64) -> Result<Vec<u8>, StoreError> {
        let mut guard = self.lock();
        let inner = guard.as_mut().ok_or(StoreError::Closed)?;
        inner.writer.flush()?;
        let file = inner.writer.get_ref();

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        read_exact_at(file, &mut len_buf, pos)?;
        let len = BigEndian::read_u64(&len_buf);

        // A garbage prefix must not drive the allocation below.
        let start = pos + LEN_WIDTH;
        if start.checked_add(len).map_or(true, |end| end > inner.size) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "record extends past end of store",
            )));
        }
        let len = usize::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "record length exceeds usize")
        })?;

        let mut data = vec![0u8; len];
        read_exact_at(file, &mut data, start)?;
        trace!(pos, len, "read record");
        Ok(data)
    }

    /// Raw positional read of up to `buf.len()` bytes at absolute `offset`.
    ///
    /// Flushes buffered appends first. Returns the number of bytes read,
    /// which is short only when the end of the file is reached.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StoreError> {
        let mut guard = self.lock();
        let inner = guard.as_mut().ok_or(StoreError::Closed)?;
        inner.writer.flush()?;
        Ok(read_full_at(inner.writer.get_ref(), buf, offset)?)
    }

    /// Returns the offset at which the next append will land.
    pub fn size(&self) -> Result<u64, StoreError> {
        let guard = self.lock();
        guard.as_ref().map(|inner| inner.size).ok_or(StoreError::Closed)
    }

    /// Returns `true` once [`close`](Store::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Flushes buffered appends and releases the file handle.
    ///
    /// The store is closed even when the flush fails; the flush error is
    /// returned and any unflushed bytes are discarded.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.lock();
        let mut inner = guard.take().ok_or(StoreError::Closed)?;
        if let Err(e) = inner.writer.flush() {
            // into_parts hands back the buffer so BufWriter's Drop does not
            // retry the flush behind the caller's back.
            let (_file, unflushed) = inner.writer.into_parts();
            let lost = unflushed.map_or(0, |buf| buf.len());
            warn!(error = %e, lost, "record store closed with unflushed bytes");
            return Err(e.into());
        }
        debug!(size = inner.size, "record store closed");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Inner>> {
        // `size` only moves after successful writes, so the state behind a
        // poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(inner) = inner.as_mut() {
            if let Err(e) = inner.writer.flush() {
                warn!(error = %e, "failed to flush record store on drop");
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.lock();
        match guard.as_ref() {
            Some(inner) => f
                .debug_struct("Store")
                .field("size", &inner.size)
                .field("buffered", &inner.writer.buffer().len())
                .finish(),
            None => f.debug_struct("Store").field("closed", &true).finish(),
        }
    }
}

/// Reads until `buf` is full or end-of-file, returning the byte count.
fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match pread::read_at(file, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Like [`read_full_at`] but a short count is an `UnexpectedEof` error.
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    if read_full_at(file, buf, offset)? < buf.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "short read from record store",
        ));
    }
    Ok(())
}
