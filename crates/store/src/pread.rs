//! Positional reads that leave the write tail alone.

use std::fs::File;
use std::io;

#[cfg(unix)]
pub(crate) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
pub(crate) fn read_at(mut file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::io::{Seek, SeekFrom};
    use std::os::windows::fs::FileExt;
    // seek_read moves the cursor; put it back at the tail for the next flush.
    let n = file.seek_read(buf, offset)?;
    file.seek(SeekFrom::End(0))?;
    Ok(n)
}
