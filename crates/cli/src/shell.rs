use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use store::Store;

/// Runs the command loop until `EXIT`/`QUIT` or end of input, then closes
/// the store.
///
/// Store errors for a single command are reported as `ERR ...` lines and do
/// not stop the loop; only failing to write output or to close the store
/// does.
pub fn run<R: BufRead, W: Write>(store: &Store, input: R, out: &mut W) -> Result<()> {
    write!(out, "> ")?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim_start();
        let (cmd, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest),
            None => (trimmed, ""),
        };

        if !cmd.is_empty() {
            match cmd.to_uppercase().as_str() {
                "APPEND" => match store.append(rest.as_bytes()) {
                    Ok((n, pos)) => writeln!(out, "OK pos={} bytes={}", pos, n)?,
                    Err(e) => writeln!(out, "ERR append failed: {}", e)?,
                },
                "READ" => match rest.trim().parse::<u64>() {
                    Ok(pos) => match store.read(pos) {
                        Ok(data) if data.is_empty() => writeln!(out, "(empty)")?,
                        Ok(data) => writeln!(out, "{}", String::from_utf8_lossy(&data))?,
                        Err(e) => writeln!(out, "ERR read failed: {}", e)?,
                    },
                    Err(_) => writeln!(out, "ERR usage: READ pos")?,
                },
                "SIZE" => match store.size() {
                    Ok(size) => writeln!(out, "{}", size)?,
                    Err(e) => writeln!(out, "ERR size failed: {}", e)?,
                },
                "STATS" => writeln!(out, "{:?}", store)?,
                "EXIT" | "QUIT" => {
                    store.close().context("closing store")?;
                    writeln!(out, "bye")?;
                    return Ok(());
                }
                other => writeln!(out, "unknown command: {}", other)?,
            }
        }

        write!(out, "> ")?;
        out.flush()?;
    }

    store.close().context("closing store")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_script(store: &Store, script: &str) -> String {
        let mut out = Vec::new();
        run(store, Cursor::new(script.as_bytes()), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn append_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store.log")).unwrap();

        let out = run_script(&store, "APPEND hello\nREAD 0\nAPPEND !\nSIZE\nEXIT\n");

        assert!(out.contains("OK pos=0 bytes=13"));
        assert!(out.contains("> hello\n"));
        assert!(out.contains("OK pos=13 bytes=9"));
        assert!(out.contains("> 22\n"));
        assert!(out.ends_with("bye\n"));
        assert!(store.is_closed());
    }

    #[test]
    fn payload_keeps_inner_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store.log")).unwrap();

        let out = run_script(&store, "append a  b c\nread 0\n");
        assert!(out.contains("OK pos=0 bytes=14"));
        assert!(out.contains("a  b c"));
    }

    #[test]
    fn empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store.log")).unwrap();

        let out = run_script(&store, "APPEND\nREAD 0\n");
        assert!(out.contains("OK pos=0 bytes=8"));
        assert!(out.contains("(empty)"));
    }

    #[test]
    fn bad_input_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store.log")).unwrap();

        let out = run_script(&store, "READ\nREAD abc\nREAD 0\nFROB\n\n");
        assert_eq!(out.matches("ERR usage: READ pos").count(), 2);
        assert!(out.contains("ERR read failed: io error:"));
        assert!(out.contains("unknown command: FROB"));
    }

    #[test]
    fn end_of_input_closes_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.log");
        let store = Store::open(&path).unwrap();

        run_script(&store, "APPEND kept");
        assert!(store.is_closed());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 12);
    }
}
