//! Token input: whitespace-separated words from corpus files and from the
//! interactive command stream.
//!
//! Input bytes are decoded lossily on every path: invalid UTF-8 becomes
//! U+FFFD instead of an error.
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

/// Threshold in bytes above which corpus files are memory-mapped.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

pub type LineIter = Box<dyn Iterator<Item = io::Result<String>> + Send + 'static>;

pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes >= threshold_bytes
}

pub fn iter_lines_bufread<P: AsRef<Path>>(path: P) -> Result<LineIter> {
    let file = File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    Ok(Box::new(
        BufReader::new(file)
            .split(b'\n')
            .map(|line| line.map(|bytes| decode_line(&bytes))),
    ))
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn iter_lines_mmap<P: AsRef<Path>>(path: P) -> Result<LineIter> {
    let file = File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    // SAFETY: the corpus is opened read-only and only read for the lifetime
    // of the iterator.
    let mmap =
        unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.as_ref().display()))?;
    Ok(Box::new(MmapLines { mmap, pos: 0 }))
}

struct MmapLines {
    mmap: Mmap,
    pos: usize,
}

impl Iterator for MmapLines {
    type Item = io::Result<String>;
    fn next(&mut self) -> Option<Self::Item> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() {
            return None;
        }
        let start = self.pos;
        let end = match memchr::memchr(b'\n', &data[start..]) {
            Some(off) => start + off,
            None => data.len(),
        };
        self.pos = end + 1;
        Some(Ok(decode_line(&data[start..end])))
    }
}

pub fn iter_lines_auto<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> Result<LineIter> {
    let meta =
        std::fs::metadata(&path).with_context(|| format!("stat {}", path.as_ref().display()))?;
    if meta.is_file() && should_use_mmap(meta.len(), threshold_bytes) {
        iter_lines_mmap(path)
    } else {
        iter_lines_bufread(path)
    }
}

/// Read every whitespace-separated token of a corpus file, in order.
pub fn read_tokens<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    for line in iter_lines_auto(&path, threshold_bytes)? {
        let line = line.with_context(|| format!("read {}", path.as_ref().display()))?;
        tokens.extend(line.split_whitespace().map(str::to_string));
    }
    Ok(tokens)
}

/// Lazily yields whitespace-separated tokens from a reader, pulling a new
/// line only when the buffered ones are exhausted.
pub struct TokenStream<R> {
    reader: R,
    pending: VecDeque<String>,
}

impl<R: BufRead> TokenStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
        }
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return Ok(Some(tok));
            }
            let mut line = Vec::new();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(None);
            }
            self.pending.extend(
                String::from_utf8_lossy(&line)
                    .split_whitespace()
                    .map(str::to_string),
            );
        }
    }

    /// Drop whatever is left of the current line.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;

    #[test]
    fn token_stream_spans_lines() {
        let mut ts = TokenStream::new(Cursor::new("new 10\n\n  20 abc\t4 md5\nquit"));
        let mut got = Vec::new();
        while let Some(t) = ts.next_token().unwrap() {
            got.push(t);
        }
        assert_eq!(got, vec!["new", "10", "20", "abc", "4", "md5", "quit"]);
    }

    #[test]
    fn discard_pending_skips_rest_of_line() {
        let mut ts = TokenStream::new(Cursor::new("bogus a b\nhelp\n"));
        assert_eq!(ts.next_token().unwrap().as_deref(), Some("bogus"));
        ts.discard_pending();
        assert_eq!(ts.next_token().unwrap().as_deref(), Some("help"));
        assert_eq!(ts.next_token().unwrap(), None);
    }

    #[test]
    fn token_stream_survives_invalid_utf8() {
        let mut ts = TokenStream::new(Cursor::new(&b"crack\xe9 x\nhelp\n"[..]));
        assert_eq!(ts.next_token().unwrap().as_deref(), Some("crack\u{FFFD}"));
        ts.discard_pending();
        assert_eq!(ts.next_token().unwrap().as_deref(), Some("help"));
    }

    #[test]
    fn read_tokens_same_for_mmap_and_bufread() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.txt");
        {
            let mut f = File::create(&path).unwrap();
            write!(f, "aaa bbb\r\nccc\n\n  ddd").unwrap();
        }
        let buffered = read_tokens(&path, u64::MAX).unwrap();
        let mapped = read_tokens(&path, 1).unwrap();
        assert_eq!(buffered, vec!["aaa", "bbb", "ccc", "ddd"]);
        assert_eq!(mapped, buffered);
    }

    #[test]
    fn read_tokens_decodes_invalid_utf8_on_both_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        fs_write(&path, b"abc\ncaf\xe9\nbca\n");
        let buffered = read_tokens(&path, u64::MAX).unwrap();
        let mapped = read_tokens(&path, 1).unwrap();
        assert_eq!(buffered, vec!["abc", "caf\u{FFFD}", "bca"]);
        assert_eq!(mapped, buffered);
    }

    fn fs_write(path: &Path, bytes: &[u8]) {
        File::create(path).unwrap().write_all(bytes).unwrap();
    }

    #[test]
    fn read_tokens_missing_file_errors() {
        let dir = tempdir().unwrap();
        assert!(read_tokens(dir.path().join("missing.txt"), u64::MAX).is_err());
    }
}
