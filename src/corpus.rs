//! Password corpora: batch recovery testing and candidate generation.
//!
//! - [`test_passwords`] runs every corpus token through the table and counts
//!   a success only when the recovered plaintext is the token itself.
//! - [`generate_corpus`] writes freshly generated candidates, one per line.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::stats::BatchTestReport;
use crate::table::RainbowTable;
use crate::timer::ElapsedTimer;

/// Progress is reported every this many processed passwords.
pub const PROGRESS_INTERVAL: usize = 100;

/// Test `passwords` against `table`. `on_progress` receives the cumulative
/// 1-based index every [`PROGRESS_INTERVAL`] items.
pub fn test_passwords<F: FnMut(usize)>(
    table: &RainbowTable,
    passwords: &[String],
    mut on_progress: F,
) -> BatchTestReport {
    let timer = ElapsedTimer::start();
    let mut successes = 0;
    for (i, pwd) in passwords.iter().enumerate() {
        let index = i + 1;
        if index % PROGRESS_INTERVAL == 0 {
            on_progress(index);
        }
        if table.test_word(pwd).as_deref() == Some(pwd.as_str()) {
            successes += 1;
        }
    }
    BatchTestReport {
        total: passwords.len(),
        successes,
        elapsed_secs: timer.elapsed_secs(),
    }
}

/// Write `n` generated passwords to `path`, truncating it first.
pub fn generate_corpus<P: AsRef<Path>>(table: &RainbowTable, n: usize, path: P) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for _ in 0..n {
        writeln!(out, "{}", table.random_password())?;
    }
    out.flush()
}
