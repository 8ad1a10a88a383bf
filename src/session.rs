//! Interactive command session.
//!
//! A [`Session`] reads one verb at a time from its token stream, pulls that
//! verb's parameters from the same stream, and runs the matching handler
//! against the table held in its [`TableSlot`]. Every verb except `help`,
//! `new`, `load` and `quit` needs a table; that check happens before any
//! parameter is read, and a rejected command discards the rest of its line.
//!
//! Handler output goes to `out`; file and engine failures go to `err`.
//! Nothing a handler does ends the session except `quit` or end of input.
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use colored::Colorize;
use log::{debug, warn};

use crate::corpus::{generate_corpus, test_passwords};
use crate::hash::{KNOWN_HASHES, hash_method_by_name};
use crate::io::{DEFAULT_MMAP_THRESHOLD_BYTES, TokenStream, read_tokens};
use crate::slot::TableSlot;
use crate::table::{RainbowTable, TableError};
use crate::timer::{format_secs, timed};

pub const BANNER: &str = "Enter 'help' to learn the commands.\n\
                          You should first create or load a new rainbow table.";

pub const PROMPT: &str = ">>> ";

pub const NO_TABLE: &str = "***You need to create or load a table first.";

pub const HELP: &str = "\
help -- Displays this menu.
new ncols nrows chars pwdLength hash --
    Builds a table of nrows chains, ncols columns each, over passwords of
    length pwdLength drawn from chars, using hash function hash
    ('md5' is the only one available).
crackH hash -- Tries to recover the password behind hash.
crackW word -- Hashes word, then tries to recover it from that hash.
save file -- Writes the current table to file.
load file -- Reads a table from file.
genPwd n file -- Writes n random valid passwords to file, one per line.
testPwd file -- Tries to recover every password listed in file.
quit -- Leaves the shell.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Help,
    New,
    Load,
    CrackHash,
    CrackWord,
    Save,
    GenPwd,
    TestPwd,
    Quit,
}

impl Verb {
    pub fn from_token(token: &str) -> Option<Self> {
        let verb = match token {
            "help" => Verb::Help,
            "new" => Verb::New,
            "load" => Verb::Load,
            "crackH" => Verb::CrackHash,
            "crackW" => Verb::CrackWord,
            "save" => Verb::Save,
            "genPwd" => Verb::GenPwd,
            "testPwd" => Verb::TestPwd,
            "quit" => Verb::Quit,
            _ => return None,
        };
        Some(verb)
    }

    pub fn requires_table(self) -> bool {
        !matches!(self, Verb::Help | Verb::New | Verb::Load | Verb::Quit)
    }

    /// Names of the positional parameters read after the verb.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            Verb::Help | Verb::Quit => &[],
            Verb::New => &["ncols", "nrows", "chars", "pwdLength", "hash"],
            Verb::Load | Verb::Save | Verb::TestPwd => &["file"],
            Verb::CrackHash => &["hash"],
            Verb::CrackWord => &["word"],
            Verb::GenPwd => &["n", "file"],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("invalid value '{value}' for {name}")]
    Invalid { name: &'static str, value: String },
}

fn parse_param<T: FromStr>(name: &'static str, value: &str) -> Result<T, ParamError> {
    value.parse().map_err(|_| ParamError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Suppress banner and prompt.
    pub silent: bool,
    /// Corpus files at least this large are memory-mapped.
    pub mmap_threshold: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            silent: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD_BYTES,
        }
    }
}

pub struct Session<R, W, E> {
    tokens: TokenStream<R>,
    out: W,
    err: E,
    table: Arc<TableSlot<RainbowTable>>,
    options: SessionOptions,
}

impl<R: BufRead, W: Write, E: Write> Session<R, W, E> {
    pub fn new(input: R, out: W, err: E, options: SessionOptions) -> Self {
        Self {
            tokens: TokenStream::new(input),
            out,
            err,
            table: Arc::new(TableSlot::new()),
            options,
        }
    }

    /// Non-owning handle to the active table slot, for the interrupt path.
    pub fn table_slot(&self) -> Weak<TableSlot<RainbowTable>> {
        Arc::downgrade(&self.table)
    }

    pub fn has_table(&self) -> bool {
        self.table.is_occupied()
    }

    pub fn table(&self) -> Option<Arc<RainbowTable>> {
        self.table.current()
    }

    /// Run the command loop until `quit` or end of input.
    pub fn run(&mut self) -> io::Result<()> {
        if !self.options.silent {
            writeln!(self.out, "{}", BANNER)?;
        }
        loop {
            if !self.options.silent {
                write!(self.out, "{}", PROMPT)?;
                self.out.flush()?;
            }
            let Some(token) = self.tokens.next_token()? else {
                debug!("end of input");
                break;
            };
            if self.dispatch(&token)? == Flow::Quit {
                break;
            }
        }
        self.out.flush()
    }

    /// Route one verb: check the table precondition, read the verb's
    /// parameters, then run its handler.
    pub fn dispatch(&mut self, token: &str) -> io::Result<Flow> {
        let Some(verb) = Verb::from_token(token) else {
            writeln!(self.out, "{} is not a valid command.", token)?;
            self.tokens.discard_pending();
            return Ok(Flow::Continue);
        };
        if verb.requires_table() && !self.table.is_occupied() {
            self.report_no_table()?;
            self.tokens.discard_pending();
            return Ok(Flow::Continue);
        }
        let mut params = Vec::with_capacity(verb.params().len());
        for _ in verb.params() {
            match self.tokens.next_token()? {
                Some(p) => params.push(p),
                None => return Ok(Flow::Quit),
            }
        }
        debug!("dispatch {:?} {:?}", verb, params);
        match verb {
            Verb::Help => writeln!(self.out, "{}", HELP)?,
            Verb::New => self.new_table(&params)?,
            Verb::Load => self.load_table(&params[0])?,
            Verb::CrackHash => self.crack_hash(&params[0])?,
            Verb::CrackWord => self.crack_word(&params[0])?,
            Verb::Save => self.save_table(&params[0])?,
            Verb::GenPwd => self.generate_passwords(&params[0], &params[1])?,
            Verb::TestPwd => self.test_password_file(&params[0])?,
            Verb::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn report_no_table(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", NO_TABLE.red())
    }

    /// Table for a handler, or the missing-table diagnostic if the slot
    /// was emptied after the gate passed.
    fn active_table(&mut self) -> io::Result<Option<Arc<RainbowTable>>> {
        let table = self.table();
        if table.is_none() {
            self.report_no_table()?;
        }
        Ok(table)
    }

    fn diagnostic(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.err, "{}", msg.red())
    }

    fn install(&mut self, table: RainbowTable) {
        let previous = self.table.replace(table);
        debug!("installed table (replaced existing: {})", previous.is_some());
        drop(previous);
    }

    fn new_table(&mut self, params: &[String]) -> io::Result<()> {
        let parsed = (|| -> Result<(usize, usize, usize), ParamError> {
            Ok((
                parse_param("ncols", &params[0])?,
                parse_param("nrows", &params[1])?,
                parse_param("pwdLength", &params[3])?,
            ))
        })();
        let (ncols, nrows, pwd_length) = match parsed {
            Ok(v) => v,
            Err(e) => return self.diagnostic(&format!("{}.", e)),
        };
        let (chars, hash_name) = (&params[2], &params[4]);
        let Some(hash) = hash_method_by_name(hash_name) else {
            return self.diagnostic(&format!(
                "Unknown hash function '{}' (available: {}).",
                hash_name,
                KNOWN_HASHES.join(", ")
            ));
        };
        let (built, secs) = timed(|| RainbowTable::build(ncols, nrows, chars, pwd_length, hash));
        match built {
            Ok(table) => {
                self.install(table);
                writeln!(self.out, "Table generated ({} seconds)", format_secs(secs))
            }
            Err(e) => self.diagnostic(&format!("Could not generate table: {}.", e)),
        }
    }

    /// Replace the active table with one read from `path`. On failure the
    /// slot is left empty.
    pub fn load_table<P: AsRef<Path>>(&mut self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        let (loaded, secs) = timed(|| RainbowTable::load(path));
        match loaded {
            Ok(table) => {
                self.install(table);
                writeln!(self.out, "Table loaded ({} seconds)", format_secs(secs))
            }
            Err(e) => {
                warn!("failed to load {}: {}", path.display(), e);
                drop(self.table.take());
                self.diagnostic(&format!("Could not read from file \"{}\".", path.display()))
            }
        }
    }

    fn crack_hash(&mut self, hash: &str) -> io::Result<()> {
        let Some(table) = self.active_table()? else {
            return Ok(());
        };
        let (result, secs) = timed(|| table.crack_hash(hash));
        match result {
            Ok(found) => writeln!(
                self.out,
                "'{}' --> {} ({} seconds)",
                hash,
                render_result(found.as_deref()),
                format_secs(secs)
            ),
            Err(e @ TableError::InvalidDigest(..)) => self.diagnostic(&format!("{}.", e)),
            Err(e) => self.diagnostic(&format!("Could not crack '{}': {}.", hash, e)),
        }
    }

    fn crack_word(&mut self, word: &str) -> io::Result<()> {
        let Some(table) = self.active_table()? else {
            return Ok(());
        };
        let (found, secs) = timed(|| table.test_word(word));
        writeln!(
            self.out,
            "'{}' --> '{}' --> {} ({} seconds)",
            word,
            table.hash_word(word),
            render_result(found.as_deref()),
            format_secs(secs)
        )
    }

    fn save_table(&mut self, path: &str) -> io::Result<()> {
        let Some(table) = self.active_table()? else {
            return Ok(());
        };
        let (saved, secs) = timed(|| table.save(path));
        match saved {
            Ok(()) => writeln!(self.out, "Table saved ({} seconds)", format_secs(secs)),
            Err(e) => {
                warn!("failed to save {}: {}", path, e);
                self.diagnostic(&format!("Could not write to file \"{}\".", path))
            }
        }
    }

    fn generate_passwords(&mut self, count: &str, path: &str) -> io::Result<()> {
        let Some(table) = self.active_table()? else {
            return Ok(());
        };
        let n: usize = match parse_param("n", count) {
            Ok(n) => n,
            Err(e) => return self.diagnostic(&format!("{}.", e)),
        };
        let (written, secs) = timed(|| generate_corpus(&table, n, path));
        if let Err(e) = written {
            warn!("failed to write {}: {}", path, e);
            self.diagnostic(&format!("Could not write to file \"{}\".", path))?;
        }
        writeln!(
            self.out,
            "Password file generated ({} seconds)",
            format_secs(secs)
        )
    }

    fn test_password_file(&mut self, path: &str) -> io::Result<()> {
        let Some(table) = self.active_table()? else {
            return Ok(());
        };
        let passwords = match read_tokens(path, self.options.mmap_threshold) {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to read {}: {:#}", path, e);
                return self.diagnostic(&format!("Could not read from file \"{}\".", path));
            }
        };
        let out = &mut self.out;
        let mut progress_err = None;
        let report = test_passwords(&table, &passwords, |i| {
            if let Err(e) = writeln!(out, "{}", i) {
                progress_err.get_or_insert(e);
            }
        });
        if let Some(e) = progress_err {
            return Err(e);
        }
        writeln!(self.out, "{}", report)
    }
}

fn render_result(found: Option<&str>) -> String {
    match found {
        Some(pwd) => format!("'{}'", pwd),
        None => "Not found...".to_string(),
    }
}
