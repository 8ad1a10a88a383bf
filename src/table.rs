//! Rainbow table engine: chain generation, reduction, lookup and CSV
//! persistence.
//!
//! A chain starts from a random password `p0` and alternates hashing and
//! reducing `ncols` times:
//!
//! ```text
//! p0 -h-> d0 -R0-> p1 -h-> d1 -R1-> ... -h-> d(ncols-1) -R(ncols-1)-> end
//! ```
//!
//! Only `(start, end)` pairs are stored. Any password lying on a stored
//! chain can be recovered from its digest.
//!
//! ```no_run
//! use rainbow::{hash::Md5Hash, table::RainbowTable};
//! # fn main() -> Result<(), rainbow::table::TableError> {
//! let table = RainbowTable::build(100, 1000, "abc", 4, Box::new(Md5Hash))?;
//! println!("{:?}", table.test_word("aab"));
//! # Ok(())
//! # }
//! ```
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use log::debug;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::hash::{HashMethod, hash_method_by_name};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("unknown hash function '{0}'")]
    UnknownHash(String),
    #[error("invalid table shape: {0}")]
    InvalidShape(String),
    #[error("'{0}' is not a valid {1} digest")]
    InvalidDigest(String, &'static str),
    #[error("corrupt table file: {0}")]
    Corrupt(String),
}

/// First record of a saved table.
#[derive(Debug, Serialize, Deserialize)]
struct TableHeader {
    ncols: usize,
    nrows: usize,
    charset: String,
    pwd_length: usize,
    hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChainRecord {
    start: String,
    end: String,
}

#[derive(Debug)]
pub struct RainbowTable {
    ncols: usize,
    nrows: usize,
    charset: Vec<char>,
    pwd_length: usize,
    hash: Box<dyn HashMethod>,
    /// Chain end -> every start that reached it.
    chains: HashMap<String, Vec<String>>,
}

impl RainbowTable {
    /// Build a fresh table using the thread-local RNG for chain starts.
    pub fn build(
        ncols: usize,
        nrows: usize,
        charset: &str,
        pwd_length: usize,
        hash: Box<dyn HashMethod>,
    ) -> Result<Self, TableError> {
        Self::build_with_rng(
            ncols,
            nrows,
            charset,
            pwd_length,
            hash,
            &mut rand::thread_rng(),
        )
    }

    /// Build a table drawing chain starts from `rng`. Chain ends are
    /// computed in parallel.
    pub fn build_with_rng<R: Rng>(
        ncols: usize,
        nrows: usize,
        charset: &str,
        pwd_length: usize,
        hash: Box<dyn HashMethod>,
        rng: &mut R,
    ) -> Result<Self, TableError> {
        let mut table = Self::empty(ncols, nrows, charset, pwd_length, hash)?;
        let starts: Vec<String> = (0..nrows)
            .map(|_| table.random_password_with(rng))
            .collect();
        let ends: Vec<String> = starts.par_iter().map(|s| table.chain_end(s)).collect();
        for (start, end) in starts.into_iter().zip(ends) {
            table.chains.entry(end).or_default().push(start);
        }
        debug!(
            "built {} table: {} rows, {} cols, {} distinct ends",
            table.hash.name(),
            nrows,
            ncols,
            table.chains.len()
        );
        Ok(table)
    }

    fn empty(
        ncols: usize,
        nrows: usize,
        charset: &str,
        pwd_length: usize,
        hash: Box<dyn HashMethod>,
    ) -> Result<Self, TableError> {
        if ncols == 0 || nrows == 0 || pwd_length == 0 {
            return Err(TableError::InvalidShape(format!(
                "ncols={}, nrows={}, pwd_length={} must all be positive",
                ncols, nrows, pwd_length
            )));
        }
        let charset: Vec<char> = charset.chars().collect();
        if charset.is_empty() {
            return Err(TableError::InvalidShape("empty charset".to_string()));
        }
        Ok(Self {
            ncols,
            nrows,
            charset,
            pwd_length,
            hash,
            chains: HashMap::new(),
        })
    }

    /// Decode a table previously written by [`RainbowTable::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        let mut records = rdr.records();
        let first = records
            .next()
            .ok_or_else(|| TableError::Corrupt("missing header".to_string()))??;
        let header: TableHeader = first.deserialize(None)?;
        let hash = hash_method_by_name(&header.hash)
            .ok_or_else(|| TableError::UnknownHash(header.hash.clone()))?;
        let mut table = Self::empty(
            header.ncols,
            header.nrows,
            &header.charset,
            header.pwd_length,
            hash,
        )?;
        for record in records {
            let chain: ChainRecord = record?.deserialize(None)?;
            if !table.is_valid_password(&chain.start) || !table.is_valid_password(&chain.end) {
                return Err(TableError::Corrupt(format!(
                    "chain '{}' -> '{}' does not fit the table charset/length",
                    chain.start, chain.end
                )));
            }
            table.chains.entry(chain.end).or_default().push(chain.start);
        }
        debug!(
            "loaded table from {}: {} distinct ends",
            path.as_ref().display(),
            table.chains.len()
        );
        Ok(table)
    }

    /// Persist the table as CSV: one header record, then `start,end` rows.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let file = File::create(&path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(BufWriter::new(file));
        wtr.serialize(TableHeader {
            ncols: self.ncols,
            nrows: self.nrows,
            charset: self.charset.iter().collect(),
            pwd_length: self.pwd_length,
            hash: self.hash.name().to_string(),
        })?;
        for (end, starts) in &self.chains {
            for start in starts {
                wtr.write_record([start.as_str(), end.as_str()])?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn pwd_length(&self) -> usize {
        self.pwd_length
    }

    pub fn hash_method(&self) -> &dyn HashMethod {
        self.hash.as_ref()
    }

    /// All stored chain starts.
    pub fn starts(&self) -> impl Iterator<Item = &str> {
        self.chains.values().flatten().map(String::as_str)
    }

    /// True when `pwd` has the table's length and only uses its charset.
    pub fn is_valid_password(&self, pwd: &str) -> bool {
        pwd.chars().count() == self.pwd_length && pwd.chars().all(|c| self.charset.contains(&c))
    }

    /// Map a digest to a password for column `col`.
    fn reduce(&self, digest: &[u8], col: usize) -> String {
        let mut acc = digest
            .iter()
            .take(16)
            .fold(0u128, |a, &b| (a << 8) | b as u128)
            .wrapping_add(col as u128);
        let n = self.charset.len() as u128;
        (0..self.pwd_length)
            .map(|_| {
                let c = self.charset[(acc % n) as usize];
                acc /= n;
                c
            })
            .collect()
    }

    fn chain_end(&self, start: &str) -> String {
        let mut pwd = start.to_string();
        for col in 0..self.ncols {
            pwd = self.reduce(&self.hash.digest(pwd.as_bytes()), col);
        }
        pwd
    }

    /// Walk the chain from `start` looking for a password hashing to
    /// `target` in columns `0..=col`.
    fn walk(&self, start: &str, target: &[u8], col: usize) -> Option<String> {
        let mut pwd = start.to_string();
        for c in 0..=col {
            let d = self.hash.digest(pwd.as_bytes());
            if d == target {
                return Some(pwd);
            }
            pwd = self.reduce(&d, c);
        }
        None
    }

    /// Recover a password whose digest equals `target`.
    pub fn crack_digest(&self, target: &[u8]) -> Option<String> {
        for col in (0..self.ncols).rev() {
            let mut pwd = self.reduce(target, col);
            for c in col + 1..self.ncols {
                pwd = self.reduce(&self.hash.digest(pwd.as_bytes()), c);
            }
            if let Some(starts) = self.chains.get(&pwd) {
                if let Some(found) = starts.iter().find_map(|s| self.walk(s, target, col)) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Recover a password from a hex digest. Not finding one is `Ok(None)`.
    pub fn crack_hash(&self, hash_hex: &str) -> Result<Option<String>, TableError> {
        let invalid = || TableError::InvalidDigest(hash_hex.to_string(), self.hash.name());
        let target = hex::decode(hash_hex).map_err(|_| invalid())?;
        if target.len() != self.hash.digest_len() {
            return Err(invalid());
        }
        Ok(self.crack_digest(&target))
    }

    /// Hex digest of `pwd` under the table's hash function.
    pub fn hash_word(&self, pwd: &str) -> String {
        hex::encode(self.hash.digest(pwd.as_bytes()))
    }

    /// Hash `pwd` and try to recover it from the table.
    pub fn test_word(&self, pwd: &str) -> Option<String> {
        self.crack_digest(&self.hash.digest(pwd.as_bytes()))
    }

    pub fn random_password(&self) -> String {
        self.random_password_with(&mut rand::thread_rng())
    }

    pub fn random_password_with<R: Rng>(&self, rng: &mut R) -> String {
        (0..self.pwd_length)
            .map(|_| self.charset[rng.gen_range(0..self.charset.len())])
            .collect()
    }
}

impl Drop for RainbowTable {
    fn drop(&mut self) {
        debug!("releasing {} table ({} rows)", self.hash.name(), self.nrows);
    }
}
