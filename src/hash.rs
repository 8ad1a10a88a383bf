//! Hash strategies a table can be built with.
use md5::{Digest, Md5};

/// A digest function used to walk table chains.
pub trait HashMethod: Send + Sync + std::fmt::Debug {
    /// Identifier used on the command line and in saved tables.
    fn name(&self) -> &'static str;
    fn digest(&self, input: &[u8]) -> Vec<u8>;
    /// Size of a digest in bytes.
    fn digest_len(&self) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Md5Hash;

impl HashMethod for Md5Hash {
    fn name(&self) -> &'static str {
        "md5"
    }

    fn digest(&self, input: &[u8]) -> Vec<u8> {
        Md5::digest(input).to_vec()
    }

    fn digest_len(&self) -> usize {
        16
    }
}

/// Names accepted by [`hash_method_by_name`].
pub const KNOWN_HASHES: &[&str] = &["md5"];

/// Resolve a hash strategy by identifier. Unknown names yield `None`.
pub fn hash_method_by_name(name: &str) -> Option<Box<dyn HashMethod>> {
    match name {
        "md5" => Some(Box::new(Md5Hash)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_known_vector() {
        let h = Md5Hash;
        assert_eq!(
            hex::encode(h.digest(b"password")),
            "5f4dcc3b5aa765d61d8327deb882cf99"
        );
        assert_eq!(h.digest(b"").len(), h.digest_len());
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(hash_method_by_name("md5").unwrap().name(), "md5");
        assert!(hash_method_by_name("MD5").is_none());
        assert!(hash_method_by_name("sha1").is_none());
        for n in KNOWN_HASHES {
            assert!(hash_method_by_name(n).is_some());
        }
    }
}
