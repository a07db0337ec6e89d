use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestCheck {
    /// The spec records no expected digest.
    Skipped,
    Match,
    Mismatch { expected: String, actual: String },
}

impl DigestCheck {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, DigestCheck::Mismatch { .. })
    }
}

pub fn sha256_file_hex(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex(&hasher.finalize()))
}

fn hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Advisory only: a mismatch is logged and reported, never an error. The
/// only error is failing to read the template at all.
pub fn check_template_digest(path: &Path, expected: Option<&str>) -> Result<DigestCheck> {
    let Some(expected) = expected.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(DigestCheck::Skipped);
    };
    let actual = sha256_file_hex(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        log::debug!("template digest verified for {}", path.display());
        return Ok(DigestCheck::Match);
    }
    log::warn!(
        "template {} does not match its recorded digest: expected sha256 {}, got {}",
        path.display(),
        expected,
        actual
    );
    Ok(DigestCheck::Mismatch {
        expected: expected.to_string(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("abc")
    const ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn abc_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        std::io::Write::write_all(&mut file, b"abc").expect("write");
        file
    }

    #[test]
    fn hashes_whole_file() {
        let file = abc_file();
        assert_eq!(sha256_file_hex(file.path()).expect("hash"), ABC);
    }

    #[test]
    fn comparison_ignores_case_and_whitespace() {
        let file = abc_file();
        let expected = format!("  {}\n", ABC.to_uppercase());
        assert_eq!(
            check_template_digest(file.path(), Some(&expected)).expect("check"),
            DigestCheck::Match
        );
    }

    #[test]
    fn mismatch_is_reported_not_raised() {
        let file = abc_file();
        let check = check_template_digest(file.path(), Some("deadbeef")).expect("check");
        assert!(check.is_mismatch());
        assert_eq!(
            check,
            DigestCheck::Mismatch {
                expected: "deadbeef".to_string(),
                actual: ABC.to_string(),
            }
        );
    }

    #[test]
    fn absent_digest_skips_hashing() {
        let missing = Path::new("/no/such/template.pdf");
        assert_eq!(check_template_digest(missing, None).expect("skip"), DigestCheck::Skipped);
        assert_eq!(check_template_digest(missing, Some("  ")).expect("skip"), DigestCheck::Skipped);
    }
}
