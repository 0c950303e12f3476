use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p)?;
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

/// Normalise a user-supplied profile name and reject anything that could
/// escape its directory. Returns the name without a trailing `.json`.
pub fn validate_name(raw: &str) -> Result<String> {
    // NFKC folds fullwidth dots and solidi into their ASCII forms.
    let name: String = raw.trim().nfkc().collect();
    if name.is_empty()
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(Error::InvalidName(raw.to_string()));
    }
    let stem = name.strip_suffix(".json").unwrap_or(&name);
    if stem.is_empty() {
        return Err(Error::InvalidName(raw.to_string()));
    }
    Ok(stem.to_string())
}

/// Write to a sibling temp file and rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(validate_name("s17_basic.json").unwrap(), "s17_basic");
        assert_eq!(validate_name(" aggressive ").unwrap(), "aggressive");
        for bad in ["", "..", "../x", "a/b", "a\\b", ".json", "\u{FF0E}\u{FF0E}", "a\u{FF0F}b"] {
            assert!(
                matches!(validate_name(bad), Err(Error::InvalidName(_))),
                "{bad:?} accepted"
            );
        }
    }
}
