// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inline identifier storage.

/// Byte capacity of an inline ID: a 4-character type prefix plus a
/// 36-character hyphenated UUID.
pub const ID_MAX_LEN: usize = 40;

/// Returns `s` truncated to at most `n` bytes, backing off to the nearest
/// character boundary.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        return s;
    }
    let mut end = n;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Inline, copyable ID storage.
///
/// IDs are short strings that land in every record of every projection
/// table; keeping them inline keeps those records `Copy` and avoids one
/// heap allocation per identifier. Unused trailing bytes are always
/// zeroed, so the derived `PartialEq`/`Hash` agree with string equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdBuf {
    len: u8,
    bytes: [u8; ID_MAX_LEN],
}

impl IdBuf {
    /// Store `s` inline. Generated IDs always fit exactly; anything longer
    /// is truncated at a character boundary (debug builds assert instead).
    pub fn new(s: &str) -> Self {
        let kept = short(s, ID_MAX_LEN);
        debug_assert_eq!(
            kept.len(),
            s.len(),
            "ID exceeds {ID_MAX_LEN} bytes: {s:?}",
        );
        let mut bytes = [0u8; ID_MAX_LEN];
        bytes[..kept.len()].copy_from_slice(kept.as_bytes());
        Self { len: kept.len() as u8, bytes }
    }

    pub fn as_str(&self) -> &str {
        // Constructed from &str, truncated at a char boundary: always UTF-8.
        match std::str::from_utf8(&self.bytes[..usize::from(self.len)]) {
            Ok(s) => s,
            Err(_) => unreachable!("IdBuf holds invalid UTF-8"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for IdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for IdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for IdBuf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for IdBuf {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.len() > ID_MAX_LEN {
            return Err(serde::de::Error::custom(format!(
                "ID exceeds {ID_MAX_LEN} bytes: {s:?}"
            )));
        }
        Ok(IdBuf::new(&s))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
