//! References to Kubernetes secrets embedded in otherwise plain strings.
//!
//! When a placeholder resolves to a secret value, we never see the secret
//! itself. Instead, the placeholder engine emits an encoded reference naming
//! the Kubernetes secret and the key within it, and later stages decide how to
//! map that reference into a container.

use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

use crate::prelude::*;

/// A single key within a Kubernetes secret.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecretRef {
    /// The name of the Kubernetes secret to use.
    #[serde(rename = "secret")]
    pub name: String,
    /// The key within the secret to use.
    pub key: String,
}

impl SecretRef {
    /// Create a new secret reference.
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// Encodes secret references as strings, and finds them again afterwards.
pub trait SecretRefCodec {
    /// Encode `secret_ref` as a string which can be embedded in text.
    fn encode(&self, secret_ref: &SecretRef) -> String;

    /// Find every encoded reference in `s`, in order, along with the byte
    /// range it occupies.
    fn find_references(&self, s: &str) -> Vec<(Range<usize>, SecretRef)>;

    /// Does `s` contain any secret references?
    fn contains_reference(&self, s: &str) -> bool {
        !self.find_references(s).is_empty()
    }

    /// If `s` consists of exactly one secret reference and nothing else,
    /// return it.
    fn decode(&self, s: &str) -> Option<SecretRef> {
        let refs = self.find_references(s);
        if refs.len() != 1 {
            return None;
        }
        let (range, secret_ref) = refs.into_iter().next()?;
        if range == (0..s.len()) {
            Some(secret_ref)
        } else {
            None
        }
    }

    /// Is `s` exactly one secret reference?
    fn is_reference(&self, s: &str) -> bool {
        self.decode(s).is_some()
    }
}

/// Marker placed in front of an encoded secret reference.
const MAGIC_PREFIX: &str = "🔐💬";

/// Marker placed after an encoded secret reference.
const MAGIC_SUFFIX: &str = "💬🔐";

lazy_static! {
    /// Matches `MAGIC_PREFIX <name> _ <key> MAGIC_SUFFIX`. Kubernetes secret
    /// names may not contain `_`, so the first `_` ends the name.
    static ref MAGIC_REF_RE: Regex = Regex::new(&format!(
        "{}(.+?)_(.+?){}",
        regex::escape(MAGIC_PREFIX),
        regex::escape(MAGIC_SUFFIX),
    ))
    .expect("invalid secret reference regex");
}

/// Wraps secret references in emoji markers that are vanishingly unlikely to
/// appear in real configuration files.
#[derive(Clone, Copy, Debug, Default)]
pub struct MagicSecretCodec;

impl SecretRefCodec for MagicSecretCodec {
    fn encode(&self, secret_ref: &SecretRef) -> String {
        format!(
            "{}{}_{}{}",
            MAGIC_PREFIX, secret_ref.name, secret_ref.key, MAGIC_SUFFIX
        )
    }

    fn find_references(&self, s: &str) -> Vec<(Range<usize>, SecretRef)> {
        MAGIC_REF_RE
            .captures_iter(s)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let secret_ref = SecretRef::new(caps.get(1)?.as_str(), caps.get(2)?.as_str());
                Some((whole.range(), secret_ref))
            })
            .collect()
    }
}

#[test]
fn magic_codec_decodes_what_it_encodes() {
    let codec = MagicSecretCodec;
    let encoded = codec.encode(&SecretRef::new("default", "key"));
    assert_eq!(encoded, "🔐💬default_key💬🔐");
    assert_eq!(codec.decode(&encoded), Some(SecretRef::new("default", "key")));
    assert!(codec.is_reference(&encoded));
}

#[test]
fn magic_codec_splits_at_first_underscore() {
    let codec = MagicSecretCodec;
    let encoded = codec.encode(&SecretRef::new("db-creds", "PG_PASSWORD"));
    assert_eq!(
        codec.decode(&encoded),
        Some(SecretRef::new("db-creds", "PG_PASSWORD"))
    );
}

#[test]
fn magic_codec_rejects_surrounding_text() {
    let codec = MagicSecretCodec;
    let encoded = codec.encode(&SecretRef::new("default", "key"));
    let mixed = format!("password={}\n", encoded);
    assert!(codec.contains_reference(&mixed));
    assert!(!codec.is_reference(&mixed));
    assert_eq!(codec.find_references(&mixed).len(), 1);

    let two = format!("{}{}", encoded, encoded);
    assert_eq!(codec.find_references(&two).len(), 2);
    assert_eq!(codec.decode(&two), None);

    assert!(!codec.contains_reference("nothing to see here"));
}
