//! The subset of Kubernetes objects we generate, in their wire format.

use crate::prelude::*;

/// Standard object metadata (missing lots of fields).
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name.
    pub name: String,
    /// Namespace, if any. We normally leave this to `kubectl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectMeta {
    /// Metadata with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }
}

/// A Kubernetes ConfigMap holding non-sensitive data.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    /// Always `v1`.
    pub api_version: String,
    /// Always `ConfigMap`.
    pub kind: String,
    /// Metadata.
    pub metadata: ObjectMeta,
    /// UTF-8 data.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    /// Arbitrary bytes, Base64-encoded on the wire.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        with = "base64_binary_data"
    )]
    pub binary_data: BTreeMap<String, Vec<u8>>,
}

impl ConfigMap {
    /// Create an empty ConfigMap.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: "v1".to_owned(),
            kind: "ConfigMap".to_owned(),
            metadata: ObjectMeta::named(name),
            data: BTreeMap::new(),
            binary_data: BTreeMap::new(),
        }
    }

    /// Add a binary data entry.
    pub fn with_binary_data(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.binary_data.insert(key.into(), value);
        self
    }
}

/// Custom `serde` (de)serialization module for maps of Base64-encoded bytes,
/// which is how Kubernetes represents `binaryData`. Use with
/// `#[serde(with = "base64_binary_data")]`.
pub mod base64_binary_data {
    use serde::{
        de::{Deserialize, Deserializer, Error as DeError},
        ser::{Serialize, Serializer},
    };
    use std::{collections::BTreeMap, result};

    /// Serialize each value as a Base64 string.
    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> result::Result<S::Ok, S::Error> {
        let encoded = map
            .iter()
            .map(|(k, v)| (k, base64::encode(v)))
            .collect::<BTreeMap<_, _>>();
        encoded.serialize(serializer)
    }

    /// Deserialize a map of Base64 strings.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> result::Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                let bytes = base64::decode(&v).map_err(|err| {
                    D::Error::custom(format!("could not base64-decode {:?}: {}", k, err))
                })?;
                Ok((k, bytes))
            })
            .collect()
    }
}

/// A pod volume. Exactly one source should be set.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name, referenced by `VolumeMount::name`.
    pub name: String,
    /// ConfigMap source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,
    /// Secret source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
}

impl Volume {
    /// Create a volume backed by a ConfigMap.
    pub fn from_config_map(name: impl Into<String>, source: ConfigMapVolumeSource) -> Self {
        Self {
            name: name.into(),
            config_map: Some(source),
            secret: None,
        }
    }

    /// Create a volume backed by a Secret.
    pub fn from_secret(name: impl Into<String>, source: SecretVolumeSource) -> Self {
        Self {
            name: name.into(),
            config_map: None,
            secret: Some(source),
        }
    }
}

/// Project keys of a ConfigMap into a volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapVolumeSource {
    /// ConfigMap name.
    pub name: String,
    /// Which keys to project, and where.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<KeyToPath>,
}

/// Project keys of a Secret into a volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    /// Secret name.
    pub secret_name: String,
    /// Which keys to project, and where.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<KeyToPath>,
}

/// Map a key to a relative path inside a volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyToPath {
    /// The key to project.
    pub key: String,
    /// Relative path of the file to map the key to.
    pub path: String,
    /// File permission bits. Serialized as a decimal integer, like the
    /// Kubernetes API does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<i32>,
}

/// Mount a volume into a container.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Volume name.
    pub name: String,
    /// Directory inside the container.
    pub mount_path: String,
}

#[test]
fn config_map_serializes_binary_data_as_base64() {
    let cm = ConfigMap::new("my-cm").with_binary_data("file", b"hello".to_vec());
    let json = serde_json::to_value(&cm).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "my-cm" },
            "binaryData": { "file": "aGVsbG8=" },
        })
    );
    let parsed: ConfigMap = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, cm);
}

#[test]
fn volume_serializes_only_its_source() {
    let vol = Volume::from_secret(
        "file-abc",
        SecretVolumeSource {
            secret_name: "default".to_owned(),
            items: vec![KeyToPath {
                key: "key".to_owned(),
                path: "mount".to_owned(),
                mode: Some(0o600),
            }],
        },
    );
    let json = serde_json::to_value(&vol).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "name": "file-abc",
            "secret": {
                "secretName": "default",
                "items": [{ "key": "key", "path": "mount", "mode": 384 }],
            },
        })
    );
}
