//! Converting a single container file declaration into Kubernetes objects.
//!
//! Each file becomes one volume mounted at the file's parent directory. The
//! volume is backed by a ConfigMap we generate when the file's content is
//! plain text, or by an existing Secret when the whole file expands to one
//! secret reference.

use std::{io, num::ParseIntError};

use crate::{
    expand::Expander,
    fs::{FileReader, LocalFs},
    k8s::{ConfigMap, ConfigMapVolumeSource, KeyToPath, SecretVolumeSource, Volume, VolumeMount},
    lexical_path,
    naming::file_resource_name,
    prelude::*,
    secret::{MagicSecretCodec, SecretRefCodec},
};

/// The ConfigMap key under which we store file content.
pub const CONFIG_MAP_FILE_KEY: &str = "file";

/// A file to mount into a container, as written by the user.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerFile {
    /// Octal file permissions, e.g. `"0644"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Inline file content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Path of a file to read the content from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Don't expand placeholders in the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_expand: Option<bool>,
}

/// Where a file's content comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FileContent {
    /// Inline content.
    Literal(String),
    /// A file to read, as written by the user (not yet resolved).
    Source(String),
}

/// A `ContainerFile` whose fields have been checked.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidatedFile {
    /// Parsed file permissions.
    pub mode: Option<i32>,
    /// Where the content comes from.
    pub content: FileContent,
    /// Should we skip placeholder expansion?
    pub no_expand: bool,
}

impl ContainerFile {
    /// Check our fields and convert them into a `ValidatedFile`. The mode is
    /// checked before the content. If both `content` and `source` are
    /// present, `content` wins.
    pub fn validate(&self) -> Result<ValidatedFile, FileError> {
        let mode = match &self.mode {
            Some(mode) => Some(i32::from_str_radix(mode, 8).map_err(|err| {
                FileError::InvalidMode {
                    value: mode.to_owned(),
                    err,
                }
            })?),
            None => None,
        };
        let content = match (&self.content, &self.source) {
            (Some(content), _) => FileContent::Literal(content.to_owned()),
            (None, Some(source)) => FileContent::Source(source.to_owned()),
            (None, None) => return Err(FileError::MissingContent),
        };
        Ok(ValidatedFile {
            mode,
            content,
            no_expand: self.no_expand.unwrap_or(false),
        })
    }
}

/// Which field of a `ContainerFile` caused an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileField {
    /// The `mode` field.
    Mode,
    /// The `content` field, or the content in general.
    Content,
    /// The `source` field.
    Source,
}

impl fmt::Display for FileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileField::Mode => write!(f, "mode"),
            FileField::Content => write!(f, "content"),
            FileField::Source => write!(f, "source"),
        }
    }
}

/// An error converting a `ContainerFile`.
///
/// The messages include the text of any underlying error, so we don't
/// report those as `source()` as well.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// `mode` isn't an octal number.
    #[error("mode: failed to parse '{value}': {err}")]
    InvalidMode {
        /// The mode as written.
        value: String,
        /// Why it didn't parse.
        err: ParseIntError,
    },

    /// Neither `content` nor `source` was supplied.
    #[error("missing 'content' or 'source'")]
    MissingContent,

    /// We couldn't read `source`.
    #[error("source: failed to read file '{path}': {err}")]
    UnreadableSource {
        /// The resolved path we tried to read.
        path: String,
        /// The underlying I/O error.
        err: io::Error,
    },

    /// The content needs expanding, but it isn't text.
    #[error("content: file content is not valid UTF-8 and cannot be expanded (set noExpand to mount it unchanged)")]
    NotUtf8,

    /// The expander failed. We print its whole context chain.
    #[error("content: {0:#}")]
    Expansion(anyhow::Error),

    /// The expanded content mixed secret references with other text.
    #[error("content: contained a mix of secret references and raw content")]
    MixedContent,
}

impl FileError {
    /// The field responsible for this error.
    pub fn field(&self) -> FileField {
        match self {
            FileError::InvalidMode { .. } => FileField::Mode,
            FileError::UnreadableSource { .. } => FileField::Source,
            FileError::MissingContent
            | FileError::NotUtf8
            | FileError::Expansion(_)
            | FileError::MixedContent => FileField::Content,
        }
    }
}

/// The Kubernetes objects needed to mount a single file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConvertedFile {
    /// Mounts `volume` at the file's parent directory.
    pub mount: VolumeMount,
    /// A ConfigMap holding the content. `Some` exactly when `volume` is
    /// backed by a ConfigMap.
    pub config_map: Option<ConfigMap>,
    /// The volume containing the file.
    pub volume: Volume,
}

/// Converts `ContainerFile` declarations using the supplied collaborators.
#[derive(Clone, Copy)]
pub struct ContainerFileConverter<'a> {
    reader: &'a (dyn FileReader + Sync),
    codec: &'a (dyn SecretRefCodec + Sync),
}

impl<'a> ContainerFileConverter<'a> {
    /// Create a converter which reads `source` files using `reader` and
    /// recognizes secret references using `codec`.
    pub fn new(
        reader: &'a (dyn FileReader + Sync),
        codec: &'a (dyn SecretRefCodec + Sync),
    ) -> Self {
        Self { reader, codec }
    }

    /// Convert the file which should appear at `mount_path`.
    ///
    /// Generated ConfigMap names start with `name_prefix`. Relative `source`
    /// paths are resolved against the directory containing `base_path`, when
    /// given. Content is passed through `expander` unless there is none or
    /// the file sets `noExpand`.
    pub fn convert(
        &self,
        mount_path: &str,
        file: &ContainerFile,
        name_prefix: &str,
        base_path: Option<&str>,
        expander: Option<&dyn Expander>,
    ) -> Result<ConvertedFile, FileError> {
        let file = file.validate()?;

        let raw = match &file.content {
            FileContent::Literal(content) => content.clone().into_bytes(),
            FileContent::Source(source) => {
                let path = resolve_source_path(source, base_path);
                debug!("reading {} for {}", path, mount_path);
                self.reader
                    .read_file(Path::new(&path))
                    .map_err(|err| FileError::UnreadableSource { path, err })?
            }
        };

        let name = file_resource_name(mount_path);
        let file_name = lexical_path::base(mount_path);
        let mount = VolumeMount {
            name: name.clone(),
            mount_path: lexical_path::dir(mount_path),
        };

        let content = match expander {
            Some(expander) if !file.no_expand => {
                let text = String::from_utf8(raw).map_err(|_| FileError::NotUtf8)?;
                let expanded = expander.expand(&text).map_err(FileError::Expansion)?;
                let refs = self.codec.find_references(&expanded);
                match refs.as_slice() {
                    [] => expanded.into_bytes(),
                    [(range, secret_ref)] if *range == (0..expanded.len()) => {
                        trace!(
                            "{} is backed by secret {} key {}",
                            mount_path,
                            secret_ref.name,
                            secret_ref.key,
                        );
                        let volume = Volume::from_secret(
                            name,
                            SecretVolumeSource {
                                secret_name: secret_ref.name.clone(),
                                items: vec![KeyToPath {
                                    key: secret_ref.key.clone(),
                                    path: file_name,
                                    mode: file.mode,
                                }],
                            },
                        );
                        return Ok(ConvertedFile {
                            mount,
                            config_map: None,
                            volume,
                        });
                    }
                    _ => return Err(FileError::MixedContent),
                }
            }
            _ => raw,
        };

        trace!("{} is backed by a ConfigMap", mount_path);
        let config_map_name = format!("{}{}", name_prefix, name);
        let config_map =
            ConfigMap::new(config_map_name.clone()).with_binary_data(CONFIG_MAP_FILE_KEY, content);
        let volume = Volume::from_config_map(
            name,
            ConfigMapVolumeSource {
                name: config_map_name,
                items: vec![KeyToPath {
                    key: CONFIG_MAP_FILE_KEY.to_owned(),
                    path: file_name,
                    mode: file.mode,
                }],
            },
        );
        Ok(ConvertedFile {
            mount,
            config_map: Some(config_map),
            volume,
        })
    }
}

impl Default for ContainerFileConverter<'static> {
    fn default() -> Self {
        Self::new(&LocalFs, &MagicSecretCodec)
    }
}

/// Convert `file` using the local filesystem and the standard secret
/// reference encoding. See `ContainerFileConverter::convert`.
pub fn convert_container_file(
    mount_path: &str,
    file: &ContainerFile,
    name_prefix: &str,
    base_path: Option<&str>,
    expander: Option<&dyn Expander>,
) -> Result<ConvertedFile, FileError> {
    ContainerFileConverter::default().convert(mount_path, file, name_prefix, base_path, expander)
}

/// Figure out which file `source` refers to. Relative paths are relative to
/// the directory containing `base_path`. Anything else is used as written.
fn resolve_source_path(source: &str, base_path: Option<&str>) -> String {
    match base_path {
        Some(base_path) if !lexical_path::is_abs(source) => {
            lexical_path::join(&[&lexical_path::dir(base_path), source])
        }
        _ => source.to_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::secret::SecretRef;

    fn encoded_ref(name: &str, key: &str) -> String {
        MagicSecretCodec.encode(&SecretRef::new(name, key))
    }

    fn literal(content: &str) -> ContainerFile {
        ContainerFile {
            content: Some(content.to_owned()),
            ..ContainerFile::default()
        }
    }

    #[test]
    fn invalid_mode() {
        let file = ContainerFile {
            mode: Some("xxx".to_owned()),
            ..ContainerFile::default()
        };
        let err = convert_container_file("fail", &file, "", None, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mode: failed to parse 'xxx': invalid digit found in string"
        );
        assert_eq!(err.field(), FileField::Mode);
    }

    #[test]
    fn mode_is_octal_and_reaches_the_volume() {
        let file = ContainerFile {
            mode: Some("0640".to_owned()),
            ..literal("hi")
        };
        let converted = convert_container_file("/etc/app.conf", &file, "", None, None).unwrap();
        let items = &converted.volume.config_map.unwrap().items;
        assert_eq!(items[0].mode, Some(0o640));

        let bad_digit = ContainerFile {
            mode: Some("0800".to_owned()),
            ..literal("hi")
        };
        let err = convert_container_file("/x", &bad_digit, "", None, None).unwrap_err();
        assert!(err.to_string().starts_with("mode: failed to parse '0800': "));
    }

    #[test]
    fn no_content() {
        let err = convert_container_file("fail", &ContainerFile::default(), "", None, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "missing 'content' or 'source'");
        assert_eq!(err.field(), FileField::Content);
    }

    #[test]
    fn unreadable_source() {
        let file = ContainerFile {
            source: Some("file.that.does.not.exist".to_owned()),
            ..ContainerFile::default()
        };
        let err = convert_container_file("fail", &file, "", None, None).unwrap_err();
        assert_eq!(err.field(), FileField::Source);
        assert!(
            err.to_string()
                .starts_with("source: failed to read file 'file.that.does.not.exist': "),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn unreadable_source_relative() {
        let file = ContainerFile {
            source: Some("file.that.does.not.exist".to_owned()),
            ..ContainerFile::default()
        };
        let err = convert_container_file("fail", &file, "", Some("my/file.yaml"), None)
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("source: failed to read file 'my/file.that.does.not.exist': "),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn source_paths_resolve_like_filepath_join() {
        assert_eq!(resolve_source_path("x.txt", None), "x.txt");
        assert_eq!(resolve_source_path("./x.txt", None), "./x.txt");
        assert_eq!(resolve_source_path("x.txt", Some("score.yaml")), "x.txt");
        assert_eq!(
            resolve_source_path("../conf/x.txt", Some("/work/app/score.yaml")),
            "/work/conf/x.txt"
        );
        assert_eq!(
            resolve_source_path("/abs/x.txt", Some("/work/app/score.yaml")),
            "/abs/x.txt"
        );
    }

    #[test]
    fn source_is_read_relative_to_base_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nginx.conf"), b"\x00\xffbinary ${x}").unwrap();
        let base = dir.path().join("score.yaml");
        let file = ContainerFile {
            source: Some("nginx.conf".to_owned()),
            no_expand: Some(true),
            ..ContainerFile::default()
        };
        let expander = |_: &str| -> Result<String> { panic!("should not expand") };
        let converted = convert_container_file(
            "/etc/nginx/nginx.conf",
            &file,
            "web-nginx-",
            Some(base.to_str().unwrap()),
            Some(&expander),
        )
        .unwrap();
        let cm = converted.config_map.unwrap();
        assert_eq!(cm.binary_data[CONFIG_MAP_FILE_KEY], b"\x00\xffbinary ${x}".to_vec());
        assert_eq!(converted.mount.mount_path, "/etc/nginx");
    }

    #[test]
    fn content_no_expand() {
        let file = ContainerFile {
            no_expand: Some(true),
            ..literal("raw content with ${some.ref}")
        };
        let converted =
            convert_container_file("/some/mount", &file, "my-workload-c1-", None, None).unwrap();
        assert_eq!(
            converted.mount,
            VolumeMount {
                name: "file-53b1563f1b".to_owned(),
                mount_path: "/some".to_owned(),
            }
        );
        assert_eq!(
            converted.config_map,
            Some(
                ConfigMap::new("my-workload-c1-file-53b1563f1b")
                    .with_binary_data("file", b"raw content with ${some.ref}".to_vec())
            )
        );
        assert_eq!(
            converted.volume,
            Volume::from_config_map(
                "file-53b1563f1b",
                ConfigMapVolumeSource {
                    name: "my-workload-c1-file-53b1563f1b".to_owned(),
                    items: vec![KeyToPath {
                        key: "file".to_owned(),
                        path: "mount".to_owned(),
                        mode: None,
                    }],
                },
            )
        );
    }

    #[test]
    fn content_without_expander_is_verbatim() {
        let converted =
            convert_container_file("/some/mount", &literal("${a} ${b}"), "p-", None, None)
                .unwrap();
        assert_eq!(
            converted.config_map.unwrap().binary_data["file"],
            b"${a} ${b}".to_vec()
        );
        assert!(converted.volume.secret.is_none());
    }

    #[test]
    fn content_expand_plain() {
        let expander = |s: &str| -> Result<String> { Ok(s.replace("${some.ref}", "value")) };
        let converted = convert_container_file(
            "/some/mount",
            &literal("raw content with ${some.ref}"),
            "my-workload-c1-",
            None,
            Some(&expander),
        )
        .unwrap();
        assert_eq!(
            converted.config_map.unwrap().binary_data["file"],
            b"raw content with value".to_vec()
        );
        assert!(converted.volume.config_map.is_some());
        assert!(converted.volume.secret.is_none());
    }

    #[test]
    fn content_expand_mixed() {
        let expander = |s: &str| -> Result<String> {
            Ok(s.replace("${some.ref}", &encoded_ref("default", "key")))
        };
        let err = convert_container_file(
            "/some/mount",
            &literal("raw content with ${some.ref}"),
            "my-workload-c1-",
            None,
            Some(&expander),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "content: contained a mix of secret references and raw content"
        );
    }

    #[test]
    fn content_expand_two_secrets() {
        let expander = |_: &str| -> Result<String> {
            Ok(format!(
                "{}{}",
                encoded_ref("a", "one"),
                encoded_ref("b", "two")
            ))
        };
        let err = convert_container_file("/x/y", &literal("${a}${b}"), "", None, Some(&expander))
            .unwrap_err();
        assert!(matches!(err, FileError::MixedContent));
    }

    #[test]
    fn content_expand_with_secret() {
        let expander = |_: &str| -> Result<String> { Ok(encoded_ref("default", "key")) };
        let converted = convert_container_file(
            "/some/mount",
            &literal("${some.ref}"),
            "my-workload-c1-",
            None,
            Some(&expander),
        )
        .unwrap();
        assert_eq!(
            converted.mount,
            VolumeMount {
                name: "file-53b1563f1b".to_owned(),
                mount_path: "/some".to_owned(),
            }
        );
        assert_eq!(converted.config_map, None);
        assert_eq!(
            converted.volume,
            Volume::from_secret(
                "file-53b1563f1b",
                SecretVolumeSource {
                    secret_name: "default".to_owned(),
                    items: vec![KeyToPath {
                        key: "key".to_owned(),
                        path: "mount".to_owned(),
                        mode: None,
                    }],
                },
            )
        );
    }

    #[test]
    fn expander_errors_are_tagged_content() {
        let expander =
            |_: &str| -> Result<String> { Err(format_err!("invalid ref 'some.ref': not found")) };
        let err = convert_container_file(
            "/some/mount",
            &literal("${some.ref}"),
            "",
            None,
            Some(&expander),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "content: invalid ref 'some.ref': not found");
        assert_eq!(err.field(), FileField::Content);
    }

    #[test]
    fn expander_error_context_is_kept() {
        let expander = |_: &str| -> Result<String> {
            Err(format_err!("key 'x' not found")).context("invalid ref 'a.x'")
        };
        let err = convert_container_file("/some/mount", &literal("${a.x}"), "", None, Some(&expander))
            .unwrap_err();
        assert_eq!(err.to_string(), "content: invalid ref 'a.x': key 'x' not found");
    }

    #[test]
    fn binary_source_cannot_be_expanded() {
        struct Binary;
        impl FileReader for Binary {
            fn read_file(&self, _path: &Path) -> io::Result<Vec<u8>> {
                Ok(vec![0xff, 0xfe])
            }
        }
        let expander = |s: &str| -> Result<String> { Ok(s.to_owned()) };
        let file = ContainerFile {
            source: Some("blob.bin".to_owned()),
            ..ContainerFile::default()
        };
        let err = ContainerFileConverter::new(&Binary, &MagicSecretCodec)
            .convert("/data/blob.bin", &file, "", None, Some(&expander))
            .unwrap_err();
        assert!(matches!(err, FileError::NotUtf8));
        assert!(err.to_string().contains("set noExpand"));

        let file = ContainerFile {
            no_expand: Some(true),
            ..file
        };
        let converted = ContainerFileConverter::new(&Binary, &MagicSecretCodec)
            .convert("/data/blob.bin", &file, "", None, Some(&expander))
            .unwrap();
        assert!(converted.config_map.is_some());
    }

    #[test]
    fn mode_is_applied_to_secret_volumes() {
        let expander = |_: &str| -> Result<String> { Ok(encoded_ref("default", "key")) };
        let file = ContainerFile {
            mode: Some("0400".to_owned()),
            ..literal("${some.ref}")
        };
        let converted =
            convert_container_file("/some/mount", &file, "", None, Some(&expander)).unwrap();
        let secret = converted.volume.secret.unwrap();
        assert_eq!(secret.items[0].mode, Some(0o400));
    }

    #[test]
    fn converter_can_be_shared_between_threads() {
        let converter = ContainerFileConverter::default();
        let names = std::thread::scope(|scope| {
            let handles = ["/etc/a", "/etc/b"]
                .iter()
                .map(|path| {
                    scope.spawn(move || {
                        converter
                            .convert(path, &literal("x"), "w-", None, None)
                            .unwrap()
                            .mount
                            .name
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });
        assert_eq!(names[0], file_resource_name("/etc/a"));
        assert_eq!(names[1], file_resource_name("/etc/b"));
    }

    #[test]
    fn resource_name_depends_only_on_mount_path() {
        let a = convert_container_file("/etc/a", &literal("one"), "x-", None, None).unwrap();
        let b = convert_container_file("/etc/a", &literal("two"), "y-", None, None).unwrap();
        let c = convert_container_file("/etc/c", &literal("one"), "x-", None, None).unwrap();
        assert_eq!(a.mount.name, b.mount.name);
        assert_eq!(a.volume.name, b.volume.name);
        assert_ne!(a.mount.name, c.mount.name);
    }

    #[test]
    fn deserializes_camel_case() {
        let file: ContainerFile =
            serde_yaml::from_str("mode: '0600'\ncontent: hello\nnoExpand: true\n").unwrap();
        assert_eq!(
            file.validate().unwrap(),
            ValidatedFile {
                mode: Some(0o600),
                content: FileContent::Literal("hello".to_owned()),
                no_expand: true,
            }
        );
    }
}
