//! Score-style `${...}` placeholder substitution.
//!
//! - `${a.b.c}` is replaced by looking up `a.b.c`.
//! - `$$` produces a literal `$`, so `$${a}` renders as `${a}`.
//! - Any other `$` is left alone.

use serde_yaml::Value;

use crate::{
    expand::Expander,
    prelude::*,
    secret::{MagicSecretCodec, SecretRef, SecretRefCodec},
};

/// Replace every placeholder in `raw` with the result of calling `resolve`
/// on the text between `${` and `}`.
pub fn substitute<F>(raw: &str, mut resolve: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut offset = 0;
    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];
        if after.starts_with('$') {
            out.push('$');
            rest = &after[1..];
            offset += idx + 2;
        } else if let Some(inner) = after.strip_prefix('{') {
            let end = inner.find('}').ok_or_else(|| {
                format_err!("unterminated placeholder starting at byte {}", offset + idx)
            })?;
            let placeholder = &inner[..end];
            out.push_str(&resolve(placeholder)?);
            rest = &inner[end + 1..];
            offset += idx + 2 + end + 1;
        } else {
            out.push('$');
            rest = after;
            offset += idx + 1;
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Split a placeholder like `a.b\.c` into `["a", "b.c"]`.
fn split_ref(placeholder: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = placeholder.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                chars.next();
                parts.last_mut().expect("parts is never empty").push('.');
            }
            '.' => parts.push(String::new()),
            c => parts.last_mut().expect("parts is never empty").push(c),
        }
    }
    parts
}

/// Expands placeholders by looking them up in a tree of values, typically
/// loaded from a YAML file.
///
/// A mapping of the form `{secret: NAME, key: KEY}` stands for a key within
/// a Kubernetes secret, and expands to an encoded secret reference.
pub struct ValuesExpander<C = MagicSecretCodec> {
    values: Value,
    codec: C,
}

impl ValuesExpander {
    /// Create an expander using the standard secret reference encoding.
    pub fn new(values: Value) -> Self {
        Self::with_codec(values, MagicSecretCodec)
    }

    /// Load values from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("can't open values file {}", path.display()))?;
        let values: Value = serde_yaml::from_reader(f)
            .with_context(|| format!("can't parse values file {}", path.display()))?;
        Ok(Self::new(values))
    }
}

impl<C: SecretRefCodec> ValuesExpander<C> {
    /// Create an expander which encodes secret references using `codec`.
    pub fn with_codec(values: Value, codec: C) -> Self {
        Self { values, codec }
    }

    /// Look up a single placeholder.
    fn resolve(&self, placeholder: &str) -> Result<String> {
        let mut current = &self.values;
        for part in split_ref(placeholder) {
            let next = match current {
                Value::Mapping(map) => map.get(part.as_str()),
                Value::Sequence(seq) => part.parse::<usize>().ok().and_then(|i| seq.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| {
                format_err!("invalid ref '{}': key '{}' not found", placeholder, part)
            })?;
        }
        self.render(placeholder, current)
    }

    /// Render a resolved value as text.
    fn render(&self, placeholder: &str, value: &Value) -> Result<String> {
        match value {
            Value::String(s) => Ok(s.to_owned()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Null => Ok(String::new()),
            Value::Tagged(tagged) => self.render(placeholder, &tagged.value),
            Value::Mapping(_) => {
                if let Ok(secret_ref) = serde_yaml::from_value::<SecretRef>(value.clone()) {
                    return Ok(self.codec.encode(&secret_ref));
                }
                to_json(placeholder, value)
            }
            Value::Sequence(_) => to_json(placeholder, value),
        }
    }
}

/// Render a structured value as compact JSON.
fn to_json(placeholder: &str, value: &Value) -> Result<String> {
    serde_json::to_string(value)
        .with_context(|| format!("invalid ref '{}': cannot render value as JSON", placeholder))
}

impl<C: SecretRefCodec> Expander for ValuesExpander<C> {
    fn expand(&self, raw: &str) -> Result<String> {
        substitute(raw, |placeholder| self.resolve(placeholder))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn expander(yaml: &str) -> ValuesExpander {
        ValuesExpander::new(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn substitute_handles_escapes() {
        let out = substitute("a $$ b $${c} ${d} $e", |p| Ok(format!("<{}>", p))).unwrap();
        assert_eq!(out, "a $ b ${c} <d> $e");
    }

    #[test]
    fn substitute_rejects_unterminated_placeholders() {
        let err = substitute("abc ${def", |p| Ok(p.to_owned())).unwrap_err();
        assert_eq!(err.to_string(), "unterminated placeholder starting at byte 4");
    }

    #[test]
    fn split_ref_handles_escaped_dots() {
        assert_eq!(split_ref("a.b\\.c"), vec!["a", "b.c"]);
        assert_eq!(split_ref("plain"), vec!["plain"]);
    }

    #[test]
    fn values_expander_resolves_nested_values() {
        let e = expander(
            "metadata:\n  name: web\nresources:\n  db:\n    port: 5432\n    tls: true\n    hosts: [a, b]\n",
        );
        assert_eq!(
            e.expand("${metadata.name}:${resources.db.port}:${resources.db.tls}")
                .unwrap(),
            "web:5432:true"
        );
        assert_eq!(e.expand("${resources.db.hosts.1}").unwrap(), "b");
        assert_eq!(e.expand("${resources.db.hosts}").unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn values_expander_encodes_secrets() {
        let e = expander("resources:\n  db:\n    password:\n      secret: db-creds\n      key: password\n");
        let out = e.expand("${resources.db.password}").unwrap();
        assert_eq!(
            MagicSecretCodec.decode(&out),
            Some(SecretRef::new("db-creds", "password"))
        );
    }

    #[test]
    fn values_expander_reports_missing_keys() {
        let e = expander("metadata:\n  name: web\n");
        let err = e.expand("${metadata.nope}").unwrap_err();
        assert_eq!(err.to_string(), "invalid ref 'metadata.nope': key 'nope' not found");
    }
}
