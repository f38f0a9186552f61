//! Cache key strategies and hashing

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};

use crate::args::Args;
use crate::error::Error;
use crate::template::Template;

/// Separator between the parts of a generated key
pub const KEY_SEPARATOR: &str = ".";

type KeyFn = Arc<dyn Fn(&Args) -> Result<String, Error> + Send + Sync>;
type HashFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// How a key (or the `id` part of a generated key) is derived from a call
///
/// Strategies see the bound instance, when there is one, as positional
/// argument 0.
#[derive(Clone)]
pub enum KeySpec {
    /// Computed by a function of the call arguments
    Callable(KeyFn),

    /// Rendered from a template such as `"user-{0.id}"`
    Template(Template),

    /// Anything else; fails with [`Error::InvalidKeySpec`] when a key is
    /// computed. Holds the offending value's type name.
    Invalid(String),
}

impl KeySpec {
    /// Strategy backed by a function
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&Args) -> Result<String, Error> + Send + Sync + 'static,
    {
        KeySpec::Callable(Arc::new(f))
    }

    /// Strategy backed by a template
    pub fn template(source: impl Into<String>) -> Self {
        KeySpec::Template(Template::new(source))
    }

    /// Strategy from dynamic configuration: strings are templates, anything
    /// else is invalid
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(source) => KeySpec::template(source.as_str()),
            other => KeySpec::Invalid(json_type_name(other).to_string()),
        }
    }

    /// Derive the key string for `args`
    pub fn resolve(&self, args: &Args) -> Result<String, Error> {
        match self {
            KeySpec::Callable(f) => f(args),
            KeySpec::Template(template) => Ok(template.render(args)?),
            KeySpec::Invalid(type_name) => Err(Error::InvalidKeySpec(type_name.clone())),
        }
    }
}

impl From<&str> for KeySpec {
    fn from(source: &str) -> Self {
        KeySpec::template(source)
    }
}

impl From<String> for KeySpec {
    fn from(source: String) -> Self {
        KeySpec::template(source)
    }
}

impl fmt::Debug for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::Callable(_) => f.write_str("Callable(..)"),
            KeySpec::Template(template) => write!(f, "Template({:?})", template.source()),
            KeySpec::Invalid(type_name) => write!(f, "Invalid({type_name})"),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// One-way function applied to a derived key before it reaches the backend
#[derive(Clone, Default)]
pub enum HashAlgorithm {
    /// SHA-256, lowercase hex
    #[default]
    Sha256,

    /// SHA-512, lowercase hex
    Sha512,

    /// Caller-supplied digest
    Custom(HashFn),
}

impl HashAlgorithm {
    /// Digest backed by a function
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        HashAlgorithm::Custom(Arc::new(f))
    }

    /// Look up a built-in algorithm by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Hash `key`
    pub fn digest(&self, key: &str) -> String {
        match self {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(key.as_bytes())),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(key.as_bytes())),
            HashAlgorithm::Custom(f) => f(key),
        }
    }
}

impl fmt::Debug for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => f.write_str("Sha256"),
            HashAlgorithm::Sha512 => f.write_str("Sha512"),
            HashAlgorithm::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Default key: `module.Type.name.id`
///
/// The type part is present only for bound calls, the id part only when an
/// id strategy is configured. Nothing here depends on addresses, so keys
/// survive restarts.
pub(crate) fn generate_key(
    module: &str,
    type_name: Option<&str>,
    name: &str,
    id: Option<&KeySpec>,
    args: &Args,
) -> Result<String, Error> {
    let mut parts: Vec<std::borrow::Cow<'_, str>> = Vec::with_capacity(4);

    parts.push(module.into());
    if let Some(type_name) = type_name {
        parts.push(type_name.into());
    }
    parts.push(name.into());
    if let Some(id) = id {
        parts.push(id.resolve(args)?.into());
    }

    // TODO: fold positional/keyword arguments into generated keys once a
    // stable argument hashing scheme is settled.
    Ok(parts.join(KEY_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use serde_json::json;

    #[test]
    fn test_template_spec() {
        let spec = KeySpec::from("item-{0}");
        assert_eq!(spec.resolve(&args![9]).unwrap(), "item-9");
    }

    #[test]
    fn test_callable_spec() {
        let spec = KeySpec::callable(|args| {
            let n: i64 = args.parse(0)?;
            Ok(format!("n={}", n * 2))
        });
        assert_eq!(spec.resolve(&args![21]).unwrap(), "n=42");
    }

    #[test]
    fn test_from_value() {
        assert!(matches!(KeySpec::from_value(&json!("k-{0}")), KeySpec::Template(_)));

        for (value, type_name) in [
            (json!(42), "int"),
            (json!(1.5), "float"),
            (json!(true), "bool"),
            (json!([1]), "list"),
            (json!({"a": 1}), "dict"),
        ] {
            let spec = KeySpec::from_value(&value);
            match spec.resolve(&args![]) {
                Err(Error::InvalidKeySpec(name)) => assert_eq!(name, type_name),
                other => panic!("expected InvalidKeySpec, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_template_errors_are_key_format_errors() {
        let spec = KeySpec::template("{1}");
        assert!(matches!(spec.resolve(&args![0]), Err(Error::KeyFormat(_))));
    }

    #[test]
    fn test_digests() {
        assert_eq!(
            HashAlgorithm::Sha256.digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(HashAlgorithm::Sha512.digest("abc").len(), 128);
        assert_eq!(HashAlgorithm::custom(|k| k.to_uppercase()).digest("abc"), "ABC");
        assert!(matches!(HashAlgorithm::from_name("SHA512"), Some(HashAlgorithm::Sha512)));
        assert!(HashAlgorithm::from_name("md5").is_none());
    }

    #[test]
    fn test_generate_key() {
        let args = args![json!({"name": "Wade"})];
        let id = KeySpec::from("{0.name}");

        assert_eq!(generate_key("app.users", None, "load", None, &args).unwrap(), "app.users.load");
        assert_eq!(
            generate_key("app.users", Some("User"), "load", Some(&id), &args).unwrap(),
            "app.users.User.load.Wade"
        );
    }
}
