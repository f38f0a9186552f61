//! Call arguments

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Positional and keyword arguments of one call
///
/// Keyword arguments are kept sorted by name, so the order in which they
/// were supplied never changes a key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Args {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl Args {
    /// Empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Append a positional argument in place
    pub fn push(&mut self, value: impl Into<Value>) {
        self.positional.push(value.into());
    }

    /// Set a keyword argument in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.named.insert(name.into(), value.into());
    }

    /// Positional arguments in order
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Keyword arguments sorted by name
    pub fn named(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    /// Positional argument at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument called `name`
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Deserialize the positional argument at `index`
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> Result<T, Error> {
        let value = self
            .get(index)
            .ok_or_else(|| Error::Argument(format!("missing positional argument {index}")))?;
        Ok(T::deserialize(value)?)
    }

    /// Deserialize the keyword argument called `name`
    pub fn parse_named<T: DeserializeOwned>(&self, name: &str) -> Result<T, Error> {
        let value = self
            .get_named(name)
            .ok_or_else(|| Error::Argument(format!("missing keyword argument {name:?}")))?;
        Ok(T::deserialize(value)?)
    }

    /// Number of positional plus keyword arguments
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// True when there are no arguments at all
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Copy of these arguments with `receiver` as positional argument 0
    pub(crate) fn with_receiver(&self, receiver: Value) -> Args {
        let mut positional = Vec::with_capacity(self.positional.len() + 1);
        positional.push(receiver);
        positional.extend(self.positional.iter().cloned());
        Args {
            positional,
            named: self.named.clone(),
        }
    }
}

/// Renders as `(a, b){"k": v}`: the positional tuple followed by the
/// keyword mapping. Used as the memoization key.
impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.positional.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        if self.positional.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str("){")?;
        for (i, (name, value)) in self.named.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {value}", Value::from(name.as_str()))?;
        }
        f.write_str("}")
    }
}

/// Build [`Args`]: `args![1, "a"]`, `args![1; page = 2]`, `args![; page = 2]`
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($arg:expr),* ; $($name:ident = $value:expr),+ $(,)?) => {
        $crate::Args::new()$(.arg($arg))*$(.kwarg(stringify!($name), $value))+
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::Args::new()$(.arg($arg))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_and_macro_agree() {
        let built = Args::new().arg(1).arg("two").kwarg("three", 3);
        assert_eq!(args![1, "two"; three = 3], built);
        assert_eq!(built.len(), 3);
        assert!(!built.is_empty());
        assert!(args![].is_empty());
    }

    #[test]
    fn test_named_only() {
        let args = args![; page = 2, size = 10];
        assert!(args.positional().is_empty());
        assert_eq!(args.get_named("page"), Some(&json!(2)));
    }

    #[test]
    fn test_display_is_order_independent_for_keywords() {
        let a = Args::new().arg(4).kwarg("b", 2).kwarg("a", 1);
        let b = Args::new().arg(4).kwarg("a", 1).kwarg("b", 2);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), r#"(4,){"a": 1, "b": 2}"#);
        assert_eq!(args![1, "x"].to_string(), r#"(1, "x"){}"#);
        assert_eq!(args![].to_string(), "(){}");
    }

    #[test]
    fn test_display_distinguishes_types() {
        assert_ne!(args![1].to_string(), args!["1"].to_string());
        assert_ne!(args![1].to_string(), args![; x = 1].to_string());
    }

    #[test]
    fn test_parse() {
        let args = args![4, "name"; limit = 10];
        assert_eq!(args.parse::<i64>(0).unwrap(), 4);
        assert_eq!(args.parse::<String>(1).unwrap(), "name");
        assert_eq!(args.parse_named::<u32>("limit").unwrap(), 10);

        assert!(matches!(args.parse::<i64>(5), Err(Error::Argument(_))));
        assert!(matches!(args.parse::<i64>(1), Err(Error::Codec(_))));
        assert!(matches!(args.parse_named::<i64>("nope"), Err(Error::Argument(_))));
    }

    #[test]
    fn test_with_receiver() {
        let args = args![1; k = 2];
        let bound = args.with_receiver(json!({"name": "Wade"}));
        assert_eq!(bound.positional(), &[json!({"name": "Wade"}), json!(1)]);
        assert_eq!(bound.get_named("k"), Some(&json!(2)));
    }
}
