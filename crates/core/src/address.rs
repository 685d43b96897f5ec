//! Structured resource addresses.
//!
//! Plan addresses encode module nesting, data-source mode and instance keys
//! (`module.net["eu"].aws_subnet.private[0]`). This module parses them into a
//! typed form so callers never have to slice address strings by hand.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};

use crate::error::{Error, Result};

/// Instance key of a `count` or `for_each` expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstanceKey {
    /// `count` expansion: `[0]`
    Index(usize),
    /// `for_each` expansion: `["key"]`
    Key(String),
}

impl InstanceKey {
    fn parse(raw: &str) -> Result<Self> {
        let inner = raw.trim();
        if let Some(quoted) = inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return Ok(InstanceKey::Key(quoted.replace("\\\"", "\"")));
        }
        inner
            .parse::<usize>()
            .map(InstanceKey::Index)
            .map_err(|_| Error::invalid_address(raw, "instance key is neither index nor string"))
    }

    /// Render the key as a safe identifier token.
    pub fn token(&self) -> String {
        match self {
            InstanceKey::Index(i) => i.to_string(),
            InstanceKey::Key(k) => sanitize_token(k),
        }
    }
}

impl Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Index(i) => write!(f, "[{i}]"),
            InstanceKey::Key(k) => write!(f, "[\"{}\"]", k.replace('"', "\\\"")),
        }
    }
}

/// One dot-separated traversal step, with an optional bracket key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub key: Option<InstanceKey>,
}

/// Split an address or reference string into segments.
///
/// Dots inside bracketed keys (`["10.0.1.0/24"]`) do not split.
pub fn split_segments(s: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut name = String::new();
    let mut key: Option<InstanceKey> = None;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if name.is_empty() {
                    return Err(Error::invalid_address(s, "empty segment"));
                }
                segments.push(Segment {
                    name: std::mem::take(&mut name),
                    key: key.take(),
                });
            }
            '[' => {
                let mut raw = String::new();
                let mut in_string = false;
                let mut closed = false;
                while let Some(k) = chars.next() {
                    match k {
                        '\\' if in_string => {
                            raw.push(k);
                            if let Some(escaped) = chars.next() {
                                raw.push(escaped);
                            }
                        }
                        '"' => {
                            in_string = !in_string;
                            raw.push(k);
                        }
                        ']' if !in_string => {
                            closed = true;
                            break;
                        }
                        _ => raw.push(k),
                    }
                }
                if !closed {
                    return Err(Error::invalid_address(s, "unterminated instance key"));
                }
                // Attribute traversals like `tags["Name"]` or `a[0][1]` keep the last key
                key = Some(InstanceKey::parse(&raw)?);
            }
            _ => {
                if key.is_some() {
                    return Err(Error::invalid_address(s, "text after instance key"));
                }
                name.push(c);
            }
        }
    }

    if name.is_empty() {
        return Err(Error::invalid_address(s, "empty segment"));
    }
    segments.push(Segment { name, key });
    Ok(segments)
}

/// Resource mode: managed resource or data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    #[default]
    Managed,
    Data,
}

/// A module call step in an address: `module.<name>[<key>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleStep {
    pub name: String,
    pub key: Option<InstanceKey>,
}

/// Parsed resource address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    /// Module call chain from the root module
    pub module_path: Vec<ModuleStep>,
    pub mode: ResourceMode,
    pub resource_type: String,
    pub name: String,
    pub key: Option<InstanceKey>,
}

impl ResourceAddress {
    /// Parse a complete resource address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty, malformed, or carries
    /// trailing attribute segments.
    pub fn parse(s: &str) -> Result<Self> {
        let (address, rest) = Self::parse_prefix(s)?;
        if !rest.is_empty() {
            return Err(Error::invalid_address(s, "trailing segments after resource name"));
        }
        Ok(address)
    }

    /// Parse the resource part of a longer traversal.
    ///
    /// Returns the address and the remaining (attribute) segments, so
    /// `aws_instance.web[0].private_ip` yields `aws_instance.web[0]` and
    /// `["private_ip"]`.
    pub fn parse_prefix(s: &str) -> Result<(Self, Vec<Segment>)> {
        if s.is_empty() {
            return Err(Error::invalid_address(s, "address cannot be empty"));
        }
        let segments = split_segments(s)?;
        let mut iter = segments.into_iter().peekable();
        let mut module_path = Vec::new();

        while iter.peek().is_some_and(|seg| seg.name == "module" && seg.key.is_none()) {
            iter.next();
            let step = iter
                .next()
                .ok_or_else(|| Error::invalid_address(s, "module without name"))?;
            module_path.push(ModuleStep {
                name: step.name,
                key: step.key,
            });
        }

        let mut mode = ResourceMode::Managed;
        if iter.peek().is_some_and(|seg| seg.name == "data" && seg.key.is_none()) {
            iter.next();
            mode = ResourceMode::Data;
        }

        let type_seg = iter
            .next()
            .ok_or_else(|| Error::invalid_address(s, "missing resource type"))?;
        if type_seg.key.is_some() {
            return Err(Error::invalid_address(s, "resource type cannot carry a key"));
        }
        let name_seg = iter
            .next()
            .ok_or_else(|| Error::invalid_address(s, "missing resource name"))?;

        Ok((
            Self {
                module_path,
                mode,
                resource_type: type_seg.name,
                name: name_seg.name,
                key: name_seg.key,
            },
            iter.collect(),
        ))
    }

    /// The configuration-level address: all instance keys removed.
    #[must_use]
    pub fn config_address(&self) -> Self {
        Self {
            module_path: self
                .module_path
                .iter()
                .map(|m| ModuleStep {
                    name: m.name.clone(),
                    key: None,
                })
                .collect(),
            mode: self.mode,
            resource_type: self.resource_type.clone(),
            name: self.name.clone(),
            key: None,
        }
    }

    /// Same address, different instance key.
    #[must_use]
    pub fn with_key(&self, key: Option<InstanceKey>) -> Self {
        Self {
            key,
            ..self.clone()
        }
    }

    /// Module path rendered as an address prefix (`module.a.module.b.`).
    pub fn module_prefix(&self) -> String {
        module_prefix(&self.module_path)
    }

    /// Whether the address carries anything beyond `type.name`.
    pub fn is_decorated(&self) -> bool {
        !self.module_path.is_empty() || self.mode == ResourceMode::Data || self.key.is_some()
    }

    /// The instance index, if this is a `count` instance.
    pub fn index(&self) -> Option<usize> {
        match self.key {
            Some(InstanceKey::Index(i)) => Some(i),
            _ => None,
        }
    }

    /// Safe tokens for identifier generation, excluding the resource type.
    pub fn id_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        for step in &self.module_path {
            tokens.push(sanitize_token(&step.name));
            if let Some(key) = &step.key {
                tokens.push(key.token());
            }
        }
        if self.mode == ResourceMode::Data {
            tokens.push("data".to_string());
        }
        tokens.push(sanitize_token(&self.name));
        if let Some(key) = &self.key {
            tokens.push(key.token());
        }
        tokens
    }
}

/// Render a module path as an address prefix.
pub fn module_prefix(path: &[ModuleStep]) -> String {
    let mut out = String::new();
    for step in path {
        out.push_str("module.");
        out.push_str(&step.name);
        if let Some(key) = &step.key {
            out.push_str(&key.to_string());
        }
        out.push('.');
    }
    out
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_token(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module_prefix())?;
        if self.mode == ResourceMode::Data {
            write!(f, "data.")?;
        }
        write!(f, "{}.{}", self.resource_type, self.name)?;
        if let Some(key) = &self.key {
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ResourceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ResourceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ResourceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let addr = ResourceAddress::parse("aws_instance.web").unwrap();
        assert!(addr.module_path.is_empty());
        assert_eq!(addr.mode, ResourceMode::Managed);
        assert_eq!(addr.resource_type, "aws_instance");
        assert_eq!(addr.name, "web");
        assert_eq!(addr.key, None);
        assert!(!addr.is_decorated());
    }

    #[test]
    fn test_parse_module_and_keys() {
        let raw = r#"module.net["eu"].module.inner.aws_subnet.private[2]"#;
        let addr = ResourceAddress::parse(raw).unwrap();
        assert_eq!(addr.module_path.len(), 2);
        assert_eq!(addr.module_path[0].name, "net");
        assert_eq!(
            addr.module_path[0].key,
            Some(InstanceKey::Key("eu".to_string()))
        );
        assert_eq!(addr.module_path[1].name, "inner");
        assert_eq!(addr.resource_type, "aws_subnet");
        assert_eq!(addr.key, Some(InstanceKey::Index(2)));
        assert_eq!(addr.index(), Some(2));
        assert_eq!(addr.to_string(), raw);
    }

    #[test]
    fn test_parse_data_source() {
        let addr = ResourceAddress::parse("data.aws_ami.ubuntu").unwrap();
        assert_eq!(addr.mode, ResourceMode::Data);
        assert_eq!(addr.resource_type, "aws_ami");
        assert_eq!(addr.to_string(), "data.aws_ami.ubuntu");
    }

    #[test]
    fn test_key_with_dots() {
        let addr = ResourceAddress::parse(r#"aws_subnet.by_cidr["10.0.1.0/24"]"#).unwrap();
        assert_eq!(
            addr.key,
            Some(InstanceKey::Key("10.0.1.0/24".to_string()))
        );
    }

    #[test]
    fn test_parse_prefix_returns_attributes() {
        let (addr, rest) = ResourceAddress::parse_prefix("aws_instance.web[0].private_ip").unwrap();
        assert_eq!(addr.to_string(), "aws_instance.web[0]");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "private_ip");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ResourceAddress::parse("").is_err());
        assert!(ResourceAddress::parse("aws_instance").is_err());
        assert!(ResourceAddress::parse("aws_instance..web").is_err());
        assert!(ResourceAddress::parse("aws_instance.web[0").is_err());
        assert!(ResourceAddress::parse("aws_instance.web.id").is_err());
    }

    #[test]
    fn test_config_address_drops_keys() {
        let addr = ResourceAddress::parse(r#"module.net[0].aws_subnet.private["a"]"#).unwrap();
        assert_eq!(
            addr.config_address().to_string(),
            "module.net.aws_subnet.private"
        );
    }

    #[test]
    fn test_id_tokens_are_safe() {
        let addr = ResourceAddress::parse(r#"module.net.aws_subnet.by_az["us-east-1a"]"#).unwrap();
        assert_eq!(addr.id_tokens(), vec!["net", "by_az", "us-east-1a"]);
    }
}
