//! Default values and functions for configuration

/// Identifier prefixes treated as references during id-equality matching
pub(crate) const DEFAULT_ID_PREFIXES: &[&str] = &[
    "vpc-", "subnet-", "sg-", "i-", "rtb-", "igw-", "nat-", "eni-", "eipalloc-", "vol-", "ami-",
    "arn:",
];

/// Attributes of other resources that identifier-like values are matched against
pub(crate) const DEFAULT_ID_ATTRIBUTES: &[&str] = &["id", "arn"];

pub(crate) fn default_fail_on_empty_plan() -> bool {
    false
}

pub(crate) fn default_skip_data_sources() -> bool {
    true
}

pub(crate) fn default_id_prefixes() -> Vec<String> {
    DEFAULT_ID_PREFIXES.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn default_id_attributes() -> Vec<String> {
    DEFAULT_ID_ATTRIBUTES.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn default_id_fallback() -> bool {
    true
}
