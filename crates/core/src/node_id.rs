//! Node identifier generation: deterministic, collision-resistant ids

use twox_hash::XxHash3_128;

use crate::address::{sanitize_token, ResourceAddress};

/// Derive the IR node identifier for a plan resource.
///
/// Pure function of `(address, resource_type)`. Plain `type.name` addresses
/// map to readable `type-name` ids; the type never contains `-`, so these
/// cannot collide with each other. Any decoration (module path, instance
/// key, data mode) is flattened into tokens and suffixed with a digest of
/// the raw address so that lossy sanitization can never merge two
/// addresses.
pub fn generate_node_id(address: &str, resource_type: &str) -> String {
    let (tokens, decorated) = match ResourceAddress::parse(address) {
        Ok(parsed) => (parsed.id_tokens(), parsed.is_decorated()),
        Err(_) => (vec![sanitize_token(address)], true),
    };

    let base = format!("{}-{}", sanitize_token(resource_type), tokens.join("_"));
    if !decorated {
        return base;
    }

    let unique_str = format!("{resource_type}:{address}");
    let digest = XxHash3_128::oneshot(unique_str.as_bytes());
    format!("{base}-{:08x}", digest as u32)
}
