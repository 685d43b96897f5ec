//! Bundled resource mappers

pub mod associations;
pub mod nodes;

pub use associations::{AssociationMapper, AssociationSpec, Endpoint, ASSOCIATION_SPECS};
pub use nodes::{NodeMapper, NodeSpec, NODE_SPECS};

use crate::registry::MapperRegistry;

/// Register every bundled mapper
pub fn register_defaults(registry: &mut MapperRegistry) {
    for spec in NODE_SPECS {
        registry.register(Box::new(NodeMapper::new(spec)));
    }
    for spec in ASSOCIATION_SPECS {
        registry.register(Box::new(AssociationMapper::new(spec)));
    }
}
