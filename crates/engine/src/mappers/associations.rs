//! Associative mappers: resources that only link two other nodes

use topograph_core::error::{Error, Result};
use topograph_core::ir::Requirement;
use topograph_core::relationships::RelationshipKind;
use tracing::debug;

use crate::context::MappingContext;
use crate::registry::{MapperRole, ResourceMapper};
use crate::walker::PlanResource;

/// One end of an association: the property that references it and the
/// type it must have
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub property: &'static str,
    pub target_type: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct AssociationSpec {
    pub resource_type: &'static str,
    /// Node that receives the requirement
    pub source: Endpoint,
    /// Node the requirement points at
    pub target: Endpoint,
    pub requirement: &'static str,
    pub relationship: RelationshipKind,
}

pub const ASSOCIATION_SPECS: &[AssociationSpec] = &[
    AssociationSpec {
        resource_type: "aws_route_table_association",
        source: Endpoint {
            property: "subnet_id",
            target_type: "aws_subnet",
        },
        target: Endpoint {
            property: "route_table_id",
            target_type: "aws_route_table",
        },
        requirement: "route_table",
        relationship: RelationshipKind::LinksTo,
    },
    AssociationSpec {
        resource_type: "aws_lb_target_group_attachment",
        source: Endpoint {
            property: "target_group_arn",
            target_type: "aws_lb_target_group",
        },
        target: Endpoint {
            property: "target_id",
            target_type: "aws_instance",
        },
        requirement: "target",
        relationship: RelationshipKind::ConnectsTo,
    },
];

pub struct AssociationMapper {
    spec: &'static AssociationSpec,
}

impl AssociationMapper {
    pub fn new(spec: &'static AssociationSpec) -> Self {
        Self { spec }
    }
}

impl ResourceMapper for AssociationMapper {
    fn resource_type(&self) -> &str {
        self.spec.resource_type
    }

    fn role(&self) -> MapperRole {
        MapperRole::Associative
    }

    fn map(&self, ctx: &mut MappingContext<'_>, resource: &PlanResource) -> Result<()> {
        let source = self.spec.source;
        let target = self.spec.target;
        let Some(source_id) = ctx.endpoint(resource, source.property, source.target_type) else {
            return Ok(());
        };
        let Some(target_id) = ctx.endpoint(resource, target.property, target.target_type) else {
            return Ok(());
        };

        let requirement = Requirement {
            name: self.spec.requirement.to_string(),
            target: target_id.clone(),
            relationship: self.spec.relationship,
        };
        if !ctx.builder.add_requirement(&source_id, requirement) {
            return Err(Error::mapping(
                &resource.address,
                &resource.resource_type,
                format!("endpoint node {source_id} disappeared"),
            ));
        }
        debug!(
            "{}: {source_id} {} {target_id}",
            resource.address, self.spec.relationship
        );
        Ok(())
    }
}
