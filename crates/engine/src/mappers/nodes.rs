//! Table-driven primary mappers: one node per resource

use im::OrdMap;
use serde_json::Value;
use topograph_core::error::{Error, Result};
use topograph_core::ir::IrNodeBuilder;
use tracing::debug;

use crate::context::MappingContext;
use crate::filter::{DependencyFilterSpec, SyntheticRule};
use crate::registry::ResourceMapper;
use crate::walker::PlanResource;

/// Declarative description of a primary mapper
#[derive(Debug, Clone, Copy)]
pub struct NodeSpec {
    pub resource_type: &'static str,
    pub node_type: &'static str,
    pub capabilities: &'static [&'static str],
    /// `(plan attribute, IR property)` pairs
    pub properties: &'static [(&'static str, &'static str)],
    /// Plan attributes copied into metadata
    pub metadata: &'static [&'static str],
    pub filter: DependencyFilterSpec,
    /// Payload predicate; `None` accepts everything
    pub accepts: Option<fn(&Value) -> bool>,
}

fn not_gateway_load_balancer(values: &Value) -> bool {
    values.get("load_balancer_type").and_then(Value::as_str) != Some("gateway")
}

fn has_payload(values: &Value) -> bool {
    values.is_object()
}

pub const NODE_SPECS: &[NodeSpec] = &[
    NodeSpec {
        resource_type: "aws_vpc",
        node_type: "Network",
        capabilities: &["link"],
        properties: &[
            ("cidr_block", "cidr"),
            ("enable_dns_support", "dns_support"),
            ("enable_dns_hostnames", "dns_hostnames"),
            ("instance_tenancy", "tenancy"),
        ],
        metadata: &["id", "arn", "tags"],
        filter: DependencyFilterSpec::NONE,
        accepts: None,
    },
    NodeSpec {
        resource_type: "aws_subnet",
        node_type: "Subnet",
        capabilities: &["link"],
        properties: &[
            ("cidr_block", "cidr"),
            ("availability_zone", "availability_zone"),
            ("map_public_ip_on_launch", "public_ip_on_launch"),
        ],
        metadata: &["id", "arn", "tags"],
        filter: DependencyFilterSpec {
            exclude_target_types: &[],
            exclude_properties: &[],
            synthetic_edges: &[SyntheticRule::PrivateSubnetRouteTable],
        },
        accepts: None,
    },
    NodeSpec {
        resource_type: "aws_security_group",
        node_type: "SecurityGroup",
        capabilities: &["binding"],
        properties: &[
            ("name", "name"),
            ("description", "description"),
            ("ingress", "ingress_rules"),
            ("egress", "egress_rules"),
        ],
        metadata: &["id", "arn", "tags"],
        // Rules referencing peer groups would make every group depend on its peers
        filter: DependencyFilterSpec {
            exclude_target_types: &["aws_security_group"],
            exclude_properties: &[],
            synthetic_edges: &[],
        },
        accepts: None,
    },
    NodeSpec {
        resource_type: "aws_internet_gateway",
        node_type: "Gateway",
        capabilities: &["link"],
        properties: &[],
        metadata: &["id", "arn", "tags"],
        filter: DependencyFilterSpec::NONE,
        accepts: None,
    },
    NodeSpec {
        resource_type: "aws_route_table",
        node_type: "RouteTable",
        capabilities: &["link"],
        properties: &[("route", "routes")],
        metadata: &["id", "arn", "tags"],
        // Routes point at gateways in the subnets that route through this table
        filter: DependencyFilterSpec {
            exclude_target_types: &[],
            exclude_properties: &["route"],
            synthetic_edges: &[],
        },
        accepts: None,
    },
    NodeSpec {
        resource_type: "aws_instance",
        node_type: "Compute",
        capabilities: &["host", "endpoint"],
        properties: &[
            ("instance_type", "instance_type"),
            ("ami", "image"),
            ("key_name", "key_name"),
            ("associate_public_ip_address", "public_address_enabled"),
        ],
        metadata: &["id", "arn", "private_ip", "public_ip", "tags"],
        filter: DependencyFilterSpec::NONE,
        accepts: Some(has_payload),
    },
    NodeSpec {
        resource_type: "aws_lb",
        node_type: "LoadBalancer",
        capabilities: &["client", "endpoint"],
        properties: &[
            ("internal", "internal"),
            ("load_balancer_type", "load_balancer_type"),
            ("ip_address_type", "ip_address_type"),
        ],
        metadata: &["arn", "dns_name", "tags"],
        filter: DependencyFilterSpec::NONE,
        accepts: Some(not_gateway_load_balancer),
    },
    NodeSpec {
        resource_type: "aws_lb_target_group",
        node_type: "TargetGroup",
        capabilities: &["endpoint"],
        properties: &[
            ("port", "port"),
            ("protocol", "protocol"),
            ("target_type", "target_type"),
        ],
        metadata: &["arn", "tags"],
        filter: DependencyFilterSpec::NONE,
        accepts: None,
    },
    NodeSpec {
        resource_type: "aws_db_instance",
        node_type: "Database",
        capabilities: &["database_endpoint"],
        properties: &[
            ("engine", "engine"),
            ("engine_version", "engine_version"),
            ("instance_class", "instance_class"),
            ("allocated_storage", "storage_size"),
            ("db_name", "name"),
            ("username", "user"),
        ],
        metadata: &["id", "arn", "endpoint", "tags"],
        filter: DependencyFilterSpec::NONE,
        accepts: None,
    },
    NodeSpec {
        resource_type: "aws_s3_bucket",
        node_type: "ObjectStorage",
        capabilities: &["storage_endpoint"],
        properties: &[("bucket", "name"), ("force_destroy", "force_destroy")],
        metadata: &["arn", "bucket_domain_name", "tags"],
        filter: DependencyFilterSpec::NONE,
        accepts: None,
    },
];

/// Primary mapper driven by a [`NodeSpec`]
pub struct NodeMapper {
    spec: &'static NodeSpec,
}

impl NodeMapper {
    pub fn new(spec: &'static NodeSpec) -> Self {
        Self { spec }
    }
}

impl ResourceMapper for NodeMapper {
    fn resource_type(&self) -> &str {
        self.spec.resource_type
    }

    fn can_map(&self, resource_type: &str, values: &Value) -> bool {
        resource_type == self.spec.resource_type && self.spec.accepts.is_none_or(|f| f(values))
    }

    fn dependency_filter(&self) -> &DependencyFilterSpec {
        &self.spec.filter
    }

    fn map(&self, ctx: &mut MappingContext<'_>, resource: &PlanResource) -> Result<()> {
        let id = ctx.node_id(resource);

        let mut properties = OrdMap::new();
        for (attribute, property) in self.spec.properties {
            let value = ctx.property(resource, attribute);
            if value.as_literal().is_some_and(Value::is_null) {
                continue;
            }
            properties.insert((*property).to_string(), value);
        }

        let mut metadata = ctx.base_metadata(resource);
        for attribute in self.spec.metadata {
            let value = ctx.metadata(resource, attribute);
            if !value.is_null() {
                metadata.insert((*attribute).to_string(), value);
            }
        }

        let requirements = ctx.requirements(resource, self.dependency_filter());

        let node = IrNodeBuilder::default()
            .id(id.clone())
            .node_type(self.spec.node_type)
            .capabilities(
                self.spec
                    .capabilities
                    .iter()
                    .map(|c| (*c).to_string())
                    .collect::<Vec<_>>(),
            )
            .requirements(requirements)
            .properties(properties)
            .metadata(metadata)
            .build()
            .map_err(|e| Error::mapping(&resource.address, &resource.resource_type, e.to_string()))?;

        if !ctx.builder.add_node(node) {
            return Err(Error::mapping(
                &resource.address,
                &resource.resource_type,
                format!("node {id} already exists"),
            ));
        }
        debug!("Mapped {} as {} node {id}", resource.address, self.spec.node_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn spec(resource_type: &str) -> &'static NodeSpec {
        NODE_SPECS
            .iter()
            .find(|s| s.resource_type == resource_type)
            .unwrap()
    }

    #[test]
    fn test_specs_are_unique() {
        let types: HashSet<&str> = NODE_SPECS.iter().map(|s| s.resource_type).collect();
        assert_eq!(types.len(), NODE_SPECS.len());
    }

    #[test]
    fn test_gateway_load_balancers_are_declined() {
        let mapper = NodeMapper::new(spec("aws_lb"));
        assert!(mapper.can_map("aws_lb", &json!({"load_balancer_type": "application"})));
        assert!(!mapper.can_map("aws_lb", &json!({"load_balancer_type": "gateway"})));
        assert!(!mapper.can_map("aws_alb", &json!({})));
    }

    #[test]
    fn test_instance_requires_payload() {
        let mapper = NodeMapper::new(spec("aws_instance"));
        assert!(mapper.can_map("aws_instance", &json!({"ami": "ami-1"})));
        assert!(!mapper.can_map("aws_instance", &Value::Null));
    }

    #[test]
    fn test_subnet_filter_injects_route_tables() {
        let mapper = NodeMapper::new(spec("aws_subnet"));
        assert_eq!(
            mapper.dependency_filter().synthetic_edges,
            &[SyntheticRule::PrivateSubnetRouteTable]
        );
    }
}
