//! Integration tests for the CLI command bodies

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;
use topograph::{
    bindings, check_strict, convert, format_binding, format_edge, load_config, load_plan,
    references,
};
use topograph_core::config::Config;

const PLAN: &str = r#"{
  "variables": {"instance_type": {"value": "t3.large"}},
  "planned_values": {"root_module": {"resources": [
    {"address": "aws_vpc.main", "type": "aws_vpc", "name": "main", "values": {"cidr_block": "10.0.0.0/16"}},
    {"address": "aws_instance.app", "type": "aws_instance", "name": "app",
     "values": {"instance_type": "t3.large", "ami": "ami-0123"}}
  ]}},
  "configuration": {"root_module": {
    "variables": {"instance_type": {"default": "t3.micro"}},
    "resources": [
      {"address": "aws_instance.app", "type": "aws_instance", "name": "app",
       "expressions": {"instance_type": {"references": ["var.instance_type"]}},
       "depends_on": ["aws_vpc.main"]}
    ]
  }}
}"#;

fn plan_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_convert_renders_topology_json() {
    let file = plan_file(PLAN);
    let plan = load_plan(file.path()).unwrap();
    let (rendered, outcome) = convert(&plan, &Config::default()).unwrap();
    assert!(check_strict(&outcome).is_ok());

    let topology: Value = serde_json::from_str(&rendered).unwrap();
    let ids: Vec<&str> = topology["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["aws_instance-app", "aws_vpc-main"]);
    assert_eq!(
        topology["nodes"][0]["properties"]["instance_type"],
        json!({"get_input": "instance_type"})
    );
    assert_eq!(
        topology["nodes"][0]["requirements"],
        json!([{"name": "depends_on", "target": "aws_vpc-main", "relationship": "depends-on"}])
    );
    assert_eq!(topology["inputs"][0]["name"], json!("instance_type"));
}

#[test]
fn test_references_and_bindings_listings() {
    let plan = load_plan(plan_file(PLAN).path()).unwrap();

    let edges: Vec<String> = references(&plan, &Config::default())
        .unwrap()
        .iter()
        .map(format_edge)
        .collect();
    assert_eq!(
        edges,
        vec!["aws_instance.app -depends_on-> aws_vpc.main [depends-on, expression]"]
    );

    let (found, diagnostics) = bindings(&plan).unwrap();
    assert!(diagnostics.is_empty());
    let lines: Vec<String> = found.iter().map(format_binding).collect();
    assert_eq!(
        lines,
        vec!["aws_instance.app.instance_type = var.instance_type (scalar)"]
    );
}

#[test]
fn test_unreadable_plan_reports_path() {
    let err = load_plan(std::path::Path::new("/nonexistent/plan.json")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/plan.json"));

    let garbage = plan_file("{not json");
    let err = load_plan(garbage.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse plan"));
}

#[test]
fn test_missing_root_module_fails_conversion() {
    let plan = load_plan(plan_file(r#"{"format_version": "1.2"}"#).path()).unwrap();
    let err = convert(&plan, &Config::default()).unwrap_err();
    assert!(err.to_string().contains("Extraction failure"));
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[mapping]\nfail_on_empty_plan = true").unwrap();

    let config = load_config(Some(file.path())).unwrap();
    assert!(config.mapping.fail_on_empty_plan);
    assert!(config.mapping.skip_data_sources);
}
