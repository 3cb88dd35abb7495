use super::*;
use proptest::prelude::*;

const SHOPPING_BLUEPRINT: &str = r#"{
  "system_name": "ShoppingAssistant",
  "description": "Helps users buy things",
  "flow_type": "Sequential",
  "agents": [
    {"name": "SearchAgent", "role": "Find products", "tools": ["catalog_search"], "dependencies": []},
    {"name": "CartAgent", "role": "Manage the cart", "tools": [], "dependencies": ["SearchAgent"]},
    {"name": "CheckoutAgent", "role": "Complete payment", "tools": ["payments"], "dependencies": ["CartAgent"]}
  ]
}"#;

#[test]
fn test_valid_blueprint() {
    let blueprint = validate_blueprint(SHOPPING_BLUEPRINT).unwrap();
    assert_eq!(blueprint.system_name, "ShoppingAssistant");
    assert_eq!(blueprint.flow_type, FlowType::Sequential);
    assert_eq!(
        blueprint.agent_names(),
        vec!["SearchAgent", "CartAgent", "CheckoutAgent"]
    );
    assert!(blueprint.agents[1].dependencies.contains("SearchAgent"));
}

#[test]
fn test_fenced_blueprint_with_prose() {
    let output = format!(
        "Here is the revised design:\n\n```json\n{}\n```\n\nLet me know what you think.",
        SHOPPING_BLUEPRINT
    );
    let blueprint = validate_blueprint(&output).unwrap();
    assert_eq!(blueprint.agents.len(), 3);
}

#[test]
fn test_flow_type_is_normalized() {
    let output = SHOPPING_BLUEPRINT.replace("\"Sequential\"", "\"PARALLEL\"");
    let blueprint = validate_blueprint(&output).unwrap();
    assert_eq!(blueprint.flow_type, FlowType::Parallel);
    assert!(blueprint.to_json_pretty().contains("\"parallel\""));
}

#[test]
fn test_validation_is_idempotent() {
    let first = validate_blueprint(SHOPPING_BLUEPRINT);
    let second = validate_blueprint(SHOPPING_BLUEPRINT);
    assert_eq!(first, second);

    let broken = SHOPPING_BLUEPRINT.replace("[\"CartAgent\"]", "[\"Ghost\"]");
    assert_eq!(validate_blueprint(&broken), validate_blueprint(&broken));
}

#[test]
fn test_missing_tools_and_dependencies_default_to_empty() {
    let output = r#"{"system_name": "Solo", "flow_type": "sequential",
        "agents": [{"name": "Only", "role": "Does everything"}]}"#;
    let blueprint = validate_blueprint(output).unwrap();
    assert!(blueprint.agents[0].tools.is_empty());
    assert!(blueprint.agents[0].dependencies.is_empty());
    assert!(blueprint.description.is_none());
}

#[test]
fn test_not_json() {
    assert!(matches!(
        validate_blueprint("I could not design that, sorry."),
        Err(BlueprintViolation::Malformed { .. })
    ));
    assert!(matches!(
        validate_blueprint("{ \"system_name\": \"X\", }"),
        Err(BlueprintViolation::Malformed { .. })
    ));
}

#[test]
fn test_empty_system_name() {
    let output = SHOPPING_BLUEPRINT.replace("\"ShoppingAssistant\"", "\"  \"");
    assert_eq!(
        validate_blueprint(&output),
        Err(BlueprintViolation::EmptySystemName)
    );
}

#[test]
fn test_missing_system_name() {
    let output = r#"{"flow_type": "sequential", "agents": [{"name": "A", "role": "r"}]}"#;
    assert!(matches!(
        validate_blueprint(output),
        Err(BlueprintViolation::InvalidField { ref field, .. }) if field == "system_name"
    ));
}

#[test]
fn test_unknown_flow_type() {
    let output = SHOPPING_BLUEPRINT.replace("\"Sequential\"", "\"RoundRobin\"");
    let err = validate_blueprint(&output).unwrap_err();
    assert_eq!(
        err,
        BlueprintViolation::UnknownFlowType {
            value: "RoundRobin".to_string()
        }
    );
    assert!(err.to_string().contains("sequential, parallel, conditional"));
}

#[test]
fn test_empty_agents() {
    let output = r#"{"system_name": "X", "flow_type": "parallel", "agents": []}"#;
    assert_eq!(validate_blueprint(output), Err(BlueprintViolation::NoAgents));
}

#[test]
fn test_empty_role() {
    let output = r#"{"system_name": "X", "flow_type": "parallel",
        "agents": [{"name": "A", "role": ""}]}"#;
    assert_eq!(
        validate_blueprint(output),
        Err(BlueprintViolation::EmptyRole {
            agent: "A".to_string()
        })
    );
}

#[test]
fn test_duplicate_agent_names() {
    let output = r#"{"system_name": "X", "flow_type": "parallel",
        "agents": [{"name": "A", "role": "one"}, {"name": "A", "role": "two"}]}"#;
    assert_eq!(
        validate_blueprint(output),
        Err(BlueprintViolation::DuplicateAgent {
            name: "A".to_string()
        })
    );
}

#[test]
fn test_dangling_dependency() {
    let output = SHOPPING_BLUEPRINT.replace("[\"CartAgent\"]", "[\"PaymentGateway\"]");
    let err = validate_blueprint(&output).unwrap_err();
    assert_eq!(
        err,
        BlueprintViolation::DanglingDependency {
            agent: "CheckoutAgent".to_string(),
            dependency: "PaymentGateway".to_string()
        }
    );
    assert!(err.is_dependency_violation());
    assert!(err.to_string().contains("dependency violation"));
}

#[test]
fn test_self_dependency() {
    let output = r#"{"system_name": "X", "flow_type": "conditional",
        "agents": [{"name": "A", "role": "loops", "dependencies": ["A"]}]}"#;
    let err = validate_blueprint(output).unwrap_err();
    assert!(err.is_dependency_violation());
}

#[test]
fn test_non_string_tool_is_rejected() {
    let output = r#"{"system_name": "X", "flow_type": "sequential",
        "agents": [{"name": "A", "role": "r", "tools": [42]}]}"#;
    assert!(matches!(
        validate_blueprint(output),
        Err(BlueprintViolation::InvalidField { ref field, .. }) if field == "agents[0].tools"
    ));
}

/// Builds blueprint JSON for `n` agents whose dependencies are given as
/// indices; indices at or beyond `n` become references to missing agents.
fn graph_json(n: usize, edges: &[(usize, usize)]) -> String {
    let agents: Vec<serde_json::Value> = (0..n)
        .map(|i| {
            let deps: Vec<String> = edges
                .iter()
                .filter(|(from, to)| *from == i && *to != i)
                .map(|(_, to)| format!("agent_{}", to))
                .collect();
            serde_json::json!({
                "name": format!("agent_{}", i),
                "role": format!("role {}", i),
                "dependencies": deps,
            })
        })
        .collect();
    serde_json::json!({
        "system_name": "Generated",
        "flow_type": "sequential",
        "agents": agents,
    })
    .to_string()
}

proptest! {
    #[test]
    fn prop_validated_blueprints_have_closed_dependencies(
        n in 1usize..8,
        edges in proptest::collection::vec((0usize..8, 0usize..12), 0..16),
    ) {
        let edges: Vec<(usize, usize)> = edges.into_iter().filter(|(from, _)| *from < n).collect();
        let has_dangling = edges.iter().any(|(from, to)| to >= &n && from != to);
        let json = graph_json(n, &edges);

        match validate_blueprint(&json) {
            Ok(blueprint) => {
                prop_assert!(!has_dangling);
                let names: HashSet<&str> = blueprint.agents.iter().map(|a| a.name.as_str()).collect();
                for agent in &blueprint.agents {
                    for dep in &agent.dependencies {
                        prop_assert!(names.contains(dep.as_str()));
                    }
                }
            }
            Err(violation) => {
                prop_assert!(has_dangling);
                prop_assert!(violation.is_dependency_violation(), "unexpected violation: {}", violation);
            }
        }
    }

    #[test]
    fn prop_validation_is_deterministic(
        n in 1usize..6,
        edges in proptest::collection::vec((0usize..6, 0usize..9), 0..10),
    ) {
        let edges: Vec<(usize, usize)> = edges.into_iter().filter(|(from, _)| *from < n).collect();
        let json = graph_json(n, &edges);
        prop_assert_eq!(validate_blueprint(&json), validate_blueprint(&json));
    }
}
