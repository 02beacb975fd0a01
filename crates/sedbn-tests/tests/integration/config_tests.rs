use std::io::Write;

use sedbn_core::{load_model, BnError, InferenceConfig, ModelDefinition, ResponseMode};

use crate::common::{sediment_model, workspace_path};

#[test]
fn bundled_model_loads() {
    let loaded = sediment_model();
    let model = &loaded.model;
    assert_eq!(model.len(), 8);
    assert_eq!(model.features().len(), 4);
    assert_eq!(loaded.inference, InferenceConfig::with_max_factor_cells(1 << 24));

    let adapter = loaded.adapter.as_ref().unwrap();
    assert_eq!(adapter.target, "Ecological_Effect");
    assert_eq!(adapter.response, ResponseMode::Label);

    let bio = model.factor_for("Bioavailability").unwrap();
    assert_eq!(bio.parents().len(), 3);
    assert_eq!(bio.values().len(), 24);
}

#[test]
fn topological_order_puts_parents_first() {
    let loaded = sediment_model();
    let model = &loaded.model;
    let order = model.topological_order();
    assert_eq!(order.len(), model.len());
    for var in model.iter_variables() {
        for parent in model.parents(var.id()) {
            assert!(model.topological_rank(*parent) < model.topological_rank(var.id()));
        }
    }
}

#[test]
fn json_and_toml_definitions_build_the_same_model() {
    let toml_def = ModelDefinition::load(workspace_path("models/bc_sediment.toml")).unwrap();
    let json = serde_json::to_string_pretty(&toml_def).unwrap();
    let json_def = ModelDefinition::from_json_str(&json).unwrap();
    assert_eq!(toml_def, json_def);

    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    let loaded = load_model(file.path()).unwrap();
    assert_eq!(
        loaded.model.variables().collect::<Vec<_>>(),
        sediment_model().model.variables().collect::<Vec<_>>()
    );
}

#[test]
fn structural_problems_surface_at_load() {
    let cases = [
        // row does not sum to one
        r#"
        [[variable]]
        name = "A"
        states = ["x", "y"]
        [[factor]]
        child = "A"
        prior = [0.5, 0.6]
        "#,
        // missing CPT
        r#"
        [[variable]]
        name = "A"
        states = ["x", "y"]
        "#,
        // cycle
        r#"
        [[variable]]
        name = "A"
        states = ["x", "y"]
        [[variable]]
        name = "B"
        states = ["x", "y"]
        [[factor]]
        child = "A"
        parents = ["B"]
        rows = [{ given = ["x"], probs = [0.5, 0.5] }, { given = ["y"], probs = [0.5, 0.5] }]
        [[factor]]
        child = "B"
        parents = ["A"]
        rows = [{ given = ["x"], probs = [0.5, 0.5] }, { given = ["y"], probs = [0.5, 0.5] }]
        "#,
        // missing parent combination
        r#"
        [[variable]]
        name = "A"
        states = ["x", "y"]
        [[variable]]
        name = "B"
        states = ["x", "y"]
        [[factor]]
        child = "A"
        prior = [0.5, 0.5]
        [[factor]]
        child = "B"
        parents = ["A"]
        rows = [{ given = ["x"], probs = [0.5, 0.5] }]
        "#,
    ];
    for source in cases {
        let def = ModelDefinition::from_toml_str(source).unwrap();
        assert!(matches!(def.build(), Err(BnError::Structure(_))), "{source}");
    }
}

#[test]
fn bad_feature_bindings_are_structure_errors() {
    let source = r#"
        [[variable]]
        name = "TOC"
        states = ["Low", "High"]
        [[factor]]
        child = "TOC"
        prior = [0.5, 0.5]
        [[feature]]
        name = "toc"
        variable = "TOC"
        bins = [{ state = "Low", below = 2.0 }, { state = "High", below = 1.0 }, { state = "High" }]
    "#;
    let def = ModelDefinition::from_toml_str(source).unwrap();
    assert!(matches!(def.build(), Err(BnError::Structure(_))));
}

#[test]
fn zero_factor_budget_is_rejected() {
    let source = r#"
        [[variable]]
        name = "A"
        states = ["x"]
        [[factor]]
        child = "A"
        prior = [1.0]
        [inference]
        max_factor_cells = 0
    "#;
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    assert!(matches!(load_model(file.path()), Err(BnError::Config(_))));
}
