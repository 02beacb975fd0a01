use sedbn_core::{infer, infer_with_config, infer_with_diagnostics, BnError, Evidence, InferenceConfig};

use crate::common::{brute_force, contaminant_effect, sediment_model};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn two_node_forward_and_diagnostic() {
    let model = contaminant_effect();

    let prior = infer(&model, &Evidence::new(), &["Effect"]).unwrap();
    assert!(close(prior.probability("Effect", "Toxic").unwrap(), 0.275));
    assert!(close(prior.probability("Effect", "None").unwrap(), 0.725));

    let diagnosis = infer(&model, &Evidence::new().with("Effect", "Toxic"), &["Contaminant"]).unwrap();
    assert!(close(
        diagnosis.probability("Contaminant", "High").unwrap(),
        0.24 / 0.275
    ));
    assert!(close(
        diagnosis.probability("Contaminant", "Low").unwrap(),
        0.035 / 0.275
    ));
}

#[test]
fn sediment_forward_prediction_sensitive_community() {
    let loaded = sediment_model();
    let evidence = Evidence::new()
        .with("Contaminant_Conc", "High")
        .with("TOC", "Low")
        .with("Benthic_Community_Type", "Sensitive");
    let result = infer(&loaded.model, &evidence, &["Bioavailability", "Ecological_Effect"]).unwrap();

    assert!(close(result.probability("Bioavailability", "High").unwrap(), 0.70));
    assert!(close(result.probability("Ecological_Effect", "None").unwrap(), 0.245));
    assert!(close(result.probability("Ecological_Effect", "Moderate").unwrap(), 0.32));
    assert!(close(result.probability("Ecological_Effect", "Severe").unwrap(), 0.435));
    assert_eq!(
        result.get("Ecological_Effect").unwrap().most_probable().0,
        "Severe"
    );
}

#[test]
fn sediment_diagnostic_queries_match_enumeration() {
    let loaded = sediment_model();
    let model = &loaded.model;
    let cases = [
        Evidence::new().with("Ecological_Effect", "None"),
        Evidence::new()
            .with("Mortality_Growth", "Impaired")
            .with("Community_Richness", "Low"),
        Evidence::new()
            .with("Community_Richness", "High")
            .with("TOC", "High")
            .with("Grain_Size", "Fine"),
    ];
    for evidence in &cases {
        for query in ["Contaminant_Conc", "Bioavailability", "Benthic_Community_Type"] {
            if evidence.contains(query) {
                continue;
            }
            let result = infer(model, evidence, &[query]).unwrap();
            let expected = brute_force(model, evidence, query).unwrap();
            let actual = result.get(query).unwrap().probabilities();
            for (a, e) in actual.iter().zip(&expected) {
                assert!((a - e).abs() < 1e-9, "{query} given {evidence:?}: {a} vs {e}");
            }
        }
    }
}

#[test]
fn clean_outcome_lowers_belief_in_high_contamination() {
    let loaded = sediment_model();
    let prior = infer(&loaded.model, &Evidence::new(), &["Contaminant_Conc"]).unwrap();
    let posterior = infer(
        &loaded.model,
        &Evidence::new().with("Ecological_Effect", "None"),
        &["Contaminant_Conc"],
    )
    .unwrap();
    assert!(close(prior.probability("Contaminant_Conc", "High").unwrap(), 0.1));
    assert!(
        posterior.probability("Contaminant_Conc", "High").unwrap()
            < prior.probability("Contaminant_Conc", "High").unwrap()
    );
}

#[test]
fn unobserved_roots_keep_their_priors() {
    let loaded = sediment_model();
    let result = infer(
        &loaded.model,
        &Evidence::new(),
        &["Contaminant_Conc", "TOC", "Grain_Size", "Benthic_Community_Type"],
    )
    .unwrap();
    let contaminant = result.get("Contaminant_Conc").unwrap().probabilities();
    assert!(close(contaminant[0], 0.6) && close(contaminant[1], 0.3) && close(contaminant[2], 0.1));
    assert!(close(result.probability("Benthic_Community_Type", "Sensitive").unwrap(), 0.4));
}

#[test]
fn posteriors_are_normalized() {
    let loaded = sediment_model();
    let evidence = Evidence::new().with("Mortality_Growth", "Impaired");
    let query: Vec<&str> = loaded
        .model
        .variables()
        .filter(|name| *name != "Mortality_Growth")
        .collect();
    let result = infer(&loaded.model, &evidence, &query).unwrap();
    assert_eq!(result.len(), query.len());
    for (_, distribution) in result.iter() {
        let total: f64 = distribution.probabilities().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}

#[test]
fn repeated_calls_are_bit_identical() {
    let loaded = sediment_model();
    let evidence = Evidence::new()
        .with("Community_Richness", "Low")
        .with("TOC", "High");
    let first = infer(&loaded.model, &evidence, &["Contaminant_Conc", "Ecological_Effect"]).unwrap();
    for _ in 0..5 {
        let again = infer(&loaded.model, &evidence, &["Contaminant_Conc", "Ecological_Effect"]).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn error_taxonomy() {
    let loaded = sediment_model();
    let model = &loaded.model;

    assert!(matches!(
        infer(model, &Evidence::new(), &["Salinity"]),
        Err(BnError::UnknownVariable(_))
    ));
    assert!(matches!(
        infer(model, &Evidence::new().with("Salinity", "High"), &["TOC"]),
        Err(BnError::UnknownVariable(_))
    ));
    assert!(matches!(
        infer(model, &Evidence::new().with("TOC", "Extreme"), &["Ecological_Effect"]),
        Err(BnError::InvalidState { .. })
    ));
    assert!(matches!(
        infer::<&str>(model, &Evidence::new(), &[]),
        Err(BnError::InvalidQuery(_))
    ));
    assert!(matches!(
        infer(model, &Evidence::new().with("TOC", "Low"), &["TOC"]),
        Err(BnError::InvalidQuery(_))
    ));
}

#[test]
fn factor_limit_is_enforced() {
    let loaded = sediment_model();
    let err = infer_with_config(
        &loaded.model,
        &Evidence::new(),
        &["Ecological_Effect"],
        InferenceConfig::with_max_factor_cells(4),
    )
    .unwrap_err();
    assert!(matches!(err, BnError::ModelTooLarge { limit: 4, .. }));
    assert_eq!(err.kind(), "model_too_large");
}

#[test]
fn diagnostics_describe_the_plan() {
    let loaded = sediment_model();
    let (_, diag) = infer_with_diagnostics(
        &loaded.model,
        &Evidence::new().with("Contaminant_Conc", "High"),
        &["Bioavailability"],
        InferenceConfig::default(),
    )
    .unwrap();
    // effect, community and both endpoints are barren for this query
    assert_eq!(diag.pruned_variables, 4);
    assert_eq!(diag.factors_instantiated, 4);
    assert_eq!(diag.elimination_order.len(), 2);
    assert!(diag.max_factor_cells <= 12);
}
