//! End-to-end compiles of small models.

use dms_compiler::import::to_conceptual;
use dms_compiler::{compile, CompileError, CompileOptions};
use dms_conformance::IssueKind;
use dms_model::conceptual::{ClassDraft, ModelDraft, PropertyDraft};
use dms_model::schema::{EdgeDirection, Filter, PropertyType, ViewProperty};
use dms_model::{
    AnalysisError, ClassEntity, Completeness, ContainerEntity, ExtensionCategory, RuleAnalysis,
    ViewEntity,
};

fn asset_model() -> ModelDraft {
    ModelDraft::new("power", "1")
        .with_class(ClassDraft::new("Asset"))
        .with_class(ClassDraft::new("GeoPoint"))
        .with_property(PropertyDraft::new("Asset", "name", "text").with_count(1, Some(1)))
        .with_property(PropertyDraft::new("Asset", "location", "GeoPoint").with_count(0, Some(1)))
        .with_property(PropertyDraft::new("GeoPoint", "lat", "float64").with_count(1, Some(1)))
        .with_property(PropertyDraft::new("GeoPoint", "lon", "float64").with_count(1, Some(1)))
}

fn view(name: &str, version: &str) -> ViewEntity {
    ViewEntity::new("power", name, version).unwrap()
}

fn container(name: &str) -> ContainerEntity {
    ContainerEntity::new("power", name).unwrap()
}

// =============================================================================
// Basic layout
// =============================================================================

#[test]
fn asset_with_location() {
    let model = asset_model().finalize().unwrap();
    let output = compile(&model, &CompileOptions::default()).unwrap();
    let schema = &output.schema;

    let names: Vec<&str> = schema.containers.keys().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Asset", "GeoPoint"]);

    let asset = &schema.containers[&container("Asset")];
    assert!(!asset.properties["name"].nullable);
    assert!(asset.properties["location"].value_type.is_direct());
    assert!(asset.properties["location"].nullable);
    assert_eq!(
        schema.containers[&container("GeoPoint")].properties["lat"].value_type,
        PropertyType::Primitive(dms_model::DataType::Double)
    );

    let asset_view = &schema.views[&view("Asset", "1")];
    match &asset_view.properties["location"] {
        ViewProperty::Mapped(mapped) => {
            assert_eq!(mapped.container, container("Asset"));
            assert_eq!(mapped.container_property, "location");
            assert_eq!(mapped.source, Some(view("GeoPoint", "1")));
        }
        other => panic!("expected a mapped property, got {other:?}"),
    }
    assert_eq!(
        asset_view.filter,
        Some(Filter::HasData(vec![container("Asset")]))
    );

    let data_model = schema.data_model.as_ref().unwrap();
    assert_eq!(data_model.external_id, "power");
    assert_eq!(data_model.views, vec![view("Asset", "1"), view("GeoPoint", "1")]);

    let summary = output.summary();
    assert_eq!((summary.views, summary.containers, summary.properties), (2, 2, 4));
}

#[test]
fn lists_of_classes_become_edges() {
    let model = asset_model()
        .with_class(ClassDraft::new("Sensor"))
        .with_property(PropertyDraft::new("Asset", "sensors", "Sensor").with_count(0, None))
        .with_property(PropertyDraft::new("Sensor", "tags", "text").with_count(0, None))
        .finalize()
        .unwrap();
    let output = compile(&model, &CompileOptions::default()).unwrap();

    match &output.schema.views[&view("Asset", "1")].properties["sensors"] {
        ViewProperty::Edge(edge) => {
            assert_eq!(edge.source, view("Sensor", "1"));
            assert_eq!(edge.edge_type.to_string(), "power:Asset.sensors");
            assert_eq!(edge.direction, EdgeDirection::Outwards);
        }
        other => panic!("expected an edge, got {other:?}"),
    }
    assert!(!output.schema.containers[&container("Asset")].properties.contains_key("sensors"));
    assert!(output.schema.containers[&container("Sensor")].properties["tags"].is_list);
    assert!(output
        .schema
        .node_types
        .iter()
        .any(|n| n.to_string() == "power:Asset.sensors"));
}

#[test]
fn overflow_containers_avoid_namesake_classes() {
    let model = ModelDraft::new("power", "1")
        .with_class(ClassDraft::new("Asset"))
        .with_class(ClassDraft::new("Asset2"))
        .with_property(PropertyDraft::new("Asset", "a", "text"))
        .with_property(PropertyDraft::new("Asset", "name", "text"))
        .with_property(PropertyDraft::new("Asset2", "name", "int32").with_count(1, Some(1)))
        .finalize()
        .unwrap();
    let options = CompileOptions {
        limits: dms_model::Limits::default().with_container_properties(1),
        ..CompileOptions::default()
    };
    let output = compile(&model, &options).unwrap();
    let schema = &output.schema;

    let names: Vec<&str> = schema.containers.keys().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Asset", "Asset2", "Asset3"]);
    assert_eq!(
        schema.containers[&container("Asset2")].properties["name"].value_type,
        PropertyType::Primitive(dms_model::DataType::Integer)
    );
    assert!(schema.containers[&container("Asset3")].properties.contains_key("name"));
}

// =============================================================================
// Failure modes
// =============================================================================

#[test]
fn cyclic_inheritance_aborts() {
    let model = ModelDraft::new("power", "1")
        .with_class(ClassDraft::new("A").with_parents("B"))
        .with_class(ClassDraft::new("B").with_parents("A"))
        .finalize()
        .unwrap();
    match compile(&model, &CompileOptions::default()) {
        Err(CompileError::Analysis(AnalysisError::CyclicInheritance { cycle })) => {
            assert_eq!(cycle.first(), cycle.last());
            assert!(cycle.len() >= 3);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn extended_models_without_last_are_rejected() {
    let mut draft = asset_model();
    draft.metadata.completeness = Completeness::Extended;
    let err = compile(&draft.finalize().unwrap(), &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::MissingOverlay));
    assert!(err.to_string().contains("\"last\""));
}

#[test]
fn undefined_targets_fail_complete_models_only() {
    let draft = asset_model().with_property(PropertyDraft::new("Asset", "site", "Site").with_count(0, Some(1)));
    assert!(matches!(
        compile(&draft.finalize().unwrap(), &CompileOptions::default()),
        Err(CompileError::Invalid(_))
    ));

    let mut partial = draft;
    partial.metadata.completeness = Completeness::Partial;
    let output = compile(&partial.finalize().unwrap(), &CompileOptions::default()).unwrap();
    assert!(!output.warnings.is_empty());
    let site = &output.schema.containers[&container("Asset")].properties["site"];
    assert!(site.value_type.is_direct());
}

// =============================================================================
// Symmetric relationships
// =============================================================================

#[test]
fn symmetric_pair_keeps_one_direction() {
    let model = ModelDraft::new("power", "1")
        .with_class(ClassDraft::new("Pump"))
        .with_class(ClassDraft::new("Station"))
        .with_property(PropertyDraft::new("Pump", "station", "Station").with_count(0, Some(1)))
        .with_property(PropertyDraft::new("Station", "pumps", "Pump").with_count(0, None))
        .finalize()
        .unwrap();
    let analysis = RuleAnalysis::new(&model).unwrap();
    let pump = ClassEntity::new("power", "Pump").unwrap();
    let station = ClassEntity::new("power", "Station").unwrap();

    let pairs = analysis.symmetric_pairs();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].kept.source_class, pump);

    let graph = analysis.generation_graph();
    let edges: usize = graph.values().map(|targets| targets.len()).sum();
    assert_eq!(edges, 1);
    assert!(graph[&station].contains(&pump));

    let order: Vec<ClassEntity> = analysis.generation_order().into_iter().map(|(_, c)| c).collect();
    assert_eq!(order, vec![station, pump]);
}

// =============================================================================
// Extension
// =============================================================================

#[test]
fn untouched_containers_are_carried_verbatim() {
    let last = ModelDraft::new("power", "1")
        .with_class(ClassDraft::new("Asset"))
        .with_class(ClassDraft::new("Pipe"))
        .with_property(PropertyDraft::new("Asset", "name", "text").with_count(1, Some(1)))
        .with_property(PropertyDraft::new("Pipe", "length", "float64").with_count(0, Some(1)));
    let previous = compile(&last.finalize().unwrap(), &CompileOptions::default()).unwrap();

    let mut next = ModelDraft::new("power", "2")
        .with_class(ClassDraft::new("Asset"))
        .with_property(PropertyDraft::new("Asset", "name", "text").with_count(1, Some(1)))
        .with_property(PropertyDraft::new("Asset", "serial", "text").with_count(0, Some(1)));
    next.metadata.extension = ExtensionCategory::Addition;
    next.last = Some(Box::new(last));
    let output = compile(&next.finalize().unwrap(), &CompileOptions::default()).unwrap();

    let pipe = container("Pipe");
    assert_eq!(
        serde_json::to_string(&output.schema.containers[&pipe]).unwrap(),
        serde_json::to_string(&previous.schema.containers[&pipe]).unwrap()
    );
    let asset = &output.schema.containers[&container("Asset")];
    assert_eq!(asset.properties.len(), 2);

    // The redefined view replaces its previous version; the untouched one is
    // carried at its own version.
    let listed = output.schema.data_model.as_ref().map(|m| m.views.clone());
    assert_eq!(listed, Some(vec![view("Asset", "2"), view("Pipe", "1")]));
    assert!(!output.schema.views.contains_key(&view("Asset", "1")));
    assert_eq!(output.schema.views[&view("Asset", "2")].properties.len(), 2);
}

fn serial_model(version: &str) -> ModelDraft {
    ModelDraft::new("power", version)
        .with_class(ClassDraft::new("Asset"))
        .with_property(PropertyDraft::new("Asset", "name", "text").with_count(1, Some(1)))
}

fn extension_errors(result: &Result<dms_compiler::CompileOutput, CompileError>) -> Vec<String> {
    match result {
        Err(CompileError::Invalid(invalid)) => invalid
            .errors
            .iter()
            .filter(|d| d.kind == IssueKind::Extension)
            .map(|d| format!("{} {:?}", d.message, d.details))
            .collect(),
        _ => Vec::new(),
    }
}

#[test]
fn addition_rejects_properties_dropped_by_a_newer_version() {
    let last = serial_model("1")
        .with_property(PropertyDraft::new("Asset", "serial", "text").with_count(0, Some(1)));
    let mut next = serial_model("2");
    next.metadata.extension = ExtensionCategory::Addition;
    next.last = Some(Box::new(last));
    let result = compile(&next.finalize().unwrap(), &CompileOptions::default());

    let errors = extension_errors(&result);
    assert_eq!(errors.len(), 2, "{result:?}");
    assert!(errors[0].starts_with("container power:Asset changed"));
    assert!(errors[1].starts_with("view power:Asset(version=1) changed"));
    assert!(errors.iter().all(|e| e.contains("property serial removed")));
}

#[test]
fn reshape_frees_views_but_not_containers() {
    let last = serial_model("1")
        .with_property(PropertyDraft::new("Asset", "serial", "text").with_count(0, Some(1)));

    // `serial` is exposed as `code` from the same container slot.
    let renamed = PropertyDraft {
        container_property: Some("serial".into()),
        ..PropertyDraft::new("Asset", "code", "text").with_count(0, Some(1))
    };
    for (category, accepted) in [(ExtensionCategory::Reshape, true), (ExtensionCategory::Addition, false)] {
        let mut next = serial_model("2").with_property(renamed.clone());
        next.metadata.extension = category;
        next.last = Some(Box::new(last.clone()));
        let result = compile(&next.finalize().unwrap(), &CompileOptions::default());
        assert_eq!(result.is_ok(), accepted, "{category:?}: {result:?}");
    }

    let mut dropped = serial_model("2");
    dropped.metadata.extension = ExtensionCategory::Reshape;
    dropped.last = Some(Box::new(last));
    let result = compile(&dropped.finalize().unwrap(), &CompileOptions::default());
    let errors = extension_errors(&result);
    assert_eq!(errors.len(), 1, "{result:?}");
    assert!(errors[0].contains("Reshape extensions do not allow"));
    assert!(errors[0].contains("property serial removed"));
}

#[test]
fn rebuild_drops_the_previous_version() {
    let last = asset_model();
    let mut next = ModelDraft::new("power", "2")
        .with_class(ClassDraft::new("Pipe"))
        .with_property(PropertyDraft::new("Pipe", "length", "float64").with_count(0, Some(1)));
    next.metadata.extension = ExtensionCategory::Rebuild;
    next.last = Some(Box::new(last));
    let output = compile(&next.finalize().unwrap(), &CompileOptions::default()).unwrap();

    let names: Vec<&str> = output.schema.containers.keys().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Pipe"]);
}

// =============================================================================
// Round trip and configuration
// =============================================================================

#[test]
fn reverse_conversion_keeps_identifiers() {
    let model = asset_model()
        .with_class(ClassDraft::new("Pump").with_parents("Asset"))
        .with_property(PropertyDraft::new("Pump", "flow", "float64").with_count(0, Some(1)))
        .finalize()
        .unwrap();
    let output = compile(&model, &CompileOptions::default()).unwrap();
    let back = to_conceptual(&output.rules);

    let classes = |m: &dms_model::ConceptualModel| {
        let mut ids: Vec<ClassEntity> = m.classes.iter().map(|c| c.id.clone()).collect();
        ids.sort();
        ids
    };
    let properties = |m: &dms_model::ConceptualModel| {
        let mut ids: Vec<(ClassEntity, String)> = m
            .properties
            .iter()
            .map(|p| (p.class.clone(), p.property.clone()))
            .collect();
        ids.sort();
        ids
    };
    assert_eq!(classes(&back), classes(&model));
    assert_eq!(properties(&back), properties(&model));

    let recompiled = compile(&back, &CompileOptions::default()).unwrap();
    assert_eq!(recompiled.schema.containers, output.schema.containers);
}

#[test]
fn options_load_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dms.toml");
    std::fs::write(&path, "[limits]\ncontainer_properties = 1\n").unwrap();
    let options = CompileOptions::load(&path).unwrap();

    let output = compile(&asset_model().finalize().unwrap(), &options).unwrap();
    let names: Vec<&str> = output.schema.containers.keys().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Asset", "Asset2", "GeoPoint", "GeoPoint2"]);
}
