use forge_core::component::{AppPlan, AuxiliaryAsset, ComponentSpec, GeneratedArtifact};
use forge_core::storage;
use std::collections::BTreeSet;

fn sample_plan() -> AppPlan {
    AppPlan {
        app_name: "notes".to_string(),
        summary: "Take notes".to_string(),
        architecture: "store + screens".to_string(),
        design_notes: "minimal".to_string(),
        target_stack: Some("React".to_string()),
        components: vec![
            ComponentSpec::new("NoteStore", "service", "src/store.ts"),
            ComponentSpec::new("NoteList", "screen", "src/NoteList.tsx").depending_on("NoteStore"),
        ],
    }
}

fn artifact(name: &str, path: &str, assets: Vec<AuxiliaryAsset>) -> GeneratedArtifact {
    GeneratedArtifact {
        component_name: name.to_string(),
        file_path: path.to_string(),
        content: format!("// {}", name),
        auxiliary_assets: assets,
        libraries_used: BTreeSet::new(),
        content_digest: forge_core::component::content_digest(name),
        generated_at: chrono::Utc::now(),
    }
}

#[test]
fn test_plan_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let plan = sample_plan();

    let path = storage::save_plan(tmp.path(), &plan).unwrap();
    assert_eq!(path, storage::plan_file(tmp.path()));

    let loaded = storage::load_plan(&path).unwrap();
    assert_eq!(loaded, plan);
}

#[test]
fn test_load_plan_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(storage::load_plan(&tmp.path().join("nope.json")).is_err());
}

#[test]
fn test_materialize_writes_artifacts_and_assets() {
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = vec![artifact(
        "Home",
        "src/screens/Home.tsx",
        vec![AuxiliaryAsset {
            path: "src/screens/home.css".to_string(),
            content: "body {}".to_string(),
        }],
    )];

    let written = storage::materialize(tmp.path(), &artifacts).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("src/screens/Home.tsx")).unwrap(),
        "// Home"
    );
    assert!(tmp.path().join("src/screens/home.css").exists());
}

#[test]
fn test_materialize_rejects_escaping_paths() {
    let tmp = tempfile::tempdir().unwrap();

    let escaping = vec![artifact("Evil", "../outside.ts", vec![])];
    assert!(storage::materialize(tmp.path(), &escaping).is_err());

    let absolute = vec![artifact("Abs", "/etc/passwd", vec![])];
    assert!(storage::materialize(tmp.path(), &absolute).is_err());
}

#[test]
fn test_safe_join_allows_nested_relative() {
    let root = std::path::Path::new("/out");
    let joined = storage::safe_join(root, "./src/app/main.ts").unwrap();
    assert!(joined.ends_with("src/app/main.ts"));
}

#[test]
fn test_materialize_checks_all_paths_before_writing() {
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = vec![
        artifact("A", "/src/A.ts", vec![]),
        artifact("B", "src/B.ts", vec![]),
    ];

    let err = storage::materialize(tmp.path(), &artifacts).unwrap_err();
    assert!(format!("{:#}", err).contains("must be relative"));
    assert!(!tmp.path().join("src/B.ts").exists());
}
