use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use serde_json::Value;
use zoo_contracts::error::{KeyKind, ValidationError, ValidationErrors};
use zoo_contracts::events::EventWriter;
use zoo_engine::{CatalogLoader, LoadedCatalog, LoaderConfig};

const MVXNET: &str = include_str!("../../../catalog/mvxnet/metafile.yml");
const POINTPILLARS: &str = include_str!("../../../catalog/pointpillars/metafile.yml");
const SECOND: &str = include_str!("../../../catalog/second/metafile.yml");
const MVXNET_NAME: &str = "dv_mvx-fpn_second_secfpn_adamw_2x8_80e_kitti-3d-3class";

fn write(root: &Path, relative: &str, content: &str) -> anyhow::Result<PathBuf> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    Ok(path)
}

fn sample_tree(root: &Path) -> anyhow::Result<()> {
    write(root, "configs/mvxnet/metafile.yml", MVXNET)?;
    write(root, "configs/pointpillars/metafile.yml", POINTPILLARS)?;
    write(root, "configs/second/metafile.yml", SECOND)?;
    Ok(())
}

fn load(root: &Path) -> Result<LoadedCatalog, ValidationErrors> {
    CatalogLoader::new(LoaderConfig::new(root)).load()
}

fn load_errors(root: &Path) -> Vec<ValidationError> {
    match load(root) {
        Ok(_) => Vec::new(),
        Err(errors) => errors.into_vec(),
    }
}

#[test]
fn loads_every_metafile_under_root() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    sample_tree(temp.path())?;
    write(temp.path(), "configs/mvxnet/README.md", "# MVX-Net\n")?;

    let catalog = load(temp.path())?;
    assert_eq!(catalog.files.len(), 3);
    assert_eq!(catalog.index.collection_count(), 3);
    assert_eq!(catalog.index.model_count(), 5);
    for model in catalog.index.models() {
        assert!(catalog.index.collection(&model.in_collection).is_some());
        assert!(!model.results.is_empty());
    }
    Ok(())
}

#[test]
fn alias_and_name_resolve_to_same_model() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    write(temp.path(), "mvxnet/metafile.yml", MVXNET)?;

    let catalog = load(temp.path())?;
    let by_alias = catalog.index.lookup_model("mvxnet_kitti-3class");
    let by_name = catalog.index.lookup_model(MVXNET_NAME);
    assert!(by_name.is_some());
    assert_eq!(by_alias, by_name);
    assert_eq!(
        by_name.and_then(|model| model.results[0].metrics.get("mAP").copied()),
        Some(63.5)
    );
    Ok(())
}

#[test]
fn duplicate_collection_across_files_names_both_files() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let first = write(temp.path(), "a/metafile.yml", MVXNET)?;
    let renamed = MVXNET.replace(MVXNET_NAME, "mvx_copy").replace(
        "Alias: mvxnet_kitti-3class",
        "Alias: mvxnet_copy",
    );
    let second = write(temp.path(), "b/metafile.yml", &renamed)?;

    let errors = load_errors(temp.path());
    assert_eq!(errors.len(), 1, "{errors:?}");
    match &errors[0] {
        ValidationError::DuplicateKey {
            kind,
            name,
            first: first_loc,
            second: second_loc,
        } => {
            assert_eq!(*kind, KeyKind::Collection);
            assert_eq!(name, "MVX-Net");
            assert_eq!(first_loc.file.as_deref(), Some(first.as_path()));
            assert_eq!(second_loc.file.as_deref(), Some(second.as_path()));
        }
        other => panic!("expected duplicate key error, got {other}"),
    }
    Ok(())
}

#[test]
fn model_repeated_across_files_names_both_files() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let first = write(temp.path(), "a/metafile.yml", MVXNET)?;
    let moved = MVXNET
        .replace("- Name: MVX-Net", "- Name: MVX-Net-v2")
        .replace("In Collection: MVX-Net", "In Collection: MVX-Net-v2")
        .replace("Alias: mvxnet_kitti-3class", "Alias: mvxnet_v2");
    let second = write(temp.path(), "b/metafile.yml", &moved)?;

    let errors = load_errors(temp.path());
    assert_eq!(errors.len(), 1, "{errors:?}");
    match &errors[0] {
        ValidationError::DuplicateKey {
            kind,
            name,
            first: first_loc,
            second: second_loc,
        } => {
            assert_eq!(*kind, KeyKind::Model);
            assert_eq!(name, MVXNET_NAME);
            assert_eq!(first_loc.file.as_deref(), Some(first.as_path()));
            assert_eq!(first_loc.path, "Models[0]");
            assert_eq!(second_loc.file.as_deref(), Some(second.as_path()));
            assert_eq!(second_loc.path, "Models[0]");
        }
        other => panic!("expected duplicate key error, got {other}"),
    }
    Ok(())
}

#[test]
fn dangling_collection_reference_is_reported()-> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    write(
        temp.path(),
        "mvxnet/metafile.yml",
        &MVXNET.replace("In Collection: MVX-Net", "In Collection: MVXNet"),
    )?;

    let errors = load_errors(temp.path());
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(
        &errors[0],
        ValidationError::Reference { collection, .. } if collection == "MVXNet"
    ));
    Ok(())
}

#[test]
fn schema_errors_from_all_files_are_collected() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    write(
        temp.path(),
        "mvxnet/metafile.yml",
        &MVXNET.replace("Training Memory (GB): 6.7", "Training Memory (GB): 0"),
    )?;
    write(
        temp.path(),
        "second/metafile.yml",
        &SECOND.replace("mAP: 79.07", "mAP: high"),
    )?;
    write(temp.path(), "pointpillars/metafile.yml", POINTPILLARS)?;

    let errors = load_errors(temp.path());
    let paths: Vec<String> = errors
        .iter()
        .map(|err| err.field_path().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "Models[0].Metadata.Training Memory (GB)",
            "Models[0].Results[0].Metrics.mAP",
        ]
    );
    Ok(())
}

#[test]
fn malformed_yaml_is_a_parse_error_with_file() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let broken = write(temp.path(), "broken/metafile.yml", "Models:\n  - Name: [oops\n")?;

    let errors = load_errors(temp.path());
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ValidationError::Parse { span, .. } => {
            assert_eq!(span.file, broken);
            assert!(span.line.is_some());
        }
        other => panic!("expected parse error, got {other}"),
    }
    Ok(())
}

#[test]
fn json_metafiles_and_custom_names_are_discovered() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let value: Value = serde_yaml::from_str(SECOND)?;
    write(temp.path(), "second/metafile.json", &serde_json::to_string(&value)?)?;
    write(temp.path(), "mvxnet/zoo.yml", MVXNET)?;

    let default_catalog = load(temp.path())?;
    assert_eq!(default_catalog.index.model_count(), 2);

    let config = LoaderConfig::new(temp.path())
        .with_metafile_names(vec!["zoo.yml".to_string(), "metafile.json".to_string()]);
    let catalog = CatalogLoader::new(config).load()?;
    assert_eq!(catalog.index.collection_count(), 2);
    assert!(catalog.index.lookup_model("mvxnet_kitti-3class").is_some());
    Ok(())
}

#[test]
fn hidden_directories_are_skipped() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    write(temp.path(), "mvxnet/metafile.yml", MVXNET)?;
    write(temp.path(), ".cache/mvxnet/metafile.yml", MVXNET)?;

    let catalog = load(temp.path())?;
    assert_eq!(catalog.files.len(), 1);
    Ok(())
}

#[test]
fn sequential_and_parallel_loads_agree() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    sample_tree(temp.path())?;

    let parallel = load(temp.path())?;
    let sequential =
        CatalogLoader::new(LoaderConfig::new(temp.path()).with_parallel(false)).load()?;
    assert_eq!(parallel.files, sequential.files);
    assert_eq!(parallel.index.to_record(), sequential.index.to_record());
    Ok(())
}

#[test]
fn model_index_imports_resolve_relative_to_index() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    sample_tree(temp.path())?;
    let index_path = write(
        temp.path(),
        "model-index.yml",
        "Import:\n  - configs/mvxnet/metafile.yml\n  - configs/second/metafile.yml\n",
    )?;

    let loader = CatalogLoader::new(LoaderConfig::new(temp.path()));
    let catalog = loader.load_model_index(&index_path)?;
    assert_eq!(catalog.files.len(), 2);
    assert_eq!(catalog.index.collection_count(), 2);
    assert!(catalog.index.collection("PointPillars").is_none());
    Ok(())
}

#[test]
fn missing_import_is_an_io_error() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let index_path = write(temp.path(), "model-index.yml", "Import:\n  - gone/metafile.yml\n")?;

    let loader = CatalogLoader::new(LoaderConfig::new(temp.path()));
    let errors = match loader.load_model_index(&index_path) {
        Ok(_) => Vec::new(),
        Err(errors) => errors.into_vec(),
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), "io");
    Ok(())
}

#[test]
fn load_events_are_appended() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    sample_tree(temp.path())?;
    let events_path = temp.path().join("out/events.jsonl");

    let loader = CatalogLoader::new(LoaderConfig::new(temp.path().join("configs")))
        .with_events(EventWriter::new(&events_path, "catalog-7"));
    loader.load()?;

    let content = fs::read_to_string(&events_path)?;
    let types: Vec<String> = content
        .lines()
        .map(|line| serde_json::from_str::<Value>(line))
        .collect::<Result<Vec<_>, _>>()?
        .iter()
        .map(|event| event["type"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(types.first().map(String::as_str), Some("catalog_load_started"));
    assert_eq!(types.last().map(String::as_str), Some("catalog_loaded"));
    assert_eq!(types.iter().filter(|t| *t == "file_validated").count(), 3);
    Ok(())
}
