//! Library-level crawls over temporary archive trees.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use archive_ingest::config::{parse_config, Config};
use archive_ingest::crawl::ArchiveCrawler;
use archive_ingest::dates::DateNormalizer;
use archive_ingest::groups::lookup_from_config;
use archive_ingest::mapper::{DocumentMapper, MapOutcome};
use archive_ingest::store::InMemoryStore;
use serde_json::{json, Value};
use tempfile::TempDir;

struct Env {
    _tmp: TempDir,
    archive: PathBuf,
    config: Config,
}

fn setup(extra: &str) -> Env {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("archive");
    fs::create_dir_all(&archive).unwrap();
    fs::write(
        tmp.path().join("template.json"),
        serde_json::to_string(&json!({
            "project_name": null,
            "archived_path": null,
            "date_archived": null,
            "manager_user_id": null,
            "archived_size": null,
            "archival_status": null,
            "notes": null,
            "system_groups": null,
            "user_metadata": null
        }))
        .unwrap(),
    )
    .unwrap();
    fs::write(
        tmp.path().join("groups.json"),
        r#"{"groups": [{"name": "lab_x", "manager_user_id": "jdoe"}]}"#,
    )
    .unwrap();

    let text = format!(
        r#"
[archive]
root = "{archive}"
template = "template.json"

[[documents]]
tag = "info"
filename = "info.json"

[[categories.rules]]
pattern = "{archive}/gt/"
category = "gt"

[mappings.gt_info]
project_name = "project_name"
manager_user_id = "lab"
user_metadata = "true"

[defaults]
archival_status = "str:completed"
notes = "str:none recorded"

[split]
path_prefix = "{archive}/omero"
filename = "omero.json"
key_pattern = "Well: .*"

{extra}
"#,
        archive = archive.display()
    );
    let config = parse_config(&text, tmp.path()).unwrap();
    Env {
        _tmp: tmp,
        archive,
        config,
    }
}

fn write(dir: &Path, name: &str, value: Value) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), serde_json::to_string(&value).unwrap()).unwrap();
}

#[test]
fn test_gt_scenario_upper_case_path() {
    let env = setup("");
    let dir = env.archive.join("GT/2020/lab_x/run1");
    write(&dir, "info.json", json!({"ProjectName": "Foo"}));

    let mapper = DocumentMapper::from_config(&env.config, lookup_from_config(&env.config).unwrap())
        .unwrap();
    let MapOutcome::Mapped(out) = mapper.create_document(&dir).unwrap() else {
        panic!("expected a document");
    };
    let doc = out.document;

    assert_eq!(doc.get_str("project_name"), Some("Foo"));
    assert_eq!(doc.get_str("archived_path"), Some(dir.to_str().unwrap()));
    let mtime = fs::metadata(&dir).unwrap().modified().unwrap();
    let expected = DateNormalizer::default().normalize_timestamp(mtime).unwrap();
    assert_eq!(doc.get_str("date_archived"), Some(expected.as_str()));
    assert_eq!(doc.get_str("notes"), Some("none recorded"));
    assert_eq!(doc.get("user_metadata"), Some(&json!({"project_name": "Foo"})));
}

#[test]
fn test_group_directory_resolves_owner_and_groups() {
    let env = setup("[groups]\ndirectory = \"groups.json\"\n");
    let dir = env.archive.join("gt/run1");
    write(&dir, "info.json", json!({"ProjectName": "Foo", "Lab": "lab_x"}));

    let mapper = DocumentMapper::from_config(&env.config, lookup_from_config(&env.config).unwrap())
        .unwrap();
    let MapOutcome::Mapped(out) = mapper.create_document(&dir).unwrap() else {
        panic!("expected a document");
    };
    assert_eq!(out.document.get_str("manager_user_id"), Some("jdoe"));
    assert_eq!(out.document.get("system_groups"), Some(&json!(["lab_x"])));
}

#[test]
fn test_unknown_owner_left_null() {
    let env = setup("[groups]\ndirectory = \"groups.json\"\n");
    let dir = env.archive.join("gt/run1");
    write(&dir, "info.json", json!({"Lab": "lab_unknown"}));

    let mapper = DocumentMapper::from_config(&env.config, lookup_from_config(&env.config).unwrap())
        .unwrap();
    let MapOutcome::Mapped(out) = mapper.create_document(&dir).unwrap() else {
        panic!("expected a document");
    };
    assert!(out.document.is_null("manager_user_id"));
    assert!(out.document.is_null("system_groups"));
}

#[tokio::test]
async fn test_crawl_split_scenario() {
    let env = setup("");
    let plate = env.archive.join("omero/plate1");
    write(&plate, "omero.json", json!({"Well: A1": {"x": 1}, "Well: A2": {"x": 2}}));
    let master_len = fs::metadata(plate.join("omero.json")).unwrap().len() as usize;
    fs::write(plate.join("padding.bin"), vec![0u8; 200 - master_len]).unwrap();

    let store = Arc::new(InMemoryStore::new("archived_path"));
    let crawler = ArchiveCrawler::from_config(&env.config, &env.archive, store.clone()).unwrap();
    let stats = crawler.crawl(None).await.unwrap();
    assert_eq!(stats.split_documents, 2);

    let docs = store.documents();
    assert_eq!(docs.len(), 2);
    for (doc, (well, x)) in docs.iter().zip([("Well_A1", 1), ("Well_A2", 2)]) {
        assert_eq!(doc.get("archived_size"), Some(&json!(100)));
        assert_eq!(doc.get("system_groups"), Some(&json!(["jaxuser"])));
        assert_eq!(doc.get("user_metadata"), Some(&json!({"x": x})));
        assert!(doc.get_str("archived_path").unwrap().ends_with(well));
        assert_eq!(doc.get_str("archival_status"), Some("completed"));
    }
}

#[tokio::test]
async fn test_unclassified_directory_does_not_raise() {
    let env = setup("");
    write(&env.archive.join("elsewhere/run1"), "info.json", json!({"ProjectName": "X"}));
    write(&env.archive.join("gt/run2"), "info.json", json!({"ProjectName": "Y"}));

    let store = Arc::new(InMemoryStore::new("archived_path"));
    let crawler = ArchiveCrawler::from_config(&env.config, &env.archive, store.clone()).unwrap();
    let stats = crawler.crawl(None).await.unwrap();

    assert_eq!(stats.unclassified, 1);
    assert_eq!(stats.ingested, 1);
    assert_eq!(store.documents()[0].get_str("project_name"), Some("Y"));
}
