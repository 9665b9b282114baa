use kbtrain_core::config::StorageConfig;
use kbtrain_core::{
    FileStorage, KnowledgeSource, RegistrySnapshot, SourceKind, SourceRegistry, Storage,
    StorageError, TreeNode,
};
use tempfile::TempDir;

fn storage() -> (FileStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::with_config(StorageConfig {
        data_dir: temp_dir.path().to_string_lossy().into_owned(),
        ..StorageConfig::default()
    });
    (storage, temp_dir)
}

fn registry() -> SourceRegistry {
    SourceRegistry::from_sources(vec![KnowledgeSource::new(1, "Docs", SourceKind::Document)
        .with_documents(vec![TreeNode::file(1, "guide.pdf").selected(true)])])
}

#[test]
fn test_save_and_load_snapshot() {
    let (storage, temp) = storage();
    let snapshot = RegistrySnapshot::new("support-bot", registry());

    storage.save_snapshot(&snapshot).unwrap();

    assert!(temp.path().join("agents/support-bot/registry.json").exists());
    let loaded = storage.load_snapshot("support-bot").unwrap();
    assert_eq!(loaded, snapshot);
}

#[test]
fn test_load_missing_snapshot() {
    let (storage, _temp) = storage();
    assert!(matches!(
        storage.load_snapshot("ghost"),
        Err(StorageError::SnapshotNotFound(id)) if id == "ghost"
    ));
}

#[test]
fn test_list_agents_sorted() {
    let (storage, _temp) = storage();
    for agent in ["zeta", "alpha", "mid"] {
        storage
            .save_snapshot(&RegistrySnapshot::new(agent, SourceRegistry::new()))
            .unwrap();
    }
    assert_eq!(storage.list_agents().unwrap(), vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_delete_clears_current() {
    let (storage, _temp) = storage();
    storage
        .save_snapshot(&RegistrySnapshot::new("bot", registry()))
        .unwrap();
    storage.set_current_agent_id(Some("bot")).unwrap();

    storage.delete_snapshot("bot").unwrap();

    assert_eq!(storage.get_current_agent_id().unwrap(), None);
    assert!(storage.list_agents().unwrap().is_empty());
}

#[test]
fn test_current_agent_round_trip() {
    let (storage, _temp) = storage();
    assert_eq!(storage.get_current_agent_id().unwrap(), None);

    storage.set_current_agent_id(Some("bot")).unwrap();
    assert_eq!(storage.get_current_agent_id().unwrap(), Some("bot".to_string()));

    storage.set_current_agent_id(None).unwrap();
    assert_eq!(storage.get_current_agent_id().unwrap(), None);
}

#[test]
fn test_invalid_agent_id() {
    let (storage, _temp) = storage();
    assert!(matches!(
        storage.load_snapshot("../etc"),
        Err(StorageError::InvalidAgentId(_))
    ));
}
