//! Tests for the file-system sync directory

use std::collections::BTreeMap;
use tempfile::TempDir;
use tokio::fs;
use yap_core::{FieldDefinition, FieldType, GroupMeta, GroupName, LayoutDefinition, LocationRule};
use yap_repository::{
    FileSystemRepository, GroupDocument, GroupRepository, RepositoryError, SyncStatus,
};

fn pricing_document() -> GroupDocument {
    let meta = GroupMeta::new(GroupName::new("pricing").unwrap(), "Pricing");
    let mut base = FieldDefinition::new("Base Price", FieldType::Number);
    base.id = Some(1);
    let mut sections = FieldDefinition::new("Sections", FieldType::FlexibleContent);
    sections.id = Some(2);

    let mut layouts = BTreeMap::new();
    layouts.insert(
        sections.generated_name.clone(),
        vec![LayoutDefinition::new("hero", "Hero")
            .with_field(FieldDefinition::new("Heading", FieldType::ShortText))],
    );

    GroupDocument::from_parts(
        &meta,
        &[base, sections],
        &[LocationRule::post_type_is("product")],
        layouts,
    )
}

#[tokio::test]
async fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let repo = FileSystemRepository::new(dir.path()).unwrap();
    let document = pricing_document();

    repo.save(&document).await.unwrap();
    assert!(repo.exists("pricing").await);
    assert!(dir.path().join("pricing.json").exists());

    let loaded = repo.load("pricing").await.unwrap();
    assert_eq!(loaded, document);
    assert_eq!(loaded.content_hash().unwrap(), document.content_hash().unwrap());
}

#[tokio::test]
async fn test_missing_document() {
    let dir = TempDir::new().unwrap();
    let repo = FileSystemRepository::new(dir.path()).unwrap();
    assert!(matches!(
        repo.load("absent").await,
        Err(RepositoryError::NotFound { .. })
    ));
    assert!(!repo.exists("absent").await);
}

#[tokio::test]
async fn test_load_all_reads_yaml_and_skips_broken() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("author.yaml"),
        r#"group_name: author
title: Author box
fields:
  - label: Bio
    type: long_text
location:
  - - param: post_type
      value: post
"#,
    )
    .await
    .unwrap();
    fs::write(dir.path().join("broken.json"), "{ not json").await.unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").await.unwrap();

    let repo = FileSystemRepository::new(dir.path()).unwrap();
    repo.save(&pricing_document()).await.unwrap();

    let documents = repo.load_all().await.unwrap();
    let names: Vec<&str> = documents.iter().map(|d| d.group_name.as_str()).collect();
    assert_eq!(names, vec!["author", "pricing"]);
    assert_eq!(documents[0].fields[0].machine_name(), "field_bio");
}

#[tokio::test]
async fn test_sync_status_after_edit() {
    let dir = TempDir::new().unwrap();
    let repo = FileSystemRepository::new(dir.path()).unwrap();
    let document = pricing_document();
    repo.save(&document).await.unwrap();
    let imported_hash = document.content_hash().unwrap();

    let mut edited = repo.load("pricing").await.unwrap();
    assert_eq!(edited.sync_status(Some(&imported_hash)).unwrap(), SyncStatus::InSync);

    edited.fields[0].label = "Net Price".to_string();
    repo.save(&edited).await.unwrap();
    let reloaded = repo.load("pricing").await.unwrap();
    assert_eq!(reloaded.sync_status(Some(&imported_hash)).unwrap(), SyncStatus::Modified);
}

#[tokio::test]
async fn test_invalid_root() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(
        FileSystemRepository::new(&missing),
        Err(RepositoryError::InvalidPath { .. })
    ));

    let created = FileSystemRepository::create(&missing).await.unwrap();
    assert!(created.root_path().is_dir());
}
