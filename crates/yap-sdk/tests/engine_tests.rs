//! End-to-end tests of the FieldEngine API

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use yap_sdk::{
    ComputeContext, ComputedFormat, ComputedOptions, FieldEngine, FieldEngineBuilder,
    FieldEventSubscriber, GroupDocument, HookScope, PostContext, RenderContext, SdkError,
    Section, SyncStatus, Value, ValueUpdated,
};

const PRICING: &str = r#"{
    "group_name": "pricing",
    "title": "Pricing",
    "fields": [
        {"name": "base_price", "label": "Base Price", "type": "number"},
        {"label": "Sku", "type": "short_text", "validation": {"required": true}}
    ],
    "location": [[{"type": "post_type", "operator": "==", "value": "product"}]]
}"#;

const TEAM: &str = r#"{
    "group_name": "team",
    "title": "Team",
    "fields": [
        {
            "label": "Members",
            "type": "repeater",
            "repeater_max": 2,
            "sub_fields": [{"label": "Name", "type": "short_text"}]
        },
        {"label": "Sections", "type": "flexible_content"}
    ],
    "location": [[{"type": "post_type", "value": "page"}]],
    "layouts": {
        "field_sections": [
            {"name": "hero", "label": "Hero", "sub_fields": [
                {"user_name": "Heading", "generated_name": "field_heading", "field_type": "short_text"}
            ]}
        ]
    }
}"#;

struct Recorder(Mutex<Vec<ValueUpdated>>);

#[async_trait::async_trait]
impl FieldEventSubscriber for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn on_value_updated(&self, event: &ValueUpdated) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

async fn engine() -> FieldEngine {
    let engine = FieldEngineBuilder::new()
        .with_default_currency("PLN")
        .build()
        .await
        .unwrap();
    engine.import_group_json(PRICING).await.unwrap();
    engine
}

fn with_tax(deps: &HashMap<String, Value>, _: &ComputeContext) -> anyhow::Result<Value> {
    let base = deps.get("base_price").and_then(Value::as_f64).unwrap_or(0.0);
    Ok(Value::Number(base * 1.23))
}

// ========== Values ==========

#[tokio::test]
async fn test_pricing_scenario() {
    let engine = engine().await;
    engine
        .register_computed(
            "price_with_tax",
            vec!["base_price".to_string()],
            ComputedOptions::default().with_format(ComputedFormat::Price {
                decimals: 2,
                currency: None,
            }),
            with_tax,
        )
        .unwrap();

    assert!(engine.update_field("pricing", "base_price", "100", 42).await.unwrap());
    assert_eq!(
        engine.get_field("pricing", "Base Price", 42).await,
        Some(Value::Number(100.0))
    );
    assert_eq!(
        engine.get_computed_value("pricing", "price_with_tax", 42).await,
        Some(Value::from("123.00 PLN"))
    );

    assert!(engine.update_field("pricing", "base_price", 200.0, 42).await.unwrap());
    assert_eq!(
        engine.get_computed_value("pricing", "price_with_tax", 42).await,
        Some(Value::from("246.00 PLN"))
    );
}

#[tokio::test]
async fn test_stored_computed_value_follows_dependency() {
    let engine = engine().await;
    engine
        .import_group_json(
            r#"{
                "group_name": "pricing",
                "title": "Pricing",
                "fields": [
                    {"name": "base_price", "label": "Base Price", "type": "number"},
                    {"label": "Sku", "type": "short_text", "validation": {"required": true}},
                    {"name": "price_with_tax", "label": "Price With Tax", "type": "short_text"}
                ],
                "location": [[{"type": "post_type", "operator": "==", "value": "product"}]]
            }"#,
        )
        .await
        .unwrap();
    engine
        .register_computed(
            "price_with_tax",
            vec!["base_price".to_string()],
            ComputedOptions::default()
                .stored()
                .with_format(ComputedFormat::Price {
                    decimals: 2,
                    currency: None,
                }),
            with_tax,
        )
        .unwrap();

    engine.update_field("pricing", "base_price", 100.0, 42).await.unwrap();
    assert_eq!(
        engine.get_field("pricing", "price_with_tax", 42).await,
        Some(Value::from("123.00 PLN"))
    );

    engine.update_field("pricing", "base_price", 200.0, 42).await.unwrap();
    assert_eq!(
        engine.get_field("pricing", "price_with_tax", 42).await,
        Some(Value::from("246.00 PLN"))
    );
}

#[tokio::test]
async fn test_validation_failure_persists_nothing() {
    let engine = engine().await;
    let err = engine.update_field("pricing", "Sku", "", 7).await.unwrap_err();
    match err {
        SdkError::Validation(failure) => assert_eq!(failure.rule, "required"),
        other => panic!("unexpected: {other}"),
    }
    assert_eq!(engine.get_field("pricing", "Sku", 7).await, None);
}

#[tokio::test]
async fn test_format_hook_applies_on_read() {
    let engine = engine().await;
    engine.hooks().add_filter(
        yap_sdk::HookStage::FormatValue,
        HookScope::Name("Sku".to_string()),
        |value, _| match value.as_str() {
            Some(s) => Value::String(s.to_uppercase()),
            None => value,
        },
    );

    engine.update_field("pricing", "Sku", "ab-1", 3).await.unwrap();
    assert_eq!(engine.get_field("pricing", "Sku", 3).await, Some(Value::from("AB-1")));
    let entries = engine.get_fields("pricing", 3).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value, Value::from("AB-1"));
}

#[tokio::test]
async fn test_cached_reads_are_counted() {
    let engine = engine().await;
    engine.update_field("pricing", "Sku", "A-1", 9).await.unwrap();

    engine.get_field("pricing", "Sku", 9).await;
    engine.get_field("pricing", "Sku", 9).await;
    let stats = engine.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

// ========== Location resolution ==========

#[tokio::test]
async fn test_groups_for_post() {
    let engine = engine().await;
    engine.import_group_json(TEAM).await.unwrap();
    engine.update_field("pricing", "Sku", "A-1", 5).await.unwrap();

    let product = PostContext::new(5, "product");
    let groups = engine.get_fields_for_post(&product).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group, "pricing");
    assert_eq!(groups[0].title, "Pricing");
    assert_eq!(groups[0].fields[0].value, Value::from("A-1"));

    let page = PostContext::new(6, "page");
    let names: Vec<String> = engine
        .groups_for_post(&page)
        .await
        .into_iter()
        .map(|meta| meta.name.to_string())
        .collect();
    assert_eq!(names, vec!["team"]);

    assert!(engine.groups_for_post(&PostContext::new(7, "post")).await.is_empty());
}

// ========== Import / export ==========

#[tokio::test]
async fn test_export_then_reimport_is_in_sync() {
    let engine = engine().await;
    engine.import_group_json(TEAM).await.unwrap();

    let json = engine.export_group_json("team").await.unwrap();
    let exported = GroupDocument::from_json(&json).unwrap();
    assert_eq!(exported.fields[0].sub_fields[0].label, "Name");
    assert_eq!(exported.layouts["field_sections"][0].name, "hero");

    let report = engine.import_group_json(&json).await.unwrap();
    assert_eq!(report.status, SyncStatus::InSync);
    assert_eq!(report.fields_imported, 3);
    assert_eq!(engine.patterns().get_fields(&exported.group().unwrap()).await.len(), 3);
}

#[tokio::test]
async fn test_import_reports_status() {
    let engine = FieldEngineBuilder::new().build().await.unwrap();
    let report = engine.import_group_json(PRICING).await.unwrap();
    assert_eq!(report.group, "pricing");
    assert_eq!(report.fields_imported, 2);
    assert_eq!(report.status, SyncStatus::New);

    let edited = PRICING.replace("\"Pricing\"", "\"Prices\"");
    let report = engine.import_group_json(&edited).await.unwrap();
    assert_eq!(report.status, SyncStatus::Modified);
}

#[tokio::test]
async fn test_malformed_import() {
    let engine = FieldEngineBuilder::new().build().await.unwrap();
    assert!(matches!(
        engine.import_group_json("{ \"group_name\": ").await,
        Err(SdkError::MalformedDocument(_))
    ));
    assert!(matches!(
        engine.export_group_json("absent").await,
        Err(SdkError::NotFound(_))
    ));
}

// ========== Repeaters and flexible content ==========

#[tokio::test]
async fn test_repeater_through_engine() {
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let engine = FieldEngineBuilder::new()
        .with_subscriber(recorder.clone())
        .build()
        .await
        .unwrap();
    engine.import_group_json(TEAM).await.unwrap();

    let ada: Value = serde_json::json!({"field_name": "Ada"}).into();
    let alan: Value = serde_json::json!({"field_name": "Alan"}).into();
    assert_eq!(engine.add_repeater_row("team", "Members", 1, ada.clone()).await.unwrap(), 0);
    assert_eq!(
        engine.get_field("team", "Members", 1).await,
        Some(Value::Array(vec![ada.clone()]))
    );

    assert_eq!(engine.add_repeater_row("team", "Members", 1, alan.clone()).await.unwrap(), 1);
    assert_eq!(
        engine.get_field("team", "Members", 1).await,
        Some(Value::Array(vec![ada.clone(), alan.clone()]))
    );
    assert!(engine
        .add_repeater_row("team", "Members", 1, ada.clone())
        .await
        .is_err());

    engine.delete_repeater_row("team", "Members", 1, 0).await.unwrap();
    assert_eq!(
        engine.get_repeater_rows("team", "Members", 1).await.unwrap(),
        vec![alan.clone()]
    );

    let events = recorder.0.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].old_value, Some(Value::Array(vec![])));
    assert_eq!(events[2].field_name, "repeater_members");
    assert_eq!(events[2].old_value, Some(Value::Array(vec![ada, alan.clone()])));
    assert_eq!(events[2].new_value, Value::Array(vec![alan]));
}

#[tokio::test]
async fn test_concurrent_row_events_carry_replaced_rows() {
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let engine = FieldEngineBuilder::new()
        .with_subscriber(recorder.clone())
        .build()
        .await
        .unwrap();
    engine
        .import_group_json(&TEAM.replace("\"repeater_max\": 2", "\"repeater_max\": 20"))
        .await
        .unwrap();
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..6 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let row: Value = serde_json::json!({"field_name": format!("m{i}")}).into();
            engine.add_repeater_row("team", "Members", 5, row).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let events = recorder.0.lock().unwrap();
    assert_eq!(events.len(), 6);
    for event in events.iter() {
        let Some(Value::Array(old)) = &event.old_value else {
            panic!("missing old rows");
        };
        let Value::Array(new) = &event.new_value else {
            panic!("new value is not a row list");
        };
        assert_eq!(new.len(), old.len() + 1);
        assert_eq!(&new[..old.len()], &old[..]);
    }
}

#[tokio::test]
async fn test_flexible_sections_through_engine() {
    let engine = FieldEngineBuilder::new().build().await.unwrap();
    engine.import_group_json(TEAM).await.unwrap();

    let index = engine
        .add_flexible_section(
            "team",
            "Sections",
            2,
            Section::new("hero").with_field("field_heading", "Welcome"),
        )
        .await
        .unwrap();
    assert_eq!(index, 0);
    assert!(engine
        .add_flexible_section("team", "Sections", 2, Section::new("gallery"))
        .await
        .is_err());

    let rendered = engine
        .render_flexible_sections("team", "Sections", 2, RenderContext::Metabox)
        .await
        .unwrap();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].label, "Hero");
    assert_eq!(rendered[0].fields[0].value, Value::from("Welcome"));
    assert!(!rendered[0].editable);
}

// ========== Directory sync ==========

#[tokio::test]
async fn test_sync_from_directory() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("pricing.json"), PRICING).await.unwrap();
    tokio::fs::write(dir.path().join("team.json"), TEAM).await.unwrap();

    let engine = FieldEngineBuilder::new()
        .with_sync_dir(dir.path())
        .build()
        .await
        .unwrap();

    let reports = engine.sync_from_directory().await.unwrap();
    let groups: Vec<&str> = reports.iter().map(|r| r.group.as_str()).collect();
    assert_eq!(groups, vec!["pricing", "team"]);
    assert!(reports.iter().all(|r| r.status == SyncStatus::New));

    assert!(engine.sync_from_directory().await.unwrap().is_empty());

    let edited = TEAM.replace("\"Team\"", "\"Crew\"");
    tokio::fs::write(dir.path().join("team.json"), edited).await.unwrap();
    let reports = engine.sync_from_directory().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, SyncStatus::Modified);
}

#[tokio::test]
async fn test_sync_requires_directory() {
    let engine = FieldEngineBuilder::new().build().await.unwrap();
    assert!(matches!(
        engine.sync_from_directory().await,
        Err(SdkError::ConfigError(_))
    ));
}
