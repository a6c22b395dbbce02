//! Runtime tests across stores, pipeline, events, cache and computed fields

use std::collections::HashMap;
use std::sync::Arc;
use yap_core::location::{group_rule_sets, matches};
use yap_core::{FieldDefinition, FieldType, GroupName, LocationRule, PostContext, Value};
use yap_runtime::{
    CacheInvalidator, CacheLayer, ComputeContext, ComputedFields, ComputedFormat,
    ComputedOptions, EventBus, FieldPipeline, FieldStore, HookRegistry, KeyedLocks, MemoryStore,
    PatternStore, RepeaterService, RuntimeError, SchemaRegistry, ValueStore,
};

struct Runtime {
    store: Arc<dyn FieldStore>,
    schema: SchemaRegistry,
    values: Arc<ValueStore>,
    repeaters: RepeaterService,
    computed: Arc<ComputedFields>,
    pipeline: FieldPipeline,
}

async fn runtime() -> Runtime {
    let store: Arc<dyn FieldStore> = Arc::new(MemoryStore::new());
    let patterns = Arc::new(PatternStore::new(store.clone()));
    let values = Arc::new(ValueStore::new(store.clone(), patterns.clone()));
    let cache = Arc::new(CacheLayer::new());
    let events = Arc::new(EventBus::new());
    let computed = Arc::new(
        ComputedFields::new(values.clone(), patterns.clone(), cache.clone()).with_default_currency("PLN"),
    );
    events.subscribe(Arc::new(CacheInvalidator::new(cache.clone()))).await;
    events.subscribe(computed.clone()).await;

    Runtime {
        schema: SchemaRegistry::new(store.clone(), patterns.clone()),
        repeaters: RepeaterService::new(
            store.clone(),
            patterns.clone(),
            values.clone(),
            Arc::new(KeyedLocks::new()),
        ),
        pipeline: FieldPipeline::new(
            patterns,
            values.clone(),
            Arc::new(HookRegistry::new()),
            events,
            cache,
        ),
        store,
        values,
        computed,
    }
}

fn group(name: &str) -> GroupName {
    GroupName::new(name).unwrap()
}

fn first_number(deps: &HashMap<String, Value>) -> f64 {
    deps.values().next().and_then(Value::as_f64).unwrap_or(0.0)
}

// ========== Values ==========

#[tokio::test]
async fn test_set_twice_leaves_one_row() {
    let rt = runtime().await;
    let g = group("product");
    assert!(
        rt.schema
            .ensure_group_tables(&g, &[FieldDefinition::new("Sku", FieldType::ShortText)])
            .await
    );

    for sku in ["A-1", "A-2"] {
        assert!(rt.pipeline.write(&g, "Sku", Value::from(sku), 10).await.unwrap());
    }
    assert_eq!(rt.values.count_values("field_sku", 10, &g).await, 1);
    assert_eq!(rt.pipeline.read(&g, "Sku", 10).await, Some(Value::from("A-2")));
}

#[tokio::test]
async fn test_missing_group_reads_empty() {
    let rt = runtime().await;
    let g = group("never_registered");
    assert_eq!(rt.pipeline.read(&g, "anything", 1).await, None);
    assert!(rt.pipeline.read_all(&g, 1).await.is_empty());
    assert!(!rt.pipeline.write(&g, "anything", Value::from("x"), 1).await.unwrap());
}

// ========== Repeaters ==========

#[tokio::test]
async fn test_repeater_add_then_delete() {
    let rt = runtime().await;
    let g = group("team");
    rt.schema
        .ensure_group_tables(&g, &[FieldDefinition::new("Members", FieldType::Repeater)])
        .await;

    let row: Value = serde_json::json!({"name": "Ada"}).into();
    let added = rt.repeaters.add_row(&g, "Members", 4, row.clone()).await.unwrap();
    assert_eq!(added.outcome, 0);
    assert_eq!(added.after, vec![row]);

    let deleted = rt.repeaters.delete_row(&g, "Members", 4, 0).await.unwrap();
    assert!(deleted.after.is_empty());
    assert_eq!(rt.repeaters.rows(&g, "Members", 4).await.unwrap(), Vec::<Value>::new());
    assert!(matches!(
        rt.repeaters.delete_row(&g, "Members", 4, 0).await,
        Err(RuntimeError::InvalidOperation(_))
    ));
}

// ========== Location rules ==========

#[tokio::test]
async fn test_location_rules_round_trip() {
    let rt = runtime().await;
    let g = group("page_extras");
    let rule = LocationRule {
        group_name: g.to_string(),
        ..LocationRule::post_type_is("page")
    };
    rt.store.replace_location_rules(&g, &[rule]).await.unwrap();

    let sets = group_rule_sets(rt.store.location_rules(&g).await.unwrap());
    assert!(matches(&PostContext::new(1, "page"), &sets));
    assert!(!matches(&PostContext::new(1, "post"), &sets));
    assert!(matches(&PostContext::new(1, "post"), &[]));
}

// ========== Computed fields ==========

#[tokio::test]
async fn test_pricing_scenario() {
    let rt = runtime().await;
    let g = group("pricing");
    rt.schema
        .ensure_group_tables(&g, &[FieldDefinition::new("base_price", FieldType::Number)])
        .await;
    rt.computed
        .register(
            "price_with_tax",
            vec!["base_price".to_string()],
            ComputedOptions::default().with_format(ComputedFormat::Price {
                decimals: 2,
                currency: None,
            }),
            |deps, _| Ok(Value::Number(first_number(deps) * 1.23)),
        )
        .unwrap();

    assert!(rt.pipeline.write(&g, "base_price", Value::from("100"), 42).await.unwrap());
    assert_eq!(
        rt.computed.calculate("price_with_tax", 42, &g).await,
        Some(Value::from("123.00 PLN"))
    );
}

#[tokio::test]
async fn test_chain_recomputes_once_with_new_value() {
    let rt = runtime().await;
    let g = group("chain");
    rt.schema
        .ensure_group_tables(&g, &[FieldDefinition::new("A", FieldType::Number)])
        .await;

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = seen.clone();
    rt.computed
        .register(
            "B",
            vec!["A".to_string()],
            ComputedOptions::default(),
            move |deps: &HashMap<String, Value>, _: &ComputeContext| {
                recorder.lock().unwrap().push(deps.get("A").cloned());
                Ok(Value::Number(first_number(deps) + 1.0))
            },
        )
        .unwrap();

    rt.pipeline.write(&g, "A", Value::from("7"), 1).await.unwrap();

    assert_eq!(rt.computed.recompute_count(), 1);
    assert_eq!(*seen.lock().unwrap(), vec![Some(Value::Number(7.0))]);
    assert_eq!(rt.computed.calculate("B", 1, &g).await, Some(Value::Number(8.0)));
    assert_eq!(rt.computed.recompute_count(), 1);
}

#[tokio::test]
async fn test_cycle_rejected_and_propagation_bounded() {
    let rt = runtime().await;
    let g = group("loop");
    rt.schema
        .ensure_group_tables(&g, &[FieldDefinition::new("A", FieldType::Number)])
        .await;

    let plus_one = |deps: &HashMap<String, Value>, _: &ComputeContext| -> anyhow::Result<Value> {
        Ok(Value::Number(first_number(deps) + 1.0))
    };
    rt.computed
        .register("B", vec!["A".to_string()], ComputedOptions::default(), plus_one)
        .unwrap();
    rt.computed
        .register("C", vec!["B".to_string()], ComputedOptions::default(), plus_one)
        .unwrap();
    let err = rt
        .computed
        .register("B", vec!["C".to_string()], ComputedOptions::default(), plus_one)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::DependencyCycle(_)));

    rt.pipeline.write(&g, "A", Value::from("1"), 2).await.unwrap();
    assert!(rt.computed.recompute_count() <= rt.computed.registered().len() as u64 * 2);
    assert_eq!(rt.computed.calculate("C", 2, &g).await, Some(Value::Number(3.0)));
}

#[tokio::test]
async fn test_storage_failure_degrades() {
    let store = Arc::new(MemoryStore::new());
    let patterns = Arc::new(PatternStore::new(store.clone()));
    let schema = SchemaRegistry::new(store.clone(), patterns.clone());
    let values = ValueStore::new(store.clone(), patterns);
    let g = group("fragile");
    schema
        .ensure_group_tables(&g, &[FieldDefinition::new("Note", FieldType::LongText)])
        .await;

    store.set_unavailable(true);
    assert!(!values.set_value("Note", &Value::from("x"), 1, &g).await);
    assert_eq!(values.get_value("Note", 1, &g).await, None);
    assert!(!schema.table_exists(&g).await);
}
