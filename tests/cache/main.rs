// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use msgpath::*;

#[cfg(feature = "arc")]
use std::sync::Arc as Rc;

#[cfg(not(feature = "arc"))]
use std::rc::Rc;

use anyhow::{anyhow, Result};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn an_array_registry() -> SchemaRegistry {
    SchemaRegistry::new(
        vec![Topic::new("/topic", "datatype")],
        [(
            Rc::<str>::from("datatype"),
            DatatypeSchema::new(vec![FieldDefinition::array("an_array", "uint32")]),
        )],
    )
}

fn an_array_message() -> Result<Rc<MessageEvent>> {
    Ok(Rc::new(MessageEvent::new(
        "/topic",
        Time::default(),
        Value::from_json_str(r#"{ "an_array": [5, 10, 15, 20] }"#)?,
    )))
}

fn get(
    engine: &mut Engine,
    path: &str,
    message: &Rc<MessageEvent>,
) -> Result<Rc<[MessagePathDataItem]>> {
    engine
        .get(path, message)?
        .ok_or_else(|| anyhow!("no result for {path}"))
}

fn values(items: &[MessagePathDataItem]) -> Vec<Value> {
    items.iter().map(|i| i.value.clone()).collect()
}

#[test]
fn clears_cache_whenever_inputs_change() -> Result<()> {
    init_logger();
    let registry = Rc::new(an_array_registry());
    let message = an_array_message()?;

    let mut engine = Engine::new();
    engine.set_registry(registry.clone());
    engine.set_paths(["/topic.an_array[0]", "/topic.an_array[1]"]);

    let data0 = get(&mut engine, "/topic.an_array[0]", &message)?;
    let data1 = get(&mut engine, "/topic.an_array[1]", &message)?;
    assert_eq!(values(&data0), vec![Value::from(5u64)]);
    assert_eq!(&*data0[0].path, "/topic.an_array[0]");
    assert_eq!(values(&data1), vec![Value::from(10u64)]);

    // Same message instance, same result instance.
    assert!(Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[0]", &message)?,
        &data0
    ));

    let err = engine
        .get("/topic.an_array[2]", &message)
        .expect_err("path was never declared");
    assert!(err.to_string().contains("not in the list of cached paths"));

    // Declaring the same set again changes nothing.
    let generation = engine.generation();
    engine.set_paths(vec!["/topic.an_array[0]".to_string(), "/topic.an_array[1]".to_string()]);
    assert_eq!(engine.generation(), generation);

    // Removing a path keeps the results of the others.
    engine.set_paths(["/topic.an_array[0]"]);
    assert_ne!(engine.generation(), generation);
    assert!(Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[0]", &message)?,
        &data0
    ));
    assert!(engine.get("/topic.an_array[1]", &message).is_err());

    // Adding it back computes it afresh.
    engine.set_paths(["/topic.an_array[0]", "/topic.an_array[1]"]);
    let data1_again = get(&mut engine, "/topic.an_array[1]", &message)?;
    assert!(!Rc::ptr_eq(&data1_again, &data1));
    assert_eq!(data1_again, data1);
    assert!(Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[0]", &message)?,
        &data0
    ));

    // Publishing the same registry instance keeps everything.
    engine.set_registry(registry.clone());
    assert!(Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[0]", &message)?,
        &data0
    ));

    // New topics, even identical ones, invalidate.
    let before_topics = get(&mut engine, "/topic.an_array[0]", &message)?;
    engine.set_registry(Rc::new(
        registry.with_topics(vec![Topic::new("/topic", "datatype")]),
    ));
    let after_topics = get(&mut engine, "/topic.an_array[0]", &message)?;
    assert!(!Rc::ptr_eq(&after_topics, &before_topics));
    assert_eq!(after_topics, before_topics);

    // Same for datatypes.
    engine.set_registry(Rc::new(registry.with_datatypes([(
        Rc::<str>::from("datatype"),
        DatatypeSchema::new(vec![FieldDefinition::array("an_array", "uint32")]),
    )])));
    let after_datatypes = get(&mut engine, "/topic.an_array[0]", &message)?;
    assert!(!Rc::ptr_eq(&after_datatypes, &after_topics));

    // And for a cloned snapshot.
    engine.set_registry(Rc::new(registry.as_ref().clone()));
    assert!(!Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[0]", &message)?,
        &after_datatypes
    ));
    Ok(())
}

#[test]
fn clears_cache_only_when_relevant_global_variables_change() -> Result<()> {
    let message = an_array_message()?;
    let mut engine = Engine::new();
    engine.set_registry(Rc::new(an_array_registry()));
    engine.set_global_variable("foo", Value::from(0u64));
    engine.set_paths(["/topic.an_array[$foo]"]);

    let data0 = get(&mut engine, "/topic.an_array[$foo]", &message)?;
    assert_eq!(values(&data0), vec![Value::from(5u64)]);
    assert_eq!(&*data0[0].path, "/topic.an_array[$foo]");
    assert!(Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[$foo]", &message)?,
        &data0
    ));

    let generation = engine.generation();
    engine.set_global_variable("bar", Value::from(0u64));
    assert_eq!(engine.generation(), generation);
    assert!(Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[$foo]", &message)?,
        &data0
    ));

    engine.set_global_variable("foo", Value::from(1u64));
    assert_ne!(engine.generation(), generation);
    let data1 = get(&mut engine, "/topic.an_array[$foo]", &message)?;
    assert_eq!(values(&data1), vec![Value::from(10u64)]);
    Ok(())
}

#[test]
fn memoizes_by_message_identity() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_registry(Rc::new(an_array_registry()));
    engine.set_paths(["/topic.an_array[:]"]);

    let first = an_array_message()?;
    let second = an_array_message()?;
    let a = get(&mut engine, "/topic.an_array[:]", &first)?;
    let b = get(&mut engine, "/topic.an_array[:]", &second)?;
    assert!(!Rc::ptr_eq(&a, &b));
    assert_eq!(a, b);
    assert_eq!(a.len(), 4);

    drop(first);
    engine.prune();
    assert!(Rc::ptr_eq(&get(&mut engine, "/topic.an_array[:]", &second)?, &b));
    Ok(())
}

#[test]
fn invalid_paths_and_unknown_topics() -> Result<()> {
    let message = an_array_message()?;
    let mut engine = Engine::new();
    engine.set_registry(Rc::new(an_array_registry()));
    engine.set_paths(["/topic..an_array", "/other.an_array", "/topic.missing"]);

    assert!(engine.get("/topic..an_array", &message)?.is_none());
    assert!(engine.get("/other.an_array", &message)?.is_none());
    assert_eq!(engine.get("/topic.missing", &message)?.map(|i| i.len()), Some(0));
    Ok(())
}

#[test]
fn explicit_invalidation() -> Result<()> {
    let message = an_array_message()?;
    let mut engine = Engine::new();
    engine.set_registry(Rc::new(an_array_registry()));
    engine.set_global_variable("foo", Value::from(2u64));
    engine.set_paths(["/topic.an_array[0]", "/topic.an_array[$foo]"]);

    let fixed = get(&mut engine, "/topic.an_array[0]", &message)?;
    let variable = get(&mut engine, "/topic.an_array[$foo]", &message)?;

    assert!(engine.invalidate("/topic.an_array[0]"));
    assert!(!engine.invalidate("/topic.an_array[7]"));
    assert!(!Rc::ptr_eq(&get(&mut engine, "/topic.an_array[0]", &message)?, &fixed));
    assert!(Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[$foo]", &message)?,
        &variable
    ));

    assert_eq!(engine.invalidate_by_variable("foo"), 1);
    assert_eq!(engine.invalidate_by_variable("bar"), 0);
    assert!(!Rc::ptr_eq(
        &get(&mut engine, "/topic.an_array[$foo]", &message)?,
        &variable
    ));

    let fixed = get(&mut engine, "/topic.an_array[0]", &message)?;
    engine.invalidate_all();
    assert!(!Rc::ptr_eq(&get(&mut engine, "/topic.an_array[0]", &message)?, &fixed));
    Ok(())
}

#[test]
fn strict_slice_variables() -> Result<()> {
    let message = an_array_message()?;
    let options = EngineOptions::from_json_str(r#"{ "strictSliceVariables": true }"#)?;
    let mut engine = Engine::with_options(options);
    engine.set_registry(Rc::new(an_array_registry()));
    engine.set_paths(["/topic.an_array[$start:]"]);

    match engine.get("/topic.an_array[$start:]", &message) {
        Err(QueryError::NonNumericSliceBound { variable, path }) => {
            assert_eq!(&*variable, "start");
            assert_eq!(&*path, "/topic.an_array[$start:]");
        }
        r => panic!("unexpected result {r:?}"),
    }

    engine.set_global_variable("start", Value::from("2"));
    let items = get(&mut engine, "/topic.an_array[$start:]", &message)?;
    assert_eq!(values(&items), vec![Value::from(15u64), Value::from(20u64)]);

    // Switching back to lenient resolution.
    engine.set_strict_slice_variables(false);
    engine.set_global_variable("start", Value::from("x"));
    assert_eq!(get(&mut engine, "/topic.an_array[$start:]", &message)?.len(), 4);
    Ok(())
}

fn strict_lookup(engine: &mut Engine, message: &Rc<MessageEvent>) -> Result<usize> {
    let items = engine.get("/topic.an_array[:$end]", message)?;
    Ok(items.map_or(0, |i| i.len()))
}

#[test]
fn query_errors_propagate_through_anyhow() -> Result<()> {
    fn send_sync<T: Send + Sync + 'static>() {}
    send_sync::<QueryError>();

    let message = an_array_message()?;
    let mut engine = Engine::new();
    engine.set_strict_slice_variables(true);
    engine.set_registry(Rc::new(an_array_registry()));
    engine.set_paths(["/topic.an_array[:$end]"]);

    let err = strict_lookup(&mut engine, &message).expect_err("end is unset");
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::NonNumericSliceBound {
            variable: "end".to_string(),
            path: "/topic.an_array[:$end]".to_string(),
        })
    );
    assert!(err.to_string().contains("`$end`"));

    engine.set_global_variable("end", Value::from(1u64));
    assert_eq!(strict_lookup(&mut engine, &message)?, 2);
    Ok(())
}

#[test]
fn engine_options() -> Result<()> {
    assert_eq!(EngineOptions::from_json_str("{}")?, EngineOptions::default());
    assert!(EngineOptions::from_json_str(r#"{ "strict": true }"#).is_err());
    #[cfg(feature = "yaml")]
    assert!(EngineOptions::from_yaml_str("strictSliceVariables: true")?.strict_slice_variables);
    Ok(())
}

#[test]
fn decode_messages_by_topic_results_in_missing_entries() -> Result<()> {
    init_logger();
    let registry = SchemaRegistry::from_json_str(
        r#"{
            "topics": [
                { "name": "/topic1", "datatype": "datatype" },
                { "name": "/topic2", "datatype": "datatype" },
                { "name": "/topic3", "datatype": "datatype" }
            ],
            "datatypes": {
                "datatype": { "definitions": [{ "name": "value", "type": "uint32" }] }
            }
        }"#,
    )?;
    let mut engine = Engine::new();
    engine.set_registry(Rc::new(registry));
    engine.set_paths([
        "/topic1.value",
        "/topic2.value",
        "/topic3.value",
        "/topic3..value",
    ]);

    let message = Rc::new(MessageEvent::from_json_str(
        r#"{ "topic": "/topic1", "receiveTime": { "sec": 0, "nsec": 0 }, "message": { "value": 1 } }"#,
    )?);
    let mut messages_by_topic = MessagesByTopic::new();
    messages_by_topic.insert("/topic1".into(), vec![message.clone()]);
    messages_by_topic.insert("/topic2".into(), vec![]);

    let result = engine.decode_messages_by_topic(&messages_by_topic)?;
    let keys: Vec<&str> = result.keys().map(|k| k.as_ref()).collect();
    assert_eq!(keys, vec!["/topic1.value", "/topic2.value", "/topic3..value"]);

    let records = &result["/topic1.value"];
    assert_eq!(records.len(), 1);
    assert!(Rc::ptr_eq(&records[0].message, &message));
    assert_eq!(values(&records[0].queried_data), vec![Value::from(1u64)]);
    assert_eq!(&*records[0].queried_data[0].path, "/topic1.value");

    assert!(result["/topic2.value"].is_empty());
    assert!(result["/topic3..value"].is_empty());

    // A second pass reuses the memoized results.
    let again = engine.decode_messages_by_topic(&messages_by_topic)?;
    assert!(Rc::ptr_eq(
        &again["/topic1.value"][0].queried_data,
        &records[0].queried_data
    ));
    Ok(())
}

#[test]
fn decoded_records_serialize_in_camel_case() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_registry(Rc::new(an_array_registry()));
    engine.set_paths(["/topic.an_array[1]"]);

    let mut messages_by_topic = MessagesByTopic::new();
    messages_by_topic.insert("/topic".into(), vec![an_array_message()?]);
    let result = engine.decode_messages_by_topic(&messages_by_topic)?;

    let json = serde_json::to_value(&result)?;
    let record = &json["/topic.an_array[1]"][0];
    assert_eq!(record["queriedData"][0]["value"], serde_json::json!(10));
    assert_eq!(record["queriedData"][0]["path"], "/topic.an_array[1]");
    assert_eq!(record["message"]["receiveTime"]["sec"], serde_json::json!(0));
    Ok(())
}
