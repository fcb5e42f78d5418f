mod common;

use std::fs;
use std::path::PathBuf;

use common::person_registry;
use synthkit_generate::{Faker, LoggingError, RuleBuilder, init_file_logging, init_stderr_logging};

fn temp_log_path() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("synthkit_logs_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir.join("generate.log")
}

#[test]
fn file_logging_records_generation_events() {
    let path = temp_log_path();
    init_file_logging(&path).expect("install file logging");

    let mut faker = Faker::new(person_registry());
    faker
        .rule_for("name", |_, _| "x".to_string())
        .expect("name rule")
        .strict_mode(true);
    faker.generate_many(2, None).expect_err("age is missing");
    faker.ignore("age").expect("ignore age");
    let relaxed = faker.clone();
    relaxed.generate_many(2, None).expect("generate");

    let contents = fs::read_to_string(&path).expect("read log");
    assert!(contents.contains("generator created"));
    assert!(contents.contains("bulk generation completed"));
    assert!(contents.contains("strict mode validation failed"));

    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("json log line"))
        .collect();
    assert!(events.iter().all(|event| event["timestamp"].is_string()));
    let completed = events
        .iter()
        .find(|event| event["fields"]["message"] == "bulk generation completed")
        .expect("completion event");
    assert_eq!(completed["fields"]["count"], 2);

    let second = init_stderr_logging("debug");
    assert!(matches!(second, Err(LoggingError::Subscriber(_))));

    if let Some(dir) = path.parent() {
        let _ = fs::remove_dir_all(dir);
    }
}
