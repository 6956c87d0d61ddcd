use std::fs;
use std::path::PathBuf;

use mrkv::config::{Config, OperationName};
use mrkv::standalone::run_local;
use mrkv::WorkerId;
use serde_json::json;
use uuid::Uuid;

fn workdir(docs: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mrkv-e2e-{}", Uuid::new_v4()));
    let raw = dir.join("raw-input");
    fs::create_dir_all(&raw).unwrap();
    for (name, text) in docs {
        fs::write(raw.join(name), text).unwrap();
    }
    dir
}

#[tokio::test]
async fn word_count_two_by_two() {
    let dir = workdir(&[("doc1", "the cat sat"), ("doc2", "the dog ran")]);
    let config = Config::local(&dir, OperationName::WordCount);

    let (summary, output) = run_local(config).await.unwrap();
    assert_eq!(output, json!({ "cat": 1, "dog": 1, "ran": 1, "sat": 1, "the": 2 }));
    assert_eq!(summary.documents, 2);
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.mappers_acked, vec![WorkerId::mapper(1), WorkerId::mapper(2)]);
    assert_eq!(summary.reducers_acked, vec![WorkerId::reducer(1), WorkerId::reducer(2)]);
    assert_eq!(summary.final_output, dir.join("final-output").join("final-output-wordcount.json"));

    let on_disk = fs::read_to_string(&summary.final_output).unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&on_disk).unwrap(), output);
    let cat = on_disk.find("\"cat\"").unwrap();
    let the = on_disk.find("\"the\"").unwrap();
    assert!(cat < the);

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn inverted_index_lists_documents_per_token() {
    let dir = workdir(&[("doc1", "The cat sat."), ("doc2", "the dog, ran")]);
    let config = Config::local(&dir, OperationName::InvertedIndex);

    let (_, output) = run_local(config).await.unwrap();
    assert_eq!(
        output,
        json!({
            "cat": ["doc1"],
            "dog": ["doc2"],
            "ran": ["doc2"],
            "sat": ["doc1"],
            "the": ["doc1", "doc2"],
        })
    );

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn more_mappers_than_lines() {
    let dir = workdir(&[("only", "a b a\n")]);
    let mut config = Config::local(&dir, OperationName::WordCount);
    config.mapper_count = 3;
    config.reducer_count = 5;

    let (_, output) = run_local(config).await.unwrap();
    assert_eq!(output, json!({ "a": 2, "b": 1 }));

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn reruns_start_from_clean_staging_areas() {
    let dir = workdir(&[("doc1", "one two"), ("doc2", "two")]);
    let config = Config::local(&dir, OperationName::WordCount);

    let (_, first) = run_local(config.clone()).await.unwrap();
    fs::remove_file(dir.join("raw-input").join("doc2")).unwrap();
    let (_, second) = run_local(config).await.unwrap();

    assert_eq!(first, json!({ "one": 1, "two": 2 }));
    assert_eq!(second, json!({ "one": 1, "two": 1 }));

    fs::remove_dir_all(&dir).unwrap();
}
