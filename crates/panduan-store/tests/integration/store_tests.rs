use std::fs;

use panduan_core::models::{FailureKind, FieldFailure, PipelineBatch, Produced};
use panduan_core::store::{MergePolicy, StoreFile, merge};
use panduan_core::traits::ArticleStore;
use panduan_core::AppError;
use uuid::Uuid;

use crate::common::{at, temp_store, translated};

fn batch(articles: Vec<panduan_core::Article>) -> PipelineBatch {
    articles.into_iter().collect()
}

#[test]
fn absent_file_loads_as_empty_store() {
    let (store, _dir) = temp_store();
    let loaded = store.load().unwrap();
    assert!(loaded.articles.is_empty());
    assert!(loaded.last_updated.is_none());
}

#[test]
fn saved_articles_round_trip() {
    let (store, _dir) = temp_store();
    let run_id = Uuid::new_v4();
    let file = merge(
        StoreFile::default(),
        &batch(vec![translated("https://a.test/1", "first")]),
        MergePolicy::AppendOnly,
        run_id,
        at(9),
    );
    store.save(&file).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded, file);
    let entry = &loaded.articles[0];
    assert_eq!(entry.url, "https://a.test/1");
    assert_eq!(entry.title, "How to https://a.test/1");
    assert_eq!(entry.content.len(), 2);
    assert_eq!(entry.translated_title.as_deref(), Some("Cara https://a.test/1"));
    assert_eq!(entry.run_id, run_id);
    assert_eq!(loaded.last_updated, Some(at(9)));
}

#[test]
fn record_uses_camel_case_keys() {
    let (store, _dir) = temp_store();
    let file = merge(
        StoreFile::default(),
        &batch(vec![translated("https://a.test/1", "first")]),
        MergePolicy::AppendOnly,
        Uuid::new_v4(),
        at(9),
    );
    store.save(&file).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert!(raw.get("lastUpdated").is_some());
    let entry = &raw["articles"][0];
    assert!(entry.get("translatedTitle").is_some());
    assert!(entry.get("finalHtml").is_some());
    assert!(entry.get("contentHash").is_some());
}

#[test]
fn failed_fields_are_not_persisted() {
    let (store, _dir) = temp_store();
    let mut article = translated("https://a.test/1", "first");
    article.final_html = Some(Produced::Failed(FieldFailure::new(
        FailureKind::MissingInput,
        "no translated content",
    )));
    let file = merge(
        StoreFile::default(),
        &batch(vec![article]),
        MergePolicy::AppendOnly,
        Uuid::new_v4(),
        at(9),
    );
    store.save(&file).unwrap();

    let loaded = store.load().unwrap();
    assert!(loaded.articles[0].final_html.is_none());
    assert!(loaded.articles[0].translated_title.is_some());
}

#[test]
fn corrupt_file_is_a_store_error() {
    let (store, _dir) = temp_store();
    fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    fs::write(store.path(), "{ not json").unwrap();

    let err = store.load().unwrap_err();
    assert!(matches!(err, AppError::StoreError(_)));
    assert!(err.is_fatal());
}

#[test]
fn append_only_keeps_every_run() {
    let (store, _dir) = temp_store();
    for (hour, body) in [(9, "first"), (10, "second")] {
        let existing = store.load().unwrap();
        let file = merge(
            existing,
            &batch(vec![translated("https://a.test/1", body)]),
            MergePolicy::AppendOnly,
            Uuid::new_v4(),
            at(hour),
        );
        store.save(&file).unwrap();
    }

    let history = store.history("https://a.test/1", 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].saved_at, at(10));
    assert_eq!(history[1].saved_at, at(9));
    assert_ne!(history[0].content_hash, history[1].content_hash);
}

#[test]
fn latest_wins_replaces_same_url_only() {
    let (store, _dir) = temp_store();
    let first = merge(
        StoreFile::default(),
        &batch(vec![
            translated("https://a.test/1", "first"),
            translated("https://a.test/2", "other"),
        ]),
        MergePolicy::AppendOnly,
        Uuid::new_v4(),
        at(9),
    );
    store.save(&first).unwrap();

    let second = merge(
        store.load().unwrap(),
        &batch(vec![translated("https://a.test/1", "second")]),
        MergePolicy::LatestWins,
        Uuid::new_v4(),
        at(10),
    );
    store.save(&second).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.articles.len(), 2);
    assert_eq!(store.history("https://a.test/1", 10).unwrap().len(), 1);
    assert_eq!(store.history("https://a.test/1", 10).unwrap()[0].saved_at, at(10));
    assert_eq!(store.history("https://a.test/2", 10).unwrap().len(), 1);
}

#[test]
fn history_respects_limit() {
    let (store, _dir) = temp_store();
    let mut file = StoreFile::default();
    for hour in 1..=4 {
        file = merge(
            file,
            &batch(vec![translated("https://a.test/1", &format!("v{hour}"))]),
            MergePolicy::AppendOnly,
            Uuid::new_v4(),
            at(hour),
        );
    }
    store.save(&file).unwrap();

    let history = store.history("https://a.test/1", 2).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].saved_at, at(4));
    assert!(store.history("https://a.test/missing", 2).unwrap().is_empty());
}

#[test]
fn save_leaves_no_temporary_files() {
    let (store, _dir) = temp_store();
    store.save(&StoreFile::default()).unwrap();
    store.save(&StoreFile::default()).unwrap();

    let dir = store.path().parent().unwrap();
    let names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("translated_articles.json")]);
}
