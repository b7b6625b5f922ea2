use chrono::{DateTime, TimeZone, Utc};
use panduan_core::models::{Article, ContentBlock, ExtractedDocument, Produced};
use panduan_store::JsonFileStore;
use tempfile::TempDir;

/// A store inside a fresh temporary directory.
///
/// The `TempDir` must be kept in scope for the test duration; dropping it
/// deletes the directory.
pub fn temp_store() -> (JsonFileStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = JsonFileStore::new(dir.path().join("nested").join("translated_articles.json"));
    (store, dir)
}

/// A fully translated article.
pub fn translated(url: &str, body: &str) -> Article {
    let mut article = Article::new(
        url,
        ExtractedDocument {
            title: format!("How to {url}"),
            blocks: vec![
                ContentBlock::Heading {
                    level: 2,
                    text: "Steps".into(),
                },
                ContentBlock::Paragraph { text: body.into() },
            ],
        },
    );
    article.translated_title = Some(Produced::Value(format!("Cara {url}")));
    article.translated_content = Some(Produced::Value(vec![ContentBlock::Paragraph {
        text: format!("terjemahan {body}"),
    }]));
    article.final_html = Some(Produced::Value(format!("<h1>Cara {url}</h1>")));
    article
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
}
