//! Article feed demo: sync paginated JSON:API payloads into one store,
//! watch a forward reference resolve, and run a time-window query.
//!
//! Run with:
//!   cargo run --example article_feed

use anyhow::Result;
use jsonapi_graph::{Document, SerializeOptions, Store, TimeRangeSpec};
use serde_json::json;

fn main() -> Result<()> {
    let mut store =
        Store::with_time_ranges([("publication", TimeRangeSpec::indexed("live_during"))]);

    // Page one references an author whose resource has not arrived yet.
    let page_one = Document::from_value(json!({
        "data": [{
            "type": "article",
            "id": 1,
            "attributes": { "title": "Placeholders in practice" },
            "relationships": { "author": { "data": { "type": "user", "id": 9 } } }
        }],
        "meta": { "page": 1 }
    }))?;
    let outcome = store.sync_with_meta(&page_one);
    println!("synced page {:?}", outcome.meta);

    let article = store.find("article", 1).expect("just synced");
    let author = article.related("author").expect("linked");
    println!(
        "author {}:{} placeholder = {}",
        author.kind(),
        author.id().expect("registered"),
        author.is_placeholder()
    );

    // Page two delivers the author; the handle above fills in.
    let page_two = Document::from_value(json!({
        "data": { "type": "user", "id": 9, "attributes": { "name": "Lucas" } },
        "meta": { "page": 2 }
    }))?;
    store.sync(&page_two);
    println!(
        "author resolved: name = {:?}, placeholder = {}",
        author.attribute("name"),
        author.is_placeholder()
    );

    // Serialize the article back out, title only.
    let options = SerializeOptions {
        attributes: Some(vec!["title".to_string()]),
        relationships: None,
    };
    println!(
        "serialized: {}",
        serde_json::to_string(&article.serialize_with(&options))?
    );

    // A windowed type: publications live during a timestamp range.
    let publications = Document::from_value(json!({
        "data": [
            { "type": "publication", "id": 1, "attributes": {
                "live_during": "[\"2024-05-04 10:00:00+00\",\"2024-05-04 12:00:00+00\")" } },
            { "type": "publication", "id": 2, "attributes": {
                "live_during": "[\"2024-05-04 14:00:00+00\",\"2024-05-04 18:00:00+00\")" } }
        ]
    }))?;
    store.sync(&publications);

    let eleven = store
        .time_window("publication", 1)
        .expect("parsed")
        .start
        + 3_600_000;
    let live = store.find_all_by_window("publication", Some(eleven), Some(eleven + 1));
    println!(
        "live at 11:00 UTC: {:?}",
        live.iter()
            .map(|p| p.id().expect("registered").to_string())
            .collect::<Vec<_>>()
    );

    Ok(())
}
