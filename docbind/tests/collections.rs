//! Typed collection, pagination and derive-macro tests.

use bson::Uuid;
use docbind::memory::MemoryBackend;
use docbind::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "notes")]
struct Note {
    id: Uuid,
    text: String,
    rank: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "tickets")]
struct Ticket {
    #[document(id)]
    key: Uuid,
    title: String,
}

fn note(text: &str, rank: i32) -> Note {
    Note {
        id: Uuid::new(),
        text: text.to_string(),
        rank,
    }
}

#[test]
fn derive_provides_identity_and_collection() {
    let sample = note("hello", 1);
    assert_eq!(Note::collection_name(), "notes");
    assert_eq!(sample.id(), &sample.id);

    let ticket = Ticket { key: Uuid::new(), title: "crash".to_string() };
    assert_eq!(Ticket::collection_name(), "tickets");
    assert_eq!(ticket.id(), &ticket.key);
}

#[tokio::test]
async fn typed_collections_round_trip() {
    let store = DocumentStore::new(MemoryBackend::new());
    let notes = store.typed_collection::<Note>();

    let all = (0..5).map(|i| note(&format!("note {i}"), i)).collect::<Vec<_>>();
    notes.insert(all.clone()).await.unwrap();

    let high = notes
        .query(
            Query::builder()
                .filter(Filter::gt("rank", 2))
                .sort("rank", SortDirection::Desc)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(
        high.iter().map(|n| n.rank).collect::<Vec<_>>(),
        vec![4, 3]
    );
}

#[tokio::test]
async fn pages_carry_navigation_metadata() {
    let store = DocumentStore::new(MemoryBackend::new());
    let notes = store.typed_collection::<Note>();

    notes
        .insert((0..5).map(|i| note(&format!("note {i}"), i)).collect())
        .await
        .unwrap();

    let sorted = Query::builder()
        .sort("rank", SortDirection::Asc)
        .build();

    let second = notes
        .page(sorted.clone(), PaginationParams::new(2, 2))
        .await
        .unwrap();
    assert_eq!(
        second.items.iter().map(|n| n.rank).collect::<Vec<_>>(),
        vec![2, 3]
    );
    assert_eq!(second.count, 5);
    assert_eq!(second.next_page, Some(3));
    assert_eq!(second.previous_page, Some(1));

    let last = notes
        .page(sorted.clone(), PaginationParams::new(3, 2))
        .await
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.next_page, None);

    let beyond = notes
        .page(sorted, PaginationParams::new(4, 2))
        .await
        .unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.count, 5);
    assert_eq!(beyond.next_page, None);
    assert_eq!(beyond.previous_page, Some(3));
}

#[tokio::test]
async fn counts_follow_the_filter() {
    let store = DocumentStore::new(MemoryBackend::new());
    let notes = store.typed_collection::<Note>();

    notes
        .insert((0..4).map(|i| note(&format!("note {i}"), i)).collect())
        .await
        .unwrap();

    let count = notes
        .count(Query::builder().filter(Filter::gte("rank", 2)).build())
        .await
        .unwrap();
    assert_eq!(count, 2);
}
