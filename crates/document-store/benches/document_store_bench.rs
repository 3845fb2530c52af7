use criterion::{Criterion, criterion_group, criterion_main};
use document_store::{DocumentId, DocumentStore, Filter, InMemoryDocumentStore, Update};

fn make_book(i: usize) -> serde_json::Value {
    serde_json::json!({
        "title": format!("Book {i}"),
        "status": if i % 2 == 0 { "published" } else { "unpublished" },
        "addedByEmail": format!("librarian{}@example.com", i % 10),
        "stock": 5,
    })
}

fn bench_insert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("document_store/insert", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                store
                    .insert("books", DocumentId::new(), make_book(0))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_find_filtered(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();

    // Pre-populate with 1000 books
    rt.block_on(async {
        for i in 0..1000 {
            store
                .insert("books", DocumentId::new(), make_book(i))
                .await
                .unwrap();
        }
    });

    let filter = Filter::new()
        .eq("status", "published")
        .eq("addedByEmail", "librarian4@example.com");

    c.bench_function("document_store/find_filtered_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.find("books", &filter).await.unwrap();
            });
        });
    });
}

fn bench_conditional_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let id = DocumentId::new();

    rt.block_on(async {
        store.insert("books", id, make_book(0)).await.unwrap();
    });

    let guard = Filter::new().gte("stock", 0);
    let update = Update::new().inc("stock", 1);

    c.bench_function("document_store/conditional_update", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.update_one("books", id, &guard, &update).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_find_filtered,
    bench_conditional_update
);
criterion_main!(benches);
