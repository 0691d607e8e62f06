//! Benchmark utilities.

use docmod_store::{DocumentRecord, InMemoryStore};
use docmod_testkit::{memory_store, DocBuilder};
use rand::seq::SliceRandom;
use rand::Rng;

const WORDS: &[&str] = &[
    "term", "summary", "draft", "legacy", "link", "table", "note", "section",
];

/// Generate random markup with roughly `size` bytes of text.
pub fn random_content(size: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut body = String::with_capacity(size + 32);
    body.push_str("<Summary>");
    while body.len() < size {
        body.push_str(WORDS.choose(&mut rng).copied().unwrap_or("term"));
        body.push(' ');
    }
    body.push_str("</Summary>");
    body
}

/// Generate a document with `versions` versions, a random share of them
/// publishable, and an edited working copy half of the time.
pub fn random_document(id: u64, versions: usize, size: usize) -> DocumentRecord {
    let mut rng = rand::thread_rng();
    let mut builder = DocBuilder::new(id);
    for _ in 0..versions {
        builder = builder.version(&random_content(size), rng.gen_bool(0.3));
    }
    if rng.gen_bool(0.5) {
        builder = builder.working_copy(&random_content(size));
    }
    builder.build()
}

/// Generate a store of `count` random documents, ids starting at 1.
pub fn random_store(count: u64, versions: usize, size: usize) -> InMemoryStore {
    memory_store(
        (1..=count)
            .map(|id| random_document(id, versions, size))
            .collect(),
    )
}
