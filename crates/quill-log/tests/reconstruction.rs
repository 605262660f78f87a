//! Reconstruction tests for the revision log
//!
//! Historical document states must be recoverable from the nearest snapshot
//! plus replayed changesets, across several snapshot boundaries and after the
//! document is reloaded from the store.

use quill_changeset::{AText, Attribute, Changeset};
use quill_log::{key_revision_number, KeyValueStore, MemoryStore, Pad, Rev, KEYFRAME_INTERVAL};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const AUTHORS: [&str; 3] = ["a.alice", "a.bob", ""];

/// A random splice against `pad`'s current text, attributed to `author` once
/// the pool knows them.
fn random_edit(rng: &mut StdRng, pad: &Pad, author: &str) -> Changeset {
    let len = pad.atext().len();
    let start = rng.gen_range(0..len);
    let remove = rng.gen_range(0..=(len - 1 - start).min(3));
    let insert: String = (0..rng.gen_range(0..4))
        .map(|_| ['a', 'b', '\n'][rng.gen_range(0..3)])
        .collect();

    let attribs: Vec<_> = pad
        .pool()
        .find(&Attribute::author(author))
        .into_iter()
        .collect();
    Changeset::make_splice(pad.text(), start, remove, &insert, &attribs).unwrap()
}

async fn build_history(store: Arc<MemoryStore>, revisions: usize) -> (Pad, Vec<AText>) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut pad = Pad::load("history", store, None).await.unwrap();
    let mut history = Vec::with_capacity(revisions);

    for i in 0..revisions {
        let author = AUTHORS[i % AUTHORS.len()];
        let cs = random_edit(&mut rng, &pad, author);
        let rev = pad.append_revision(cs, author).await.unwrap();
        assert_eq!(rev, i as Rev);
        history.push(pad.atext().clone());
    }
    (pad, history)
}

#[tokio::test]
async fn test_reconstruction_across_snapshots() {
    let store = Arc::new(MemoryStore::new());
    let (pad, history) = build_history(store, 250).await;

    for rev in [0, 1, 57, 99, 100, 101, 150, 199, 200, 249] {
        let atext = pad.get_internal_revision_atext(rev).await.unwrap();
        assert_eq!(atext, history[rev as usize], "revision {} differs", rev);
    }
}

#[tokio::test]
async fn test_snapshots_only_on_keyframes() {
    let store = Arc::new(MemoryStore::new());
    let (pad, history) = build_history(store.clone(), 205).await;

    for rev in 0..=pad.head() {
        let snapshot = store
            .get_sub(&quill_log::rev_key("history", rev), &["meta", "atext"])
            .await
            .unwrap();
        assert_eq!(snapshot.is_some(), rev % KEYFRAME_INTERVAL == 0, "revision {}", rev);
    }

    let atext = pad.get_internal_revision_atext(key_revision_number(204)).await.unwrap();
    assert_eq!(atext, history[200]);
}

#[tokio::test]
async fn test_reload_preserves_history() {
    let store = Arc::new(MemoryStore::new());
    let (pad, history) = build_history(store.clone(), 120).await;
    let head = pad.head();
    drop(pad);

    let reloaded = Pad::load("history", store, None).await.unwrap();
    assert_eq!(reloaded.head(), head);
    assert_eq!(reloaded.atext(), &history[head as usize]);
    assert_eq!(
        reloaded.get_internal_revision_atext(110).await.unwrap(),
        history[110]
    );

    let authors = reloaded.get_authors_for_revision_set(0, None).await.unwrap();
    assert_eq!(
        authors.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["a.alice", "a.bob"]
    );
}

#[tokio::test]
async fn test_revision_set_is_ordered() {
    let store = Arc::new(MemoryStore::new());
    let (pad, history) = build_history(store, 30).await;

    let revisions = pad.get_revision_set(10, Some(20)).await.unwrap();
    assert_eq!(revisions.len(), 11);

    // Replaying the set on top of revision 9 reproduces revision 20.
    let mut text = history[9].text.clone();
    for revision in &revisions {
        text = revision.changeset.apply_to_text(&text).unwrap();
    }
    assert_eq!(text, history[20].text);
}
