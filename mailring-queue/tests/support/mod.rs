use mailring_queue::{Entry, QueueStore};
use pretty_assertions::assert_eq;

fn entries(items: &[&str]) -> Vec<Entry> {
    items.iter().map(|item| item.as_bytes().to_vec()).collect()
}

/// Behaviour every queue store must share
pub async fn exercise(store: &dyn QueueStore, namespace: &str) {
    let main = format!("{namespace}:main");
    let provider = format!("{namespace}:provider");
    let private = format!("{namespace}:private");

    for key in [&main, &provider, &private] {
        store.take_all(key).await.unwrap();
    }

    assert_eq!(store.push(&main, entries(&["1", "2", "3"])).await.unwrap(), 3);
    assert_eq!(store.push(&main, Vec::new()).await.unwrap(), 3);
    assert_eq!(store.len(&main).await.unwrap(), 3);

    // Claiming takes the oldest entry
    let claimed = store.move_tail_to_head(&main, &provider).await.unwrap();
    assert_eq!(claimed, Some(b"1".to_vec()));
    assert_eq!(store.read_all(&provider).await.unwrap(), entries(&["1"]));
    assert_eq!(store.read_all(&main).await.unwrap(), entries(&["3", "2"]));

    // Expansion pushes are drained in push order
    store
        .push(&private, entries(&["a", "b", "c"]))
        .await
        .unwrap();
    assert_eq!(store.pop(&private).await.unwrap(), Some(b"a".to_vec()));

    // Restore reads and clears atomically
    assert_eq!(store.take_all(&private).await.unwrap(), entries(&["c", "b"]));
    assert_eq!(store.len(&private).await.unwrap(), 0);

    store.replace(&provider, 0, b"folded".to_vec()).await.unwrap();

    // Handing back puts the entry where the next claim will find it
    let handed = store.move_tail_to_tail(&provider, &main).await.unwrap();
    assert_eq!(handed, Some(b"folded".to_vec()));
    assert_eq!(store.len(&provider).await.unwrap(), 0);
    assert_eq!(
        store.move_tail_to_head(&main, &provider).await.unwrap(),
        Some(b"folded".to_vec())
    );
    assert_eq!(store.pop(&provider).await.unwrap(), Some(b"folded".to_vec()));
    assert_eq!(store.pop(&provider).await.unwrap(), None);

    assert!(store.replace(&provider, 0, b"x".to_vec()).await.is_err());

    for key in [&main, &provider, &private] {
        store.take_all(key).await.unwrap();
    }
}
