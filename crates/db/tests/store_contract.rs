//! Runs one lifecycle sequence against every store backend. The bot only
//! ever talks to `TicketStore`, so all backends must agree on observable
//! behavior.

use tempfile::TempDir;

use ticketry_core::domain::ids::{ChannelId, MessageId, TicketId};
use ticketry_core::store::{InMemoryTicketStore, StoreError, TicketStore};
use ticketry_db::{connect_with_settings, JsonTicketStore, SqliteTicketStore};

async fn exercise_lifecycle(store: &dyn TicketStore) {
    assert_eq!(store.ticket_count().await.expect("fresh count"), 0);
    assert_eq!(store.setup_message_id().await.expect("fresh setup"), None);

    store.save_setup_message(MessageId(555)).await.expect("save setup");
    assert!(store.is_trigger_message(MessageId(555)).await.expect("setup trigger"));

    let first = store.next_ticket_id().await.expect("reserve first");
    assert_eq!(first, TicketId(1));
    store.create_ticket(ChannelId(1000), first, None).await.expect("create first");
    store
        .attach_trigger_message(ChannelId(1000), MessageId(700))
        .await
        .expect("attach trigger");

    assert!(store.is_ticket(ChannelId(1000)).await.expect("is_ticket"));
    assert!(store.is_trigger_message(MessageId(700)).await.expect("record trigger"));
    assert!(!store.is_trigger_message(MessageId(999)).await.expect("unknown message"));

    let duplicate = store
        .create_ticket(ChannelId(1000), TicketId(99), None)
        .await
        .expect_err("channel already has a ticket");
    assert!(matches!(duplicate, StoreError::Duplicate(ChannelId(1000))));

    let missing = store.get_ticket_id(ChannelId(2000)).await.expect_err("unknown channel");
    assert!(matches!(missing, StoreError::NotFound(ChannelId(2000))));

    let second = store.next_ticket_id().await.expect("reserve second");
    assert_eq!(second, TicketId(2));
    store
        .create_ticket(ChannelId(2000), second, Some(MessageId(701)))
        .await
        .expect("create second");

    let record = store.get_ticket(ChannelId(2000)).await.expect("get").expect("present");
    assert_eq!(record.ticket_id, TicketId(2));
    assert_eq!(record.trigger_message_id, Some(MessageId(701)));

    store.remove_ticket(ChannelId(1000)).await.expect("remove first");
    assert!(!store.is_ticket(ChannelId(1000)).await.expect("removed"));
    assert!(!store.is_trigger_message(MessageId(700)).await.expect("trigger gone"));

    // Removal never rewinds the counter.
    assert_eq!(store.ticket_count().await.expect("count"), 2);

    store.save_setup_message(MessageId(666)).await.expect("replace setup");
    assert!(!store.is_trigger_message(MessageId(555)).await.expect("old setup abandoned"));
    assert!(store.is_trigger_message(MessageId(666)).await.expect("new setup"));
}

#[tokio::test]
async fn sqlite_backend_honors_the_store_contract() {
    let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
        .await
        .expect("connect");
    ticketry_db::migrations::run_pending(&pool).await.expect("migrate");

    let store = SqliteTicketStore::new(pool.clone());
    exercise_lifecycle(&store).await;

    pool.close().await;
}

#[tokio::test]
async fn json_backend_honors_the_store_contract() {
    let dir = TempDir::new().expect("tempdir");
    let store = JsonTicketStore::new(dir.path().join("state.json"));
    exercise_lifecycle(&store).await;
}

#[tokio::test]
async fn in_memory_backend_honors_the_store_contract() {
    let store = InMemoryTicketStore::new();
    exercise_lifecycle(&store).await;
}
