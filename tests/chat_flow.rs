//! End-to-end chat flows run against both document store backends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::time::timeout;

use rehomebud_chat::chat::{
    ChatService, ConversationKey, ConversationView, DocumentStore, FeedConfig, FeedEvent,
    FeedState, LiveFeed, ManualClock, MemoryDocumentStore, Message, ParticipantId, Session,
    SqliteDocumentStore, StorageConfig,
};

/// SQLite database file removed when the test ends.
struct TempDb(PathBuf);

impl TempDb {
    fn new() -> Self {
        let file = format!("rehomebud_chat_{}.sqlite", uuid::Uuid::new_v4());
        Self(std::env::temp_dir().join(file))
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn pid(raw: &str) -> ParticipantId {
    ParticipantId::new(raw).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

struct Backend {
    name: &'static str,
    clock: Arc<ManualClock>,
    store: Arc<dyn DocumentStore>,
}

/// One memory and one SQLite store, each with its own clock starting at `start`.
async fn backends(db: &TempDb, start: DateTime<Utc>) -> Vec<Backend> {
    let config = StorageConfig {
        sqlite_path: db.0.clone(),
        ..StorageConfig::default()
    };

    let memory_clock = Arc::new(ManualClock::new(start));
    let memory: Arc<dyn DocumentStore> =
        Arc::new(MemoryDocumentStore::with_clock(memory_clock.clone()));

    let sqlite_clock = Arc::new(ManualClock::new(start));
    let sqlite: Arc<dyn DocumentStore> = Arc::new(
        SqliteDocumentStore::with_clock(&config, sqlite_clock.clone())
            .await
            .unwrap(),
    );

    vec![
        Backend {
            name: "memory",
            clock: memory_clock,
            store: memory,
        },
        Backend {
            name: "sqlite",
            clock: sqlite_clock,
            store: sqlite,
        },
    ]
}

fn service(store: Arc<dyn DocumentStore>) -> ChatService {
    ChatService::new(store, FeedConfig::default()).unwrap()
}

async fn next_snapshot(feed: &mut LiveFeed) -> Arc<[Message]> {
    loop {
        let event = timeout(Duration::from_secs(5), feed.next_event())
            .await
            .expect("feed timed out")
            .expect("feed closed");
        if let FeedEvent::Snapshot(messages) = event {
            return messages;
        }
    }
}

/// Wait until the feed delivers a snapshot of `len` messages.
async fn snapshot_of_len(feed: &mut LiveFeed, len: usize) -> Arc<[Message]> {
    loop {
        let messages = next_snapshot(feed).await;
        if messages.len() == len {
            return messages;
        }
    }
}

fn texts(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.text.as_str()).collect()
}

#[tokio::test]
async fn test_user_a_user_b_scenario() {
    let db = TempDb::new();

    for Backend { name, clock, store } in backends(&db, at(0)).await {
        let chat = service(store.clone());
        let a = Session::new(pid("user_A"));
        let b = Session::new(pid("user_B"));

        let key = ChatService::conversation_key(&a, b.principal());
        assert_eq!(key, ChatService::conversation_key(&b, a.principal()));
        assert_eq!(key.as_str(), "user_A_user_B", "{name}");

        clock.advance(chrono::Duration::seconds(1));
        chat.send_as(&a, b.principal(), "hi").await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        chat.send_as(&b, a.principal(), "there").await.unwrap();

        let mut feed = chat.subscribe(&key);
        let messages = next_snapshot(&mut feed).await;
        assert_eq!(texts(&messages), ["hi", "there"], "{name}");
        assert_eq!(messages[0].sender, pid("user_A"));
        assert_eq!(messages[1].sender, pid("user_B"));

        let summary = store.get_summary(key.clone()).await.unwrap().unwrap();
        assert_eq!(summary.last_message, "there", "{name}");
        assert!(summary.includes(&pid("user_A")) && summary.includes(&pid("user_B")));
    }
}

#[tokio::test]
async fn test_feed_orders_by_backend_time_not_issue_order() {
    let db = TempDb::new();

    for Backend { name, clock, store } in backends(&db, at(0)).await {
        let chat = service(store);
        let me = Session::new(pid("alice"));
        let other = pid("bob");
        let key = ChatService::conversation_key(&me, &other);

        for (secs, text) in [(30, "third"), (10, "first"), (20, "second")] {
            clock.set(at(secs));
            chat.send_as(&me, &other, text).await.unwrap();
        }

        let mut feed = chat.subscribe(&key);
        let messages = next_snapshot(&mut feed).await;
        assert_eq!(texts(&messages), ["first", "second", "third"], "{name}");

        let history = chat.history(&key).await.unwrap();
        assert_eq!(texts(&history), ["first", "second", "third"], "{name}");
    }
}

#[tokio::test]
async fn test_equal_timestamps_keep_insertion_order() {
    let db = TempDb::new();

    for Backend { name, store, .. } in backends(&db, at(5)).await {
        let chat = service(store);
        let me = Session::new(pid("alice"));
        let other = pid("bob");

        for text in ["one", "two", "three"] {
            chat.send_as(&me, &other, text).await.unwrap();
        }

        let history = chat
            .history(&ChatService::conversation_key(&me, &other))
            .await
            .unwrap();
        assert_eq!(texts(&history), ["one", "two", "three"], "{name}");
    }
}

#[tokio::test]
async fn test_two_sends_create_one_summary() {
    let db = TempDb::new();

    for Backend { name, clock, store } in backends(&db, at(0)).await {
        let chat = service(store.clone());
        let me = Session::new(pid("alice"));
        let other = pid("bob");

        chat.send_as(&me, &other, "hello").await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        chat.send_as(&me, &other, "again").await.unwrap();

        let summaries = chat.conversations(&me).await.unwrap();
        assert_eq!(summaries.len(), 1, "{name}");
        assert_eq!(summaries[0].last_message, "again");
        assert_eq!(summaries[0].updated_at, at(1));

        let key = ChatService::conversation_key(&me, &other);
        assert_eq!(store.list_messages(key).await.unwrap().len(), 2, "{name}");
    }
}

#[tokio::test]
async fn test_blank_send_leaves_conversation_untouched() {
    let db = TempDb::new();

    for Backend { name, clock, store } in backends(&db, at(0)).await {
        let chat = service(store.clone());
        let me = Session::new(pid("alice"));
        let other = pid("bob");
        let key = ChatService::conversation_key(&me, &other);

        assert!(chat.send_as(&me, &other, "   ").await.unwrap().is_none());
        assert!(store.get_summary(key.clone()).await.unwrap().is_none(), "{name}");

        chat.send_as(&me, &other, "real").await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        assert!(chat.send_as(&me, &other, "\t\n").await.unwrap().is_none());

        let summary = store.get_summary(key.clone()).await.unwrap().unwrap();
        assert_eq!(summary.last_message, "real", "{name}");
        assert_eq!(summary.updated_at, at(0));
        assert_eq!(store.list_messages(key).await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn test_live_feed_delivers_full_snapshot_per_change() {
    let db = TempDb::new();

    for Backend { name, clock, store } in backends(&db, at(0)).await {
        let chat = service(store);
        let a = Session::new(pid("user_A"));
        let b = Session::new(pid("user_B"));
        let key = ChatService::conversation_key(&a, b.principal());

        let mut feed = chat.subscribe(&key);
        assert!(next_snapshot(&mut feed).await.is_empty(), "{name}");
        assert_eq!(feed.state(), FeedState::Live);

        chat.send_as(&a, b.principal(), "hi").await.unwrap();
        let first = snapshot_of_len(&mut feed, 1).await;
        assert_eq!(texts(&first), ["hi"], "{name}");

        clock.advance(chrono::Duration::seconds(1));
        chat.send_as(&b, a.principal(), "there").await.unwrap();
        let second = snapshot_of_len(&mut feed, 2).await;
        assert_eq!(texts(&second), ["hi", "there"], "{name}");

        feed.cancel();
        assert_eq!(feed.state(), FeedState::Unsubscribed);
        assert!(feed.next_event().await.is_none());
    }
}

#[tokio::test]
async fn test_concurrent_first_sends_share_one_summary() {
    let db = TempDb::new();

    for Backend { name, store, .. } in backends(&db, at(0)).await {
        let chat = service(store.clone());
        let alice = pid("alice");
        let bob = pid("bob");
        let key = ConversationKey::derive(&alice, &bob);

        let (from_alice, from_bob) = tokio::join!(
            chat.send(&key, &alice, &bob, &alice, "hi bob"),
            chat.send(&key, &bob, &alice, &bob, "hi alice"),
        );
        from_alice.unwrap().unwrap();
        from_bob.unwrap().unwrap();

        let summaries = chat.conversations(&Session::new(alice.clone())).await.unwrap();
        assert_eq!(summaries.len(), 1, "{name}");
        let participants = &summaries[0].participants;
        assert!(
            participants == &[alice.clone(), bob.clone()]
                || participants == &[bob.clone(), alice.clone()],
            "{name}: {participants:?}"
        );
        assert_eq!(chat.conversations(&Session::new(bob.clone())).await.unwrap().len(), 1);
        assert_eq!(store.list_messages(key).await.unwrap().len(), 2, "{name}");
    }
}

#[tokio::test]
async fn test_conversations_are_isolated() {
    let db = TempDb::new();

    for Backend { name, clock, store } in backends(&db, at(0)).await {
        let chat = service(store);
        let alice = Session::new(pid("alice"));

        chat.send_as(&alice, &pid("bob"), "to bob").await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        chat.send_as(&alice, &pid("carol"), "to carol").await.unwrap();

        let with_bob = chat
            .history(&ConversationKey::derive(&pid("alice"), &pid("bob")))
            .await
            .unwrap();
        assert_eq!(texts(&with_bob), ["to bob"], "{name}");

        let listed = chat.conversations(&alice).await.unwrap();
        let previews: Vec<&str> = listed.iter().map(|s| s.last_message.as_str()).collect();
        assert_eq!(previews, ["to carol", "to bob"], "{name}");

        let bob = Session::new(pid("bob"));
        assert_eq!(chat.conversations(&bob).await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn test_conversation_view_round_trip() {
    let db = TempDb::new();

    for Backend { name, store, .. } in backends(&db, at(0)).await {
        let chat = service(store);
        let mut mine = ConversationView::open(&chat, Session::new(pid("user_A")), pid("user_B"));
        let mut theirs =
            ConversationView::open(&chat, Session::new(pid("user_B")), pid("user_A"));
        assert_eq!(mine.key(), theirs.key());

        mine.set_draft("hi");
        mine.submit().await.unwrap();
        assert_eq!(mine.draft(), "", "{name}");

        while theirs.messages().is_empty() {
            timeout(Duration::from_secs(5), theirs.next_event())
                .await
                .expect("view timed out")
                .expect("view closed");
        }
        assert_eq!(theirs.messages()[0].text, "hi", "{name}");
        assert!(!theirs.is_mine(&theirs.messages()[0]));

        mine.close();
        theirs.close();
        assert_eq!(theirs.state(), FeedState::Unsubscribed);
    }
}

#[tokio::test]
async fn test_sqlite_survives_reopen() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let db = TempDb::new();
    let config = StorageConfig {
        sqlite_path: db.0.clone(),
        ..StorageConfig::default()
    };
    let me = Session::new(pid("alice"));
    let other = pid("bob");

    {
        let store = SqliteDocumentStore::with_clock(&config, clock.clone())
            .await
            .unwrap();
        service(Arc::new(store))
            .send_as(&me, &other, "persisted")
            .await
            .unwrap();
    }

    let reopened = service(Arc::new(SqliteDocumentStore::new(&config).await.unwrap()));
    let history = reopened
        .history(&ChatService::conversation_key(&me, &other))
        .await
        .unwrap();
    assert_eq!(texts(&history), ["persisted"]);
    assert_eq!(history[0].created_at, at(0));
}
