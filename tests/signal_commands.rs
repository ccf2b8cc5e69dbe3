//! Signal command tests
//!
//! Drives the signal plugins through a session against the in-memory
//! platform and checks delivery order, de-duplication across fetches and
//! the fetch throttle.

use shimkit::platform::{MemoryPlatform, Platform};
use shimkit::runtime::{
    ApiError, ApiErrorCode, RuntimeConfig, Script, Session, Value, Variables,
};
use shimkit::signal::{SignalChannel, Throttle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn session(platform: &Arc<MemoryPlatform>) -> Session {
    Session::builder(Platform::from_shared(Arc::clone(platform)))
        .config(RuntimeConfig {
            variable_count: 40,
            ..RuntimeConfig::default()
        })
        .throttle(Arc::new(Throttle::new(Duration::from_secs(10))))
        .build()
        .expect("session")
}

fn var(variables: &Variables, id: usize) -> Value {
    variables.get(variables.id(id).expect("variable id")).clone()
}

#[tokio::test(start_paused = true)]
async fn user_signals_drain_oldest_first_and_refetch_is_deduplicated() {
    let platform = Arc::new(MemoryPlatform::new(1, "me"));
    platform.push_signal(SignalChannel::User, 7, "alice", "hello");
    platform.advance_clock(100);
    platform.push_signal(SignalChannel::User, 8, "bob", 42_i64);
    platform.push_signal(SignalChannel::User, 9, "carol", "same-ts");

    let mut session = session(&platform);
    let script = Script::parse(
        "GetUserSignal 1 2 3 30\n\
         GetUserSignal 4 5 6 30\n\
         GetUserSignal 7 8 9 30\n\
         GetUserSignal 10 11 12 30",
    )
    .unwrap();
    session.run_script(&script).unwrap();

    let started = Instant::now();
    session.run_until_idle().await.unwrap();
    let vars = session.variables();

    assert_eq!(var(vars, 1), Value::from("hello"));
    assert_eq!(var(vars, 2), Value::Number(7));
    assert_eq!(var(vars, 3), Value::from("alice"));

    // Same timestamp: the later one in fetch order is the older position.
    assert_eq!(var(vars, 4), Value::from("same-ts"));
    assert_eq!(var(vars, 5), Value::Number(9));
    assert_eq!(var(vars, 7), Value::Number(42));
    assert_eq!(var(vars, 9), Value::from("bob"));

    // Fourth call refetches and finds nothing new.
    assert_eq!(var(vars, 10), Value::Number(0));
    assert_eq!(var(vars, 11), Value::Number(0));
    assert_eq!(var(vars, 12), Value::from(""));
    assert_eq!(var(vars, 30), Value::Number(0));

    assert_eq!(platform.fetch_count(SignalChannel::User), 2);
    assert!(Instant::now() - started >= Duration::from_secs(10));

    let store = session
        .state()
        .existing_signal_store(SignalChannel::User)
        .expect("store created");
    assert!(store.is_empty());
    let delivered: Vec<u64> = store.last_delivered().iter().map(|s| s.id).collect();
    assert_eq!(delivered, vec![3, 2]);
}

#[tokio::test(start_paused = true)]
async fn new_global_signal_after_delivery_is_picked_up_once() {
    let platform = Arc::new(MemoryPlatform::new(1, "me"));
    platform.push_signal(SignalChannel::Global, 5, "eve", "first");

    let mut session = session(&platform);
    session
        .run_script(&Script::parse("GetGlobalSignal 1 2 3").unwrap())
        .unwrap();
    session.run_until_idle().await.unwrap();
    assert_eq!(var(session.variables(), 1), Value::from("first"));

    platform.advance_clock(50);
    platform.push_signal(SignalChannel::Global, 6, "frank", "second");

    session
        .run_script(&Script::parse("グローバルシグナル取得 4 5 6\nGetGlobalSignal 7 8 9").unwrap())
        .unwrap();
    session.run_until_idle().await.unwrap();

    let vars = session.variables();
    assert_eq!(var(vars, 4), Value::from("second"));
    assert_eq!(var(vars, 6), Value::from("frank"));
    assert_eq!(var(vars, 7), Value::Number(0));
    assert_eq!(platform.fetch_count(SignalChannel::Global), 3);
}

#[tokio::test(start_paused = true)]
async fn boundary_aged_out_of_fetch_window_keeps_whole_batch() {
    let platform = Arc::new(MemoryPlatform::new(1, "me"));
    platform.push_signal(SignalChannel::Global, 5, "eve", "old");

    let mut session = session(&platform);
    session
        .run_script(&Script::parse("GetGlobalSignal 1 2 3").unwrap())
        .unwrap();
    session.run_until_idle().await.unwrap();

    platform.advance_clock(10);
    platform.push_signal(SignalChannel::Global, 6, "frank", "mid");
    platform.advance_clock(10);
    platform.push_signal(SignalChannel::Global, 7, "gina", "new");
    platform.set_fetch_window(Some(2));

    session
        .run_script(&Script::parse("GetGlobalSignal 4 5 6\nGetGlobalSignal 7 8 9").unwrap())
        .unwrap();
    session.run_until_idle().await.unwrap();

    let vars = session.variables();
    assert_eq!(var(vars, 4), Value::from("mid"));
    assert_eq!(var(vars, 7), Value::from("new"));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_fetch_reports_error_and_script_continues() {
    let platform = Arc::new(MemoryPlatform::new(1, "me"));
    platform.fail_next(ApiError::new(
        ApiErrorCode::ApiCallLimitExceeded,
        "too many requests",
    ));

    let mut session = session(&platform);
    session
        .run_script(&Script::parse("GetUserSignal 1 2 3 4\nSetVariable 5 done").unwrap())
        .unwrap();
    session.run_until_idle().await.unwrap();

    let vars = session.variables();
    assert_eq!(var(vars, 4), Value::from("too many requests"));
    assert_eq!(var(vars, 1), Value::Number(0));
    assert_eq!(var(vars, 5), Value::from("done"));
    assert!(session.main_interpreter().unwrap().is_completed());
}

#[tokio::test(start_paused = true)]
async fn sent_user_signal_reaches_recipient() {
    let platform = Arc::new(MemoryPlatform::new(3, "me"));
    let mut session = session(&platform);
    session
        .run_script(
            &Script::parse("SetVariable 1 8\nSetVariable 2 \"see you\"\nSendUserSignal 1 2 3")
                .unwrap(),
        )
        .unwrap();
    session.run_until_idle().await.unwrap();

    let inbox = platform.inbox(8);
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].data, Value::from("see you"));
    assert_eq!(inbox[0].sender_id, 3);
    assert_eq!(var(session.variables(), 3), Value::Number(0));
}

#[test]
fn process_wide_throttle_is_shared() {
    let a = Throttle::signal_fetch();
    let b = Throttle::signal_fetch();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.interval(), Duration::from_secs(10));
}
