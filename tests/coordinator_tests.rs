use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xenia_coffee::{
    Coordinator, CoordinatorBuilder, ErrorKind, Event, Phase, RefreshOutcome, StatusLabel,
    XeniaClient,
};

fn builder_for(server: &MockServer) -> CoordinatorBuilder {
    let addr = server.address();
    let client = XeniaClient::builder(format!("{}:{}", addr.ip(), addr.port()))
        .build()
        .expect("client should build");
    // No timer unless a test asks for one.
    Coordinator::builder(Arc::new(client))
        .update_interval(Duration::ZERO)
        .refresh_delay(Duration::ZERO)
}

async fn status_gets(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET" && r.url.path() == "/api/v2/overview")
        .count()
}

async fn mount_status(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn start_populates_snapshot_from_first_refresh() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        json!({"MA_STATUS": 2, "BG_SENS_TEMP_A": 94.1, "BB_SENS_TEMP_A": 101.3}),
    )
    .await;

    let coordinator = builder_for(&server).start().await.unwrap();
    let snapshot = coordinator.snapshot();

    assert!(!snapshot.state.is_on);
    assert_eq!(snapshot.state.status, StatusLabel::Eco);
    assert_eq!(snapshot.state.group_temperature.unwrap().celsius(), 94.1);
    assert_eq!(snapshot.state.boiler_temperature.unwrap().celsius(), 101.3);
    assert!(snapshot.last_error.is_none());
    assert_eq!(coordinator.phase(), Phase::Ready);
}

#[tokio::test]
async fn first_refresh_401_fails_start_with_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = builder_for(&server).start().await.err().expect("start should fail");
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn first_refresh_network_failure_fails_start() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = XeniaClient::builder(format!("127.0.0.1:{port}")).build().unwrap();

    let err = Coordinator::builder(Arc::new(client))
        .start()
        .await
        .err()
        .expect("start should fail");
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn failed_refresh_keeps_last_good_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"MA_STATUS": 1, "BB_SENS_TEMP_A": 92.5})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let coordinator = builder_for(&server).start().await.unwrap();
    let before = coordinator.snapshot();

    let err = coordinator.scheduled_refresh().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Http);

    let after = coordinator.snapshot();
    assert_eq!(after.state.boiler_temperature.unwrap().celsius(), 92.5);
    assert!(after.state.is_on);
    assert_eq!(after.last_updated, before.last_updated);
    let last_error = after.last_error.as_ref().expect("last_error should be set");
    assert_eq!(last_error.kind, ErrorKind::Http);
    assert_eq!(coordinator.phase(), Phase::Failed);
}

#[tokio::test]
async fn success_after_failure_clears_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MA_STATUS": 0})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_status(&server, json!({"MA_STATUS": 1})).await;

    let coordinator = builder_for(&server).start().await.unwrap();
    assert!(coordinator.scheduled_refresh().await.is_err());
    assert!(coordinator.snapshot().last_error.is_some());

    let outcome = coordinator.scheduled_refresh().await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Updated);
    let snapshot = coordinator.snapshot();
    assert!(snapshot.last_error.is_none());
    assert!(snapshot.state.is_on);
    assert_eq!(coordinator.phase(), Phase::Ready);
}

#[tokio::test]
async fn concurrent_refreshes_issue_a_single_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"MA_STATUS": 1}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let coordinator = builder_for(&server).start().await.unwrap();
    assert_eq!(status_gets(&server).await, 1);

    let (scheduled, requested) =
        tokio::join!(coordinator.scheduled_refresh(), coordinator.request_refresh());

    let mut outcomes = vec![scheduled.unwrap(), requested.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, RefreshOutcome::Coalesced));
    assert_eq!(outcomes, vec![RefreshOutcome::Updated, RefreshOutcome::Coalesced]);
    assert_eq!(status_gets(&server).await, 2);
}

#[tokio::test]
async fn request_refresh_waits_before_polling() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"MA_STATUS": 0})).await;

    let delay = Duration::from_millis(250);
    let coordinator = builder_for(&server).refresh_delay(delay).start().await.unwrap();

    let started = std::time::Instant::now();
    let outcome = coordinator.request_refresh().await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Updated);
    assert!(started.elapsed() >= delay);
    assert_eq!(status_gets(&server).await, 2);
}

#[tokio::test]
async fn events_and_snapshots_fan_out_per_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"MA_STATUS": 0, "BB_SENS_TEMP_A": 25.0})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"MA_STATUS": 1, "BB_SENS_TEMP_A": 25.0})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(vec![]));
    let snapshots = Arc::new(Mutex::new(0usize));
    let events_clone = events.clone();
    let snapshots_clone = snapshots.clone();

    let coordinator = builder_for(&server)
        .on_event(move |event| events_clone.lock().unwrap().push(event.clone()))
        .on_snapshot(move |_| *snapshots_clone.lock().unwrap() += 1)
        .start()
        .await
        .unwrap();

    assert!(events.lock().unwrap().is_empty(), "no change events on first refresh");
    assert_eq!(*snapshots.lock().unwrap(), 1);

    coordinator.scheduled_refresh().await.unwrap();
    {
        let captured = events.lock().unwrap();
        assert_eq!(
            *captured,
            vec![
                Event::PowerChanged { on: true },
                Event::StatusChanged {
                    status: StatusLabel::On
                },
            ]
        );
    }
    assert_eq!(*snapshots.lock().unwrap(), 2);

    let err = coordinator.scheduled_refresh().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    {
        let captured = events.lock().unwrap();
        assert!(matches!(
            captured[2],
            Event::RefreshFailed {
                kind: ErrorKind::Auth,
                ..
            }
        ));
        assert_eq!(captured[3], Event::ReauthRequired);
    }
    assert_eq!(*snapshots.lock().unwrap(), 3);
    assert!(coordinator.snapshot().state.is_on);
}

#[tokio::test]
async fn subscribers_see_each_completed_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MA_STATUS": 0})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_status(&server, json!({"MA_STATUS": 2})).await;

    let coordinator = builder_for(&server).start().await.unwrap();
    let mut rx = coordinator.subscribe();
    assert_eq!(rx.borrow_and_update().state.status, StatusLabel::Off);

    coordinator.scheduled_refresh().await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().state.status, StatusLabel::Eco);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn timer_refreshes_periodically_until_shutdown() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"MA_STATUS": 1})).await;

    let coordinator = builder_for(&server)
        .update_interval(Duration::from_millis(100))
        .start()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(450)).await;
    let polled = status_gets(&server).await;
    assert!(polled >= 3, "expected periodic polls, saw {polled}");

    assert!(coordinator.shutdown().await);
    assert!(!coordinator.shutdown().await, "second shutdown is a no-op");

    let after_shutdown = status_gets(&server).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(status_gets(&server).await, after_shutdown);
}
