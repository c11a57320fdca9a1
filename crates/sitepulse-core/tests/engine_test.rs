// Engine behavior through the public API: ingestion, pending-selection
// promotion, and the sharing guard, driven via apply_event the same way
// the stream bridge drives it.

use chrono::{Duration, TimeZone, Utc};
use url::Url;

use sitepulse_core::{
    ConnectionState, CoreError, DateRange, Engine, EngineConfig, MutationOutcome, PerfMetrics,
    SelectOutcome, ShareAction, ShareKind, SharingMode, SiteEvent, SiteId, TrafficMetrics,
    ViewFilters,
};

fn engine() -> Engine {
    let url = Url::parse("ws://127.0.0.1:1/metrics").expect("static url");
    Engine::new(EngineConfig::new(url))
}

fn event(site: &str, offset_secs: i64) -> SiteEvent {
    let base = Utc
        .with_ymd_and_hms(2026, 2, 10, 12, 0, 0)
        .single()
        .expect("static timestamp");
    SiteEvent {
        timestamp: base + Duration::seconds(offset_secs),
        site_id: SiteId::from(site),
        site_name: format!("{site} name"),
        metrics: TrafficMetrics {
            page_views: 12,
            unique_visitors: 5,
            bounce_rate: 0.4,
            avg_session_secs: 45.0,
        },
        performance: PerfMetrics::default(),
        top_paths: Vec::new(),
        transitions: Vec::new(),
    }
}

#[tokio::test]
async fn selection_before_first_event_promotes_on_arrival() {
    let engine = engine();
    engine.apply_event(event("site_1", 0));
    engine.select_site(SiteId::from("site_1"));

    // The user asks for a site the stream has not mentioned yet.
    let outcome = engine.select_site(SiteId::from("site_9"));
    assert_eq!(outcome, SelectOutcome::Pending);

    // Still showing the last valid site.
    let view = engine.view_state();
    assert_eq!(view.selection.confirmed, Some(SiteId::from("site_1")));
    assert_eq!(view.selection.pending, Some(SiteId::from("site_9")));

    // One event for the awaited site flips the selection.
    engine.apply_event(event("site_9", 1));

    let view = engine.view_state();
    assert_eq!(view.selection.confirmed, Some(SiteId::from("site_9")));
    assert_eq!(view.selection.pending, None);
}

#[tokio::test]
async fn selection_of_known_site_confirms_immediately() {
    let engine = engine();
    engine.apply_event(event("site_1", 0));

    assert_eq!(
        engine.select_site(SiteId::from("site_1")),
        SelectOutcome::Confirmed
    );
    assert_eq!(
        engine.view_state().selection.confirmed,
        Some(SiteId::from("site_1"))
    );
}

#[tokio::test]
async fn unrelated_events_do_not_touch_a_pending_selection() {
    let engine = engine();
    engine.select_site(SiteId::from("site_9"));

    engine.apply_event(event("site_1", 0));
    engine.apply_event(event("site_2", 1));

    let view = engine.view_state();
    assert_eq!(view.selection.confirmed, None);
    assert_eq!(view.selection.pending, Some(SiteId::from("site_9")));
}

#[tokio::test]
async fn public_share_session_restores_host_state_on_exit() {
    let engine = engine();
    engine.apply_event(event("site_1", 0));
    engine.apply_event(event("site_2", 1));

    engine.select_site(SiteId::from("site_1"));
    engine.set_filters(ViewFilters {
        path_query: Some("/pricing".into()),
        min_page_views: Some(5),
    });
    engine.set_date_range(DateRange {
        start: Utc
            .with_ymd_and_hms(2026, 2, 1, 0, 0, 0)
            .single()
            .expect("static timestamp"),
        end: Utc
            .with_ymd_and_hms(2026, 2, 10, 0, 0, 0)
            .single()
            .expect("static timestamp"),
    });
    let host_view = engine.view_state();

    engine.enter_shared(ShareKind::Public);
    assert_eq!(
        engine.sharing_mode(),
        SharingMode::Shared {
            kind: ShareKind::Public
        }
    );

    // Everything a public viewer tries is a silent no-op.
    assert_eq!(
        engine.select_site(SiteId::from("site_2")),
        SelectOutcome::Denied
    );
    assert_eq!(
        engine.set_filters(ViewFilters::default()),
        MutationOutcome::Denied
    );
    assert_eq!(engine.clear_selection(), MutationOutcome::Denied);
    assert!(!engine.check_permission(ShareAction::Export));
    assert_eq!(engine.view_state(), host_view);

    // Events keep flowing while shared.
    engine.apply_event(event("site_1", 2));

    engine.exit_shared();
    assert_eq!(engine.sharing_mode(), SharingMode::Normal);
    assert_eq!(engine.view_state(), host_view);
    assert!(engine.check_permission(ShareAction::Export));
}

#[tokio::test]
async fn member_share_session_can_navigate_but_exit_still_restores() {
    let engine = engine();
    engine.apply_event(event("site_1", 0));
    engine.apply_event(event("site_2", 1));
    engine.select_site(SiteId::from("site_1"));
    let host_view = engine.view_state();

    engine.enter_shared(ShareKind::Member);
    assert_eq!(
        engine.select_site(SiteId::from("site_2")),
        SelectOutcome::Confirmed
    );
    assert_ne!(engine.view_state(), host_view);

    engine.exit_shared();
    assert_eq!(engine.view_state(), host_view);
}

#[tokio::test]
async fn event_cap_is_honored_through_the_engine() {
    let url = Url::parse("ws://127.0.0.1:1/metrics").expect("static url");
    let mut config = EngineConfig::new(url);
    config.event_cap = 5;
    let engine = Engine::new(config);

    for i in 0..8 {
        engine.apply_event(event("site_1", i));
    }

    let snap = engine
        .store()
        .site_snapshot(&SiteId::from("site_1"))
        .expect("site exists");
    assert_eq!(snap.events.len(), 5);
}

#[tokio::test]
async fn connect_rejects_non_websocket_url_without_side_effects() {
    let url = Url::parse("https://dashboard.example.com/metrics").expect("static url");
    let engine = Engine::new(EngineConfig::new(url));

    let err = engine
        .connect()
        .await
        .expect_err("http scheme must be rejected");
    assert!(matches!(err, CoreError::Config { .. }));

    // Nothing was spawned or torn down.
    assert_eq!(*engine.connection_state().borrow(), ConnectionState::Idle);
}

#[tokio::test]
async fn connect_then_disconnect_tears_down_cleanly() {
    // Port 1 refuses connections; the engine still starts its loop and
    // disconnect must cancel the pending reconnect and join every task.
    let engine = engine();
    engine.connect().await.expect("ws scheme is accepted");
    engine.disconnect().await;

    assert_eq!(
        *engine.connection_state().borrow(),
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn connection_state_starts_idle_and_disconnect_is_safe_unconnected() {
    let engine = engine();
    assert_eq!(*engine.connection_state().borrow(), ConnectionState::Idle);

    // Never connected; teardown must still be a clean no-op.
    engine.disconnect().await;
    assert_eq!(
        *engine.connection_state().borrow(),
        ConnectionState::Disconnected
    );
}
