//! Transport fallback through the agent.

use std::cell::RefCell;
use std::rc::Rc;

use updog_agent::{
    Agent, Config, DeliveryOutcome, PageviewEvent, TransportError, TransportKind,
    REQUEST_CONTENT_TYPE,
};
use updog_mock::{Capabilities, Faults, MockHost, Sent};

const ENDPOINT: &str = "https://x.test/view";

fn agent(host: &MockHost) -> Agent<MockHost> {
    Agent::new(host.clone(), Config::with_endpoint(ENDPOINT))
}

fn event() -> PageviewEvent {
    PageviewEvent::new("a.com", "/p", "https://r.test/")
}

#[test]
fn beacon_wins_when_available() {
    let host = MockHost::default();
    let report = agent(&host).deliver(&event());

    assert_eq!(report.outcome, DeliveryOutcome::Delivered(TransportKind::Beacon));
    assert!(report.failures.is_empty());
    assert_eq!(
        host.sent(),
        vec![Sent::Beacon {
            url: ENDPOINT.into(),
            body: r#"{"domain":"a.com","path":"/p","ref":"https://r.test/"}"#.into(),
        }]
    );
}

/// The first available strategy is chosen in Beacon > Request > Pixel order.
#[test]
fn first_available_transport_is_selected() {
    let cases = [
        (true, true, TransportKind::Beacon),
        (true, false, TransportKind::Beacon),
        (false, true, TransportKind::Request),
        (false, false, TransportKind::Pixel),
    ];

    for (beacon, request, expected) in cases {
        let host = MockHost::default().with_capabilities(Capabilities {
            beacon,
            request,
            pixel: true,
        });
        let report = agent(&host).deliver(&event());

        assert_eq!(
            report.outcome,
            DeliveryOutcome::Delivered(expected),
            "beacon={beacon} request={request}"
        );
        assert_eq!(host.attempts(), vec![expected]);
        assert_eq!(host.sent().len(), 1);
    }
}

#[test]
fn request_posts_text_plain_json() {
    let host = MockHost::default().with_capabilities(Capabilities {
        beacon: false,
        request: true,
        pixel: true,
    });
    agent(&host).deliver(&event());

    match host.sent().as_slice() {
        [Sent::Request {
            url,
            body,
            content_type,
        }] => {
            assert_eq!(url, ENDPOINT);
            assert_eq!(content_type, REQUEST_CONTENT_TYPE);
            let parsed: PageviewEvent = serde_json::from_str(body).unwrap();
            assert_eq!(parsed, event());
        }
        other => panic!("expected one request, got {other:?}"),
    }
}

#[test]
fn refused_beacon_falls_through_to_request() {
    let host = MockHost::default().with_faults(Faults {
        beacon_refuses: true,
        ..Faults::default()
    });
    let report = agent(&host).deliver(&event());

    assert_eq!(report.outcome, DeliveryOutcome::Delivered(TransportKind::Request));
    assert_eq!(host.attempts(), vec![TransportKind::Beacon, TransportKind::Request]);
    assert!(matches!(
        report.failures.as_slice(),
        [TransportError::Rejected {
            kind: TransportKind::Beacon,
            ..
        }]
    ));
}

#[test]
fn throwing_beacon_and_request_fall_through_to_pixel() {
    let host = MockHost::default().with_faults(Faults {
        beacon_throws: true,
        request_throws: true,
        ..Faults::default()
    });
    let report = agent(&host).deliver(&event());

    assert_eq!(report.outcome, DeliveryOutcome::Delivered(TransportKind::Pixel));
    assert_eq!(
        host.attempts(),
        vec![
            TransportKind::Beacon,
            TransportKind::Request,
            TransportKind::Pixel
        ]
    );
    assert_eq!(host.sent().len(), 1);
}

#[test]
fn exhausted_chain_drops_event_and_notifies_hook_once() {
    let host = MockHost::default().with_faults(Faults {
        beacon_throws: true,
        request_throws: true,
        image_throws: true,
        ..Faults::default()
    });
    let agent = agent(&host);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    agent.set_failure_hook(move |event, failures| {
        sink.borrow_mut().push((event.clone(), failures.len()));
    });

    let report = agent.deliver(&event());

    assert_eq!(report.outcome, DeliveryOutcome::Failed);
    assert_eq!(report.failures.len(), 3);
    assert!(host.sent().is_empty());
    assert_eq!(*seen.borrow(), vec![(event(), 3)]);
}

#[test]
fn no_capabilities_means_no_attempts() {
    let host = MockHost::default().with_capabilities(Capabilities::NONE);
    let report = agent(&host).deliver(&event());

    assert_eq!(report.outcome, DeliveryOutcome::Failed);
    assert!(host.attempts().is_empty());
    assert_eq!(
        report.failures.as_slice(),
        [
            TransportError::Unavailable(TransportKind::Beacon),
            TransportError::Unavailable(TransportKind::Request),
            TransportError::Unavailable(TransportKind::Pixel),
        ]
    );
}

#[test]
fn delivered_event_does_not_call_failure_hook() {
    let host = MockHost::default();
    let agent = agent(&host);
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    agent.set_failure_hook(move |_, _| *counter.borrow_mut() += 1);

    assert!(agent.deliver(&event()).outcome.is_delivered());
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn config_can_disable_transports_without_reordering() {
    let host = MockHost::default();
    let mut config = Config::with_endpoint(ENDPOINT);
    config.transports = Some(vec![TransportKind::Pixel, TransportKind::Request]);
    let agent = Agent::new(host.clone(), config);

    let report = agent.deliver(&event());

    assert_eq!(report.outcome, DeliveryOutcome::Delivered(TransportKind::Request));
    assert_eq!(
        report.failures.as_slice(),
        [TransportError::Disabled(TransportKind::Beacon)]
    );
    assert_eq!(host.attempts(), vec![TransportKind::Request]);
}
