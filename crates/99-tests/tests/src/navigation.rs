//! Navigation watcher: initial load, pushState interception and popstate.

use std::rc::Rc;

use updog_agent::{Agent, AgentError, Config, HostError, PageviewEvent, ReadyState};
use updog_mock::{Faults, MockHost, Sent};

fn started(host: &MockHost) -> Rc<Agent<MockHost>> {
    let agent = Rc::new(Agent::new(host.clone(), Config::default()));
    agent.start().expect("start agent");
    agent
}

fn sent_paths(host: &MockHost) -> Vec<String> {
    host.sent()
        .iter()
        .filter_map(Sent::body)
        .map(|body| serde_json::from_str::<PageviewEvent>(body).unwrap().path)
        .collect()
}

#[test]
fn loaded_document_reports_immediately() {
    let host = MockHost::new("example.com", "/landing");
    let _agent = started(&host);

    assert_eq!(sent_paths(&host), ["/landing"]);
    assert_eq!(host.pending_load_hooks(), 0);
}

#[test]
fn loading_document_waits_for_load_signal_once() {
    let host = MockHost::default().with_ready_state(ReadyState::Interactive);
    let _agent = started(&host);

    assert!(host.sent().is_empty());
    assert_eq!(host.pending_load_hooks(), 1);

    host.fire_load();
    host.fire_load();
    assert_eq!(host.sent().len(), 1);
}

#[test]
fn untouched_page_sends_exactly_one_event() {
    let host = MockHost::default();
    let _agent = started(&host);
    assert_eq!(host.sent().len(), 1);
}

/// Every pushState call is forwarded once and produces one delivery attempt.
#[test]
fn each_push_state_forwards_then_reports() {
    let host = MockHost::default();
    let _agent = started(&host);
    host.take_sent();

    for url in ["/a", "/b", "/b", "/c"] {
        host.push_state(url).unwrap();
    }

    assert_eq!(host.history(), ["/a", "/b", "/b", "/c"]);
    assert_eq!(sent_paths(&host), ["/a", "/b", "/b", "/c"]);
}

#[test]
fn push_state_is_forwarded_even_when_delivery_fails() {
    let host = MockHost::default();
    let _agent = started(&host);
    host.set_faults(Faults {
        beacon_throws: true,
        request_throws: true,
        image_throws: true,
        ..Faults::default()
    });
    let before = host.attempts().len();

    host.push_state("/x").unwrap();
    host.push_state("/y").unwrap();

    assert_eq!(host.history(), ["/x", "/y"]);
    // Three strategies tried per navigation, nothing retried.
    assert_eq!(host.attempts().len() - before, 6);
}

#[test]
fn throwing_push_state_propagates_and_reports_nothing() {
    let host = MockHost::default();
    let _agent = started(&host);
    host.take_sent();
    host.set_faults(Faults {
        push_state_throws: true,
        ..Faults::default()
    });

    assert!(host.push_state("/denied").is_err());
    assert!(host.sent().is_empty());
}

#[test]
fn every_pop_state_reports_without_debounce() {
    let host = MockHost::default();
    let _agent = started(&host);
    host.take_sent();

    host.pop_state("/back");
    host.pop_state("/back");
    host.pop_state("/forward");

    assert_eq!(sent_paths(&host), ["/back", "/back", "/forward"]);
}

#[test]
fn event_reads_page_at_send_time() {
    let host = MockHost::default().with_referrer("https://search.test/");
    let _agent = started(&host);
    host.take_sent();

    host.push_state("/after").unwrap();

    let body = host.sent()[0].body().unwrap().to_owned();
    let event: PageviewEvent = serde_json::from_str(&body).unwrap();
    assert_eq!(
        event,
        PageviewEvent::new("example.com", "/after", "https://search.test/")
    );
}

#[test]
fn second_watch_is_rejected_and_registers_nothing() {
    let host = MockHost::default();
    let agent = started(&host);

    assert_eq!(
        agent.watch(),
        Err(AgentError::AlreadyInstalled("navigation watcher"))
    );
    assert_eq!(host.pop_hooks(), 1);

    host.take_sent();
    host.push_state("/once").unwrap();
    assert_eq!(host.sent().len(), 1);
}

#[test]
fn second_agent_cannot_rewrap_push_state() {
    let host = MockHost::default();
    let _first = started(&host);

    let second = Rc::new(Agent::new(host.clone(), Config::default()));
    assert_eq!(
        second.start(),
        Err(AgentError::Host(HostError::AlreadyPatched))
    );

    host.take_sent();
    host.push_state("/single").unwrap();
    assert_eq!(host.sent().len(), 1);
}

#[test]
fn dropped_agent_stops_reporting() {
    let host = MockHost::default();
    let agent = started(&host);
    host.take_sent();
    drop(agent);

    host.push_state("/gone").unwrap();
    host.pop_state("/gone-too");

    assert_eq!(host.history(), ["/gone"]);
    assert!(host.sent().is_empty());
}
