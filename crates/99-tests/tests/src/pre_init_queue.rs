//! Commands pushed before the agent attaches, and the switch to direct dispatch.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use updog_agent::{
    Agent, AgentError, Command, CommandError, Config, PageviewEvent, PushOutcome, DEFAULT_ENDPOINT,
};
use updog_mock::{MockHost, Sent};

fn commands(values: &[serde_json::Value]) -> Vec<Command> {
    values
        .iter()
        .map(|value| Command::from_value(value).unwrap())
        .collect()
}

fn beacon_event(sent: &Sent) -> (String, PageviewEvent) {
    let body = sent.body().expect("beacon carries a body");
    (sent.url().to_owned(), serde_json::from_str(body).unwrap())
}

#[test]
fn buffered_config_applies_before_buffered_pageview() {
    let host = MockHost::new("site.test", "/ignored");
    let pending = commands(&[
        json!(["config", { "endpoint": "https://e2.test/view" }]),
        json!(["pageview", { "domain": "d", "path": "/", "ref": "" }]),
    ]);
    let agent = Agent::with_pending(host.clone(), Config::default(), pending);

    assert_eq!(agent.install_queue(), Ok(2));

    let sent: Vec<_> = host.sent().iter().map(beacon_event).collect();
    assert_eq!(
        sent,
        vec![(
            "https://e2.test/view".to_owned(),
            PageviewEvent::new("d", "/", "")
        )]
    );
}

#[test]
fn drain_preserves_push_order() {
    let host = MockHost::default();
    let pending = commands(&[
        json!(["pageview", { "path": "/1" }]),
        json!(["config", { "endpoint": "https://second.test/view" }]),
        json!(["pageview", { "path": "/2" }]),
        json!(["pageview", { "path": "/3" }]),
    ]);
    let agent = Agent::with_pending(host.clone(), Config::default(), pending);
    agent.install_queue().unwrap();

    let sent: Vec<_> = host
        .sent()
        .iter()
        .map(beacon_event)
        .map(|(url, event)| (url, event.path))
        .collect();
    assert_eq!(
        sent,
        vec![
            (DEFAULT_ENDPOINT.to_owned(), "/1".to_owned()),
            ("https://second.test/view".to_owned(), "/2".to_owned()),
            ("https://second.test/view".to_owned(), "/3".to_owned()),
        ]
    );
}

#[test]
fn pushes_buffer_until_install_then_dispatch_directly() {
    let host = MockHost::default();
    let agent = Agent::new(host.clone(), Config::default());

    assert_eq!(agent.push(Command::pageview()), PushOutcome::Buffered);
    assert_eq!(agent.buffered_len(), 1);
    assert!(host.sent().is_empty());

    agent.install_queue().unwrap();
    assert_eq!(agent.buffered_len(), 0);
    assert_eq!(host.sent().len(), 1);

    assert_eq!(agent.push(Command::pageview()), PushOutcome::Dispatched);
    assert_eq!(agent.buffered_len(), 0);
    assert_eq!(host.sent().len(), 2);
}

#[test]
fn second_install_is_rejected_and_replays_nothing() {
    let host = MockHost::default();
    let agent = Agent::with_pending(host.clone(), Config::default(), vec![Command::pageview()]);

    assert_eq!(agent.install_queue(), Ok(1));
    assert_eq!(
        agent.install_queue(),
        Err(AgentError::AlreadyInstalled("command queue"))
    );
    assert_eq!(host.sent().len(), 1);
}

#[test]
fn malformed_commands_are_reported() {
    let agent = Agent::new(MockHost::default(), Config::default());

    assert_eq!(
        agent.push_value(&json!("pageview")),
        Err(AgentError::Command(CommandError::NotATuple))
    );
    assert_eq!(
        agent.push_value(&json!(["identify", {}])),
        Err(AgentError::Command(CommandError::UnknownKind("identify".into())))
    );
    assert!(matches!(
        agent.push_value(&json!(["config", 3])),
        Err(AgentError::Command(CommandError::InvalidPayload { kind: "config", .. }))
    ));
    assert_eq!(agent.buffered_len(), 0);
}

#[test]
fn config_observer_sees_each_merge() {
    let agent = Agent::new(MockHost::default(), Config::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    agent.set_config_observer(move |config| sink.borrow_mut().push(config.debug));

    agent
        .push_value(&json!(["config", { "debug": true }]))
        .unwrap();
    agent
        .push_value(&json!(["config", { "debug": "yes" }]))
        .unwrap();
    agent.install_queue().unwrap();

    // The second patch is rejected key by key and leaves debug untouched.
    assert_eq!(*seen.borrow(), vec![true, true]);
    assert!(agent.config().debug);
}

#[test]
fn bare_pageview_reads_page_at_dispatch_time() {
    let host = MockHost::new("site.test", "/before");
    let agent = Agent::new(host.clone(), Config::default());

    agent.push_value(&json!(["pageview"])).unwrap();
    host.set_path("/after");
    agent.install_queue().unwrap();

    let (_, event) = beacon_event(&host.sent()[0]);
    assert_eq!(event, PageviewEvent::new("site.test", "/after", ""));
}

#[test]
fn partial_overrides_fill_from_page() {
    let host = MockHost::new("site.test", "/live").with_referrer("https://in.test/");
    let agent = Agent::new(host.clone(), Config::default());
    agent.install_queue().unwrap();

    agent
        .push_value(&json!(["pageview", { "path": "/virtual" }]))
        .unwrap();

    let (_, event) = beacon_event(&host.sent()[0]);
    assert_eq!(
        event,
        PageviewEvent::new("site.test", "/virtual", "https://in.test/")
    );
}
