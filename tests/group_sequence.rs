//! Integration tests: full connect → send → flush → disconnect rounds
//! through the public API, using the in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use playbulb_candle::transport::mock::{Event, MockTransport};
use playbulb_candle::*;

fn config(effect: &str, colour: &str, speed: i64, targets: &[&str]) -> Config {
    Config {
        effect: effect.into(),
        colour: colour.into(),
        speed,
        targets: targets.iter().map(|t| t.to_string()).collect(),
        flush_interval: Duration::from_secs(1),
    }
}

// ── Two candles, solid colour ──

#[tokio::test(start_paused = true)]
async fn two_candles_solid_colour() {
    let transport = MockTransport::new();
    let plan = config("solid", "112233", 0, &["A", "B"]).validate().unwrap();

    assert_eq!(
        *plan.effect(),
        Effect::new(EffectMode::Solid, Colour::new(0, 17, 34, 51), 0)
    );

    plan.execute(Arc::new(transport.clone())).await.unwrap();

    let frame = vec![0x00, 0x11, 0x22, 0x33, 0xff, 0x00, 0x00, 0x00];
    assert_eq!(transport.frames_for("A"), vec![frame.clone()]);
    assert_eq!(transport.frames_for("B"), vec![frame]);

    let events = transport.events();
    assert_eq!(events[..2], [Event::Open("A".into()), Event::Open("B".into())]);
    assert!(matches!(&events[2], Event::Write(id, _) if id == "A"));
    assert!(matches!(&events[3], Event::Write(id, _) if id == "B"));

    let mut closes: Vec<Event> = events[4..].to_vec();
    closes.sort_by_key(|e| format!("{e:?}"));
    assert_eq!(closes, vec![Event::Close("A".into()), Event::Close("B".into())]);

    // One flush for the whole group, after the last send and before any close
    let timeline = transport.timeline();
    let last_write = timeline[3].0;
    for (at, _) in &timeline[4..] {
        assert!(*at - last_write >= Duration::from_secs(1));
    }
    assert_eq!(transport.open_sessions(), 0);
}

// ── Validation stops before any device is touched ──

#[test]
fn out_of_range_speed_never_reaches_a_candle() {
    let err = config("pulse", "FF0000", 300, &["A", "B"])
        .validate()
        .unwrap_err();
    assert!(matches!(err, Error::SpeedOutOfRange(300)));
    assert!(err.is_validation());
}

// ── One unreachable candle in the group ──

#[tokio::test(start_paused = true)]
async fn unreachable_member_aborts_the_round() {
    let transport = MockTransport::new();
    transport.set_unreachable("C");
    let plan = config("candle", "", 0, &["A", "B", "C"]).validate().unwrap();

    let err = plan.execute(Arc::new(transport.clone())).await.unwrap_err();

    assert!(matches!(err, Error::ConnectionFailed { ref id, .. } if id == "C"));
    assert!(!err.is_validation());
    assert!(transport.frames_for("A").is_empty());
    assert!(transport.frames_for("B").is_empty());
    assert_eq!(transport.open_sessions(), 0);
}

// ── Failed sends are reported but every candle is still released ──

#[tokio::test(start_paused = true)]
async fn failed_send_still_disconnects_everyone() {
    let transport = MockTransport::new();
    transport.fail_writes("B");
    let plan = config("fade", "80FFFFFF", 20, &["A", "B"]).validate().unwrap();

    let err = plan.execute(Arc::new(transport.clone())).await.unwrap_err();

    match err {
        Error::Group(errors) => {
            assert_eq!(errors.len(), 1);
            assert!(matches!(&errors[0], Error::TransmitFailed { id, .. } if id == "B"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.frames_for("A").len(), 1);
    assert_eq!(transport.open_sessions(), 0);

    // A accepted the frame, so it still gets the full flush before its link drops
    let timeline = transport.timeline();
    let (written, _) = timeline
        .iter()
        .find(|(_, e)| matches!(e, Event::Write(id, _) if id == "A"))
        .unwrap();
    let (closed, _) = timeline
        .iter()
        .find(|(_, e)| matches!(e, Event::Close(id) if id == "A"))
        .unwrap();
    assert!(*closed - *written >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn no_flush_when_every_send_fails() {
    let transport = MockTransport::new();
    transport.fail_writes("A");
    transport.fail_writes("B");
    let plan = config("pulse", "FF0000", 5, &["A", "B"]).validate().unwrap();
    let started = tokio::time::Instant::now();

    let err = plan.execute(Arc::new(transport.clone())).await.unwrap_err();

    assert!(matches!(err, Error::Group(ref errors) if errors.len() == 2));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(transport.open_sessions(), 0);
}
