//! Integration tests for activation scheduling
//!
//! These tests verify:
//! - Selection of the most visible container and ordinal distances
//! - The eviction table for every memory mode
//! - Reset/restore of playback positions and the release grace window
//! - Host lifecycle gating, start delays, client intents and pinning

mod common;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{HostLifecycle, MemoryInfo, MemoryMonitor};
use common::{Call, Harness, TestHost, GRACE_MS, ROOT};
use core_orchestrator::{
    BindingCallbacks, BindingConfig, BindingId, BindingState, ControllerPolicy, Disposition,
    PlaybackIntent, Retention, Tag,
};
use core_runtime::config::MemoryMode;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct FixedMemory(bool);

impl MemoryMonitor for FixedMemory {
    fn memory_info(&self) -> BridgeResult<MemoryInfo> {
        Ok(MemoryInfo {
            available_bytes: 512,
            threshold_bytes: 256,
            low_memory: self.0,
        })
    }
}

#[derive(Default)]
struct Recorder {
    entries: Mutex<Vec<String>>,
}

impl BindingCallbacks for Recorder {
    fn on_active(&self, _binding: BindingId) {
        self.entries.lock().push("active".to_string());
    }

    fn on_inactive(&self, _binding: BindingId) {
        self.entries.lock().push("inactive".to_string());
    }

    fn on_distance_changed(&self, _binding: BindingId, from: u32, to: u32) {
        self.entries.lock().push(format!("distance {from}->{to}"));
    }
}

/// Four bindings at ordinals 0, 1, 2 and 9, the first fully visible.
fn spread(h: &mut Harness, mode: MemoryMode) {
    let host = TestHost::new(1, [1, 2, 3, 4]);
    h.resumed_host(&host, mode);
    for (container, ordinal, visible) in [(1, 0, 1.0), (2, 1, 0.5), (3, 2, 0.5), (4, 9, 0.5)] {
        h.attach(container, ordinal, visible);
    }
    h.pump();
    for (uri, container) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        h.bind(uri, container);
    }
    h.pump();
}

fn dispositions(h: &Harness) -> Vec<Option<Disposition>> {
    (1..=4)
        .map(|container| {
            let binding = h.binding_at(container)?;
            h.master.binding(binding)?.disposition()
        })
        .collect()
}

fn state(h: &Harness, container: u64) -> BindingState {
    let binding = h.binding_at(container).unwrap();
    h.master.binding(binding).unwrap().state()
}

// ============================================================================
// Selection and eviction
// ============================================================================

#[test]
fn test_most_visible_plays_and_neighbours_wait() {
    let mut h = Harness::new();
    spread(&mut h, MemoryMode::Balanced);

    let distances: Vec<Option<u32>> = (1..=4)
        .map(|c| h.master.binding(h.binding_at(c).unwrap()).unwrap().distance())
        .collect();
    assert_eq!(distances, vec![Some(0), Some(1), Some(2), Some(9)]);

    assert_eq!(state(&h, 1), BindingState::Active);
    assert_eq!(state(&h, 2), BindingState::Inactive);
    assert_eq!(h.count("a", &Call::Play), 1);
    assert!(h.calls("b").is_empty());

    h.layout(1, 0, 0.2);
    h.layout(2, 1, 1.0);
    h.pump();

    assert_eq!(state(&h, 1), BindingState::Inactive);
    assert_eq!(state(&h, 2), BindingState::Active);
    assert_eq!(h.count("a", &Call::Pause), 1);
    assert_eq!(h.count("a", &Call::Release), 0);
    assert_eq!(h.count("b", &Call::Play), 1);
}

#[test]
fn test_eviction_table_per_memory_mode() {
    use Retention::*;
    let active = Some(Disposition::Activate { play: true });
    let keep = |retention| Some(Disposition::Deactivate(retention));

    let cases = [
        (MemoryMode::Low, [keep(Release), keep(Release), keep(Release)]),
        (MemoryMode::Normal, [keep(Reset), keep(Release), keep(Release)]),
        (MemoryMode::Balanced, [keep(Pause), keep(Release), keep(Release)]),
        (MemoryMode::High, [keep(Reset), keep(Reset), keep(Release)]),
        (MemoryMode::Infinite, [keep(Pause), keep(Pause), keep(Pause)]),
    ];

    for (mode, expected) in cases {
        let mut h = Harness::new();
        spread(&mut h, mode);
        let mut want = vec![active];
        want.extend(expected);
        assert_eq!(dispositions(&h), want, "mode {mode:?}");
    }
}

#[test]
fn test_reset_neighbour_is_released_once_far() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1, 2]);
    h.resumed_host(&host, MemoryMode::Normal);
    h.attach(1, 0, 0.2);
    h.attach(2, 1, 1.0);
    h.pump();
    h.bind("a", 1);
    let b = h.bind("b", 2);
    h.pump();
    assert_eq!(h.count("b", &Call::Play), 1);

    h.layout(1, 0, 1.0);
    h.layout(2, 1, 0.2);
    h.pump();
    assert_eq!(h.count("b", &Call::Reset), 1);
    assert!(!h.master.session(b).unwrap().is_prepared());
    assert!(!h.master.is_release_pending(b));

    h.layout(2, 20, 0.2);
    h.pump();
    assert!(h.master.is_release_pending(b));

    h.advance(GRACE_MS);
    assert_eq!(
        h.calls("b"),
        vec![
            Call::AttachRenderer(2),
            Call::Prepare,
            Call::Play,
            Call::Pause,
            Call::DetachRenderer,
            Call::Reset,
            Call::Release,
        ]
    );
    assert!(!h.master.session(b).unwrap().is_allocated());

    // Already released, moving further away issues nothing new.
    h.layout(2, 30, 0.2);
    h.advance(GRACE_MS);
    assert_eq!(h.count("b", &Call::Release), 1);
}

#[test]
fn test_never_prepared_binding_is_not_released() {
    let mut h = Harness::new();
    spread(&mut h, MemoryMode::Low);
    h.advance(GRACE_MS);

    assert!(h.calls("d").is_empty());
    assert!(h.calls("b").is_empty());
}

#[test]
fn test_register_falls_back_to_configured_memory_mode() {
    let mut h = Harness::with_config(|builder| builder.default_memory_mode(MemoryMode::High));

    let defaulted = h
        .master
        .register(ROOT, TestHost::new(1, [1]), None::<MemoryMode>);
    let explicit = h
        .master
        .register(ROOT, TestHost::new(2, [2]), Some(MemoryMode::Low));

    assert_eq!(
        h.master.manager(defaulted).unwrap().memory_mode(),
        MemoryMode::High
    );
    assert_eq!(
        h.master.manager(explicit).unwrap().memory_mode(),
        MemoryMode::Low
    );
}

#[test]
fn test_auto_mode_follows_memory_monitor() {
    let mut relaxed = Harness::with_config(|builder| {
        builder.memory_monitor(Arc::new(FixedMemory(false)))
    });
    spread(&mut relaxed, MemoryMode::Auto);
    assert_eq!(
        dispositions(&relaxed)[1],
        Some(Disposition::Deactivate(Retention::Pause))
    );

    let mut unknown = Harness::new();
    spread(&mut unknown, MemoryMode::Auto);
    assert_eq!(
        dispositions(&unknown)[1],
        Some(Disposition::Deactivate(Retention::Release))
    );
}

#[test]
fn test_memory_mode_change_reschedules() {
    let mut h = Harness::new();
    spread(&mut h, MemoryMode::Infinite);
    let manager = h
        .master
        .binding(h.binding_at(1).unwrap())
        .unwrap()
        .manager();

    h.master.set_memory_mode(manager, MemoryMode::Low).unwrap();
    h.pump();

    assert_eq!(
        dispositions(&h)[1],
        Some(Disposition::Deactivate(Retention::Release))
    );
}

// ============================================================================
// Reset, restore and release
// ============================================================================

#[test]
fn test_reset_saves_and_reactivation_restores() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1, 2]);
    h.resumed_host(&host, MemoryMode::Normal);
    h.attach(1, 0, 1.0);
    h.attach(2, 1, 0.5);
    h.pump();
    h.bind("a", 1);
    h.bind("b", 2);
    h.pump();
    h.clear_log();

    h.layout(1, 0, 0.1);
    h.layout(2, 1, 1.0);
    h.pump();

    assert_eq!(
        h.calls("a"),
        vec![Call::Pause, Call::DetachRenderer, Call::Reset]
    );
    let saved = h.master.info_store().get(&Tag::new("a")).copied().unwrap();
    assert_eq!(saved.resume_position, Duration::from_secs(30));
    h.clear_log();

    h.layout(1, 0, 1.0);
    h.layout(2, 1, 0.1);
    h.pump();

    assert_eq!(
        h.calls("a"),
        vec![
            Call::SetInfo(Duration::from_secs(30)),
            Call::AttachRenderer(1),
            Call::Prepare,
            Call::Play,
        ]
    );
    assert!(!h.master.info_store().contains(&Tag::new("a")));
    assert_eq!(h.count("b", &Call::Reset), 1);
}

#[test]
fn test_release_runs_after_grace_window() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1]);
    h.resumed_host(&host, MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.pump();
    let session = h.bind("a", 1);
    h.pump();

    h.detach(1);
    h.pump();
    assert!(h.master.is_release_pending(session));
    assert_eq!(h.count("a", &Call::Pause), 1);

    h.advance(GRACE_MS - 1);
    assert_eq!(h.count("a", &Call::Release), 0);

    h.advance(1);
    assert_eq!(h.count("a", &Call::Release), 1);
    assert!(!h.master.is_release_pending(session));
    assert!(!h.master.session(session).unwrap().is_prepared());
    assert!(h.master.info_store().contains(&Tag::new("a")));
}

#[test]
fn test_reactivation_cancels_pending_release() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1]);
    h.resumed_host(&host, MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.pump();
    let session = h.bind("a", 1);
    h.pump();

    h.detach(1);
    h.pump();
    h.advance(200);
    assert!(h.master.is_release_pending(session));

    h.attach(1, 0, 1.0);
    h.pump();
    assert!(!h.master.is_release_pending(session));

    h.advance(GRACE_MS * 2);
    assert_eq!(h.count("a", &Call::Release), 0);
    assert_eq!(h.count("a", &Call::Prepare), 1);
    assert_eq!(h.count("a", &Call::Play), 2);
}

// ============================================================================
// Host lifecycle and start delay
// ============================================================================

#[test]
fn test_host_lifecycle_gates_playback() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1]);
    h.master.register(common::ROOT, host.clone(), MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.pump();
    h.bind("a", 1);
    h.pump();

    assert_eq!(h.calls("a"), vec![Call::AttachRenderer(1), Call::Prepare]);

    let send = |h: &mut Harness, state| {
        h.control.host_lifecycle(host.host_id(), state).unwrap();
        h.pump();
    };

    send(&mut h, HostLifecycle::Started);
    assert_eq!(h.count("a", &Call::Play), 0);

    send(&mut h, HostLifecycle::Resumed);
    assert_eq!(h.count("a", &Call::Play), 1);

    send(&mut h, HostLifecycle::Paused);
    assert_eq!(h.count("a", &Call::Pause), 1);
    assert_eq!(state(&h, 1), BindingState::Active);

    send(&mut h, HostLifecycle::Stopped);
    assert_eq!(state(&h, 1), BindingState::Inactive);
    assert_eq!(h.count("a", &Call::DetachRenderer), 1);

    h.advance(GRACE_MS);
    assert_eq!(h.count("a", &Call::Release), 1);
}

#[test]
fn test_start_delay_defers_play() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1]);
    h.resumed_host(&host, MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.pump();
    h.bind_with(
        "a",
        1,
        BindingConfig::default().with_delay(Duration::from_millis(300)),
    );
    h.pump();

    assert_eq!(h.count("a", &Call::Prepare), 1);
    assert_eq!(h.count("a", &Call::Play), 0);
    assert_eq!(h.master.next_due_millis(), Some(300));

    h.advance(299);
    assert_eq!(h.count("a", &Call::Play), 0);

    h.advance(1);
    assert_eq!(h.count("a", &Call::Play), 1);
    assert!(h
        .master
        .binding(h.binding_at(1).unwrap())
        .unwrap()
        .is_playing());
}

#[test]
fn test_start_delay_cancelled_by_deactivation() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1]);
    h.resumed_host(&host, MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.pump();
    h.bind_with(
        "a",
        1,
        BindingConfig::default().with_delay(Duration::from_millis(300)),
    );
    h.pump();

    h.detach(1);
    h.pump();
    h.advance(1000);

    assert_eq!(h.count("a", &Call::Play), 0);
    assert_eq!(h.count("a", &Call::Release), 1);
}

// ============================================================================
// Client controls
// ============================================================================

#[test]
fn test_client_intents_override_scheduler() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1, 2]);
    h.resumed_host(&host, MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.pump();

    let manual = ControllerPolicy {
        scheduler_can_start: false,
        scheduler_can_pause: true,
    };
    let session = h.bind_with("a", 1, BindingConfig::default().with_controller(manual));
    h.pump();
    assert_eq!(h.count("a", &Call::Prepare), 1);
    assert_eq!(h.count("a", &Call::Play), 0);

    h.master.play(session).unwrap();
    h.pump();
    assert_eq!(h.count("a", &Call::Play), 1);
    assert_eq!(h.master.intent(&Tag::new("a")), Some(PlaybackIntent::Play));
    assert!(!h.master.is_client_started(&Tag::new("a")));

    h.master.pause(session).unwrap();
    h.pump();
    assert_eq!(h.count("a", &Call::Pause), 1);
    assert_eq!(h.master.intent(&Tag::new("a")), Some(PlaybackIntent::Pause));

    let free = h.bind("b", 2);
    h.master.play(free).unwrap();
    assert_eq!(h.master.intent(&Tag::new("b")), None);
}

#[test]
fn test_client_started_keeps_playing_when_unselected() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1, 2]);
    h.resumed_host(&host, MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.attach(2, 1, 0.5);
    h.pump();

    let sticky_play = BindingConfig::default().with_controller(ControllerPolicy {
        scheduler_can_start: true,
        scheduler_can_pause: false,
    });
    let a = h.bind_with("a", 1, sticky_play.clone());
    h.bind_with("b", 2, sticky_play);
    h.pump();

    h.master.play(a).unwrap();
    h.pump();
    assert!(h.master.is_client_started(&Tag::new("a")));
    h.clear_log();

    h.layout(1, 0, 0.3);
    h.layout(2, 1, 1.0);
    h.pump();
    assert!(h.calls("a").is_empty());
    assert_eq!(h.count("b", &Call::Play), 1);

    h.detach(1);
    h.pump();
    assert_eq!(h.count("a", &Call::Pause), 1);

    h.master.pause(a).unwrap();
    assert!(!h.master.is_client_started(&Tag::new("a")));
}

#[test]
fn test_stick_forces_distance_zero_until_unstuck() {
    let mut h = Harness::new();
    let host = TestHost::new(1, [1, 2]);
    h.resumed_host(&host, MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.attach(2, 5, 0.1);
    h.pump();

    let recorder = Arc::new(Recorder::default());
    h.bind("a", 1);
    h.bind_with(
        "b",
        2,
        BindingConfig::default().with_callbacks(recorder.clone()),
    );
    h.pump();
    let a = h.binding_at(1).unwrap();
    let b = h.binding_at(2).unwrap();
    assert_eq!(h.master.binding(b).unwrap().distance(), Some(5));

    h.master.stick(b).unwrap();
    h.pump();
    assert_eq!(h.master.binding(b).unwrap().distance(), Some(0));
    assert_eq!(h.master.binding(a).unwrap().distance(), Some(1));
    assert_eq!(h.count("b", &Call::Play), 1);
    assert_eq!(h.count("a", &Call::Pause), 1);

    h.master.unstick(b).unwrap();
    h.pump();
    assert_eq!(h.master.binding(b).unwrap().distance(), Some(5));
    assert_eq!(h.master.binding(a).unwrap().distance(), Some(0));
    assert_eq!(h.count("a", &Call::Play), 2);

    assert_eq!(
        recorder.entries.lock().as_slice(),
        &[
            "distance 5->0".to_string(),
            "active".to_string(),
            "distance 0->5".to_string(),
            "inactive".to_string(),
        ]
    );
}

#[test]
fn test_sticky_manager_suppresses_siblings_in_group() {
    let mut h = Harness::new();
    let first = TestHost::new(1, [1]);
    let second = TestHost::new(2, [2]);
    h.resumed_host(&first, MemoryMode::Balanced);
    h.resumed_host(&second, MemoryMode::Balanced);
    h.attach(1, 0, 1.0);
    h.attach(2, 0, 1.0);
    h.pump();
    h.bind("a", 1);
    h.bind("b", 2);
    h.pump();
    assert_eq!(h.count("a", &Call::Play), 1);
    assert_eq!(h.count("b", &Call::Play), 1);

    let a = h.binding_at(1).unwrap();
    let pinned = h.master.binding(a).unwrap().manager();

    h.master.stick(a).unwrap();
    h.pump();
    assert_eq!(h.master.group_for(ROOT).unwrap().sticky_manager(), Some(pinned));
    assert_eq!(state(&h, 1), BindingState::Active);
    assert_eq!(state(&h, 2), BindingState::Inactive);
    assert_eq!(h.count("b", &Call::Pause), 1);

    h.master.unstick(a).unwrap();
    h.pump();
    assert_eq!(h.master.group_for(ROOT).unwrap().sticky_manager(), None);
    assert_eq!(state(&h, 2), BindingState::Active);
    assert_eq!(h.count("b", &Call::Play), 2);

    h.master.stick(a).unwrap();
    h.pump();
    assert_eq!(h.count("b", &Call::Pause), 2);

    h.control
        .host_lifecycle(first.host_id(), HostLifecycle::Destroyed)
        .unwrap();
    h.pump();
    assert_eq!(h.master.group_for(ROOT).unwrap().sticky_manager(), None);
    assert_eq!(state(&h, 2), BindingState::Active);
    assert_eq!(h.count("b", &Call::Play), 3);
}
