//! End-to-end grouping runs against scripted devices

use songcast_group::testing::ScriptedDevice;
use songcast_group::{
    DeviceControl, GroupConfig, GroupOrchestrator, JoinConfig, JoinError, PollPolicy, TransportState,
};

const D1_DEFAULT: &str = "ohz://239.255.255.250:51972/udn-1";

// ============================================================================
// Helpers
// ============================================================================

fn immediate() -> GroupConfig {
    GroupConfig {
        join: JoinConfig::immediate(),
        prepare_sender_source: false,
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_one_grouped_one_fresh_receiver() {
    let d1 = ScriptedDevice::sender("D1", "udn-1");
    let d2 = ScriptedDevice::receiver("D2", "udn-2").already_joined(D1_DEFAULT, TransportState::Playing);
    let d3 = ScriptedDevice::receiver("D3", "udn-3");

    let report = GroupOrchestrator::new(immediate()).run(&d1, &[&d2, &d3]);

    assert!(report.all_joined());
    assert_eq!(report.receivers.len(), 2);

    let d2_result = &report.receivers[0].result;
    assert_eq!(d2_result.receiver_id, "D2");
    assert!(d2_result.skipped);
    assert_eq!(d2_result.attempts, 1);

    let d3_result = &report.receivers[1].result;
    assert_eq!(d3_result.receiver_id, "D3");
    assert!(!d3_result.skipped);
    assert_eq!(d3_result.final_candidate.as_ref().map(|c| c.uri.as_str()), Some(D1_DEFAULT));
    assert_eq!(d3.state().transport, TransportState::Buffering);
}

#[test]
fn test_second_run_short_circuits() {
    let d1 = ScriptedDevice::sender("D1", "udn-1");
    let d3 = ScriptedDevice::receiver("D3", "udn-3");
    let orchestrator = GroupOrchestrator::new(immediate());

    let first = orchestrator.run(&d1, &[&d3]);
    assert!(first.all_joined());
    let set_sender_calls = d3.count_calls("SetSender");

    let second = orchestrator.run(&d1, &[&d3]);
    assert!(second.all_joined());
    assert!(second.receivers[0].result.skipped);
    assert_eq!(second.receivers[0].result.attempts, 1);
    assert_eq!(d3.count_calls("SetSender"), set_sender_calls);
}

#[test]
fn test_unreachable_receiver_does_not_stop_the_others() {
    let d1 = ScriptedDevice::sender("D1", "udn-1");
    let d2 = ScriptedDevice::receiver("D2", "udn-2").unreachable();
    let d3 = ScriptedDevice::receiver("D3", "udn-3");

    let report = GroupOrchestrator::new(immediate()).run(&d1, &[&d2, &d3]);

    assert!(!report.all_joined());
    assert_eq!(report.joined_count(), 1);

    let failed: Vec<_> = report.failures().map(|r| r.result.receiver_id.as_str()).collect();
    assert_eq!(failed, vec!["D2"]);
    assert!(matches!(
        report.receivers[0].result.error,
        Some(JoinError::ConvergenceTimeout { .. })
    ));
    assert!(report.receivers[0].verified.is_none());
    assert!(report.receivers[1].result.joined);
}

#[test]
fn test_unreachable_sender_still_yields_a_candidate() {
    let d1 = ScriptedDevice::sender("D1", "udn-1").unreachable();
    let d2 = ScriptedDevice::receiver("D2", "udn-2");

    let report = GroupOrchestrator::new(immediate()).run(&d1, &[&d2]);

    assert!(!report.sender_awake);
    assert!(report.all_joined());
    assert_eq!(
        report.receivers[0].result.final_candidate.as_ref().map(|c| c.uri.as_str()),
        Some(D1_DEFAULT)
    );
}

#[test]
fn test_join_is_bounded() {
    let d1 = ScriptedDevice::sender("D1", "udn-1").with_descriptor("ohSongcast://udn-1", "");
    // nothing ever reports an active transport and reads fail: every candidate is abandoned
    let d2 = ScriptedDevice::receiver("D2", "udn-2").with_state(|s| s.fail_transport_reads = true);

    let mut config = immediate();
    config.join.poll = PollPolicy::immediate(8);
    let report = GroupOrchestrator::new(config).run(&d1, &[&d2]);

    let result = &report.receivers[0].result;
    assert!(!result.joined);
    assert_eq!(result.attempts, 2);
    // bounded by candidates x poll attempts, plus the pre-check and the verification read
    assert!(d2.count_calls("TransportState") <= 2 * 8 + 2);
    assert_eq!(d2.device().token, "D2");
}
