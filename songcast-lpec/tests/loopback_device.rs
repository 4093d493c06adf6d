//! Event-protocol tests against a fake device on a loopback socket

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use songcast_lpec::{
    probe_device, query_state, wait_for_state, ConnectionConfig, EventConnection, EventMonitor, LpecError, MonitorConfig,
    MonitorEvent, Variable, PRODUCT_SERVICE, RECEIVER_SERVICE,
};

/// What the fake device does after answering the subscription
enum AfterSubscribe {
    /// Send these lines, then close the socket
    SendThenClose(Vec<&'static str>),
    /// Keep the socket open until the client goes away
    HoldOpen,
}

struct FakeDevice {
    port: u16,
    thread: JoinHandle<Vec<String>>,
}

impl FakeDevice {
    /// Accept one client, announce, answer one SUBSCRIBE with `initial`
    fn spawn(announce: Option<&'static str>, initial: Option<&'static str>, after: AfterSubscribe) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let thread = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            if let Some(line) = announce {
                write_line(&mut stream, line);
            }

            let mut received = Vec::new();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return received;
                }
                let line = line.trim_end().to_string();
                let subscribe = line.starts_with("SUBSCRIBE");
                received.push(line);
                if subscribe {
                    break;
                }
            }

            if let Some(line) = initial {
                write_line(&mut stream, line);
            }

            match after {
                AfterSubscribe::SendThenClose(lines) => {
                    for line in lines {
                        thread::sleep(Duration::from_millis(20));
                        write_line(&mut stream, line);
                    }
                    thread::sleep(Duration::from_millis(20));
                }
                AfterSubscribe::HoldOpen => {
                    let mut sink = Vec::new();
                    let _ = reader.read_to_end(&mut sink);
                }
            }
            received
        });

        Self { port, thread }
    }

    fn config(&self) -> ConnectionConfig {
        loopback_config(self.port)
    }
}

/// What one accepted connection of a [`spawn_session_device`] does after its initial event
#[derive(Clone, Copy)]
enum SessionEnd {
    /// Drop the socket, as a rebooting device would
    Close,
    /// Keep it until the client hangs up
    WaitForClient,
}

/// Serve one connection per entry of `sessions`, in order; returns how many were served
fn spawn_session_device(sessions: Vec<(&'static str, SessionEnd)>) -> (u16, JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let thread = thread::spawn(move || {
        let mut served = 0;
        for (initial, end) in sessions {
            let (mut stream, _) = listener.accept().unwrap();
            write_line(&mut stream, "ALIVE Ds udn-session");
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 || line.starts_with("SUBSCRIBE") {
                    break;
                }
            }
            write_line(&mut stream, initial);
            match end {
                SessionEnd::Close => thread::sleep(Duration::from_millis(20)),
                SessionEnd::WaitForClient => {
                    let mut sink = Vec::new();
                    let _ = reader.read_to_end(&mut sink);
                }
            }
            served += 1;
        }
        served
    });

    (port, thread)
}

fn loopback_config(port: u16) -> ConnectionConfig {
    ConnectionConfig {
        port,
        connect_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_millis(500),
        subscribe_timeout: Duration::from_millis(500),
        idle_timeout: Duration::from_millis(200),
        quirk_pause: Duration::ZERO,
    }
}

fn write_line(stream: &mut TcpStream, line: &str) {
    let _ = stream.write_all(format!("{}\r\n", line).as_bytes());
    let _ = stream.flush();
}

fn next_event(rx: &mpsc::Receiver<MonitorEvent>) -> MonitorEvent {
    rx.recv_timeout(Duration::from_secs(5)).expect("monitor event")
}

#[test]
fn test_handshake_sends_blank_line_before_subscribe() {
    let device = FakeDevice::spawn(
        Some("ALIVE Ds udn-1"),
        Some(r#"EVENT 0 TransportState "Stopped""#),
        AfterSubscribe::SendThenClose(vec![]),
    );

    let mut connection = EventConnection::connect("127.0.0.1", &device.config()).unwrap();
    assert_eq!(connection.identifier(), Some("udn-1"));

    let events = connection.subscribe(RECEIVER_SERVICE).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].value("TransportState"), Some("Stopped"));
    connection.close();

    let received = device.thread.join().unwrap();
    assert_eq!(received, vec!["".to_string(), "SUBSCRIBE Ds/Receiver".to_string()]);
}

#[test]
fn test_query_state_seeds_snapshot_from_initial_event() {
    let device = FakeDevice::spawn(
        Some("ALIVE Ds udn-2"),
        Some(r#"EVENT 0 TransportState "Playing" Uri "ohz://239.255.255.250:51972/udn-1" Status "Yes""#),
        AfterSubscribe::SendThenClose(vec![]),
    );

    let snapshot = query_state("127.0.0.1", RECEIVER_SERVICE, &device.config()).unwrap();
    assert_eq!(snapshot.get(Variable::TransportState), Some("Playing"));
    assert_eq!(snapshot.get(Variable::Sender), Some("ohz://239.255.255.250:51972/udn-1"));
    assert_eq!(snapshot.get(Variable::Status), Some("Yes"));
    device.thread.join().unwrap();
}

#[test]
fn test_silent_device_times_out_on_subscribe() {
    let device = FakeDevice::spawn(None, None, AfterSubscribe::HoldOpen);

    let result = query_state("127.0.0.1", RECEIVER_SERVICE, &device.config());
    assert!(matches!(result, Err(LpecError::Timeout("subscribe"))));
    device.thread.join().unwrap();
}

#[test]
fn test_read_after_device_closes_reports_closed() {
    let device = FakeDevice::spawn(
        Some("ALIVE Ds udn-1"),
        Some(r#"EVENT 0 TransportState "Stopped""#),
        AfterSubscribe::SendThenClose(vec![]),
    );

    let mut connection = EventConnection::connect("127.0.0.1", &device.config()).unwrap();
    connection.subscribe(RECEIVER_SERVICE).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let outcome = loop {
        match connection.read_line(Duration::from_millis(100)) {
            Ok(None) if Instant::now() < deadline => continue,
            other => break other,
        }
    };
    assert!(matches!(outcome, Err(LpecError::Closed)));
    device.thread.join().unwrap();
}

#[test]
fn test_monitor_publishes_changes_and_stops_when_device_goes_away() {
    let device = FakeDevice::spawn(
        Some("ALIVE Ds udn-2"),
        Some(r#"EVENT 0 TransportState "Stopped" Status "No""#),
        AfterSubscribe::SendThenClose(vec![
            "garbage that is not an event",
            r#"EVENT 1 TransportState "Buffering""#,
            r#"EVENT 2 TransportState "Playing" Status "No""#,
        ]),
    );

    let config = MonitorConfig {
        connection: device.config(),
        reconnect_attempts: 0,
        ..Default::default()
    };
    let (tx, rx) = mpsc::channel();
    let mut handle = EventMonitor::start("D2", "127.0.0.1", config, tx).unwrap();

    match next_event(&rx) {
        MonitorEvent::Started { device_id, snapshot } => {
            assert_eq!(device_id, "D2");
            assert_eq!(snapshot.get(Variable::TransportState), Some("Stopped"));
        }
        other => panic!("expected Started, got {:?}", other),
    }

    let mut transitions = Vec::new();
    loop {
        match next_event(&rx) {
            MonitorEvent::Changed(change) => {
                assert_eq!(change.variable, Variable::TransportState);
                transitions.push((change.sequence, change.old_value, change.new_value));
            }
            MonitorEvent::ConnectionLost { .. } => {}
            MonitorEvent::Stopped { device_id } => {
                assert_eq!(device_id, "D2");
                break;
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    assert_eq!(
        transitions,
        vec![
            (1, Some("Stopped".to_string()), "Buffering".to_string()),
            (2, Some("Buffering".to_string()), "Playing".to_string()),
        ]
    );

    handle.stop();
    assert!(!handle.is_running());
    device.thread.join().unwrap();
}

#[test]
fn test_stop_unblocks_idle_monitor() {
    let device = FakeDevice::spawn(
        Some("ALIVE Ds udn-3"),
        Some(r#"EVENT 0 TransportState "Playing""#),
        AfterSubscribe::HoldOpen,
    );

    let mut connection = device.config();
    connection.idle_timeout = Duration::from_secs(30);
    let config = MonitorConfig {
        connection,
        ..Default::default()
    };
    let (tx, rx) = mpsc::channel();
    let mut handle = EventMonitor::start("D3", "127.0.0.1", config, tx).unwrap();
    assert!(matches!(next_event(&rx), MonitorEvent::Started { .. }));

    let started = Instant::now();
    handle.stop();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!handle.is_running());
    assert!(matches!(next_event(&rx), MonitorEvent::Stopped { .. }));

    // the fake sees EOF once the socket is shut down
    device.thread.join().unwrap();
}

#[test]
fn test_probe_reads_identifier_and_product_names() {
    let device = FakeDevice::spawn(
        Some("ALIVE Ds 4c494e4e-0026-0f22-646e-01560511013f"),
        Some(r#"EVENT 0 ProductRoom "Kitchen" ProductName "Majik DSM" Standby "false""#),
        AfterSubscribe::SendThenClose(vec![]),
    );

    let probe = probe_device("127.0.0.1", &device.config()).unwrap();
    assert_eq!(probe.identifier.as_deref(), Some("4c494e4e-0026-0f22-646e-01560511013f"));
    assert_eq!(probe.room.as_deref(), Some("Kitchen"));
    assert_eq!(probe.name.as_deref(), Some("Majik DSM"));

    let received = device.thread.join().unwrap();
    assert_eq!(received.last().map(String::as_str), Some(format!("SUBSCRIBE {}", PRODUCT_SERVICE).as_str()));
}

#[test]
fn test_wait_for_state_polls_until_expected_values() {
    let (port, thread) = spawn_session_device(vec![
        (r#"EVENT 0 TransportState "Stopped""#, SessionEnd::WaitForClient),
        (
            r#"EVENT 0 TransportState "Buffering" Uri "ohz://239.255.255.250:51972/udn-1""#,
            SessionEnd::WaitForClient,
        ),
        (
            r#"EVENT 0 TransportState "Playing" Uri "ohz://239.255.255.250:51972/udn-1""#,
            SessionEnd::WaitForClient,
        ),
    ]);
    let config = loopback_config(port);

    let snapshot = wait_for_state(
        "127.0.0.1",
        RECEIVER_SERVICE,
        &[(Variable::TransportState, "Playing")],
        Duration::from_secs(10),
        Duration::from_millis(20),
        &config,
    )
    .expect("receiver reaches Playing");

    assert_eq!(snapshot.get(Variable::Sender), Some("ohz://239.255.255.250:51972/udn-1"));
    assert_eq!(thread.join().unwrap(), 3);
}

#[test]
fn test_wait_for_state_gives_up_after_timeout() {
    // nothing listens on the port once the listener is dropped
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ConnectionConfig {
        port,
        connect_timeout: Duration::from_millis(200),
        ..ConnectionConfig::default()
    };

    let started = Instant::now();
    let snapshot = wait_for_state(
        "127.0.0.1",
        RECEIVER_SERVICE,
        &[(Variable::TransportState, "Playing")],
        Duration::from_millis(300),
        Duration::from_millis(50),
        &config,
    );
    assert!(snapshot.is_none());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_monitor_reconnects_and_reports_changes_made_while_away() {
    let (port, thread) = spawn_session_device(vec![
        (r#"EVENT 0 TransportState "Stopped" Status "No""#, SessionEnd::Close),
        (r#"EVENT 0 TransportState "Playing" Status "No""#, SessionEnd::WaitForClient),
    ]);
    let config = MonitorConfig {
        connection: loopback_config(port),
        reconnect_attempts: 2,
        reconnect_delay: Duration::from_millis(50),
        ..Default::default()
    };
    let (tx, rx) = mpsc::channel();
    let mut handle = EventMonitor::start("D4", "127.0.0.1", config, tx).unwrap();

    match next_event(&rx) {
        MonitorEvent::Started { snapshot, .. } => {
            assert_eq!(snapshot.get(Variable::TransportState), Some("Stopped"));
        }
        other => panic!("expected Started, got {:?}", other),
    }
    assert!(matches!(next_event(&rx), MonitorEvent::ConnectionLost { .. }));
    assert!(matches!(next_event(&rx), MonitorEvent::Reconnected { .. }));
    match next_event(&rx) {
        MonitorEvent::Changed(change) => {
            assert_eq!(change.device_id, "D4");
            assert_eq!(change.variable, Variable::TransportState);
            assert_eq!(change.old_value.as_deref(), Some("Stopped"));
            assert_eq!(change.new_value, "Playing");
        }
        other => panic!("expected Changed, got {:?}", other),
    }
    assert!(handle.is_running());

    handle.stop();
    assert!(matches!(next_event(&rx), MonitorEvent::Stopped { .. }));
    assert_eq!(thread.join().unwrap(), 2);
}

#[test]
fn test_monitor_stops_when_every_reconnect_fails() {
    let device = FakeDevice::spawn(
        Some("ALIVE Ds udn-5"),
        Some(r#"EVENT 0 TransportState "Playing""#),
        AfterSubscribe::SendThenClose(vec![]),
    );
    let config = MonitorConfig {
        connection: device.config(),
        reconnect_attempts: 2,
        reconnect_delay: Duration::from_millis(50),
        ..Default::default()
    };
    let (tx, rx) = mpsc::channel();
    let mut handle = EventMonitor::start("D5", "127.0.0.1", config, tx).unwrap();
    device.thread.join().unwrap();

    assert!(matches!(next_event(&rx), MonitorEvent::Started { .. }));
    assert!(matches!(next_event(&rx), MonitorEvent::ConnectionLost { .. }));
    match next_event(&rx) {
        MonitorEvent::Stopped { device_id } => assert_eq!(device_id, "D5"),
        other => panic!("expected Stopped, got {:?}", other),
    }

    handle.stop();
    assert!(!handle.is_running());
}
