// MIT License - Copyright (c) 2026 Peter Wright
//
// Integration tests against a mock central speaking ISECnet v2 over
// loopback TCP. The mock answers from the panel's perspective, so reply
// frames carry the swapped id pair a real central uses.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::Instant;

use amt8000::error::Error;
use amt8000::executor::CommandExecutor;
use amt8000::metrics;
use amt8000::panel::Panel;
use amt8000::protocol;
use amt8000::session::{Command, ConnectOptions};
use amt8000::state::{alarm_state, AlarmState, PartitionGroups};
use amt8000::status::{State, STATUS_LEN};

const PASSWORD: &str = "307924";

// The executor's counters are process-wide, so tests that assert on their
// deltas must not interleave.
static TEST_LOCK: StdMutex<()> = StdMutex::new(());

fn serialize_test() -> StdMutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the mock central should do.
struct Behavior {
    /// Drop this many connections right after accept.
    fail_connections: usize,
    /// Auth result code (0 ok, 1 bad password).
    auth_result: u8,
    /// Answer arm requests with an open-zones rejection.
    reject_arm: bool,
    /// Status reply body.
    status_body: Vec<u8>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            fail_connections: 0,
            auth_result: 0,
            reject_arm: false,
            status_body: vec![0u8; STATUS_LEN],
        }
    }
}

/// Everything the mock central observed.
#[derive(Debug, Default)]
struct PanelLog {
    /// Authenticated dialogues started.
    auth_attempts: usize,
    /// Command frames received, disconnect excluded.
    commands: Vec<(u16, Vec<u8>)>,
    /// Handling window of each command that got a reply.
    spans: Vec<(Instant, Instant)>,
}

struct MockPanel {
    addr: SocketAddr,
    log: Arc<Mutex<PanelLog>>,
}

impl MockPanel {
    fn options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            password: PASSWORD.to_string(),
        }
    }
}

/// Frame as the central builds it: source and destination ids swapped
/// relative to ours. Byte 0 of a reply is therefore 0x8F, which is exactly
/// the remaining-length indicator the client relies on.
fn panel_frame(command: u16, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8 + body.len() + 1);
    frame.extend_from_slice(&0x8ffeu16.to_be_bytes());
    frame.extend_from_slice(&0x0000u16.to_be_bytes());
    frame.extend_from_slice(&(body.len() as u16 + 2).to_be_bytes());
    frame.extend_from_slice(&command.to_be_bytes());
    frame.extend_from_slice(body);
    let checksum = frame.iter().fold(0u8, |acc, b| acc ^ b) ^ 0xff;
    frame.push(checksum);
    frame
}

async fn spawn_panel(behavior: Behavior) -> MockPanel {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(PanelLog::default()));
    let behavior = Arc::new(behavior);
    let failures = Arc::new(Mutex::new(behavior.fail_connections));

    let accept_log = log.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let drop_connection = {
                let mut remaining = failures.lock().await;
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            };
            if drop_connection {
                continue;
            }
            tokio::spawn(serve_connection(
                stream,
                behavior.clone(),
                accept_log.clone(),
            ));
        }
    });

    MockPanel { addr, log }
}

async fn serve_connection(
    mut stream: TcpStream,
    behavior: Arc<Behavior>,
    log: Arc<Mutex<PanelLog>>,
) {
    // Auth dialogue: a 6-digit password request is 17 bytes.
    let mut auth = vec![0u8; 17];
    if stream.read_exact(&mut auth).await.is_err() {
        return;
    }
    log.lock().await.auth_attempts += 1;
    let reply = panel_frame(protocol::CMD_AUTH, &[behavior.auth_result]);
    if stream.write_all(&reply).await.is_err() || behavior.auth_result != 0 {
        return;
    }

    loop {
        let mut header = [0u8; 8];
        if stream.read_exact(&mut header).await.is_err() {
            return;
        }
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        let mut rest = vec![0u8; length - 2 + 1];
        if stream.read_exact(&mut rest).await.is_err() {
            return;
        }
        let command = u16::from_be_bytes([header[6], header[7]]);
        let body = rest[..length - 2].to_vec();
        if command == protocol::CMD_DISCONNECT {
            return;
        }

        let started = Instant::now();
        log.lock().await.commands.push((command, body.clone()));
        match command {
            protocol::CMD_STATUS => {
                let reply = panel_frame(protocol::CMD_STATUS, &behavior.status_body);
                let _ = stream.write_all(&reply).await;
                log.lock().await.spans.push((started, Instant::now()));
            }
            protocol::CMD_ARM if body.get(1) == Some(&protocol::SUB_ARM) => {
                let reply = if behavior.reject_arm {
                    panel_frame(0xf0fe, &[])
                } else {
                    panel_frame(protocol::CMD_ARM, &[0x01])
                };
                let _ = stream.write_all(&reply).await;
                log.lock().await.spans.push((started, Instant::now()));
            }
            _ => {}
        }
    }
}

fn executor_for(panel: &MockPanel) -> Arc<CommandExecutor> {
    Arc::new(CommandExecutor::new(panel.options()))
}

#[tokio::test]
async fn test_status_round_trip() {
    let _guard = serialize_test();

    let mut body = vec![0u8; STATUS_LEN];
    body[0] = 0x01; // AMT-8000
    body[1] = 2;
    body[2] = 1;
    body[3] = 9;
    body[20] = 0x01 << 5; // partial
    body[12] = 0x03; // zones 1 and 2 enabled
    body[22] = 0x80 | 0x01; // partition 2 enabled and armed
    body[38] = 0x02; // zone 2 open
    let mock = spawn_panel(Behavior {
        status_body: body,
        ..Behavior::default()
    })
    .await;

    let executor = executor_for(&mock);
    let status = executor.status().await.unwrap();

    assert_eq!(status.model, "AMT-8000");
    assert_eq!(status.version, "2.1.9");
    assert_eq!(status.state, State::Partial);
    assert_eq!(status.armed_partitions(), vec![2]);
    assert!(status.zones[1].open);
    assert!(!status.zones[0].open);

    // The snapshot maps straight onto the stay group.
    let groups = PartitionGroups {
        stay: vec![2],
        away: vec![0],
        night: vec![3],
    };
    assert_eq!(alarm_state(&status, &groups), AlarmState::StayArm);
}

#[tokio::test]
async fn test_executor_serializes_concurrent_commands() {
    let _guard = serialize_test();

    let mock = spawn_panel(Behavior::default()).await;
    let executor = executor_for(&mock);

    let first = executor.execute(Command::Arm { partition: 1 });
    let second = executor.execute(Command::Arm { partition: 2 });
    let (first, second) = tokio::join!(first, second);
    first.unwrap();
    second.unwrap();

    let log = mock.log.lock().await;
    assert_eq!(log.commands.len(), 2);
    assert_eq!(log.spans.len(), 2);

    let mut spans = log.spans.clone();
    spans.sort_by_key(|(start, _)| *start);
    assert!(
        spans[0].1 <= spans[1].0,
        "command dialogues overlapped on the wire"
    );
}

#[tokio::test]
async fn test_executor_retries_transient_failures_with_backoff() {
    let _guard = serialize_test();

    let mock = spawn_panel(Behavior {
        fail_connections: 3,
        ..Behavior::default()
    })
    .await;
    let executor = executor_for(&mock);

    let requests_before = metrics::REQUESTS.get();
    let errors_before = metrics::REQUEST_ERRORS.get();

    let started = Instant::now();
    executor
        .execute(Command::Arm { partition: 1 })
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // Three transient failures back off 500ms, 750ms, and 1125ms.
    assert!(elapsed >= Duration::from_millis(2375), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(60));
    assert_eq!(metrics::REQUESTS.get() - requests_before, 4);
    assert_eq!(metrics::REQUEST_ERRORS.get() - errors_before, 3);

    assert_eq!(mock.log.lock().await.auth_attempts, 1);
}

#[tokio::test]
async fn test_executor_does_not_retry_bad_password() {
    let _guard = serialize_test();

    let mock = spawn_panel(Behavior {
        auth_result: 1,
        ..Behavior::default()
    })
    .await;
    let executor = executor_for(&mock);

    let started = Instant::now();
    let err = executor
        .execute(Command::Arm { partition: 1 })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPassword));
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(mock.log.lock().await.auth_attempts, 1);
}

#[tokio::test]
async fn test_executor_does_not_retry_open_zones() {
    let _guard = serialize_test();

    let mock = spawn_panel(Behavior {
        reject_arm: true,
        ..Behavior::default()
    })
    .await;
    let executor = executor_for(&mock);

    let err = executor
        .execute(Command::Arm { partition: 1 })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OpenZones));

    let log = mock.log.lock().await;
    assert_eq!(log.commands.len(), 1, "open zones must not be retried");
}

#[tokio::test]
async fn test_stay_arm_sends_exactly_one_arm_frame() {
    let _guard = serialize_test();

    let mock = spawn_panel(Behavior::default()).await;
    let panel = Panel::new(executor_for(&mock));

    let groups = PartitionGroups {
        stay: vec![2],
        away: vec![0],
        night: vec![3],
    };
    panel.arm_all(&groups.stay).await.unwrap();

    let log = mock.log.lock().await;
    assert_eq!(
        log.commands,
        vec![(protocol::CMD_ARM, vec![2, protocol::SUB_ARM])],
        "expected a single arm frame for partition 2 and nothing else"
    );
}

#[tokio::test]
async fn test_disarm_all_uses_the_broadcast_partition() {
    let _guard = serialize_test();

    let mock = spawn_panel(Behavior::default()).await;
    let panel = Panel::new(executor_for(&mock));

    panel.disarm(0).await.unwrap();

    // Fire-and-forget: give the mock a beat to log the frame.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let log = mock.log.lock().await;
    assert_eq!(
        log.commands,
        vec![(protocol::CMD_ARM, vec![0xff, protocol::SUB_DISARM])]
    );
}

#[tokio::test]
async fn test_facade_validates_arguments_before_dialing() {
    let _guard = serialize_test();

    let mock = spawn_panel(Behavior::default()).await;
    let panel = Panel::new(executor_for(&mock));

    assert!(matches!(
        panel.bypass(0, true).await.unwrap_err(),
        Error::InvalidZone(0)
    ));
    assert!(matches!(
        panel.bypass(65, true).await.unwrap_err(),
        Error::InvalidZone(65)
    ));
    assert!(matches!(
        panel.arm(17).await.unwrap_err(),
        Error::InvalidPartition(17)
    ));

    assert_eq!(mock.log.lock().await.auth_attempts, 0);
}

#[tokio::test]
async fn test_bypass_is_zero_indexed_on_the_wire() {
    let _guard = serialize_test();

    let mock = spawn_panel(Behavior::default()).await;
    let panel = Panel::new(executor_for(&mock));

    panel.bypass(1, true).await.unwrap();
    panel.bypass(2, false).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let log = mock.log.lock().await;
    assert_eq!(
        log.commands,
        vec![
            (protocol::CMD_BYPASS, vec![0x00, 0x01]),
            (protocol::CMD_BYPASS, vec![0x01, 0x00]),
        ]
    );
}
