use std::time::Duration;

use pool_scan_rs::ports::{common_ports, service_name};
use pool_scan_rs::probe::scan_port;
use pool_scan_rs::scanner::PortScanner;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_millis(300);

fn loopback_scanner(workers: usize) -> PortScanner {
    PortScanner::new("127.0.0.1", TIMEOUT, workers)
}

/// A port that was free a moment ago; nothing listens on it now.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn listening_port_is_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let result = scan_port("127.0.0.1", port, TIMEOUT).await;
    assert!(result.open);
    assert_eq!(result.port, port);
    assert_eq!(result.service, service_name(port));
}

#[tokio::test]
async fn unused_port_is_closed() {
    let port = closed_port().await;
    let result = scan_port("127.0.0.1", port, TIMEOUT).await;
    assert!(!result.open);
}

#[tokio::test]
async fn unresolvable_host_is_closed_not_an_error() {
    let result = scan_port("no-such-host.invalid", 80, TIMEOUT).await;
    assert!(!result.open);
    assert_eq!(result.service, "HTTP");
}

#[tokio::test]
async fn well_known_listener_gets_service_name() {
    // Only meaningful when the port is free to bind.
    let Ok(listener) = TcpListener::bind("127.0.0.1:5900").await else {
        return;
    };
    let result = scan_port("127.0.0.1", 5900, TIMEOUT).await;
    assert!(result.open);
    assert_eq!(result.service, "VNC");
    drop(listener);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn range_scan_is_complete_and_sorted() {
    let results = loopback_scanner(64).scan_range(1, 1024).await.unwrap();
    assert_eq!(results.len(), 1024);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.port as usize, i + 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn specific_ports_come_back_in_order() {
    let results = loopback_scanner(3)
        .scan_specific_ports(&[5432, 3000, 22, 443, 80])
        .await
        .unwrap();
    let ports: Vec<u16> = results.iter().map(|r| r.port).collect();
    assert_eq!(ports, vec![22, 80, 443, 3000, 5432]);
    assert_eq!(results[0].service, "SSH");
    assert_eq!(results[3].service, "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_ports_probed_once() {
    let results = loopback_scanner(2)
        .scan_specific_ports(&[80, 80, 22, 80])
        .await
        .unwrap();
    let ports: Vec<u16> = results.iter().map(|r| r.port).collect();
    assert_eq!(ports, vec![22, 80]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn open_and_closed_mixed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();
    let closed = closed_port().await;

    let results = loopback_scanner(4)
        .with_queue_capacity(1)
        .scan_specific_ports(&[open, closed])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    let by_port = |p: u16| results.iter().find(|r| r.port == p).unwrap();
    assert!(by_port(open).open);
    assert!(!by_port(closed).open);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn common_ports_cover_the_table() {
    let results = loopback_scanner(8).scan_common_ports().await.unwrap();
    let ports: Vec<u16> = results.iter().map(|r| r.port).collect();
    assert_eq!(ports, common_ports());
    assert!(results.iter().all(|r| !r.service.is_empty()));
}

#[tokio::test]
async fn bad_arguments_are_rejected() {
    let scanner = loopback_scanner(1);
    assert!(scanner.scan_range(10, 5).await.is_err());
    assert!(scanner.scan_range(0, 5).await.is_err());
    assert!(scanner.scan_specific_ports(&[0, 80]).await.is_err());
    assert!(PortScanner::new("127.0.0.1", TIMEOUT, 0)
        .scan_specific_ports(&[80])
        .await
        .is_err());
}

#[tokio::test]
async fn empty_list_scans_nothing() {
    let results = loopback_scanner(2).scan_specific_ports(&[]).await.unwrap();
    assert!(results.is_empty());
}
