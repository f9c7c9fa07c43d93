//! The TCP accept loop against real sockets on the loopback interface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use wrp_core::Codec;
use wrp_device::{run_server, DeviceOptions, Manager, ID};

#[tokio::test]
async fn test_accept_loop_registers_devices_and_stops_on_flag() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let manager = Manager::new(DeviceOptions::default(), Codec::default()).unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let server = tokio::spawn(run_server(listener, manager.clone(), Arc::clone(&running)));

    let mut request = format!("ws://{addr}/api/v2/device")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("X-Webpa-Device-Name", "mac:010203040506".parse().unwrap());

    // Act
    let (_device, response) = connect_async(request).await.unwrap();

    // Assert
    assert_eq!(response.status(), 101);
    let id = ID::from("mac:010203040506");
    for _ in 0..200 {
        if !manager.registry().get_by_id(&id).is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.registry().get_by_id(&id).len(), 1);

    // Act: shut down
    running.store(false, Ordering::Relaxed);
    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("accept loop stops within the poll interval")
        .unwrap();

    // Open sessions outlive the loop until closed explicitly.
    assert_eq!(manager.disconnect(&id), 1);
}
