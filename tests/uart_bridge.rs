//! Integration tests for the UART register bridge against a scripted wire.

use regbridge::adapters::MockWire;
use regbridge::{MemorySlave, Outcome, Transaction, UartBridge};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn write_sends_exact_frame_and_resolves_done() {
    init_logs();
    let mock = MockWire::new();
    mock.enqueue_response("w 00001000 deadbeef ");
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let txn = Transaction::write(0x1000, 0xdead_beef_u32.to_le_bytes().to_vec());
    bridge.submit(txn.clone()).unwrap();

    assert!(txn.wait().await.is_done());
    assert_eq!(mock.sent(), vec!["w 00001000 deadbeef \n"]);
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn write_with_silent_wire_is_classified_as_timeout() {
    init_logs();
    let mock = MockWire::new();
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let txn = Transaction::write(0x1000, vec![1, 0, 0, 0]);
    bridge.submit(txn.clone()).unwrap();

    let outcome = txn.wait().await;
    let message = outcome.error_message().expect("expected an error outcome");
    assert!(message.contains("timeout"), "got: {message}");
    assert!(message.contains("word 0"), "got: {message}");
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn multi_word_read_assembles_little_endian_payload() {
    init_logs();
    let mock = MockWire::new();
    mock.enqueue_response("r 00002000 0000002a ");
    mock.enqueue_response("r 00002004 0000002b ");
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let txn = Transaction::read(0x2000, 8);
    bridge.submit(txn.clone()).unwrap();

    assert!(txn.wait().await.is_done());
    assert_eq!(
        txn.payload().await,
        vec![0x2a, 0, 0, 0, 0x2b, 0, 0, 0],
        "words decode little-endian at their offsets"
    );
    assert_eq!(mock.sent(), vec!["r 00002000 \n", "r 00002004 \n"]);
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn verify_reads_back_like_a_read() {
    init_logs();
    let mock = MockWire::new();
    mock.enqueue_response("r 00000010 00000007 ");
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let txn = Transaction::verify(0x10, 4);
    bridge.submit(txn.clone()).unwrap();

    assert!(txn.wait().await.is_done());
    assert_eq!(txn.payload().await, vec![7, 0, 0, 0]);
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_write_response_aborts_remaining_words() {
    init_logs();
    let mock = MockWire::new();
    // Address echo of the first word is wrong; the second word must never
    // reach the wire.
    mock.enqueue_response("w 00009999 00000001 ");
    mock.enqueue_response("w 00001004 00000002 ");
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let txn = Transaction::write(0x1000, vec![1, 0, 0, 0, 2, 0, 0, 0]);
    bridge.submit(txn.clone()).unwrap();

    let outcome = txn.wait().await;
    let message = outcome.error_message().expect("expected an error outcome");
    assert!(message.contains("malformed"), "got: {message}");
    assert!(message.contains("word 0"), "got: {message}");
    assert_eq!(mock.sent().len(), 1, "first failure aborts the transaction");
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_read_response_aborts_remaining_words() {
    init_logs();
    let mock = MockWire::new();
    mock.enqueue_response("garbage");
    mock.enqueue_response("r 00002004 0000002b ");
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let txn = Transaction::read(0x2000, 8);
    bridge.submit(txn.clone()).unwrap();

    let outcome = txn.wait().await;
    assert!(outcome.error_message().is_some());
    assert_eq!(mock.sent().len(), 1);
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn posted_write_is_unsupported() {
    init_logs();
    let mock = MockWire::new();
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let txn = Transaction::posted(0x1000, vec![0; 4]);
    bridge.submit(txn.clone()).unwrap();

    let outcome = txn.wait().await;
    let message = outcome.error_message().expect("expected an error outcome");
    assert!(message.contains("unsupported"), "got: {message}");
    assert!(mock.sent().is_empty(), "unsupported kinds never touch the wire");
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn out_of_window_and_unaligned_sizes_are_rejected() {
    init_logs();
    let mock = MockWire::new();
    let mut bridge = UartBridge::new("mock-uart", mock.clone());
    assert_eq!(bridge.size_window(), (4, 4096));

    let too_small = Transaction::write(0x0, vec![1, 2]);
    bridge.submit(too_small.clone()).unwrap();
    assert!(too_small.wait().await.error_message().is_some());

    let unaligned = Transaction::write(0x0, vec![0; 6]);
    bridge.submit(unaligned.clone()).unwrap();
    let message = unaligned.wait().await;
    assert!(
        message.error_message().unwrap().contains("multiple of 4"),
        "got: {message:?}"
    );

    assert!(mock.sent().is_empty());
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn transactions_dispatch_in_submission_order() {
    init_logs();
    let mock = MockWire::new();
    mock.enqueue_response("w 00000000 00000001 ");
    mock.enqueue_response("w 00000004 00000002 ");
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let first = Transaction::write(0x0, vec![1, 0, 0, 0]);
    let second = Transaction::write(0x4, vec![2, 0, 0, 0]);
    bridge.submit(first.clone()).unwrap();
    bridge.submit(second.clone()).unwrap();

    assert!(first.wait().await.is_done());
    assert!(second.wait().await.is_done());
    assert_eq!(
        mock.sent(),
        vec!["w 00000000 00000001 \n", "w 00000004 00000002 \n"],
        "wire order equals submission order"
    );
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_transaction() {
    init_logs();
    let mock = MockWire::new();
    mock.enqueue_response("w 00001000 00000001 ");
    let mut bridge = UartBridge::new("mock-uart", mock.clone());

    let txn = Transaction::write(0x1000, vec![1, 0, 0, 0]);
    bridge.submit(txn.clone()).unwrap();
    bridge.shutdown().await.unwrap();

    // The worker has been joined, so the outcome must already be terminal.
    assert_eq!(txn.outcome().await, Outcome::Done);
}

#[tokio::test]
async fn shutdown_with_empty_queue_is_safe_and_idempotent() {
    init_logs();
    let mut bridge = UartBridge::new("mock-uart", MockWire::new());
    bridge.shutdown().await.unwrap();
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn submit_after_shutdown_is_rejected() {
    init_logs();
    let mut bridge = UartBridge::new("mock-uart", MockWire::new());
    bridge.shutdown().await.unwrap();

    let txn = Transaction::write(0x0, vec![0; 4]);
    let err = bridge.submit(txn).expect_err("submit must fail after shutdown");
    assert!(err.to_string().contains("stopped"));
}
