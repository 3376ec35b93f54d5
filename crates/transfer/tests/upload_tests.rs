use httpmock::Method::{POST, PUT};
use httpmock::MockServer;
use launchpad_core::{RetryPolicy, UploadOperation};
use launchpad_transfer::{TransferError, UploadExecutor};
use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn alphabet_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(ALPHABET).unwrap();
    file.flush().unwrap();
    file
}

fn fast_retries(max_retries: i32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        log_retries: false,
    }
}

#[tokio::test]
async fn test_two_operations_deliver_exact_slices() {
    if !can_bind_localhost() {
        eprintln!("skipping test: cannot bind to localhost");
        return;
    }
    let server = MockServer::start_async().await;
    let op0 = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/op0")
                .header("X-Test", "alpha")
                .body("abcde");
            then.status(200);
        })
        .await;
    let op1 = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/op1")
                .header("X-Test", "bravo")
                .body("fghi");
            then.status(200);
        })
        .await;

    let file = alphabet_file();
    let operations = vec![
        UploadOperation::new("PUT", server.url("/op0"), 0, 5).with_header("X-Test", "alpha"),
        UploadOperation::new("PUT", server.url("/op1"), 5, 4).with_header("X-Test", "bravo"),
    ];

    let report = UploadExecutor::new(reqwest::Client::new())
        .with_concurrency(2)
        .execute(file.path(), &operations)
        .await
        .unwrap();

    op0.assert_async().await;
    op1.assert_async().await;
    assert_eq!(report.operations, 2);
    assert_eq!(report.bytes_sent, 9);
}

#[tokio::test]
async fn test_slices_independent_of_concurrency() {
    if !can_bind_localhost() {
        eprintln!("skipping test: cannot bind to localhost");
        return;
    }
    let file = alphabet_file();
    let count = 6;

    for concurrency in [1, 2, count] {
        let server = MockServer::start_async().await;
        let mut mocks = Vec::new();
        let mut operations = Vec::new();

        for i in 0..count {
            let offset = (i * 4) as u64;
            let length = if i + 1 == count { 26 - offset } else { 4 };
            let expected = &ALPHABET[offset as usize..(offset + length) as usize];
            let path = format!("/part/{i}");
            let tag = format!("part-{i}");

            let mock = server
                .mock_async(|when, then| {
                    when.method(PUT)
                        .path(path.clone())
                        .header("X-Part", tag.clone())
                        .body(String::from_utf8(expected.to_vec()).unwrap());
                    then.status(200);
                })
                .await;
            mocks.push(mock);
            operations.push(
                UploadOperation::new("PUT", server.url(&path), offset, length)
                    .with_header("X-Part", tag),
            );
        }

        let report = UploadExecutor::new(reqwest::Client::new())
            .with_concurrency(concurrency)
            .execute(file.path(), &operations)
            .await
            .unwrap();

        assert_eq!(report.operations, count, "concurrency {concurrency}");
        assert_eq!(report.bytes_sent, 26);
        for mock in &mocks {
            mock.assert_hits_async(1).await;
        }
    }
}

#[tokio::test]
async fn test_range_past_end_issues_no_requests() {
    if !can_bind_localhost() {
        eprintln!("skipping test: cannot bind to localhost");
        return;
    }
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;

    let file = alphabet_file();
    let operations = vec![
        UploadOperation::new("PUT", server.url("/op0"), 0, 5),
        UploadOperation::new("PUT", server.url("/op1"), 20, 10),
    ];

    let err = UploadExecutor::new(reqwest::Client::new())
        .execute(file.path(), &operations)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TransferError::Core(launchpad_core::Error::InvalidRange { index: 1, .. })
    ));
    assert_eq!(any.hits_async().await, 0);
}

#[tokio::test]
async fn test_server_error_reports_failing_operation() {
    if !can_bind_localhost() {
        eprintln!("skipping test: cannot bind to localhost");
        return;
    }
    let server = MockServer::start_async().await;
    let ok = server
        .mock_async(|when, then| {
            when.method(PUT).path("/op0");
            then.status(200);
        })
        .await;
    let failing = server
        .mock_async(|when, then| {
            when.method(PUT).path("/op1");
            then.status(500).body("boom");
        })
        .await;

    let file = alphabet_file();
    let operations = vec![
        UploadOperation::new("PUT", server.url("/op0"), 0, 5),
        UploadOperation::new("PUT", server.url("/op1"), 5, 4),
    ];

    let err = UploadExecutor::new(reqwest::Client::new())
        .with_concurrency(2)
        .with_retry(fast_retries(3))
        .execute(file.path(), &operations)
        .await
        .unwrap_err();

    match err {
        TransferError::Operation { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, TransferError::Status { status: 500, .. }));
        }
        other => panic!("expected Operation error, got {other:?}"),
    }
    // 500 without Retry-After is terminal, and the sibling still completed.
    failing.assert_hits_async(1).await;
    ok.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_rate_limited_operation_is_retried() {
    if !can_bind_localhost() {
        eprintln!("skipping test: cannot bind to localhost");
        return;
    }
    let server = MockServer::start_async().await;
    let limited = server
        .mock_async(|when, then| {
            when.method(PUT).path("/op0");
            then.status(429).header("Retry-After", "0");
        })
        .await;

    let file = alphabet_file();
    let operations = vec![UploadOperation::new("PUT", server.url("/op0"), 0, 5)];

    let err = UploadExecutor::new(reqwest::Client::new())
        .with_retry(fast_retries(2))
        .execute(file.path(), &operations)
        .await
        .unwrap_err();

    match err {
        TransferError::Operation { index: 0, source } => {
            assert!(matches!(
                *source,
                TransferError::RetryExhausted { attempts: 3, .. }
            ));
        }
        other => panic!("expected Operation error, got {other:?}"),
    }
    limited.assert_hits_async(3).await;
}

#[tokio::test]
async fn test_operation_method_is_honored() {
    if !can_bind_localhost() {
        eprintln!("skipping test: cannot bind to localhost");
        return;
    }
    let server = MockServer::start_async().await;
    let post = server
        .mock_async(|when, then| {
            when.method(POST).path("/post").body("xyz");
            then.status(201);
        })
        .await;

    let file = alphabet_file();
    let operations = vec![UploadOperation::new("post", server.url("/post"), 23, 3)];

    UploadExecutor::new(reqwest::Client::new())
        .execute(file.path(), &operations)
        .await
        .unwrap();
    post.assert_async().await;
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let operations = vec![UploadOperation::new("PUT", "http://127.0.0.1:9/op0", 0, 1)];
    let err = UploadExecutor::new(reqwest::Client::new())
        .execute(std::path::Path::new("/nonexistent/launchpad.ipa"), &operations)
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Io(_)));
}

#[tokio::test]
async fn test_cancelled_upload_reports_cancellation() {
    if !can_bind_localhost() {
        eprintln!("skipping test: cannot bind to localhost");
        return;
    }
    let server = MockServer::start_async().await;
    let _slow = server
        .mock_async(|when, then| {
            when.method(PUT).path("/slow");
            then.status(200).delay(Duration::from_secs(5));
        })
        .await;

    let file = alphabet_file();
    let operations = vec![UploadOperation::new("PUT", server.url("/slow"), 0, 26)];
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = UploadExecutor::new(reqwest::Client::new())
        .with_cancellation(cancel)
        .execute(file.path(), &operations)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(4));
}
