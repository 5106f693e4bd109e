use bigdecimal::BigDecimal;
use paybridge_core::adapters::{InMemoryTransactionRepository, InMemoryWalletRepository};
use paybridge_core::config::GatewaySettings;
use paybridge_core::domain::TransactionStatus;
use paybridge_core::error::AppError;
use paybridge_core::gateway::{GatewayClient, GatewayName, GatewayRouter, JsonGateway, SoapGateway};
use paybridge_core::ports::TransactionRepository;
use paybridge_core::services::{
    PaymentInstruction, PaymentService, Reconciler, SubmissionQueue, SubmissionWorker,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const CALLBACK_PATTERN: &str =
    "http://core:8080/api/v1/wallets/{wallet_id}/transactions/{transaction_id}/callback";

struct Harness {
    payments: PaymentService,
    reconciler: Reconciler,
    worker: SubmissionWorker,
    transactions: Arc<InMemoryTransactionRepository>,
}

fn harness(gateway_a_url: &str, gateway_b_url: &str) -> Harness {
    let mut settings_a = GatewaySettings::for_base_url(gateway_a_url);
    settings_a.retry_delay = Duration::from_millis(10);
    let mut settings_b = GatewaySettings::for_base_url(gateway_b_url);
    settings_b.retry_delay = Duration::from_millis(10);

    let router = GatewayRouter::new()
        .register(Arc::new(JsonGateway::new(
            GatewayClient::new(GatewayName::from("gateway_a"), &settings_a).unwrap(),
        )))
        .register(Arc::new(SoapGateway::new(
            GatewayClient::new(GatewayName::from("gateway_b"), &settings_b).unwrap(),
        )));

    let transactions = Arc::new(InMemoryTransactionRepository::new());
    let wallets = Arc::new(InMemoryWalletRepository::new());
    let queue = Arc::new(SubmissionQueue::new());

    Harness {
        payments: PaymentService::new(
            transactions.clone(),
            wallets,
            router.clone(),
            queue.clone(),
        ),
        reconciler: Reconciler::new(transactions.clone(), router.clone()),
        worker: SubmissionWorker::new(
            queue,
            transactions.clone(),
            router,
            CALLBACK_PATTERN.to_string(),
            Duration::from_millis(10),
        ),
        transactions,
    }
}

fn card_deposit(gateway: &str) -> PaymentInstruction {
    PaymentInstruction {
        gateway: GatewayName::from(gateway),
        method: "credit_card".to_string(),
        method_details: json!({
            "number": "4111111111111111",
            "expiry": "12/39",
            "cvv": "123"
        }),
    }
}

fn bank_withdrawal(gateway: &str) -> PaymentInstruction {
    PaymentInstruction {
        gateway: GatewayName::from(gateway),
        method: "bank_transfer".to_string(),
        method_details: json!({
            "account_number": "12345678901",
            "bank_code": "DEUTDEFF",
            "bank_code_type": "SWIFT"
        }),
    }
}

#[tokio::test]
async fn test_deposit_is_submitted_then_completed_by_callback() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/deposit")
        .with_status(200)
        .with_body(r#"{"status":"pending","message":"accepted","id":"REF1"}"#)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server.url(), "http://127.0.0.1:9");
    let (_stop, shutdown) = watch::channel(false);

    let wallet = h.payments.create_wallet().await.unwrap();
    let tx = h
        .payments
        .deposit(wallet.id, BigDecimal::from(100), card_deposit("gateway_a"))
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Created);

    assert!(h.worker.process_next(&shutdown).await);
    assert!(!h.worker.process_next(&shutdown).await);
    mock.assert_async().await;

    let pending = h.transactions.get_by_id(tx.id).await.unwrap();
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert_eq!(pending.reference_id.as_deref(), Some("REF1"));

    // A callback for another reference is rejected and changes nothing.
    let err = h
        .reconciler
        .process_callback(wallet.id, tx.id, br#"{"status":"success","id":"REF2"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert_eq!(
        h.transactions.get_by_id(tx.id).await.unwrap().status,
        TransactionStatus::Pending
    );

    let completed = h
        .reconciler
        .process_callback(wallet.id, tx.id, br#"{"status":"success","id":"REF1"}"#)
        .await
        .unwrap();
    assert_eq!(completed.status, TransactionStatus::Completed);

    let listed = h.payments.list_transactions(wallet.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, TransactionStatus::Completed);
    assert_eq!(listed[0].payment_method_details["number"], "**** **** **** 1111");
}

#[tokio::test]
async fn test_soap_withdrawal_failed_by_callback() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/withdraw")
        .with_status(200)
        .with_body(
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><status>pending</status><id>SOAP-9</id></SOAP-ENV:Body></SOAP-ENV:Envelope>"#,
        )
        .expect(1)
        .create_async()
        .await;

    let h = harness("http://127.0.0.1:9", &server.url());
    let (_stop, shutdown) = watch::channel(false);

    let wallet = h.payments.create_wallet().await.unwrap();
    let tx = h
        .payments
        .withdraw(wallet.id, BigDecimal::from(25), bank_withdrawal("gateway_b"))
        .await
        .unwrap();

    assert!(h.worker.process_next(&shutdown).await);
    mock.assert_async().await;

    let failed = h
        .reconciler
        .process_callback(
            wallet.id,
            tx.id,
            br#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><status>failed</status><id>SOAP-9</id></soap:Body></soap:Envelope>"#,
        )
        .await
        .unwrap();
    assert_eq!(failed.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn test_rejected_submission_fails_transaction() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/deposit")
        .with_status(422)
        .with_body(r#"{"status":"failed","message":"card declined"}"#)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server.url(), "http://127.0.0.1:9");
    let (_stop, shutdown) = watch::channel(false);

    let wallet = h.payments.create_wallet().await.unwrap();
    let tx = h
        .payments
        .deposit(wallet.id, BigDecimal::from(10), card_deposit("gateway_a"))
        .await
        .unwrap();

    assert!(h.worker.process_next(&shutdown).await);
    mock.assert_async().await;

    let failed = h.transactions.get_by_id(tx.id).await.unwrap();
    assert_eq!(failed.status, TransactionStatus::Failed);
    assert!(failed.reference_id.is_none());
    assert!(failed
        .failure_reason
        .as_deref()
        .is_some_and(|reason| reason.contains("422")));

    // Failed submissions never accept callbacks.
    let err = h
        .reconciler
        .process_callback(wallet.id, tx.id, br#"{"status":"success","id":"X"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_worker_drains_queue_in_order_and_stops_on_shutdown() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/deposit")
        .with_status(200)
        .with_body(r#"{"status":"pending","id":"REF-BATCH"}"#)
        .expect(3)
        .create_async()
        .await;

    let h = harness(&server.url(), "http://127.0.0.1:9");
    let wallet = h.payments.create_wallet().await.unwrap();
    let mut ids = Vec::new();
    for amount in [1, 2, 3] {
        let tx = h
            .payments
            .deposit(wallet.id, BigDecimal::from(amount), card_deposit("gateway_a"))
            .await
            .unwrap();
        ids.push(tx.id);
    }

    let (stop, shutdown) = watch::channel(false);
    let transactions = h.transactions.clone();
    let worker = tokio::spawn(h.worker.run(shutdown));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let mut pending = 0;
        for id in &ids {
            if transactions.get_by_id(*id).await.unwrap().status == TransactionStatus::Pending {
                pending += 1;
            }
        }
        if pending == ids.len() || tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    stop.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), worker)
        .await
        .unwrap()
        .unwrap();

    for id in &ids {
        assert_eq!(
            transactions.get_by_id(*id).await.unwrap().status,
            TransactionStatus::Pending
        );
    }
    mock.assert_async().await;
}
