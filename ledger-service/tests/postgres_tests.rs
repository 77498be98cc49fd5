use std::sync::Arc;

use common::decimal::{dec, Amount};
use common::error::Error;
use common::model::card::CardNetwork;
use common::model::transaction::ActionKind;
use common::model::user::NewUser;
use dotenv::dotenv;
use ledger_service::{LedgerService, StoreType};
use uuid::Uuid;

// PostgreSQL integration tests for the ledger service
// These tests require a running PostgreSQL database
// Run with: cargo test --test postgres_tests -- --ignored

async fn create_test_service() -> LedgerService {
    dotenv().ok();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run PostgreSQL tests");

    LedgerService::with_repository(StoreType::Postgres(Some(database_url)))
        .await
        .expect("Failed to create ledger service with PostgreSQL stores")
}

async fn register(service: &LedgerService) -> Uuid {
    let user = service
        .register_user(NewUser {
            name: "Postgres Tester".to_string(),
            address: "5432 Port Road".to_string(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password: "secret".to_string(),
            age: 25,
            country: "US".to_string(),
            state: "WA".to_string(),
        })
        .await
        .unwrap();
    user.id
}

#[tokio::test]
#[ignore = "Requires test database"]
async fn test_postgres_open_and_deposit() {
    let service = create_test_service().await;
    let owner = register(&service).await;

    let card = service.open_card(owner, CardNetwork::MasterCard).await.unwrap();
    let stored = service.get_card(&card.number).await.unwrap().unwrap();
    assert_eq!(stored.balance, Amount::ZERO);
    assert_eq!(stored.network, CardNetwork::MasterCard);

    let balance = service.deposit(owner, &card.number, dec!(50.25)).await.unwrap();
    assert_eq!(balance, dec!(50.25));

    let history = service.transaction_history(&card.number).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].action_kind, ActionKind::Deposit);
    assert_eq!(history[1].amount, dec!(50.25));
}

#[tokio::test]
#[ignore = "Requires test database"]
async fn test_postgres_transfer() {
    let service = create_test_service().await;
    let owner = register(&service).await;
    let source = service.open_card(owner, CardNetwork::Visa).await.unwrap();
    let destination = service.open_card(owner, CardNetwork::Visa).await.unwrap();
    service.deposit(owner, &source.number, dec!(100)).await.unwrap();

    let receipt = service
        .transfer(&source.number, &destination.number, dec!(30), &source.security_code)
        .await
        .unwrap();
    assert_eq!(receipt.from_balance, dec!(70));
    assert_eq!(receipt.to_balance, dec!(30));

    let result = service
        .transfer(&source.number, &destination.number, dec!(500), &source.security_code)
        .await;
    assert!(matches!(result, Err(Error::InsufficientFunds(_))));

    let source = service.get_card(&source.number).await.unwrap().unwrap();
    assert_eq!(source.balance, dec!(70));
    assert_eq!(source.version, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires test database"]
async fn test_postgres_concurrent_transfers() {
    let service = Arc::new(create_test_service().await);
    let owner = register(&service).await;
    let source = service.open_card(owner, CardNetwork::Visa).await.unwrap();
    let destination = service.open_card(owner, CardNetwork::Visa).await.unwrap();
    service.deposit(owner, &source.number, dec!(100)).await.unwrap();

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let service = Arc::clone(&service);
            let (from, to, code) = (source.number.clone(), destination.number.clone(), source.security_code.clone());
            tokio::spawn(async move { service.transfer(&from, &to, dec!(10), &code).await })
        })
        .collect();

    let succeeded = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter(|result| matches!(result, Ok(Ok(_))))
        .count();

    assert_eq!(succeeded, 10);
    let source = service.get_card(&source.number).await.unwrap().unwrap();
    let destination = service.get_card(&destination.number).await.unwrap().unwrap();
    assert_eq!(source.balance, Amount::ZERO);
    assert_eq!(destination.balance, dec!(100));
}

#[tokio::test]
#[ignore = "Requires test database"]
async fn test_postgres_users() {
    let service = create_test_service().await;
    let owner = register(&service).await;

    let user = service.get_user(owner).await.unwrap().unwrap();
    let duplicate = service
        .register_user(NewUser {
            name: user.name.clone(),
            address: user.address.clone(),
            email: user.email.clone(),
            password: "other".to_string(),
            age: 30,
            country: user.country.clone(),
            state: user.state.clone(),
        })
        .await;
    assert!(matches!(duplicate, Err(Error::UserAlreadyExists(_))));
}
