//! Workspace-level test fixtures for the card ledger
//!
//! The integration tests under `tests/` exercise the ledger end to end; this
//! library holds the setup they share.

use common::decimal::Amount;
use common::error::Result;
use common::model::card::{Card, CardNetwork};
use common::model::user::NewUser;
use ledger_service::LedgerService;
use uuid::Uuid;

/// Registration payload for a throwaway adult user
pub fn sample_user(email: &str) -> NewUser {
    NewUser {
        name: "Fixture User".to_string(),
        address: "1 Test Lane".to_string(),
        email: email.to_string(),
        password: "fixture-password".to_string(),
        age: 30,
        country: "US".to_string(),
        state: "CA".to_string(),
    }
}

/// Register one user and open a card per entry of `balances`, funded by deposits
pub async fn open_funded_cards(service: &LedgerService, balances: &[Amount]) -> Result<(Uuid, Vec<Card>)> {
    let user = service
        .register_user(sample_user(&format!("{}@example.com", Uuid::new_v4())))
        .await?;

    let mut cards = Vec::with_capacity(balances.len());
    for balance in balances {
        let card = service.open_card(user.id, CardNetwork::Visa).await?;
        if *balance > Amount::ZERO {
            service.deposit(user.id, &card.number, *balance).await?;
        }
        let funded = service
            .get_card(&card.number)
            .await?
            .unwrap_or(card);
        cards.push(funded);
    }

    Ok((user.id, cards))
}

/// Sum of the current balances of `cards`
pub async fn total_balance(service: &LedgerService, cards: &[Card]) -> Result<Amount> {
    let mut total = Amount::ZERO;
    for card in cards {
        if let Some(current) = service.get_card(&card.number).await? {
            total += current.balance;
        }
    }
    Ok(total)
}
