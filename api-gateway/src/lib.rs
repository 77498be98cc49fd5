//! HTTP front end for the card ledger

pub mod api;
pub mod config;
pub mod error;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use ledger_service::LedgerService;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// App state shared across handlers
pub struct AppState {
    /// Ledger service
    pub ledger_service: Arc<LedgerService>,
}

/// API documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // User routes
        api::user::register,
        api::user::get_user,
        api::user::update_user,
        api::user::login,
        // Card routes
        api::card::open_card,
        api::card::get_card,
        api::card::get_history,
        api::card::deposit,
        api::card::transfer,
    ),
    components(
        schemas(
            common::model::user::User,
            common::model::user::NewUser,
            common::model::user::UserUpdate,
            common::model::user::Credentials,
            common::model::card::Card,
            common::model::card::CardNetwork,
            common::model::transaction::TransactionRecord,
            common::model::transaction::ActionKind,
            common::model::request::OpenCardRequest,
            common::model::request::IssuedCard,
            common::model::request::DepositRequest,
            common::model::request::DepositReceipt,
            common::model::request::TransferRequest,
            common::model::request::TransferReceipt,
            api::response::ResponseMetadata,
        )
    ),
    tags(
        (name = "user", description = "User registration and login"),
        (name = "card", description = "Cards, deposits and transfers")
    ),
    info(
        title = "Card Ledger API",
        version = "1.0.0",
        description = "API for opening cards, depositing cash and transferring funds between cards"
    )
)]
pub struct ApiDoc;

/// Build the application router: API routes under `/api/v1` plus Swagger UI
pub fn app(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // User routes
        .route("/register", post(api::user::register))
        .route("/users/:id", get(api::user::get_user).put(api::user::update_user))
        .route("/login", post(api::user::login))
        // Card routes
        .route("/cards", post(api::card::open_card))
        .route("/cards/:number", get(api::card::get_card))
        .route("/cards/:number/history", get(api::card::get_history))
        .route("/deposit", post(api::card::deposit))
        .route("/transfer", post(api::card::transfer));

    let swagger_ui = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi());

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(swagger_ui)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
