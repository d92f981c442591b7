//! Concierge Server - villa guest booking backend
//!
//! # Architecture overview
//!
//! - **Order lifecycle** (`orders`): creation, provider claim race, payment,
//!   split disbursement, invoicing
//! - **Database** (`db`): embedded SurrealDB document store
//! - **Flow channel** (`flow`): end-to-end encrypted interactive forms
//! - **Notifications** (`notify`): channel-aware delivery (messaging platform
//!   vs. live WebSocket sessions)
//! - **External adapters** (`services`): payment gateway, pricing sheet,
//!   messaging API, object storage
//! - **HTTP API** (`api`): axum routes and handlers
//!
//! # Module structure
//!
//! ```text
//! concierge-server/src/
//! ├── core/          # config, state, server, background tasks
//! ├── utils/         # errors, logging, retry policy
//! ├── db/            # models + repositories
//! ├── services/      # external-service adapters
//! ├── orders/        # lifecycle orchestrator
//! ├── flow/          # encrypted Flow protocol
//! ├── notify/        # notification router + connection registry
//! └── api/           # HTTP routes and handlers
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod flow;
pub mod notify;
pub mod orders;
pub mod services;
pub mod utils;

// Re-export public types
pub use core::{Config, Server, ServerState};
pub use db::DbService;
pub use flow::FlowCrypto;
pub use notify::{ConnectionManager, NotificationRouter};
pub use orders::OrderLifecycle;
pub use utils::{AppError, AppResult};
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load .env and initialize logging. Called once from main.
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(
        std::env::var("LOG_LEVEL").ok().as_deref(),
        log_dir.as_deref(),
    )
}

pub fn print_banner() {
    println!(
        r#"
   ______                 _
  / ____/___  ____  _____(_)__  _________ ____
 / /   / __ \/ __ \/ ___/ / _ \/ ___/ __ `/ _ \
/ /___/ /_/ / / / / /__/ /  __/ /  / /_/ /  __/
\____/\____/_/ /_/\___/_/\___/_/   \__, /\___/
                                  /____/
    "#
    );
}
