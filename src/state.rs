use std::sync::Arc;

use chrono::Duration;

use crate::{
    checkout::{
        Checkout, gateway::PaymentGateway, inventory::InventoryLedger, ledger::OrderLedger,
        sessions::PaymentSessionStore,
    },
    config::AppConfig,
    repository::{AuditRepository, ProductRepository, Stores, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub checkout: Arc<Checkout>,
    pub orders: OrderLedger,
    pub inventory: InventoryLedger,
    pub sessions: Arc<PaymentSessionStore>,
    pub products: Arc<dyn ProductRepository>,
    pub users: Arc<dyn UserRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores, gateway: Arc<dyn PaymentGateway>) -> Self {
        let sessions = Arc::new(PaymentSessionStore::new(Duration::seconds(
            config.payment_session_ttl_secs,
        )));
        let inventory = InventoryLedger::new(stores.products.clone());
        let orders = OrderLedger::new(stores.orders.clone(), inventory.clone());
        let checkout = Arc::new(Checkout::new(
            gateway,
            sessions.clone(),
            inventory.clone(),
            orders.clone(),
            stores.users.clone(),
        ));

        Self {
            config: Arc::new(config),
            checkout,
            orders,
            inventory,
            sessions,
            products: stores.products,
            users: stores.users,
            audit: stores.audit,
        }
    }
}
