//! Common test utilities for autoparts-service integration tests.

use autoparts_service::config::{DatabaseConfig, ServiceConfig};
use autoparts_service::startup::Application;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use std::str::FromStr;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,autoparts_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Spawn a test application bound to a random port. Returns `None` (and the
/// test should bail out) when `TEST_DATABASE_URL` is not configured, so the
/// suite passes on machines without a PostgreSQL instance.
pub async fn spawn_app() -> Option<TestApp> {
    init_tracing();

    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        }
    };

    let config = ServiceConfig {
        common: CommonConfig { port: 0 },
        service_name: "autoparts-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
    };

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let address = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();

    // Wait for the server to accept connections.
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/health", address)).send().await {
            Ok(_) => break,
            Err(_) if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Server did not come up after 20 attempts: {}", e),
        }
    }

    Some(TestApp { address, client })
}

impl TestApp {
    /// Create a part with a unique part number and return its JSON body.
    pub async fn create_part(&self, name: &str, cost: i64, quantity: i32) -> Value {
        let part_number = format!("PN-{}", Uuid::new_v4());
        let response = self
            .client
            .post(format!("{}/inventory", self.address))
            .json(&json!({
                "part_name": name,
                "part_number": part_number,
                "brand": "Bosch",
                "cost": cost,
                "quantity": quantity,
                "category": "test-parts",
                "min_stock_level": 1
            }))
            .send()
            .await
            .expect("Failed to create part");
        assert_eq!(response.status(), 201, "part creation must succeed");
        response.json().await.expect("part body")
    }

    /// POST an invoice; returns the raw response for status assertions.
    pub async fn post_invoice(
        &self,
        customer: &str,
        items: Value,
        tax_rate: i64,
    ) -> reqwest::Response {
        self.client
            .post(format!("{}/invoices", self.address))
            .json(&json!({
                "customer_name": customer,
                "items": items,
                "tax_rate": tax_rate,
                "payment_method": "cash"
            }))
            .send()
            .await
            .expect("Failed to post invoice")
    }

    /// POST a payment; returns the raw response.
    pub async fn post_payment(
        &self,
        invoice_id: Option<&str>,
        payer: &str,
        amount: &str,
    ) -> reqwest::Response {
        self.client
            .post(format!("{}/payments", self.address))
            .json(&json!({
                "invoice_id": invoice_id,
                "payer_name": payer,
                "amount": amount,
                "payment_method": "cash"
            }))
            .send()
            .await
            .expect("Failed to post payment")
    }

    /// Fetch a part's current JSON body.
    pub async fn get_part(&self, part_id: &str) -> Value {
        let response = self
            .client
            .get(format!("{}/inventory/{}", self.address, part_id))
            .send()
            .await
            .expect("Failed to get part");
        assert_eq!(response.status(), 200);
        response.json().await.expect("part body")
    }
}

/// Parse a JSON number-or-string field as a `Decimal`.
pub fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("Not a decimal value: {}", other),
    }
}
