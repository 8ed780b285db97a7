//! Integration tests for reporting and customer endpoints.

mod common;

use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn sales_summary_includes_todays_activity() {
    let Some(app) = spawn_app().await else { return };

    let part = app.create_part("Brake disc", 120, 10).await;
    let response = app
        .post_invoice(
            "Report Garage",
            json!([{ "part_id": part["part_id"], "quantity": 1 }]),
            18,
        )
        .await;
    assert_eq!(response.status(), 201);

    let rows: serde_json::Value = app
        .client
        .get(format!("{}/reports/sales/summary", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let today = chrono::Utc::now().date_naive().to_string();
    let todays_row = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["date"] == today.as_str())
        .expect("today must appear in the sales summary");
    assert!(todays_row["invoice_count"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn inventory_summary_groups_by_category() {
    let Some(app) = spawn_app().await else { return };

    app.create_part("Tail light", 40, 7).await;

    let rows: serde_json::Value = app
        .client
        .get(format!("{}/reports/inventory/summary", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let category_row = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["category"] == "test-parts")
        .expect("seeded category must appear");
    assert!(category_row["total_parts"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn payment_summary_aggregates_by_method() {
    let Some(app) = spawn_app().await else { return };

    app.post_payment(None, "Summary Payer", "42").await;

    let rows: serde_json::Value = app
        .client
        .get(format!("{}/reports/payments/summary", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let cash_row = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["payment_method"] == "cash")
        .expect("cash payments must appear");
    assert!(cash_row["total_payments"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn audit_log_records_stock_movements() {
    let Some(app) = spawn_app().await else { return };

    let part = app.create_part("Muffler", 85, 9).await;
    let response = app
        .post_invoice(
            "Audit Garage",
            json!([{ "part_id": part["part_id"], "quantity": 2 }]),
            18,
        )
        .await;
    assert_eq!(response.status(), 201);

    let rows: serde_json::Value = app
        .client
        .get(format!("{}/reports/audit/logs?limit=50", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let rows = rows.as_array().unwrap();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|row| {
        matches!(
            row["movement_type"].as_str(),
            Some("buy") | Some("sell") | Some("payment")
        )
    }));
}

#[tokio::test]
async fn customers_are_derived_from_invoices() {
    let Some(app) = spawn_app().await else { return };

    let customer = format!("Derived-{}", uuid::Uuid::new_v4().simple());
    let part = app.create_part("Door handle", 25, 8).await;
    let response = app
        .post_invoice(
            &customer,
            json!([{ "part_id": part["part_id"], "quantity": 1 }]),
            18,
        )
        .await;
    assert_eq!(response.status(), 201);

    let customers: serde_json::Value = app
        .client
        .get(format!("{}/customers", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(customers
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["customer_name"] == customer.as_str()));

    let stats: serde_json::Value = app
        .client
        .get(format!("{}/customers/{}/statistics", app.address, customer))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_invoices"].as_i64().unwrap(), 1);

    let unknown = app
        .client
        .get(format!(
            "{}/customers/Nobody-{}/statistics",
            app.address,
            uuid::Uuid::new_v4().simple()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);
}
