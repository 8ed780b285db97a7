//! Integration tests for invoice creation, deletion and status override.

mod common;

use common::{dec, spawn_app};
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn invoice_creation_computes_totals_and_reserves_stock() {
    let Some(app) = spawn_app().await else { return };

    let part = app.create_part("Brake pad", 100, 10).await;
    let part_id = part["part_id"].as_str().unwrap();

    let response = app
        .post_invoice(
            "Asha Motors",
            json!([{ "part_id": part_id, "quantity": 3, "unit_price": 100 }]),
            18,
        )
        .await;
    assert_eq!(response.status(), 201);

    let invoice: serde_json::Value = response.json().await.unwrap();
    assert_eq!(dec(&invoice["subtotal"]), Decimal::from(300));
    assert_eq!(dec(&invoice["tax_amount"]), Decimal::from(54));
    assert_eq!(dec(&invoice["grand_total"]), Decimal::from(354));
    assert_eq!(invoice["status"], "pending");
    assert!(invoice["invoice_number"]
        .as_str()
        .unwrap()
        .starts_with("INV-"));
    assert_eq!(invoice["items"].as_array().unwrap().len(), 1);

    let reserved = app.get_part(part_id).await;
    assert_eq!(reserved["quantity"], 7);
}

#[tokio::test]
async fn insufficient_stock_persists_nothing() {
    let Some(app) = spawn_app().await else { return };

    let part = app.create_part("Battery", 90, 2).await;
    let part_id = part["part_id"].as_str().unwrap();
    let customer = format!("NoStock-{}", uuid::Uuid::new_v4().simple());

    let response = app
        .post_invoice(&customer, json!([{ "part_id": part_id, "quantity": 5 }]), 18)
        .await;
    assert_eq!(response.status(), 409);

    let unchanged = app.get_part(part_id).await;
    assert_eq!(unchanged["quantity"], 2);

    // No invoice row was created for this customer.
    let history: serde_json::Value = app
        .client
        .get(format!("{}/customers/{}/history", app.address, customer))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn overdrawn_line_aborts_whole_invoice() {
    let Some(app) = spawn_app().await else { return };

    let a = app.create_part("Spark plug", 12, 10).await;
    let b = app.create_part("Wiper blade", 18, 10).await;
    let c = app.create_part("Radiator", 140, 2).await;

    let response = app
        .post_invoice(
            "Atomicity Garage",
            json!([
                { "part_id": a["part_id"], "quantity": 1 },
                { "part_id": b["part_id"], "quantity": 1 },
                { "part_id": c["part_id"], "quantity": 5 }
            ]),
            18,
        )
        .await;
    assert_eq!(response.status(), 409);

    assert_eq!(app.get_part(a["part_id"].as_str().unwrap()).await["quantity"], 10);
    assert_eq!(app.get_part(b["part_id"].as_str().unwrap()).await["quantity"], 10);
    assert_eq!(app.get_part(c["part_id"].as_str().unwrap()).await["quantity"], 2);
}

#[tokio::test]
async fn deletion_restores_reserved_stock() {
    let Some(app) = spawn_app().await else { return };

    let part = app.create_part("Clutch kit", 200, 6).await;
    let part_id = part["part_id"].as_str().unwrap();

    let response = app
        .post_invoice(
            "Reversal Garage",
            json!([{ "part_id": part_id, "quantity": 4 }]),
            18,
        )
        .await;
    assert_eq!(response.status(), 201);
    let invoice: serde_json::Value = response.json().await.unwrap();
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    assert_eq!(app.get_part(part_id).await["quantity"], 2);

    let deleted = app
        .client
        .delete(format!("{}/invoices/{}", app.address, invoice_id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);

    assert_eq!(app.get_part(part_id).await["quantity"], 6);

    let gone = app
        .client
        .get(format!("{}/invoices/{}", app.address, invoice_id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn manual_status_override_is_allowed() {
    let Some(app) = spawn_app().await else { return };

    let part = app.create_part("Head gasket", 75, 5).await;
    let response = app
        .post_invoice(
            "Override Garage",
            json!([{ "part_id": part["part_id"], "quantity": 1 }]),
            18,
        )
        .await;
    let invoice: serde_json::Value = response.json().await.unwrap();
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    let overridden = app
        .client
        .patch(format!("{}/invoices/{}/status", app.address, invoice_id))
        .json(&json!({ "status": "paid" }))
        .send()
        .await
        .unwrap();
    assert_eq!(overridden.status(), 200);

    let body: serde_json::Value = overridden.json().await.unwrap();
    assert_eq!(body["status"], "paid");
    assert_eq!(dec(&body["paid_amount"]), Decimal::ZERO);

    let invalid = app
        .client
        .patch(format!("{}/invoices/{}/status", app.address, invoice_id))
        .json(&json!({ "status": "void" }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 400);
}

#[tokio::test]
async fn missing_fields_are_rejected_before_persistence() {
    let Some(app) = spawn_app().await else { return };

    let response = app.post_invoice("", json!([]), 18).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_invoice_returns_not_found() {
    let Some(app) = spawn_app().await else { return };

    let missing = uuid::Uuid::new_v4();
    let fetched = app
        .client
        .get(format!("{}/invoices/{}", app.address, missing))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), 404);

    let deleted = app
        .client
        .delete(format!("{}/invoices/{}", app.address, missing))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 404);
}
