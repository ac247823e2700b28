//! Admin endpoints over HTTP.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use dub_core::ItemType;
use dub_integration_tests::{ADMIN_ID, TestContext, catalog_item};

const PLAYER: &str = "200000000000000002";
const OUTFIT: &str = "CID_313_Athena_Commando_M_KpopFashion";

async fn error_code(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["error"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let ctx = TestContext::new().await;
    let token = ctx.signup(PLAYER).await;

    let resp = ctx.get("/api/admin/stats", &token).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(resp).await, "forbidden");

    let resp = ctx
        .post(
            "/api/admin/give-vbucks",
            &token,
            &json!({ "external_id": PLAYER, "amount": 100 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_ban_and_unban() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;
    ctx.register(PLAYER).await;

    let resp = ctx
        .post("/api/admin/ban", &admin, &json!({ "external_id": PLAYER, "reason": "no" }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .post(
            "/api/admin/ban",
            &admin,
            &json!({ "external_id": PLAYER, "reason": "scamming" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ban"]["reason"], "scamming");
    assert_eq!(body["ban"]["banned_by"], format!("player{ADMIN_ID}"));

    let resp = ctx
        .post(
            "/api/admin/ban",
            &admin,
            &json!({ "external_id": PLAYER, "reason": "scamming again" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let unban = json!({ "external_id": PLAYER });
    let resp = ctx.post("/api/admin/unban", &admin, &unban).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body["ban"].is_null());

    let resp = ctx.post("/api/admin/unban", &admin, &unban).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.login(PLAYER).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_banned_account_cannot_buy() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;
    ctx.seed(&[catalog_item(OUTFIT, ItemType::Outfit, 800, "10.00")]).await;
    ctx.post("/api/admin/refresh-shop", &admin, &json!({})).await;
    let token = ctx.signup(PLAYER).await;
    ctx.post(
        "/api/admin/ban",
        &admin,
        &json!({ "external_id": PLAYER, "reason": "scamming" }),
    )
    .await;

    let resp = ctx
        .post(
            "/api/user/buy",
            &token,
            &json!({ "item_id": OUTFIT, "category": "outfit" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(resp).await, "banned");

    // Corrective operations still apply
    let resp = ctx
        .post(
            "/api/admin/give-vbucks",
            &admin,
            &json!({ "external_id": PLAYER, "amount": 50 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_banned_account_cannot_read_its_data() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;
    let token = ctx.signup(PLAYER).await;
    let resp = ctx
        .post(
            "/api/admin/ban",
            &admin,
            &json!({ "external_id": PLAYER, "reason": "scamming" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    for path in [
        "/api/user/profile",
        "/api/user/locker",
        "/api/user/balance",
        "/api/user/transactions",
        "/api/rewards",
    ] {
        let resp = ctx.get(path, &token).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
        assert_eq!(error_code(resp).await, "banned", "{path}");
    }

    // The token itself is still valid and reports the ban
    let resp = ctx.get("/api/auth/verify", &token).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["valid"], true);
    assert_eq!(body["ban"]["reason"], "scamming");

    let resp = ctx
        .post("/api/admin/unban", &admin, &json!({ "external_id": PLAYER }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(ctx.get("/api/user/profile", &token).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_give_and_set_vbucks() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;
    let token = ctx.signup(PLAYER).await;

    for amount in [0, 1_000_001] {
        let resp = ctx
            .post(
                "/api/admin/give-vbucks",
                &admin,
                &json!({ "external_id": PLAYER, "amount": amount }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{amount}");
    }

    let resp = ctx
        .post(
            "/api/admin/give-vbucks",
            &admin,
            &json!({ "external_id": PLAYER, "amount": 250 }),
        )
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["balance"], 1250);

    let resp = ctx
        .post(
            "/api/admin/set-vbucks",
            &admin,
            &json!({ "external_id": PLAYER, "amount": 0 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let history: Value = ctx
        .get("/api/user/transactions?limit=2", &token)
        .await
        .json()
        .await
        .unwrap();
    let set = &history["transactions"][0];
    assert_eq!(set["kind"], "admin_grant");
    assert_eq!(set["delta"], -1250);
    assert!(set["description"].as_str().unwrap().contains("1250 -> 0"));
    assert_eq!(history["transactions"][1]["delta"], 250);
    assert_eq!(history["transactions"][1]["counterparty"], ADMIN_ID);

    let resp = ctx
        .post(
            "/api/admin/give-vbucks",
            &admin,
            &json!({ "external_id": "999999999999999999", "amount": 5 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_give_and_remove_item() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;
    ctx.seed(&[catalog_item(OUTFIT, ItemType::Outfit, 800, "10.00")]).await;
    ctx.register(PLAYER).await;
    let item = json!({ "external_id": PLAYER, "item_id": OUTFIT });

    let resp = ctx.post("/api/admin/give-item", &admin, &item).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["locker"]["outfits"], 2);

    let resp = ctx.post("/api/admin/give-item", &admin, &item).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(resp).await, "already_owned");

    let resp = ctx.post("/api/admin/remove-item", &admin, &item).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let remove = json!({ "external_id": PLAYER, "item_id": OUTFIT, "category": "outfit" });
    let resp = ctx.post("/api/admin/remove-item", &admin, &remove).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["locker"]["outfits"], 1);

    let resp = ctx.post("/api/admin/remove-item", &admin, &remove).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(resp).await, "item_not_owned");
}

#[tokio::test]
async fn test_view_and_delete_account() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;
    ctx.register(PLAYER).await;

    let resp = ctx.get(&format!("/api/admin/accounts/{PLAYER}"), &admin).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["account"]["external_id"], PLAYER);
    assert_eq!(body["total_transactions"], 2);
    assert_eq!(body["recent_transactions"].as_array().unwrap().len(), 2);

    let resp = ctx.delete(&format!("/api/admin/accounts/{PLAYER}"), &admin).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = ctx.get(&format!("/api/admin/accounts/{PLAYER}"), &admin).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = ctx.delete(&format!("/api/admin/accounts/{PLAYER}"), &admin).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(
        ctx.store
            .all_entries()
            .await
            .iter()
            .all(|entry| entry.account.as_str() != PLAYER)
    );
}

#[tokio::test]
async fn test_stats() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;
    ctx.seed(&[catalog_item(OUTFIT, ItemType::Outfit, 800, "10.00")]).await;
    ctx.post("/api/admin/refresh-shop", &admin, &json!({})).await;
    let token = ctx.signup(PLAYER).await;
    ctx.post(
        "/api/user/buy",
        &token,
        &json!({ "item_id": OUTFIT, "category": "outfit" }),
    )
    .await;

    let resp = ctx.get("/api/admin/stats", &admin).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total_accounts"], 2);
    assert_eq!(body["admins"], 1);
    assert_eq!(body["purchases"], 1);
    assert_eq!(body["vbucks_spent"], 800);
    assert_eq!(body["vbucks_in_circulation"], 1200);
    assert_eq!(body["active_shops"], 1);
    assert_eq!(body["catalog_size"], 1);
    assert_eq!(body["season"], "15");
    assert_eq!(body["version"], "15.30");
}
