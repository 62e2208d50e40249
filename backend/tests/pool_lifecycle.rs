//! End-to-end pool lifecycle over the HTTP surface: creation, admission by
//! join code, contribution settlement and membership listings.

mod support;

use actix_web::http::StatusCode;
use actix_web::test;
use chrono::Duration;
use rstest::rstest;
use serde_json::json;

use healthfund::domain::PaymentState;
use support::{
    api_app, call, harness, login_request, pool_body, settlement_notification, sign_up,
};

#[actix_web::test]
async fn creator_becomes_admin_and_pool_is_listed() {
    let h = harness();
    let app = test::init_service(api_app(h.state)).await;
    let (creator_id, cookie) = sign_up!(&app, "Siti Rahma", "siti@example.test");

    let (status, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/pools")
            .cookie(cookie.clone())
            .set_json(pool_body("Kampung fund"))
    );
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let pool = &body["data"];
    assert_eq!(pool["currentAmount"], json!(0));
    assert_eq!(pool["status"], json!("OPEN"));
    assert_eq!(pool["creatorUserId"], json!(creator_id));
    assert_eq!(pool["poolCode"].as_str().map(str::len), Some(8));
    let pool_id = pool["id"].as_str().expect("pool id");

    let (status, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/pools/{pool_id}/members/me"))
            .cookie(cookie.clone())
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], json!("ADMIN"));

    let (status, body) = call!(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/pools/my-pools")
            .cookie(cookie)
    );
    assert_eq!(status, StatusCode::OK);
    let listed = body["data"].as_array().expect("pool list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], json!(pool_id));
}

#[actix_web::test]
async fn join_code_admission_adds_member() {
    let h = harness();
    let app = test::init_service(api_app(h.state)).await;
    let (_, admin) = sign_up!(&app, "Siti Rahma", "siti@example.test");
    let (joiner_id, joiner) = sign_up!(&app, "Budi Santoso", "budi@example.test");

    let (_, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/pools")
            .cookie(admin.clone())
            .set_json(pool_body("Kampung fund"))
    );
    let pool_id = body["data"]["id"].as_str().expect("pool id").to_owned();
    let code = body["data"]["poolCode"].as_str().expect("code").to_owned();

    let (status, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/pools/by-code/{}", code.to_lowercase()))
            .cookie(joiner.clone())
    );
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["id"], json!(pool_id));

    let (status, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/join-requests")
            .cookie(joiner.clone())
            .set_json(json!({ "poolCode": code }))
    );
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], json!("PENDING"));
    let request_id = body["data"]["id"].as_str().expect("request id").to_owned();

    let (status, _) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/join-requests")
            .cookie(joiner.clone())
            .set_json(json!({ "poolCode": code }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call!(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/api/v1/join-requests/{request_id}"))
            .cookie(joiner.clone())
            .set_json(json!({ "status": "APPROVED" }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call!(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/api/v1/join-requests/{request_id}"))
            .cookie(admin.clone())
            .set_json(json!({ "status": "APPROVED" }))
    );
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], json!("APPROVED"));

    let (status, _) = call!(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/api/v1/join-requests/{request_id}"))
            .cookie(admin.clone())
            .set_json(json!({ "status": "REJECTED" }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/pools/{pool_id}/members"))
            .cookie(joiner)
    );
    assert_eq!(status, StatusCode::OK);
    let members = body["data"].as_array().expect("member list");
    assert_eq!(members.len(), 2);
    assert!(
        members
            .iter()
            .any(|m| m["userId"] == json!(joiner_id) && m["role"] == json!("MEMBER"))
    );
}

#[rstest]
#[case::unknown("ZZZZ9999", StatusCode::NOT_FOUND)]
#[case::malformed("short", StatusCode::BAD_REQUEST)]
#[actix_web::test]
async fn join_request_with_bad_code_is_refused(
    #[case] code: &str,
    #[case] expected: StatusCode,
) {
    let h = harness();
    let app = test::init_service(api_app(h.state)).await;
    let (_, cookie) = sign_up!(&app, "Budi Santoso", "budi@example.test");

    let (status, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/join-requests")
            .cookie(cookie)
            .set_json(json!({ "poolCode": code }))
    );
    assert_eq!(status, expected, "{body}");
    assert_eq!(body["success"], json!(false));
}

#[actix_web::test]
async fn settled_contribution_credits_pool_once() {
    let h = harness();
    let app = test::init_service(api_app(h.state)).await;
    let (_, admin) = sign_up!(&app, "Siti Rahma", "siti@example.test");

    let (_, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/pools")
            .cookie(admin.clone())
            .set_json(pool_body("Kampung fund"))
    );
    let pool_id = body["data"]["id"].as_str().expect("pool id").to_owned();

    let (status, body) = call!(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/pools/{pool_id}/contributions"))
            .cookie(admin.clone())
            .set_json(json!({ "amount": 50_000 }))
    );
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let contribution_id = body["data"]["contributionId"]
        .as_str()
        .expect("contribution id")
        .to_owned();
    assert!(body["data"]["redirectUrl"].as_str().is_some());
    assert_eq!(h.gateway.sessions().len(), 1);

    for _ in 0..2 {
        let (status, body) = call!(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/payments/notifications")
                .set_json(settlement_notification(&contribution_id, 50_000))
        );
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], json!("SUCCESS"));
    }

    let (_, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/pools/{pool_id}"))
            .cookie(admin.clone())
    );
    assert_eq!(body["data"]["currentAmount"], json!(50_000));

    // A late status check must not credit the pool again.
    h.gateway.report(PaymentState::Settled);
    let (status, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/contributions/{contribution_id}/check-status"))
            .cookie(admin.clone())
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("SUCCESS"));

    let (_, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/pools/{pool_id}"))
            .cookie(admin)
    );
    assert_eq!(body["data"]["currentAmount"], json!(50_000));
}

#[actix_web::test]
async fn my_contributions_list_newest_first() {
    let h = harness();
    let clock = h.clock.clone();
    let app = test::init_service(api_app(h.state)).await;
    let (_, admin) = sign_up!(&app, "Siti Rahma", "siti@example.test");
    let (_, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/pools")
            .cookie(admin.clone())
            .set_json(pool_body("Kampung fund"))
    );
    let pool_id = body["data"]["id"].as_str().expect("pool id").to_owned();

    let mut created = Vec::new();
    for amount in [20_000, 30_000] {
        let (status, body) = call!(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/pools/{pool_id}/contributions"))
                .cookie(admin.clone())
                .set_json(json!({ "amount": amount }))
        );
        assert_eq!(status, StatusCode::CREATED, "{body}");
        created.push(body["data"]["contributionId"].clone());
        clock.advance(Duration::minutes(5));
    }

    let (status, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/pools/{pool_id}/contributions/me"))
            .cookie(admin.clone())
    );
    assert_eq!(status, StatusCode::OK, "{body}");
    let listed = body["data"].as_array().expect("contribution list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], created[1]);
    assert_eq!(listed[0]["amount"], json!(30_000));
    assert_eq!(listed[1]["id"], created[0]);
    assert!(listed.iter().all(|c| c["status"] == json!("PENDING")));
    assert!(listed.iter().all(|c| c["poolId"] == json!(pool_id)));

    let (_, outsider) = sign_up!(&app, "Budi Santoso", "budi@example.test");
    let (status, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/pools/{pool_id}/contributions/me"))
            .cookie(outsider)
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[actix_web::test]
async fn forged_notification_is_rejected() {
    let h = harness();
    let app = test::init_service(api_app(h.state)).await;
    let (_, admin) = sign_up!(&app, "Siti Rahma", "siti@example.test");
    let (_, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/pools")
            .cookie(admin.clone())
            .set_json(pool_body("Kampung fund"))
    );
    let pool_id = body["data"]["id"].as_str().expect("pool id").to_owned();
    let (_, body) = call!(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/pools/{pool_id}/contributions"))
            .cookie(admin.clone())
            .set_json(json!({ "amount": 50_000 }))
    );
    let contribution_id = body["data"]["contributionId"]
        .as_str()
        .expect("contribution id")
        .to_owned();

    let mut forged = settlement_notification(&contribution_id, 50_000);
    forged["signature_key"] = json!("forged");
    let (status, _) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/payments/notifications")
            .set_json(forged)
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = call!(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/pools/{pool_id}"))
            .cookie(admin)
    );
    assert_eq!(body["data"]["currentAmount"], json!(0));
}

#[actix_web::test]
async fn outsiders_cannot_contribute() {
    let h = harness();
    let app = test::init_service(api_app(h.state)).await;
    let (_, admin) = sign_up!(&app, "Siti Rahma", "siti@example.test");
    let (_, outsider) = sign_up!(&app, "Dewi Lestari", "dewi@example.test");
    let (_, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/pools")
            .cookie(admin)
            .set_json(pool_body("Kampung fund"))
    );
    let pool_id = body["data"]["id"].as_str().expect("pool id").to_owned();

    let (status, _) = call!(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/pools/{pool_id}/contributions"))
            .cookie(outsider)
            .set_json(json!({ "amount": 50_000 }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(h.gateway.sessions().is_empty());
}

#[actix_web::test]
async fn anonymous_requests_are_unauthorised() {
    let h = harness();
    let app = test::init_service(api_app(h.state)).await;
    let (status, body) = call!(&app, test::TestRequest::get().uri("/api/v1/pools/my-pools"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("unauthorized"));
}

#[actix_web::test]
async fn profile_email_change_respects_uniqueness() {
    let h = harness();
    let app = test::init_service(api_app(h.state)).await;
    sign_up!(&app, "Siti Rahma", "siti@example.test");
    let (_, budi) = sign_up!(&app, "Budi Santoso", "budi@example.test");

    let (status, body) = call!(
        &app,
        test::TestRequest::patch()
            .uri("/api/v1/users/me")
            .cookie(budi.clone())
            .set_json(json!({ "email": "SITI@example.test" }))
    );
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = call!(
        &app,
        test::TestRequest::patch()
            .uri("/api/v1/users/me")
            .cookie(budi)
            .set_json(json!({ "email": "budi.s@example.test", "age": 0 }))
    );
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["email"], json!("budi.s@example.test"));
    assert_eq!(body["data"]["age"], json!(0));

    let res = test::call_service(&app, login_request("budi.s@example.test").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
}
