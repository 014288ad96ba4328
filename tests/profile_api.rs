use actix_web::cookie::Cookie;
use actix_web::{test, web, App};
use prepcore_server::configure_routes;
use serde_json::{json, Value};
use uuid::Uuid;

mod common;
use common::{session_cookie, test_state};

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(configure_routes)
        ).await
    };
}

/// Registers through the API and returns the session cookie and the new id.
macro_rules! register {
    ($app:expr, $email:expr) => {{
        let resp = test::TestRequest::post()
            .uri("/create-user")
            .set_json(json!({ "name": "Student", "email": $email, "password": "old-pw" }))
            .send_request(&$app)
            .await;
        assert_eq!(resp.status(), 201);
        let cookie: Cookie<'static> = session_cookie(&resp).expect("session cookie set");
        let body: Value = test::read_body_json(resp).await;
        let id: Uuid = body["data"]["id"].as_str().unwrap().parse().unwrap();
        (cookie, id)
    }};
}

fn unit(unit_id: &str) -> Value {
    json!({
        "gradeName": "Grade 12",
        "subjectName": "Mathematics",
        "subjectId": "math",
        "unitId": unit_id,
        "unitName": "Calculus"
    })
}

#[actix_web::test]
async fn test_get_profile_data() {
    let (state, _) = test_state();
    let app = app!(state);
    let (_, user_id) = register!(app, "profile@example.com");

    let found = test::TestRequest::get()
        .uri(&format!("/get-profile-data/{}", user_id))
        .send_request(&app)
        .await;
    assert_eq!(found.status(), 200);
    let body: Value = test::read_body_json(found).await;
    assert_eq!(body["email"], "profile@example.com");
    assert_eq!(body["freeChance"], 5);
    assert!(body.get("passwordHash").is_none());

    let missing = test::TestRequest::get()
        .uri(&format!("/get-profile-data/{}", Uuid::new_v4()))
        .send_request(&app)
        .await;
    assert_eq!(missing.status(), 404);
    let body: Value = test::read_body_json(missing).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User not found");
}

#[actix_web::test]
async fn test_malformed_profile_id() {
    let (state, _) = test_state();
    let app = app!(state);

    let resp = test::TestRequest::get()
        .uri("/get-profile-data/64f1c2")
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User not found");
}

#[actix_web::test]
async fn test_update_user_membership_requires_own_session() {
    let (state, _) = test_state();
    let app = app!(state);
    let (cookie, user_id) = register!(app, "member@example.com");
    let (_, other_id) = register!(app, "other@example.com");

    let anonymous = test::TestRequest::get()
        .uri(&format!("/update-user-membership/{}", user_id))
        .send_request(&app)
        .await;
    assert_eq!(anonymous.status(), 401);

    let someone_else = test::TestRequest::get()
        .uri(&format!("/update-user-membership/{}", other_id))
        .cookie(cookie.clone())
        .send_request(&app)
        .await;
    assert_eq!(someone_else.status(), 403);

    let own = test::TestRequest::get()
        .uri(&format!("/update-user-membership/{}", user_id))
        .cookie(cookie)
        .send_request(&app)
        .await;
    assert_eq!(own.status(), 200);
    let body: Value = test::read_body_json(own).await;
    assert_eq!(body["id"], user_id.to_string());
    assert_eq!(body["isPremium"], false);
}

#[actix_web::test]
async fn test_update_user_form() {
    let (state, _) = test_state();
    let app = app!(state);
    let (_, user_id) = register!(app, "form@example.com");
    let _ = register!(app, "taken@example.com");

    let wrong_old = test::TestRequest::post()
        .uri("/update-user-form")
        .set_json(json!({
            "userId": user_id,
            "name": "Renamed",
            "email": "form@example.com",
            "oldPassword": "not-it",
            "newPassword": "new-pw"
        }))
        .send_request(&app)
        .await;
    assert_eq!(wrong_old.status(), 401);
    let body: Value = test::read_body_json(wrong_old).await;
    assert_eq!(body["message"], "Old password is wrong");

    let clash = test::TestRequest::post()
        .uri("/update-user-form")
        .set_json(json!({ "userId": user_id, "name": "Renamed", "email": "taken@example.com" }))
        .send_request(&app)
        .await;
    assert_eq!(clash.status(), 409);
    let body: Value = test::read_body_json(clash).await;
    assert_eq!(body["message"], "This email already used");

    let changed = test::TestRequest::post()
        .uri("/update-user-form")
        .set_json(json!({
            "userId": user_id,
            "name": "Renamed",
            "email": "renamed@example.com",
            "oldPassword": "old-pw",
            "newPassword": "new-pw"
        }))
        .send_request(&app)
        .await;
    assert_eq!(changed.status(), 200);
    let body: Value = test::read_body_json(changed).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Renamed");
    assert_eq!(body["data"]["email"], "renamed@example.com");

    let login = test::TestRequest::post()
        .uri("/get-user")
        .set_json(json!({ "email": "renamed@example.com", "password": "new-pw" }))
        .send_request(&app)
        .await;
    assert_eq!(login.status(), 200);
}

#[actix_web::test]
async fn test_record_played_unit() {
    let (state, _) = test_state();
    let app = app!(state);
    let (cookie, user_id) = register!(app, "player@example.com");

    let anonymous = test::TestRequest::post()
        .uri("/record-played-unit")
        .set_json(unit("limits"))
        .send_request(&app)
        .await;
    assert_eq!(anonymous.status(), 200);
    let body: Value = test::read_body_json(anonymous).await;
    assert!(body["playedId"].is_null());

    let first = test::TestRequest::post()
        .uri("/record-played-unit")
        .cookie(cookie.clone())
        .set_json(unit("limits"))
        .send_request(&app)
        .await;
    let first: Value = test::read_body_json(first).await;
    assert!(first["playedId"].is_string());

    let repeat = test::TestRequest::post()
        .uri("/record-played-unit")
        .cookie(cookie.clone())
        .set_json(unit("limits"))
        .send_request(&app)
        .await;
    let repeat: Value = test::read_body_json(repeat).await;
    assert_eq!(first["playedId"], repeat["playedId"]);

    let another = test::TestRequest::post()
        .uri("/record-played-unit")
        .cookie(cookie)
        .set_json(unit("derivatives"))
        .send_request(&app)
        .await;
    let another: Value = test::read_body_json(another).await;
    assert_ne!(first["playedId"], another["playedId"]);

    let profile = test::TestRequest::get()
        .uri(&format!("/get-profile-data/{}", user_id))
        .send_request(&app)
        .await;
    let profile: Value = test::read_body_json(profile).await;
    assert_eq!(profile["playedSubUnits"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_update_play_time() {
    let (state, _) = test_state();
    let app = app!(state);
    let (cookie, _) = register!(app, "timer@example.com");

    let recorded = test::TestRequest::post()
        .uri("/record-played-unit")
        .cookie(cookie.clone())
        .set_json(unit("limits"))
        .send_request(&app)
        .await;
    let recorded: Value = test::read_body_json(recorded).await;
    let played_id = recorded["playedId"].as_str().unwrap().to_string();

    let anonymous = test::TestRequest::post()
        .uri("/update-play-time")
        .set_json(json!({ "playedSubUnitsId": played_id, "time": 90 }))
        .send_request(&app)
        .await;
    assert_eq!(anonymous.status(), 401);

    let unknown = test::TestRequest::post()
        .uri("/update-play-time")
        .cookie(cookie.clone())
        .set_json(json!({ "playedSubUnitsId": Uuid::new_v4(), "time": 90 }))
        .send_request(&app)
        .await;
    assert_eq!(unknown.status(), 404);
    let body: Value = test::read_body_json(unknown).await;
    assert_eq!(body["success"], false);

    let updated = test::TestRequest::post()
        .uri("/update-play-time")
        .cookie(cookie)
        .set_json(json!({ "playedSubUnitsId": played_id, "time": 90 }))
        .send_request(&app)
        .await;
    assert_eq!(updated.status(), 200);
    let body: Value = test::read_body_json(updated).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["playedSubUnits"][0]["playedTime"], 90);
}
