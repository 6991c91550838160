use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

use hostelhub::{app, db, AppState};

async fn test_app() -> (Router, SqlitePool) {
    let db_pool = db::connect_in_memory().await.unwrap();
    (app(AppState { db_pool: db_pool.clone() }), db_pool)
}

/// Drives one request through the router. `user` becomes a bearer identity,
/// standing in for the upstream auth layer.
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {id}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/register",
        None,
        Some(json!({"username": username, "email": format!("{username}@example.com")})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
    body["id"].as_i64().unwrap()
}

/// Registers a user, then has them open a hostel with one room. Returns
/// (manager_id, hostel_id, room_id).
async fn seed_hostel(app: &Router, username: &str, price: f64) -> (i64, i64, i64) {
    let manager = register(app, username).await;
    let (status, hostel) = send(
        app,
        "POST",
        "/hostels",
        Some(manager),
        Some(json!({
            "name": format!("{username}'s hostel"),
            "city": "Boston",
            "price_per_night": price,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{hostel}");
    let hostel_id = hostel["id"].as_i64().unwrap();

    let (status, room) = send(
        app,
        "POST",
        "/rooms",
        Some(manager),
        Some(json!({
            "hostel_id": hostel_id,
            "room_type": "DOUBLE",
            "capacity": 2,
            "price_per_night": price,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{room}");
    (manager, hostel_id, room["id"].as_i64().unwrap())
}

#[tokio::test]
async fn registration_creates_user_and_empty_profile() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;

    let (status, profile) = send(&app, "GET", "/profiles/me", Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["user_id"].as_i64(), Some(alice));
    assert_eq!(profile["is_manager"], json!(false));
    assert_eq!(profile["is_admin"], json!(false));
}

#[tokio::test]
async fn duplicate_username_is_a_field_error() {
    let (app, _) = test_app().await;
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({"username": "alice", "email": "other@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["username"], json!("already taken"));
}

#[tokio::test]
async fn profile_roles_cannot_be_set_through_patch() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;
    let (_, profile) = send(&app, "GET", "/profiles/me", Some(alice), None).await;
    let profile_id = profile["id"].as_i64().unwrap();

    let (status, patched) = send(
        &app,
        "PATCH",
        &format!("/profiles/{profile_id}"),
        Some(alice),
        Some(json!({"bio": "hi", "is_admin": true, "is_manager": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["bio"], json!("hi"));
    assert_eq!(patched["is_admin"], json!(false));
    assert_eq!(patched["is_manager"], json!(false));
}

#[tokio::test]
async fn profiles_are_owner_only() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let (_, profile) = send(&app, "GET", "/profiles/me", Some(alice), None).await;
    let profile_id = profile["id"].as_i64().unwrap();

    let (status, _) = send(&app, "GET", &format!("/profiles/{profile_id}"), Some(bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/profiles/{profile_id}"),
        Some(bob),
        Some(json!({"bio": "hijacked"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn booking_computes_price_and_starts_pending() {
    let (app, _) = test_app().await;
    let (_, _, room_id) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;

    let (status, booking) = send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-01-01",
            "check_out_date": "2025-01-04",
            // client-supplied totals are ignored
            "total_price": 1.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    assert_eq!(booking["total_price"], json!(150.0));
    assert_eq!(booking["status"], json!("PENDING"));
    assert_eq!(booking["user_id"].as_i64(), Some(alice));
}

#[tokio::test]
async fn booking_rejects_equal_or_reversed_dates() {
    let (app, _) = test_app().await;
    let (_, _, room_id) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;

    for check_out in ["2025-01-01", "2024-12-30"] {
        let (status, body) = send(
            &app,
            "POST",
            "/bookings",
            Some(alice),
            Some(json!({
                "room_id": room_id,
                "check_in_date": "2025-01-01",
                "check_out_date": check_out,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["check_out_date"].is_string());
    }
}

#[tokio::test]
async fn booking_rejects_unavailable_room_and_overlap() {
    let (app, _) = test_app().await;
    let (manager, _, room_id) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;

    let (status, _) = send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-01-01",
            "check_out_date": "2025-01-04",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // overlapping stay on the same room
    let (status, body) = send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-01-03",
            "check_out_date": "2025-01-05",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["room_id"].is_string());

    // back-to-back is fine: previous guest leaves the day the next arrives
    let (status, _) = send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-01-04",
            "check_out_date": "2025-01-06",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/rooms/{room_id}"),
        Some(manager),
        Some(json!({"is_available": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-02-01",
            "check_out_date": "2025-02-03",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bookings_are_hidden_from_other_renters() {
    let (app, db_pool) = test_app().await;
    let (_, _, room_id) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, booking) = send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-01-01",
            "check_out_date": "2025-01-04",
        })),
    )
    .await;
    let booking_id = booking["id"].as_i64().unwrap();

    let (status, _) = send(&app, "GET", &format!("/bookings/{booking_id}"), Some(bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, "GET", "/bookings", Some(bob), None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);

    // staff see every booking
    sqlx::query("UPDATE profiles SET is_admin=1 WHERE user_id=?")
        .bind(bob)
        .execute(&db_pool)
        .await
        .unwrap();
    let (_, list) = send(&app, "GET", "/bookings", Some(bob), None).await;
    assert!(list
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b["id"].as_i64() == Some(booking_id)));
}

#[tokio::test]
async fn renters_cancel_but_never_confirm() {
    let (app, db_pool) = test_app().await;
    let (_, _, room_id) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;

    let (_, booking) = send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-01-01",
            "check_out_date": "2025-01-04",
        })),
    )
    .await;
    let booking_id = booking["id"].as_i64().unwrap();
    let uri = format!("/bookings/{booking_id}");

    let (status, _) = send(&app, "PATCH", &uri, Some(alice), Some(json!({"status": "CONFIRMED"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cancelled) =
        send(&app, "PATCH", &uri, Some(alice), Some(json!({"status": "CANCELLED"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], json!("CANCELLED"));

    // cancelled is terminal, even for staff
    let admin = register(&app, "admin").await;
    sqlx::query("UPDATE profiles SET is_admin=1 WHERE user_id=?")
        .bind(admin)
        .execute(&db_pool)
        .await
        .unwrap();
    let (status, _) = send(&app, "PATCH", &uri, Some(admin), Some(json!({"status": "CONFIRMED"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn staff_walk_bookings_through_the_lifecycle() {
    let (app, db_pool) = test_app().await;
    let (_, _, room_id) = seed_hostel(&app, "manager", 40.0).await;
    let alice = register(&app, "alice").await;
    let admin = register(&app, "admin").await;
    sqlx::query("UPDATE profiles SET is_admin=1 WHERE user_id=?")
        .bind(admin)
        .execute(&db_pool)
        .await
        .unwrap();

    let (_, booking) = send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-03-01",
            "check_out_date": "2025-03-03",
        })),
    )
    .await;
    let uri = format!("/bookings/{}", booking["id"].as_i64().unwrap());

    // completion requires confirmation first
    let (status, _) = send(&app, "PATCH", &uri, Some(admin), Some(json!({"status": "COMPLETED"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, confirmed) =
        send(&app, "PATCH", &uri, Some(admin), Some(json!({"status": "CONFIRMED"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], json!("CONFIRMED"));

    let (status, completed) =
        send(&app, "PATCH", &uri, Some(admin), Some(json!({"status": "COMPLETED"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], json!("COMPLETED"));
}

#[tokio::test]
async fn favorite_pairs_are_unique() {
    let (app, _) = test_app().await;
    let (_, hostel_id, _) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;

    let (status, _) = send(
        &app,
        "POST",
        "/favorites",
        Some(alice),
        Some(json!({"hostel_id": hostel_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "POST",
        "/favorites",
        Some(alice),
        Some(json!({"hostel_id": hostel_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["hostel_id"], json!("already in favorites"));

    let (_, list) = send(&app, "GET", "/favorites", Some(alice), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn messages_are_scoped_to_participants_and_newest_first() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let carol = register(&app, "carol").await;

    for (from, to, text) in [
        (alice, bob, "first"),
        (bob, alice, "second"),
        (alice, carol, "third"),
    ] {
        let (status, _) = send(
            &app,
            "POST",
            "/messages",
            Some(from),
            Some(json!({"receiver_id": to, "content": text})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, list) = send(&app, "GET", "/messages", Some(bob), None).await;
    let list = list.as_array().unwrap().clone();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["content"], json!("second"));
    assert_eq!(list[1]["content"], json!("first"));

    // sender = caller regardless of payload; carol can't spoof alice
    let (status, forged) = send(
        &app,
        "POST",
        "/messages",
        Some(carol),
        Some(json!({"sender_id": alice, "receiver_id": bob, "content": "forged"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(forged["sender_id"].as_i64(), Some(carol));
}

#[tokio::test]
async fn receiver_marks_message_read() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, message) = send(
        &app,
        "POST",
        "/messages",
        Some(alice),
        Some(json!({"receiver_id": bob, "content": "hello"})),
    )
    .await;
    let uri = format!("/messages/{}/read", message["id"].as_i64().unwrap());

    let (status, _) = send(&app, "PATCH", &uri, Some(alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, read) = send(&app, "PATCH", &uri, Some(bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["is_read"], json!(true));
}

#[tokio::test]
async fn review_ratings_shape_the_hostel_average() {
    let (app, _) = test_app().await;
    let (_, hostel_id, _) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, hostel) = send(&app, "GET", &format!("/hostels/{hostel_id}"), None, None).await;
    assert_eq!(hostel["average_rating"], json!(0.0));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/hostels/{hostel_id}/add_review"),
        Some(alice),
        Some(json!({"rating": 6, "comment": "off the scale"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["rating"].is_string());

    for (user, rating) in [(alice, 4), (bob, 2)] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/hostels/{hostel_id}/add_review"),
            Some(user),
            Some(json!({"rating": rating, "comment": "ok"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, hostel) = send(&app, "GET", &format!("/hostels/{hostel_id}"), None, None).await;
    assert_eq!(hostel["average_rating"], json!(3.0));
}

#[tokio::test]
async fn community_comments_need_a_post_id() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;

    let (_, category) = send(
        &app,
        "POST",
        "/community-categories",
        Some(alice),
        Some(json!({"name": "General"})),
    )
    .await;
    let (_, post) = send(
        &app,
        "POST",
        "/community-posts",
        Some(alice),
        Some(json!({"category_id": category["id"], "title": "Welcome"})),
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();

    for text in ["one", "two"] {
        send(
            &app,
            "POST",
            "/community-comments",
            Some(alice),
            Some(json!({"post_id": post_id, "content": text})),
        )
        .await;
    }

    // no post_id: deliberately empty, never a full dump
    let (status, list) = send(&app, "GET", "/community-comments", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 0);

    let (_, list) = send(
        &app,
        "GET",
        &format!("/community-comments?post_id={post_id}"),
        None,
        None,
    )
    .await;
    let list = list.as_array().unwrap().clone();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["content"], json!("one"));
    assert_eq!(list[1]["content"], json!("two"));
}

#[tokio::test]
async fn pinned_community_posts_come_first() {
    let (app, db_pool) = test_app().await;
    let alice = register(&app, "alice").await;
    let admin = register(&app, "admin").await;
    sqlx::query("UPDATE profiles SET is_admin=1 WHERE user_id=?")
        .bind(admin)
        .execute(&db_pool)
        .await
        .unwrap();

    let (_, category) = send(
        &app,
        "POST",
        "/community-categories",
        Some(alice),
        Some(json!({"name": "General"})),
    )
    .await;
    let category_id = category["id"].as_i64().unwrap();

    let mut ids = Vec::new();
    for title in ["older", "newer"] {
        let (_, post) = send(
            &app,
            "POST",
            "/community-posts",
            Some(alice),
            Some(json!({"category_id": category_id, "title": title})),
        )
        .await;
        ids.push(post["id"].as_i64().unwrap());
    }

    // authors don't moderate their own posts
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/community-posts/{}", ids[0]),
        Some(alice),
        Some(json!({"is_pinned": true})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, pinned) = send(
        &app,
        "PATCH",
        &format!("/community-posts/{}", ids[0]),
        Some(admin),
        Some(json!({"is_pinned": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pinned["is_pinned"], json!(true));

    let (_, list) = send(
        &app,
        "GET",
        &format!("/community-posts?category_id={category_id}"),
        None,
        None,
    )
    .await;
    let list = list.as_array().unwrap().clone();
    assert_eq!(list[0]["title"], json!("older"));
    assert_eq!(list[1]["title"], json!("newer"));
}

#[tokio::test]
async fn closed_community_posts_take_no_comments() {
    let (app, db_pool) = test_app().await;
    let alice = register(&app, "alice").await;
    let admin = register(&app, "admin").await;
    sqlx::query("UPDATE profiles SET is_admin=1 WHERE user_id=?")
        .bind(admin)
        .execute(&db_pool)
        .await
        .unwrap();

    let (_, category) = send(
        &app,
        "POST",
        "/community-categories",
        Some(alice),
        Some(json!({"name": "General"})),
    )
    .await;
    let (_, post) = send(
        &app,
        "POST",
        "/community-posts",
        Some(alice),
        Some(json!({"category_id": category["id"], "title": "Locked thread"})),
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();

    let (status, closed) = send(
        &app,
        "PATCH",
        &format!("/community-posts/{post_id}"),
        Some(admin),
        Some(json!({"is_closed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["is_closed"], json!(true));

    let (status, body) = send(
        &app,
        "POST",
        "/community-comments",
        Some(alice),
        Some(json!({"post_id": post_id, "content": "too late"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["post_id"], json!("post is closed"));
}

#[tokio::test]
async fn search_matches_name_city_or_description() {
    let (app, _) = test_app().await;
    let manager = register(&app, "manager").await;
    for (name, city, description) in [
        ("Sunrise Hostel", "Boston", "close to the harbor"),
        ("Moonlight Inn", "Chicago", "quiet and central"),
    ] {
        let (status, _) = send(
            &app,
            "POST",
            "/hostels",
            Some(manager),
            Some(json!({
                "name": name,
                "city": city,
                "description": description,
                "price_per_night": 30.0,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    for (q, expected) in [("boston", 1), ("moonlight", 1), ("central", 1), ("zanzibar", 0)] {
        let (status, list) = send(&app, "GET", &format!("/search?q={q}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), expected, "q={q}");
    }

    let (_, list) = send(&app, "GET", "/search", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn hostel_city_filter_is_substring_and_case_insensitive() {
    let (app, _) = test_app().await;
    let manager = register(&app, "manager").await;
    for city in ["Boston", "South Boston", "Chicago"] {
        send(
            &app,
            "POST",
            "/hostels",
            Some(manager),
            Some(json!({"name": format!("{city} stay"), "city": city, "price_per_night": 20.0})),
        )
        .await;
    }

    let (_, list) = send(&app, "GET", "/hostels?city=bosto", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn hostel_writes_belong_to_the_manager() {
    let (app, _) = test_app().await;
    let (_, hostel_id, room_id) = seed_hostel(&app, "manager", 50.0).await;
    let bob = register(&app, "bob").await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/hostels/{hostel_id}"),
        Some(bob),
        Some(json!({"name": "mine now"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/rooms",
        Some(bob),
        Some(json!({
            "hostel_id": hostel_id,
            "room_type": "SINGLE",
            "capacity": 1,
            "price_per_night": 10.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &format!("/rooms/{room_id}"), Some(bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_a_hostel_cascades() {
    let (app, _) = test_app().await;
    let (manager, hostel_id, room_id) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;

    send(
        &app,
        "POST",
        "/bookings",
        Some(alice),
        Some(json!({
            "room_id": room_id,
            "check_in_date": "2025-01-01",
            "check_out_date": "2025-01-02",
        })),
    )
    .await;

    let (status, _) = send(&app, "DELETE", &format!("/hostels/{hostel_id}"), Some(manager), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, rooms) = send(&app, "GET", &format!("/rooms?hostel_id={hostel_id}"), None, None).await;
    assert_eq!(rooms.as_array().unwrap().len(), 0);
    let (_, bookings) = send(&app, "GET", "/bookings", Some(alice), None).await;
    assert_eq!(bookings.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn anonymous_access_rules() {
    let (app, _) = test_app().await;

    let (status, body) = send(&app, "GET", "/test", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));

    let (status, _) = send(&app, "GET", "/hostels", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/hostels",
        None,
        Some(json!({"name": "Anon Inn", "price_per_night": 10.0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn maintenance_requests_are_owner_scoped() {
    let (app, _) = test_app().await;
    let (_, hostel_id, _) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (status, request) = send(
        &app,
        "POST",
        "/maintenance-requests",
        Some(alice),
        Some(json!({"hostel_id": hostel_id, "title": "leaky tap"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], json!("PENDING"));
    let request_id = request["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/maintenance-requests/{request_id}"),
        Some(bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // reporter may withdraw, not advance
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/maintenance-requests/{request_id}"),
        Some(alice),
        Some(json!({"status": "IN_PROGRESS"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cancelled) = send(
        &app,
        "PATCH",
        &format!("/maintenance-requests/{request_id}"),
        Some(alice),
        Some(json!({"status": "CANCELLED"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], json!("CANCELLED"));
}

#[tokio::test]
async fn forum_posts_list_by_topic() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;

    let (_, topic) = send(
        &app,
        "POST",
        "/forum-topics",
        Some(alice),
        Some(json!({"title": "Moving in"})),
    )
    .await;
    let topic_id = topic["id"].as_i64().unwrap();

    let (status, post) = send(
        &app,
        "POST",
        "/forum-posts",
        Some(alice),
        Some(json!({"topic_id": topic_id, "content": "any tips?"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["author_id"].as_i64(), Some(alice));

    let (_, list) = send(&app, "GET", &format!("/forum-posts?topic_id={topic_id}"), None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "POST",
        "/forum-posts",
        Some(alice),
        Some(json!({"topic_id": 999, "content": "lost"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn self_addressed_message_can_be_marked_read() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;

    let (status, note) = send(
        &app,
        "POST",
        "/messages",
        Some(alice),
        Some(json!({"receiver_id": alice, "content": "note to self"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/messages/{}/read", note["id"].as_i64().unwrap());
    let (status, read) = send(&app, "PATCH", &uri, Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["is_read"], json!(true));
}

#[tokio::test]
async fn message_by_id_is_participant_only() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let carol = register(&app, "carol").await;

    let (_, message) = send(
        &app,
        "POST",
        "/messages",
        Some(alice),
        Some(json!({"receiver_id": bob, "content": "hello"})),
    )
    .await;
    let uri = format!("/messages/{}", message["id"].as_i64().unwrap());

    for participant in [alice, bob] {
        let (status, fetched) = send(&app, "GET", &uri, Some(participant), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["content"], json!("hello"));
    }

    let (status, _) = send(&app, "GET", &uri, Some(carol), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn universities_full_cycle() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;

    // reads are open, writes need a caller
    let (status, _) = send(
        &app,
        "POST",
        "/universities",
        None,
        Some(json!({"name": "Anon U"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, university) = send(
        &app,
        "POST",
        "/universities",
        Some(alice),
        Some(json!({"name": "State University", "location": "Boston"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{university}");
    let id = university["id"].as_i64().unwrap();

    let (status, list) = send(&app, "GET", "/universities", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, fetched) = send(&app, "GET", &format!("/universities/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], json!("State University"));

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/universities/{id}"),
        Some(alice),
        Some(json!({"website": "https://state.example.edu"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["website"], json!("https://state.example.edu"));
    assert_eq!(updated["location"], json!("Boston"));

    let (status, _) = send(&app, "DELETE", &format!("/universities/{id}"), Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/universities/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reviews_are_edited_and_removed_by_their_author() {
    let (app, _) = test_app().await;
    let (_, hostel_id, _) = seed_hostel(&app, "manager", 50.0).await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, review) = send(
        &app,
        "POST",
        "/reviews",
        Some(alice),
        Some(json!({"hostel_id": hostel_id, "rating": 2, "comment": "noisy"})),
    )
    .await;
    let uri = format!("/reviews/{}", review["id"].as_i64().unwrap());

    let (status, _) = send(&app, "PATCH", &uri, Some(bob), Some(json!({"rating": 5}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "PATCH", &uri, Some(alice), Some(json!({"rating": 9}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["rating"].is_string());

    let (status, updated) = send(
        &app,
        "PATCH",
        &uri,
        Some(alice),
        Some(json!({"rating": 4, "comment": "quieter now"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["rating"], json!(4));
    assert_eq!(updated["comment"], json!("quieter now"));

    let (status, _) = send(&app, "DELETE", &uri, Some(bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &uri, Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forum_writes_belong_to_their_author() {
    let (app, _) = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, topic) = send(
        &app,
        "POST",
        "/forum-topics",
        Some(alice),
        Some(json!({"title": "Moving in"})),
    )
    .await;
    let topic_id = topic["id"].as_i64().unwrap();
    let (_, post) = send(
        &app,
        "POST",
        "/forum-posts",
        Some(alice),
        Some(json!({"topic_id": topic_id, "content": "any tips?"})),
    )
    .await;
    let post_uri = format!("/forum-posts/{}", post["id"].as_i64().unwrap());

    let (status, fetched) = send(&app, "GET", &post_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["content"], json!("any tips?"));

    let (status, _) = send(
        &app,
        "PATCH",
        &post_uri,
        Some(bob),
        Some(json!({"content": "edited"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(
        &app,
        "PATCH",
        &post_uri,
        Some(alice),
        Some(json!({"content": "tips welcome"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], json!("tips welcome"));

    // closing the topic stops new posts
    let (status, closed) = send(
        &app,
        "PATCH",
        &format!("/forum-topics/{topic_id}"),
        Some(alice),
        Some(json!({"is_active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["is_active"], json!(false));

    let (status, _) = send(
        &app,
        "POST",
        "/forum-posts",
        Some(bob),
        Some(json!({"topic_id": topic_id, "content": "too late"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", &post_uri, Some(bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &post_uri, Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &format!("/forum-topics/{topic_id}"), Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/forum-topics/{topic_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_drops_the_session() {
    let (app, _) = test_app().await;

    // register through the session path, no bearer header anywhere
    let request = Request::builder()
        .method("POST")
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"username": "alice", "email": "alice@example.com"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("register sets a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_owned();

    let with_cookie = |method: &str, uri: &str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(with_cookie("GET", "/profiles/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(with_cookie("POST", "/logout")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(with_cookie("GET", "/profiles/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
