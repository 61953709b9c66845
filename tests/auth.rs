mod common;

use common::{Harness, json, location, session_cookie};
use yatube::Status;

#[tokio::test]
async fn signup_signs_the_user_in() {
    let h = Harness::new();

    let res = h
        .post_form("/auth/signup/", None, "first_name=Leo&last_name=Tolstoy&username=leo&password=war-and-peace")
        .await;
    assert_eq!(res.status_code(), Status::Found);
    assert_eq!(location(&res), "/");
    let cookie = session_cookie(&res);

    let user = h.app.store.user_by_username("leo").unwrap().unwrap();
    assert_eq!(user.full_name(), "Leo Tolstoy");

    let res = h.get("/create/", Some(&cookie)).await;
    assert_eq!(res.status_code(), Status::Ok);
}

#[tokio::test]
async fn signup_errors_are_redisplayed() {
    let h = Harness::new();
    h.user("leo");

    let res = h.post_form("/auth/signup/", None, "username=leo&password=short").await;
    assert_eq!(res.status_code(), Status::Ok);
    assert!(res.header("set-cookie").is_none());
    let context = json(&res);
    let fields = context["form"]["fields"].as_array().unwrap();
    let errors = |name: &str| {
        fields.iter().find(|f| f["name"] == name).unwrap()["errors"].as_array().unwrap().len()
    };
    assert_eq!(errors("username"), 1);
    assert_eq!(errors("password"), 1);
    assert_eq!(errors("first_name"), 0);
}

#[tokio::test]
async fn login_follows_next() {
    let h = Harness::new();
    h.user("leo");

    let form = json(&h.get("/auth/login/?next=%2Fcreate%2F", None).await);
    assert_eq!(form["next"], "/create/");
    assert_eq!(form["form"]["is_bound"], false);

    let res = h
        .post_form("/auth/login/", None, "username=leo&password=leo-password&next=%2Fcreate%2F")
        .await;
    assert_eq!(res.status_code(), Status::Found);
    assert_eq!(location(&res), "/create/");

    let cookie = session_cookie(&res);
    assert_eq!(h.get("/create/", Some(&cookie)).await.status_code(), Status::Ok);
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let h = Harness::new();
    h.user("leo");

    let res = h
        .post_form("/auth/login/", None, "username=leo&password=leo-password&next=https%3A%2F%2Fevil.example%2F")
        .await;
    assert_eq!(location(&res), "/");
}

#[tokio::test]
async fn login_ignores_next_with_line_breaks() {
    let h = Harness::new();
    h.user("leo");

    let res = h
        .post_form("/auth/login/", None, "username=leo&password=leo-password&next=%2F%0D%0Ax")
        .await;
    assert_eq!(res.status_code(), Status::Found);
    assert_eq!(location(&res), "/");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let h = Harness::new();
    h.user("leo");

    let res = h.post_form("/auth/login/", None, "username=leo&password=nope").await;
    assert_eq!(res.status_code(), Status::Ok);
    assert!(res.header("set-cookie").is_none());
    let context = json(&res);
    assert_eq!(context["form"]["non_field_errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let h = Harness::new();
    let leo = h.user("leo");
    let cookie = h.login(&leo);

    let res = h.post_form("/auth/logout/", Some(&cookie), "").await;
    assert_eq!(location(&res), "/");
    assert!(res.header("set-cookie").unwrap().contains("Max-Age=0"));

    let res = h.get("/create/", Some(&cookie)).await;
    assert_eq!(res.status_code(), Status::Found);
    assert!(location(&res).starts_with("/auth/login/"));
}

#[tokio::test]
async fn unknown_session_is_anonymous() {
    let h = Harness::new();
    let res = h.get("/follow/", Some("sessionid=forged")).await;
    assert_eq!(res.status_code(), Status::Found);
    assert!(location(&res).starts_with("/auth/login/"));
}
