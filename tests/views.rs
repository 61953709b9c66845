mod common;

use common::{Harness, json, location, page_len};
use yatube::{Config, Status};
use yatube::models::PostFilter;

#[tokio::test]
async fn public_pages_answer_ok() {
    let h = Harness::new();
    let leo = h.user("auth");
    let group = h.group("Test group", "test_slug", "Test description");
    let post = h.post(&leo, "Test post", Some(&group));

    let cookie = h.login(&leo);
    for uri in [
        "/".to_owned(),
        "/group/test_slug/".to_owned(),
        "/profile/auth/".to_owned(),
        format!("/posts/{}/", post.id),
        "/create/".to_owned(),
    ] {
        let res = h.get(&uri, Some(&cookie)).await;
        assert_eq!(res.status_code(), Status::Ok, "{uri} for a signed-in user");
    }

    for uri in ["/".to_owned(), "/group/test_slug/".to_owned(), "/profile/auth/".to_owned(), format!("/posts/{}/", post.id)] {
        let res = h.get(&uri, None).await;
        assert_eq!(res.status_code(), Status::Ok, "{uri} for a guest");
    }
}

#[tokio::test]
async fn guests_are_sent_to_login() {
    let h = Harness::new();
    let leo = h.user("leo");
    let post = h.post(&leo, "text", None);

    for uri in [
        "/create/".to_owned(),
        "/follow/".to_owned(),
        format!("/posts/{}/edit/", post.id),
        format!("/posts/{}/comment/", post.id),
        "/profile/leo/follow/".to_owned(),
        "/profile/leo/unfollow/".to_owned(),
    ] {
        let res = h.get(&uri, None).await;
        assert_eq!(res.status_code(), Status::Found, "{uri}");
        assert_eq!(location(&res), format!("/auth/login/?next={uri}"));
    }
}

#[tokio::test]
async fn login_redirect_escapes_the_query_but_not_slashes() {
    let h = Harness::new();
    let res = h.get("/follow/?page=2", None).await;
    assert_eq!(location(&res), "/auth/login/?next=/follow/%3Fpage%3D2");

    // The login page decodes it back.
    let context = json(&h.get(location(&res), None).await);
    assert_eq!(context["next"], "/follow/?page=2");
}

#[tokio::test]
async fn missing_rows_are_404() {
    let h = Harness::new();
    let leo = h.user("leo");
    let cookie = h.login(&leo);

    for uri in [
        "/n0t_ex15ting_page/",
        "/group/nope/",
        "/profile/nobody/",
        "/posts/999/",
        "/posts/abc/",
        "/posts/999/edit/",
        "/profile/nobody/follow/",
    ] {
        let res = h.get(uri, Some(&cookie)).await;
        assert_eq!(res.status_code(), Status::NotFound, "{uri}");
    }
}

#[tokio::test]
async fn read_only_pages_refuse_posts() {
    let h = Harness::new();
    let leo = h.user("leo");
    let post = h.post(&leo, "text", None);

    let res = h.post_form(&format!("/posts/{}/", post.id), None, "text=x").await;
    assert_eq!(res.status_code(), Status::MethodNotAllowed);
    assert_eq!(res.header("allow"), Some("GET, HEAD"));
}

#[tokio::test]
async fn listings_expose_post_fields() {
    let h = Harness::new();
    let leo = h.user("auth");
    let group = h.group("Test group", "test_slug", "Test description");
    let post = h.post(&leo, "Post text", Some(&group));

    for uri in ["/", "/group/test_slug/", "/profile/auth/"] {
        let context = json(&h.get(uri, None).await);
        let first = &context["page_obj"]["items"][0];
        assert_eq!(first["id"], post.id, "{uri}");
        assert_eq!(first["text"], "Post text");
        assert_eq!(first["author"]["username"], "auth");
        assert_eq!(first["group"]["slug"], "test_slug");
        assert!(first["image"].is_null());
    }

    let context = json(&h.get("/group/test_slug/", None).await);
    assert_eq!(context["group"]["title"], "Test group");
    assert_eq!(context["group"]["description"], "Test description");

    let context = json(&h.get("/profile/auth/", None).await);
    assert_eq!(context["author"]["username"], "auth");
    assert_eq!(context["following"], false);
}

#[tokio::test]
async fn post_detail_shows_comments_and_form() {
    let h = Harness::new();
    let leo = h.user("auth");
    let group = h.group("Test group", "test_slug", "");
    let post = h.post(&leo, "Post text", Some(&group));
    h.app.store.create_comment(post.id, leo.id, "first!").unwrap();

    let context = json(&h.get(&format!("/posts/{}/", post.id), None).await);
    assert_eq!(context["post"]["author"]["username"], "auth");
    assert_eq!(context["post"]["text"], "Post text");
    assert_eq!(context["post"]["group"]["title"], "Test group");
    assert_eq!(context["author_post_count"], 1);
    assert_eq!(context["comments"][0]["text"], "first!");
    assert_eq!(context["form"]["fields"][0]["label"], "Comment");
}

#[tokio::test]
async fn paginator_splits_thirteen_posts() {
    let h = Harness::new();
    let author = h.user("test");
    let group = h.group("Test group", "test_slug", "");
    for i in 0..13 {
        h.post(&author, &i.to_string(), Some(&group));
    }

    for uri in ["/", "/group/test_slug/", "/profile/test/"] {
        let first = json(&h.get(uri, None).await);
        assert_eq!(page_len(&first), 10, "{uri}");
        assert_eq!(first["page_obj"]["count"], 13);
        assert_eq!(first["page_obj"]["num_pages"], 2);

        let second = json(&h.get(&format!("{uri}?page=2"), None).await);
        assert_eq!(page_len(&second), 3, "{uri}?page=2");

        let clamped = json(&h.get(&format!("{uri}?page=40"), None).await);
        assert_eq!(clamped["page_obj"]["number"], 2);
    }

    let newest = json(&h.get("/", None).await);
    assert_eq!(newest["page_obj"]["items"][0]["text"], "12");
}

#[tokio::test]
async fn index_is_cached_until_cleared() {
    let h = Harness::new();
    let leo = h.user("auth");
    h.post(&leo, "Cached text", None);

    let before = h.get("/", None).await;
    assert_eq!(page_len(&json(&before)), 1);
    // Written behind the views' back, so nothing clears the cache.
    h.post(&leo, "Late text", None);

    let cached = h.get("/", None).await;
    assert_eq!(before.body(), cached.body());

    h.app.index_cache.clear();
    let fresh = h.get("/", None).await;
    assert_ne!(before.body(), fresh.body());
    assert_eq!(page_len(&json(&fresh)), 2);
}

#[tokio::test]
async fn junk_queries_cannot_grow_the_index_cache() {
    let h = Harness::with_config(Config {
        database: ":memory:".to_owned(),
        index_cache_entries: 8,
        ..Config::default()
    });
    for i in 0..200 {
        let res = h.get(&format!("/?junk={i}"), None).await;
        assert_eq!(res.status_code(), Status::Ok);
    }
    assert_eq!(h.app.index_cache.len(), 8);
}

#[tokio::test]
async fn other_listings_are_not_cached() {
    let h = Harness::new();
    let leo = h.user("auth");
    h.post(&leo, "text", None);

    assert_eq!(page_len(&json(&h.get("/profile/auth/", None).await)), 1);
    h.post(&leo, "more text", None);
    assert_eq!(page_len(&json(&h.get("/profile/auth/", None).await)), 2);
}

#[tokio::test]
async fn creating_a_post_redirects_to_profile() {
    let h = Harness::new();
    let leo = h.user("auth");
    let group = h.group("Test group", "test_slug", "");
    let cookie = h.login(&leo);

    // Warm the cache; publishing must invalidate it.
    assert_eq!(page_len(&json(&h.get("/", None).await)), 0);

    let body = format!("text=Post+text&group={}&image=posts%2Fsmall.gif", group.id);
    let res = h.post_form("/create/", Some(&cookie), &body).await;
    assert_eq!(res.status_code(), Status::Found);
    assert_eq!(location(&res), "/profile/auth/");

    let posts = h.app.store.posts(PostFilter::Author(leo.id), 0, 10).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "Post text");
    assert_eq!(posts[0].group.as_ref().map(|g| g.id), Some(group.id));
    assert_eq!(posts[0].image.as_deref(), Some("posts/small.gif"));

    assert_eq!(page_len(&json(&h.get("/", None).await)), 1);
}

#[tokio::test]
async fn invalid_post_is_redisplayed_with_errors() {
    let h = Harness::new();
    let leo = h.user("auth");
    let cookie = h.login(&leo);

    let res = h.post_form("/create/", Some(&cookie), "text=+&group=42").await;
    assert_eq!(res.status_code(), Status::Ok);
    let context = json(&res);
    assert_eq!(context["is_edit"], false);
    assert_eq!(context["form"]["is_bound"], true);
    let fields = context["form"]["fields"].as_array().unwrap();
    assert_eq!(fields[0]["name"], "group");
    assert_eq!(fields[0]["errors"].as_array().unwrap().len(), 1);
    assert_eq!(fields[1]["errors"][0], "This field is required.");
    assert_eq!(h.app.store.count_posts(PostFilter::All).unwrap(), 0);
}

#[tokio::test]
async fn guest_cannot_create_posts() {
    let h = Harness::new();
    let res = h.post_form("/create/", None, "text=Post+text").await;
    assert_eq!(res.status_code(), Status::Found);
    assert_eq!(location(&res), "/auth/login/?next=/create/");
    assert_eq!(h.app.store.count_posts(PostFilter::All).unwrap(), 0);
}

#[tokio::test]
async fn author_edits_post() {
    let h = Harness::new();
    let leo = h.user("auth");
    let group = h.group("Test group", "test_slug", "");
    let post = h.post(&leo, "Draft", None);
    let cookie = h.login(&leo);
    let uri = format!("/posts/{}/edit/", post.id);

    let context = json(&h.get(&uri, Some(&cookie)).await);
    assert_eq!(context["is_edit"], true);
    assert_eq!(context["post_id"], post.id);
    assert_eq!(context["form"]["fields"][1]["value"], "Draft");
    assert_eq!(context["form"]["is_bound"], false);

    let res = h.post_form(&uri, Some(&cookie), &format!("text=Final&group={}", group.id)).await;
    assert_eq!(res.status_code(), Status::Found);
    assert_eq!(location(&res), format!("/posts/{}/", post.id));

    let edited = h.app.store.post_by_id(post.id).unwrap().unwrap();
    assert_eq!(edited.text, "Final");
    assert_eq!(edited.author.id, leo.id);
    assert_eq!(edited.group.map(|g| g.id), Some(group.id));
    assert_eq!(h.app.store.count_posts(PostFilter::All).unwrap(), 1);
}

#[tokio::test]
async fn non_author_is_bounced_from_edit() {
    let h = Harness::new();
    let leo = h.user("leo");
    let anna = h.user("anna");
    let post = h.post(&leo, "Mine", None);
    let cookie = h.login(&anna);
    let uri = format!("/posts/{}/edit/", post.id);

    let res = h.post_form(&uri, Some(&cookie), "text=Hijacked").await;
    assert_eq!(res.status_code(), Status::Found);
    assert_eq!(location(&res), format!("/posts/{}/", post.id));
    assert_eq!(h.app.store.post_by_id(post.id).unwrap().unwrap().text, "Mine");
}

#[tokio::test]
async fn invalid_edit_is_redisplayed() {
    let h = Harness::new();
    let leo = h.user("leo");
    let post = h.post(&leo, "Mine", None);
    let cookie = h.login(&leo);

    let res = h.post_form(&format!("/posts/{}/edit/", post.id), Some(&cookie), "text=").await;
    assert_eq!(res.status_code(), Status::Ok);
    let context = json(&res);
    assert_eq!(context["is_edit"], true);
    assert_eq!(context["post_id"], post.id);
    assert_eq!(h.app.store.post_by_id(post.id).unwrap().unwrap().text, "Mine");
}

#[tokio::test]
async fn comments_are_added_by_signed_in_users() {
    let h = Harness::new();
    let leo = h.user("auth");
    let post = h.post(&leo, "Post text", None);
    let cookie = h.login(&leo);
    let uri = format!("/posts/{}/comment/", post.id);

    let res = h.post_form(&uri, Some(&cookie), "text=Comment+text").await;
    assert_eq!(res.status_code(), Status::Found);
    assert_eq!(location(&res), format!("/posts/{}/", post.id));

    let comments = h.app.store.comments(post.id).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "Comment text");
    assert_eq!(comments[0].author.id, leo.id);

    // An empty submission still lands on the post, without a comment.
    let res = h.post_form(&uri, Some(&cookie), "text=").await;
    assert_eq!(location(&res), format!("/posts/{}/", post.id));
    let res = h.get(&uri, Some(&cookie)).await;
    assert_eq!(location(&res), format!("/posts/{}/", post.id));
    assert_eq!(h.app.store.comments(post.id).unwrap().len(), 1);

    let res = h.post_form(&uri, None, "text=Anonymous").await;
    assert!(location(&res).starts_with("/auth/login/"));
    assert_eq!(h.app.store.comments(post.id).unwrap().len(), 1);
}

#[tokio::test]
async fn follow_feed_tracks_subscriptions() {
    let h = Harness::new();
    let author = h.user("author");
    let reader = h.user("reader");
    let stranger = h.user("stranger");
    h.post(&author, "Followed post", None);
    let reader_cookie = h.login(&reader);
    let stranger_cookie = h.login(&stranger);

    assert_eq!(page_len(&json(&h.get("/follow/", Some(&reader_cookie)).await)), 0);

    let res = h.get("/profile/author/follow/", Some(&reader_cookie)).await;
    assert_eq!(location(&res), "/profile/author/");
    // Following twice keeps one subscription.
    h.post_form("/profile/author/follow/", Some(&reader_cookie), "").await;
    assert!(h.app.store.is_following(reader.id, author.id).unwrap());

    let feed = json(&h.get("/follow/", Some(&reader_cookie)).await);
    assert_eq!(page_len(&feed), 1);
    assert_eq!(feed["page_obj"]["items"][0]["text"], "Followed post");
    assert_eq!(page_len(&json(&h.get("/follow/", Some(&stranger_cookie)).await)), 0);

    let profile = json(&h.get("/profile/author/", Some(&reader_cookie)).await);
    assert_eq!(profile["following"], true);

    let res = h.get("/profile/author/unfollow/", Some(&reader_cookie)).await;
    assert_eq!(location(&res), "/profile/author/");
    assert_eq!(page_len(&json(&h.get("/follow/", Some(&reader_cookie)).await)), 0);
    let profile = json(&h.get("/profile/author/", Some(&reader_cookie)).await);
    assert_eq!(profile["following"], false);
}

#[tokio::test]
async fn following_yourself_is_a_no_op() {
    let h = Harness::new();
    let leo = h.user("leo");
    let cookie = h.login(&leo);

    let res = h.get("/profile/leo/follow/", Some(&cookie)).await;
    assert_eq!(location(&res), "/profile/leo/");
    assert!(!h.app.store.is_following(leo.id, leo.id).unwrap());
}

#[tokio::test]
async fn health_probes() {
    let h = Harness::new();
    assert_eq!(h.get("/healthz", None).await.body(), b"ok");
    assert_eq!(h.get("/readyz", None).await.body(), b"ready");
}
