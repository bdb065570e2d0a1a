mod common;

use serde_json::{Value, json};

use common::TestServer;

#[tokio::test]
async fn health_reports_ok() {
    let server = TestServer::start().await;
    let body: Value = reqwest::get(server.url("/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn signup_login_and_me() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;

    let dup = server
        .client
        .post(server.url("/auth/signup"))
        .json(&json!({ "username": "alice", "password": "another password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), 400);
    let body: Value = dup.json().await.unwrap();
    assert_eq!(body["message"], "User already exists");

    let bad = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": "wrong password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 401);

    let ok = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": "correct horse battery" }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["id"], alice.id.as_str());
    assert!(body.get("password").is_none());

    let me: Value = server.get(&alice, "/auth/me").await.json().await.unwrap();
    assert_eq!(me["username"], "alice");
    assert_eq!(me["gender"], "Boy");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let server = TestServer::start().await;
    let resp = reqwest::get(server.url("/conversations")).await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .get(server.url("/conversations"))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn alice_messages_bob() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;

    let chat = server.conversation(&alice, &bob).await;
    server.send_text(&alice, &chat, "hi").await;

    let convs: Value = server.get(&bob, "/conversations").await.json().await.unwrap();
    assert_eq!(convs.as_array().unwrap().len(), 1);
    assert_eq!(convs[0]["id"], chat.as_str());
    assert_eq!(convs[0]["lastMessage"], "hi");

    for user in [&alice, &bob] {
        let messages: Value = server.get(user, &format!("/messages/{}", chat)).await.json().await.unwrap();
        let messages = messages.as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["text"], "hi");
        assert_eq!(messages[0]["senderUsername"], "alice");
        assert_eq!(messages[0]["status"], "sent");
    }
}

#[tokio::test]
async fn private_conversation_is_found_not_duplicated() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;

    let first = server.post(&alice, "/conversations", json!({ "participantId": bob.id })).await;
    assert_eq!(first.status(), 201);
    let first: Value = first.json().await.unwrap();

    let swapped = server.post(&bob, "/conversations", json!({ "participantId": alice.id })).await;
    assert_eq!(swapped.status(), 200);
    let swapped: Value = swapped.json().await.unwrap();
    assert_eq!(first["id"], swapped["id"]);

    let convs: Value = server.get(&alice, "/conversations").await.json().await.unwrap();
    assert_eq!(convs.as_array().unwrap().len(), 1);

    let selfish = server.post(&alice, "/conversations", json!({ "participantId": alice.id })).await;
    assert_eq!(selfish.status(), 400);
}

#[tokio::test]
async fn messages_come_back_in_send_order() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let chat = server.conversation(&alice, &bob).await;

    let mut sent = vec![];
    for (i, user) in [&alice, &bob, &alice, &alice, &bob].into_iter().enumerate() {
        let msg = server.send_text(user, &chat, &format!("msg {}", i)).await;
        sent.push(msg["id"].as_str().unwrap().to_string());
    }

    let listed: Value = server.get(&bob, &format!("/messages/{}", chat)).await.json().await.unwrap();
    let ids: Vec<&str> = listed.as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, sent);

    let after: Value = server
        .get(&bob, &format!("/messages/{}?after={}", chat, sent[2]))
        .await
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = after.as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, &sent[3..]);
}

#[tokio::test]
async fn group_puts_creator_first_without_duplicates() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let carol = server.signup("carol").await;

    let resp = server
        .post(
            &alice,
            "/conversations",
            json!({ "isGroup": true, "title": "trio", "participantIds": [carol.id, bob.id, carol.id, alice.id] }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let group: Value = resp.json().await.unwrap();
    assert_eq!(group["isGroup"], true);
    assert_eq!(group["title"], "trio");
    let members: Vec<&str> = group["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(members, vec![alice.id.as_str(), carol.id.as_str(), bob.id.as_str()]);

    let again = server
        .post(&alice, "/conversations", json!({ "isGroup": true, "participantIds": [bob.id, carol.id] }))
        .await;
    assert_eq!(again.status(), 201);
    let again: Value = again.json().await.unwrap();
    assert_ne!(again["id"], group["id"]);
    assert_eq!(again["title"], "New Chat");

    let ghost = server
        .post(
            &alice,
            "/conversations",
            json!({ "isGroup": true, "participantIds": [bob.id, "00000000-0000-0000-0000-000000000000"] }),
        )
        .await;
    assert_eq!(ghost.status(), 404);
    let ghost: Value = ghost.json().await.unwrap();
    assert_eq!(ghost["message"], "Participant not found");

    let alone = server
        .post(&alice, "/conversations", json!({ "isGroup": true, "participantIds": [alice.id] }))
        .await;
    assert_eq!(alone.status(), 400);
}

#[tokio::test]
async fn media_messages_need_a_url_and_preview_by_kind() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let chat = server.conversation(&alice, &bob).await;

    for kind in ["image", "audio"] {
        let bare = server
            .post(&alice, "/messages", json!({ "conversationId": chat, "type": kind }))
            .await;
        assert_eq!(bare.status(), 400, "{} without contentUrl", kind);
        let body: Value = bare.json().await.unwrap();
        assert!(body["message"].as_str().unwrap().contains("contentUrl"));
    }

    let image = server
        .post(
            &alice,
            "/messages",
            json!({ "conversationId": chat, "type": "image", "contentUrl": "https://cdn.example/cat.png" }),
        )
        .await;
    assert_eq!(image.status(), 201);
    let image: Value = image.json().await.unwrap();
    assert_eq!(image["type"], "image");
    assert_eq!(image["contentUrl"], "https://cdn.example/cat.png");

    let convs: Value = server.get(&bob, "/conversations").await.json().await.unwrap();
    assert_eq!(convs[0]["lastMessage"], "Sent an image");

    let empty = server
        .post(&alice, "/messages", json!({ "conversationId": chat, "text": "   " }))
        .await;
    assert_eq!(empty.status(), 400);
}

#[tokio::test]
async fn reply_must_stay_in_its_conversation() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let carol = server.signup("carol").await;
    let with_bob = server.conversation(&alice, &bob).await;
    let with_carol = server.conversation(&alice, &carol).await;

    let elsewhere = server.send_text(&alice, &with_carol, "for carol").await;
    let cross = server
        .post(
            &alice,
            "/messages",
            json!({ "conversationId": with_bob, "text": "re", "replyTo": elsewhere["id"] }),
        )
        .await;
    assert_eq!(cross.status(), 400);

    let missing = server
        .post(
            &alice,
            "/messages",
            json!({ "conversationId": with_bob, "text": "re", "replyTo": "00000000-0000-0000-0000-000000000000" }),
        )
        .await;
    assert_eq!(missing.status(), 400);

    let original = server.send_text(&bob, &with_bob, "question").await;
    let reply = server
        .post(
            &alice,
            "/messages",
            json!({ "conversationId": with_bob, "text": "answer", "replyTo": original["id"] }),
        )
        .await;
    assert_eq!(reply.status(), 201);
    let reply: Value = reply.json().await.unwrap();
    assert_eq!(reply["replyTo"], original["id"]);
}

#[tokio::test]
async fn unknown_cursor_is_rejected() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let carol = server.signup("carol").await;
    let chat = server.conversation(&alice, &bob).await;
    let other = server.conversation(&alice, &carol).await;
    server.send_text(&alice, &chat, "hi").await;
    let foreign = server.send_text(&alice, &other, "elsewhere").await;

    let unknown = server
        .get(&bob, &format!("/messages/{}?after=00000000-0000-0000-0000-000000000000", chat))
        .await;
    assert_eq!(unknown.status(), 400);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["message"], "Unknown cursor message");

    let cross = server
        .get(&alice, &format!("/messages/{}?after={}", chat, foreign["id"].as_str().unwrap()))
        .await;
    assert_eq!(cross.status(), 400);

    let malformed = server.get(&bob, &format!("/messages/{}?after=yesterday", chat)).await;
    assert_eq!(malformed.status(), 400);
    let body: Value = malformed.json().await.unwrap();
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn outsiders_cannot_read_or_write() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let eve = server.signup("eve").await;
    let chat = server.conversation(&alice, &bob).await;

    let read = server.get(&eve, &format!("/messages/{}", chat)).await;
    assert_eq!(read.status(), 403);

    let write = server
        .post(&eve, "/messages", json!({ "conversationId": chat, "text": "let me in" }))
        .await;
    assert_eq!(write.status(), 403);

    let missing = server
        .post(&alice, "/messages", json!({ "conversationId": "00000000-0000-0000-0000-000000000000", "text": "x" }))
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn status_only_moves_forward() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let chat = server.conversation(&alice, &bob).await;
    let msg = server.send_text(&alice, &chat, "hi").await;
    let path = format!("/messages/{}/status", msg["id"].as_str().unwrap());

    let own = server.put(&alice, &path, json!({ "status": "read" })).await;
    assert_eq!(own.status(), 403);

    let read: Value = server.put(&bob, &path, json!({ "status": "read" })).await.json().await.unwrap();
    assert_eq!(read["status"], "read");

    let back: Value = server.put(&bob, &path, json!({ "status": "delivered" })).await.json().await.unwrap();
    assert_eq!(back["status"], "read");
}

#[tokio::test]
async fn reactions_star_and_delete() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let chat = server.conversation(&alice, &bob).await;
    let msg = server.send_text(&alice, &chat, "hi").await;
    let id = msg["id"].as_str().unwrap();

    let added: Value = server
        .post(&bob, &format!("/messages/{}/reactions", id), json!({ "emoji": "🔥" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(added["added"], true);
    assert_eq!(added["reactions"][0]["count"], 1);

    let removed: Value = server
        .post(&bob, &format!("/messages/{}/reactions", id), json!({ "emoji": "🔥" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(removed["added"], false);
    assert_eq!(removed["reactions"].as_array().unwrap().len(), 0);

    let star: Value = server
        .post(&bob, &format!("/messages/{}/star", id), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(star["starred"], true);

    let not_sender = server.delete(&bob, &format!("/messages/{}", id)).await;
    assert_eq!(not_sender.status(), 403);
    let deleted = server.delete(&alice, &format!("/messages/{}", id)).await;
    assert_eq!(deleted.status(), 204);

    let listed: Value = server.get(&bob, &format!("/messages/{}", chat)).await.json().await.unwrap();
    assert_eq!(listed[0]["isDeleted"], true);
    assert!(listed[0]["text"].is_null());

    let convs: Value = server.get(&bob, "/conversations").await.json().await.unwrap();
    assert!(convs[0]["lastMessage"].is_null());
}

#[tokio::test]
async fn deleting_the_latest_message_restores_the_previous_preview() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let chat = server.conversation(&alice, &bob).await;
    server.send_text(&bob, &chat, "still here").await;
    let regret = server.send_text(&alice, &chat, "something I regret").await;

    let deleted = server
        .delete(&alice, &format!("/messages/{}", regret["id"].as_str().unwrap()))
        .await;
    assert_eq!(deleted.status(), 204);

    let convs: Value = server.get(&bob, "/conversations").await.json().await.unwrap();
    assert_eq!(convs[0]["lastMessage"], "still here");
}

#[tokio::test]
async fn follow_toggles_both_sides() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let path = format!("/auth/users/{}/follow", bob.id);

    let on: Value = server.post(&alice, &path, json!({})).await.json().await.unwrap();
    assert_eq!(on["following"], true);
    assert_eq!(on["userFollowing"], json!([bob.id]));

    let profile: Value = server.get(&alice, "/auth/users/bob").await.json().await.unwrap();
    assert_eq!(profile["followers"][0]["username"], "alice");
    let profile: Value = server.get(&bob, "/auth/users/alice").await.json().await.unwrap();
    assert_eq!(profile["following"][0]["username"], "bob");

    let off: Value = server.post(&alice, &path, json!({})).await.json().await.unwrap();
    assert_eq!(off["following"], false);
    let profile: Value = server.get(&alice, "/auth/users/bob").await.json().await.unwrap();
    assert_eq!(profile["followers"].as_array().unwrap().len(), 0);

    let selfish = server.post(&alice, &format!("/auth/users/{}/follow", alice.id), json!({})).await;
    assert_eq!(selfish.status(), 400);
    let ghost = server.get(&alice, "/auth/users/nobody").await;
    assert_eq!(ghost.status(), 404);
}

#[tokio::test]
async fn search_excludes_caller() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    server.signup("alicia").await;
    server.signup("bob").await;

    let found: Value = server.get(&alice, "/auth/users?search=ALI").await.json().await.unwrap();
    let names: Vec<&str> = found.as_array().unwrap().iter().map(|u| u["username"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["alicia"]);
}

#[tokio::test]
async fn profile_update_returns_fresh_token() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;

    let resp = server
        .put(&alice, "/auth/profile", json!({ "vibe": "chilling", "soundsEnabled": false }))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["vibe"], "chilling");
    assert_eq!(body["soundsEnabled"], false);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn feed_likes_and_comments() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;

    let missing_image = server.post(&alice, "/posts", json!({ "caption": "no pic" })).await;
    assert_eq!(missing_image.status(), 400);

    let post: Value = server
        .post(&alice, "/posts", json!({ "image": "https://img.example/1.png", "caption": "sunset" }))
        .await
        .json()
        .await
        .unwrap();
    let like_path = format!("/posts/{}/like", post["id"].as_str().unwrap());

    let liked: Value = server.post(&bob, &like_path, json!({})).await.json().await.unwrap();
    assert_eq!(liked, json!({ "liked": true, "count": 1 }));
    let unliked: Value = server.post(&bob, &like_path, json!({})).await.json().await.unwrap();
    assert_eq!(unliked, json!({ "liked": false, "count": 0 }));

    let comment_path = format!("/posts/{}/comment", post["id"].as_str().unwrap());
    let empty = server.post(&bob, &comment_path, json!({ "text": "  " })).await;
    assert_eq!(empty.status(), 400);
    let updated: Value = server.post(&bob, &comment_path, json!({ "text": "nice" })).await.json().await.unwrap();
    assert_eq!(updated["comments"][0]["text"], "nice");
    assert_eq!(updated["comments"][0]["author"]["username"], "bob");

    let feed: Value = server.get(&bob, "/posts").await.json().await.unwrap();
    assert_eq!(feed.as_array().unwrap().len(), 1);
    assert_eq!(feed[0]["author"]["username"], "alice");
}
