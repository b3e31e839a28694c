use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

mod common;
use common::{ENHANCED_TEXT, Session, TestApp};

async fn create_resume(app: &TestApp, session: &Session, title: &str) -> Uuid {
    let resp = app
        .client
        .post(app.url("/resume/create"))
        .bearer_auth(&session.access_token)
        .json(&json!({ "title": title }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], format!("\"{}\" created successfully.", title.to_uppercase()));
    body["resume"]["id"].as_str().unwrap().parse().unwrap()
}

async fn signed_in(app: &TestApp) -> Session {
    let user = app.register_verified().await;
    app.login(&user).await
}

#[tokio::test]
async fn test_create_and_read_resume() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;

    let id = create_resume(&app, &session, "Backend Engineer").await;

    let resp = app.get_authed(&format!("/resume/{id}"), &session.access_token).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let resume = &body["resume"];
    assert_eq!(resume["title"], "Backend Engineer");
    assert_eq!(resume["template"], "classic");
    assert_eq!(resume["accentColor"], "#3B82F6");
    assert_eq!(resume["public"], false);
    assert!(resume["personalInfo"].is_object());
    assert_eq!(resume["skills"], json!([]));
}

#[tokio::test]
async fn test_duplicate_title_conflicts() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;

    create_resume(&app, &session, "Same Title").await;
    let resp = app
        .client
        .post(app.url("/resume/create"))
        .bearer_auth(&session.access_token)
        .json(&json!({ "title": "Same Title" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_is_scoped_to_owner_and_newest_first() {
    let app = TestApp::spawn().await;
    let alice = signed_in(&app).await;
    let bob = signed_in(&app).await;

    let first = create_resume(&app, &alice, "First").await;
    let second = create_resume(&app, &alice, "Second").await;
    create_resume(&app, &bob, "Bob's").await;

    let resp = app.get_authed("/resume/all", &alice.access_token).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let ids: Vec<&str> = body["resumes"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![second.to_string(), first.to_string()]);
}

#[tokio::test]
async fn test_ownership_is_enforced() {
    let app = TestApp::spawn().await;
    let alice = signed_in(&app).await;
    let mallory = signed_in(&app).await;
    let id = create_resume(&app, &alice, "Private").await;

    let resp = app.get_authed(&format!("/resume/{id}"), &mallory.access_token).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .client
        .put(app.url(&format!("/resume/{id}")))
        .bearer_auth(&mallory.access_token)
        .json(&json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.client.delete(app.url(&format!("/resume/{id}"))).bearer_auth(&mallory.access_token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.get_authed(&format!("/resume/{}", Uuid::new_v4()), &alice.access_token).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_merges_fields() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;
    let id = create_resume(&app, &session, "Draft").await;

    let resp = app
        .client
        .put(app.url(&format!("/resume/{id}")))
        .bearer_auth(&session.access_token)
        .json(&json!({
            "template": "minimal-image",
            "accentColor": "#10B981",
            "personalInfo": { "fullName": "Grace Hopper", "linkedin": "https://linkedin.com/in/grace" },
            "experience": [{
                "company": "Navy",
                "position": "Rear Admiral",
                "startDate": "1943-01",
                "endDate": "1986-08",
                "isCurrent": true
            }],
            "skills": ["COBOL", ""]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    let resume = &body["resume"];
    assert_eq!(resume["title"], "Draft");
    assert_eq!(resume["template"], "minimal-image");
    assert_eq!(resume["accentColor"], "#10B981");
    assert_eq!(resume["personalInfo"]["fullName"], "Grace Hopper");
    assert!(resume["experience"][0]["endDate"].is_null(), "Current jobs have no end date");
    assert_eq!(resume["skills"], json!(["COBOL"]));

    // A partial update keeps what it does not mention
    let resp = app
        .client
        .put(app.url(&format!("/resume/{id}")))
        .bearer_auth(&session.access_token)
        .json(&json!({ "personalInfo": { "profession": "Computer Scientist" } }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["resume"]["personalInfo"]["fullName"], "Grace Hopper");
    assert_eq!(body["resume"]["personalInfo"]["profession"], "Computer Scientist");
    assert_eq!(body["resume"]["template"], "minimal-image");
}

#[tokio::test]
async fn test_update_rejects_bad_values() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;
    let id = create_resume(&app, &session, "Draft").await;

    for payload in [json!({ "accentColor": "blue" }), json!({ "title": "" }), json!({ "template": "fancy" })] {
        let resp = app
            .client
            .put(app.url(&format!("/resume/{id}")))
            .bearer_auth(&session.access_token)
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_client_error(), "payload {payload} should be rejected");
    }
}

#[tokio::test]
async fn test_public_share() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;
    let id = create_resume(&app, &session, "Shared").await;

    let resp = app.client.get(app.url(&format!("/resume/public/{id}"))).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND, "Private resumes are not shared");

    app.client
        .put(app.url(&format!("/resume/{id}")))
        .bearer_auth(&session.access_token)
        .json(&json!({ "public": true }))
        .send()
        .await
        .unwrap();

    let resp = app.client.get(app.url(&format!("/resume/public/{id}"))).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["resume"]["title"], "Shared");
}

#[tokio::test]
async fn test_delete_resume() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;
    let id = create_resume(&app, &session, "Old One").await;

    let resp = app.client.delete(app.url(&format!("/resume/{id}"))).bearer_auth(&session.access_token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "\"OLD ONE\" deleted successfully.");

    let resp = app.get_authed(&format!("/resume/{id}"), &session.access_token).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_extracts_resume() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;

    let resp = app
        .client
        .post(app.url("/resume/upload"))
        .bearer_auth(&session.access_token)
        .json(&json!({ "title": "Imported", "resumeText": "Ada Lovelace, programmer." }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    let id = body["resume"]["id"].as_str().unwrap();

    let resp = app.get_authed(&format!("/resume/{id}"), &session.access_token).await;
    let body: Value = resp.json().await.unwrap();
    let resume = &body["resume"];
    assert_eq!(resume["personalInfo"]["fullName"], "Ada Lovelace");
    assert_eq!(resume["skills"], json!(["Mathematics", "Poetry"]));
    assert!(resume["experience"][0]["endDate"].is_null());
}

#[tokio::test]
async fn test_upload_without_essentials_is_rejected() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;

    let resp = app
        .client
        .post(app.url("/resume/upload"))
        .bearer_auth(&session.access_token)
        .json(&json!({ "title": "Blank", "resumeText": "UNREADABLE scan" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_enhance_text() {
    let app = TestApp::spawn().await;
    let session = signed_in(&app).await;

    let resp = app
        .client
        .post(app.url("/resume/enhance-text"))
        .bearer_auth(&session.access_token)
        .json(&json!({ "type": "summary", "text": "I write code." }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["enhancedText"], ENHANCED_TEXT);

    let resp = app
        .client
        .post(app.url("/resume/enhance-text"))
        .json(&json!({ "type": "summary", "text": "I write code." }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
