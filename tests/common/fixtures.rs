//! Mock Trello API with two cross-linked boards
//!
//! Work (w1)
//! - Todo: "Same" (S1), "Same" (S2), archived "Old" (S3)
//! - Done: "Wrap up" (S4), linking to S1 and to Home's H1, with one comment
//!
//! Home (h2)
//! - Chores: "Dishes" (H1), linking back to S4, with an uploaded attachment

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Date of the only comment; the second comment page is requested with it
pub const COMMENT_DATE: &str = "2024-03-01T12:00:00.000Z";

/// Body served for the uploaded attachment
pub const ATTACHMENT_BODY: &str = "remember the sponge";

/// Where the mock serves the uploaded attachment
pub fn attachment_url(server: &MockServer) -> String {
    format!("{}/attachments/att1/notes.txt", server.uri())
}

fn work_board(site: &str) -> Value {
    json!({
        "id": "b1",
        "name": "Work",
        "shortLink": "w1",
        "lists": [
            {"id": "l2", "name": "Done", "pos": "bottom", "closed": false},
            {"id": "l1", "name": "Todo", "pos": 1024, "closed": false}
        ],
        "cards": [
            {"id": "c4", "name": "Wrap up", "idList": "l2", "pos": 1, "closed": false,
             "shortLink": "S4",
             "desc": format!("See {site}/c/S1/1-same and {site}/c/H1.")},
            {"id": "c2", "name": "Same", "idList": "l1", "pos": "2048", "closed": false,
             "shortLink": "S2", "desc": "second"},
            {"id": "c1", "name": "Same", "idList": "l1", "pos": 1024, "closed": false,
             "shortLink": "S1", "desc": "first", "idChecklists": ["cl1"]},
            {"id": "c3", "name": "Old", "idList": "l1", "pos": 4096, "closed": true,
             "shortLink": "S3", "desc": null}
        ],
        "checklists": [
            {"id": "cl1", "idCard": "c1", "name": "Steps", "pos": 1, "checkItems": [
                {"id": "i2", "idChecklist": "cl1", "name": "ship", "pos": 2, "state": "incomplete"},
                {"id": "i1", "idChecklist": "cl1", "name": "build", "pos": 1, "state": "complete"}
            ]}
        ],
        "actions": []
    })
}

fn home_board(site: &str, attachment: &str) -> Value {
    json!({
        "id": "b2",
        "name": "Home",
        "shortLink": "h2",
        "lists": [{"id": "l9", "name": "Chores", "pos": "top", "closed": false}],
        "cards": [
            {"id": "h1", "name": "Dishes", "idList": "l9", "pos": 1, "closed": false,
             "shortLink": "H1",
             "desc": format!("Blocked by {site}/c/S4\n\n![notes]({attachment})"),
             "attachments": [
                 {"id": "att1", "name": "notes.txt", "fileName": "notes.txt",
                  "url": attachment, "isUpload": true},
                 {"id": "att2", "name": "Recipe", "fileName": null,
                  "url": "https://example.com/recipe", "isUpload": false}
             ]}
        ],
        "checklists": [],
        "actions": []
    })
}

/// Mount the board listing, both backups, the comment feeds and the attachment
pub async fn mount_two_boards(server: &MockServer) {
    let site = server.uri();
    let attachment = attachment_url(server);

    Mock::given(method("GET"))
        .and(path("/1/members/me/boards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "b1", "name": "Work", "shortLink": "w1"},
            {"id": "b2", "name": "Home", "shortLink": "h2"}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b/w1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(work_board(&site)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/h2.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(home_board(&site, &attachment)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/1/boards/w1/actions"))
        .and(query_param("filter", "commentCard"))
        .and(query_param_is_missing("before"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a1", "type": "commentCard", "date": COMMENT_DATE,
             "data": {"text": "Done and dusted", "card": {"id": "c4"}}}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/boards/w1/actions"))
        .and(query_param("before", COMMENT_DATE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/boards/h2/actions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/attachments/att1/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATTACHMENT_BODY))
        .mount(server)
        .await;
}
