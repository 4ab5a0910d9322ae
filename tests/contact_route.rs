mod common;

use common::{app, post_json};
use estate_auth::mailer::RecordingMailer;
use estate_auth::test_support::{TEST_CONTACT_INBOX, TestRocketBuilder};
use rocket::http::{ContentType, Status};
use serde_json::{Value, json};

#[test]
fn contact_messages_reach_the_inbox() {
    let app = app();

    let (status, body) = post_json(
        &app.client,
        "/api/v1/contact",
        json!({
            "name": "Sam <i>Lee</i>",
            "email": "Sam@Example.com",
            "message": "Is the flat on Elm Street still available?",
            "propertyId": "listing-42",
        }),
    );
    assert_eq!(status, Status::Ok, "unexpected body: {body}");
    assert_eq!(body["success"], true);

    let contacts = app.mailer.contacts();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].name, "Sam Lee");
    assert_eq!(contacts[0].email, "sam@example.com");
    assert_eq!(contacts[0].recipient, TEST_CONTACT_INBOX);
    assert_eq!(contacts[0].property_id.as_deref(), Some("listing-42"));
    assert_eq!(contacts[0].phone, None);
}

#[test]
fn contact_delivery_failures_are_internal_errors() {
    let client = TestRocketBuilder::new()
        .with_mailer(RecordingMailer::failing())
        .blocking_client();

    let response = client
        .post("/api/v1/contact")
        .header(ContentType::JSON)
        .body(
            json!({
                "name": "Sam",
                "email": "sam@example.com",
                "message": "Hello",
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::InternalServerError);
    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["message"], "internal server error");
}
