//! HTTP client tests against a mock server

use franchise_core::{
    CaseApi, CaseStatus, ClientConfig, FranchiseError, HttpApiClient, NewRemark,
    NotificationApi, NotificationRequest, RemarkApi, ServiceStatus, StatusSummary, UserApi,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> HttpApiClient {
    let mut config = ClientConfig::default();
    config.api.base_url = format!("{}/api", server.uri());
    config.api.request_timeout_secs = 5;
    HttpApiClient::new(&config).unwrap().with_token("tok-123")
}

fn case_json() -> serde_json::Value {
    json!({
        "_id": "c1",
        "serialNo": 7,
        "ownerName": "Priya",
        "unitName": "Koramangala",
        "services": [
            {"_id": "s1", "name": "GST", "status": "Completed", "completionPercentage": 100},
            {"_id": "s2", "name": "FSSAI", "status": "In-Progress"},
            {"_id": "s3", "name": "Trade License", "status": "To be Started"}
        ],
        "status": "In-Progress",
        "completionPercentage": 33,
        "assignedUsers": ["u1", {"_id": "u2", "name": "Ravi"}]
    })
}

#[tokio::test]
async fn test_get_case_sends_bearer_and_normalizes_users() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cases/c1"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": case_json() })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let case = api.get_case("c1").await.unwrap();

    assert_eq!(case.serial_number, 7);
    assert_eq!(case.services().len(), 3);
    assert_eq!(case.status(), CaseStatus::InProgress);
    assert!(case.is_consistent(CaseStatus::NewCase));
    assert_eq!(case.assignee_ids(), ["u1", "u2"]);
    assert_eq!(case.assigned_users[1].label(), "Ravi");
}

#[tokio::test]
async fn test_list_cases_accepts_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([case_json()])))
        .mount(&server)
        .await;

    let cases = client_for(&server).await.list_cases().await.unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].unit_name, "Koramangala");
}

#[tokio::test]
async fn test_list_cases_keeps_legacy_case() {
    let server = MockServer::start().await;
    let mut legacy = case_json();
    legacy["_id"] = json!("c2");
    legacy["status"] = json!("Approved");
    Mock::given(method("GET"))
        .and(path("/api/cases"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [case_json(), legacy] })),
        )
        .mount(&server)
        .await;

    let cases = client_for(&server).await.list_cases().await.unwrap();
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[1].status(), CaseStatus::Approved);
}

#[tokio::test]
async fn test_missing_case_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cases/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such case"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.get_case("gone").await.unwrap_err();
    assert!(matches!(err, FranchiseError::CaseNotFound { id } if id == "gone"));
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/cases/c1/status"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let summary = StatusSummary {
        overall_status: CaseStatus::InProgress,
        completion_percentage: 67,
    };
    let err = client_for(&server)
        .await
        .update_case_status("c1", summary)
        .await
        .unwrap_err();

    match &err {
        FranchiseError::Api { status, message } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert!(err.is_remote());
}

#[tokio::test]
async fn test_update_case_status_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/cases/c1/status"))
        .and(body_json(json!({"status": "In-Progress", "completionPercentage": 67})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let summary = StatusSummary {
        overall_status: CaseStatus::InProgress,
        completion_percentage: 67,
    };
    client_for(&server)
        .await
        .update_case_status("c1", summary)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_service_status_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/cases/c1/services/s3"))
        .and(body_json(json!({"status": "Detail Required"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .await
        .update_service_status("c1", "s3", ServiceStatus::DetailRequired)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_remark_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cases/c1/services/s1/remarks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "_id": "r1",
                "caseId": "c1",
                "serviceId": "s1",
                "userId": "u1",
                "userName": "Asha",
                "remark": "Need the rent agreement",
                "createdAt": "2026-03-01T10:00:00Z",
                "readBy": ["u1"]
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/remarks"))
        .and(body_json(json!({"caseId": "c1", "serviceId": "s1", "text": "Sent"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {
                "_id": "r2",
                "caseId": "c1",
                "serviceId": "s1",
                "authorId": "u2",
                "text": "Sent",
                "readBy": []
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/remarks/r1/read"))
        .and(body_json(json!({"userId": "u2"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let remarks = api.list_remarks("c1", "s1").await.unwrap();
    assert_eq!(remarks[0].body, "Need the rent agreement");
    assert_eq!(remarks[0].author_name, "Asha");
    assert!(remarks[0].is_read_by("u1"));

    let created = api
        .create_remark(&NewRemark {
            case_id: "c1".to_string(),
            service_id: "s1".to_string(),
            text: "Sent".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, "r2");
    assert_eq!(created.author_id, "u2");

    api.mark_remark_read("r1", "u2").await.unwrap();
}

#[tokio::test]
async fn test_delete_unknown_remark() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/remarks/r404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .delete_remark("r404")
        .await
        .unwrap_err();
    assert!(matches!(err, FranchiseError::RemarkNotFound { .. }));
}

#[tokio::test]
async fn test_users_and_permissions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "u1",
            "name": "Asha",
            "role": "Super Admin"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1/permissions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"edit": true, "allCaseAccess": true})),
        )
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let user = api.get_user("u1").await.unwrap();
    assert!(user.role.is_admin());

    let permissions = api.get_permissions("u1").await.unwrap();
    assert!(permissions.edit);
    assert!(permissions.all_case_access);
    assert!(!permissions.delete);
}

#[tokio::test]
async fn test_notifications() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .and(query_param("userId", "u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_id": "n1", "userId": "u1", "message": "hello", "read": false},
            {"_id": "n2", "userId": "u1", "message": "bye", "read": true}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/send"))
        .and(body_json(json!({"userId": "u2", "message": "ping"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let notifications = api.list_notifications("u1").await.unwrap();
    assert_eq!(
        franchise_core::unread::unread_notification_count(&notifications),
        1
    );

    api.send_notification(&NotificationRequest {
        user_id: "u2".to_string(),
        message: "ping".to_string(),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(client_for(&server).await.health().await.is_ok());
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    let mut config = ClientConfig::default();
    config.api.base_url = "http://127.0.0.1:9/api".to_string();
    config.api.request_timeout_secs = 2;
    let api = HttpApiClient::new(&config).unwrap();

    let err = api.list_cases().await.unwrap_err();
    assert!(matches!(err, FranchiseError::Http(_)));
    assert_eq!(
        err.user_notice(),
        "Could not reach the server, changes were reverted"
    );
}
