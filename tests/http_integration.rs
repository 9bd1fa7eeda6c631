//! Integration tests for the REST client using wiremock
//!
//! These tests verify the authentication handshake, token handling and the
//! mapping of appliance answers onto `SvcApi` results.

use serde_json::json;
use svctl::config::Connection;
use svctl::svc::auth::Credentials;
use svctl::svc::{format_svc_error, Command, SvcApi, SvcClient, SvcError};
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn connection(credentials: Credentials) -> Connection {
    Connection {
        clustername: "cluster1".into(),
        domain: None,
        credentials,
        validate_certs: false,
    }
}

fn password() -> Credentials {
    Credentials::Password {
        username: "admin".into(),
        password: "passw0rd".into(),
    }
}

fn client_for(server: &MockServer, credentials: Credentials) -> SvcClient {
    let base = Url::parse(&format!("{}/rest/v1/", server.uri())).unwrap();
    SvcClient::with_base_url(&connection(credentials), base).unwrap()
}

/// Test module for the authentication handshake
mod auth_tests {
    use super::*;

    /// Password credentials are exchanged once and the token reused
    #[tokio::test]
    async fn test_token_obtained_once_and_reused() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/auth"))
            .and(header("X-Auth-Username", "admin"))
            .and(header("X-Auth-Password", "passw0rd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "session-1"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/lssystem"))
            .and(header("X-Auth-Token", "session-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "cluster1"})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, password());
        let first = client.obj_info(&Command::new("lssystem")).await.unwrap();
        let second = client.obj_info(&Command::new("lssystem")).await.unwrap();

        assert_eq!(first, Some(json!({"name": "cluster1"})));
        assert_eq!(first, second);
    }

    /// A pre-issued token skips the handshake entirely
    #[tokio::test]
    async fn test_preissued_token_skips_auth() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "unused"})))
            .expect(0)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/lsdrive/10"))
            .and(header("X-Auth-Token", "preissued"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "10", "use": "candidate"})))
            .mount(&server)
            .await;

        let client = client_for(&server, Credentials::Token("preissued".into()));
        let drive = client
            .obj_info(&Command::new("lsdrive").arg("10"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(drive["use"], "candidate");
    }

    /// Rejected credentials are fatal and reported as such
    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/auth"))
            .respond_with(ResponseTemplate::new(403).set_body_string("\"Authentication failed\""))
            .mount(&server)
            .await;

        let client = client_for(&server, password());
        let err = client.obj_info(&Command::new("lssystem")).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<SvcError>(), Some(SvcError::Auth(_))));
        assert!(format_svc_error(&err).starts_with("Authentication failed (403"));
    }

    /// An answer without a token is an authentication failure
    #[tokio::test]
    async fn test_auth_response_without_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server, password());
        let err = client.run(&Command::new("chsecurity")).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<SvcError>(), Some(SvcError::Auth(_))));
    }
}

/// Test module for command handling
mod command_tests {
    use super::*;

    /// Options travel as the JSON body, objects as path segments
    #[tokio::test]
    async fn test_options_sent_as_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/chdrive/10"))
            .and(body_json(json!({"use": "spare", "allowdegraded": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Credentials::Token("t".into()));
        let cmd = Command::new("chdrive")
            .opt("use", "spare")
            .flag("allowdegraded")
            .arg("10");
        let response = client.run(&cmd).await.unwrap();

        assert!(response.is_null());
    }

    /// Creation responses carry the new object id
    #[tokio::test]
    async fn test_create_returns_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/mkvolumegroup"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "3", "message": "Volume Group, id [3], successfully created"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Credentials::Token("t".into()));
        let response = client
            .run(&Command::new("mkvolumegroup").opt("name", "vg0"))
            .await
            .unwrap();

        assert_eq!(svctl::svc::created_id(&response), Some("3".to_string()));
    }

    /// CMMVC5753E on a listing means the object does not exist
    #[tokio::test]
    async fn test_vendor_not_found_maps_to_none() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/lsvolumegroup/vg0"))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                "\"CMMVC5753E The specified object does not exist or is not a suitable candidate.\"",
            ))
            .mount(&server)
            .await;

        let client = client_for(&server, Credentials::Token("t".into()));
        let result = client
            .obj_info(&Command::new("lsvolumegroup").arg("vg0"))
            .await
            .unwrap();

        assert!(result.is_none());
    }

    /// HTTP 404 on a listing means the object does not exist
    #[tokio::test]
    async fn test_http_404_maps_to_none() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/lspartition/p1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server, Credentials::Token("t".into()));
        let result = client
            .obj_info(&Command::new("lspartition").arg("p1"))
            .await
            .unwrap();

        assert!(result.is_none());
    }

    /// Other listing failures surface with the vendor message
    #[tokio::test]
    async fn test_listing_failure_keeps_vendor_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/lsvdisk"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string("\"CMMVC5786E The action failed because the cluster is not in a stable state.\""),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Credentials::Token("t".into()));
        let err = client.obj_info(&Command::new("lsvdisk")).await.unwrap_err();

        let message = format_svc_error(&err);
        assert!(message.starts_with("Failed to get object info with [lsvdisk]"));
        assert!(message.contains("CMMVC5786E"));
    }

    /// Mutation failures keep the vendor code reachable for callers
    #[tokio::test]
    async fn test_run_failure_exposes_vendor_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/chdrive/4"))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                "\"CMMVC6625E The task cannot be initiated because a task is already in progress.\"",
            ))
            .mount(&server)
            .await;

        let client = client_for(&server, Credentials::Token("t".into()));
        let err = client
            .run(&Command::new("chdrive").opt("task", "format").arg("4"))
            .await
            .unwrap_err();

        let svc = err.downcast_ref::<SvcError>().unwrap();
        assert_eq!(svc.vendor_code(), Some("CMMVC6625E"));
        assert!(!svc.is_not_found());
    }
}
