use ::common::config::{PolicyConfig, UploadConfig};

use crate::common::{TestApp, routes};

mod me {
    use super::*;

    #[tokio::test]
    async fn returns_login_from_session_token() {
        let app = TestApp::spawn().await;
        let token = app.token("octocat");

        let res = app.get_with_token(routes::ME, &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["login"], "octocat");
        assert_eq!(res.body["allowed"], true);
        assert!(app.repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn reports_login_outside_allow_list() {
        let policy = PolicyConfig {
            allow_list: vec!["alice".into()],
            always_review: false,
        };
        let app = TestApp::spawn_with(policy, UploadConfig::default()).await;

        let res = app.get_with_token(routes::ME, &app.token("bob")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["allowed"], false);

        let res = app.get_with_token(routes::ME, &app.token("ALICE")).await;
        assert_eq!(res.body["allowed"], true);
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.get_without_token(routes::ME).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn malformed_token_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.get_with_token(routes::ME, "not-a-jwt").await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let app = TestApp::spawn().await;
        let forged = server::utils::jwt::sign(
            "octocat",
            "some-other-secret",
            chrono::Duration::hours(1),
        )
        .unwrap();

        let res = app.get_with_token(routes::ME, &forged).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }
}
