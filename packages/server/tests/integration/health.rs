use ::common::config::{PolicyConfig, UploadConfig};
use ::common::storage::InMemoryRepository;

use crate::common::{TestApp, routes};

mod health_check {
    use super::*;

    #[tokio::test]
    async fn reports_access_without_session() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::HEALTH).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["configured"], true);
        assert_eq!(res.body["credentials_valid"], true);
        assert_eq!(res.body["repository_reachable"], true);
        assert_eq!(res.body["can_write"], true);
    }

    #[tokio::test]
    async fn repeated_calls_agree() {
        let repo = InMemoryRepository::new("main").read_only();
        let app =
            TestApp::spawn_with_repo(repo, PolicyConfig::default(), UploadConfig::default()).await;

        let first = app.get_without_token(routes::HEALTH).await;
        let second = app.get_without_token(routes::HEALTH).await;

        assert_eq!(first.status, 200);
        assert_eq!(first.body, second.body);
        assert_eq!(first.body["can_write"], false);
    }

    #[tokio::test]
    async fn rejected_credentials_are_reported_not_raised() {
        let repo = InMemoryRepository::new("main").with_rejected_credentials();
        let app =
            TestApp::spawn_with_repo(repo, PolicyConfig::default(), UploadConfig::default()).await;

        let res = app.get_without_token(routes::HEALTH).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["credentials_valid"], false);
        assert_eq!(res.body["can_write"], false);
    }

    #[tokio::test]
    async fn missing_configuration_is_explicit() {
        let app = TestApp::spawn_unconfigured().await;

        let res = app.get_without_token(routes::HEALTH).await;

        assert_eq!(res.status, 500);
        assert_eq!(res.code(), "CONFIGURATION_ERROR");
        assert!(res.body["message"].as_str().unwrap().contains("github.token"));
    }
}
