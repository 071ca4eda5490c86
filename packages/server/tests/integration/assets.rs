use ::common::config::{PolicyConfig, UploadConfig};
use ::common::storage::InMemoryRepository;
use ::common::storage::memory::RepoCall;

use crate::common::{TestApp, asset_form, routes};

const GLB: &[u8] = b"glTF\x02\x00\x00\x00";

mod upload {
    use super::*;

    #[tokio::test]
    async fn image_is_published_under_normalized_namespace() {
        let app = TestApp::spawn().await;
        let token = app.token("alice");

        let res = app
            .upload_with_token(
                asset_form("image", "Kia", "Carnival", "preview.JPG", b"\xff\xd8\xff".to_vec()),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["path"], "images/kia/carnival/1700000000-preview.JPG");
        assert_eq!(
            res.body["public_url"],
            "https://cdn.jsdelivr.net/gh/acme/auto3d-assets@main/images/kia/carnival/1700000000-preview.JPG"
        );
        assert_eq!(res.body["branch"], "main");
        assert_eq!(res.body["status"], "published");
        assert!(res.body["commit_sha"].as_str().is_some());
        assert!(res.body.get("pull_request_url").is_none());
        assert!(
            app.repo
                .file("main", "images/kia/carnival/1700000000-preview.JPG")
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn diacritics_and_symbols_are_normalized() {
        let app = TestApp::spawn().await;
        let token = app.token("alice");

        let res = app
            .upload_with_token(
                asset_form("model", "Škoda", "Octavia RS / 2024", "car body.glb", GLB.to_vec()),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(
            res.body["path"],
            "models/skoda/octavia-rs-2024/1700000000-car_body.glb"
        );
    }

    #[tokio::test]
    async fn commit_pin_returns_immutable_url() {
        let app = TestApp::spawn().await;
        let token = app.token("alice");
        let form = asset_form("model", "Kia", "EV9", "ev9.glb", GLB.to_vec()).text("pin", "commit");

        let res = app.upload_with_token(form, &token).await;

        assert_eq!(res.status, 201, "{}", res.text);
        let sha = res.body["commit_sha"].as_str().unwrap();
        assert!(
            res.body["public_url"]
                .as_str()
                .unwrap()
                .contains(&format!("@{sha}/models/kia/ev9/"))
        );
    }

    #[tokio::test]
    async fn disallowed_model_format_is_rejected_before_remote_calls() {
        let app = TestApp::spawn().await;
        let token = app.token("alice");

        let res = app
            .upload_with_token(
                asset_form("model", "Kia", "Carnival", "part.stl", b"solid".to_vec()),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert_eq!(res.body["message"], "Only .glb allowed");
        assert!(app.repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_upload_is_rejected_before_remote_calls() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_without_token(asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_MISSING");
        assert!(app.repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn login_outside_allow_list_is_forbidden() {
        let policy = PolicyConfig {
            allow_list: vec!["alice".into()],
            always_review: false,
        };
        let app = TestApp::spawn_with(policy, UploadConfig::default()).await;

        let res = app
            .upload_with_token(
                asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()),
                &app.token("mallory"),
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "FORBIDDEN");
        assert!(app.repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn size_ceiling_is_inclusive() {
        let upload = UploadConfig {
            max_model_bytes: 16,
            ..UploadConfig::default()
        };
        let app = TestApp::spawn_with(PolicyConfig::default(), upload).await;
        let token = app.token("alice");

        let at_limit = app
            .upload_with_token(asset_form("model", "a", "b", "at.glb", vec![7u8; 16]), &token)
            .await;
        assert_eq!(at_limit.status, 201, "{}", at_limit.text);

        let over = app
            .upload_with_token(asset_form("model", "a", "b", "over.glb", vec![7u8; 17]), &token)
            .await;
        assert_eq!(over.status, 413);
        assert_eq!(over.code(), "PAYLOAD_TOO_LARGE");
        let message = over.body["message"].as_str().unwrap();
        assert!(message.contains("17") && message.contains("16"), "{message}");
    }

    #[tokio::test]
    async fn repository_size_rejection_is_payload_too_large() {
        let repo = InMemoryRepository::new("main").with_max_file_size(4);
        let app =
            TestApp::spawn_with_repo(repo, PolicyConfig::default(), UploadConfig::default()).await;

        let res = app
            .upload_with_token(
                asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()),
                &app.token("alice"),
            )
            .await;

        assert_eq!(res.status, 413, "{}", res.text);
        assert_eq!(res.code(), "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn request_body_over_limit_is_payload_too_large() {
        let upload = UploadConfig {
            max_model_bytes: 8,
            max_image_bytes: 8,
            ..UploadConfig::default()
        };
        let app = TestApp::spawn_with(PolicyConfig::default(), upload).await;
        let oversized_brand = "k".repeat(80 * 1024);

        let res = app
            .upload_with_token(
                asset_form("model", &oversized_brand, "Carnival", "a.glb", GLB.to_vec()),
                &app.token("alice"),
            )
            .await;

        assert_eq!(res.status, 413, "{}", res.text);
        assert_eq!(res.code(), "PAYLOAD_TOO_LARGE");
        assert!(app.repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let app = TestApp::spawn().await;
        let form = reqwest::multipart::Form::new()
            .text("category", "model")
            .text("brand", "Kia")
            .text("product", "Carnival");

        let res = app.upload_with_token(form, &app.token("alice")).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unknown_category_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_with_token(
                asset_form("texture", "Kia", "Carnival", "a.png", b"png".to_vec()),
                &app.token("alice"),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert!(app.repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn same_path_in_same_second_conflicts() {
        let app = TestApp::spawn().await;
        let token = app.token("alice");

        let first = app
            .upload_with_token(asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()), &token)
            .await;
        assert_eq!(first.status, 201);

        let second = app
            .upload_with_token(asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()), &token)
            .await;
        assert_eq!(second.status, 409);
        assert_eq!(second.code(), "WRITE_CONFLICT");
    }

    #[tokio::test]
    async fn review_upload_opens_pull_request_and_keeps_branch_url() {
        let app = TestApp::spawn().await;
        let form = asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()).text("review", "true");

        let res = app.upload_with_token(form, &app.token("alice")).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["status"], "pending_review");
        assert!(res.body["pull_request_url"].as_str().is_some());
        assert_eq!(res.body["pull_request_number"], 1);
        let review_branch = res.body["review_branch"].as_str().unwrap();
        assert!(review_branch.starts_with("upload/alice-1700000000-"));
        assert_eq!(
            res.body["public_url"],
            "https://cdn.jsdelivr.net/gh/acme/auto3d-assets@main/models/kia/carnival/1700000000-a.glb"
        );

        let calls = app.repo.calls().await;
        assert!(calls.iter().any(|c| matches!(c, RepoCall::CreateBranch { .. })));
        assert!(calls.iter().any(|c| matches!(c, RepoCall::OpenPullRequest { .. })));
        assert!(
            app.repo
                .file("main", "models/kia/carnival/1700000000-a.glb")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn always_review_policy_overrides_caller() {
        let policy = PolicyConfig {
            allow_list: vec![],
            always_review: true,
        };
        let app = TestApp::spawn_with(policy, UploadConfig::default()).await;

        let res = app
            .upload_with_token(
                asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()),
                &app.token("alice"),
            )
            .await;

        assert_eq!(res.status, 201);
        assert_eq!(res.body["status"], "pending_review");
    }

    #[tokio::test]
    async fn unconfigured_server_reports_configuration_error() {
        let app = TestApp::spawn_unconfigured().await;

        let res = app
            .upload_with_token(
                asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()),
                &app.token("alice"),
            )
            .await;

        assert_eq!(res.status, 500);
        assert_eq!(res.code(), "CONFIGURATION_ERROR");
        assert!(res.body["message"].as_str().unwrap().contains("github.token"));
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn uploaded_asset_appears_once_in_its_namespace() {
        let app = TestApp::spawn().await;
        let token = app.token("alice");
        let uploaded = app
            .upload_with_token(asset_form("model", "Kia", "Carnival", "a.glb", GLB.to_vec()), &token)
            .await;
        assert_eq!(uploaded.status, 201);
        app.repo
            .seed_file("main", "models/bmw/x5/1600000000-x5.glb", GLB)
            .await;

        let res = app
            .get_with_token(&routes::list("model", Some("kia")), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["repo_ref"], "acme/auto3d-assets");
        assert_eq!(res.body["branch"], "main");
        let items = res.body["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["path"], uploaded.body["path"]);
        assert_eq!(items[0]["url"], uploaded.body["public_url"]);
        assert_eq!(items[0]["size"], GLB.len());
        assert_eq!(items[0]["content_type"], "model/gltf-binary");
    }

    #[tokio::test]
    async fn newest_entries_come_first() {
        let app = TestApp::spawn().await;
        for path in [
            "images/kia/carnival/1600000000-old.png",
            "images/kia/carnival/1700000000-new.png",
            "images/kia/carnival/1650000000-mid.png",
        ] {
            app.repo.seed_file("main", path, b"png").await;
        }

        let res = app
            .get_with_token(&routes::list("image", None), &app.token("alice"))
            .await;

        let paths: Vec<&str> = res.body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["path"].as_str().unwrap())
            .collect();
        assert_eq!(
            paths,
            [
                "images/kia/carnival/1700000000-new.png",
                "images/kia/carnival/1650000000-mid.png",
                "images/kia/carnival/1600000000-old.png",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_category_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app
            .get_with_token(&routes::list("audio", None), &app.token("alice"))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn listing_requires_session() {
        let app = TestApp::spawn().await;
        let res = app.get_without_token(&routes::list("model", None)).await;
        assert_eq!(res.status, 401);
        assert!(app.repo.calls().await.is_empty());
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn path_outside_managed_roots_is_forbidden() {
        let app = TestApp::spawn().await;
        app.repo.seed_file("main", "README.md", b"# assets").await;

        let res = app
            .delete_with_token(&routes::delete("README.md", false), &app.token("alice"))
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "FORBIDDEN");
        assert!(app.repo.calls().await.is_empty());
        assert!(app.repo.file("main", "README.md").await.is_some());
    }

    #[tokio::test]
    async fn encoded_traversal_is_forbidden() {
        let app = TestApp::spawn().await;
        app.repo.seed_file("main", "README.md", b"# assets").await;
        let token = app.token("alice");

        // `%25` survives the query decode, so the handler sees `%2e%2e`.
        for path in ["models/%252e%252e/README.md", "models/a.glb%3Fref%3Dx", "models/a%20b.glb"] {
            let res = app
                .delete_with_token(&routes::delete(path, false), &token)
                .await;
            assert_eq!(res.status, 403, "{path}: {}", res.text);
            assert_eq!(res.code(), "FORBIDDEN");
        }
        assert!(app.repo.calls().await.is_empty());
        assert!(app.repo.file("main", "README.md").await.is_some());
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .delete_with_token(
                &routes::delete("models/kia/carnival/1-none.glb", false),
                &app.token("alice"),
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn direct_delete_removes_file() {
        let app = TestApp::spawn().await;
        let path = "models/kia/carnival/1600000000-a.glb";
        app.repo.seed_file("main", path, GLB).await;

        let res = app
            .delete_with_token(&routes::delete(path, false), &app.token("alice"))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["deleted"], path);
        assert!(res.body.get("pull_request_url").is_none());
        assert!(app.repo.file("main", path).await.is_none());
    }

    #[tokio::test]
    async fn review_delete_opens_pull_request() {
        let app = TestApp::spawn().await;
        let path = "images/kia/carnival/1600000000-a.png";
        app.repo.seed_file("main", path, b"png").await;

        let res = app
            .delete_with_token(&routes::delete(path, true), &app.token("alice"))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["deleted"], path);
        assert!(res.body["pull_request_url"].as_str().is_some());
        assert!(app.repo.file("main", path).await.is_some());
    }
}
