use std::net::SocketAddr;
use std::sync::Arc;

use ::common::AssetService;
use ::common::config::{PolicyConfig, RepoTarget, RepositoryConfig, UploadConfig};
use ::common::service::FixedClock;
use ::common::storage::InMemoryRepository;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use server::config::{AppConfig, AuthConfig, CorsConfig, ServerConfig};
use server::state::AppState;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";

/// Every upload in these tests happens at this unix second.
pub const NOW: i64 = 1_700_000_000;

pub mod routes {
    pub const HEALTH: &str = "/api/v1/health";
    pub const ME: &str = "/api/v1/auth/me";
    pub const ASSETS: &str = "/api/v1/assets";

    pub fn list(category: &str, prefix: Option<&str>) -> String {
        match prefix {
            Some(prefix) => format!("/api/v1/assets?category={category}&prefix={prefix}"),
            None => format!("/api/v1/assets?category={category}"),
        }
    }

    pub fn delete(path: &str, review: bool) -> String {
        format!("/api/v1/assets?path={path}&review={review}")
    }
}

/// A running test server backed by an in-memory repository.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub repo: Arc<InMemoryRepository>,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

fn app_config(github: RepositoryConfig, policy: PolicyConfig, upload: UploadConfig) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors: CorsConfig::default(),
        },
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
        },
        github,
        policy,
        upload,
    }
}

fn target() -> RepoTarget {
    RepoTarget {
        owner: "acme".into(),
        name: "auto3d-assets".into(),
        branch: "main".into(),
        cdn_host: "cdn.jsdelivr.net".into(),
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(PolicyConfig::default(), UploadConfig::default()).await
    }

    pub async fn spawn_with(policy: PolicyConfig, upload: UploadConfig) -> Self {
        Self::spawn_with_repo(InMemoryRepository::new("main"), policy, upload).await
    }

    pub async fn spawn_with_repo(
        repo: InMemoryRepository,
        policy: PolicyConfig,
        upload: UploadConfig,
    ) -> Self {
        let repo = Arc::new(repo);
        let service = AssetService::with_client(target(), repo.clone(), &policy, &upload)
            .with_clock(Arc::new(FixedClock(NOW)));
        let config = app_config(RepositoryConfig::default(), policy, upload);

        let state = AppState {
            config: Arc::new(config),
            service: Arc::new(service),
        };
        Self::serve(state, repo).await
    }

    /// A server started without repository credentials.
    pub async fn spawn_unconfigured() -> Self {
        let config = app_config(
            RepositoryConfig::default(),
            PolicyConfig::default(),
            UploadConfig::default(),
        );
        let state = AppState::from_config(config);
        Self::serve(state, Arc::new(InMemoryRepository::new("main"))).await
    }

    async fn serve(state: AppState, repo: Arc<InMemoryRepository>) -> Self {
        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            repo,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// A session token for `login`, as the sign-in flow would issue it.
    pub fn token(&self, login: &str) -> String {
        server::utils::jwt::sign(login, JWT_SECRET, chrono::Duration::hours(1))
            .expect("Failed to sign test token")
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn upload_with_token(&self, form: Form, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(routes::ASSETS))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    pub async fn upload_without_token(&self, form: Form) -> TestResponse {
        let res = self
            .client
            .post(self.url(routes::ASSETS))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }
}

/// Multipart form for one upload classified as `brand`/`product`.
pub fn asset_form(
    category: &str,
    brand: &str,
    product: &str,
    file_name: &str,
    file_bytes: Vec<u8>,
) -> Form {
    let part = Part::bytes(file_bytes)
        .file_name(file_name.to_string())
        .mime_str("application/octet-stream")
        .expect("Failed to set MIME type");
    Form::new()
        .text("category", category.to_string())
        .text("brand", brand.to_string())
        .text("product", product.to_string())
        .part("file", part)
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn code(&self) -> &str {
        self.body["code"]
            .as_str()
            .expect("response body should contain 'code'")
    }
}
