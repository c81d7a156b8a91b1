use std::net::SocketAddr;
use std::sync::Arc;

use cloudbridge_config::{DropboxSettings, Settings};
use cloudbridge_services::{DropboxProvider, OAuthTokens};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::fake_dropbox::{self, API_PREFIX, CONTENT_PREFIX, FakeState, SharedState};

pub const TEST_TOKEN: &str = "test-access-token";
pub const TEST_APP_KEY: &str = "test-app-key";

/// A running fake Dropbox server plus an adapter pointed at it.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub state: SharedState,
    pub settings: Settings,
    pub provider: DropboxProvider,
}

impl TestApp {
    /// Spawn a fake Dropbox v1 server on a random local port.
    ///
    /// The server starts with an empty root folder and accepts `TEST_TOKEN`.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn with customized adapter settings.
    ///
    /// The `mutator` closure receives the Dropbox settings after the hosts have
    /// been pointed at the fake server.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut DropboxSettings)) -> Self {
        init_tracing();

        let state: SharedState = Arc::new(Mutex::new(FakeState::new(TEST_TOKEN, TEST_APP_KEY)));
        let app = fake_dropbox::router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let mut dropbox = DropboxSettings {
            api_base: format!("{}{}", base_url, API_PREFIX),
            content_base: format!("{}{}", base_url, CONTENT_PREFIX),
            app_key: TEST_APP_KEY.to_string(),
            ..DropboxSettings::default()
        };
        mutator(&mut dropbox);

        let settings = Settings { dropbox };
        let provider = DropboxProvider::new(
            settings.dropbox.clone(),
            OAuthTokens::bearer(TEST_TOKEN),
        );

        Self {
            addr,
            base_url,
            state,
            settings,
            provider,
        }
    }

    /// A second adapter against the same server, holding another token.
    pub fn provider_with_token(&self, token: &str) -> DropboxProvider {
        DropboxProvider::new(self.settings.dropbox.clone(), OAuthTokens::bearer(token))
    }

    /// Requests received so far whose `"{METHOD} {path}"` starts with `prefix`.
    pub fn requests_matching(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn searches(&self) -> Vec<String> {
        self.state.lock().searches.clone()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudbridge_services=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
