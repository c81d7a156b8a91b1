use cloudbridge_services::{CloudError, CloudStorageProvider, OAuthTokens};

use crate::fixtures::test_app::{TEST_TOKEN, TestApp};

#[tokio::test]
async fn space_quota_sums_normal_and_shared() {
    let app = TestApp::spawn().await;
    app.set_quota(100, 50, 1000);

    assert_eq!(app.provider.space_quota().await.unwrap(), "150 of 1000");
}

#[tokio::test]
async fn space_quota_uses_human_units() {
    let app = TestApp::spawn().await;
    app.set_quota(1024 * 1024 * 1024, 512 * 1024 * 1024, 2 * 1024 * 1024 * 1024);

    assert_eq!(app.provider.space_quota().await.unwrap(), "1.5 GB of 2.0 GB");
}

#[tokio::test]
async fn space_quota_rejects_overflowing_usage() {
    let app = TestApp::spawn().await;
    app.set_quota(u64::MAX, 1, 10);

    let err = app.provider.space_quota().await.unwrap_err();
    assert!(matches!(err, CloudError::Parse(_)));
}

#[tokio::test]
async fn user_is_fetched_once_and_cached() {
    let app = TestApp::spawn().await;

    let first = app.provider.user().await.unwrap();
    app.state.lock().display_name = "Renamed".to_string();
    let second = app.provider.user().await.unwrap();

    assert_eq!(first.name, "Test User");
    assert_eq!(second, first);
    assert_eq!(app.requests_matching("GET /1/account/info").len(), 1);
}

#[tokio::test]
async fn validate_credential_reports_without_failing() {
    let app = TestApp::spawn().await;

    assert!(app.provider.validate_credential().await);
    assert!(!app.provider_with_token("revoked").validate_credential().await);
}

#[tokio::test]
async fn logout_clears_credential_and_cached_user() {
    let app = TestApp::spawn().await;
    app.provider.user().await.unwrap();

    let url = app.provider.logout();
    assert_eq!(url, "https://www.dropbox.com/logout");

    assert!(!app.provider.validate_credential().await);
    assert!(matches!(
        app.provider.user().await.unwrap_err(),
        CloudError::Unauthorized
    ));
    // No request leaves the adapter once the token is gone.
    assert_eq!(app.requests_matching("GET /1/account/info").len(), 1);

    app.provider.set_tokens(OAuthTokens::bearer(TEST_TOKEN));
    app.state.lock().display_name = "Signed In Again".to_string();
    assert_eq!(app.provider.user().await.unwrap().name, "Signed In Again");
}

#[tokio::test]
async fn logout_url_is_configurable() {
    let app = TestApp::spawn_with_settings(|settings| {
        settings.logout_url = "https://example.test/bye".to_string()
    })
    .await;

    assert_eq!(app.provider.logout(), "https://example.test/bye");
}

#[tokio::test]
async fn share_links_round_trip_through_provider() {
    let app = TestApp::spawn().await;
    app.add_file("/Team Docs/Q3 plan.docx", b"plan");
    let item = app.provider.file_metadata("/Team Docs/Q3 plan.docx").await.unwrap();

    let param = app.provider.share_param(&item);
    assert_eq!(param, "Dropbox://Team%20Docs%2FQ3%20plan.docx");

    assert_eq!(app.provider.id_from_share_param(&param).unwrap(), item.id);

    let shared = app.provider.item_from_share_param(&param).unwrap();
    assert_eq!(shared.id, item.id);
    assert_eq!(shared.provider, item.provider);

    // The decoded id is directly usable for a download.
    let content = app.provider.fetch_content(&shared.id).await.unwrap();
    assert_eq!(content, b"plan");
}

#[tokio::test]
async fn share_param_prefix_follows_provider_name() {
    let app = TestApp::spawn_with_settings(|settings| {
        settings.provider_name = "DropboxBusiness".to_string()
    })
    .await;
    app.add_file("/a.txt", b"a");

    let item = app.provider.file_metadata("/a.txt").await.unwrap();
    assert_eq!(item.provider, "DropboxBusiness");
    assert_eq!(app.provider.share_param(&item), "DropboxBusiness://a.txt");
    assert!(app.provider.id_from_share_param("Dropbox://a.txt").is_err());
}
