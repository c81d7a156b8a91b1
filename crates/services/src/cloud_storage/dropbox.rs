use std::collections::HashSet;
use std::io::{Read, Seek};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudbridge_config::DropboxSettings;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::quota::quota_summary;
use super::{
    CloudError, CloudFileData, CloudFolder, CloudItem, CloudResult, CloudStorageProvider,
    FOLDER_EXISTS_MESSAGE, INVALID_FOLDER_NAME_MESSAGE, OAuthTokens, ROOT_FOLDER_NAME,
    ResponsePackage, UserData, path_name,
};

/// Metadata object returned by the v1 `metadata`, `files_put`, `search` and
/// `revisions` endpoints.
#[derive(Debug, Deserialize)]
struct DropboxMetadata {
    path: String,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    is_dir: bool,
    #[serde(default)]
    modified: Option<String>,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    contents: Vec<DropboxMetadata>,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    display_name: String,
    #[serde(default)]
    quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Deserialize)]
struct QuotaInfo {
    #[serde(default)]
    normal: u64,
    #[serde(default)]
    shared: u64,
    #[serde(default)]
    quota: u64,
}

/// Adapter over Dropbox's v1 HTTP API.
///
/// Besides the credential, an instance keeps two pieces of per-session state:
/// the cached account profile and the resolved id of the last document fetch.
/// Both live behind locks so the adapter can sit in an `Arc<dyn
/// CloudStorageProvider>`, but the resolved id is last-writer-wins: drive one
/// adapter from one logical caller at a time.
pub struct DropboxProvider {
    client: Client,
    settings: DropboxSettings,
    tokens: RwLock<Option<OAuthTokens>>,
    user: RwLock<Option<UserData>>,
    resolved_id: RwLock<Option<String>>,
}

impl DropboxProvider {
    pub fn new(settings: DropboxSettings, tokens: OAuthTokens) -> Self {
        Self {
            client: Client::new(),
            settings,
            tokens: RwLock::new(Some(tokens)),
            user: RwLock::new(None),
            resolved_id: RwLock::new(None),
        }
    }

    /// Installs a fresh credential, e.g. after a logout and a new sign-in.
    pub fn set_tokens(&self, tokens: OAuthTokens) {
        *self.tokens.write() = Some(tokens);
    }

    /// Path actually used by the last document fetch; differs from the
    /// requested id when the download needed the search fallback.
    pub fn resolved_id(&self) -> Option<String> {
        self.resolved_id.read().clone()
    }

    /// Uploads everything in `reader`, starting from its first byte regardless
    /// of the current position.
    pub async fn put_reader<R: Read + Seek + Send>(
        &self,
        mut reader: R,
        file_name: &str,
        content_type: Option<&str>,
        folder_id: Option<&str>,
    ) -> CloudResult<CloudItem> {
        reader.rewind()?;
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        self.put_content(content, file_name, content_type, folder_id).await
    }

    /// Revision codes of a file, newest first.
    pub async fn file_revisions(&self, path: &str) -> CloudResult<Vec<String>> {
        let url = format!("{}/revisions/dropbox{}", self.settings.api_base, encode_path(path));
        let revisions: Vec<DropboxMetadata> = self.get_json(&url, path).await?;
        Ok(revisions.into_iter().filter_map(|r| r.rev).collect())
    }

    fn access_token(&self) -> CloudResult<String> {
        self.tokens
            .read()
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(CloudError::Unauthorized)
    }

    fn account_url(&self) -> String {
        format!("{}/account/info", self.settings.api_base)
    }

    fn metadata_url(&self, path: &str) -> String {
        format!("{}/metadata/dropbox{}", self.settings.api_base, encode_path(path))
    }

    fn file_url(&self, path: &str) -> String {
        format!("{}/files/dropbox{}", self.settings.content_base, encode_path(path))
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> CloudResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, path, "Dropbox request failed");
        Err(CloudError::from_status(status, path, &body))
    }

    async fn authorized_get(&self, url: &str, path: &str) -> CloudResult<Response> {
        let token = self.access_token()?;
        debug!(url, "GET");
        self.send(self.client.get(url).bearer_auth(token), path).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, path: &str) -> CloudResult<T> {
        let body = self.authorized_get(url, path).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_fileop(&self, operation: &str, path: &str) -> CloudResult<Response> {
        let token = self.access_token()?;
        let url = format!("{}/fileops/{}", self.settings.api_base, operation);
        debug!(operation, path, "POST fileop");
        let request = self
            .client
            .post(&url)
            .bearer_auth(token)
            .form(&[("root", "auto"), ("path", path)]);
        self.send(request, path).await
    }

    async fn metadata(&self, path: &str) -> CloudResult<DropboxMetadata> {
        self.get_json(&self.metadata_url(path), path).await
    }

    async fn folder_listing(&self, folder_id: &str) -> CloudResult<DropboxMetadata> {
        let listing = self.metadata(folder_id).await?;
        if !listing.is_dir {
            return Err(CloudError::Parse(format!("{} is not a folder", folder_id)));
        }
        Ok(listing)
    }

    async fn download(&self, path: &str) -> CloudResult<Vec<u8>> {
        let response = self.authorized_get(&self.file_url(path), path).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Looks for `file_name` under `scope` (a folder path without its leading
    /// slash). The first hit wins; several hits cannot be told apart.
    async fn search(&self, scope: &str, file_name: &str) -> CloudResult<Option<CloudItem>> {
        let token = self.access_token()?;
        let url = format!("{}/search/dropbox/{}", self.settings.api_base, encode_segments(scope));
        debug!(scope, file_name, "Searching for moved file");
        let request = self
            .client
            .get(&url)
            .query(&[
                ("query", file_name),
                ("access_token", token.as_str()),
                ("oauth_consumer_key", self.settings.app_key.as_str()),
            ])
            .header(header::ACCEPT, "*/*")
            .header(header::USER_AGENT, &self.settings.search_user_agent);
        let body = self.send(request, scope).await?.bytes().await?;
        let hits: Vec<DropboxMetadata> = serde_json::from_slice(&body)?;
        Ok(hits
            .into_iter()
            .next()
            .map(|hit| self.to_cloud_item(hit)))
    }

    fn to_cloud_item(&self, metadata: DropboxMetadata) -> CloudItem {
        let rev = metadata.rev.unwrap_or_default();
        CloudItem {
            name: path_name(&metadata.path).to_string(),
            id: metadata.path,
            unique_id: rev.clone(),
            is_folder: metadata.is_dir,
            provider: self.settings.provider_name.clone(),
            file_version: rev,
            modified: metadata.modified.as_deref().and_then(parse_modified),
            size: metadata.bytes.unwrap_or(0),
            mime_type: metadata.mime_type,
        }
    }
}

#[async_trait]
impl CloudStorageProvider for DropboxProvider {
    fn provider_name(&self) -> &str {
        &self.settings.provider_name
    }

    async fn validate_credential(&self) -> bool {
        match self.authorized_get(&self.account_url(), "/").await {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "Dropbox credential rejected");
                false
            }
        }
    }

    fn logout(&self) -> String {
        *self.tokens.write() = None;
        *self.user.write() = None;
        self.settings.logout_url.clone()
    }

    async fn build_directory_tree(&self) -> CloudResult<Vec<CloudFolder>> {
        let mut tree = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![CloudFolder {
            id: self.root_folder_id().to_string(),
            name: ROOT_FOLDER_NAME.to_string(),
            outline_level: 0,
        }];

        while let Some(folder) = pending.pop() {
            // Dropbox paths are case-insensitive.
            if !visited.insert(folder.id.to_lowercase()) {
                warn!(folder_id = %folder.id, "Folder listed twice, skipping");
                continue;
            }
            let listing = self.folder_listing(&folder.id).await?;
            let child_level = folder.outline_level + 1;
            tree.push(folder);

            // Reversed so the first subfolder is popped next.
            let subfolders: Vec<CloudFolder> = listing
                .contents
                .into_iter()
                .filter(|entry| entry.is_dir)
                .map(|entry| CloudFolder {
                    name: path_name(&entry.path).to_string(),
                    id: entry.path,
                    outline_level: child_level,
                })
                .collect();
            pending.extend(subfolders.into_iter().rev());
        }

        Ok(tree)
    }

    async fn list_children(&self, folder_id: &str) -> CloudResult<Vec<CloudItem>> {
        let listing = self.folder_listing(folder_id).await?;
        let mut items = Vec::with_capacity(listing.contents.len());
        let mut folders = 0;
        for entry in listing.contents {
            let item = self.to_cloud_item(entry);
            if item.is_folder {
                items.insert(folders, item);
                folders += 1;
            } else {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn fetch_content(&self, file_id: &str) -> CloudResult<Vec<u8>> {
        let not_found = match self.download(file_id).await {
            Ok(content) => return Ok(content),
            Err(err) if err.is_not_found() => err,
            Err(err) => return Err(err),
        };

        // A 404 can mean the file sits at a shorter path for this account, e.g.
        // inside a shared folder mounted at a different depth.
        let file_name = path_name(file_id);
        for scope in search_scopes(file_id) {
            match self.search(&scope, file_name).await {
                Ok(Some(hit)) => {
                    info!(requested = file_id, resolved = %hit.id, "Resolved moved file");
                    *self.resolved_id.write() = Some(hit.id.clone());
                    return self.download(&hit.id).await;
                }
                Ok(None) => debug!(scope = %scope, file_name, "No match"),
                Err(err) => warn!(scope = %scope, file_name, error = %err, "Search attempt failed"),
            }
        }

        Err(not_found)
    }

    async fn fetch_document(&self, item: &CloudItem) -> CloudResult<CloudFileData> {
        *self.resolved_id.write() = Some(item.id.clone());
        let content = self.fetch_content(&item.id).await?;
        let resolved = self.resolved_id().unwrap_or_else(|| item.id.clone());
        let item = self.file_metadata(&resolved).await?;
        Ok(CloudFileData { content, item })
    }

    async fn put_content(
        &self,
        content: Vec<u8>,
        file_name: &str,
        content_type: Option<&str>,
        folder_id: Option<&str>,
    ) -> CloudResult<CloudItem> {
        let token = self.access_token()?;
        let folder = match folder_id {
            None => self.root_folder_id().to_string(),
            Some(folder) if folder.ends_with('/') => folder.to_string(),
            Some(folder) => format!("{}/", folder),
        };
        let path = format!("{}{}", folder, file_name);
        let url = format!(
            "{}/files_put/dropbox{}",
            self.settings.content_base,
            encode_path(&path)
        );
        debug!(path = %path, bytes = content.len(), "PUT file");

        let mut request = self.client.put(&url).bearer_auth(token).body(content);
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        let body = self.send(request, &path).await?.bytes().await?;
        let metadata: DropboxMetadata = serde_json::from_slice(&body)?;
        Ok(self.to_cloud_item(metadata))
    }

    async fn file_size(&self, file_id: &str) -> CloudResult<u64> {
        Ok(self.metadata(file_id).await?.bytes.unwrap_or(0))
    }

    async fn file_metadata(&self, file_id: &str) -> CloudResult<CloudItem> {
        let metadata = self.metadata(file_id).await?;
        Ok(self.to_cloud_item(metadata))
    }

    async fn delete_item(&self, item_id: &str) -> CloudResult<()> {
        self.post_fileop("delete", item_id).await?;
        Ok(())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> ResponsePackage {
        let path = format!("{}/{}", parent_id.trim_end_matches('/'), name);
        match self.post_fileop("create_folder", &path).await {
            Ok(_) => ResponsePackage::ok(),
            Err(CloudError::Forbidden(reason)) => {
                debug!(path = %path, reason = %reason, "Folder already exists");
                ResponsePackage::error(FOLDER_EXISTS_MESSAGE)
            }
            Err(err) => {
                warn!(path = %path, error = %err, "Folder not created");
                ResponsePackage::error(INVALID_FOLDER_NAME_MESSAGE)
            }
        }
    }

    async fn user(&self) -> CloudResult<UserData> {
        let cached = self.user.read().clone();
        if let Some(user) = cached {
            return Ok(user);
        }
        let info: AccountInfo = self.get_json(&self.account_url(), "/").await?;
        let user = UserData {
            name: info.display_name,
        };
        *self.user.write() = Some(user.clone());
        Ok(user)
    }

    async fn space_quota(&self) -> CloudResult<String> {
        let info: AccountInfo = self.get_json(&self.account_url(), "/").await?;
        let quota = info
            .quota_info
            .ok_or_else(|| CloudError::Parse("Account info has no quota_info".to_string()))?;
        let used = quota
            .normal
            .checked_add(quota.shared)
            .ok_or_else(|| CloudError::Parse("Quota usage overflows".to_string()))?;
        Ok(quota_summary(used, quota.quota))
    }
}

/// Folder scopes tried, in order, when a download 404s: the containing folder
/// loses one leading segment per attempt until nothing is left.
///
/// `/a/b/c/report.txt` yields `b/c/`, `c/` and finally the empty (root) scope.
fn search_scopes(file_id: &str) -> Vec<String> {
    let folder = match file_id.rfind('/') {
        Some(idx) => &file_id[..=idx],
        None => return Vec::new(),
    };
    let mut scope = folder.strip_prefix('/').unwrap_or(folder);
    let mut scopes = Vec::new();
    while let Some(idx) = scope.find('/') {
        scope = &scope[idx + 1..];
        scopes.push(scope.to_string());
    }
    scopes
}

/// Percent-encodes each segment of an absolute path, keeping the separators.
fn encode_path(path: &str) -> String {
    if path.starts_with('/') {
        encode_segments(path)
    } else {
        format!("/{}", encode_segments(path))
    }
}

fn encode_segments(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// v1 timestamps look like `Sat, 21 Aug 2010 22:31:20 +0000`.
fn parse_modified(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
