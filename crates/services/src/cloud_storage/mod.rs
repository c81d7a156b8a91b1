pub mod dropbox;
pub mod error;
pub mod quota;
pub mod share_link;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use dropbox::DropboxProvider;
pub use error::{CloudError, CloudResult};

/// Name given to the root entry of a directory tree listing.
pub const ROOT_FOLDER_NAME: &str = "All Folders";

pub const FOLDER_EXISTS_MESSAGE: &str =
    "Could not create folder, there is already a sibling folder with the same name!";
pub const INVALID_FOLDER_NAME_MESSAGE: &str =
    "Could not create folder, the chosen name could be invalid.";

/// A file or folder entry as reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudItem {
    /// Provider path of the item; doubles as its id.
    pub id: String,
    /// Revision identifier, unique per stored version.
    pub unique_id: String,
    pub name: String,
    pub is_folder: bool,
    pub provider: String,
    pub file_version: String,
    pub modified: Option<DateTime<Utc>>,
    pub size: u64,
    pub mime_type: Option<String>,
}

/// One entry of a flattened directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudFolder {
    pub id: String,
    pub name: String,
    pub outline_level: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub name: String,
}

/// Outcome envelope for operations whose failures are shown to users as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePackage {
    pub error: bool,
    pub error_message: Option<String>,
}

impl ResponsePackage {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: true,
            error_message: Some(message.into()),
        }
    }
}

/// Downloaded content together with the metadata of the path it came from.
#[derive(Debug, Clone)]
pub struct CloudFileData {
    pub content: Vec<u8>,
    pub item: CloudItem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

impl OAuthTokens {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }
}

/// Last segment of a provider path; the path itself when it has no separator.
pub fn path_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Common trait for cloud storage providers.
#[async_trait]
pub trait CloudStorageProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    fn root_folder_id(&self) -> &str {
        "/"
    }

    /// Cheap authenticated round trip; never fails, only reports.
    async fn validate_credential(&self) -> bool;

    /// Forgets the credential and cached profile, returning the web logout URL.
    fn logout(&self) -> String;

    /// Every folder reachable from the root, pre-order, with its depth.
    async fn build_directory_tree(&self) -> CloudResult<Vec<CloudFolder>>;

    /// Children of a folder, folders first, each group in provider order.
    async fn list_children(&self, folder_id: &str) -> CloudResult<Vec<CloudItem>>;

    async fn fetch_content(&self, file_id: &str) -> CloudResult<Vec<u8>>;

    async fn fetch_document(&self, item: &CloudItem) -> CloudResult<CloudFileData>;

    async fn put_content(
        &self,
        content: Vec<u8>,
        file_name: &str,
        content_type: Option<&str>,
        folder_id: Option<&str>,
    ) -> CloudResult<CloudItem>;

    async fn file_size(&self, file_id: &str) -> CloudResult<u64>;

    async fn file_metadata(&self, file_id: &str) -> CloudResult<CloudItem>;

    async fn delete_item(&self, item_id: &str) -> CloudResult<()>;

    async fn delete_folder(&self, folder_id: &str) -> bool {
        match self.delete_item(folder_id).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    provider = self.provider_name(),
                    folder_id,
                    error = %err,
                    "Folder not deleted"
                );
                false
            }
        }
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> ResponsePackage;

    async fn user(&self) -> CloudResult<UserData>;

    async fn space_quota(&self) -> CloudResult<String>;

    fn share_param(&self, item: &CloudItem) -> String {
        share_link::encode(self.provider_name(), &item.id)
    }

    fn id_from_share_param(&self, param: &str) -> CloudResult<String> {
        share_link::decode_id(self.provider_name(), param)
    }

    fn item_from_share_param(&self, param: &str) -> CloudResult<CloudItem> {
        share_link::decode_item(param)
    }
}
