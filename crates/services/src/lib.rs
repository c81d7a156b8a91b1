pub mod cloud_storage;

pub use cloud_storage::{
    CloudError, CloudFileData, CloudFolder, CloudItem, CloudResult, CloudStorageProvider,
    DropboxProvider, OAuthTokens, ResponsePackage, UserData,
};
