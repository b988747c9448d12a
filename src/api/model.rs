use serde::Deserialize;

use crate::content::MediaRef;

/// Body of a successful `media/upload` call.
#[derive(Deserialize, Debug)]
pub struct UploadResp {
    #[serde(default)]
    pub id: Option<MediaRef>,
    #[serde(rename = "urlAcces", default)]
    pub access_url: Option<String>,
    #[serde(rename = "nomOriginal", default)]
    pub original_name: Option<String>,
    #[serde(rename = "typeMime", default)]
    pub mime_type: Option<String>,
    #[serde(rename = "hashSha256", default)]
    pub content_hash: Option<String>,
}
