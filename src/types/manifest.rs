use serde::{Deserialize, Serialize};

/// Describes where persisted quotes live and how a tabular import tool should read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub file_locations: Vec<FileLocation>,
    pub global_upload_settings: UploadSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLocation {
    #[serde(rename = "URIPrefixes")]
    pub uri_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    pub format: String,
    pub delimiter: String,
    /// The import tool expects the string form, not a JSON boolean.
    pub contains_header: String,
}

impl Manifest {
    /// Manifest pointing at `<store_uri>/<prefix>/`.
    pub fn for_prefix(store_uri: &str, prefix: &str) -> Self {
        let store_uri = store_uri.trim_end_matches('/');
        let prefix = prefix.trim_matches('/');

        Self {
            file_locations: vec![FileLocation {
                uri_prefixes: vec![format!("{store_uri}/{prefix}/")],
            }],
            global_upload_settings: UploadSettings {
                format: "JSON".to_string(),
                delimiter: ",".to_string(),
                contains_header: "true".to_string(),
            },
        }
    }
}
