//! Content-addressed uploads
//!
//! Pushes a file or a whole directory to an IPFS HTTP API and pins the
//! result before returning its CID. Failures are returned as-is; nothing
//! is retried.

use std::path::Path;

use serde::Deserialize;

use crate::config::IpfsConfig;
use crate::error::{GenError, Result};

/// Uploads a path and returns its content identifier
pub trait Uploader {
    fn upload(&self, path: &Path) -> Result<String>;
}

/// One line of the `/api/v0/add` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hash")]
    pub hash: String,
}

/// Parse the newline-delimited add response and pick the CID of `root`.
///
/// Falls back to the last entry, which the API emits for the top-level item.
pub fn root_cid(body: &str, root: &str) -> Result<String> {
    let entries = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<AddEntry>(line))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| GenError::Upload {
            reason: format!("invalid add response: {}", e),
        })?;

    entries
        .iter()
        .find(|entry| entry.name == root)
        .or_else(|| entries.last())
        .map(|entry| entry.hash.clone())
        .ok_or_else(|| GenError::Upload {
            reason: "empty add response".to_string(),
        })
}

/// IPFS HTTP API client
pub struct IpfsUploader {
    endpoint: String,
    credentials: Option<(String, String)>,
    #[cfg(feature = "ipfs")]
    client: reqwest::blocking::Client,
}

impl IpfsUploader {
    pub fn new(config: &IpfsConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(GenError::InvalidConfig {
                reason: "ipfs endpoint is empty".to_string(),
            });
        }

        let credentials = if !config.project_id.is_empty() && !config.project_secret.is_empty() {
            Some((config.project_id.clone(), config.project_secret.clone()))
        } else {
            None
        };

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            credentials,
            #[cfg(feature = "ipfs")]
            client: reqwest::blocking::Client::builder()
                .build()
                .map_err(|e| GenError::UploadUnavailable {
                    reason: e.to_string(),
                })?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

#[cfg(feature = "ipfs")]
impl IpfsUploader {
    fn post(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        let request = self.client.post(url);
        match &self.credentials {
            Some((id, secret)) => request.basic_auth(id, Some(secret)),
            None => request,
        }
    }

    fn add(&self, form: reqwest::blocking::multipart::Form, root: &str) -> Result<String> {
        let url = format!("{}/api/v0/add", self.endpoint);
        let response = self
            .post(&url)
            .query(&[("pin", "false")])
            .multipart(form)
            .send()
            .map_err(|e| GenError::Upload {
                reason: format!("cannot reach {}: {}", self.endpoint, e),
            })?;

        if !response.status().is_success() {
            return Err(GenError::Upload {
                reason: format!("add returned {}", response.status()),
            });
        }

        let body = response.text().map_err(|e| GenError::Upload {
            reason: format!("cannot read add response: {}", e),
        })?;
        root_cid(&body, root)
    }

    fn pin(&self, cid: &str) -> Result<()> {
        let url = format!("{}/api/v0/pin/add", self.endpoint);
        let response = self
            .post(&url)
            .query(&[("arg", cid)])
            .send()
            .map_err(|e| GenError::Upload {
                reason: format!("cannot pin {}: {}", cid, e),
            })?;

        if !response.status().is_success() {
            return Err(GenError::Upload {
                reason: format!("pin of {} returned {}", cid, response.status()),
            });
        }
        Ok(())
    }
}

#[cfg(feature = "ipfs")]
impl Uploader for IpfsUploader {
    fn upload(&self, path: &Path) -> Result<String> {
        use reqwest::blocking::multipart::{Form, Part};
        use walkdir::WalkDir;

        let metadata = std::fs::metadata(path)?;
        let root = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut form = Form::new();
        if metadata.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|e| GenError::Upload {
                    reason: format!("cannot walk {}: {}", path.display(), e),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(path)
                    .map_err(|e| GenError::Internal(e.to_string()))?;
                let name = Path::new(&root).join(relative).to_string_lossy().to_string();
                form = form.part("file", Part::file(entry.path())?.file_name(name));
            }
        } else {
            form = form.part("file", Part::file(path)?.file_name(root.clone()));
        }

        let cid = self.add(form, &root)?;
        self.pin(&cid)?;
        log::info!("Uploaded {} as {}", path.display(), cid);
        Ok(cid)
    }
}

#[cfg(not(feature = "ipfs"))]
impl Uploader for IpfsUploader {
    fn upload(&self, _path: &Path) -> Result<String> {
        Err(GenError::UploadUnavailable {
            reason: "IPFS support not compiled. Build with --features ipfs".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> IpfsConfig {
        IpfsConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_root_cid_directory() {
        let body = concat!(
            "{\"Name\":\"images/0.png\",\"Hash\":\"QmA\",\"Size\":\"10\"}\n",
            "{\"Name\":\"images/1.png\",\"Hash\":\"QmB\",\"Size\":\"10\"}\n",
            "{\"Name\":\"images\",\"Hash\":\"QmRoot\",\"Size\":\"30\"}\n",
        );
        assert_eq!(root_cid(body, "images").unwrap(), "QmRoot");
    }

    #[test]
    fn test_root_cid_falls_back_to_last() {
        let body = "{\"Name\":\"QmFile\",\"Hash\":\"QmFile\"}\n";
        assert_eq!(root_cid(body, "rarities.json").unwrap(), "QmFile");
    }

    #[test]
    fn test_root_cid_errors() {
        assert!(root_cid("", "x").is_err());
        assert!(root_cid("not json", "x").is_err());
    }

    #[test]
    fn test_uploader_config() {
        assert!(IpfsUploader::new(&config("")).is_err());

        let uploader = IpfsUploader::new(&config("http://localhost:5001/")).unwrap();
        assert_eq!(uploader.endpoint(), "http://localhost:5001");
        assert!(!uploader.has_credentials());

        let with_auth = IpfsUploader::new(&IpfsConfig {
            endpoint: "https://ipfs.infura.io:5001".to_string(),
            project_id: "id".to_string(),
            project_secret: "secret".to_string(),
        })
        .unwrap();
        assert!(with_auth.has_credentials());
    }

    #[test]
    fn test_upload_missing_path_fails() {
        let uploader = IpfsUploader::new(&config("http://127.0.0.1:9")).unwrap();
        assert!(uploader.upload(Path::new("/nonexistent/output")).is_err());
    }
}
