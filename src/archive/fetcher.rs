//! Snapshot retrieval and decompression.
//!
//! Downloads archive files over HTTP with an optional on-disk cache, so a
//! rerun for the same date does not hit the mirror again and `--offline`
//! runs can work entirely from cache. Compression is keyed on the file name
//! suffix, matching what the archive actually serves.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::settings::Settings;

/// Errors raised while retrieving a snapshot. A plain 404 is not an error;
/// it is the [`FetchOutcome::Absent`] signal the nearest-date search relies
/// on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("decompressing {name} failed: {source}")]
    Decompress {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {path} could not be accessed: {source}")]
    Cache {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of probing one candidate URL.
#[derive(Debug)]
pub enum FetchOutcome {
    Found(Vec<u8>),
    /// The mirror answered 404 (or offline mode had no cached copy).
    Absent,
}

/// Blocking snapshot fetcher with optional cache directory.
pub struct Fetcher {
    client: reqwest::blocking::Client,
    cache_dir: Option<PathBuf>,
    offline: bool,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Fetcher, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Fetcher {
            client,
            cache_dir: settings.cache_dir.clone(),
            offline: settings.offline,
        })
    }

    #[cfg(test)]
    pub(crate) fn offline_with_cache(cache_dir: PathBuf) -> Fetcher {
        Fetcher {
            client: reqwest::blocking::Client::new(),
            cache_dir: Some(cache_dir),
            offline: true,
        }
    }

    /// Retrieve the raw (still compressed) file behind `url`, consulting the
    /// cache first.
    pub fn get(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let cache_path = self.cache_path(url);

        if let Some(path) = &cache_path {
            if path.exists() {
                debug!("cache hit for {url}");
                let bytes = fs::read(path).map_err(|source| FetchError::Cache {
                    path: path.display().to_string(),
                    source,
                })?;
                return Ok(FetchOutcome::Found(bytes));
            }
        }

        if self.offline {
            debug!("offline: treating uncached {url} as absent");
            return Ok(FetchOutcome::Absent);
        }

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        match response.status().as_u16() {
            404 => Ok(FetchOutcome::Absent),
            200 => {
                let bytes = response
                    .bytes()
                    .map_err(|source| FetchError::Http {
                        url: url.to_string(),
                        source,
                    })?
                    .to_vec();
                info!("fetched {} ({} bytes)", url, bytes.len());
                if let Some(path) = &cache_path {
                    self.store_in_cache(path, &bytes)?;
                }
                Ok(FetchOutcome::Found(bytes))
            }
            status => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let name = url.rsplit('/').next()?;
        Some(dir.join(name))
    }

    fn store_in_cache(&self, path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| FetchError::Cache {
                path: parent.display().to_string(),
                source,
            })?;
        }
        fs::write(path, bytes).map_err(|source| FetchError::Cache {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Decompress a downloaded snapshot according to its file name suffix and
/// decode it as text. Snapshot files are ASCII; anything odd is replaced
/// rather than rejected.
pub fn decompress_snapshot(name: &str, bytes: Vec<u8>) -> Result<String, FetchError> {
    let decompressed = if name.ends_with(".gz") {
        let mut decoder = flate2::read::GzDecoder::new(&bytes[..]);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|source| FetchError::Decompress {
                name: name.to_string(),
                source,
            })?;
        out
    } else if name.ends_with(".bz2") {
        let mut decoder = bzip2::read::BzDecoder::new(&bytes[..]);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|source| FetchError::Decompress {
                name: name.to_string(),
                source,
            })?;
        out
    } else {
        bytes
    };

    Ok(String::from_utf8_lossy(&decompressed).into_owned())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn plain_files_pass_through() {
        let body = decompress_snapshot("delegated-lacnic-20200101", b"hello".to_vec()).unwrap();
        assert_eq!(body, "hello");
    }

    #[test]
    fn gzipped_files_are_decompressed() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"apnic|AU|ipv4|203.0.113.0|256|20110101|allocated\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let body = decompress_snapshot("delegated-apnic-20110101.gz", compressed).unwrap();
        assert!(body.starts_with("apnic|AU|ipv4"));
    }

    #[test]
    fn bzipped_files_are_decompressed() {
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(b"ripencc|NL|ipv6|2001:db8::|32|20110101|assigned\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let body = decompress_snapshot("delegated-ripencc-20110101.bz2", compressed).unwrap();
        assert!(body.starts_with("ripencc|NL|ipv6"));
    }

    #[test]
    fn corrupt_gzip_is_a_decompress_error() {
        let result = decompress_snapshot("file.gz", b"definitely not gzip".to_vec());
        assert!(matches!(result, Err(FetchError::Decompress { .. })));
    }

    #[test]
    fn offline_fetcher_reads_cache_and_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("delegated-lacnic-20200101"), b"cached body").unwrap();

        let fetcher = Fetcher::offline_with_cache(dir.path().to_path_buf());

        match fetcher
            .get("https://mirror.example/lacnic/delegated-lacnic-20200101")
            .unwrap()
        {
            FetchOutcome::Found(bytes) => assert_eq!(bytes, b"cached body"),
            FetchOutcome::Absent => panic!("expected cache hit"),
        }

        assert!(matches!(
            fetcher
                .get("https://mirror.example/lacnic/delegated-lacnic-20200102")
                .unwrap(),
            FetchOutcome::Absent
        ));
    }
}
