use crate::error::{Result, VegError};
use log::info;

/// Read a survey sheet from a local file or an `http(s)` URL.
///
/// A remote source answering with a non-success status fails with that
/// status text.
pub async fn read_csv_file(path: &str) -> Result<String> {
    if path.starts_with("http://") || path.starts_with("https://") {
        let response = reqwest::get(path).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VegError::Fetch {
                path: path.to_string(),
                status: status.to_string(),
            });
        }
        let text = response.text().await?;
        info!("Fetched {} bytes from {}", text.len(), path);
        return Ok(text);
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| VegError::Io {
            path: path.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_local_fixture() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures/woody_vegetation.csv");
        let text = read_csv_file(path).await.unwrap();
        assert!(text.starts_with("Plot_ID,Location_Name,Quad_ID"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = read_csv_file("/no/such/sheet.csv").await.unwrap_err();
        assert!(matches!(err, VegError::Io { .. }));
        assert!(err.to_string().contains("/no/such/sheet.csv"));
    }
}
