use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

/// Borrowed view of a `data:<mime>;base64,<payload>` image URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime: &'a str,
    pub payload: &'a str,
}

pub fn parse_data_uri(uri: &str) -> Result<DataUri<'_>> {
    let rest = uri.strip_prefix("data:").context("not a data URI")?;
    let (header, payload) = rest.split_once(',').context("data URI has no payload")?;
    let mime = header.strip_suffix(";base64").context("data URI is not base64 encoded")?;
    if !mime.starts_with("image/") {
        bail!("data URI is not an image: {mime}");
    }
    if payload.is_empty() {
        bail!("data URI payload is empty");
    }
    Ok(DataUri { mime, payload })
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let parsed = parse_data_uri(uri)?;
    let bytes = STANDARD.decode(parsed.payload).context("invalid base64 payload")?;
    Ok((parsed.mime.to_string(), bytes))
}

pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .context("target path has no file name")?
        .to_string_lossy();
    let tmp = path.with_file_name(format!("{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));
    {
        let mut f = fs::File::create(&tmp).await?;
        f.write_all(bytes).await?;
        let _ = f.sync_all().await; // best-effort
    }
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Decode a generated image and save it as `generated-image-<millis>.<ext>`.
pub async fn save_image(out_dir: &Path, data_uri: &str) -> Result<PathBuf> {
    let (mime, bytes) = decode_data_uri(data_uri)?;
    let name = format!("generated-image-{}.{}", Utc::now().timestamp_millis(), extension_for(&mime));
    let path = out_dir.join(name);
    write_atomic(&path, &bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_image_data_uri() {
        let uri = "data:image/jpeg;base64,/9j/4AAQ";
        let d = parse_data_uri(uri).unwrap();
        assert_eq!(d.mime, "image/jpeg");
        assert_eq!(d.payload, "/9j/4AAQ");
    }

    #[test]
    fn rejects_malformed_uris() {
        assert!(parse_data_uri("/alert.svg?height=512&width=512").is_err());
        assert!(parse_data_uri("data:text/plain;base64,aGk=").is_err());
        assert!(parse_data_uri("data:image/png,raw").is_err());
        assert!(parse_data_uri("data:image/png;base64,").is_err());
    }

    #[test]
    fn decodes_what_it_encodes() {
        let uri = to_data_uri("image/png", b"\x89PNG");
        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"\x89PNG");
        assert_eq!(extension_for(&mime), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/pdf"), "bin");
    }

    #[tokio::test]
    async fn saves_decoded_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_image(dir.path(), &to_data_uri("image/webp", b"RIFF")).await.unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("webp"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("generated-image-"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"RIFF");
        // no temp files left behind
        let mut rd = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut n = 0;
        while rd.next_entry().await.unwrap().is_some() {
            n += 1;
        }
        assert_eq!(n, 1);
    }
}
