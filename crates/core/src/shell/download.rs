//! Resolution and streaming of media downloads.

use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use percent_encoding::percent_decode_str;
use reqwest::{
    Client,
    header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderName},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{
    client::{ensure_success, last_path_segment},
    error::{AutoShortsError, Result},
    media::extension_for_mime,
};

const FALLBACK_NAME: &str = "downloadfile";

/// A download the shell has been asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub mime: Option<String>,
    pub filename: String,
}

impl DownloadRequest {
    pub fn resolve(url: &str, mime: Option<&str>, content_disposition: Option<&str>) -> Self {
        let raw = content_disposition
            .and_then(filename_from_disposition)
            .or_else(|| filename_from_url(url))
            .unwrap_or_else(|| {
                let ext = mime.map(extension_for_mime).unwrap_or("bin");
                format!("{}.{}", FALLBACK_NAME, ext)
            });

        Self {
            url: url.to_string(),
            mime: mime.map(str::to_string),
            filename: sanitize(&percent_decode_str(&raw).decode_utf8_lossy()),
        }
    }
}

fn filename_from_disposition(header: &str) -> Option<String> {
    let params: Vec<(String, String)> = split_params(header)
        .into_iter()
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            Some((key.trim().to_ascii_lowercase(), unquote(value)))
        })
        .collect();

    let extended = params.iter().find(|(k, _)| k == "filename*").map(|(_, v)| {
        // charset'language'value
        v.splitn(3, '\'').nth(2).unwrap_or(v.as_str())
    });
    let plain = || {
        params
            .iter()
            .find(|(k, _)| k == "filename")
            .map(|(_, v)| v.as_str())
    };

    extended
        .or_else(plain)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Split header parameters on the semicolons that sit outside quoted strings.
fn split_params(header: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in header.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&header[start..]);
    parts
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn filename_from_url(url: &str) -> Option<String> {
    last_path_segment(url)
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Streams downloads into a directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    http: Client,
    dir: PathBuf,
}

impl Downloader {
    pub fn new(http: Client, dir: PathBuf) -> Self {
        Self { http, dir }
    }

    /// The user's download directory, or the current directory when there is none.
    pub fn default_dir() -> PathBuf {
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn download(&self, url: &str) -> Result<PathBuf> {
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        let response = ensure_success("download", response).await?;

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let request = DownloadRequest::resolve(
            url,
            header(CONTENT_TYPE).as_deref(),
            header(CONTENT_DISPOSITION).as_deref(),
        );

        fs::create_dir_all(&self.dir).await?;
        let destination = unique_destination(&self.dir, &request.filename).await?;

        let written = store_body(response.bytes_stream(), &destination).await?;

        info!("Downloaded {} bytes to {}", written, destination.display());
        Ok(destination)
    }
}

/// Write a body next to `destination` and move it into place once complete.
/// A failed transfer leaves neither file behind.
async fn store_body<S, B, E>(stream: S, destination: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    AutoShortsError: From<E>,
{
    let partial = partial_path(destination);
    match write_body(stream, &partial).await {
        Ok(written) => {
            fs::rename(&partial, destination).await?;
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                warn!("Could not remove {}: {}", partial.display(), cleanup);
            }
            Err(e)
        }
    }
}

async fn write_body<S, B, E>(stream: S, path: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    AutoShortsError: From<E>,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(chunk.as_ref()).await?;
        written += chunk.as_ref().len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// `name.ext`, then `name-1.ext`, `name-2.ext`, ... until one is free.
async fn unique_destination(dir: &Path, filename: &str) -> Result<PathBuf> {
    let candidate = dir.join(filename);
    if !fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1;
    loop {
        let name = match &ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        let candidate = dir.join(name);
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}
