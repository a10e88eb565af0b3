use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use image::DynamicImage;

/// Receives thumbnail URLs from the pipeline and renders them eventually.
///
/// Loading is fire-and-forget: failures are swallowed by the loader.
pub trait ThumbnailLoader {
    fn load(&self, url: &str);
}

enum Slot {
    Loading,
    Ready(Arc<DynamicImage>),
}

type ThumbnailCache = Arc<Mutex<HashMap<String, Slot>>>;

/// Downloads and decodes thumbnails on a Tokio task, keeping every decoded image
/// in memory keyed by URL. Nothing is ever evicted.
///
/// A URL already loading or loaded is not fetched again. A failed fetch frees the
/// URL so a later `load` retries it.
#[derive(Clone)]
pub struct HttpThumbnailLoader {
    client: reqwest::Client,
    cache: ThumbnailCache,
}

impl HttpThumbnailLoader {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: Arc::default(),
        }
    }

    /// Returns the decoded thumbnail once it has finished loading.
    pub fn get(&self, url: &str) -> Option<Arc<DynamicImage>> {
        match self.cache.lock().ok()?.get(url)? {
            Slot::Ready(image) => Some(image.clone()),
            Slot::Loading => None,
        }
    }

    async fn fetch(client: &reqwest::Client, url: &str) -> Option<DynamicImage> {
        let response = match client.get(url).send().await.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Thumbnail request for {url} failed: {e}");
                return None;
            }
        };
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Thumbnail body for {url} failed: {e}");
                return None;
            }
        };
        match image::load_from_memory(&bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Thumbnail at {url} could not be decoded: {e}");
                None
            }
        }
    }
}

impl ThumbnailLoader for HttpThumbnailLoader {
    /// Must be called from within a Tokio runtime.
    fn load(&self, url: &str) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        if cache.contains_key(url) {
            log::debug!("Thumbnail {url} already cached or loading");
            return;
        }
        cache.insert(url.to_string(), Slot::Loading);
        drop(cache);

        let client = self.client.clone();
        let cache = self.cache.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            let image = Self::fetch(&client, &url).await;
            let Ok(mut cache) = cache.lock() else {
                return;
            };
            match image {
                Some(image) => {
                    log::debug!("Thumbnail {url} loaded ({}x{})", image.width(), image.height());
                    cache.insert(url, Slot::Ready(Arc::new(image)));
                }
                None => {
                    cache.remove(&url);
                }
            }
        });
    }
}
