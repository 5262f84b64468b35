//! Image acquisition (spec §4.4): download the best-available image and
//! upload it to the object store at a deterministic key. Never blocks
//! categorisation; failures degrade to a missing key rather than failing
//! the item.

use crate::store::Store;

const BUCKET: &str = "content-images";

pub fn image_key(owner: &str, shortcode: &str, variant: &str) -> String {
    format!("{owner}/{shortcode}_{variant}.jpg")
}

/// Downloads `image_url` and uploads it under the deterministic key.
/// Returns `None` (not an error) on any failure: missing URL, network
/// error, non-2xx response, or upload failure.
pub async fn acquire_image(
    http: &reqwest::Client,
    store: &Store,
    owner: &str,
    shortcode: &str,
    variant: &str,
    image_url: Option<&str>,
) -> Option<String> {
    let url = image_url?;
    let bytes = match http.get(url).send().await {
        Ok(response) if response.status().is_success() => match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                tracing::warn!(owner, shortcode, error = %e, "image download body read failed");
                return None;
            },
        },
        Ok(response) => {
            tracing::warn!(owner, shortcode, status = %response.status(), "image download returned non-2xx");
            return None;
        },
        Err(e) => {
            tracing::warn!(owner, shortcode, error = %e, "image download request failed");
            return None;
        },
    };

    let key = image_key(owner, shortcode, variant);
    match store.upload_image(BUCKET, &key, bytes).await {
        Ok(saved_key) => Some(saved_key),
        Err(e) => {
            tracing::warn!(owner, shortcode, error = %e, "image upload failed, degrading gracefully");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_key_is_deterministic() {
        assert_eq!(image_key("mindset.therapy", "abc123", "display"), "mindset.therapy/abc123_display.jpg");
    }
}
