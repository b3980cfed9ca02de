//! QR payload to image URL conversion

use reqwest::Url;
use wa_agent_config::QrConfig;

use crate::integrations::IntegrationError;

/// Turns a raw QR payload into an image URL the messaging gateway can attach
pub trait QrImageRenderer: Send + Sync {
    fn image_url(&self, payload: &str) -> Result<String, IntegrationError>;
}

/// Renders through a QuickChart-compatible `?text=&size=` endpoint
pub struct QuickChartRenderer {
    config: QrConfig,
}

impl QuickChartRenderer {
    pub fn new(config: QrConfig) -> Self {
        Self { config }
    }
}

impl QrImageRenderer for QuickChartRenderer {
    fn image_url(&self, payload: &str) -> Result<String, IntegrationError> {
        if payload.is_empty() {
            return Err(IntegrationError::InvalidRequest("empty QR payload".to_string()));
        }

        let size = self.config.size.to_string();
        let url = Url::parse_with_params(
            &self.config.base_url,
            &[("text", payload), ("size", size.as_str()), ("margin", "2")],
        )
        .map_err(|e| IntegrationError::InvalidRequest(format!("QR service URL: {}", e)))?;

        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url_encodes_payload() {
        let renderer = QuickChartRenderer::new(QrConfig::default());
        let url = renderer.image_url("00020101 ABC&x=1").unwrap();

        assert!(url.starts_with("https://quickchart.io/qr?"));
        assert!(url.contains("text=00020101+ABC%26x%3D1"));
        assert!(url.contains("size=300"));
    }

    #[test]
    fn test_rejects_empty_payload_and_bad_base() {
        let renderer = QuickChartRenderer::new(QrConfig::default());
        assert!(renderer.image_url("").is_err());

        let renderer = QuickChartRenderer::new(QrConfig {
            base_url: "not a url".to_string(),
            size: 300,
        });
        assert!(renderer.image_url("abc").is_err());
    }
}
