/// Open Food Facts product lookup
///
/// One GET per barcode against `{endpoint}/{barcode}.json`. The payload's
/// `status` field decides between a product and "not found".
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::config::LookupConfig;
use crate::error::{BodyError, LookupError};
use crate::state::data::{ProductRecord, PER_100G_SUFFIX};

/// Largest lookup payload accepted
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Outcome of a successful request
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ProductRecord),
    NotFound,
}

/// Raw API envelope
#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    status: i64,
    product: Option<RawProduct>,
}

/// Raw product object; only the fields we read are typed
#[derive(Debug, Deserialize)]
struct RawProduct {
    #[serde(rename = "_id")]
    id: Option<String>,
    code: Option<String>,
    image_thumb_url: Option<String>,
    #[serde(default)]
    nutriments: HashMap<String, Value>,
    /// `product_name`, `product_name_fr`, ... and everything else
    #[serde(flatten)]
    other: HashMap<String, Value>,
}

/// Food database client
#[derive(Debug, Clone)]
pub struct ProductLookup {
    http_client: reqwest::Client,
    endpoint: String,
    name_languages: Vec<String>,
}

impl ProductLookup {
    pub fn new(config: &LookupConfig) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            name_languages: config.name_languages.clone(),
        })
    }

    /// Shared HTTP client, reused for thumbnail downloads
    pub fn http_client(&self) -> reqwest::Client {
        self.http_client.clone()
    }

    pub fn product_url(&self, barcode: &str) -> String {
        format!("{}/{}.json", self.endpoint, barcode)
    }

    /// Resolve a barcode to a product record
    pub async fn resolve(&self, barcode: &str) -> Result<Resolution, LookupError> {
        validate_barcode(barcode)?;

        let url = self.product_url(barcode);
        debug!(barcode = %barcode, url = %url, "Querying product database");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        let body = read_limited(response, MAX_BODY_BYTES).await?;
        let body = String::from_utf8_lossy(&body);

        // Unknown products come back as 404 with a regular `status: 0` body
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::Api(status.as_u16(), body.into_owned()));
        }

        parse_lookup_body(barcode, &body, &self.name_languages)
    }
}

/// Read a response body, giving up as soon as it exceeds `limit` bytes
pub async fn read_limited(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, BodyError> {
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(BodyError::TooLarge(limit));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| BodyError::Network(e.to_string()))?
    {
        if body.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Reject anything that could change the request path
pub fn validate_barcode(barcode: &str) -> Result<(), LookupError> {
    if barcode.is_empty() || !barcode.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LookupError::InvalidBarcode(barcode.to_string()));
    }
    Ok(())
}

/// Interpret a lookup payload
pub fn parse_lookup_body(
    barcode: &str,
    body: &str,
    name_languages: &[String],
) -> Result<Resolution, LookupError> {
    let response: LookupResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Parse(e.to_string()))?;

    match response {
        LookupResponse {
            status,
            product: Some(product),
        } if status != 0 => Ok(Resolution::Found(product.into_record(barcode, name_languages))),
        _ => Ok(Resolution::NotFound),
    }
}

impl RawProduct {
    fn into_record(self, barcode: &str, name_languages: &[String]) -> ProductRecord {
        let name = self.pick_name(name_languages);
        let code = [self.id, self.code]
            .into_iter()
            .flatten()
            .map(|c| c.trim().to_string())
            .find(|c| !c.is_empty())
            .unwrap_or_else(|| barcode.to_string());

        let nutriments = self
            .nutriments
            .iter()
            .filter_map(|(field, value)| {
                let key = field.strip_suffix(PER_100G_SUFFIX)?;
                Some((key.to_string(), numeric(value)?))
            })
            .collect::<BTreeMap<_, _>>();

        ProductRecord {
            code,
            name,
            thumbnail_url: self.image_thumb_url.filter(|url| !url.trim().is_empty()),
            nutriments,
        }
    }

    /// First non-empty of `product_name`, the preferred languages, then any
    /// other localized name in key order
    fn pick_name(&self, name_languages: &[String]) -> Option<String> {
        let preferred = std::iter::once("product_name".to_string())
            .chain(name_languages.iter().map(|lang| format!("product_name_{}", lang)));

        let mut localized: Vec<&String> = self
            .other
            .keys()
            .filter(|key| key.starts_with("product_name_"))
            .collect();
        localized.sort();

        preferred
            .chain(localized.into_iter().cloned())
            .filter_map(|key| self.other.get(&key)?.as_str().map(str::trim))
            .find(|name| !name.is_empty())
            .map(str::to_string)
    }
}

/// Nutriment values are numbers, or sometimes numeric strings
fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::NutrientMetric;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const NUTELLA: &str = r#"{
        "code": "3017620422003",
        "status": 1,
        "status_verbose": "product found",
        "product": {
            "_id": "3017620422003",
            "product_name": "Nutella",
            "product_name_fr": "Nutella pâte à tartiner",
            "image_thumb_url": "https://images.openfoodfacts.org/nutella.100.jpg",
            "nutriments": {
                "energy-kcal_100g": 539,
                "energy-kcal": 539,
                "sugars_100g": "56.3",
                "fat_100g": 30.9,
                "nova-group_100g": "unknown"
            }
        }
    }"#;

    fn languages() -> Vec<String> {
        vec!["fr".to_string(), "en".to_string()]
    }

    #[test]
    fn test_found_product() {
        let resolution = parse_lookup_body("3017620422003", NUTELLA, &languages()).unwrap();
        let Resolution::Found(product) = resolution else {
            panic!("expected a product");
        };

        assert_eq!(product.code, "3017620422003");
        assert_eq!(product.display_name(), "Nutella");
        assert_eq!(product.nutrient(NutrientMetric::EnergyKcal), Some(539.0));
        assert_eq!(product.nutrient(NutrientMetric::Sugars), Some(56.3));
        assert_eq!(product.nutrient(NutrientMetric::Fat), Some(30.9));
        assert_eq!(product.nutrient(NutrientMetric::Salt), None);
        // Only per-100g fields are kept, non-numeric values dropped
        assert_eq!(product.nutriments.len(), 3);
    }

    #[test]
    fn test_status_zero_is_not_found() {
        let body = r#"{"code":"000","status":0,"status_verbose":"product not found"}"#;
        assert_eq!(
            parse_lookup_body("000", body, &languages()).unwrap(),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_success_status_without_product_is_not_found() {
        assert_eq!(
            parse_lookup_body("1", r#"{"status":1}"#, &languages()).unwrap(),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            parse_lookup_body("1", "<html>", &languages()),
            Err(LookupError::Parse(_))
        ));
    }

    #[test]
    fn test_name_falls_back_through_languages() {
        let body = r#"{"status":1,"product":{
            "_id":"42",
            "product_name":"  ",
            "product_name_de":"Schokolade",
            "product_name_en":"Chocolate"
        }}"#;
        let Resolution::Found(product) = parse_lookup_body("42", body, &languages()).unwrap()
        else {
            panic!("expected a product");
        };
        assert_eq!(product.name.as_deref(), Some("Chocolate"));

        let body = r#"{"status":1,"product":{"product_name_de":"Schokolade"}}"#;
        let Resolution::Found(product) = parse_lookup_body("42", body, &languages()).unwrap()
        else {
            panic!("expected a product");
        };
        assert_eq!(product.name.as_deref(), Some("Schokolade"));
        // No `_id` or `code` in the payload: the scanned barcode is used
        assert_eq!(product.code, "42");
        assert!(product.thumbnail_url.is_none());
    }

    #[test]
    fn test_barcode_validation() {
        assert!(validate_barcode("3017620422003").is_ok());
        assert!(validate_barcode("").is_err());
        assert!(validate_barcode("../admin").is_err());
        assert!(validate_barcode("12 34").is_err());
    }

    #[test]
    fn test_product_url() {
        let config = LookupConfig {
            endpoint: "https://example.org/api/v0/product/".to_string(),
            ..LookupConfig::default()
        };
        let lookup = ProductLookup::new(&config).unwrap();
        assert_eq!(
            lookup.product_url("3017620422003"),
            "https://example.org/api/v0/product/3017620422003.json"
        );
    }

    /// Serve a single raw HTTP response and report the request line
    async fn serve_raw(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = vec![0u8; 4096];
            let read = socket.read(&mut buffer).await.unwrap();
            let request = String::from_utf8_lossy(&buffer[..read]).to_string();

            // The client may hang up early on oversize bodies
            socket.write_all(response.as_bytes()).await.ok();
            socket.shutdown().await.ok();
            request.lines().next().unwrap_or_default().to_string()
        });

        (format!("http://{}/api/v0/product", address), handle)
    }

    /// Serve a single canned JSON response
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        serve_raw(format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        ))
        .await
    }

    fn lookup_for(endpoint: String) -> ProductLookup {
        ProductLookup::new(&LookupConfig {
            endpoint,
            ..LookupConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_over_http() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", NUTELLA).await;

        let resolution = lookup_for(endpoint).resolve("3017620422003").await.unwrap();

        let request_line = server.await.unwrap();
        assert_eq!(request_line, "GET /api/v0/product/3017620422003.json HTTP/1.1");
        assert!(matches!(resolution, Resolution::Found(p) if p.code == "3017620422003"));
    }

    #[tokio::test]
    async fn test_resolve_404_body_is_not_found() {
        let (endpoint, server) =
            serve_once("HTTP/1.1 404 Not Found", r#"{"status":0,"status_verbose":"product not found"}"#).await;

        let resolution = lookup_for(endpoint).resolve("0000000000000").await.unwrap();
        server.await.unwrap();
        assert_eq!(resolution, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_server_error() {
        let (endpoint, server) = serve_once("HTTP/1.1 503 Service Unavailable", "busy").await;

        let result = lookup_for(endpoint).resolve("3017620422003").await;
        server.await.unwrap();
        assert_eq!(result, Err(LookupError::Api(503, "busy".to_string())));
    }

    #[tokio::test]
    async fn test_declared_oversize_body_is_refused() {
        let body = "x".repeat(100);
        let (url, server) = serve_raw(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(read_limited(response, 10).await, Err(BodyError::TooLarge(10)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_undeclared_body_stops_at_limit() {
        let body = "x".repeat(100);
        // No Content-Length: the body runs until the connection closes
        let (url, server) =
            serve_raw(format!("HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n{}", body)).await;

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(read_limited(response, 10).await, Err(BodyError::TooLarge(10)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_body_within_limit_is_returned() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"status":0}"#).await;

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(read_limited(response, 1024).await.unwrap(), br#"{"status":0}"#.to_vec());
        server.await.unwrap();
    }
}
