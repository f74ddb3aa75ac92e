//! HTTP client for the diagnosis backend.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder, Response,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use super::{
    DiagnosisService, GuestQuota, QuotaEndpoint, ServiceError, VehicleStore, auth::AuthContext,
};
use crate::{
    config::ServiceCfg,
    diagnosis::model::{
        Category, DiagnosisRequest, DiagnosisResult, SavedVehicle, VehicleAssociation,
    },
};

/// JSON part sent alongside the uploaded files.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Payload<'a> {
    category: Category,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vehicle: Option<&'a VehicleAssociation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_duration_secs: Option<u32>,
}

/// Error bodies come as `{"error": ...}` or `{"message": ...}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// One client for all backend endpoints.
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: AuthContext,
}

impl ApiClient {
    pub fn new(cfg: &ServiceCfg, auth: AuthContext) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Signed-in callers use the bearer token; guests identify by device.
    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match self.auth.access_token() {
            Some(token) => rb.bearer_auth(token),
            None => rb.header("X-Device-Id", &self.auth.device_id),
        }
    }
}

/// Build the multipart body: payload JSON, then photos in order, then voice.
async fn build_form(req: &DiagnosisRequest) -> Result<Form, ServiceError> {
    let payload = Payload {
        category: req.category,
        description: &req.description,
        vehicle: req.vehicle.as_ref(),
        voice_duration_secs: req.voice.as_ref().map(|v| v.duration_secs),
    };
    let json = serde_json::to_string(&payload).map_err(|e| ServiceError::Decode(e.to_string()))?;
    let mut form = Form::new().part(
        "payload",
        Part::text(json).mime_str("application/json; charset=UTF-8")?,
    );

    for photo in &req.photos {
        let bytes = tokio::fs::read(&photo.0)
            .await
            .map_err(|source| ServiceError::Attachment {
                what: "photo",
                source,
            })?;
        form = form.part(
            "photo",
            Part::bytes(bytes)
                .file_name(photo.file_name())
                .mime_str(image_mime(&photo.0))?,
        );
    }

    if let Some(voice) = &req.voice {
        let bytes = tokio::fs::read(&voice.asset)
            .await
            .map_err(|source| ServiceError::Attachment {
                what: "voice recording",
                source,
            })?;
        let name = voice
            .asset
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "voice.wav".into());
        form = form.part(
            "voice",
            Part::bytes(bytes)
                .file_name(name)
                .mime_str(audio_mime(&voice.asset))?,
        );
    }
    Ok(form)
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn image_mime(path: &Path) -> &'static str {
    match extension(path).as_str() {
        "png" => "image/png",
        "heic" => "image/heic",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

fn audio_mime(path: &Path) -> &'static str {
    match extension(path).as_str() {
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Convert non-2xx responses into an API error carrying the server's message.
async fn ensure_success(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP status {status}")
            } else {
                trimmed.to_string()
            }
        });
    Err(ServiceError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl DiagnosisService for ApiClient {
    async fn diagnose(&self, request: DiagnosisRequest) -> Result<DiagnosisResult, ServiceError> {
        tracing::info!(
            "POST diagnoses: category={} photos={} voice={} vehicle={}",
            request.category,
            request.photos.len(),
            request.voice.is_some(),
            request.vehicle.is_some()
        );
        let form = build_form(&request).await?;
        let resp = self
            .authorize(self.http.post(self.url("/v1/diagnoses")))
            .multipart(form)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json::<DiagnosisResult>().await?)
    }
}

#[async_trait]
impl QuotaEndpoint for ApiClient {
    async fn guest_quota(&self) -> Result<GuestQuota, ServiceError> {
        let url = format!(
            "{}?deviceId={}",
            self.url("/v1/guest-quota"),
            urlencoding::encode(&self.auth.device_id)
        );
        let resp = self.authorize(self.http.get(url)).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json::<GuestQuota>().await?)
    }
}

#[async_trait]
impl VehicleStore for ApiClient {
    async fn saved_vehicles(&self) -> Result<Vec<SavedVehicle>, ServiceError> {
        // Guests have no garage.
        if self.auth.is_guest {
            return Ok(Vec::new());
        }
        let resp = self
            .authorize(self.http.get(self.url("/v1/vehicles")))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json::<Vec<SavedVehicle>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::{
        errors::{ClassifiedError, ErrorCategory},
        model::{PhotoRef, Urgency, VoiceRecording},
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    fn client(uri: &str, auth: AuthContext) -> ApiClient {
        let cfg = ServiceCfg {
            base_url: format!("{uri}/"),
            request_timeout_secs: 5,
        };
        ApiClient::new(&cfg, auth).unwrap()
    }

    fn request(photos: Vec<PhotoRef>, voice: Option<VoiceRecording>) -> DiagnosisRequest {
        DiagnosisRequest {
            category: Category::Engine,
            description: "Engine stalls when idling at lights".into(),
            voice,
            photos,
            vehicle: Some(VehicleAssociation::Saved {
                vehicle_id: "v-9".into(),
            }),
        }
    }

    #[tokio::test]
    async fn test_diagnose_uploads_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/diagnoses"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "urgency": "critical",
                "confidence": 0.91,
                "summary": "Failing idle air control valve",
                "possibleCauses": ["Dirty IAC valve"],
                "recommendedActions": [{"action": "Stop driving", "priority": "high"}],
                "errorMessage": "One photo was too dark to analyse"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("engine.png");
        std::fs::write(&photo, b"\x89PNG").unwrap();

        let api = client(&server.uri(), AuthContext::signed_in("tok", "", "dev"));
        let result = api
            .diagnose(request(vec![PhotoRef(photo)], None))
            .await
            .unwrap();
        assert_eq!(result.urgency, Urgency::Critical);
        assert_eq!(
            result.error_message.as_deref(),
            Some("One photo was too dark to analyse")
        );

        let received = &server.received_requests().await.unwrap()[0];
        let body = String::from_utf8_lossy(&received.body);
        assert!(body.contains("name=\"payload\""));
        assert!(body.contains("\"vehicleId\":\"v-9\""));
        assert!(body.contains("filename=\"engine.png\""));
        assert!(!body.contains("name=\"voice\""));
    }

    #[tokio::test]
    async fn test_api_error_message_is_classifiable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/diagnoses"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "Description is required"})),
            )
            .mount(&server)
            .await;

        let api = client(&server.uri(), AuthContext::guest("dev"));
        let err = api.diagnose(request(vec![], None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Api { status: 400, .. }));
        assert_eq!(
            ClassifiedError::classify(err.to_string()).category,
            ErrorCategory::MissingDescription
        );
    }

    #[tokio::test]
    async fn test_plain_text_error_body_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream model crashed"))
            .mount(&server)
            .await;
        let api = client(&server.uri(), AuthContext::guest("dev"));
        let err = api.diagnose(request(vec![], None)).await.unwrap_err();
        assert_eq!(err.to_string(), "upstream model crashed");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Bind an ephemeral port and release it so connects are refused.
        let uri = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let api = client(&uri, AuthContext::guest("dev"));
        let err = api.diagnose(request(vec![], None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Network(_)));
        assert_eq!(
            ClassifiedError::classify(err.to_string()).category,
            ErrorCategory::NetworkError
        );
    }

    #[tokio::test]
    async fn test_unreadable_voice_is_audio_upload_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let api = client(&server.uri(), AuthContext::guest("dev"));
        let voice = VoiceRecording {
            asset: PathBuf::from("/definitely/missing/voice.wav"),
            duration_secs: 3,
        };
        let err = api.diagnose(request(vec![], Some(voice))).await.unwrap_err();
        assert_eq!(
            ClassifiedError::classify(err.to_string()).category,
            ErrorCategory::AudioUploadFailed
        );
    }

    #[tokio::test]
    async fn test_guest_quota_identifies_device() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/guest-quota"))
            .and(query_param("deviceId", "dev 1"))
            .and(header("X-Device-Id", "dev 1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"remaining": 2})))
            .expect(1)
            .mount(&server)
            .await;
        let api = client(&server.uri(), AuthContext::guest("dev 1"));
        assert_eq!(api.guest_quota().await.unwrap(), GuestQuota { remaining: 2 });
    }

    #[tokio::test]
    async fn test_saved_vehicles_for_signed_in_caller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/vehicles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "v-1", "year": 2019, "make": "Kia", "model": "Rio", "mileageKm": 40000}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let api = client(&server.uri(), AuthContext::signed_in("tok", "Kit", "dev"));
        let vehicles = api.saved_vehicles().await.unwrap();
        assert_eq!(vehicles[0].label(), "2019 Kia Rio");

        let guest = client(&server.uri(), AuthContext::guest("dev"));
        assert!(guest.saved_vehicles().await.unwrap().is_empty());
    }
}
