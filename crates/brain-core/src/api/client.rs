use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, warn};

use super::types::{
    Ack, ApiResponse, ChatReply, ChatRequest, InitRequest, PersonaList, PersonaLoaded,
    PersonaSummary, SelectPersonaRequest, ServerConfig,
};
use crate::error::ApiError;

/// HTTP client for the brain server's `/api` routes.
#[derive(Clone)]
pub struct BrainClient {
    client: Client,
    base_url: String,
}

impl BrainClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send and decode the envelope. The body is read whatever the HTTP
    /// status, because the server reports failures as JSON with 4xx/5xx.
    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!(path, "sending request");
        let response = request.send().await?;
        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await?;
        let result = envelope.into_result();
        if let Err(e) = &result {
            warn!(path, %status, error = %e, "brain server reported an error");
        }
        result
    }

    pub async fn init(&self, request: &InitRequest) -> Result<Ack, ApiError> {
        let path = "/api/init";
        self.call(path, self.client.post(self.url(path)).json(request))
            .await
    }

    pub async fn chat(&self, message: &str) -> Result<ChatReply, ApiError> {
        let path = "/api/chat";
        self.call(
            path,
            self.client.post(self.url(path)).json(&ChatRequest { message }),
        )
        .await
    }

    /// Upload a persona document as the multipart `file` field.
    pub async fn upload_persona(&self, file: &Path) -> Result<PersonaLoaded, ApiError> {
        let bytes = tokio::fs::read(file).await.map_err(|source| ApiError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "persona.txt".to_string());
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let path = "/api/persona";
        self.call(path, self.client.post(self.url(path)).multipart(form))
            .await
    }

    pub async fn clear_persona(&self) -> Result<Ack, ApiError> {
        let path = "/api/persona/clear";
        self.call(path, self.client.post(self.url(path))).await
    }

    pub async fn list_personas(&self) -> Result<Vec<PersonaSummary>, ApiError> {
        let path = "/api/personas";
        let list: PersonaList = self.call(path, self.client.get(self.url(path))).await?;
        Ok(list.personas)
    }

    pub async fn select_persona(&self, id: &str) -> Result<PersonaLoaded, ApiError> {
        let path = "/api/persona/select";
        self.call(
            path,
            self.client
                .post(self.url(path))
                .json(&SelectPersonaRequest { id }),
        )
        .await
    }

    pub async fn reset(&self) -> Result<Ack, ApiError> {
        let path = "/api/reset";
        self.call(path, self.client.post(self.url(path))).await
    }

    pub async fn clear_memory(&self) -> Result<Ack, ApiError> {
        let path = "/api/memory/clear";
        self.call(path, self.client.post(self.url(path))).await
    }

    pub async fn config(&self) -> Result<ServerConfig, ApiError> {
        let response = self.client.get(self.url("/api/config")).send().await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use axum::{
        extract::{Multipart, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Recorded {
        bodies: Arc<Mutex<Vec<Value>>>,
        uploads: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
    }

    async fn spawn_server(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }

    async fn record_init(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
        rec.bodies.lock().unwrap().push(body);
        Json(json!({"status": "ok", "message": "Brain initialized with ollama"}))
    }

    async fn record_upload(
        State(rec): State<Recorded>,
        mut multipart: Multipart,
    ) -> Json<Value> {
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.unwrap().to_vec();
            rec.uploads.lock().unwrap().push((name, file_name, data));
        }
        Json(json!({"status": "ok", "persona_name": "Ada Lovelace", "profile": {"NAME": "Ada"}}))
    }

    #[tokio::test]
    async fn test_init_posts_provider_and_model() {
        let rec = Recorded::default();
        let router = Router::new()
            .route("/api/init", post(record_init))
            .with_state(rec.clone());
        let client = BrainClient::new(&spawn_server(router).await);

        let ack = client
            .init(&InitRequest {
                provider: Provider::Ollama,
                model_name: Some("mistral".into()),
            })
            .await
            .expect("init");

        assert_eq!(ack.message.as_deref(), Some("Brain initialized with ollama"));
        let bodies = rec.bodies.lock().unwrap();
        assert_eq!(bodies[0], json!({"provider": "ollama", "model_name": "mistral"}));
    }

    #[tokio::test]
    async fn test_error_envelope_on_server_error_status() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"status": "error", "message": "Brain not initialized"})),
                )
            }),
        );
        let client = BrainClient::new(&spawn_server(router).await);

        match client.chat("hello").await {
            Err(ApiError::Application(msg)) => assert_eq!(msg, "Brain not initialized"),
            other => panic!("expected application error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chat_decodes_agent_outputs() {
        let router = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "status": "ok",
                    "response": format!("echo: {}", body["message"].as_str().unwrap_or_default()),
                    "agent_outputs": {
                        "logic": {"name": "Logic Agent", "role": "Reasoning", "output": "2+2=4"}
                    },
                    "persona_active": false,
                    "persona_name": null
                }))
            }),
        );
        let client = BrainClient::new(&spawn_server(router).await);

        let reply = client.chat("hi").await.expect("chat");
        assert_eq!(reply.response, "echo: hi");
        let outputs = reply.agent_outputs.expect("agent outputs");
        assert_eq!(outputs["logic"].output, "2+2=4");
    }

    #[tokio::test]
    async fn test_non_json_body_is_transport_error() {
        let router = Router::new().route("/api/reset", post(|| async { "<html>oops</html>" }));
        let client = BrainClient::new(&spawn_server(router).await);

        let err = client.reset().await.expect_err("should fail");
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = BrainClient::new(&format!("http://{addr}"));
        let err = client.clear_memory().await.expect_err("should fail");
        assert!(matches!(err, ApiError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file_field() {
        let rec = Recorded::default();
        let router = Router::new()
            .route("/api/persona", post(record_upload))
            .with_state(rec.clone());
        let client = BrainClient::new(&spawn_server(router).await);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ada.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"Notes on the Analytical Engine").unwrap();

        let loaded = client.upload_persona(&path).await.expect("upload");
        assert_eq!(loaded.persona_name, "Ada Lovelace");

        let uploads = rec.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "file");
        assert_eq!(uploads[0].1, "ada.txt");
        assert_eq!(uploads[0].2, b"Notes on the Analytical Engine");
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let client = BrainClient::new("http://127.0.0.1:9");
        let err = client
            .upload_persona(Path::new("/definitely/not/here.txt"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ApiError::Io { .. }));
    }

    #[tokio::test]
    async fn test_personas_select_and_config() {
        let router = Router::new()
            .route(
                "/api/personas",
                get(|| async {
                    Json(json!({"status": "ok", "personas": [
                        {"id": "tesla", "name": "Nikola Tesla", "emoji": "⚡", "category": "Inventor", "source": "My Inventions"}
                    ]}))
                }),
            )
            .route(
                "/api/persona/select",
                post(|Json(body): Json<Value>| async move {
                    if body["id"] == "tesla" {
                        (StatusCode::OK, Json(json!({"status": "ok", "persona_name": "Nikola Tesla"})))
                    } else {
                        (
                            StatusCode::NOT_FOUND,
                            Json(json!({"status": "error", "message": format!("Unknown persona: {}", body["id"].as_str().unwrap_or_default())})),
                        )
                    }
                }),
            )
            .route(
                "/api/config",
                get(|| async {
                    Json(json!({"provider": "gemini", "model_name": null, "persona_name": null, "persona_active": false}))
                }),
            );
        let client = BrainClient::new(&spawn_server(router).await);

        let personas = client.list_personas().await.expect("personas");
        assert_eq!(personas[0].id, "tesla");

        let loaded = client.select_persona("tesla").await.expect("select");
        assert_eq!(loaded.persona_name, "Nikola Tesla");
        match client.select_persona("nobody").await {
            Err(ApiError::Application(msg)) => assert_eq!(msg, "Unknown persona: nobody"),
            other => panic!("unexpected {other:?}"),
        }

        let config = client.config().await.expect("config");
        assert_eq!(config.provider.as_deref(), Some("gemini"));
        assert!(config.model_name.is_none());
    }
}
