use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use fancontrol_common::{
    render_sketch, sketch::SKETCH_FILE_NAME, submit_contact, ContactBackend, ContactForm,
    ContactSubmission, ControlPolicy, InMemoryContactBook, NoticeKind, RuntimeConfig,
};

use crate::{clock::monotonic_ms, host::HostController, runner::LoopHandle, store::AppStore};

#[derive(Clone)]
pub struct ApiState {
    pub control: Arc<LoopHandle<HostController>>,
    pub runtime: Arc<Mutex<RuntimeConfig>>,
    pub contacts: Arc<InMemoryContactBook>,
    pub contact_form: Arc<Mutex<ContactForm>>,
    pub store: AppStore,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct NoticeView {
    kind: &'static str,
    message: Option<String>,
    #[serde(rename = "remainingMs")]
    remaining_ms: u64,
}

#[derive(Debug, Serialize)]
struct ContactStatusView {
    #[serde(rename = "inFlight")]
    in_flight: bool,
    notice: Option<NoticeView>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/loop/pause", post(handle_pause))
        .route("/api/loop/resume", post(handle_resume))
        .route("/api/policy", get(handle_get_policy).put(handle_put_policy))
        .route("/api/sketch", get(handle_get_sketch))
        .route("/api/contact", post(handle_post_contact))
        .route("/api/contact/status", get(handle_get_contact_status))
        .route("/api/contacts", get(handle_get_contacts))
        .with_state(state)
}

/// Swaps the live policy and persists it when it changed.
pub async fn apply_policy(
    control: &LoopHandle<HostController>,
    runtime: &Mutex<RuntimeConfig>,
    store: &AppStore,
    policy: ControlPolicy,
) -> anyhow::Result<bool> {
    let changed = control.driver().lock().await.set_policy(policy);
    if changed {
        let snapshot = {
            let mut runtime = runtime.lock().await;
            runtime.policy = policy;
            runtime.clone()
        };
        store.save_runtime_config(&snapshot).await?;
    }
    Ok(changed)
}

async fn handle_get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let status = state.control.driver().lock().await.status();
    Json(status)
}

async fn handle_pause(State(state): State<ApiState>) -> impl IntoResponse {
    state.control.pause().await;
    handle_get_status(State(state)).await.into_response()
}

async fn handle_resume(State(state): State<ApiState>) -> impl IntoResponse {
    state.control.resume().await;
    handle_get_status(State(state)).await.into_response()
}

async fn handle_get_policy(State(state): State<ApiState>) -> impl IntoResponse {
    let policy = *state.control.driver().lock().await.control().policy();
    Json(policy)
}

async fn handle_put_policy(State(state): State<ApiState>, body: Bytes) -> impl IntoResponse {
    let policy = match serde_json::from_slice::<ControlPolicy>(&body) {
        Ok(policy) => policy,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    if let Err(err) = apply_policy(&state.control, &state.runtime, &state.store, policy).await {
        warn!("failed to persist policy update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    Json(policy).into_response()
}

async fn handle_get_sketch(State(state): State<ApiState>) -> impl IntoResponse {
    let policy = *state.control.driver().lock().await.control().policy();
    let (wiring, interval_ms) = {
        let runtime = state.runtime.lock().await;
        (runtime.wiring.clone(), runtime.controller.cycle_interval_ms)
    };

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{SKETCH_FILE_NAME}\""),
            ),
        ],
        render_sketch(&policy, &wiring, interval_ms),
    )
}

async fn handle_post_contact(
    State(state): State<ApiState>,
    Json(submission): Json<ContactSubmission>,
) -> impl IntoResponse {
    state.contact_form.lock().await.begin();

    let outcome = submit_contact(
        state.contacts.as_ref(),
        &submission.name,
        &submission.email,
        &submission.message,
    );
    if outcome.is_ok() {
        if let Err(err) = state.store.save_contacts_from(state.contacts.as_ref()).await {
            warn!("failed to persist contacts: {err:#}");
        }
    }

    state
        .contact_form
        .lock()
        .await
        .finish(&outcome, monotonic_ms());

    match outcome {
        Ok(()) => Json(SubmitResponse { ok: true }).into_response(),
        Err(err) => error_response(StatusCode::BAD_GATEWAY, err.message()),
    }
}

async fn handle_get_contact_status(State(state): State<ApiState>) -> impl IntoResponse {
    let now_ms = monotonic_ms();
    let form = state.contact_form.lock().await;
    let notice = form.notice(now_ms).map(|notice| {
        let (kind, message) = match &notice.kind {
            NoticeKind::Success => ("success", None),
            NoticeKind::Error(message) => ("error", Some(message.clone())),
        };
        NoticeView {
            kind,
            message,
            remaining_ms: notice.expires_at_ms.saturating_sub(now_ms),
        }
    });

    Json(ContactStatusView {
        in_flight: form.is_in_flight(),
        notice,
    })
}

async fn handle_get_contacts(State(state): State<ApiState>) -> impl IntoResponse {
    match state.contacts.list() {
        Ok(records) => Json(records).into_response(),
        Err(err) => error_response(StatusCode::BAD_GATEWAY, &err),
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use fancontrol_common::{
        ControllerConfig, FanController, RelayActuator, SimulatedFeed, SimulationConfig,
        TracingReporter,
    };

    use super::*;
    use crate::{host::HostFeed, runner::spawn_control_loop};

    fn state(name: &str) -> (ApiState, PathBuf) {
        let dir = std::env::temp_dir().join(format!("fancontrol-api-{name}-{}", std::process::id()));
        let runtime = RuntimeConfig::default();
        let controller = FanController::new(
            ControllerConfig::default(),
            runtime.policy,
            HostFeed::Simulated(SimulatedFeed::seeded(SimulationConfig::default(), 5)),
            RelayActuator::from_wiring(&runtime.wiring),
            TracingReporter::new(2),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let control = spawn_control_loop(
            Arc::new(Mutex::new(controller)),
            Duration::from_secs(3_600),
            tx,
        );

        let state = ApiState {
            control: Arc::new(control),
            runtime: Arc::new(Mutex::new(runtime)),
            contacts: Arc::new(InMemoryContactBook::new()),
            contact_form: Arc::new(Mutex::new(ContactForm::new(5_000))),
            store: AppStore::in_dir(dir.clone()),
        };
        (state, dir)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn pause_and_resume_report_loop_state() {
        let (state, dir) = state("pause");
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(request("POST", "/api/loop/pause", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["loopState"], "PAUSED");

        let response = app
            .oneshot(request("POST", "/api/loop/resume", ""))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["loopState"], "RUNNING");

        state.control.shutdown().await;
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn inverted_policy_is_rejected_with_400() {
        let (state, dir) = state("bad-policy");
        let app = build_router(state.clone());

        let response = app
            .oneshot(request(
                "PUT",
                "/api/policy",
                r#"{"kind":"hysteresis","on":25.0,"off":26.0}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("must be greater than"));
        assert_eq!(
            *state.control.driver().lock().await.control().policy(),
            ControlPolicy::default()
        );

        state.control.shutdown().await;
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn policy_update_is_applied_and_persisted() {
        let (state, dir) = state("policy");
        let app = build_router(state.clone());

        let response = app
            .oneshot(request(
                "PUT",
                "/api/policy",
                r#"{"kind":"simple","threshold":28.0}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let expected = ControlPolicy::simple(28.0).unwrap();
        assert_eq!(
            *state.control.driver().lock().await.control().policy(),
            expected
        );
        let persisted = state.store.load_runtime_config().await.unwrap();
        assert_eq!(persisted.policy, expected);

        state.control.shutdown().await;
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn sketch_reflects_live_policy() {
        let (state, dir) = state("sketch");
        let app = build_router(state.clone());

        let response = app
            .oneshot(request("GET", "/api/sketch", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("t >= 27"));
        assert!(text.contains("delay(2000);"));

        state.control.shutdown().await;
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn contact_with_empty_name_is_accepted_and_listed() {
        let (state, dir) = state("contact");
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/contact",
                r#"{"name":"","email":"x@example.com","message":"hi"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("GET", "/api/contacts", ""))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body[0]["name"], "");
        assert_eq!(body[0]["message"], "hi");

        let response = app
            .oneshot(request("GET", "/api/contact/status", ""))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["notice"]["kind"], "success");
        assert_eq!(body["inFlight"], false);

        state.control.shutdown().await;
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_contacts_all_reach_disk() {
        let (state, dir) = state("contact-race");
        let app = build_router(state.clone());

        let mut posts = Vec::new();
        for i in 0..32 {
            let app = app.clone();
            posts.push(tokio::spawn(async move {
                let body = format!(r#"{{"name":"n{i}","email":"e{i}@example.com","message":"m"}}"#);
                app.oneshot(request("POST", "/api/contact", &body))
                    .await
                    .unwrap()
                    .status()
            }));
        }
        for post in posts {
            assert_eq!(post.await.unwrap(), StatusCode::OK);
        }

        let on_disk = state.store.load_contacts().await.unwrap();
        assert_eq!(on_disk.len(), 32);
        assert_eq!(on_disk.len(), state.contacts.list().unwrap().len());

        state.control.shutdown().await;
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn contact_status_reports_in_flight_submission() {
        let (state, dir) = state("contact-in-flight");
        let app = build_router(state.clone());

        let guard = state.store.hold().await;
        let post = tokio::spawn(app.clone().oneshot(request(
            "POST",
            "/api/contact",
            r#"{"name":"n","email":"e","message":"m"}"#,
        )));

        let mut seen_in_flight = false;
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(request("GET", "/api/contact/status", ""))
                .await
                .unwrap();
            if body_json(response).await["inFlight"] == true {
                seen_in_flight = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(seen_in_flight);

        drop(guard);
        assert_eq!(post.await.unwrap().unwrap().status(), StatusCode::OK);

        let response = app
            .oneshot(request("GET", "/api/contact/status", ""))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["inFlight"], false);
        assert_eq!(body["notice"]["kind"], "success");

        state.control.shutdown().await;
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
