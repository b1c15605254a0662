use crate::capacity;
use crate::data::{CapacityInput, PrecheckOutput, TimetableInput, TimetableOutput};
use crate::error::ConfigError;
use crate::solver;
use axum::{Json, Router, http::StatusCode, routing::post};
use log::{error, info};

type HandlerError = (StatusCode, String);

/// Runs a blocking solve off the async workers.
async fn blocking<I, O>(
    input: I,
    f: fn(&I) -> Result<O, ConfigError>,
) -> Result<Json<O>, HandlerError>
where
    I: Send + 'static,
    O: Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&input)).await {
        Ok(Ok(output)) => Ok(Json(output)),
        Ok(Err(e)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            error!("solve task failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "solve task failed".to_string()))
        }
    }
}

async fn solve_handler(
    Json(input): Json<TimetableInput>,
) -> Result<Json<TimetableOutput>, HandlerError> {
    blocking(input, solver::solve).await
}

async fn precheck_handler(
    Json(input): Json<TimetableInput>,
) -> Result<Json<PrecheckOutput>, HandlerError> {
    blocking(input, solver::precheck).await
}

async fn capacity_handler(
    Json(input): Json<CapacityInput>,
) -> Result<Json<TimetableOutput>, HandlerError> {
    blocking(input, capacity::solve).await
}

pub fn router() -> Router {
    Router::new()
        .route("/v1/timetable/solve", post(solve_handler))
        .route("/v1/timetable/precheck", post(precheck_handler))
        .route("/v1/timetable/capacity", post(capacity_handler))
}

pub async fn run_server(addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SolveStatus;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn post_json(uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_solve_route() {
        let (status, body) = post_json(
            "/v1/timetable/solve",
            json!({
                "teachers": {
                    "A": { "subjects": ["Math"] },
                    "B": { "subjects": ["Math"] }
                },
                "numClasses": 2,
                "numPeriods": 2,
                "solver": { "timeBudgetSecs": 20, "workers": 2 }
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let out: TimetableOutput = serde_json::from_slice(&body).unwrap();
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_eq!(out.stats.backend, "search");
        assert!(out.grid.iter().flatten().flatten().all(Option::is_some));
    }

    #[tokio::test]
    async fn test_precheck_route() {
        let (status, body) = post_json(
            "/v1/timetable/precheck",
            json!({
                "teachers": {
                    "A": { "subjects": ["Math"] },
                    "B": { "subjects": ["Art"] }
                },
                "numClasses": 3,
                "numPeriods": 9
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["passed"], json!(false));
        assert_eq!(value["diagnostic"]["kind"], json!("insufficientTeachers"));
        assert_eq!(value["diagnostic"]["minTeachers"], json!(3));
    }

    #[tokio::test]
    async fn test_capacity_route() {
        let (status, body) = post_json(
            "/v1/timetable/capacity",
            json!({ "numClasses": 1, "numPeriods": 2, "numTeachers": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let out: TimetableOutput = serde_json::from_slice(&body).unwrap();
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_eq!(out.grid[0][0], vec![Some("T0".to_string()); 2]);
    }

    #[tokio::test]
    async fn test_config_error_is_bad_request() {
        let (status, body) = post_json(
            "/v1/timetable/solve",
            json!({
                "teachers": { "A": { "subjects": ["Math"] } },
                "numClasses": 1,
                "numPeriods": 2,
                "requiredSubjects": ["Art"]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = String::from_utf8(body).unwrap();
        assert!(message.contains("'Art'"));
        assert!(message.contains("add a teacher"));
    }
}
