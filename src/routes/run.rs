use actix_web::{HttpResponse, Responder, post, web};
use serde::{Deserialize, Serialize};

use super::{ErrorResponse, ErrorResponseWithMessage, MAX_CODE_BYTES, MAX_TIME_LIMIT};
use crate::executor::{CodeRunner, Executor, RunOutcome, RunRequest, RunResult};

/// Ad-hoc "run code" request from the web layer
#[derive(Serialize, Deserialize, Debug)]
pub struct RunCodeRequest {
    pub language: String,
    pub code: String,
    pub input: String,
    pub time_limit: f64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RunCodeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<String>,
}

impl From<RunResult> for RunCodeResponse {
    fn from(result: RunResult) -> Self {
        if result.outcome == RunOutcome::Success {
            Self {
                success: true,
                output: Some(result.stdout),
                error: None,
                error_type: None,
                execution_time: Some(format!("{:.3}s", result.elapsed.as_secs_f64())),
            }
        } else {
            Self {
                success: false,
                output: None,
                error: Some(result.error),
                error_type: Some(result.outcome.error_type().to_string()),
                execution_time: None,
            }
        }
    }
}

#[post("/run")]
pub async fn run_code_handler(
    executor: web::Data<Executor>,
    body: web::Json<RunCodeRequest>,
) -> impl Responder {
    if body.code.len() > MAX_CODE_BYTES {
        return HttpResponse::BadRequest().json(ErrorResponseWithMessage {
            reason: "ERR_INVALID_ARGUMENT",
            code: 1,
            message: format!("Source code exceeds {MAX_CODE_BYTES} bytes"),
        });
    }
    if !body.time_limit.is_finite() || body.time_limit <= 0.0 || body.time_limit > MAX_TIME_LIMIT {
        return HttpResponse::BadRequest().json(ErrorResponseWithMessage {
            reason: "ERR_INVALID_ARGUMENT",
            code: 1,
            message: format!("Time limit must be in (0, {MAX_TIME_LIMIT}] seconds"),
        });
    }

    let request = RunRequest {
        language: body.language.clone(),
        code: body.code.clone(),
        stdin: body.input.clone(),
        time_limit: body.time_limit,
    };

    // The executor blocks for the duration of the run
    match web::block(move || executor.run(&request)).await {
        Ok(result) => HttpResponse::Ok().json(RunCodeResponse::from(result)),
        Err(e) => {
            log::error!("Run task failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_INTERNAL",
                code: 6,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::LocalBackend;
    use actix_web::{App, test};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn run_request(language: &str, code: &str, input: &str, time_limit: f64) -> RunCodeRequest {
        RunCodeRequest {
            language: language.to_string(),
            code: code.to_string(),
            input: input.to_string(),
            time_limit,
        }
    }

    #[actix_web::test]
    async fn test_run_endpoint_dispatches_to_the_executor() {
        let executor = web::Data::new(Executor::new(Arc::new(LocalBackend::new()), 262144));
        let app =
            test::init_service(App::new().app_data(executor).service(run_code_handler)).await;

        // Empty stdin is rejected by the executor itself, so the response
        // proves the request went through the full run path
        let req = test::TestRequest::post()
            .uri("/run")
            .set_json(run_request("python", "print(1)", "", 5.0))
            .to_request();
        let response: RunCodeResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!response.success);
        assert_eq!(response.error_type.as_deref(), Some("invalid_input"));
        assert_eq!(
            response.error.as_deref(),
            Some("Invalid test case: no input provided")
        );
    }

    #[actix_web::test]
    async fn test_run_endpoint_rejects_out_of_range_time_limits() {
        let executor = web::Data::new(Executor::new(Arc::new(LocalBackend::new()), 262144));
        let app =
            test::init_service(App::new().app_data(executor).service(run_code_handler)).await;

        for time_limit in [0.0, -1.0, 61.0] {
            let req = test::TestRequest::post()
                .uri("/run")
                .set_json(run_request("python", "print(1)", "1\n", time_limit))
                .to_request();
            let response = test::call_service(&app, req).await;
            assert_eq!(response.status(), actix_web::http::StatusCode::BAD_REQUEST);
        }
    }
}
