use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use tokio::sync::oneshot;

use super::{ErrorResponse, ErrorResponseWithMessage, MAX_CODE_BYTES};
use crate::config::JudgeConfig;
use crate::database as db;
use crate::judge::SubmissionRecord;
use crate::languages::Language;
use crate::queue::{JobQueue, JudgeMessage};

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmissionRequest {
    pub user_id: i64,
    pub problem_id: i64,
    pub code: String,
    pub language: String,
}

#[post("/submissions")]
pub async fn post_submission_handler(
    job_queue: web::Data<JobQueue>,
    pool: web::Data<SqlitePool>,
    judge_config: web::Data<JudgeConfig>,
    body: web::Json<SubmissionRequest>,
) -> impl Responder {
    if body.code.len() > MAX_CODE_BYTES {
        return HttpResponse::BadRequest().json(ErrorResponseWithMessage {
            reason: "ERR_INVALID_ARGUMENT",
            code: 1,
            message: format!("Source code exceeds {MAX_CODE_BYTES} bytes"),
        });
    }

    if Language::from_tag(&body.language).is_none() {
        return HttpResponse::NotFound().json(ErrorResponse {
            reason: "ERR_NOT_FOUND",
            code: 3,
        });
    }

    let user_exists = match db::find_user(body.user_id, pool.clone().into_inner()).await {
        Ok(exists) => exists,
        Err(e) => {
            log::error!("Failed to check user existence: {e}");
            return HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_EXTERNAL",
                code: 5,
            });
        }
    };

    let problem_exists = match db::problem_time_limit(body.problem_id, pool.clone().into_inner()).await
    {
        Ok(limit) => limit.is_some(),
        Err(e) => {
            log::error!("Failed to check problem existence: {e}");
            return HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_EXTERNAL",
                code: 5,
            });
        }
    };

    if !user_exists || !problem_exists {
        return HttpResponse::NotFound().json(ErrorResponse {
            reason: "ERR_NOT_FOUND",
            code: 3,
        });
    }

    let submission_id = match db::create_submission(
        body.user_id,
        body.problem_id,
        &body.code,
        &body.language,
        pool.clone().into_inner(),
    )
    .await
    {
        Ok(id) => {
            log::info!("Inserted submission {id} into database");
            id
        }
        Err(e) => {
            log::error!("Failed to insert submission into database: {e}");
            return HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_EXTERNAL",
                code: 5,
            });
        }
    };

    if judge_config.blocking {
        let (tx, rx) = oneshot::channel::<SubmissionRecord>();
        let job_message = JudgeMessage::Blocking {
            submission_id,
            responder: tx,
        };

        job_queue.push(job_message).await;
        log::debug!("Sent blocking submission {submission_id} to queue");

        match rx.await {
            Ok(judged) => {
                log::info!("Received final verdict of blocking submission {}", judged.id);
                HttpResponse::Ok().json(judged)
            }
            Err(e) => {
                log::error!("Failed to receive judged submission: {e}");
                HttpResponse::InternalServerError().json(ErrorResponse {
                    reason: "ERR_INTERNAL",
                    code: 6,
                })
            }
        }
    } else {
        job_queue
            .push(JudgeMessage::FireAndForget { submission_id })
            .await;
        log::debug!("Sent non-blocking submission {submission_id} to queue");

        match db::fetch_submission(submission_id, pool.into_inner()).await {
            Ok(Some(pending)) => HttpResponse::Ok().json(pending),
            _ => HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_EXTERNAL",
                code: 5,
            }),
        }
    }
}

#[get("/submissions/{id}")]
pub async fn get_submission_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> impl Responder {
    let submission_id = path.into_inner();

    match db::fetch_submission(submission_id, pool.into_inner()).await {
        Ok(Some(submission)) => HttpResponse::Ok().json(submission),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            reason: "ERR_NOT_FOUND",
            code: 3,
        }),
        Err(e) => {
            log::error!("Failed to fetch submission {submission_id}: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_EXTERNAL",
                code: 5,
            })
        }
    }
}
