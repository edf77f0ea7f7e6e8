use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::database as db;
use crate::executor::Executor;
use crate::judge::{Verdict, judge_with_retry};
use crate::queue::{JobQueue, JudgeMessage};

/// One judging worker
///
/// Workers pop jobs off the shared queue and judge them on a blocking task
/// so a slow or hanging submission never stalls ingestion of new ones. Test
/// cases within one job stay strictly sequential inside the judge itself.
pub async fn worker(
    id: u8,
    executor: Arc<Executor>,
    db_pool: Arc<SqlitePool>,
    queue: Arc<JobQueue>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    log::info!("Worker {id} initialized");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                log::info!("Worker {id} received shutdown signal, stopping");
                break;
            }

            job_message = queue.pop() => {
                let submission_id = job_message.id();

                let submission = match db::fetch_submission(submission_id, db_pool.clone()).await {
                    Ok(Some(submission)) => submission,
                    Ok(None) => {
                        log::error!("Submission {submission_id} not found, job discarded");
                        continue;
                    }
                    Err(e) => {
                        log::error!("Failed to fetch submission {submission_id}, job discarded: {e}");
                        continue;
                    }
                };
                log::info!("Worker {id} got submission {submission_id} from queue");

                let time_limit = match db::problem_time_limit(submission.problem_id, db_pool.clone()).await {
                    Ok(Some(limit)) => limit,
                    _ => {
                        log::error!(
                            "Missing problem {} for submission {submission_id}",
                            submission.problem_id
                        );
                        if let Err(e) = db::mark_judging_failure(submission_id, db_pool.clone()).await {
                            log::error!("Failed to mark submission {submission_id} as failed: {e}");
                        }
                        continue;
                    }
                };

                let test_cases = match db::fetch_test_cases(submission.problem_id, db_pool.clone()).await {
                    Ok(cases) => cases,
                    Err(e) => {
                        log::error!("Failed to load test cases for submission {submission_id}: {e}");
                        if let Err(e) = db::mark_judging_failure(submission_id, db_pool.clone()).await {
                            log::error!("Failed to mark submission {submission_id} as failed: {e}");
                        }
                        continue;
                    }
                };

                let executor_ref = Arc::clone(&executor);
                let result_handle = tokio::task::spawn_blocking(move || {
                    let mut submission = submission;
                    // Re-judging starts a fresh session from Pending
                    submission.reset_for_judging();
                    judge_with_retry(executor_ref.as_ref(), &mut submission, time_limit, &test_cases);
                    log::info!("Submission {submission_id} finished on worker {id}");

                    submission
                });

                match result_handle.await {
                    Ok(judged) => {
                        if let Err(e) = db::save_verdict(db_pool.clone(), &judged).await {
                            log::error!("Failed to save verdict for submission {submission_id}: {e}");
                        }

                        // Accepted verdicts feed the user statistics exactly once
                        if judged.status == Verdict::Accepted {
                            if let Err(e) = db::record_accepted(judged.user_id, db_pool.clone()).await {
                                log::error!("Failed to update stats for user {}: {e}", judged.user_id);
                            }
                        }

                        if let JudgeMessage::Blocking { responder, .. } = job_message {
                            if responder.send(judged).is_err() {
                                log::warn!("Failed to send blocking submission {submission_id} result back to server");
                            } else {
                                log::debug!("Blocking submission {submission_id} result sent back from worker {id}");
                            }
                        }
                    }
                    Err(e) => {
                        // The judging task panicked; the record still reaches a terminal state
                        log::error!("Judging task for submission {submission_id} failed on worker {id}: {e:?}");
                        if let Err(e) = db::mark_judging_failure(submission_id, db_pool.clone()).await {
                            log::error!("Failed to mark submission {submission_id} as failed: {e}");
                        }
                    }
                }
            }
        };
    }

    log::info!("Worker {id} has shut down gracefully");
    Ok(())
}
