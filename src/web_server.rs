use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware, web};
use sqlx::sqlite::SqlitePool;

use crate::config::{JudgeConfig, ServerConfig};
use crate::executor::Executor;
use crate::queue::JobQueue;
use crate::routes::{
    get_submission_handler, json_error_handler, post_submission_handler, query_error_handler,
    run_code_handler,
};

pub fn build_server(
    server_config: ServerConfig,
    judge_config: JudgeConfig,
    executor: Arc<Executor>,
    db_pool: Arc<SqlitePool>,
    job_queue: Arc<JobQueue>,
) -> std::io::Result<Server> {
    let db_pool = web::Data::from(db_pool);
    let job_queue = web::Data::from(job_queue);
    let executor = web::Data::from(executor);
    let judge_config = web::Data::new(judge_config);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(db_pool.clone())
            .app_data(job_queue.clone())
            .app_data(executor.clone())
            .app_data(judge_config.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .wrap(middleware::Logger::default())
            .service(run_code_handler)
            .service(post_submission_handler)
            .service(get_submission_handler)
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(12345),
    ))?
    .run();

    Ok(server)
}
