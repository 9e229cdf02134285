use timetable_solver::server;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = std::env::var("SCHEDULE_SOLVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    server::run_server(&addr).await
}
