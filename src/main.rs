use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use shopscout::{
    batch_scrape::{self, BatchProgress, BatchReport, LIVE_TAIL_LINES},
    cookies,
    core::config::{clamp_workers, load_scout_config},
    scheduler::{self, Clock, IstClock, RunOutcome},
    types::*,
    AppState,
};

const USAGE: &str = "\
usage:
  shopscout scrape <URL>... [--workers N] [--cookies FILE] [--csv FILE]
  shopscout run-now
  shopscout serve [--port P]";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Scrape {
        urls: Vec<String>,
        workers: Option<usize>,
        cookies: Option<PathBuf>,
        csv: Option<PathBuf>,
    },
    RunNow,
    Serve {
        port: Option<u16>,
    },
}

fn flag_value<'a>(
    flag: &str,
    arg: &'a str,
    rest: &mut impl Iterator<Item = &'a String>,
) -> anyhow::Result<Option<&'a str>> {
    if arg == flag {
        return rest
            .next()
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| anyhow::anyhow!("{} needs a value", flag));
    }
    Ok(arg
        .strip_prefix(flag)
        .and_then(|r| r.strip_prefix('=')))
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter();
    let sub = it.next().map(String::as_str).unwrap_or("serve");
    match sub {
        "scrape" => {
            let mut urls = Vec::new();
            let mut workers = None;
            let mut cookies = None;
            let mut csv = None;
            while let Some(a) = it.next() {
                if let Some(v) = flag_value("--workers", a, &mut it)? {
                    workers = Some(
                        v.parse::<usize>()
                            .map_err(|_| anyhow::anyhow!("invalid --workers value: {}", v))?,
                    );
                } else if let Some(v) = flag_value("--cookies", a, &mut it)? {
                    cookies = Some(PathBuf::from(v));
                } else if let Some(v) = flag_value("--csv", a, &mut it)? {
                    csv = Some(PathBuf::from(v));
                } else if a.starts_with("--") {
                    anyhow::bail!("unknown flag: {}\n{}", a, USAGE);
                } else {
                    urls.push(a.clone());
                }
            }
            if urls.iter().all(|u| u.trim().is_empty()) {
                anyhow::bail!("scrape needs at least one URL\n{}", USAGE);
            }
            Ok(Command::Scrape {
                urls,
                workers,
                cookies,
                csv,
            })
        }
        "run-now" => Ok(Command::RunNow),
        "serve" => {
            let mut port = None;
            while let Some(a) = it.next() {
                if let Some(v) = flag_value("--port", a, &mut it)? {
                    port = Some(
                        v.parse::<u16>()
                            .map_err(|_| anyhow::anyhow!("invalid --port value: {}", v))?,
                    );
                }
            }
            Ok(Command::Serve { port })
        }
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            std::process::exit(0);
        }
        other => anyhow::bail!("unknown command: {}\n{}", other, USAGE),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_args(&args)?;

    // Create HTTP client
    let http_timeout = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(http_timeout))
        .build()?;

    let state = Arc::new(AppState::new(http_client, load_scout_config()));

    match command {
        Command::Scrape {
            urls,
            workers,
            cookies,
            csv,
        } => run_manual(&state, urls, workers, cookies, csv).await,
        Command::RunNow => match scheduler::run_if_idle(&state, &IstClock).await {
            RunOutcome::Finished(summary) => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(())
            }
            RunOutcome::Aborted => anyhow::bail!("scheduled job aborted: sheet fetch failed"),
            RunOutcome::Busy => anyhow::bail!("scheduled job already running"),
            RunOutcome::Unavailable(why) => anyhow::bail!("scheduled job unavailable: {}", why),
        },
        Command::Serve { port } => serve(state, port).await,
    }
}

async fn run_manual(
    state: &Arc<AppState>,
    urls: Vec<String>,
    workers: Option<usize>,
    cookie_file: Option<PathBuf>,
    csv_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let launcher = state
        .launcher
        .clone()
        .ok_or_else(|| anyhow::anyhow!("no Chromium-family browser found; set CHROME_EXECUTABLE"))?;
    let cookies = match cookie_file {
        Some(path) => cookies::load_cookie_file(&path)?,
        None => Vec::new(),
    };
    let workers = workers
        .map(clamp_workers)
        .unwrap_or_else(|| state.config.resolve_workers());

    let report = batch_scrape::scrape_batch(
        launcher,
        urls,
        cookies,
        workers,
        |report: &BatchReport, progress: BatchProgress| {
            info!("progress {}/{} ({} rows)", progress.completed, progress.total, report.rows.len());
        },
    )
    .await;

    eprintln!("{}", report.tail(LIVE_TAIL_LINES));
    println!("Done! Found {} row(s).", report.rows.len());

    match csv_path {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))?;
            batch_scrape::write_csv(&report.rows, file)?;
            println!("CSV written to {}", path.display());
        }
        None => batch_scrape::write_csv(&report.rows, std::io::stdout())?,
    }
    Ok(())
}

async fn serve(state: Arc<AppState>, port: Option<u16>) -> anyhow::Result<()> {
    tokio::spawn(scheduler::run_scheduler(state.clone()));

    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/cron/status", get(cron_status_handler))
        .route("/cron/run", post(cron_run_handler))
        .route("/scrape", post(scrape_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let port = port.unwrap_or_else(|| state.config.resolve_port());
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/SHOPSCOUT_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("shopscout listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn error_response(status: StatusCode, error: String) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error }))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "shopscout",
        "version": env!("CARGO_PKG_VERSION"),
        "browser_available": state.launcher.is_some(),
        "sheets_configured": state.sheets.is_some()
    }))
}

async fn cron_status_handler(State(state): State<Arc<AppState>>) -> Json<CronStatusResponse> {
    let next = scheduler::next_fire_after(IstClock.now());
    Json(CronStatusResponse {
        last_status: state.heartbeat.read().await,
        running: state.cron_running(),
        next_run: next.format("%Y-%m-%d %H:%M:%S %:z").to_string(),
    })
}

async fn cron_run_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CronRunResponse>, (StatusCode, Json<ErrorResponse>)> {
    match scheduler::run_if_idle(&state, &IstClock).await {
        RunOutcome::Finished(summary) => Ok(Json(CronRunResponse {
            outcome: "finished".into(),
            summary: Some(summary),
        })),
        RunOutcome::Aborted => Ok(Json(CronRunResponse {
            outcome: "aborted".into(),
            summary: None,
        })),
        RunOutcome::Busy => Err(error_response(
            StatusCode::CONFLICT,
            "scheduled job already running".into(),
        )),
        RunOutcome::Unavailable(why) => {
            Err(error_response(StatusCode::SERVICE_UNAVAILABLE, why))
        }
    }
}

async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScrapeBatchRequest>,
) -> Result<Json<ScrapeBatchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let launcher = state.launcher.clone().ok_or_else(|| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no Chromium-family browser found".into(),
        )
    })?;

    let total_urls = request.urls.iter().filter(|u| !u.trim().is_empty()).count();
    if total_urls == 0 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "urls must contain at least one non-empty URL".into(),
        ));
    }

    let cookies = request
        .cookies
        .as_deref()
        .map(cookies::to_cookie_params)
        .unwrap_or_default();
    let workers = request
        .workers
        .map(clamp_workers)
        .unwrap_or_else(|| state.config.resolve_workers());
    let batch_id = uuid::Uuid::new_v4().to_string();
    info!("batch {}: {} URLs, {} workers", batch_id, total_urls, workers);

    let report =
        batch_scrape::scrape_batch(launcher, request.urls, cookies, workers, |_, _| {}).await;
    if report.rows.is_empty() {
        error!("batch {} produced no rows", batch_id);
    }

    Ok(Json(ScrapeBatchResponse {
        batch_id,
        total_urls,
        log_tail: report.tail(LIVE_TAIL_LINES),
        total_duration_ms: report.total_duration_ms,
        rows: report.rows,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn no_arguments_means_serve() {
        assert_eq!(parse_args(&[]).unwrap(), Command::Serve { port: None });
    }

    #[test]
    fn scrape_collects_urls_and_flags() {
        let cmd = parse_args(&args(&[
            "scrape",
            "https://youtu.be/a",
            "--workers",
            "4",
            "https://youtu.be/b",
            "--csv=out.csv",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::Scrape {
                urls: vec!["https://youtu.be/a".into(), "https://youtu.be/b".into()],
                workers: Some(4),
                cookies: None,
                csv: Some(PathBuf::from("out.csv")),
            }
        );
    }

    #[test]
    fn scrape_without_urls_is_rejected() {
        assert!(parse_args(&args(&["scrape", "--workers", "2"])).is_err());
    }

    #[test]
    fn serve_port_flag() {
        assert_eq!(
            parse_args(&args(&["serve", "--port", "8080"])).unwrap(),
            Command::Serve { port: Some(8080) }
        );
        assert!(parse_args(&args(&["serve", "--port"])).is_err());
    }
}
