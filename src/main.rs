use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use pharma_coverage::config::AppConfig;
use pharma_coverage::error::AppError;
use pharma_coverage::telemetry;
use pharma_coverage::workflows::scheduling::{
    scheduling_router, ConfirmationMode, ConflictReconciler, DispatcherBuilder, EmailMessage,
    EmailRelay, EmailTransport, JobDispatcher, JobKind, MemoryApplicationStore, MemoryDirectory,
    MemoryShiftStore, NotificationSink, NotifyError, PharmacistContact, PharmacistId,
    PharmacyContact, PharmacyDecision, PharmacyId, RetryPolicy, ShiftBoardService, ShiftDraft,
    TimeWindow, Urgency,
};

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Pharma Coverage",
    about = "Match pharmacy coverage shifts with relief pharmacists",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run a scripted apply/accept/reconcile scenario against in-memory stores
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

/// Push channel adapter that writes events to the log; a real deployment
/// plugs a websocket fan-out in here.
struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn publish(&self, channel: &str, event: &str, payload: Value) -> Result<(), NotifyError> {
        info!(channel, event, %payload, "push event");
        Ok(())
    }
}

/// Mail adapter that logs instead of delivering.
struct LogEmailTransport;

impl EmailTransport for LogEmailTransport {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        info!(to = %message.to, subject = %message.subject, "outbound e-mail");
        Ok(())
    }
}

struct Backend {
    service: Arc<ShiftBoardService<MemoryShiftStore, MemoryApplicationStore>>,
    dispatcher: Arc<JobDispatcher>,
    directory: Arc<MemoryDirectory>,
}

fn build_backend(retry: RetryPolicy, workers: usize) -> Backend {
    let shifts = Arc::new(MemoryShiftStore::default());
    let applications = Arc::new(MemoryApplicationStore::default());
    let directory = Arc::new(MemoryDirectory::default());
    let notifications: Arc<dyn NotificationSink> = Arc::new(LogNotificationSink);

    let reconciler = Arc::new(ConflictReconciler::new(
        shifts.clone(),
        applications.clone(),
        notifications.clone(),
    ));
    let dispatcher = Arc::new(
        DispatcherBuilder::new()
            .retry(retry)
            .workers(workers)
            .register(JobKind::ConflictDetection, reconciler)
            .register(
                JobKind::NotificationEmail,
                Arc::new(EmailRelay::new(Arc::new(LogEmailTransport))),
            )
            .spawn(),
    );

    let service = Arc::new(ShiftBoardService::new(
        shifts,
        applications,
        directory.clone(),
        dispatcher.clone(),
        notifications,
    ));

    Backend {
        service,
        dispatcher,
        directory,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo().await,
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let backend = build_backend(
        RetryPolicy {
            max_attempts: config.queue.max_attempts,
        },
        config.queue.workers,
    );

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(scheduling_router(backend.service.clone()))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "pharma coverage service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Walk the core flow end to end: two overlapping auto-confirm shifts, one
/// application each, a pharmacy acceptance, and the asynchronous withdrawal
/// of the conflicting sibling.
async fn run_demo() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let Backend {
        service,
        dispatcher,
        directory,
    } = build_backend(RetryPolicy::default(), 1);

    let pharmacy = PharmacyId("pharmacy-demo".to_string());
    let rival = PharmacyId("pharmacy-rival".to_string());
    let pharmacist = PharmacistId("pharmacist-demo".to_string());
    directory.add_pharmacy(
        pharmacy.clone(),
        PharmacyContact {
            name: "Demo Pharmacy".to_string(),
            email: "ops@demo-pharmacy.example".to_string(),
        },
    );
    directory.add_pharmacy(
        rival.clone(),
        PharmacyContact {
            name: "Rival Pharmacy".to_string(),
            email: "ops@rival-pharmacy.example".to_string(),
        },
    );
    directory.add_pharmacist(
        pharmacist.clone(),
        PharmacistContact {
            name: "Dana Demo".to_string(),
            email: "dana@example.com".to_string(),
            license_number: "RX-0001".to_string(),
        },
    );

    let date = NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid demo date");
    let now = Utc
        .with_ymd_and_hms(2026, 9, 1, 8, 0, 0)
        .single()
        .expect("valid demo clock");
    let window = |start_hour: u32, end_hour: u32| TimeWindow {
        start: Utc
            .with_ymd_and_hms(2026, 9, 14, start_hour, 0, 0)
            .single()
            .expect("valid window start"),
        end: Utc
            .with_ymd_and_hms(2026, 9, 14, end_hour, 0, 0)
            .single()
            .expect("valid window end"),
    };
    let draft = |window: TimeWindow| ShiftDraft {
        date,
        window,
        hourly_rate: 65,
        confirmation: ConfirmationMode::AutoConfirm,
        urgency: Urgency::Normal,
        description: String::new(),
        max_applicants: 0,
    };

    let morning = service
        .post_shift(&pharmacy, draft(window(9, 12)), now)
        .expect("demo shift posts");
    let late_morning = service
        .post_shift(&rival, draft(window(10, 13)), now)
        .expect("demo shift posts");

    let first = service
        .apply(&pharmacist, &morning.id, "happy to cover")
        .expect("demo apply succeeds");
    let second = service
        .apply(&pharmacist, &late_morning.id, "backup option")
        .expect("demo apply succeeds");
    println!(
        "applied to {} and {} ({} + {})",
        morning.id.0, late_morning.id.0, first.id.0, second.id.0
    );

    let accepted = service
        .decide(&pharmacy, &first.id, PharmacyDecision::Accept)
        .expect("demo accept succeeds");
    println!(
        "pharmacy accepted {} -> {}",
        accepted.id.0,
        accepted.status.label()
    );

    dispatcher.drain().await;
    let sibling = service
        .applicants(&rival, &late_morning.id)
        .expect("demo applicants")
        .into_iter()
        .find(|application| application.id == second.id)
        .expect("sibling application present");
    println!(
        "after reconciliation, overlapping application {} is {}",
        sibling.id.0,
        sibling.status.label()
    );

    Ok(())
}
