mod api;
mod cli;
mod rate_limit;
mod resource_guard;
mod resources;
mod state;
#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use aegis_adapters::AdapterRegistry;
use aegis_audit::{AuditPipeline, JsonlSink};
use aegis_authz::AuthzService;
use aegis_domain::config::{Config, ConfigSeverity, CorsConfig};
use aegis_resilience::{BackoffConfig, RetryPolicy, TimeoutPolicy};
use aegis_transport_grpc::{GrpcAdapter, GrpcResourceConfig};
use aegis_transport_http::{HttpAdapter, HttpResourceConfig};
use aegis_transport_stdio::process::{ManagedProcess, SpawnSpec};
use aegis_transport_stdio::StdioAdapter;

use cli::{Cli, Command, ConfigCommand};
use rate_limit::RateLimiter;
use resource_guard::ResourceGuardPool;
use resources::{grpc_credentials, ResourceDef, ResourcesFile};
use state::{hash_token, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let config = Arc::new(Config::load(std::path::Path::new(&cli.config)));
            let resources = ResourcesFile::load(std::path::Path::new(&cli.resources));
            run_server(config, resources).await
        }
        Some(Command::Doctor) => {
            let config = Config::load(std::path::Path::new(&cli.config));
            let passed = cli::doctor::run(&config, &cli.config, &cli.resources).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let config = Config::load(std::path::Path::new(&cli.config));
            let ok = cli::config::run(ConfigCommand::Validate, &config)?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let config = Config::load(std::path::Path::new(&cli.config));
            cli::config::run(ConfigCommand::Show, &config)?;
            Ok(())
        }
        Some(Command::Version) => {
            println!("aegis-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,aegis_gateway=debug")))
        .json()
        .init();
}

async fn run_server(config: Arc<Config>, resources: ResourcesFile) -> anyhow::Result<()> {
    tracing::info!("aegis-gateway starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let api_token_hash = config.auth.api_token.as_deref().map(hash_token);
    let admin_token_hash = config.auth.admin_token.as_deref().map(hash_token);

    // ── Adapter registry: spawn/connect every declared resource ──────
    let registry = Arc::new(AdapterRegistry::new());
    for resource in &resources.resources {
        if let Err(e) = register_resource(&registry, resource, &config).await {
            tracing::warn!(resource = resource.id(), error = %e, "failed to register resource, continuing without it");
        }
    }
    tracing::info!(count = registry.resource_count(), "adapter registry ready");

    // ── Audit pipeline ────────────────────────────────────────────────
    let fallback_sink: Arc<dyn aegis_audit::AuditSink> = Arc::new(JsonlSink::new(config.audit.local_fallback_path.clone()));
    let (audit_handle, _audit_join) = AuditPipeline::spawn(config.audit.clone(), fallback_sink);

    // Bridge AuthzService's mpsc-sender contract onto the audit queue.
    let (authz_audit_tx, mut authz_audit_rx) = tokio::sync::mpsc::channel(1024);
    {
        let audit_handle = audit_handle.clone();
        tokio::spawn(async move {
            while let Some(event) = authz_audit_rx.recv().await {
                audit_handle.publish(event).await;
            }
        });
    }

    // ── Authorization service ─────────────────────────────────────────
    let authz = Arc::new(AuthzService::new(
        &config.policy,
        &config.breaker,
        &config.retry,
        &config.cache,
        Some(authz_audit_tx),
    ));

    // ── Adapter-side resilience ────────────────────────────────────────
    let resource_guards = Arc::new(ResourceGuardPool::new(&config.breaker));
    let adapter_retry = Arc::new(
        RetryPolicy::builder()
            .max_attempts(config.retry.max_attempts)
            .backoff(BackoffConfig {
                base: Duration::from_millis(config.retry.base_delay_ms),
                max: Duration::from_millis(config.retry.max_delay_ms),
                jitter_ratio: config.retry.jitter_fraction,
            })
            .retryable_if(aegis_adapters::AdapterError::is_retryable)
            .build(),
    );
    let adapter_timeout = TimeoutPolicy::new(Duration::from_millis(config.retry.total_deadline_ms));

    let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

    // Periodically drop token buckets for principals that have gone quiet,
    // so the registry doesn't grow unbounded under a large caller population.
    {
        let rate_limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                rate_limiter.sweep_idle(Duration::from_secs(3600));
            }
        });
    }

    let state = AppState {
        config: config.clone(),
        registry,
        authz,
        audit: audit_handle,
        rate_limiter,
        resource_guards,
        adapter_retry,
        adapter_timeout,
        api_token_hash,
        admin_token_hash,
        started_at: Instant::now(),
    };

    let cors_layer = build_cors_layer(&config.server.cors);

    let governor_layer = if config.rate_limit.per_principal_rps > 0 {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(config.rate_limit.per_principal_rps as u64)
            .burst_size(config.rate_limit.burst)
            .finish()
            .expect("rate_limit: per_principal_rps and burst must be > 0");

        tracing::info!(
            requests_per_second = config.rate_limit.per_principal_rps,
            burst_size = config.rate_limit.burst,
            "per-IP rate limiting enabled (defense in depth alongside the per-principal bucket)"
        );

        Some(GovernorLayer {
            config: Arc::new(gov_config),
        })
    } else {
        tracing::info!("per-IP rate limiting disabled (rate_limit.per_principal_rps is 0)");
        None
    };

    let router = api::router(state.clone())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(config.server.concurrency_limit));
    let app = if let Some(governor) = governor_layer {
        router.layer(governor).with_state(state)
    } else {
        router.with_state(state)
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "aegis-gateway listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .await
        .context("axum server error")?;

    Ok(())
}

async fn register_resource(
    registry: &AdapterRegistry,
    resource: &ResourceDef,
    config: &Config,
) -> anyhow::Result<()> {
    match resource {
        ResourceDef::Stdio { id, command, args, env } => {
            let resource_id = format!("stdio:{id}");
            let process = ManagedProcess::new(
                SpawnSpec {
                    command: command.clone(),
                    args: args.clone(),
                    env: env.clone(),
                },
                config.stdio.clone(),
            );
            let adapter = StdioAdapter::new(resource_id.clone(), process);
            adapter.start().await.context("starting stdio subprocess")?;
            registry.register(resource_id, Arc::new(adapter));
        }
        ResourceDef::Http {
            id,
            base_url,
            discovery_url,
            bearer_token,
        } => {
            let resource_id = format!("http:{id}");
            let adapter = HttpAdapter::new(
                resource_id.clone(),
                HttpResourceConfig {
                    base_url: base_url.clone(),
                    discovery_url: discovery_url.clone(),
                    bearer_token: bearer_token.clone(),
                    ..Default::default()
                },
            )?;
            registry.register(resource_id, Arc::new(adapter));
        }
        ResourceDef::Grpc {
            id,
            endpoint,
            bearer_token,
            reflection_enabled,
        } => {
            let resource_id = format!("grpc:{id}");
            let adapter = GrpcAdapter::connect(
                resource_id.clone(),
                GrpcResourceConfig {
                    endpoint: endpoint.clone(),
                    credentials: grpc_credentials(bearer_token),
                    reflection_enabled: *reflection_enabled,
                    ..Default::default()
                },
            )
            .await?;
            registry.register(resource_id, Arc::new(adapter));
        }
    }
    Ok(())
}

/// Builds a [`CorsLayer`] from the configured allowed origins. Entries may
/// carry a trailing `:*` wildcard port (e.g. `http://localhost:*`); a
/// literal `"*"` allows every origin.
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
