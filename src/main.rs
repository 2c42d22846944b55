//! MQTT authorization CLI
//!
//! Evaluates a topic access for a client the way a broker would with the
//! client-subtree callback registered.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sentinel_agent_mqtt_authz::config::MqttAction;
use sentinel_agent_mqtt_authz::permission::AuthorizationRequest;
use sentinel_agent_mqtt_authz::{
    AuthorizationCallback, AuthorizationPlugin, AuthzConfig, CallbackRegistry, ClientData,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Activity {
    Publish,
    Subscribe,
}

impl From<Activity> for MqttAction {
    fn from(activity: Activity) -> Self {
        match activity {
            Activity::Publish => MqttAction::Publish,
            Activity::Subscribe => MqttAction::Subscribe,
        }
    }
}

/// Client-subtree MQTT authorization check
#[derive(Parser, Debug)]
#[command(name = "mqtt-authz")]
#[command(author = "Sentinel Contributors")]
#[command(version)]
#[command(about = "Evaluate MQTT topic authorization for a client", long_about = None)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Client identifier presented in CONNECT
    #[arg(long)]
    client_id: String,

    /// Username presented in CONNECT
    #[arg(long)]
    username: Option<String>,

    /// Topic name (publish) or topic filter (subscribe)
    #[arg(short, long)]
    topic: String,

    /// Operation to authorize
    #[arg(short, long, value_enum, default_value = "publish")]
    activity: Activity,

    /// Requested QoS level
    #[arg(short, long, default_value_t = 0)]
    qos: u8,

    /// Repeat the check to exercise the permission cache
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting MQTT authorization check");

    // Load configuration
    let config: AuthzConfig = if let Some(config_path) = &args.config {
        info!(path = %config_path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?
    } else {
        AuthzConfig::default()
    };

    let plugin = AuthorizationPlugin::with_config(&config)?;
    let mut registry = CallbackRegistry::new(&config.pipeline);
    plugin.register(&mut registry);

    let client = ClientData {
        client_id: args.client_id.clone(),
        username: args.username.clone(),
        ..Default::default()
    };
    let request = AuthorizationRequest {
        topic: &args.topic,
        qos: args.qos,
        action: args.activity.into(),
    };

    let mut decision = registry.authorize(&client, &request);
    for attempt in 1..args.repeat {
        decision = registry.authorize(&client, &request);
        debug!(attempt, allowed = decision.allowed, "Repeated authorization check");
    }

    let callback = plugin.callback();
    let stats = callback.cache().stats();
    let output = json!({
        "client-id": client.client_id,
        "topic": request.topic,
        "action": request.action,
        "qos": request.qos,
        "allowed": decision.allowed,
        "callback": decision.callback,
        "reason": decision.reason,
        "permissions": callback.permissions_for_client(&client),
        "cache": {
            "enabled": callback.cache().is_enabled(),
            "ttl-secs": callback.cache().ttl().as_secs(),
            "hits": stats.hits,
            "misses": stats.misses,
        },
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(if decision.allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
