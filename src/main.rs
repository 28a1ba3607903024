//! mqttbind - command line front end for the MQTT binding
//!
//! Connects with a TOML client configuration and either reports health,
//! publishes one message, or prints deliveries until interrupted.

use clap::{Parser, Subcommand};
use mqtt_bind::bind::{BindingContext, FromInbound, MqttV3BindingContext, MqttV5BindingContext};
use mqtt_bind::client::MqttConnection;
use mqtt_bind::config::{ClientConfig, ProtocolVersion};
use mqtt_bind::health::{HealthCheckManager, MqttHealthCheck};
use mqtt_bind::message::{MqttMessage, MqttProperties};
use mqtt_bind::mqtt_span;
use mqtt_bind::observability::init_default_logging;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, Instrument};

/// Protocol-version-agnostic MQTT client
#[derive(Parser)]
#[command(name = "mqttbind")]
#[command(about = "MQTT 3.1.1/5 client with mutual TLS and manual acknowledgment")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "MQTTBIND_CONFIG")]
    config: PathBuf,

    /// Override the configured client identifier
    #[arg(long)]
    client_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration, connect and report health
    Check,
    /// Publish one message
    Publish {
        topic: String,
        payload: String,
        #[arg(short, long, default_value_t = 1)]
        qos: i32,
        #[arg(short, long)]
        retain: bool,
        /// MQTT 5 user property as key=value (repeatable)
        #[arg(long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },
    /// Print deliveries until Ctrl-C
    Subscribe {
        /// Topic filters
        #[arg(required = true)]
        filters: Vec<String>,
        #[arg(short, long, default_value_t = 1)]
        qos: i32,
    },
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize observability system
    init_default_logging();

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Check => run_check(config).await,
        Commands::Publish {
            topic,
            payload,
            qos,
            retain,
            properties,
        } => run_publish(config, &topic, payload, qos, retain, properties).await,
        Commands::Subscribe { filters, qos } => run_subscribe(config, filters, qos).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(cli: &Cli) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    info!("Loading configuration from: {}", cli.config.display());
    let mut config = ClientConfig::load_from_file(&cli.config)?;

    if let Some(client_id) = &cli.client_id {
        config.client_id = client_id.clone();
    } else if config.client_id.trim().is_empty() {
        config.client_id = format!("mqttbind-{}", uuid::Uuid::new_v4().simple());
        info!(client_id = %config.client_id, "Generated client identifier");
    }

    config.validate()?;
    Ok(config)
}

async fn run_check(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let connection = MqttConnection::connect(config).await?;

    let mut health = HealthCheckManager::new();
    health.add_health_check(Box::new(MqttHealthCheck::new(connection.client())));
    let results = health.run_health_checks().await;
    println!("{}", serde_json::to_string_pretty(&results)?);

    let healthy = health.calculate_overall_health().await;
    connection.disconnect().await?;
    if healthy {
        Ok(())
    } else {
        Err("MQTT client is not healthy".into())
    }
}

async fn run_publish(
    config: ClientConfig,
    topic: &str,
    payload: String,
    qos: i32,
    retain: bool,
    properties: Vec<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let protocol = config.protocol_version;
    let connection = MqttConnection::connect(config).await?;

    let mut message = MqttMessage::with_payload(payload);
    message.set_qos(qos)?;
    message.set_retained(retain)?;
    if !properties.is_empty() {
        if protocol == ProtocolVersion::V3 {
            info!("User properties are ignored on MQTT 3.1.1");
        }
        let properties = properties
            .into_iter()
            .fold(MqttProperties::new(), |props, (k, v)| props.with_user_property(k, v));
        message.set_properties(Some(properties))?;
    }

    let (tx, rx) = oneshot::channel();
    connection.publisher().publish(topic, &message, move |result| {
        let _ = tx.send(result);
    })?;
    let outcome = rx
        .instrument(mqtt_span!(operation = "publish", topic = %topic, qos))
        .await;

    connection.disconnect().await?;
    match outcome {
        Ok(result) => {
            result?;
            info!(topic = %topic, "Message published");
            Ok(())
        }
        Err(_) => Err("publish listener dropped".into()),
    }
}

async fn run_subscribe(
    config: ClientConfig,
    filters: Vec<String>,
    qos: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let protocol = config.protocol_version;
    let connection = MqttConnection::connect(config).await?;
    let filters: BTreeMap<String, i32> = filters.into_iter().map(|f| (f, qos)).collect();

    let result = match protocol {
        ProtocolVersion::V3 => print_deliveries::<MqttV3BindingContext>(&connection, &filters).await,
        ProtocolVersion::V5 => print_deliveries::<MqttV5BindingContext>(&connection, &filters).await,
    };

    connection.disconnect().await?;
    result
}

/// Subscribe, print every delivery, unsubscribe on Ctrl-C
async fn print_deliveries<C: FromInbound>(
    connection: &MqttConnection,
    filters: &BTreeMap<String, i32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = connection.subscription_manager::<C>()?;
    manager
        .subscribe(filters, |context: C| {
            println!(
                "{} [qos {}{}] {}",
                context.topic().unwrap_or_default(),
                context.qos(),
                if context.is_retained() { ", retained" } else { "" },
                String::from_utf8_lossy(context.payload())
            );
            context.acknowledge();
        })
        .instrument(mqtt_span!(operation = "subscribe", filters = filters.len()))
        .await?;
    info!("Subscribed; press Ctrl-C to stop");

    signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down gracefully...");

    manager.unsubscribe(filters.keys().cloned()).await;
    Ok(())
}
