use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use http::{Request, header};
use restroute::{
    DispatchOutcome, Dispatcher, RouteTable,
    adapters::describe_request,
    config::{
        DispatchConfig, DispatchConfigValidator, build_route_table, loader::load_config,
        placeholder_filters,
    },
    tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Commands,

    /// Log output format
    #[clap(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Log filter directive, e.g. `info` or `restroute=debug`
    #[clap(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "restroute.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "restroute.toml")]
        config: String,
    },
    /// Print the compiled route table
    Routes {
        #[clap(short, long, default_value = "restroute.toml")]
        config: String,
    },
    /// Run one request through the route checks
    Match {
        #[clap(short, long, default_value = "restroute.toml")]
        config: String,
        /// HTTP method, e.g. GET
        method: String,
        /// Request path, including base path and version if configured
        path: String,
        /// Client IP address
        #[clap(long)]
        ip: Option<String>,
        /// Accept header value
        #[clap(long)]
        accept: Option<String>,
        /// Treat the request as received over HTTPS
        #[clap(long)]
        https: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    tracing_setup::init_tracing_with_config(
        &args.log_level,
        args.log_format == LogFormat::Json,
        false,
    )
    .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    match args.command {
        Commands::Validate { config } => validate_config_command(&config).await,
        Commands::Init { config } => init_config_command(&config).await,
        Commands::Routes { config } => routes_command(&config).await,
        Commands::Match {
            config,
            method,
            path,
            ip,
            accept,
            https,
        } => match_command(&config, &method, &path, ip, accept, https).await,
    }
}

/// Load, validate and build the route table of a configuration file.
async fn load_table(config_path: &str) -> Result<(DispatchConfig, RouteTable)> {
    let config = load_config(config_path)
        .await
        .wrap_err_with(|| format!("Failed to load configuration from {config_path}"))?;
    DispatchConfigValidator::validate(&config).wrap_err("Configuration validation failed")?;

    let table = build_route_table(&config, placeholder_filters(&config.filters))
        .wrap_err("Failed to build route table")?;
    Ok((config, table))
}

/// Validate a configuration file
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    // First check if file exists and is readable
    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    // Try to parse the configuration
    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    // Validate the configuration
    if let Err(e) = DispatchConfigValidator::validate(&config) {
        eprintln!("❌ Configuration validation failed:");
        eprintln!("{e}");
        println!();
        println!("💡 Common fixes:");
        println!("   • Controller prefixes use letters, digits, '_' and '-' separated by '/'");
        println!("   • Methods must be one of GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS");
        println!("   • A policy may set ip_allow or ip_deny, not both");
        println!("   • Every filter a policy names must be listed under `filters`");
        std::process::exit(1);
    }
    println!("✅ Configuration validation: OK");

    let table = build_route_table(&config, placeholder_filters(&config.filters))
        .wrap_err("Failed to build route table")?;
    let compiled = table.freeze();
    let conflicts = table.diagnose();

    println!();
    println!("📋 Configuration Summary:");
    println!("   • Controllers: {}", compiled.controllers.len());
    println!("   • Routes: {}", compiled.route_count());
    println!("   • Route cache: {}", config.cache_active());
    println!("   • Filters: {}", config.filters.len());
    println!();

    if conflicts.is_empty() {
        println!("🎉 Configuration is valid and ready to use!");
    } else {
        println!("⚠️  {} ambiguous route pair(s) found:", conflicts.len());
        for conflict in &conflicts {
            println!("   • {conflict}");
        }
        println!();
        println!("   Earlier registrations win; reorder or constrain the routes if that is not intended.");
    }
    Ok(())
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# restroute dispatch configuration

# Mount point and optional version segment stripped from request paths
base_path = "/api"
version = "v1"

# Development mode disables the compiled route cache
debug = false

# Take client IP and scheme from X-Forwarded-* headers
trust_forwarded = false

# Filters provided by the application; policies may only name these
filters = ["auth"]

# Root policy inherited by every controller
[defaults]
content_types = ["application/json"]

[cache]
enabled = true
dir = ".restroute"
ttl = "1h"

[[controllers]]
name = "users"
prefix = "users"

[controllers.policy]
filters = ["auth"]

[[controllers.actions]]
name = "list"
method = "GET"
uri = ""

[[controllers.actions]]
name = "show"
method = "GET"
uri = "<id>"
parameters = { id = '\d+' }

# Example: restrict an action to an internal network over HTTPS
# [[controllers.actions]]
# name = "remove"
# method = "DELETE"
# uri = "<id>"
# policy = { https_only = true, ip_allow = ["10.0.0.0/8"] }
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'restroute validate --config {config_path}' to check it");
    Ok(())
}

/// Print every compiled route in match order
async fn routes_command(config_path: &str) -> Result<()> {
    let (_, table) = load_table(config_path).await?;
    let compiled = table.freeze();

    for (controller, action) in compiled.routes() {
        let policy = &action.policy;
        let mut notes = vec![policy.allowed_content_types.join(",")];
        if policy.https_only {
            notes.push("https".to_string());
        }
        if !policy.ip_allow.is_empty() {
            notes.push(format!("allow={}", join(&policy.ip_allow)));
        }
        if !policy.ip_deny.is_empty() {
            notes.push(format!("deny={}", join(&policy.ip_deny)));
        }
        if !policy.filters.is_empty() {
            notes.push(format!("filters={}", policy.filters.join(",")));
        }

        println!(
            "{:<8} /{:<40} {}::{}  [{}]",
            action.method.as_str(),
            controller.full_path(action),
            controller.name,
            action.name,
            notes.join(" ")
        );
    }

    for conflict in table.diagnose() {
        println!("⚠️  {conflict}");
    }
    Ok(())
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Resolve a single request against the configured routes
async fn match_command(
    config_path: &str,
    method: &str,
    path: &str,
    ip: Option<String>,
    accept: Option<String>,
    https: bool,
) -> Result<()> {
    let (config, table) = load_table(config_path).await?;
    let dispatcher = Dispatcher::new(table.freeze(), table.filters());

    let scheme = if https { "https" } else { "http" };
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("{scheme}://localhost/{}", path.trim_start_matches('/')));
    if let Some(accept) = &accept {
        builder = builder.header(header::ACCEPT, accept);
    }
    let request = builder.body(()).wrap_err("Invalid request")?;

    let mut descriptor = describe_request(&request, None, &config.path_options());
    if let Some(ip) = ip {
        descriptor = descriptor.with_client_ip(ip);
    }

    let span = tracing_setup::create_dispatch_span(&descriptor.method, &descriptor.path);
    let _enter = span.enter();

    let outcome = dispatcher.resolve(&descriptor);
    span.record("http.status_code", outcome.status().as_u16());
    match &outcome {
        DispatchOutcome::Routed {
            route,
            content_type,
        } => {
            span.record("route.controller", route.controller);
            span.record("route.action", route.action);
            println!("✅ {}::{} ({content_type})", route.controller, route.action);
            if !route.parameters.is_empty() {
                println!("   parameters: {}", route.parameters.join(", "));
            }
        }
        DispatchOutcome::NotFound => println!("❌ 404 no route for {} /{}", descriptor.method, descriptor.path),
        DispatchOutcome::HttpsRequired => println!("❌ 403 route requires HTTPS"),
        DispatchOutcome::Forbidden => println!("❌ 403 client '{}' is not allowed", descriptor.client_ip),
        DispatchOutcome::NotAcceptable => println!("❌ 406 none of {:?} can be produced", descriptor.accept),
        DispatchOutcome::Rejected(rejection) => println!("❌ rejected by filter: {rejection}"),
    }
    Ok(())
}
