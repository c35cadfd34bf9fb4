//! The `trestle serve` command: run the demo web service.

use console::style;

use trestle_core::service::WebService;
use trestle_types::debug::DebugFlags;

use crate::cli::ServeArgs;
use crate::demo;

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = trestle_infra::config::load_config(args.config.as_deref()).await;
    if let Some(host) = args.host {
        config.service.host = host;
    }
    if let Some(port) = args.port {
        config.service.port = port;
    }
    if let Some(impl_name) = args.impl_name {
        config.service.impl_name = impl_name;
    }
    if let Some(bits) = args.debug_flags {
        config.service.debug_flags = DebugFlags(bits);
    }
    tracing::debug!(
        host = %config.service.host,
        port = config.service.port,
        impl_name = %config.service.impl_name,
        "Resolved service config"
    );

    trestle_infra::register_builtin_impls();

    let context = demo::build_demo_context(&config)?;
    let uri = context.uris.first().cloned().unwrap_or_default();
    let mut service = WebService::new("trestle-demo", &config.service.impl_name, context);
    service.start().await?;

    println!();
    println!(
        "  {} Trestle demo service on {}",
        style("⚡").bold(),
        style(&uri).cyan()
    );
    println!(
        "  {}",
        style(format!("impl '{}'", service.impl_name())).dim()
    );
    println!(
        "  {}",
        style("Resources: /helloworld /echo /users/{name} /secrets").dim()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    shutdown_signal().await;

    service.stop().await?;
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
