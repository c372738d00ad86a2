//! Backend status and model management.

use console::style;

use paperlens::config::Config;
use paperlens::llm::{BackendKind, CapabilityState, InferenceBackend, OllamaBackend, TaskClass};
use paperlens::services::DocumentAnalyzer;

use crate::cli::style as marks;

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Show backend readiness, routing and the effective configuration.
pub async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let llm = config.llm_config();
    let analyzer = DocumentAnalyzer::from_config(&llm)?;

    println!("\n{}", style("Inference Backends").bold());
    println!("{}", "-".repeat(40));

    for (kind, detail) in [
        (
            BackendKind::OnDevice,
            format!("{} @ {}", llm.device.local_model, llm.device.local_endpoint),
        ),
        (
            BackendKind::Remote,
            format!("{} @ {}", llm.device.remote_model, llm.device.remote_endpoint),
        ),
    ] {
        let label = format!("{}:", kind.as_str());
        match analyzer.sessions().backend(kind) {
            None => println!("{:<12} {}", label, style("disabled").dim()),
            Some(backend) => {
                let state = match kind {
                    BackendKind::OnDevice => analyzer.router().prober().probe().await,
                    BackendKind::Remote => backend
                        .probe()
                        .await
                        .unwrap_or(CapabilityState::Unavailable),
                };
                println!(
                    "{:<12} {:<14} {} ({})",
                    label,
                    marks::capability(state),
                    backend.name(),
                    style(detail).dim()
                );
                if state != CapabilityState::Available {
                    println!("{:<12} {} {}", "", marks::dim_arrow(), backend.availability_hint());
                }
            }
        }
    }

    println!("\n{}", style("Routing").bold());
    println!("{}", "-".repeat(40));
    for task in TaskClass::ALL {
        let decision = analyzer.router().route(task).await;
        println!(
            "{:<22} {} {}",
            task.as_str(),
            marks::backend(decision.backend),
            style(format!("({})", decision.reason)).dim()
        );
    }

    let app = &config.llm;
    println!("\n{}", style("Configuration").bold());
    println!("{}", "-".repeat(40));
    println!(
        "{:<22} {}",
        "Config file:",
        config
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string())
    );
    println!("{:<22} {}", "Enabled:", yes_no(app.enabled));
    println!("{:<22} {}", "On-device:", yes_no(app.on_device));
    println!("{:<22} {}", "Fallback to remote:", yes_no(app.fallback_to_remote));
    println!("{:<22} {}", "Remote provider:", llm.device.remote_provider.name());
    println!(
        "{:<22} {}",
        "API key:",
        if llm.remote_configured() { "Set" } else { "Not set" }
    );
    println!("{:<22} {}", "Max tokens:", app.max_tokens);
    println!("{:<22} {:.2}", "Temperature:", app.temperature);
    println!(
        "{:<22} analysis {} / summary {} / answer {} chars",
        "Input budget:", app.analysis_max_chars, app.summary_max_chars, app.answer_max_chars
    );
    println!(
        "{:<22} {} chars",
        "On-device window:", app.on_device_context_chars
    );

    Ok(())
}

/// Download the configured on-device model.
pub async fn cmd_pull(config: &Config) -> anyhow::Result<()> {
    let llm = config.llm_config();
    let backend = OllamaBackend::new(&llm)?;

    println!(
        "{} Pulling {} from {} (this can take a while)",
        marks::dim_arrow(),
        style(backend.model()).cyan(),
        backend.endpoint()
    );

    match backend.pull_model().await {
        Ok(()) => {
            println!("{} {} is ready", marks::success(), backend.model());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", marks::error(), e);
            eprintln!("  {} {}", marks::warn(), backend.availability_hint());
            anyhow::bail!("model pull failed");
        }
    }
}
