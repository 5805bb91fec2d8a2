use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mashup::cli::{Cli, Commands, USAGE};
use mashup::config::Config;
use mashup::form::InteractiveForm;
use mashup::pipeline::{MashupPipeline, PipelineRequest};
use mashup::{delivery, output, utils, validate};

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "mashup=debug" } else { "mashup=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose, cli.json_logs);

    // --init replaces whatever the file holds with the defaults
    let config = match &cli.command {
        Commands::Config { init: true, .. } => Config::default(),
        _ => Config::load(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::Build {
            subject,
            item_count,
            duration,
            output: output_name,
            work_dir,
            email,
            report,
            format,
        } => {
            let validated =
                validate::validate_command_line(&subject, &item_count, &duration, &output_name, &config.policy)
                    .and_then(|valid| match email.as_deref() {
                        Some(address) => validate::validate_email(address).map(|addr| (valid, Some(addr))),
                        None => Ok((valid, None)),
                    });

            let ((params, target), recipient) = match validated {
                Ok(valid) => valid,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    eprintln!("{}", USAGE);
                    std::process::exit(1);
                }
            };

            warn_missing_dependencies(&config).await;

            let pipeline = MashupPipeline::from_config(&config, work_dir.as_deref()).with_progress(!cli.quiet);
            let request = PipelineRequest::new(params, Some(&target), &config.output);

            tracing::info!("Starting mashup build for: {}", request.params.subject);

            let result = pipeline.run(&request).await?;

            match report {
                Some(path) => {
                    output::save_to_file(&result, &path, &format)?;
                    println!("Run report saved to: {}", path.display());
                }
                None => output::print_to_console(&result, &format)?,
            }

            if let Some(address) = recipient {
                delivery::deliver(&config.mail, &address, &result.archive).await?;
                println!("Mashup sent to: {}", address);
            }
        }
        Commands::Interactive { work_dir } => {
            warn_missing_dependencies(&config).await;
            InteractiveForm::new()
                .run(&config, work_dir.as_deref(), !cli.quiet)
                .await?;
        }
        Commands::Config { show, init } => {
            if init {
                let path = config.save(cli.config.as_deref())?;
                println!("Configuration written to: {}", path.display());
            }
            if show || !init {
                config.display();
            }
        }
        Commands::Check => {
            let missing = utils::check_dependencies(&config.tools).await;
            if missing.is_empty() {
                println!("All external tools are available.");
            } else {
                println!("Missing tools:");
                for dep in &missing {
                    println!("  • {}", dep);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Check for required external tools (non-fatal, they may still be found at run time)
async fn warn_missing_dependencies(config: &Config) {
    let missing_deps = utils::check_dependencies(&config.tools).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
