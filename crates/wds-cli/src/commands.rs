use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use wds_cli::summary::{print_summary, watermark_table};
use wds_cli::terminal::{Completion, Terminal};
use wds_core::{
    EchoGenerator, RetryingGenerator, Survey, SurveyConfig, TextGenerator, WatermarkRegistry,
};
use wds_genai::GenAiClient;

use crate::cli::{ApplyArgs, RunArgs, SummaryFormatArg};

fn load_config(path: Option<&Path>) -> Result<SurveyConfig> {
    let config = SurveyConfig::load(path).context("load survey configuration")?;
    debug!(
        watermarks = ?config.watermarks,
        pages = config.page_count,
        mark_prob = config.mark_prob,
        "configuration loaded"
    );
    Ok(config)
}

/// The generator behind every request: local echo or the remote model,
/// wrapped in the configured retry policy.
fn build_generator(config: &SurveyConfig, offline: bool) -> Result<Arc<dyn TextGenerator>> {
    let policy = config.retry.into();
    if offline {
        info!("using the offline generator");
        return Ok(Arc::new(RetryingGenerator::with_policy(EchoGenerator, policy)));
    }
    let client = GenAiClient::from_env(config.model.as_str())
        .context("configure the generation client (or pass --offline)")?;
    info!(model = client.model(), "using the remote generator");
    Ok(Arc::new(RetryingGenerator::with_policy(client, policy)))
}

pub fn run_survey(config_path: Option<&Path>, args: &RunArgs) -> Result<Completion> {
    let config = load_config(config_path)?;
    let generator = build_generator(&config, args.offline)?;
    let mut survey = Survey::new(&config, generator);
    if let Some(participant) = &args.participant {
        survey = survey.with_participant(participant.as_str());
    }

    let stdout = io::stdout();
    let mut terminal =
        Terminal::new(io::stdin().lock(), stdout.lock()).with_spinner(io::stderr().is_terminal());
    let completion = terminal.run(&mut survey)?;
    drop(terminal);
    if completion == Completion::Declined {
        return Ok(completion);
    }

    let summary = survey.summary();
    match args.summary {
        SummaryFormatArg::Table => print_summary(&summary),
        SummaryFormatArg::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize summary")?
        ),
    }
    Ok(completion)
}

pub fn run_watermarks(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = WatermarkRegistry::from_config(&config, Arc::new(EchoGenerator));
    println!("{}", watermark_table(&registry));
    Ok(())
}

pub fn run_apply(config_path: Option<&Path>, args: &ApplyArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let text = match &args.text {
        Some(text) => text.clone(),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("read text from stdin")?;
            text
        }
    };
    if text.trim().is_empty() {
        bail!("no text to watermark");
    }

    let generator = build_generator(&config, args.offline)?;
    let registry = WatermarkRegistry::from_config(&config, generator);
    let remote = registry.active().iter().any(|w| w.is_remote());
    let spinner = if remote && io::stderr().is_terminal() {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Watermarking...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        spinner
    } else {
        ProgressBar::hidden()
    };

    let result = registry.apply_all(&text);
    spinner.finish_and_clear();
    println!("{}", result.context("apply watermarks")?);
    Ok(())
}
