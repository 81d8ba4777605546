use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

use healthsoft_triage::config::{self, ProviderKind, TriageConfig};
use healthsoft_triage::models::OTHER_OPTION;
use healthsoft_triage::pipeline::gateway::{build_gateway, OllamaGateway};
use healthsoft_triage::triage::{LayerQuestion, SessionStep, TriageService};

/// Interactive terminal triage for a health worker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Patient complaint; prompted for when omitted
    complaint: Option<String>,

    /// Provider: "ollama" or "chat_completions" (overrides TRIAGE_PROVIDER)
    #[arg(long)]
    provider: Option<String>,

    /// Model name (overrides TRIAGE_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Provider base URL (overrides TRIAGE_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Print the case record as JSON when triage ends
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "healthsoft_triage=debug,warn"
    } else {
        config::default_log_filter()
    };
    healthsoft_triage::init_tracing(filter);

    let config = TriageConfig::from_lookup(|key| {
        let flag = match key {
            "TRIAGE_PROVIDER" => args.provider.clone(),
            "TRIAGE_MODEL" => args.model.clone(),
            "TRIAGE_BASE_URL" => args.base_url.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })
    .context("invalid triage configuration")?;

    info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);

    if config.provider == ProviderKind::Ollama {
        check_ollama(&config).await;
    }

    let gateway = build_gateway(&config).context("failed to configure model gateway")?;
    let service = TriageService::new(gateway, config);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let complaint = match args.complaint {
        Some(c) => c,
        None => prompt(&mut input, "Describe the patient's symptoms: ").await?,
    };

    let reply = service.start_triage(&complaint).await?;
    let session_id = reply.session_id;
    let mut step = reply.step;

    loop {
        match step {
            SessionStep::Result { assessment, source } => {
                println!();
                println!("Risk level: {}", assessment.risk_level);
                println!("Reason:     {}", assessment.reason);
                println!("Action:     {}", assessment.action);
                println!("(decided by: {source})");
                break;
            }
            SessionStep::Questions {
                layer,
                reason,
                questions,
            } => {
                println!();
                println!("-- Follow-up questions (round {layer}) --");
                if let Some(reason) = reason {
                    println!("{reason}");
                }

                let mut next = None;
                for question in &questions {
                    let (answer, note) = ask(&mut input, question).await?;
                    let reply = service
                        .answer_question(session_id, &question.id, &answer, note.as_deref())
                        .await?;
                    next = Some(reply.step);
                }
                step = next.context("model issued an empty question layer")?;
            }
            SessionStep::AwaitingAnswers { remaining } => {
                bail!("{remaining} question(s) left unanswered");
            }
        }
    }

    if args.json {
        let record = service.case_record(session_id).await?;
        println!("{}", record.to_json()?);
    }

    Ok(())
}

/// Warn early when the local model is missing; triage still runs and falls back.
async fn check_ollama(config: &TriageConfig) {
    let client = match OllamaGateway::new(
        &config.base_url,
        &config.model,
        config.temperature,
        Duration::from_secs(5),
    ) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "Could not build Ollama client");
            return;
        }
    };

    match client.is_model_available().await {
        Ok(true) => info!(model = %config.model, "Ollama model available"),
        Ok(false) => warn!(model = %config.model, "Model not found in Ollama, run `ollama pull` first"),
        Err(e) => warn!(error = %e, "Ollama not reachable, answers will fall back to referral"),
    }
}

async fn ask(input: &mut Input, question: &LayerQuestion) -> Result<(String, Option<String>)> {
    let options = &question.question.expected_answers;

    println!();
    println!("[{}] {}", question.question.priority, question.text());
    for (i, option) in options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }

    loop {
        let raw = prompt(input, "Choose an option: ").await?;
        let choice = raw
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| options.get(i));

        match choice {
            Some(option) if option == OTHER_OPTION => {
                let note = prompt(input, "Please describe: ").await?;
                return Ok((option.clone(), Some(note)));
            }
            Some(option) => return Ok((option.clone(), None)),
            None => println!("Enter a number between 1 and {}.", options.len()),
        }
    }
}

async fn prompt(input: &mut Input, label: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;

    loop {
        match input.next_line().await? {
            Some(line) if !line.trim().is_empty() => return Ok(line.trim().to_string()),
            Some(_) => continue,
            None => bail!("input closed"),
        }
    }
}
