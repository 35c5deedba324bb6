use clap::Parser;
use exo_infer::adapters::http::{self, AppState};
use exo_infer::config::cli::{BatchArgs, ClassifyArgs, Command};
use exo_infer::config::{LogFormat, ServiceSettings};
use exo_infer::core::batch::{classify_csv, BatchOptions};
use exo_infer::utils::error::ErrorSeverity;
use exo_infer::utils::{logger, validation::Validate};
use exo_infer::{CliConfig, Feature, FeatureVector, InferenceError, InferenceService, LocalStorage};
use std::io::{BufReader, BufWriter};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 先讀設定檔，才知道日誌格式
    let file = cli.load_file();
    let settings = cli.settings(file.as_ref().ok().and_then(Option::as_ref));

    match settings.log_format {
        LogFormat::Compact => logger::init_cli_logger(settings.verbose),
        LogFormat::Json => logger::init_json_logger(settings.verbose),
    }

    tracing::info!("Starting exo-infer");
    if settings.verbose {
        tracing::debug!("CLI config: {:?}", cli);
        tracing::debug!("Resolved settings: {:?}", settings);
    }

    let outcome = match file {
        Ok(_) => run(cli.command, settings).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ exo-infer failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2, // 輸入錯誤
            ErrorSeverity::High => 1,   // 預測失敗
            ErrorSeverity::Critical => 3, // 無法載入或設定錯誤
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(command: Command, settings: ServiceSettings) -> Result<(), InferenceError> {
    match command {
        Command::Features => print_features(),
        Command::Classify(args) => {
            // 先驗證輸入，再載入模型
            let features = read_features(&args)?;
            let storage = prepare(&settings)?;
            let service = load(&storage, &settings).await?;
            let result = service.classify(&features)?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("🎯 CLASSIFICATION RESULT");
                println!("🪐 Planet Type: {}", result.label);
                match result.confidence {
                    Some(confidence) => println!("📈 Confidence: {:.1}%", confidence),
                    None => println!("📈 Confidence: unavailable for this model"),
                }
                println!("🔢 Encoded ID: {}", result.class_id);
            }
        }
        Command::Batch(args) => {
            let storage = prepare(&settings)?;
            let service = load(&storage, &settings).await?;
            run_batch(&service, &args)?;
        }
        Command::Inspect => {
            let storage = prepare(&settings)?;
            let service = load(&storage, &settings).await?;
            let summary = service.snapshot().summary();
            println!("📦 Model: {}", summary.model);
            println!("🔢 Features: {}", summary.num_features);
            println!("🏷️ Classes ({}): {}", summary.num_classes, summary.classes.join(", "));
            println!(
                "📈 Probabilities: {}",
                if summary.supports_probabilities {
                    "supported"
                } else {
                    "not supported"
                }
            );
        }
        Command::Serve(_) => {
            let storage = prepare(&settings)?;
            let addr = settings.socket_addr()?;
            let service = Arc::new(load(&storage, &settings).await?);
            let state = AppState::new(service, storage, settings.artifact_paths());
            http::run(state, addr, settings.request_timeout()).await?;
        }
    }

    Ok(())
}

fn prepare(settings: &ServiceSettings) -> Result<LocalStorage, InferenceError> {
    settings.validate()?;
    Ok(LocalStorage::new(settings.artifact_dir.clone()))
}

async fn load(
    storage: &LocalStorage,
    settings: &ServiceSettings,
) -> Result<InferenceService, InferenceError> {
    InferenceService::load(storage, &settings.model_path, &settings.encoder_path).await
}

fn read_features(args: &ClassifyArgs) -> Result<FeatureVector, InferenceError> {
    match &args.input {
        Some(path) => args.read_input(path),
        None => args.feature_vector(),
    }
}

fn run_batch(service: &InferenceService, args: &BatchArgs) -> Result<(), InferenceError> {
    let options = BatchOptions {
        id_column: args.id_column.clone(),
    };
    let artifacts = service.snapshot();

    let input: Box<dyn std::io::Read> = if args.input == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(std::fs::File::open(&args.input)?))
    };

    let summary = match &args.output {
        Some(path) => {
            let output = BufWriter::new(std::fs::File::create(path)?);
            let summary = classify_csv(&artifacts, input, output, &options)?;
            println!("📁 Output saved to: {}", path);
            summary
        }
        None => classify_csv(&artifacts, input, std::io::stdout().lock(), &options)?,
    };

    if summary.failed > 0 {
        eprintln!(
            "⚠️ {} of {} rows could not be classified",
            summary.failed, summary.rows
        );
    }
    Ok(())
}

fn print_features() {
    println!("{:<3} {:<12} {:<18} {:<22} {:>10}", "#", "name", "label", "unit", "sample");
    for feature in Feature::ALL {
        let info = feature.info();
        println!(
            "{:<3} {:<12} {:<18} {:<22} {:>10}",
            info.index, info.name, info.label, info.unit, info.sample
        );
    }
}
