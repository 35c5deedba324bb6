use crate::config::toml_config::TomlConfig;
use crate::config::{LogFormat, Overrides, ServiceSettings};
use crate::core::{Feature, FeatureVector};
use crate::domain::model::FEATURE_COUNT;
use crate::utils::error::{InferenceError, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;

#[derive(Debug, Clone, Parser)]
#[command(name = "exo-infer")]
#[command(about = "Classify exoplanet candidates with a pretrained XGBoost model")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "EXO_CONFIG")]
    pub config: Option<String>,

    /// Directory that relative artifact paths are resolved against
    #[arg(long, global = true, env = "EXO_ARTIFACT_DIR")]
    pub artifact_dir: Option<String>,

    /// XGBoost JSON model (Booster.save_model output)
    #[arg(long, global = true, env = "EXO_MODEL_PATH")]
    pub model_path: Option<String>,

    /// Label encoder classes as JSON
    #[arg(long, global = true, env = "EXO_ENCODER_PATH")]
    pub encoder_path: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Classify a single observation
    Classify(ClassifyArgs),
    /// Classify every row of a CSV file
    Batch(BatchArgs),
    /// List the model features in trained order
    Features,
    /// Load the artifacts and print a summary
    Inspect,
    /// Serve the HTTP API
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ClassifyArgs {
    /// Orbital period (days)
    #[arg(long, allow_hyphen_values = true)]
    pub pl_orbper: Option<f64>,
    /// Transit duration (hours)
    #[arg(long, allow_hyphen_values = true)]
    pub pl_trandurh: Option<f64>,
    /// Transit depth
    #[arg(long, allow_hyphen_values = true)]
    pub pl_trandep: Option<f64>,
    /// Planet radius (Earth radii)
    #[arg(long, allow_hyphen_values = true)]
    pub pl_rade: Option<f64>,
    /// Insolation flux
    #[arg(long, allow_hyphen_values = true)]
    pub pl_insol: Option<f64>,
    /// Star magnitude
    #[arg(long, allow_hyphen_values = true)]
    pub st_tmag: Option<f64>,
    /// Star temperature (K)
    #[arg(long, allow_hyphen_values = true)]
    pub st_teff: Option<f64>,
    /// Star radius (solar radii)
    #[arg(long, allow_hyphen_values = true)]
    pub st_rad: Option<f64>,

    /// Start from the illustrative sample values; explicit flags override them
    #[arg(long)]
    pub sample: bool,

    /// Read the observation as a JSON object from a file ("-" for stdin)
    #[arg(long, conflicts_with = "sample")]
    pub input: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    /// Input CSV with a header row ("-" for stdin)
    pub input: String,

    /// Output CSV (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Column copied through to the output, e.g. kepoi_name
    #[arg(long)]
    pub id_column: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "EXO_BIND")]
    pub bind: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl CliConfig {
    pub fn load_file(&self) -> Result<Option<TomlConfig>> {
        self.config
            .as_deref()
            .map(TomlConfig::from_file)
            .transpose()
    }

    pub fn settings(&self, file: Option<&TomlConfig>) -> ServiceSettings {
        let serve = match &self.command {
            Command::Serve(args) => args.clone(),
            _ => ServeArgs::default(),
        };

        ServiceSettings::resolve(
            file,
            Overrides {
                model_path: self.model_path.clone(),
                encoder_path: self.encoder_path.clone(),
                artifact_dir: self.artifact_dir.clone(),
                bind: serve.bind,
                request_timeout_seconds: serve.request_timeout,
                log_format: serve.log_format,
                verbose: self.verbose,
            },
        )
    }
}

impl ClassifyArgs {
    fn flag(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::PlOrbper => self.pl_orbper,
            Feature::PlTrandurh => self.pl_trandurh,
            Feature::PlTrandep => self.pl_trandep,
            Feature::PlRade => self.pl_rade,
            Feature::PlInsol => self.pl_insol,
            Feature::StTmag => self.st_tmag,
            Feature::StTeff => self.st_teff,
            Feature::StRad => self.st_rad,
        }
    }

    /// 由旗標組成特徵向量；未使用 `--sample` 時八個旗標都必須提供
    pub fn feature_vector(&self) -> Result<FeatureVector> {
        let base = FeatureVector::sample();
        let mut values = [0.0; FEATURE_COUNT];

        for feature in Feature::ALL {
            values[feature.index()] = match (self.flag(feature), self.sample) {
                (Some(value), _) => value,
                (None, true) => base.get(feature),
                (None, false) => {
                    return Err(InferenceError::invalid_input(
                        feature.name(),
                        format!("missing value (pass --{} or --sample)", feature.name().replace('_', "-")),
                    ))
                }
            };
        }

        FeatureVector::new(values)
    }

    pub fn read_input(&self, path: &str) -> Result<FeatureVector> {
        let content = if path == "-" {
            std::io::read_to_string(std::io::stdin())?
        } else {
            std::fs::read_to_string(path)?
        };
        let fields: HashMap<String, serde_json::Value> = serde_json::from_str(&content)?;
        FeatureVector::from_fields(&fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classify_flags() {
        let cli = CliConfig::parse_from([
            "exo-infer",
            "--model-path",
            "m.json",
            "classify",
            "--pl-orbper",
            "12.34",
            "--pl-trandurh",
            "3.5",
            "--pl-trandep",
            "0.0012",
            "--pl-rade",
            "1.1",
            "--pl-insol",
            "250.6",
            "--st-tmag",
            "-1.5",
            "--st-teff",
            "5500",
            "--st-rad",
            "0.9",
        ]);

        assert_eq!(cli.model_path.as_deref(), Some("m.json"));
        let Command::Classify(args) = &cli.command else {
            panic!("expected classify");
        };
        let vector = args.feature_vector().unwrap();
        assert_eq!(vector.get(Feature::StTmag), -1.5);
        assert_eq!(vector.get(Feature::PlOrbper), 12.34);
    }

    #[test]
    fn test_missing_flag_without_sample_is_invalid_input() {
        let args = ClassifyArgs {
            pl_orbper: Some(1.0),
            ..ClassifyArgs::default()
        };
        let err = args.feature_vector().unwrap_err();
        assert!(matches!(
            err,
            InferenceError::InvalidInput { ref field, .. } if field == "pl_trandurh"
        ));
    }

    #[test]
    fn test_sample_with_override() {
        let args = ClassifyArgs {
            sample: true,
            st_teff: Some(6100.0),
            ..ClassifyArgs::default()
        };
        let vector = args.feature_vector().unwrap();
        assert_eq!(vector.get(Feature::StTeff), 6100.0);
        assert_eq!(vector.get(Feature::PlRade), 1.1);
    }

    #[test]
    fn test_nan_flag_is_rejected() {
        let args = ClassifyArgs {
            sample: true,
            pl_insol: Some(f64::NAN),
            ..ClassifyArgs::default()
        };
        assert!(matches!(
            args.feature_vector(),
            Err(InferenceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_read_input_from_json_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"st_rad": 0.9, "st_teff": "5500", "st_tmag": 10.3, "pl_insol": 250.6,
                "pl_rade": 1.1, "pl_trandep": 0.0012, "pl_trandurh": 3.5, "pl_orbper": 12.34}}"#
        )
        .unwrap();

        let args = ClassifyArgs::default();
        let vector = args.read_input(file.path().to_str().unwrap()).unwrap();
        assert_eq!(vector, FeatureVector::sample());

        let mut partial = NamedTempFile::new().unwrap();
        writeln!(partial, r#"{{"pl_orbper": 12.34}}"#).unwrap();
        assert!(matches!(
            args.read_input(partial.path().to_str().unwrap()),
            Err(InferenceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_serve_flags_feed_settings() {
        let cli = CliConfig::parse_from([
            "exo-infer",
            "serve",
            "--bind",
            "0.0.0.0:9090",
            "--log-format",
            "json",
        ]);
        let settings = cli.settings(None);
        assert_eq!(settings.bind, "0.0.0.0:9090");
        assert_eq!(settings.log_format, LogFormat::Json);
    }
}
