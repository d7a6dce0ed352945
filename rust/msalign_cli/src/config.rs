use msalign::AlignmentConfig;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::{
    Path,
    PathBuf,
};

use crate::cli::AlignArgs;
use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub input: Option<InputConfig>,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InputConfig {
    /// Picked features, a JSON list holding one list of features per file.
    pub peaks: PathBuf,
    /// Raw spectra, a JSON list holding one list of spectra per file.
    #[serde(default)]
    pub raw: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    pub fn template() -> Self {
        Self {
            input: Some(InputConfig {
                peaks: PathBuf::from("peaks.json"),
                raw: Some(PathBuf::from("raw_spectra.json")),
            }),
            alignment: AlignmentConfig::default(),
            output: Some(OutputConfig {
                directory: PathBuf::from("msalign_output"),
            }),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let conf = std::fs::File::open(path).map_err(|e| CliError::io(e, path))?;
        serde_json::from_reader(std::io::BufReader::new(conf))
            .map_err(|e| CliError::ParseError { msg: e.to_string() })
    }

    /// Loads the config file (if any) and applies the command line overrides.
    pub fn with_cli_args(args: &AlignArgs) -> Result<Self, CliError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(peaks) = &args.peaks {
            let raw = config.input.as_ref().and_then(|x| x.raw.clone());
            config.input = Some(InputConfig {
                peaks: peaks.clone(),
                raw,
            });
        }
        if let Some(raw) = &args.raw {
            match config.input.as_mut() {
                Some(input) => input.raw = Some(raw.clone()),
                None => {
                    return Err(CliError::Config {
                        source: "Raw spectra given without peak lists, please provide them in either the config file or with the --peaks flag".to_string(),
                    });
                }
            }
        }
        if config.input.is_none() {
            return Err(CliError::Config {
                source: "No input provided, please provide one in either the config file or with the --peaks flag".to_string(),
            });
        }
        if let Some(output_dir) = &args.output_dir {
            config.output = Some(OutputConfig {
                directory: output_dir.clone(),
            });
        }
        if config.output.is_none() {
            return Err(CliError::Config {
                source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
            });
        }
        if let Some(reference_file) = args.reference_file {
            config.alignment.reference_file_id = reference_file;
        }
        if let Some(threads) = args.threads {
            config.alignment.gap_filling.threads = threads;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> AlignArgs {
        AlignArgs {
            config: None,
            peaks: Some(PathBuf::from("p.json")),
            raw: None,
            output_dir: Some(PathBuf::from("out")),
            reference_file: Some(2),
            threads: Some(3),
        }
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::with_cli_args(&args()).unwrap();
        let input = config.input.unwrap();
        assert_eq!(input.peaks, PathBuf::from("p.json"));
        assert!(input.raw.is_none());
        assert_eq!(config.output.unwrap().directory, PathBuf::from("out"));
        assert_eq!(config.alignment.reference_file_id, 2);
        assert_eq!(config.alignment.gap_filling.threads, 3);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let no_input = AlignArgs {
            peaks: None,
            ..args()
        };
        assert!(matches!(
            Config::with_cli_args(&no_input),
            Err(CliError::Config { .. })
        ));
    }

    #[test]
    fn test_template_round_trip() {
        let text = serde_json::to_string_pretty(&Config::template()).unwrap();
        let parsed: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.alignment, AlignmentConfig::default());
    }

    #[test]
    fn test_partial_alignment_section_uses_defaults() {
        let text = r#"{"alignment": {"tolerance": {"mz_tolerance": 0.01}}}"#;
        let parsed: Config = serde_json::from_str(text).unwrap();
        assert_eq!(parsed.alignment.tolerance.mz_tolerance, 0.01);
        assert_eq!(parsed.alignment.tolerance.secondary_tolerance, 0.1);
        assert!(parsed.input.is_none());
    }
}
