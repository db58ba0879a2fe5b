use clap::Parser;
use gpx_compress_lib::{EpsilonBracket, Method, SearchConfig};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// GPX Compress - shrink a GPX track below a target file size
pub struct Settings {
    /// GPX file to compress
    #[clap(value_name = "FILE")]
    pub input: PathBuf,

    /// Output file (default: <input>_compressed.gpx next to the input)
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Target size in bytes, or with a KB/MB/GB suffix
    #[clap(short, long, default_value = "5MB", value_parser = parse_size)]
    pub target_size: usize,

    /// Reduction method: basic (keep every Nth point) or smart (Douglas-Peucker)
    #[clap(short, long, default_value = "smart")]
    pub method: Method,

    /// Bisection steps for the smart method
    #[clap(long, default_value = "20")]
    pub max_iterations: usize,

    /// Stop the smart method once the output reaches this fraction of the target
    #[clap(long, default_value = "0.95")]
    pub good_enough_ratio: f64,

    /// Lower tolerance bound in degrees (default: derived from the track extent)
    #[clap(long, requires = "epsilon_max")]
    pub epsilon_min: Option<f64>,

    /// Upper tolerance bound in degrees (default: derived from the track extent)
    #[clap(long, requires = "epsilon_min")]
    pub epsilon_max: Option<f64>,

    /// Use the fixed [0.000001, 0.01] tolerance bracket
    #[clap(long, default_value = "false", conflicts_with_all = ["epsilon_min", "epsilon_max"])]
    pub legacy_bracket: bool,

    /// Compress even if the input already fits the target
    #[clap(long, default_value = "false")]
    pub force: bool,
}

impl Settings {
    /// Parse from the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Search configuration derived from the flags
    pub fn search_config(&self) -> SearchConfig {
        let epsilon_bracket = match (self.epsilon_min, self.epsilon_max) {
            (Some(min), Some(max)) => EpsilonBracket::Fixed { min, max },
            _ if self.legacy_bracket => EpsilonBracket::LEGACY,
            _ => EpsilonBracket::Extent,
        };
        SearchConfig {
            max_iterations: self.max_iterations,
            good_enough_ratio: self.good_enough_ratio,
            epsilon_bracket,
            ..SearchConfig::default()
        }
    }

    /// Where the compressed track is written
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string());
        self.input.with_file_name(format!("{}_compressed.gpx", stem))
    }
}

/// Parse sizes such as `1048576`, `512KB`, `5MB`, `1.5 mb` or `2GiB` (binary multiples)
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{}'", s))?;
    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1u64,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" => 1024 * 1024 * 1024,
        other => return Err(format!("unknown size unit '{}'", other)),
    };

    let bytes = (value * multiplier as f64).floor();
    if bytes < 1.0 {
        return Err(format!("size '{}' must be at least 1 byte", s));
    }
    Ok(bytes as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1048576"), Ok(1_048_576));
        assert_eq!(parse_size("512KB"), Ok(512 * 1024));
        assert_eq!(parse_size("5MB"), Ok(5 * 1024 * 1024));
        assert_eq!(parse_size("1.5 mb"), Ok(1_572_864));
        assert_eq!(parse_size("2GiB"), Ok(2 * 1024 * 1024 * 1024));
        assert!(parse_size("0").is_err());
        assert!(parse_size("12parsecs").is_err());
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::parse_from(["gpx-compress", "ride.gpx"]);
        assert_eq!(settings.target_size, 5 * 1024 * 1024);
        assert_eq!(settings.method, Method::Simplification);
        assert!(!settings.force);

        let config = settings.search_config();
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.epsilon_bracket, EpsilonBracket::Extent);
    }

    #[test]
    fn test_output_path() {
        let settings = Settings::parse_from(["gpx-compress", "tracks/ride.gpx"]);
        assert_eq!(
            settings.output_path(),
            PathBuf::from("tracks/ride_compressed.gpx")
        );

        let settings = Settings::parse_from(["gpx-compress", "ride.gpx", "-o", "out.gpx"]);
        assert_eq!(settings.output_path(), PathBuf::from("out.gpx"));
    }

    #[test]
    fn test_method_and_bracket_flags() {
        let settings = Settings::parse_from([
            "gpx-compress",
            "ride.gpx",
            "--method",
            "basic",
            "--epsilon-min",
            "0.0001",
            "--epsilon-max",
            "0.1",
        ]);
        assert_eq!(settings.method, Method::Decimation);
        assert_eq!(
            settings.search_config().epsilon_bracket,
            EpsilonBracket::Fixed {
                min: 0.0001,
                max: 0.1
            }
        );

        let settings = Settings::parse_from(["gpx-compress", "ride.gpx", "--legacy-bracket"]);
        assert_eq!(
            settings.search_config().epsilon_bracket,
            EpsilonBracket::LEGACY
        );
    }

    #[test]
    fn test_epsilon_bounds_require_each_other() {
        let result = Settings::try_parse_from(["gpx-compress", "ride.gpx", "--epsilon-min", "0.1"]);
        assert!(result.is_err());
    }
}
