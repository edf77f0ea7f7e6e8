use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "oj-engine", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,

    /// Whether to flush the existing database
    #[arg(long = "flush-data", short = 'f', default_value_t = false)]
    pub flush_data: bool,

    /// Number of judging workers
    #[arg(long = "threads", short = 't', default_value_t = 2)]
    pub threads: u8,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> std::io::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub problems: Vec<ProblemSeed>,
}

#[derive(Deserialize, Debug)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

/// Process-wide judging settings, fixed at startup
#[derive(Deserialize, Debug, Clone)]
pub struct JudgeConfig {
    /// Selects the hardened (container) backend; falls back to the
    /// local-process backend when docker is unavailable
    #[serde(default = "default_hardened")]
    pub hardened: bool,
    /// Memory ceiling per run in KB (enforced in hardened mode only)
    #[serde(default = "default_memory_limit_kb")]
    pub memory_limit_kb: u32,
    /// Hard cap on spawned processes per sandbox instance
    #[serde(default = "default_pids_limit")]
    pub pids_limit: u32,
    /// Whether POST /submissions waits for the verdict before responding
    #[serde(default)]
    pub blocking: bool,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            hardened: default_hardened(),
            memory_limit_kb: default_memory_limit_kb(),
            pids_limit: default_pids_limit(),
            blocking: false,
        }
    }
}

fn default_hardened() -> bool {
    true
}

fn default_memory_limit_kb() -> u32 {
    262144 // 256 MB
}

fn default_pids_limit() -> u32 {
    64
}

/// A problem definition loaded into the database at startup
#[derive(Deserialize, Debug)]
pub struct ProblemSeed {
    pub id: i64,
    pub title: String,
    /// Per-case wall-clock limit in seconds
    pub time_limit: f64,
    pub test_cases: Vec<TestCaseSeed>,
}

#[derive(Deserialize, Debug)]
pub struct TestCaseSeed {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub sample: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.server.bind_address, Some("127.0.0.1".to_string()));
        assert!(!config.judge.hardened);
        assert_eq!(config.problems[0].id, 1);
        assert_eq!(config.problems[0].test_cases.len(), 3);
        assert!(config.problems[0].test_cases[0].sample);
    }

    #[test]
    fn test_judge_config_defaults() {
        let config: JudgeConfig = serde_json::from_str("{}").unwrap();
        assert!(config.hardened);
        assert_eq!(config.memory_limit_kb, 262144);
        assert_eq!(config.pids_limit, 64);
        assert!(!config.blocking);
    }
}
