use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "kubernetes-prometheus-publisher")]
#[command(version)]
#[command(about = "Pulls container metrics from Prometheus and republishes them on a Kafka topic")]
pub struct Args {
    /// TOML settings file. Environment variables override its values.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Run a single collection cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    pub dump_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["kpp"]);
        assert!(args.config.is_none());
        assert!(!args.once);
        assert!(!args.dump_config);
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from(["kpp", "--config", "/etc/kpp.toml", "--once", "--dump-config"]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/kpp.toml")));
        assert!(args.once);
        assert!(args.dump_config);
    }

    #[test]
    fn test_args_short_config() {
        let args = Args::parse_from(["kpp", "-c", "settings.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("settings.toml")));
    }

    #[test]
    fn test_args_rejects_unknown_flag() {
        assert!(Args::try_parse_from(["kpp", "--prompt", "x"]).is_err());
    }
}
