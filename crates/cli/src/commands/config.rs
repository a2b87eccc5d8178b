use paydeck_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let mut lines =
                vec!["effective config (precedence: env > file > default):".to_string()];
            for entry in config.redacted_summary().split(' ') {
                lines.push(format!("  {entry}"));
            }
            lines.join("\n")
        }
        Err(error) => format!("config validation failed: {error}"),
    }
}
