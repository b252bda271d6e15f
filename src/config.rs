use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coindesk.com/v1/bpi/currentprice/BTC.json";

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,
    pub presence_text: String,

    // Channels and welcome gate
    pub welcome_channel: String,
    pub welcome_keyword: String,
    pub member_role: String,
    pub bot_channel: String,
    pub invite_link: String,

    // Guild report
    pub guild_report_interval: u64, // seconds

    // Audio
    pub skip_vote_threshold: usize,
    pub default_volume: u8, // percent
    pub clips_dir: PathBuf,

    // Price quote
    pub price_api_url: String,
    pub price_field: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to
    /// the defaults for everything except the token.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, fallback: String| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(fallback)
        };

        let config = Self {
            discord_token: lookup("DISCORD_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("DISCORD_TOKEN is not set"))?,
            command_prefix: text("COMMAND_PREFIX", defaults.command_prefix),
            presence_text: text("PRESENCE_TEXT", defaults.presence_text),

            welcome_channel: text("WELCOME_CHANNEL", defaults.welcome_channel),
            welcome_keyword: text("WELCOME_KEYWORD", defaults.welcome_keyword),
            member_role: text("MEMBER_ROLE", defaults.member_role),
            bot_channel: text("BOT_CHANNEL", defaults.bot_channel),
            invite_link: text("INVITE_LINK", defaults.invite_link),

            guild_report_interval: text(
                "GUILD_REPORT_INTERVAL",
                defaults.guild_report_interval.to_string(),
            )
            .parse()?,

            skip_vote_threshold: text(
                "SKIP_VOTE_THRESHOLD",
                defaults.skip_vote_threshold.to_string(),
            )
            .parse()?,
            default_volume: text("DEFAULT_VOLUME", defaults.default_volume.to_string()).parse()?,
            clips_dir: text("CLIPS_DIR", defaults.clips_dir.display().to_string()).into(),

            price_api_url: text("PRICE_API_URL", defaults.price_api_url),
            price_field: text("PRICE_FIELD", defaults.price_field),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - The command prefix must not be empty
    /// - The report interval must be at least one second
    /// - At least one vote is needed to skip
    /// - The default volume is a percentage (0..=100)
    /// - The price field is a JSON pointer
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        if self.guild_report_interval == 0 {
            anyhow::bail!("Guild report interval must be greater than 0");
        }

        if self.skip_vote_threshold == 0 {
            anyhow::bail!("Skip vote threshold must be at least 1");
        }

        if self.default_volume > 100 {
            anyhow::bail!(
                "Default volume must be between 0 and 100, got: {}",
                self.default_volume
            );
        }

        if !self.price_field.starts_with('/') {
            anyhow::bail!(
                "Price field must be a JSON pointer starting with '/', got: {}",
                self.price_field
            );
        }

        Ok(())
    }

    /// Full text of the acknowledgment message expected in the welcome channel.
    pub fn welcome_command(&self) -> String {
        format!("{}{}", self.command_prefix, self.welcome_keyword)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.guild_report_interval)
    }

    /// Returns a summary of the current configuration for logging, without the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Prefix: {:?}, presence {:?}\n  \
            Welcome: #{} expects {:?}, grants role {:?}\n  \
            Invite: #{} -> {}\n  \
            Audio: {}% default volume, {} votes to skip, clips in {}\n  \
            Report: every {}s",
            self.command_prefix,
            self.presence_text,
            self.welcome_channel,
            self.welcome_command(),
            self.member_role,
            self.bot_channel,
            self.invite_link,
            self.default_volume,
            self.skip_vote_threshold,
            self.clips_dir.display(),
            self.guild_report_interval,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: "?".to_string(),
            presence_text: "ist ZORNI".to_string(),

            welcome_channel: "willkommen".to_string(),
            welcome_keyword: "gelesen".to_string(),
            member_role: "Community".to_string(),
            bot_channel: "bot".to_string(),
            invite_link: "https://discord.gg/uDThPZw".to_string(),

            guild_report_interval: 600,

            skip_vote_threshold: 3,
            default_volume: 50,
            clips_dir: "clips".into(),

            price_api_url: DEFAULT_PRICE_API_URL.to_string(),
            price_field: "/bpi/USD/rate_float".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_community_server() {
        let config = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "secret")])).unwrap();

        assert_eq!(config.welcome_command(), "?gelesen");
        assert_eq!(config.welcome_channel, "willkommen");
        assert_eq!(config.member_role, "Community");
        assert_eq!(config.bot_channel, "bot");
        assert_eq!(config.report_interval(), Duration::from_secs(600));
        assert_eq!(config.skip_vote_threshold, 3);
        assert_eq!(config.default_volume, 50);
    }

    #[test]
    fn missing_token_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn overrides_are_parsed_and_validated() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "secret"),
            ("COMMAND_PREFIX", "!"),
            ("SKIP_VOTE_THRESHOLD", "5"),
            ("GUILD_REPORT_INTERVAL", "30"),
        ]))
        .unwrap();
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.skip_vote_threshold, 5);
        assert_eq!(config.report_interval(), Duration::from_secs(30));

        let too_loud = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "secret"),
            ("DEFAULT_VOLUME", "120"),
        ]));
        assert!(too_loud.is_err());

        let no_votes = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "secret"),
            ("SKIP_VOTE_THRESHOLD", "0"),
        ]));
        assert!(no_votes.is_err());
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "very-secret")])).unwrap();
        assert!(!config.summary().contains("very-secret"));
    }
}
