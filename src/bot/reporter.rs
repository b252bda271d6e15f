use serenity::cache::Cache;
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Anything that can list the guilds the bot is connected to.
pub trait GuildDirectory: Send + Sync {
    fn guild_names(&self) -> Vec<String>;
}

impl GuildDirectory for Cache {
    fn guild_names(&self) -> Vec<String> {
        self.guilds()
            .into_iter()
            .filter_map(|guild_id| self.guild(guild_id).map(|guild| guild.name.clone()))
            .collect()
    }
}

/// Logs the connected guilds once and returns them, sorted.
pub fn report_guilds(directory: &dyn GuildDirectory) -> Vec<String> {
    let mut names = directory.guild_names();
    names.sort();

    info!("🌐 Current guilds ({}):", names.len());
    for name in &names {
        info!("   • {}", name);
    }

    names
}

/// Reports the guild list every `period` until `shutdown` is cancelled.
/// The first report happens right away.
pub async fn run_reporter(
    directory: Arc<dyn GuildDirectory>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                report_guilds(directory.as_ref());
            }
        }
    }

    debug!("🛑 Guild reporter stopped");
}
