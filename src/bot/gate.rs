//! Membership gate for the welcome channel.
//!
//! Every message posted there is deleted. If it is the acknowledgment
//! keyword, the author gets the member role first; when the role cannot be
//! found the author is told by DM instead.

use async_trait::async_trait;
use serenity::all::{Context, CreateMessage, Message, RoleId};
use tracing::{error, info, warn};

use crate::error::BotError;

pub const ROLE_MISSING_DM: &str =
    "Anscheinend gibt es ein Problem beim Zuweisen der Rolle, bitte wende Dich an einen Admin :)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    RoleGranted(RoleId),
    RoleMissing,
    GrantFailed,
    /// Not the keyword; the message is only deleted.
    Ignored,
}

/// What the gate needs from the platform, scoped to one incoming message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberActions: Send + Sync {
    /// The guild's current roles, looked up fresh on every call.
    async fn roles(&self) -> Result<Vec<(RoleId, String)>, BotError>;
    async fn grant_role(&self, role: RoleId) -> Result<(), BotError>;
    async fn direct_message(&self, text: String) -> Result<(), BotError>;
    async fn delete_message(&self) -> Result<(), BotError>;
}

pub struct WelcomeGate {
    command: String,
    role_name: String,
}

impl WelcomeGate {
    pub fn new(command: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            role_name: role_name.into(),
        }
    }

    pub async fn handle(&self, actions: &dyn MemberActions, content: &str) -> GateOutcome {
        let outcome = if content == self.command {
            self.admit(actions).await
        } else {
            GateOutcome::Ignored
        };

        // Best effort, not retried.
        if let Err(e) = actions.delete_message().await {
            warn!("⚠️ Could not delete welcome message: {}", e);
        }

        outcome
    }

    async fn admit(&self, actions: &dyn MemberActions) -> GateOutcome {
        let role = match actions.roles().await {
            Ok(roles) => roles
                .into_iter()
                .find(|(_, name)| *name == self.role_name)
                .map(|(id, _)| id),
            Err(e) => {
                warn!("⚠️ Could not load roles: {}", e);
                None
            }
        };

        let Some(role) = role else {
            error!("❌ Role {:?} was not found", self.role_name);
            if let Err(e) = actions.direct_message(ROLE_MISSING_DM.to_string()).await {
                warn!("⚠️ Could not DM the author: {}", e);
            }
            return GateOutcome::RoleMissing;
        };

        match actions.grant_role(role).await {
            Ok(()) => {
                info!("✅ Granted role {:?}", self.role_name);
                GateOutcome::RoleGranted(role)
            }
            Err(e) => {
                error!("❌ Could not grant role {:?}: {}", self.role_name, e);
                GateOutcome::GrantFailed
            }
        }
    }
}

/// [`MemberActions`] for a serenity message.
pub struct DiscordMember<'a> {
    pub ctx: &'a Context,
    pub msg: &'a Message,
}

#[async_trait]
impl MemberActions for DiscordMember<'_> {
    async fn roles(&self) -> Result<Vec<(RoleId, String)>, BotError> {
        let guild_id = self.msg.guild_id.ok_or(BotError::NotInGuild)?;

        let cached = self.ctx.cache.guild(guild_id).map(|guild| {
            guild
                .roles
                .values()
                .map(|role| (role.id, role.name.clone()))
                .collect::<Vec<_>>()
        });

        match cached {
            Some(roles) => Ok(roles),
            None => {
                let roles = guild_id.roles(&self.ctx.http).await?;
                Ok(roles
                    .into_values()
                    .map(|role| (role.id, role.name))
                    .collect())
            }
        }
    }

    async fn grant_role(&self, role: RoleId) -> Result<(), BotError> {
        let guild_id = self.msg.guild_id.ok_or(BotError::NotInGuild)?;
        self.ctx
            .http
            .add_member_role(guild_id, self.msg.author.id, role, Some("Regeln gelesen"))
            .await?;
        Ok(())
    }

    async fn direct_message(&self, text: String) -> Result<(), BotError> {
        self.msg
            .author
            .direct_message(&self.ctx.http, CreateMessage::new().content(text))
            .await?;
        Ok(())
    }

    async fn delete_message(&self) -> Result<(), BotError> {
        self.msg.delete(&self.ctx.http).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn gate() -> WelcomeGate {
        WelcomeGate::new("?gelesen", "Community")
    }

    fn roles() -> Vec<(RoleId, String)> {
        vec![
            (RoleId::new(1), "Admin".to_string()),
            (RoleId::new(7), "Community".to_string()),
        ]
    }

    #[tokio::test]
    async fn keyword_grants_the_role_and_deletes() {
        let mut actions = MockMemberActions::new();
        actions.expect_roles().times(1).returning(|| Ok(roles()));
        actions
            .expect_grant_role()
            .with(eq(RoleId::new(7)))
            .times(1)
            .returning(|_| Ok(()));
        actions.expect_direct_message().never();
        actions.expect_delete_message().times(1).returning(|| Ok(()));

        assert_eq!(
            gate().handle(&actions, "?gelesen").await,
            GateOutcome::RoleGranted(RoleId::new(7))
        );
    }

    #[tokio::test]
    async fn missing_role_sends_the_fallback_dm_and_still_deletes() {
        let mut actions = MockMemberActions::new();
        actions
            .expect_roles()
            .returning(|| Ok(vec![(RoleId::new(1), "Admin".to_string())]));
        actions.expect_grant_role().never();
        actions
            .expect_direct_message()
            .withf(|text| text.as_str() == ROLE_MISSING_DM)
            .times(1)
            .returning(|_| Ok(()));
        actions.expect_delete_message().times(1).returning(|| Ok(()));

        assert_eq!(gate().handle(&actions, "?gelesen").await, GateOutcome::RoleMissing);
    }

    #[tokio::test]
    async fn other_messages_are_only_deleted() {
        let mut actions = MockMemberActions::new();
        actions.expect_roles().never();
        actions.expect_grant_role().never();
        actions.expect_direct_message().never();
        actions.expect_delete_message().times(1).returning(|| Ok(()));

        assert_eq!(gate().handle(&actions, "hallo").await, GateOutcome::Ignored);
        // Matching is case-sensitive.
        let mut actions = MockMemberActions::new();
        actions.expect_delete_message().times(1).returning(|| Ok(()));
        assert_eq!(gate().handle(&actions, "?Gelesen").await, GateOutcome::Ignored);
    }

    #[tokio::test]
    async fn role_match_is_exact() {
        let mut actions = MockMemberActions::new();
        actions
            .expect_roles()
            .returning(|| Ok(vec![(RoleId::new(3), "community".to_string())]));
        actions.expect_grant_role().never();
        actions.expect_direct_message().times(1).returning(|_| Ok(()));
        actions.expect_delete_message().times(1).returning(|| Ok(()));

        assert_eq!(gate().handle(&actions, "?gelesen").await, GateOutcome::RoleMissing);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_deletion() {
        let mut actions = MockMemberActions::new();
        actions.expect_roles().returning(|| Ok(roles()));
        actions
            .expect_grant_role()
            .returning(|_| Err(BotError::NotInGuild));
        actions
            .expect_delete_message()
            .times(1)
            .returning(|| Err(BotError::NotInGuild));

        assert_eq!(gate().handle(&actions, "?gelesen").await, GateOutcome::GrantFailed);
    }
}
