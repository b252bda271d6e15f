//! Static command table.
//!
//! Matching is literal and case-sensitive: simple commands must be the whole
//! message (`?invite`), argument commands are the keyword followed by
//! whitespace and a free-text tail (`?play never gonna give you up`).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Invite,
    Join,
    Summon,
    Play,
    Clip,
    Clips,
    Volume,
    Pause,
    Resume,
    Stop,
    Skip,
    Playing,
    Queue,
    Price,
    Help,
}

/// Where a command is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only in the configured bot channel.
    BotChannel,
    /// Any text channel of a guild; never direct messages.
    Anywhere,
}

impl Scope {
    pub fn allows(self, channel_name: Option<&str>, bot_channel: &str) -> bool {
        match self {
            Scope::Anywhere => channel_name.is_some(),
            Scope::BotChannel => channel_name == Some(bot_channel),
        }
    }
}

#[derive(Debug)]
pub struct CommandSpec {
    pub keyword: &'static str,
    pub kind: CommandKind,
    /// Name of the free-text argument, `None` for simple commands.
    pub argument: Option<&'static str>,
    pub scope: Scope,
    pub description: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        keyword: "invite",
        kind: CommandKind::Invite,
        argument: None,
        scope: Scope::BotChannel,
        description: "Einladungslink zum Server",
    },
    CommandSpec {
        keyword: "join",
        kind: CommandKind::Join,
        argument: Some("Kanalname"),
        scope: Scope::Anywhere,
        description: "Betritt den angegebenen Sprachkanal",
    },
    CommandSpec {
        keyword: "summon",
        kind: CommandKind::Summon,
        argument: None,
        scope: Scope::Anywhere,
        description: "Holt den Bot in deinen Sprachkanal",
    },
    CommandSpec {
        keyword: "play",
        kind: CommandKind::Play,
        argument: Some("Titel oder URL"),
        scope: Scope::Anywhere,
        description: "Spielt ein Lied ab oder reiht es ein",
    },
    CommandSpec {
        keyword: "clip",
        kind: CommandKind::Clip,
        argument: Some("Clipname"),
        scope: Scope::Anywhere,
        description: "Spielt einen lokalen Clip ab",
    },
    CommandSpec {
        keyword: "clips",
        kind: CommandKind::Clips,
        argument: None,
        scope: Scope::Anywhere,
        description: "Listet alle Clips",
    },
    CommandSpec {
        keyword: "volume",
        kind: CommandKind::Volume,
        argument: Some("0-100"),
        scope: Scope::Anywhere,
        description: "Setzt die Lautstärke",
    },
    CommandSpec {
        keyword: "pause",
        kind: CommandKind::Pause,
        argument: None,
        scope: Scope::Anywhere,
        description: "Pausiert die Wiedergabe",
    },
    CommandSpec {
        keyword: "resume",
        kind: CommandKind::Resume,
        argument: None,
        scope: Scope::Anywhere,
        description: "Setzt die Wiedergabe fort",
    },
    CommandSpec {
        keyword: "stop",
        kind: CommandKind::Stop,
        argument: None,
        scope: Scope::Anywhere,
        description: "Verlässt den Sprachkanal und leert die Warteschlange",
    },
    CommandSpec {
        keyword: "skip",
        kind: CommandKind::Skip,
        argument: None,
        scope: Scope::Anywhere,
        description: "Stimmt für das Überspringen des aktuellen Lieds",
    },
    CommandSpec {
        keyword: "playing",
        kind: CommandKind::Playing,
        argument: None,
        scope: Scope::Anywhere,
        description: "Zeigt, was gerade läuft",
    },
    CommandSpec {
        keyword: "queue",
        kind: CommandKind::Queue,
        argument: None,
        scope: Scope::Anywhere,
        description: "Zeigt die Warteschlange",
    },
    CommandSpec {
        keyword: "btc",
        kind: CommandKind::Price,
        argument: None,
        scope: Scope::Anywhere,
        description: "Aktueller Bitcoin-Kurs",
    },
    CommandSpec {
        keyword: "help",
        kind: CommandKind::Help,
        argument: None,
        scope: Scope::Anywhere,
        description: "Diese Liste",
    },
];

/// A matched command and its argument tail.
#[derive(Debug, PartialEq)]
pub struct Invocation<'a> {
    pub kind: CommandKind,
    pub scope: Scope,
    pub args: &'a str,
}

pub struct CommandTable {
    prefix: String,
}

impl CommandTable {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn parse<'a>(&self, content: &'a str) -> Option<Invocation<'a>> {
        let rest = content.strip_prefix(self.prefix.as_str())?;

        COMMANDS.iter().find_map(|spec| {
            let args = match spec.argument {
                None if rest == spec.keyword => "",
                None => return None,
                Some(_) => {
                    let tail = rest.strip_prefix(spec.keyword)?;
                    if !tail.is_empty() && !tail.starts_with(char::is_whitespace) {
                        return None;
                    }
                    tail.trim()
                }
            };

            Some(Invocation {
                kind: spec.kind,
                scope: spec.scope,
                args,
            })
        })
    }

    pub fn help_text(&self) -> String {
        let mut text = String::from("**Befehle:**\n");
        for spec in COMMANDS {
            let usage = match spec.argument {
                Some(arg) => format!("{}{} <{}>", self.prefix, spec.keyword, arg),
                None => format!("{}{}", self.prefix, spec.keyword),
            };
            text.push_str(&format!("`{}` - {}\n", usage, spec.description));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> CommandTable {
        CommandTable::new("?")
    }

    #[test]
    fn simple_commands_need_an_exact_match() {
        let table = table();
        assert_eq!(table.parse("?invite").map(|i| i.kind), Some(CommandKind::Invite));
        assert_eq!(table.parse("?invite please"), None);
        assert_eq!(table.parse("?Invite"), None);
        assert_eq!(table.parse("invite"), None);
        assert_eq!(table.parse(" ?invite"), None);
    }

    #[test]
    fn argument_commands_get_the_trimmed_tail() {
        let table = table();
        let play = table.parse("?play  never gonna give you up ").unwrap();
        assert_eq!(play.kind, CommandKind::Play);
        assert_eq!(play.args, "never gonna give you up");

        assert_eq!(table.parse("?play").unwrap().args, "");
        assert_eq!(table.parse("?volume 80").unwrap().args, "80");
        assert_eq!(table.parse("?playlist"), None);
    }

    #[test]
    fn similar_keywords_do_not_shadow_each_other() {
        let table = table();
        assert_eq!(table.parse("?clips").map(|i| i.kind), Some(CommandKind::Clips));
        assert_eq!(table.parse("?clip airhorn").map(|i| i.kind), Some(CommandKind::Clip));
        assert_eq!(table.parse("?playing").map(|i| i.kind), Some(CommandKind::Playing));
        assert_eq!(table.parse("?play x").map(|i| i.kind), Some(CommandKind::Play));
    }

    #[test]
    fn invite_is_scoped_to_the_bot_channel() {
        let invite = table().parse("?invite").unwrap();
        assert!(invite.scope.allows(Some("bot"), "bot"));
        assert!(!invite.scope.allows(Some("general"), "bot"));
        assert!(!invite.scope.allows(None, "bot"));
        assert!(Scope::Anywhere.allows(Some("general"), "bot"));
        // No channel name means a direct message.
        assert!(!Scope::Anywhere.allows(None, "bot"));
    }

    #[test]
    fn other_prefixes_work() {
        let table = CommandTable::new("!");
        assert_eq!(table.parse("!skip").map(|i| i.kind), Some(CommandKind::Skip));
        assert_eq!(table.parse("?skip"), None);
        assert!(table.help_text().contains("`!play <Titel oder URL>`"));
    }
}
