//! Command descriptors: names, grammar, requirements and handler.

use super::help::help_desc;
use super::param::{ExampleContext, Param, ParamValue, COMMAND_PARAM};
use super::response::ResponseContext;
use crate::error::AppResult;
use crate::locale::{Locale, Names};
use async_trait::async_trait;
use rand::Rng;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Executes a command once its grammar matched and its requirements passed.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()>;
}

/// Who may run a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub admin: bool,
    pub authed: bool,
    /// Authed, and membership of the group chat alone does not count.
    pub authed_strict: bool,
    pub group: bool,
    /// Parameter that must name the caller unless the caller is an admin.
    pub self_param: Option<String>,
}

/// A registered command.
pub struct Command {
    pub names: Names,
    pub params: Vec<Param>,
    pub requirements: Requirements,
    pub hidden: bool,
    /// Suggested when the caller lacks permission.
    pub help_command: String,
    regex: Regex,
    handler: Arc<dyn CommandHandler>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("names", &self.names)
            .field("params", &self.params)
            .field("requirements", &self.requirements)
            .field("hidden", &self.hidden)
            .finish()
    }
}

/// Builder for [`Command`].
pub struct CommandBuilder {
    names: Names,
    params: Vec<Param>,
    requirements: Requirements,
    hidden: bool,
    help_command: Option<String>,
    handler: Arc<dyn CommandHandler>,
}

impl CommandBuilder {
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn require_admin(mut self) -> Self {
        self.requirements.admin = true;
        self
    }

    pub fn require_authed(mut self) -> Self {
        self.requirements.authed = true;
        self
    }

    pub fn require_authed_strict(mut self) -> Self {
        self.requirements.authed = true;
        self.requirements.authed_strict = true;
        self
    }

    pub fn require_group(mut self) -> Self {
        self.requirements.group = true;
        self
    }

    pub fn require_self(mut self, param: &str) -> Self {
        self.requirements.self_param = Some(param.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn help_command(mut self, name: &str) -> Self {
        self.help_command = Some(name.to_string());
        self
    }

    /// Compile the grammar.
    pub fn build(self) -> AppResult<Command> {
        let command_param = Param::command(&self.names.all());
        let mut params = Vec::with_capacity(self.params.len() + 1);
        params.push(command_param);
        params.extend(self.params);

        let body: String = params
            .iter()
            .enumerate()
            .map(|(i, p)| p.fragment(i))
            .collect();
        let regex = RegexBuilder::new(&format!(r"^\s*{body}\s*$"))
            .case_insensitive(true)
            .multi_line(true)
            .build()?;

        let help_command = self.help_command.unwrap_or_else(|| {
            if self.requirements.admin {
                "Admin-Hilfe".to_string()
            } else {
                "Hilfe".to_string()
            }
        });

        Ok(Command {
            names: self.names,
            params,
            requirements: self.requirements,
            hidden: self.hidden,
            help_command,
            regex,
            handler: self.handler,
        })
    }
}

impl Command {
    pub fn builder(names: Names, handler: Arc<dyn CommandHandler>) -> CommandBuilder {
        CommandBuilder {
            names,
            params: Vec::new(),
            requirements: Requirements::default(),
            hidden: false,
            help_command: None,
            handler,
        }
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn is_admin_only(&self) -> bool {
        self.requirements.admin
    }

    /// Match `body` against the grammar; the match must cover the whole input.
    pub fn parse(&self, body: &str) -> Option<BTreeMap<String, (Option<String>, ParamValue)>> {
        let body = body.trim();
        let caps = self.regex.captures(body)?;
        if caps.get(0).map(|m| m.start()) != Some(0) {
            return None;
        }

        Some(
            self.params
                .iter()
                .map(|p| {
                    let raw = caps.name(&p.name).map(|m| m.as_str().to_string());
                    (p.name.clone(), (raw, p.extract(&caps)))
                })
                .collect(),
        )
    }

    /// Run the requirement checks, bind the parameters and call the handler.
    pub async fn run(self: &Arc<Self>, ctx: &mut ResponseContext) -> AppResult<()> {
        ctx.command = Some(Arc::clone(self));

        if self.requirements.admin && !ctx.user.is_admin {
            debug!("{} denied {}: admin required", ctx.user.id, self.names.de);
            ctx.text(
                "Du bist nicht berechtigt diesen Befehl auszuführen!\n\
                 Nur Admins können diesen Befehl ausführen.",
            );
            ctx.suggest([self.help_command.clone()]);
            return Ok(());
        }

        if self.requirements.authed && !self.caller_is_authed(ctx) {
            debug!("{} denied {}: auth required", ctx.user.id, self.names.de);
            let group = ctx.config().kik_group.clone();
            let help = ctx.localized("Hilfe");
            ctx.text(format!(
                "Du bist nicht berechtigt diesen Befehl auszuführen!\n\
                 Bitte melde dich in der Gruppe #{group} und erfrage eine Berechtigung."
            ));
            ctx.suggest([help]);
            return Ok(());
        }

        if self.requirements.group && !ctx.in_group_chat() {
            let group = ctx.config().kik_group.clone();
            let help = ctx.localized("Hilfe");
            ctx.text(format!(
                "Dieser Befehl kann nur in der Gruppe #{group} ausgeführt werden."
            ));
            ctx.suggest([help]);
            return Ok(());
        }

        let Some(bound) = self.parse(&ctx.body) else {
            self.reply_usage(ctx);
            return Ok(());
        };
        ctx.bind(bound);

        if let Some(param) = &self.requirements.self_param {
            if let Some(target) = ctx.user_param(param) {
                if target != ctx.user.id && !ctx.user.is_admin {
                    ctx.text("Du kannst diesen Befehl nur für dich selbst ausführen.");
                    ctx.suggest([self.help_command.clone()]);
                    return Ok(());
                }
            }
        }

        self.handler.execute(ctx).await
    }

    fn caller_is_authed(&self, ctx: &ResponseContext) -> bool {
        ctx.user.is_admin
            || ctx.user.is_authed
            || (!self.requirements.authed_strict && ctx.in_group_chat())
    }

    /// Reply with the grammar and a few valid invocations.
    pub fn reply_usage(&self, ctx: &mut ResponseContext) {
        let invoked = ctx.invoked.clone();
        let mut fixed = BTreeMap::new();
        fixed.insert(COMMAND_PARAM.to_string(), invoked.clone());

        let examples =
            self.random_example_text(&ctx.example_context(), ctx.locale, 3, &fixed);
        let info = ctx.localized("Befehl-Info");

        ctx.text(format!(
            "Fehler beim Aufruf des Befehls.\n\n\
             Die Struktur des Befehls sieht wie folgt aus:\n{}\n\n{}\n\n\
             Für weitere Beispiele siehe '{} {}'.",
            help_desc(self, &invoked),
            examples,
            info,
            invoked
        ));
        ctx.suggest([format!("{info} {invoked}"), self.help_command.clone()]);
    }

    /// Render an invocation from parameter values given as typed text.
    pub fn example(&self, locale: Locale, args: &BTreeMap<String, String>) -> String {
        let mut out = args
            .get(COMMAND_PARAM)
            .cloned()
            .unwrap_or_else(|| self.names.get(locale).to_string());
        for param in self.params.iter().skip(1) {
            if let Some(value) = args.get(&param.name) {
                out.push(' ');
                out.push_str(value);
            }
        }
        out
    }

    /// Random parameter values; required ones always, optional ones half the time.
    pub fn random_example_args<R: Rng + ?Sized>(
        &self,
        ctx: &ExampleContext,
        fixed: &BTreeMap<String, String>,
        rng: &mut R,
    ) -> BTreeMap<String, String> {
        let mut args = BTreeMap::new();
        for param in &self.params {
            if let Some(value) = fixed.get(&param.name) {
                args.insert(param.name.clone(), value.clone());
                continue;
            }
            if !param.required && !rng.gen_bool(0.5) {
                continue;
            }
            if let Some(value) = param.random_example(ctx, rng) {
                args.insert(param.name.clone(), value);
            }
        }
        args
    }

    pub fn random_example(
        &self,
        ctx: &ExampleContext,
        locale: Locale,
        fixed: &BTreeMap<String, String>,
    ) -> String {
        let args = self.random_example_args(ctx, fixed, &mut rand::thread_rng());
        self.example(locale, &args)
    }

    /// Up to `n` distinct random examples under a short heading.
    pub fn random_example_text(
        &self,
        ctx: &ExampleContext,
        locale: Locale,
        n: usize,
        fixed: &BTreeMap<String, String>,
    ) -> String {
        let mut examples: Vec<String> = Vec::with_capacity(n);
        for _ in 0..n * 10 {
            if examples.len() >= n {
                break;
            }
            let example = self.random_example(ctx, locale, fixed);
            if !examples.contains(&example) {
                examples.push(example);
            }
        }

        let heading = match examples.len() {
            1 => "Hier ist ein zufälliges Beispiel".to_string(),
            count => format!("Hier sind {} zufällige Beispiele", number_word(count)),
        };
        let lines: Vec<String> = examples.iter().map(|e| format!("→ {e}")).collect();
        format!("{heading}:\n{}", lines.join("\n"))
    }
}

fn number_word(n: usize) -> String {
    match n {
        2 => "zwei".into(),
        3 => "drei".into(),
        4 => "vier".into(),
        5 => "fünf".into(),
        6 => "sechs".into(),
        7 => "sieben".into(),
        8 => "acht".into(),
        9 => "neun".into(),
        10 => "zehn".into(),
        11 => "elf".into(),
        12 => "zwölf".into(),
        n => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::param::Examples;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn execute(&self, _ctx: &mut ResponseContext) -> AppResult<()> {
            Ok(())
        }
    }

    fn show() -> Command {
        Command::builder(
            Names::new("Anzeigen", "show").with_alts(["Steckbrief"]),
            Arc::new(Noop),
        )
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .param(Param::alpha("char_name").optional())
        .build()
        .unwrap()
    }

    fn ctx() -> ExampleContext {
        ExampleContext {
            caller: "alice".into(),
            admins: vec!["admin1".into()],
        }
    }

    #[test]
    fn test_first_param_is_command() {
        let cmd = show();
        assert_eq!(cmd.params[0].name, COMMAND_PARAM);
        let Examples::Static(names) = &cmd.params[0].examples else {
            panic!("static examples expected");
        };
        assert_eq!(names, &vec!["Anzeigen", "show", "Steckbrief"]);
    }

    #[test]
    fn test_parse_binds_values() {
        let cmd = show();
        let bound = cmd.parse("  SHOW @Alice 2  ").unwrap();
        assert_eq!(bound["command"].0.as_deref(), Some("SHOW"));
        assert_eq!(bound["user_id"].0.as_deref(), Some("@Alice"));
        assert_eq!(bound["char_id"].1, ParamValue::Number(2));
        assert_eq!(bound["char_name"].1, ParamValue::None);
    }

    #[test]
    fn test_parse_requires_full_match() {
        let cmd = show();
        assert!(cmd.parse("show @alice 2 3 4").is_none());
        assert!(cmd.parse("show\n@alice").is_some());
    }

    #[test]
    fn test_examples_round_trip() {
        let cmd = show();
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let args = cmd.random_example_args(&ctx(), &BTreeMap::new(), &mut rng);
            let example = cmd.example(Locale::De, &args);
            let bound = cmd
                .parse(&example)
                .unwrap_or_else(|| panic!("{example} does not parse"));
            for (name, value) in &args {
                assert_eq!(bound[name].0.as_deref(), Some(value.as_str()), "{example}");
            }
        }
    }

    #[test]
    fn test_random_example_text_respects_fixed_command() {
        let cmd = show();
        let mut fixed = BTreeMap::new();
        fixed.insert(COMMAND_PARAM.to_string(), "stecki".to_string());

        let text = cmd.random_example_text(&ctx(), Locale::De, 3, &fixed);
        let (heading, lines) = text.split_once('\n').unwrap();
        assert!(heading.starts_with("Hier sind") || heading.starts_with("Hier ist"));
        for line in lines.lines() {
            assert!(line.starts_with("→ stecki"), "{line}");
        }
    }

    #[test]
    fn test_admin_commands_point_to_admin_help() {
        let cmd = Command::builder(Names::new("Entmachten", "unauth"), Arc::new(Noop))
            .param(Param::user_id("user_id"))
            .require_admin()
            .build()
            .unwrap();
        assert_eq!(cmd.help_command, "Admin-Hilfe");
        assert_eq!(show().help_command, "Hilfe");
    }
}
