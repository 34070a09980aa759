//! Human-readable command structure and the command info text.

use super::command::Command;
use super::param::{ExampleContext, COMMAND_PARAM};
use crate::locale::Locale;
use std::collections::BTreeMap;

/// `name <required> (<optional>) …`
pub fn help_desc(cmd: &Command, shown_name: &str) -> String {
    let mut parts = vec![shown_name.to_string()];
    for param in cmd.params.iter().skip(1) {
        if param.required {
            parts.push(format!("<{}>", param.name));
        } else {
            parts.push(format!("(<{}>)", param.name));
        }
    }
    parts.join(" ")
}

/// Structure, examples and aliases of `cmd`.
pub fn command_info(cmd: &Command, ctx: &ExampleContext, locale: Locale) -> String {
    let name = cmd.names.get(locale).to_string();
    let mut fixed = BTreeMap::new();
    fixed.insert(COMMAND_PARAM.to_string(), name.clone());

    let aliases: Vec<&str> = cmd
        .names
        .all()
        .into_iter()
        .filter(|n| *n != name)
        .collect();

    let mut text = format!(
        "Befehl '{name}'\n\nDie Struktur des Befehls sieht wie folgt aus:\n{}\n\n{}",
        help_desc(cmd, &name),
        cmd.random_example_text(ctx, locale, 5, &fixed)
    );
    if !aliases.is_empty() {
        text.push_str(&format!("\n\nAlternative Befehle: {}", aliases.join(", ")));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::CommandHandler;
    use crate::engine::param::Param;
    use crate::engine::response::ResponseContext;
    use crate::error::AppResult;
    use crate::locale::Names;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn execute(&self, _ctx: &mut ResponseContext) -> AppResult<()> {
            Ok(())
        }
    }

    fn add() -> Command {
        Command::builder(Names::new("Hinzufügen", "add"), Arc::new(Noop))
            .param(Param::user_id("user_id").validate_in_message())
            .param(Param::text("text"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_help_desc_brackets() {
        assert_eq!(help_desc(&add(), "add"), "add <user_id> <text>");

        let list = Command::builder(Names::new("Liste", "list"), Arc::new(Noop))
            .param(Param::digits("page").optional())
            .build()
            .unwrap();
        assert_eq!(help_desc(&list, "Liste"), "Liste (<page>)");
    }

    #[test]
    fn test_command_info_lists_aliases() {
        let dice = Command::builder(
            Names::new("Würfeln", "dice").with_alts(["Würfel"]),
            Arc::new(Noop),
        )
        .param(Param::text("expression").optional())
        .build()
        .unwrap();

        let text = command_info(&dice, &ExampleContext::default(), Locale::En);
        assert!(text.starts_with("Befehl 'dice'"));
        assert!(text.contains("dice (<expression>)"));
        assert!(text.ends_with("Alternative Befehle: Würfeln, Würfel"));
    }
}
