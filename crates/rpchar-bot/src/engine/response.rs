//! Per-event response builder.

use super::command::Command;
use super::param::{ExampleContext, ParamValue, COMMAND_PARAM};
use super::registry::CommandRegistry;
use crate::config::Config;
use crate::locale::Locale;
use crate::services::Services;
use crate::users::BotUser;
use character_store::{InteractionStatus, Store};
use kik_client::{InboundMessage, OutboundMessage};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Longest body sent in a single message, in characters.
pub const MAX_MESSAGE_LEN: usize = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Split at `separator` when too long.
    Text { body: String, separator: String },
    Picture { url: String },
}

/// Everything a handler sees and produces while answering one event.
pub struct ResponseContext {
    pub services: Arc<Services>,
    pub registry: Arc<CommandRegistry>,
    pub message: InboundMessage,
    pub user: BotUser,
    /// Body the command runs on, case preserved.
    pub body: String,
    /// Command token as typed.
    pub invoked: String,
    pub locale: Locale,
    pub command: Option<Arc<Command>>,
    /// Status stored when the event arrived.
    pub prior_status: InteractionStatus,
    /// Status persisted after the event.
    pub status: InteractionStatus,
    outputs: Vec<Output>,
    suggestions: Vec<String>,
    values: BTreeMap<String, (Option<String>, ParamValue)>,
}

impl ResponseContext {
    pub fn new(
        services: Arc<Services>,
        registry: Arc<CommandRegistry>,
        message: InboundMessage,
        user: BotUser,
        prior_status: InteractionStatus,
    ) -> Self {
        let locale = services.config.locale;
        Self {
            services,
            registry,
            message,
            user,
            body: String::new(),
            invoked: String::new(),
            locale,
            command: None,
            prior_status,
            status: InteractionStatus::None,
            outputs: Vec::new(),
            suggestions: Vec::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.services.config
    }

    pub fn store(&self) -> &Store {
        &self.services.store
    }

    pub fn bot_username(&self) -> &str {
        &self.services.config.bot_username
    }

    /// Whether the event arrived in the configured group chat.
    pub fn in_group_chat(&self) -> bool {
        let group = &self.config().kik_group_chat_id;
        !group.is_empty() && self.message.chat_id == *group
    }

    pub fn text(&mut self, body: impl Into<String>) {
        self.text_split(body, "\n");
    }

    /// A text preferably split at `separator` when too long.
    pub fn text_split(&mut self, body: impl Into<String>, separator: &str) {
        self.outputs.push(Output::Text {
            body: body.into(),
            separator: separator.to_string(),
        });
    }

    pub fn picture(&mut self, url: impl Into<String>) {
        self.outputs.push(Output::Picture { url: url.into() });
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Replace the suggested replies.
    pub fn suggest<I, S>(&mut self, suggestions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
    }

    pub fn add_suggestion(&mut self, suggestion: impl Into<String>) {
        self.suggestions.push(suggestion.into());
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn set_status(&mut self, status: InteractionStatus) {
        self.status = status;
    }

    pub(crate) fn bind(&mut self, values: BTreeMap<String, (Option<String>, ParamValue)>) {
        self.values = values;
    }

    pub fn param(&self, name: &str) -> &ParamValue {
        const NONE: &ParamValue = &ParamValue::None;
        self.values.get(name).map(|(_, v)| v).unwrap_or(NONE)
    }

    /// The text the parameter matched, as typed.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|(raw, _)| raw.as_deref())
    }

    pub fn text_param(&self, name: &str) -> Option<&str> {
        self.param(name).as_text()
    }

    pub fn number_param(&self, name: &str) -> Option<i64> {
        self.param(name).as_number()
    }

    pub fn list_param(&self, name: &str) -> Option<&[String]> {
        self.param(name).as_list()
    }

    /// A user id parameter, lowercase without `@`.
    pub fn user_param(&self, name: &str) -> Option<String> {
        self.raw(name)
            .map(|raw| raw.trim().trim_start_matches('@').to_lowercase())
            .filter(|id| !id.is_empty())
    }

    /// Every parameter as typed, in grammar order.
    pub fn raw_args(&self) -> Vec<String> {
        let Some(cmd) = &self.command else {
            return Vec::new();
        };
        cmd.params
            .iter()
            .skip(1)
            .filter_map(|p| self.raw(&p.name).map(str::to_string))
            .collect()
    }

    pub fn localized(&self, name: &str) -> String {
        self.registry.localized(name, self.locale)
    }

    pub fn example_context(&self) -> ExampleContext {
        ExampleContext {
            caller: self.user.id.clone(),
            admins: self.config().admin_list(),
        }
    }

    /// The current invocation with some parameters replaced.
    pub fn example_with(&self, overrides: &[(&str, String)]) -> String {
        let Some(cmd) = self.command.clone() else {
            return self.body.clone();
        };
        let mut args: BTreeMap<String, String> = cmd
            .params
            .iter()
            .filter_map(|p| self.raw(&p.name).map(|v| (p.name.clone(), v.to_string())))
            .collect();
        args.insert(COMMAND_PARAM.to_string(), self.invoked.clone());
        for (name, value) in overrides {
            args.insert((*name).to_string(), value.clone());
        }
        cmd.example(self.locale, &args)
    }

    /// An invocation of another command.
    pub fn example_for(&self, command: &str, args: &[(&str, String)]) -> String {
        let args: BTreeMap<String, String> = args
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        match self.registry.find(command) {
            Some(cmd) => cmd.example(self.locale, &args),
            None => std::iter::once(command.to_string())
                .chain(args.into_values())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Suggested reply with its command word in the display locale.
    fn normalize_suggestion(&self, suggestion: &str) -> String {
        let suggestion = suggestion.trim();
        match suggestion.split_once(char::is_whitespace) {
            Some((head, rest)) => format!("{} {}", self.localized(head), rest.trim_start()),
            None => self.localized(suggestion),
        }
    }

    /// Outbound messages; suggestions go to the last text message only.
    pub fn into_messages(self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        for output in &self.outputs {
            match output {
                Output::Text { body, separator } => {
                    for chunk in split_message(body, separator, MAX_MESSAGE_LEN) {
                        if !chunk.trim().is_empty() {
                            messages.push(OutboundMessage::text_reply(&self.message, chunk));
                        }
                    }
                }
                Output::Picture { url } => {
                    messages.push(OutboundMessage::picture_reply(&self.message, url.clone()));
                }
            }
        }

        if !self.suggestions.is_empty() {
            let suggestions: Vec<String> = self
                .suggestions
                .iter()
                .map(|s| self.normalize_suggestion(s))
                .collect();
            if let Some(last) = messages.iter_mut().rev().find(|m| m.is_text()) {
                last.set_suggestions(suggestions);
            }
        }
        messages
    }
}

/// Split `body` into chunks of at most `max` characters.
///
/// Prefers cutting at `separator`, then at newlines, then anywhere.
pub fn split_message(body: &str, separator: &str, max: usize) -> Vec<String> {
    if body.chars().count() <= max || max == 0 {
        return vec![body.to_string()];
    }
    if separator.is_empty() {
        let chars: Vec<char> = body.chars().collect();
        return chars.chunks(max).map(|c| c.iter().collect()).collect();
    }

    let fallback = if separator == "\n" { "" } else { "\n" };
    let sep_len = separator.chars().count();
    let mut chunks = Vec::new();
    let mut current: Option<(String, usize)> = None;

    for part in body.split(separator) {
        let part_len = part.chars().count();
        if part_len > max {
            if let Some((chunk, _)) = current.take() {
                chunks.push(chunk);
            }
            chunks.extend(split_message(part, fallback, max));
            continue;
        }

        current = match current.take() {
            Some((mut chunk, len)) if len + sep_len + part_len <= max => {
                chunk.push_str(separator);
                chunk.push_str(part);
                Some((chunk, len + sep_len + part_len))
            }
            Some((chunk, _)) => {
                chunks.push(chunk);
                Some((part.to_string(), part_len))
            }
            None => Some((part.to_string(), part_len)),
        };
    }
    if let Some((chunk, _)) = current {
        chunks.push(chunk);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_bodies_stay_whole() {
        assert_eq!(split_message("hallo", "\n", 10), vec!["hallo"]);
    }

    #[test]
    fn test_split_prefers_separator() {
        let body = ["a".repeat(6), "b".repeat(6), "c".repeat(3)].join("---");
        let chunks = split_message(&body, "---", 12);
        assert_eq!(chunks, vec!["aaaaaa", "bbbbbb---ccc"]);
        assert_eq!(chunks.join("---"), body);
    }

    #[test]
    fn test_split_falls_back_to_newlines_and_hard_cuts() {
        let body = format!("{}\n{}", "x".repeat(8), "y".repeat(25));
        let chunks = split_message(&body, "\n", 10);
        assert_eq!(chunks[0], "x".repeat(8));
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks[1..].concat(), "y".repeat(25));
    }

    #[test]
    fn test_split_reassembles_for_any_length() {
        let lines: Vec<String> = (0..400).map(|i| format!("Zeile {i} äöü")).collect();
        let body = lines.join("\n");
        for max in [20, 150, 1500] {
            let chunks = split_message(&body, "\n", max);
            assert!(chunks.iter().all(|c| c.chars().count() <= max));
            assert_eq!(chunks.join("\n"), body);
        }
    }
}
