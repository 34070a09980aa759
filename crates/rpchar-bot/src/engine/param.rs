//! Typed command parameters.
//!
//! Each parameter contributes one regex fragment to the composite command
//! grammar and knows how to pull its value back out of the captures.

use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex, RegexBuilder};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

pub const ALPHA: &str = r"[a-zäöüß]+";
pub const ALPHANUM: &str = r"[a-zäöüß0-9]+";
pub const NUM: &str = r"[0-9]+";
pub const SIGNED: &str = r"[\-\+]?[0-9]+";
pub const USER_ID: &str = r"@[a-z0-9\.\_]+";
pub const COMMAND: &str = r"\S+";
pub const TEXT: &str = r"(?s:.+)";
pub const QUOTED: &str = r#""[^"]+"|[^"\s]+"#;

/// Name of the synthetic first parameter holding the invoked command.
pub const COMMAND_PARAM: &str = "command";

/// Value bound to a parameter after a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParamValue {
    #[default]
    None,
    Text(String),
    List(Vec<String>),
    Number(i64),
}

impl ParamValue {
    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// What example producers may look at.
#[derive(Debug, Clone, Default)]
pub struct ExampleContext {
    /// Id of the user asking, lowercase without `@`.
    pub caller: String,
    /// Configured admin ids, lowercase without `@`.
    pub admins: Vec<String>,
}

impl ExampleContext {
    /// A plausible `@user` for examples: an admin or the caller.
    pub fn random_user<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut users: Vec<&str> = self.admins.iter().map(String::as_str).collect();
        if !self.caller.is_empty() && self.caller.len() != kik_client::ALIASED_ID_LEN {
            users.push(&self.caller);
        }
        users.retain(|u| !u.is_empty());
        match users.choose(rng) {
            Some(user) => format!("@{user}"),
            None => "@admin".to_string(),
        }
    }
}

pub type ExampleFn = dyn Fn(&ExampleContext) -> String + Send + Sync;

/// Where a parameter's examples come from.
#[derive(Clone)]
pub enum Examples {
    Static(Vec<String>),
    Range(RangeInclusive<i64>),
    Callback(Arc<ExampleFn>),
}

impl Examples {
    pub fn of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Examples::Static(values.into_iter().map(Into::into).collect())
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&ExampleContext) -> String + Send + Sync + 'static,
    {
        Examples::Callback(Arc::new(f))
    }

    fn pick<R: Rng + ?Sized>(&self, ctx: &ExampleContext, rng: &mut R) -> Option<String> {
        match self {
            Examples::Static(values) => values.choose(rng).cloned(),
            Examples::Range(range) if !range.is_empty() => {
                Some(rng.gen_range(range.clone()).to_string())
            }
            Examples::Range(_) => None,
            Examples::Callback(f) => Some(f(ctx)),
        }
    }
}

impl fmt::Debug for Examples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Examples::Static(values) => f.debug_tuple("Static").field(values).finish(),
            Examples::Range(range) => f.debug_tuple("Range").field(range).finish(),
            Examples::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Computes a parameter's value from the captures of the whole command.
pub trait Extract: Send + Sync {
    fn extract(&self, name: &str, caps: &Captures<'_>) -> ParamValue;
}

/// The text of the parameter's own group.
struct TextExtract;

impl Extract for TextExtract {
    fn extract(&self, name: &str, caps: &Captures<'_>) -> ParamValue {
        caps.name(name)
            .map(|m| ParamValue::Text(m.as_str().to_string()))
            .unwrap_or_default()
    }
}

struct NumberExtract;

impl Extract for NumberExtract {
    fn extract(&self, name: &str, caps: &Captures<'_>) -> ParamValue {
        caps.name(name)
            .and_then(|m| m.as_str().parse().ok())
            .map(ParamValue::Number)
            .unwrap_or_default()
    }
}

/// Strips surrounding double quotes.
struct QuotedExtract;

impl Extract for QuotedExtract {
    fn extract(&self, name: &str, caps: &Captures<'_>) -> ParamValue {
        caps.name(name)
            .map(|m| {
                let s = m.as_str();
                let s = s.strip_prefix('"').unwrap_or(s);
                let s = s.strip_suffix('"').unwrap_or(s);
                ParamValue::Text(s.to_string())
            })
            .unwrap_or_default()
    }
}

/// Head plus every comma-separated repetition found in the tail.
struct MultiExtract {
    item: Regex,
}

impl Extract for MultiExtract {
    fn extract(&self, name: &str, caps: &Captures<'_>) -> ParamValue {
        let Some(head) = caps.name(&format!("{name}_head")) else {
            return ParamValue::None;
        };
        let mut items = vec![head.as_str().to_string()];
        if let Some(tail) = caps.name(&format!("{name}_tail")) {
            items.extend(
                self.item
                    .captures_iter(tail.as_str())
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str().to_string()),
            );
        }
        ParamValue::List(items)
    }
}

/// Sums the alternative duration spellings into minutes.
struct DurationExtract;

impl Extract for DurationExtract {
    fn extract(&self, name: &str, caps: &Captures<'_>) -> ParamValue {
        let group = |suffix: &str| caps.name(&format!("{name}_{suffix}")).map(|m| m.as_str());
        let number = |suffix: &str| group(suffix).and_then(|s| s.parse::<i64>().ok());

        // Too many digits for i64 counts as no duration at all.
        let mut parts: Vec<Option<i64>> = Vec::new();
        for suffix in ["mins_1", "mins_2", "mins_3"] {
            if group(suffix).is_some() {
                parts.push(number(suffix));
            }
        }
        if let Some(dec) = group("hours_dec") {
            if let Ok(fraction) = format!("0.{dec}").parse::<f64>() {
                parts.push(Some((fraction * 60.0).round() as i64));
            }
        }
        if group("hours").is_some() {
            parts.push(number("hours").and_then(|h| h.checked_mul(60)));
        }

        if parts.is_empty() {
            return ParamValue::None;
        }
        parts
            .into_iter()
            .try_fold(0_i64, |total, part| total.checked_add(part?))
            .map_or(ParamValue::None, ParamValue::Number)
    }
}

/// A typed slot in a command's grammar.
#[derive(Clone)]
pub struct Param {
    pub name: String,
    pub regex: String,
    pub required: bool,
    /// Optional in the grammar; the handler re-prompts when absent.
    pub validate_in_message: bool,
    pub examples: Examples,
    pub default: Option<String>,
    extractor: Arc<dyn Extract>,
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("regex", &self.regex)
            .field("required", &self.required)
            .field("validate_in_message", &self.validate_in_message)
            .field("examples", &self.examples)
            .finish()
    }
}

impl Param {
    pub fn new(name: impl Into<String>, regex: impl Into<String>, examples: Examples) -> Self {
        Self {
            name: name.into(),
            regex: regex.into(),
            required: true,
            validate_in_message: false,
            examples,
            default: None,
            extractor: Arc::new(TextExtract),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn validate_in_message(mut self) -> Self {
        self.validate_in_message = true;
        self
    }

    pub fn examples(mut self, examples: Examples) -> Self {
        self.examples = examples;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn extractor(mut self, extractor: impl Extract + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// The synthetic first parameter; `names` are the command's spellings.
    pub fn command(names: &[&str]) -> Self {
        Self::new(COMMAND_PARAM, COMMAND, Examples::of(names.iter().copied()))
    }

    pub fn alpha(name: &str) -> Self {
        Self::new(name, ALPHA, Examples::of(["Mira", "Tom", "Lea"]))
    }

    pub fn alphanumeric(name: &str) -> Self {
        Self::new(name, ALPHANUM, Examples::of(["abc", "x1", "Zwerg2"]))
    }

    pub fn digits(name: &str) -> Self {
        Self::new(name, NUM, Examples::Range(1..=10)).extractor(NumberExtract)
    }

    pub fn signed(name: &str) -> Self {
        Self::new(name, SIGNED, Examples::of(["-3", "+2", "5"])).extractor(NumberExtract)
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, TEXT, Examples::of(["Text"]))
    }

    /// A double-quoted phrase or a single word; quotes are stripped.
    pub fn quoted(name: &str) -> Self {
        Self::new(name, QUOTED, Examples::of(["\"Text\""])).extractor(QuotedExtract)
    }

    pub fn user_id(name: &str) -> Self {
        Self::new(
            name,
            USER_ID,
            Examples::callback(|ctx| ctx.random_user(&mut rand::thread_rng())),
        )
    }

    pub fn char_id(name: &str) -> Self {
        Self::new(name, NUM, Examples::Range(1..=3)).extractor(NumberExtract)
    }

    /// One of `options`, matched case-insensitively.
    pub fn selection(name: &str, options: &[&str]) -> Self {
        Self::new(
            name,
            alternation(options),
            Examples::of(options.iter().copied()),
        )
    }

    /// A comma-separated list drawn from `options`.
    pub fn multi_selection(name: &str, options: &[&str]) -> Self {
        let alt = alternation(options);
        let regex = format!(r"(?P<{name}_head>{alt})(?P<{name}_tail>(\s*,\s*{alt})*)");
        let item = RegexBuilder::new(&format!(r"\s*,\s*({alt})"))
            .case_insensitive(true)
            .build();

        let param = Self::new(name, regex, Examples::of(options.iter().copied()));
        match item {
            Ok(item) => param.extractor(MultiExtract { item }),
            // Unreachable: the alternation is built from escaped literals.
            Err(_) => param,
        }
    }

    /// A duration such as `3:12`, `2,5h`, `3h 25min` or `90min`, bound as minutes.
    pub fn duration_minutes(name: &str) -> Self {
        let hour_unit = r"(\s*(h|std))";
        let colon = format!(r":(?P<{name}_mins_1>[0-9]{{1,2}}){hour_unit}?");
        let dec = format!(r"[\.,](?P<{name}_hours_dec>[0-9]+){hour_unit}?");
        let min2 = format!(r"(?P<{name}_mins_2>[0-9]+)\s*(m|min)");
        let min3 = format!(r"(?P<{name}_mins_3>[0-9]+)\s*(m|min)");
        let hours = format!(r"(?P<{name}_hours>[0-9]+)");
        let regex = format!(
            r"(({hours}(({colon})|({dec})|({hour_unit}?\s+{min2})|({hour_unit}))?)|({min3}))"
        );

        Self::new(
            name,
            regex,
            Examples::of([
                "3:12", "14:22", "12:0", "0:22", "8:00", "3:12h", "14:22 h", "3h 25min",
                "3 25min", "3min", "3h 25 min", "325min", "3", "3h", "322h", "0", "0h", "0:0",
                "1,23", "2,2", "3,5", "1.23", "2.2", "3.5", "1,23h", "1.23 h", "3.5h",
            ]),
        )
        .extractor(DurationExtract)
    }

    /// Whether the grammar may omit this parameter.
    pub fn is_optional_in_grammar(&self) -> bool {
        !self.required || self.validate_in_message
    }

    /// The fragment this parameter contributes at `position`.
    pub fn fragment(&self, position: usize) -> String {
        let quantifier = if self.is_optional_in_grammar() { "?" } else { "" };
        if position == 0 {
            format!("(?P<{}>{}){}", self.name, self.regex, quantifier)
        } else {
            format!(r"(\s+(?P<{}>{})){}", self.name, self.regex, quantifier)
        }
    }

    /// Extract the value, falling back to the default when absent.
    pub fn extract(&self, caps: &Captures<'_>) -> ParamValue {
        match self.extractor.extract(&self.name, caps) {
            ParamValue::None => self
                .default
                .clone()
                .map(ParamValue::Text)
                .unwrap_or_default(),
            value => value,
        }
    }

    pub fn random_example<R: Rng + ?Sized>(
        &self,
        ctx: &ExampleContext,
        rng: &mut R,
    ) -> Option<String> {
        self.examples.pick(ctx, rng)
    }
}

fn alternation(options: &[&str]) -> String {
    let escaped: Vec<String> = options
        .iter()
        .map(|o| regex::escape(&o.to_lowercase()))
        .collect();
    format!("({})", escaped.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar(params: &[Param]) -> Regex {
        let body: String = params
            .iter()
            .enumerate()
            .map(|(i, p)| p.fragment(i))
            .collect();
        RegexBuilder::new(&format!(r"^\s*{body}\s*$"))
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .unwrap()
    }

    fn duration_of(input: &str) -> ParamValue {
        let params = [Param::command(&["work"]), Param::duration_minutes("duration")];
        let re = grammar(&params);
        let line = format!("work {input}");
        let caps = re
            .captures(&line)
            .unwrap_or_else(|| panic!("no match for {input:?}"));
        params[1].extract(&caps)
    }

    #[test]
    fn test_fragment_positions() {
        let p = Param::digits("page").optional();
        assert_eq!(p.fragment(0), "(?P<page>[0-9]+)?");
        assert_eq!(p.fragment(1), r"(\s+(?P<page>[0-9]+))?");

        let required = Param::text("text");
        assert_eq!(required.fragment(2), r"(\s+(?P<text>(?s:.+)))");

        let soft = Param::user_id("user_id").validate_in_message();
        assert!(soft.fragment(1).ends_with(")?"));
    }

    #[test]
    fn test_duration_spellings() {
        let cases = [
            ("3:12", 192),
            ("12:0", 720),
            ("3:12h", 192),
            ("14:22 h", 862),
            ("3h 25min", 205),
            ("3 25min", 205),
            ("3h 25 min", 205),
            ("3min", 3),
            ("325min", 325),
            ("3", 180),
            ("3h", 180),
            ("0", 0),
            ("1,23", 74),
            ("2.2", 132),
            ("3,5h", 210),
            ("1.23 h", 74),
        ];
        for (input, minutes) in cases {
            assert_eq!(duration_of(input), ParamValue::Number(minutes), "{input}");
        }
    }

    #[test]
    fn test_oversized_durations_bind_nothing() {
        for input in [
            "999999999999999999",
            "999999999999999999h",
            "153722867280912930 59min",
            "99999999999999999999999min",
        ] {
            assert_eq!(duration_of(input), ParamValue::None, "{input}");
        }
        assert_eq!(
            duration_of("153722867280912930"),
            ParamValue::Number(153722867280912930 * 60)
        );
    }

    #[test]
    fn test_every_duration_example_parses() {
        let param = Param::duration_minutes("duration");
        let Examples::Static(examples) = &param.examples else {
            panic!("static examples expected");
        };
        for example in examples {
            assert!(duration_of(example).as_number().is_some(), "{example}");
        }
    }

    #[test]
    fn test_multi_selection_collects_repetitions() {
        let params = [
            Param::command(&["pick"]),
            Param::multi_selection("colors", &["Rot", "Grün", "Blau"]),
        ];
        let re = grammar(&params);

        let caps = re.captures("pick rot , blau,Grün").unwrap();
        assert_eq!(
            params[1].extract(&caps),
            ParamValue::List(vec!["rot".into(), "blau".into(), "Grün".into()])
        );

        let caps = re.captures("pick blau").unwrap();
        assert_eq!(params[1].extract(&caps), ParamValue::List(vec!["blau".into()]));
        assert!(re.captures("pick gelb").is_none());
    }

    #[test]
    fn test_selection_escapes_options() {
        let param = Param::selection("op", &["a+b", "c"]);
        assert_eq!(param.regex, r"(a\+b|c)");
    }

    #[test]
    fn test_quoted_and_default_values() {
        let params = [
            Param::command(&["quest"]),
            Param::quoted("caption"),
            Param::digits("page").optional().default_value("1"),
        ];
        let re = grammar(&params);

        let caps = re.captures("quest \"Der Ring\"").unwrap();
        assert_eq!(params[1].extract(&caps).as_text(), Some("Der Ring"));
        assert_eq!(params[2].extract(&caps).as_number(), Some(1));

        let caps = re.captures("quest Ring 4").unwrap();
        assert_eq!(params[1].extract(&caps).as_text(), Some("Ring"));
        assert_eq!(params[2].extract(&caps), ParamValue::Number(4));
    }

    #[test]
    fn test_random_user_prefers_known_users() {
        let ctx = ExampleContext {
            caller: "alice".into(),
            admins: vec!["admin1".into()],
        };
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let user = ctx.random_user(&mut rng);
            assert!(user == "@alice" || user == "@admin1");
        }
    }
}
