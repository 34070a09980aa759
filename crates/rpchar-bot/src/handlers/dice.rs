//! Dice and coin - random rolls that can be repeated with 🔄.

use crate::dispatcher::REDO_ARROW;
use crate::engine::{Command, CommandHandler, Examples, Param, ResponseContext};
use crate::error::AppResult;
use crate::locale::Names;
use async_trait::async_trait;
use character_store::{InteractionStatus, Navigation};
use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Dice in one term above this count are summarized per face.
const DETAIL_LIMIT: u64 = 20;
/// Upper bound for dice and faces in one term.
const MAX_DICE: u64 = 1000;

const TERM: &str = r"(([0-9]+\s*([×x\*]\s*)?)?D\s*)?[0-9]+";

pub fn commands() -> AppResult<Vec<Command>> {
    Ok(vec![
        Command::builder(
            Names::new("Würfeln", "dice").with_alts(["Würfel", "🎲"]),
            Arc::new(DiceHandler::new()?),
        )
        .param(Param::text("expression").optional().examples(Examples::of([
            "20", "2D6", "3×D8 + 2", "D20", "(D20)", "Wald, Stadt, Berge",
        ])))
        .build()?,
        Command::builder(Names::new("Münze", "coin"), Arc::new(CoinHandler)).build()?,
    ])
}

/// Dice command - numbers, dice expressions and random choices.
pub struct DiceHandler {
    expression: Regex,
    term: Regex,
}

impl DiceHandler {
    pub fn new() -> AppResult<Self> {
        let expression = RegexBuilder::new(&format!(r"^{TERM}(\s*\+\s*{TERM})*$"))
            .case_insensitive(true)
            .build()?;
        let term = RegexBuilder::new(
            r"^((?P<count>[0-9]+)?\s*([×x\*]\s*)?D\s*)?(?P<faces>[0-9]+)$",
        )
        .case_insensitive(true)
        .build()?;
        Ok(Self { expression, term })
    }

    /// The reply text, or `None` when `expression` cannot be rolled.
    pub fn roll<R: Rng + ?Sized>(&self, expression: &str, rng: &mut R) -> Option<String> {
        let mut expression = expression.trim();
        let mut brackets = None;
        for (open, close) in [('(', ')'), ('[', ']'), ('*', '*')] {
            if let Some(inner) = expression.strip_suffix(close) {
                expression = inner.trim_start_matches(open).trim();
                brackets = Some((open, close));
                break;
            }
        }

        let body = if expression.is_empty() {
            format!("Der Würfel zeigt: {}", rng.gen_range(1..=6))
        } else if expression.chars().all(|c| c.is_ascii_digit()) {
            let faces: u64 = expression.parse().ok()?;
            format!("Der Würfel zeigt: {}", rng.gen_range(1..=faces.max(1)))
        } else if self.expression.is_match(expression) {
            self.roll_terms(expression, rng)?
        } else {
            let choices: Vec<&str> = expression
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            if choices.len() < 2 {
                return None;
            }
            format!("Ich wähle: {}", choices.choose(rng)?)
        };

        Some(match brackets {
            Some((open, close)) => format!("{open} {body} {close}"),
            None => body,
        })
    }

    fn roll_terms<R: Rng + ?Sized>(&self, expression: &str, rng: &mut R) -> Option<String> {
        let mut parts = Vec::new();
        let mut sum: u64 = 0;

        for raw in expression.split('+') {
            let caps = self.term.captures(raw.trim())?;
            let faces: u64 = caps.name("faces")?.as_str().parse().ok()?;
            let has_die = raw.to_lowercase().contains('d');

            if !has_die {
                sum = sum.checked_add(faces)?;
                parts.push(faces.to_string());
                continue;
            }

            let count: u64 = match caps.name("count") {
                Some(c) => c.as_str().parse().ok()?,
                None => 1,
            };
            if count > MAX_DICE || faces > MAX_DICE {
                return None;
            }
            let faces = faces.max(1);
            let rolls: Vec<u64> = (0..count.max(1)).map(|_| rng.gen_range(1..=faces)).collect();
            sum = sum.checked_add(rolls.iter().sum::<u64>())?;

            parts.push(if count <= 1 {
                format!("D{faces}: {}", rolls[0])
            } else if count <= DETAIL_LIMIT {
                let list: Vec<String> = rolls.iter().map(u64::to_string).collect();
                format!("{count}×D{faces}: ({})", list.join(", "))
            } else {
                let mut per_face: BTreeMap<u64, u64> = BTreeMap::new();
                for r in &rolls {
                    *per_face.entry(*r).or_default() += 1;
                }
                let list: Vec<String> = per_face
                    .iter()
                    .map(|(face, n)| format!("{n}×{face}"))
                    .collect();
                format!("{count}×D{faces}: ({})", list.join(", "))
            });
        }

        let shown = if parts.len() >= 4 {
            format!("Die Würfel zeigen:\n\n{}\n", parts.join(" + \n"))
        } else {
            format!("Die Würfel zeigen: {}", parts.join(" + "))
        };
        Some(format!("{shown}\nErgebnis: {sum}"))
    }
}

#[async_trait]
impl CommandHandler for DiceHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let expression = ctx.text_param("expression").unwrap_or_default().to_string();
        let reply = self.roll(&expression, &mut rand::thread_rng());

        match reply {
            Some(text) => {
                ctx.text(text);
                offer_redo(ctx);
            }
            None => {
                let info = ctx.localized("Befehl-Info");
                let invoked = ctx.invoked.clone();
                ctx.text(format!(
                    "Fehler beim Aufruf des Befehls. Siehe '{info} {invoked}'."
                ));
                ctx.suggest([format!("{info} {invoked}"), "Hilfe".to_string()]);
            }
        }
        Ok(())
    }
}

/// Coin command - heads or tails.
pub struct CoinHandler;

#[async_trait]
impl CommandHandler for CoinHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let side = if rand::thread_rng().gen_bool(0.5) {
            "Kopf"
        } else {
            "Zahl"
        };
        ctx.text(format!("Die Münze zeigt: {side}"));
        offer_redo(ctx);
        Ok(())
    }
}

fn offer_redo(ctx: &mut ResponseContext) {
    let body = ctx.body.clone();
    ctx.set_status(InteractionStatus::DynNavigation(Navigation {
        redo: Some(body),
        ..Default::default()
    }));
    ctx.suggest([REDO_ARROW, "Hilfe"]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn roll(expression: &str) -> Option<String> {
        let dice = DiceHandler::new().unwrap();
        dice.roll(expression, &mut StdRng::seed_from_u64(7))
    }

    fn result_of(text: &str) -> u64 {
        text.rsplit("Ergebnis: ").next().unwrap().trim().parse().unwrap()
    }

    #[test]
    fn test_plain_numbers() {
        let text = roll("").unwrap();
        let n: u64 = text.strip_prefix("Der Würfel zeigt: ").unwrap().parse().unwrap();
        assert!((1..=6).contains(&n));

        let text = roll("100").unwrap();
        let n: u64 = text.strip_prefix("Der Würfel zeigt: ").unwrap().parse().unwrap();
        assert!((1..=100).contains(&n));
    }

    #[test]
    fn test_expression_rolls_exact_count() {
        let re = Regex::new(r"^Die Würfel zeigen: 2×D6: \((\d+), (\d+)\) \+ 3\nErgebnis: (\d+)$")
            .unwrap();
        let text = roll("2D6 + 3").unwrap();
        let caps = re.captures(&text).unwrap();
        let a: u64 = caps[1].parse().unwrap();
        let b: u64 = caps[2].parse().unwrap();
        assert_eq!(caps[3].parse::<u64>().unwrap(), a + b + 3);
    }

    #[test]
    fn test_single_die_and_many_terms() {
        let text = roll("d20").unwrap();
        assert!(text.starts_with("Die Würfel zeigen: D20: "));

        let text = roll("D4 + D4 + 1 + 2").unwrap();
        assert!(text.starts_with("Die Würfel zeigen:\n\nD4: "));
        assert!(text.contains(" + \n"));
        assert!(result_of(&text) >= 5);
    }

    #[test]
    fn test_many_dice_are_summarized() {
        let text = roll("30xD2").unwrap();
        assert!(text.starts_with("Die Würfel zeigen: 30×D2: ("));
        // One entry per face instead of thirty single rolls.
        assert!(text.matches(", ").count() <= 1);
        let total = result_of(&text);
        assert!((30..=60).contains(&total));
    }

    #[test]
    fn test_choices_and_brackets() {
        let text = roll("Wald, Stadt").unwrap();
        assert!(text == "Ich wähle: Wald" || text == "Ich wähle: Stadt");

        let text = roll("(D6)").unwrap();
        assert!(text.starts_with("( Die Würfel zeigen: D6: "));
        assert!(text.ends_with(" )"));
    }

    #[test]
    fn test_unrollable_input() {
        assert!(roll("nur ein Wort").is_none());
        assert!(roll("5000D6").is_none());
    }

    #[test]
    fn test_sums_beyond_u64_are_rejected() {
        assert!(roll("18446744073709551615 + 1").is_none());
        assert!(roll("18446744073709551615 + D6").is_none());
        assert!(roll("99999999999999999999 + 1").is_none());
        assert_eq!(
            result_of(&roll("18446744073709551614 + 1").unwrap()),
            u64::MAX
        );
    }
}
