//! CLI view: renders steps on stdout and reads commands from stdin.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::channels::{StepView, ViewEvent};
use crate::error::ViewError;
use crate::wizard::validation::{FieldKind, FieldSpec};
use crate::wizard::{MANUAL_UPLOAD_DETOUR, StepRuntime, SubmissionSummary};

const HELP: &str = "commands: set <field> <value|option#[,option#]>, clear <field>, next, back, upload, reset, quit";

/// Terminal view over any line-oriented reader.
pub struct CliView<R> {
    lines: Mutex<Lines<R>>,
}

impl CliView<BufReader<Stdin>> {
    pub fn new() -> Self {
        Self::with_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl Default for CliView<BufReader<Stdin>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncBufRead + Unpin + Send> CliView<R> {
    pub fn with_reader(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    async fn next_line(&self) -> Result<Option<String>, ViewError> {
        let mut lines = self.lines.lock().await;
        Ok(lines.next_line().await?)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> StepView for CliView<R> {
    async fn render(&self, step: &StepRuntime) -> Result<ViewEvent, ViewError> {
        println!("{}", render_step(step));
        loop {
            eprint!("> ");
            let Some(line) = self.next_line().await? else {
                return Ok(ViewEvent::Quit);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_command(line, step) {
                Ok(event) => return Ok(event),
                Err(message) => eprintln!("{message}"),
            }
        }
    }

    async fn notice(&self, message: &str) -> Result<(), ViewError> {
        eprintln!("! {}", message.replace('\n', "\n! "));
        Ok(())
    }

    async fn complete(&self, summary: &SubmissionSummary) -> Result<(), ViewError> {
        println!(
            "\nThank you! {} answers recorded (session {}).",
            summary.answers.len(),
            summary.session_id
        );
        Ok(())
    }
}

/// Text block for one step: header, progress, fields, errors.
pub fn render_step(step: &StepRuntime) -> String {
    let descriptor = step.descriptor();
    let mut out = vec![String::new()];

    let mut header = format!("== {} ==", descriptor.title);
    if let Some((current, total)) = descriptor.metadata.progress() {
        header.push_str(&format!("  [{current} of {total}]"));
    }
    out.push(header);

    for (i, field) in descriptor.schema.fields.iter().enumerate() {
        let value = step
            .value(&field.name)
            .map(display_value)
            .unwrap_or_else(|| "-".to_string());
        out.push(format!("{}. {} ({}): {}", i + 1, field.label, field.name, value));
        for (n, option) in field.options().iter().enumerate() {
            out.push(format!("     {}) {}", n + 1, option));
        }
        if let Some(message) = step.validation().error_for(&field.name) {
            out.push(format!("     ! {message}"));
        }
    }

    if descriptor.metadata.detour(MANUAL_UPLOAD_DETOUR).is_some() {
        out.push("(type `upload` to upload a file instead)".to_string());
    }
    out.push(if step.can_submit() {
        "[next: ready]".to_string()
    } else {
        "[next: blocked]".to_string()
    });
    out.join("\n")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Parse one input line against the mounted step.
pub fn parse_command(line: &str, step: &StepRuntime) -> Result<ViewEvent, String> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "next" | "n" | "submit" => Ok(ViewEvent::Submit),
        "back" | "b" => Ok(ViewEvent::Back),
        "upload" => Ok(ViewEvent::Detour(MANUAL_UPLOAD_DETOUR.to_string())),
        "reset" => Ok(ViewEvent::Reset),
        "quit" | "q" | "exit" => Ok(ViewEvent::Quit),
        "help" | "?" => Err(HELP.to_string()),
        "clear" => {
            let field = lookup_field(rest, step)?;
            Ok(ViewEvent::Edit {
                field: field.name.clone(),
                value: Value::Null,
            })
        }
        "set" => {
            let (name, raw) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: set <field> <value>".to_string())?;
            let field = lookup_field(name, step)?;
            Ok(ViewEvent::Edit {
                field: field.name.clone(),
                value: parse_value(field, raw.trim())?,
            })
        }
        other => Err(format!("unknown command `{other}`\n{HELP}")),
    }
}

/// Accept a field by name or by its 1-based position.
fn lookup_field<'a>(name: &str, step: &'a StepRuntime) -> Result<&'a FieldSpec, String> {
    let fields = &step.descriptor().schema.fields;
    let by_position = name
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| fields.get(i));
    by_position
        .or_else(|| fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
        .ok_or_else(|| format!("unknown field `{name}`"))
}

/// Turn typed input into a JSON value for the field kind.
///
/// Anything unrecognised is passed through as-is so live validation can
/// explain what is wrong with it.
pub fn parse_value(field: &FieldSpec, raw: &str) -> Result<Value, String> {
    match &field.kind {
        FieldKind::Choice { options } => Ok(Value::String(pick_option(options, raw))),
        FieldKind::MultiChoice { options, .. } => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(pick_option(options, s)))
                .collect(),
        )),
        FieldKind::Text { .. } => Ok(Value::String(raw.to_string())),
        FieldKind::Number { .. } => Ok(match raw.parse::<f64>() {
            Ok(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            Err(_) => Value::String(raw.to_string()),
        }),
        FieldKind::Accept => match raw.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Ok(Value::Bool(true)),
            "no" | "n" | "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(format!("{} expects yes or no", field.name)),
        },
    }
}

fn pick_option(options: &[String], raw: &str) -> String {
    if let Ok(n) = raw.parse::<usize>()
        && let Some(option) = n.checked_sub(1).and_then(|i| options.get(i))
    {
        return option.clone();
    }
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(raw))
        .cloned()
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;
    use crate::wizard::steps::{RECORD_ROUTE, questionnaire_route, survey_registry};

    fn mounted(route: &str) -> StepRuntime {
        let registry = survey_registry("ns");
        StepRuntime::mount(registry.get(route).unwrap().clone(), &MemoryStore::new(), None)
    }

    #[test]
    fn navigation_commands() {
        let step = mounted(&questionnaire_route(2));
        assert_eq!(parse_command("next", &step), Ok(ViewEvent::Submit));
        assert_eq!(parse_command("B", &step), Ok(ViewEvent::Back));
        assert_eq!(parse_command("quit", &step), Ok(ViewEvent::Quit));
        assert_eq!(parse_command("reset", &step), Ok(ViewEvent::Reset));
        assert_eq!(
            parse_command("upload", &step),
            Ok(ViewEvent::Detour("manual-upload".into()))
        );
        assert!(parse_command("dance", &step).is_err());
        assert!(parse_command("help", &step).unwrap_err().starts_with("commands:"));
    }

    #[test]
    fn set_choice_by_index_or_name() {
        let step = mounted(&questionnaire_route(2));
        assert_eq!(
            parse_command("set sex 2", &step),
            Ok(ViewEvent::Edit {
                field: "sex".into(),
                value: json!("Male")
            })
        );
        assert_eq!(
            parse_command("set 1 female", &step),
            Ok(ViewEvent::Edit {
                field: "sex".into(),
                value: json!("Female")
            })
        );
    }

    #[test]
    fn set_multi_choice_list() {
        let step = mounted(&questionnaire_route(1));
        assert_eq!(
            parse_command("set gender 1, 4", &step),
            Ok(ViewEvent::Edit {
                field: "gender".into(),
                value: json!(["Female", "Other"])
            })
        );
    }

    #[test]
    fn unknown_option_passes_through_for_validation() {
        let step = mounted(&questionnaire_route(2));
        assert_eq!(
            parse_command("set sex Robot", &step),
            Ok(ViewEvent::Edit {
                field: "sex".into(),
                value: json!("Robot")
            })
        );
    }

    #[test]
    fn numbers_and_flags() {
        let record = mounted(RECORD_ROUTE);
        assert_eq!(
            parse_command("set durationSeconds 4.5", &record),
            Ok(ViewEvent::Edit {
                field: "durationSeconds".into(),
                value: json!(4.5)
            })
        );

        let consent = mounted("/welcome/step-3");
        assert_eq!(
            parse_command("set agreedPolicyTerms yes", &consent),
            Ok(ViewEvent::Edit {
                field: "agreedPolicyTerms".into(),
                value: json!(true)
            })
        );
        assert!(parse_command("set agreedPolicyTerms maybe", &consent).is_err());
    }

    #[test]
    fn clear_and_unknown_field() {
        let step = mounted(&questionnaire_route(2));
        assert_eq!(
            parse_command("clear sex", &step),
            Ok(ViewEvent::Edit {
                field: "sex".into(),
                value: Value::Null
            })
        );
        assert!(parse_command("set bogus 1", &step).is_err());
        assert!(parse_command("set sex", &step).is_err());
    }

    #[test]
    fn render_shows_progress_errors_and_state() {
        let mut step = mounted(&questionnaire_route(2));
        let text = render_step(&step);
        assert!(text.contains("[2 of 16]"));
        assert!(text.contains("Required Field"));
        assert!(text.contains("[next: blocked]"));

        step.edit("sex", json!("Female"));
        let text = render_step(&step);
        assert!(text.contains("Sex (sex): Female"));
        assert!(text.contains("[next: ready]"));
    }

    #[test]
    fn render_offers_upload_on_record_step() {
        assert!(render_step(&mounted(RECORD_ROUTE)).contains("upload"));
    }

    #[tokio::test]
    async fn reads_commands_until_one_parses() {
        let view = CliView::with_reader(BufReader::new("\ndance\nset sex 1\n".as_bytes()));
        let step = mounted(&questionnaire_route(2));
        let event = view.render(&step).await.unwrap();
        assert_eq!(
            event,
            ViewEvent::Edit {
                field: "sex".into(),
                value: json!("Female")
            }
        );
        // Input exhausted: the view quits.
        assert_eq!(view.render(&step).await.unwrap(), ViewEvent::Quit);
    }
}
