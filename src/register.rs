//! Terminal driver for the signup form.
//!
//! Flag values are used first; anything missing or rejected is prompted
//! for, unless prompting is disabled.
use crate::cli::RegisterArgs;
use anyhow::{anyhow, Context, Result};
use signup_relay::form::{Field, SignupForm, Step};
use signup_relay::record::{Role, LEARNING_REASONS, OTHER_REASON, REGIONS};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

pub struct FormDriver<R, W> {
    provided: BTreeMap<Field, String>,
    input: R,
    output: W,
    interactive: bool,
}

impl<R: BufRead, W: Write> FormDriver<R, W> {
    pub fn new(args: &RegisterArgs, input: R, output: W) -> Self {
        let mut provided = BTreeMap::new();
        let pairs = [
            (Field::FullName, &args.name),
            (Field::Region, &args.region),
            (Field::PhoneNumber, &args.phone),
            (Field::Email, &args.email),
            (Field::UserType, &args.role),
            (Field::Reason, &args.reason),
            (Field::CustomReason, &args.custom_reason),
            (Field::PreferredDate, &args.date),
        ];
        for (field, value) in pairs {
            if let Some(value) = value {
                provided.insert(field, value.clone());
            }
        }
        Self {
            provided,
            input,
            output,
            interactive: !args.no_input,
        }
    }

    /// Walk the form to its final step with every step validated.
    pub fn fill(&mut self, form: &mut SignupForm) -> Result<()> {
        let mut pending: Vec<Field> = form.step().fields().to_vec();
        loop {
            let step = form.step();
            if self.interactive {
                let (current, total) = form.progress();
                writeln!(self.output, "\nStep {current} of {total}: {}", step.title())?;
                writeln!(self.output, "{}", step.description())?;
            }
            for field in pending {
                if field == Field::CustomReason && form.data().reason.trim() != OTHER_REASON {
                    continue;
                }
                let value = self.value_for(form, field)?;
                form.set(field, &value);
            }
            let passed = if step == Step::Schedule {
                form.validate_current()
            } else {
                form.next()
            };
            if passed {
                if step == Step::Schedule {
                    return Ok(());
                }
                pending = form.step().fields().to_vec();
                continue;
            }
            self.report_errors(form)?;
            if !self.interactive {
                return Err(anyhow!(
                    "step {} ({}) has invalid input",
                    step.number(),
                    step.title()
                ));
            }
            pending = form.errors().iter().map(|(field, _)| field).collect();
        }
    }

    pub fn report_errors(&mut self, form: &SignupForm) -> Result<()> {
        for (field, message) in form.errors().iter() {
            writeln!(self.output, "  {field}: {message}")?;
        }
        Ok(())
    }

    fn value_for(&mut self, form: &SignupForm, field: Field) -> Result<String> {
        if let Some(value) = self.provided.remove(&field) {
            return Ok(resolve_choice(form, field, &value));
        }
        if !self.interactive {
            return Ok(String::new());
        }
        self.show_choices(form, field)?;
        let answer = self.prompt(label(field))?;
        Ok(resolve_choice(form, field, &answer))
    }

    fn show_choices(&mut self, form: &SignupForm, field: Field) -> Result<()> {
        match field {
            Field::Region => {
                for region in REGIONS {
                    writeln!(self.output, "  {} {}", region.code, region.name)?;
                }
            }
            Field::UserType => {
                let roles: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
                writeln!(self.output, "  {}", roles.join(" / "))?;
            }
            Field::Reason => {
                for (idx, reason) in LEARNING_REASONS.iter().enumerate() {
                    writeln!(self.output, "  {}. {reason}", idx + 1)?;
                }
            }
            Field::PreferredDate => {
                for (idx, option) in form.dates().iter().enumerate() {
                    writeln!(self.output, "  {}. {}", idx + 1, option.label)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn prompt(&mut self, label: &str) -> Result<String> {
        write!(self.output, "{label}: ")?;
        self.output.flush().context("flush prompt")?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read answer")?;
        if read == 0 {
            return Err(anyhow!("input closed before the form was complete"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

fn label(field: Field) -> &'static str {
    match field {
        Field::FullName => "Full name",
        Field::Region => "Region code",
        Field::PhoneNumber => "Phone number",
        Field::Email => "Email address",
        Field::UserType => "I am a",
        Field::Reason => "Reason (number or text)",
        Field::CustomReason => "Please specify",
        Field::PreferredDate => "Preferred date (number or YYYY-MM-DD)",
    }
}

/// Map a list position onto the catalogued value; other input passes through.
fn resolve_choice(form: &SignupForm, field: Field, answer: &str) -> String {
    let trimmed = answer.trim();
    let position = trimmed
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1));
    match (field, position) {
        (Field::Reason, Some(idx)) => LEARNING_REASONS
            .get(idx)
            .map(|reason| reason.to_string())
            .unwrap_or_else(|| answer.to_string()),
        (Field::PreferredDate, Some(idx)) => form
            .dates()
            .get(idx)
            .map(|option| option.value.clone())
            .unwrap_or_else(|| answer.to_string()),
        _ => answer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    fn full_args() -> RegisterArgs {
        RegisterArgs {
            name: Some("Jane Doe".to_string()),
            region: Some("+91".to_string()),
            phone: Some("9876543210".to_string()),
            email: Some("jane@x.com".to_string()),
            role: Some("student".to_string()),
            reason: Some("2".to_string()),
            date: Some("2".to_string()),
            no_input: true,
            ..RegisterArgs::default()
        }
    }

    #[test]
    fn flags_fill_every_step_and_positions_resolve() {
        let mut form = SignupForm::new(today());
        let mut out = Vec::new();
        FormDriver::new(&full_args(), Cursor::new(Vec::new()), &mut out)
            .fill(&mut form)
            .expect("fill form");
        assert_eq!(form.step(), Step::Schedule);
        assert_eq!(form.data().reason, LEARNING_REASONS[1]);
        assert_eq!(form.data().preferred_date, "2026-10-18");
        assert_eq!(form.data().user_type, Some(Role::Student));
    }

    #[test]
    fn no_input_mode_fails_on_first_invalid_step() {
        let args = RegisterArgs {
            email: Some("not-an-email".to_string()),
            ..full_args()
        };
        let mut form = SignupForm::new(today());
        let mut out = Vec::new();
        let err = FormDriver::new(&args, Cursor::new(Vec::new()), &mut out)
            .fill(&mut form)
            .expect_err("invalid email");
        assert!(err.to_string().contains("step 3"));
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("email: Please enter a valid email address"));
    }

    #[test]
    fn prompts_reask_only_rejected_fields() {
        let args = RegisterArgs {
            phone: Some("12".to_string()),
            no_input: false,
            ..full_args()
        };
        let mut form = SignupForm::new(today());
        let mut out = Vec::new();
        FormDriver::new(&args, Cursor::new(b"555 123 4567\n".to_vec()), &mut out)
            .fill(&mut form)
            .expect("fill form");
        assert_eq!(form.data().phone_number, "555 123 4567");
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("phoneNumber: Please enter a valid phone number"));
        assert_eq!(printed.matches("Phone number: ").count(), 1);
        assert!(!printed.contains("Region code: "));
    }

    #[test]
    fn others_prompts_for_custom_reason() {
        let args = RegisterArgs {
            reason: Some(OTHER_REASON.to_string()),
            no_input: false,
            ..full_args()
        };
        let mut form = SignupForm::new(today());
        let mut out = Vec::new();
        FormDriver::new(&args, Cursor::new(b"Robotics club\n".to_vec()), &mut out)
            .fill(&mut form)
            .expect("fill form");
        assert_eq!(form.data().custom_reason, "Robotics club");
    }

    #[test]
    fn padded_other_reason_without_custom_text_is_rejected() {
        let args = RegisterArgs {
            reason: Some("Others ".to_string()),
            ..full_args()
        };
        let mut form = SignupForm::new(today());
        let mut out = Vec::new();
        let err = FormDriver::new(&args, Cursor::new(Vec::new()), &mut out)
            .fill(&mut form)
            .expect_err("custom reason missing");
        assert!(err.to_string().contains("step 4"));
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("customReason: Please specify your reason"));
    }

    #[test]
    fn closed_input_is_an_error() {
        let args = RegisterArgs {
            name: None,
            no_input: false,
            ..full_args()
        };
        let mut form = SignupForm::new(today());
        let mut out = Vec::new();
        let err = FormDriver::new(&args, Cursor::new(Vec::new()), &mut out)
            .fill(&mut form)
            .expect_err("eof");
        assert!(err.to_string().contains("input closed"));
    }
}
