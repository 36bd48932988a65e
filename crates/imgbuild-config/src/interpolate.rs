//! Template expansion for string fields
//!
//! Fields such as `image_name` may embed actions like `{{timestamp}}` or
//! `{{user "suffix" | lower}}`. Expansion is a pure function of the
//! template text and an [`InterpolateContext`]; the clock is injected so
//! that resolution can be made deterministic.
//!
//! Supported functions:
//!
//! | Function | Result |
//! |---|---|
//! | `timestamp` | Unix time in seconds |
//! | `uuid` | time-ordered UUID |
//! | `isotime [format]` | RFC 3339 time, or `strftime`-formatted time |
//! | `user "name"` | user variable value |
//! | `build_name`, `build_type` | build identification |
//! | `lower`, `upper`, `clean_resource_name` | string filters, usable after `\|` |

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Longest value produced by `clean_resource_name`.
const RESOURCE_NAME_MAX_LEN: usize = 63;

/// Errors raised while expanding a template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpolateError {
    #[error("unclosed action starting at byte {position}")]
    Unclosed { position: usize },

    #[error("empty action at byte {position}")]
    EmptyAction { position: usize },

    #[error("unterminated string literal in action '{action}'")]
    UnterminatedString { action: String },

    #[error("function \"{name}\" not defined")]
    UnknownFunction { name: String },

    #[error("wrong number of args for {function}: want {expected}, got {found}")]
    WrongArgumentCount {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("user variable \"{name}\" is not defined")]
    UndefinedVariable { name: String },

    #[error("invalid time format '{format}'")]
    InvalidTimeFormat { format: String },
}

/// Source of the current time for time-derived template values.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// A UUID whose leading bits encode [`Clock::now`].
    fn uuid(&self) -> Uuid {
        let millis = u64::try_from(self.now().timestamp_millis()).unwrap_or_default();
        uuid::Builder::from_unix_timestamp_millis(millis, &rand_bytes()).into_uuid()
    }
}

fn rand_bytes() -> [u8; 10] {
    let random = Uuid::new_v4();
    let mut bytes = [0u8; 10];
    bytes.copy_from_slice(&random.as_bytes()[..10]);
    bytes
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn uuid(&self) -> Uuid {
        Uuid::now_v7()
    }
}

/// Clock frozen at one instant. UUIDs are derived from the instant alone.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    fn uuid(&self) -> Uuid {
        let millis = u64::try_from(self.0.timestamp_millis()).unwrap_or_default();
        uuid::Builder::from_unix_timestamp_millis(millis, &[0u8; 10]).into_uuid()
    }
}

/// Values available to template actions.
#[derive(Clone)]
pub struct InterpolateContext {
    clock: Arc<dyn Clock>,
    user_variables: HashMap<String, String>,
    build_name: String,
    build_type: String,
}

impl Default for InterpolateContext {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            user_variables: HashMap::new(),
            build_name: String::new(),
            build_type: "yandex".to_string(),
        }
    }
}

impl std::fmt::Debug for InterpolateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpolateContext")
            .field("user_variables", &self.user_variables)
            .field("build_name", &self.build_name)
            .field("build_type", &self.build_type)
            .finish_non_exhaustive()
    }
}

impl InterpolateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_user_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.user_variables = variables;
        self
    }

    pub fn with_build_name(mut self, name: impl Into<String>) -> Self {
        self.build_name = name.into();
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn build_name(&self) -> &str {
        &self.build_name
    }
}

/// Whether the text still carries template markers.
pub fn has_markers(text: &str) -> bool {
    text.contains("{{") || text.contains("}}")
}

/// Expand every action in `template`.
pub fn render(template: &str, ctx: &InterpolateContext) -> Result<String, InterpolateError> {
    let mut output = String::with_capacity(template.len());
    let mut cursor = 0;

    while let Some(offset) = template[cursor..].find("{{") {
        let start = cursor + offset;
        output.push_str(&template[cursor..start]);

        let body_start = start + 2;
        let end = template[body_start..]
            .find("}}")
            .map(|i| body_start + i)
            .ok_or(InterpolateError::Unclosed { position: start })?;

        let action = template[body_start..end].trim();
        if action.is_empty() {
            return Err(InterpolateError::EmptyAction { position: start });
        }
        output.push_str(&eval_action(action, ctx)?);
        cursor = end + 2;
    }

    output.push_str(&template[cursor..]);
    Ok(output)
}

/// Evaluate one `{{ ... }}` body, honouring `|` pipelines.
fn eval_action(action: &str, ctx: &InterpolateContext) -> Result<String, InterpolateError> {
    let mut value: Option<String> = None;

    for stage in split_pipeline(action)? {
        let mut args = tokenize(stage, action)?;
        if args.is_empty() {
            return Err(InterpolateError::EmptyAction { position: 0 });
        }
        let name = args.remove(0);
        if let Some(previous) = value.take() {
            args.push(previous);
        }
        value = Some(call(&name, &args, ctx)?);
    }

    Ok(value.unwrap_or_default())
}

fn split_pipeline(action: &str) -> Result<Vec<&str>, InterpolateError> {
    let mut stages = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in action.char_indices() {
        match (quote, c) {
            (None, '"' | '`') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '|') => {
                stages.push(action[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(InterpolateError::UnterminatedString {
            action: action.to_string(),
        });
    }
    stages.push(action[start..].trim());
    Ok(stages)
}

fn tokenize(stage: &str, action: &str) -> Result<Vec<String>, InterpolateError> {
    let mut tokens = Vec::new();
    let mut chars = stage.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' || c == '`' {
            chars.next();
            let mut literal = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == c {
                    closed = true;
                    break;
                }
                literal.push(next);
            }
            if !closed {
                return Err(InterpolateError::UnterminatedString {
                    action: action.to_string(),
                });
            }
            tokens.push(literal);
        } else {
            let mut word = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_whitespace() {
                    break;
                }
                word.push(next);
                chars.next();
            }
            tokens.push(word);
        }
    }
    Ok(tokens)
}

fn expect_args(function: &str, args: &[String], allowed: &[usize]) -> Result<(), InterpolateError> {
    if allowed.contains(&args.len()) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" or ");
    Err(InterpolateError::WrongArgumentCount {
        function: function.to_string(),
        expected,
        found: args.len(),
    })
}

fn call(name: &str, args: &[String], ctx: &InterpolateContext) -> Result<String, InterpolateError> {
    match name {
        "timestamp" => {
            expect_args(name, args, &[0])?;
            Ok(ctx.clock.now().timestamp().to_string())
        }
        "uuid" => {
            expect_args(name, args, &[0])?;
            Ok(ctx.clock.uuid().hyphenated().to_string())
        }
        "isotime" => {
            expect_args(name, args, &[0, 1])?;
            let now = ctx.clock.now();
            match args.first() {
                None => Ok(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
                Some(format) => format_time(now, format),
            }
        }
        "user" => {
            expect_args(name, args, &[1])?;
            ctx.user_variables
                .get(&args[0])
                .cloned()
                .ok_or_else(|| InterpolateError::UndefinedVariable {
                    name: args[0].clone(),
                })
        }
        "build_name" => {
            expect_args(name, args, &[0])?;
            Ok(ctx.build_name.clone())
        }
        "build_type" => {
            expect_args(name, args, &[0])?;
            Ok(ctx.build_type.clone())
        }
        "lower" => {
            expect_args(name, args, &[1])?;
            Ok(args[0].to_lowercase())
        }
        "upper" => {
            expect_args(name, args, &[1])?;
            Ok(args[0].to_uppercase())
        }
        "clean_resource_name" => {
            expect_args(name, args, &[1])?;
            Ok(clean_resource_name(&args[0]))
        }
        _ => Err(InterpolateError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

fn format_time(now: DateTime<Utc>, format: &str) -> Result<String, InterpolateError> {
    let invalid = || InterpolateError::InvalidTimeFormat {
        format: format.to_string(),
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(invalid());
    }
    let mut out = String::new();
    write!(out, "{}", now.format_with_items(items.into_iter())).map_err(|_| invalid())?;
    Ok(out)
}

/// Lowercase the input and replace anything outside `[a-z0-9-]` with `-`.
pub fn clean_resource_name(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .take(RESOURCE_NAME_MAX_LEN)
        .collect()
}
