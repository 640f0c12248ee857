// ─── Argument Templates ───
// `${name}` placeholder substitution for JVM and game argument templates.

use std::collections::HashMap;

use tracing::debug;

/// Result of substituting one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    /// Placeholder names left in `text` because no value was known.
    pub unresolved: Vec<String>,
}

/// Known placeholder values, keyed by name without `${}`.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: HashMap<String, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Replace every `${name}` in one left-to-right pass. Inserted values are
    /// never scanned again, so a value containing `${...}` stays literal.
    pub fn substitute(&self, template: &str) -> Substituted {
        let mut text = String::with_capacity(template.len());
        let mut unresolved = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            text.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                text.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let name = &after[..end];
            match self.values.get(name) {
                Some(value) => text.push_str(value),
                None => {
                    text.push_str(&rest[start..start + 2 + end + 1]);
                    unresolved.push(name.to_string());
                }
            }
            rest = &after[end + 1..];
        }
        text.push_str(rest);

        Substituted { text, unresolved }
    }

    /// Substitute a whole argument list. Arguments with unknown placeholders
    /// are dropped, together with the option flag right before them.
    pub fn substitute_args(&self, templates: &[String]) -> Vec<String> {
        let mut args = Vec::with_capacity(templates.len());
        for template in templates {
            let substituted = self.substitute(template);
            if substituted.unresolved.is_empty() {
                args.push(substituted.text);
            } else {
                debug!(
                    "Dropping argument {:?} with unknown placeholders {:?}",
                    template, substituted.unresolved
                );
                // An unresolved option stands alone; an unresolved value
                // takes its option with it.
                if !template.starts_with('-') {
                    drop_dangling_option(&mut args);
                }
            }
        }
        args
    }
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}

/// Remove `-cp`/`-classpath` pairs; the classpath is always injected once.
pub fn strip_classpath_args(args: Vec<String>) -> Vec<String> {
    let mut stripped = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "-cp" || arg == "-classpath" || arg == "--class-path" {
            let _ = iter.next();
            continue;
        }
        stripped.push(arg);
    }
    stripped
}

/// Drop `--width`/`--height` together with a value that is not a number.
pub fn sanitize_window_args(args: Vec<String>) -> Vec<String> {
    let mut sanitized = Vec::with_capacity(args.len());
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if arg == "--width" || arg == "--height" {
            match args.get(i + 1) {
                Some(value) if value.parse::<u32>().is_ok() => {
                    sanitized.push(arg.clone());
                    sanitized.push(value.clone());
                    i += 2;
                }
                // A non-numeric value is dropped with its flag, another
                // option is kept.
                Some(value) if !value.starts_with('-') => i += 2,
                _ => i += 1,
            }
            continue;
        }

        sanitized.push(arg.clone());
        i += 1;
    }

    sanitized
}
