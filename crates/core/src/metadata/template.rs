//! Substitution templates used by rewrite rules.
//!
//! The syntax is the replacement-field subset of Python's `str.format`:
//! `{}`, `{0}`, `{name}`, and `{{`/`}}` escapes. Unknown names render as an
//! empty string.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("replacement index {0} out of range")]
    IndexOutOfRange(usize),

    #[error("single '{0}' encountered in template")]
    UnbalancedBrace(char),

    #[error("unsupported replacement field: {{{0}}}")]
    Unsupported(String),

    #[error("cannot switch between automatic and manual field numbering")]
    MixedNumbering,
}

enum Numbering {
    Unknown,
    Automatic(usize),
    Manual,
}

/// Render `template` with positional and named arguments.
pub fn render(
    template: &str,
    positional: &[String],
    named: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut numbering = Numbering::Unknown;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(TemplateError::UnbalancedBrace('}')),
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }
                if !closed {
                    return Err(TemplateError::UnbalancedBrace('{'));
                }
                out.push_str(&resolve(&field, &mut numbering, positional, named)?);
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

fn resolve(
    field: &str,
    numbering: &mut Numbering,
    positional: &[String],
    named: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    if field.contains(['!', ':', '.', '[', '{']) {
        return Err(TemplateError::Unsupported(field.to_string()));
    }

    let index = if field.is_empty() {
        let next = match numbering {
            Numbering::Unknown => 0,
            Numbering::Automatic(n) => *n,
            Numbering::Manual => return Err(TemplateError::MixedNumbering),
        };
        *numbering = Numbering::Automatic(next + 1);
        Some(next)
    } else if field.chars().all(|c| c.is_ascii_digit()) {
        if let Numbering::Automatic(_) = numbering {
            return Err(TemplateError::MixedNumbering);
        }
        *numbering = Numbering::Manual;
        field.parse::<usize>().ok()
    } else {
        None
    };

    match index {
        Some(i) => positional
            .get(i)
            .cloned()
            .ok_or(TemplateError::IndexOutOfRange(i)),
        None if field.chars().all(|c| c.is_ascii_digit()) => {
            Err(TemplateError::Unsupported(field.to_string()))
        }
        None => Ok(named.get(field).cloned().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> (Vec<String>, HashMap<String, String>) {
        let positional = vec!["kick.wav".to_string(), "kick".to_string()];
        let named = HashMap::from([
            ("_tags".to_string(), "drums".to_string()),
            ("bpm".to_string(), "120".to_string()),
        ]);
        (positional, named)
    }

    #[test]
    fn test_positional_and_named() {
        let (positional, named) = args();
        assert_eq!(render("{1}", &positional, &named).unwrap(), "kick");
        assert_eq!(
            render("{_tags} {0}", &positional, &named).unwrap(),
            "drums kick.wav"
        );
        assert_eq!(render("{} / {}", &positional, &named).unwrap(), "kick.wav / kick");
    }

    #[test]
    fn test_escapes_and_missing_names() {
        let (positional, named) = args();
        assert_eq!(render("{{{bpm}}}", &positional, &named).unwrap(), "{120}");
        assert_eq!(render("[{missing}]", &positional, &named).unwrap(), "[]");
    }

    #[test]
    fn test_errors() {
        let (positional, named) = args();
        assert_eq!(
            render("{5}", &positional, &named),
            Err(TemplateError::IndexOutOfRange(5))
        );
        assert_eq!(
            render("{0", &positional, &named),
            Err(TemplateError::UnbalancedBrace('{'))
        );
        assert_eq!(
            render("a}b", &positional, &named),
            Err(TemplateError::UnbalancedBrace('}'))
        );
        assert!(matches!(
            render("{0:>4}", &positional, &named),
            Err(TemplateError::Unsupported(_))
        ));
        assert_eq!(
            render("{} {0}", &positional, &named),
            Err(TemplateError::MixedNumbering)
        );
    }
}
