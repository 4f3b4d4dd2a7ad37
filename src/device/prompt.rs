//! Prompt detection and response cleanup for IOS-style CLIs.

/// How a device response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseEnd {
    /// Device returned to a CLI prompt.
    Prompt,
    /// Device is waiting for a confirmation or password.
    Input,
}

const INPUT_MARKERS: &[&str] = &["[confirm]", "[yes/no]", "[y/n]"];

/// Strip carriage returns so output can be split on '\n'.
pub fn normalize(raw: &str) -> String {
    raw.replace('\r', "")
}

/// Last (possibly partial) line of a buffer.
pub fn last_line(buffer: &str) -> &str {
    buffer.rsplit('\n').next().unwrap_or_default()
}

/// True when the line looks like `host#`, `host>` or `host(config-if)#`.
pub fn is_prompt(line: &str) -> bool {
    let line = line.trim_end();
    if line.len() < 2 || line.len() > 80 {
        return false;
    }
    if !(line.ends_with('#') || line.ends_with('>')) {
        return false;
    }
    let body = &line[..line.len() - 1];
    body.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')' | '/' | ':'))
}

/// True when the device asks for a keystroke or password.
pub fn needs_input(line: &str) -> bool {
    let line = line.trim_end();
    INPUT_MARKERS.iter().any(|m| line.contains(m)) || line.ends_with("assword:")
}

/// Check whether the buffered output is complete.
pub fn detect_end(buffer: &str) -> Option<ResponseEnd> {
    let line = last_line(buffer);
    if is_prompt(line) {
        Some(ResponseEnd::Prompt)
    } else if needs_input(line) {
        Some(ResponseEnd::Input)
    } else {
        None
    }
}

/// Hostname part of a prompt (`core-sw1(config)#` -> `core-sw1`).
pub fn hostname_from_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim().trim_end_matches(['#', '>']);
    trimmed
        .split('(')
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

pub fn is_privileged_prompt(prompt: &str) -> bool {
    prompt.trim_end().ends_with('#')
}

pub fn is_config_prompt(prompt: &str) -> bool {
    prompt.contains("(config")
}

/// Remove the echoed command and the trailing prompt from a response.
pub fn clean_response(raw: &str, command: &str) -> String {
    let text = normalize(raw);
    let mut lines: Vec<&str> = text.lines().collect();

    let command = command.trim();
    if !command.is_empty()
        && lines
            .first()
            .is_some_and(|first| first.trim_end().ends_with(command))
    {
        lines.remove(0);
    }

    if lines.last().is_some_and(|last| is_prompt(last)) {
        lines.pop();
    }

    lines.join("\n").trim_end().to_string()
}
