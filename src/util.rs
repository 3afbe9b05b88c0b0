//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values, in a single
/// left-to-right pass: substituted text is never scanned again.
/// No nesting, no conditionals. Unknown `{...}` spans are kept verbatim.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let tail = &rest[open..];
    let value = tail[1..]
      .find('}')
      .and_then(|close| pairs.iter().find(|(k, _)| *k == &tail[1..=close]).map(|(k, v)| (k.len(), *v)));
    match value {
      Some((key_len, v)) => {
        out.push_str(v);
        rest = &tail[key_len + 2..];
      }
      None => {
        out.push('{');
        rest = &tail[1..];
      }
    }
  }
  out.push_str(rest);
  out
}

/// Log-safe truncation for model payloads (char-boundary aware).
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let total = s.chars().count();
  if total <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} chars total)", head, total)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence() {
    let out = fill_template("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and x then y");
  }

  #[test]
  fn fill_template_leaves_unknown_keys() {
    assert_eq!(fill_template("{json}", &[("a", "x")]), "{json}");
  }

  #[test]
  fn substituted_values_are_not_expanded_again() {
    let tpl = "Q: {question_text}\nA: {wrong_answer}";
    let out = fill_template(tpl, &[("question_text", "Is {wrong_answer} right?"), ("wrong_answer", "7")]);
    assert_eq!(out, "Q: Is {wrong_answer} right?\nA: 7");
  }

  #[test]
  fn stray_braces_survive() {
    assert_eq!(fill_template("{\"a\": {a}} {", &[("a", "1")]), "{\"a\": 1} {");
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let out = trunc_for_log("ééééé", 2);
    assert!(out.starts_with("éé…"));
    assert!(out.contains("5 chars"));
  }
}
