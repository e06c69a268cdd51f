//! Host path rewriting for client→backend messages.
//!
//! The client lives on the Linux side of a WSL host and names files as
//! `/mnt/<drive>/<rest>`. The backend runs on the Windows side and expects
//! `<DRIVE>:\<rest>`. Every string leaf of a decoded message is checked
//! against that convention; matching leaves are replaced, everything else is
//! left exactly as it was.
//!
//! Rewriting is one-way. Backend output is forwarded without decoding.

use serde_json::Value;

/// Marker prefix of the client-side convention.
pub const MOUNT_PREFIX: &str = "/mnt/";

/// Translate one client-side path into its backend-host form.
///
/// Returns `None` when `s` does not match `/mnt/<letter>/...`. Only a single
/// ASCII letter followed by `/` is a drive; `/mnt/cd/x`, `/mnt/1/x` and a
/// bare `/mnt/` never match.
///
/// ```
/// use isobridge_core::paths::translate_path;
///
/// assert_eq!(translate_path("/mnt/c/Users/me/file.txt").as_deref(), Some(r"C:\Users\me\file.txt"));
/// assert_eq!(translate_path("/home/me"), None);
/// ```
pub fn translate_path(s: &str) -> Option<String> {
    let rest = s.strip_prefix(MOUNT_PREFIX)?;
    let mut chars = rest.chars();
    let drive = chars.next().filter(char::is_ascii_alphabetic)?;
    let tail = chars.as_str().strip_prefix('/')?;

    let mut out = String::with_capacity(tail.len() + 3);
    out.push(drive.to_ascii_uppercase());
    out.push_str(":\\");
    out.push_str(&tail.replace('/', "\\"));
    Some(out)
}

/// Rewrite every matching string leaf of `value` in place.
///
/// Map keys are not rewritten; only values are. Returns the number of
/// leaves replaced.
pub fn rewrite_in_place(value: &mut Value) -> usize {
    match value {
        Value::String(s) => match translate_path(s) {
            Some(translated) => {
                tracing::debug!(from = %s, to = %translated, "translated path");
                *s = translated;
                1
            }
            None => 0,
        },
        Value::Array(items) => items.iter_mut().map(rewrite_in_place).sum(),
        Value::Object(map) => map.values_mut().map(rewrite_in_place).sum(),
        Value::Null | Value::Bool(_) | Value::Number(_) => 0,
    }
}

/// Rewrite a decoded message.
///
/// With `enabled` false the value is handed back untouched without being
/// traversed. The second element is the number of translated leaves.
pub fn rewrite_paths(mut value: Value, enabled: bool) -> (Value, usize) {
    if !enabled {
        return (value, 0);
    }
    let count = rewrite_in_place(&mut value);
    (value, count)
}

/// Rewrite a backend launch command that is itself a client-side path.
///
/// A command under `/mnt/<drive>/` is launched through `cmd.exe /c` with the
/// translated path, and through `python` first when it is a `.py` script.
/// Any other command, `cmd.exe` included, is returned as given.
pub fn translate_command(command: &str, args: &[String]) -> (String, Vec<String>) {
    if is_cmd_exe(command) {
        return (command.to_string(), args.to_vec());
    }

    let Some(translated) = translate_path(command) else {
        return (command.to_string(), args.to_vec());
    };

    let mut new_args = vec!["/c".to_string()];
    if translated.to_ascii_lowercase().ends_with(".py") {
        new_args.push("python".to_string());
    }
    new_args.push(translated);
    new_args.extend(args.iter().cloned());
    ("cmd.exe".to_string(), new_args)
}

fn is_cmd_exe(command: &str) -> bool {
    let lower = command.to_ascii_lowercase();
    lower == "cmd.exe" || lower.ends_with("\\cmd.exe") || lower.ends_with("/cmd.exe")
}
