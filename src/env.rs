use std::collections::HashMap;
use std::ffi::CString;
use std::io::Write;

/// A shell variable: its value and whether it is passed to child
/// environments.
pub struct Variable {
    pub value: String,
    pub exported: bool,
}

/// The shell's variable table.
pub struct Variables {
    table: HashMap<String, Variable>,
}

impl Variables {
    pub fn new() -> Self {
        Variables {
            table: HashMap::new(),
        }
    }

    /// Seed the table from the process environment. Inherited variables are
    /// exported, so a plain fork/exec passes them through unchanged.
    pub fn from_environ() -> Self {
        let mut vars = Variables::new();
        for (key, value) in std::env::vars() {
            vars.set(&key, &value, true);
        }
        vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.table.get(key).map(|v| v.value.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str, exported: bool) {
        self.table.insert(
            key.to_string(),
            Variable {
                value: value.to_string(),
                exported,
            },
        );
    }

    /// Remove a variable. False when it was not set.
    pub fn unset(&mut self, key: &str) -> bool {
        self.table.remove(key).is_some()
    }

    /// Print every variable, one `KEY=VALUE` per line, exported ones marked.
    pub fn dump(&self, out: &mut dyn Write) {
        let mut keys: Vec<&String> = self.table.keys().collect();
        keys.sort();
        for key in keys {
            let var = &self.table[key];
            let mark = if var.exported { " (exported)" } else { "" };
            let _ = writeln!(out, "{key}={}{mark}", var.value);
        }
    }

    /// Build the environment vector for `execve` from the exported entries.
    pub fn build_envp(&self) -> Vec<CString> {
        self.table
            .iter()
            .filter(|(_, var)| var.exported)
            .filter_map(|(key, var)| CString::new(format!("{key}={}", var.value)).ok())
            .collect()
    }
}

/// True for names matching `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    let Some(&first) = bytes.first() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return false;
    }
    bytes[1..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Resolve a program name to the path handed to `execve`.
///
/// A name containing `/` is used verbatim, subject to an execute-permission
/// check. Anything else is searched along the colon-separated `PATH`, shell
/// variable table first, process environment second.
pub fn resolve_program(command: &str, vars: &Variables) -> Option<CString> {
    if command.contains('/') {
        if is_executable(command) {
            return CString::new(command).ok();
        }
        return None;
    }

    let path = vars
        .get("PATH")
        .map(str::to_string)
        .or_else(|| std::env::var("PATH").ok())?;

    for dir in path.split(':') {
        if dir.is_empty() {
            continue;
        }
        let candidate = format!("{dir}/{command}");
        if is_executable(&candidate) {
            return CString::new(candidate).ok();
        }
    }
    None
}

/// `access(path, X_OK)`: the same test `execve` is about to apply.
fn is_executable(path: &str) -> bool {
    let Ok(c_path) = CString::new(path) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::X_OK) == 0 }
}
