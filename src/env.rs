use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// A single shell variable together with its export mark.
///
/// Exported variables are flattened into the `envp` of executed programs and
/// printed by the `env` builtin; unexported ones stay private to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub value: String,
    pub exported: bool,
}

/// Mutable, shell-level view of the process environment.
///
/// The environment contains:
/// - `vars`: the variable store consulted by expansion and flattened for
///   child processes.
/// - `current_dir`: the working directory, kept in sync with the process
///   working directory by `cd`.
/// - `last_status`: the exit status of the last foreground pipeline, exposed
///   to expansion as `$?`.
/// - `shell_name`: the shell's own invocation name, exposed as `$0`.
/// - `pending_exit`: set by the `exit` builtin; the REPL checks it after
///   every pipeline and unwinds normally instead of dying mid-builtin.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, Variable>,
    pub current_dir: PathBuf,
    pub last_status: i32,
    pub shell_name: String,
    pub pending_exit: Option<i32>,
}

impl Environment {
    /// Capture the current process state into a new `Environment`.
    ///
    /// Variables inherited from the host environment start out exported, the
    /// way they arrived in this process's own `envp`.
    pub fn new(shell_name: impl Into<String>) -> Self {
        let mut vars = HashMap::new();
        for (k, v) in stdenv::vars() {
            vars.insert(
                k,
                Variable {
                    value: v,
                    exported: true,
                },
            );
        }
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            last_status: 0,
            shell_name: shell_name.into(),
            pending_exit: None,
        }
    }

    /// Get the value of a variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|var| var.value.as_str())
    }

    /// Set or override a variable, preserving an existing export mark.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        let key = key.into();
        let exported = self.vars.get(&key).map(|var| var.exported).unwrap_or(false);
        self.vars.insert(
            key,
            Variable {
                value: val.into(),
                exported,
            },
        );
    }

    /// Mark a variable exported, assigning `value` when one is given.
    ///
    /// `export NAME` with no value marks an existing variable without
    /// touching its value and creates an empty exported variable otherwise.
    pub fn export_var(&mut self, key: impl Into<String>, value: Option<&str>) {
        let var = self.vars.entry(key.into()).or_insert_with(|| Variable {
            value: String::new(),
            exported: false,
        });
        if let Some(value) = value {
            var.value = value.to_string();
        }
        var.exported = true;
    }

    /// Remove a variable.
    pub fn unset_var(&mut self, key: &str) {
        self.vars.remove(key);
    }

    /// Flatten the exported variables into `NAME=VALUE` strings for `execve`.
    pub fn exported_pairs(&self) -> Vec<String> {
        self.vars
            .iter()
            .filter(|(_, var)| var.exported)
            .map(|(name, var)| format!("{}={}", name, var.value))
            .collect()
    }
}

/// Whether `name` is a valid variable name: a leading alphabetic character
/// or `_`, followed by alphanumerics or `_`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::new("minishell");

        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE"));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new("minishell");
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_inherited_vars_are_exported() {
        let env = Environment::new("minishell");
        let path = env.vars.get("PATH").expect("PATH inherited");
        assert!(path.exported);
    }

    #[test]
    fn test_set_var_does_not_export_new_vars() {
        let mut env = Environment::new("minishell");
        env.set_var("LOCAL_ONLY", "1");
        assert!(!env.vars["LOCAL_ONLY"].exported);
        assert!(!env
            .exported_pairs()
            .iter()
            .any(|pair| pair.starts_with("LOCAL_ONLY=")));
    }

    #[test]
    fn test_export_without_value_marks_and_creates() {
        let mut env = Environment::new("minishell");

        env.set_var("PRESENT", "kept");
        env.export_var("PRESENT", None);
        assert_eq!(env.get_var("PRESENT"), Some("kept"));
        assert!(env.vars["PRESENT"].exported);

        env.export_var("ABSENT_BEFORE", None);
        assert_eq!(env.get_var("ABSENT_BEFORE"), Some(""));
        assert!(env.vars["ABSENT_BEFORE"].exported);
    }

    #[test]
    fn test_export_with_value_overrides() {
        let mut env = Environment::new("minishell");
        env.export_var("X", Some("a b"));
        assert_eq!(env.get_var("X"), Some("a b"));
        assert!(env.exported_pairs().contains(&"X=a b".to_string()));
    }

    #[test]
    fn test_unset_removes() {
        let mut env = Environment::new("minishell");
        env.export_var("GONE", Some("1"));
        env.unset_var("GONE");
        assert_eq!(env.get_var("GONE"), None);
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("PATH"));
        assert!(is_valid_name("_x9"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("9lives"));
        assert!(!is_valid_name("WITH-DASH"));
        assert!(!is_valid_name("A B"));
    }
}
