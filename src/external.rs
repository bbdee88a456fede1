//! Resolution of external command names against `$PATH`.

use std::path::{Path, PathBuf};

use crate::env::Environment;

/// Outcome of looking up a command name, distinguishing the two failure
/// exit codes a shell must report: 127 for an unknown name and 126 for a
/// file that exists but cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(PathBuf),
    NotExecutable(PathBuf),
    NotFound,
}

/// Resolve a command name the way a shell does.
///
/// A name containing `/` is used verbatim; anything else is searched for in
/// each `:`-delimited entry of `$PATH`, taking the first executable regular
/// file. A non-executable match is remembered so that `PATH` entries later
/// in the list still get a chance to provide an executable one.
pub fn resolve(name: &str, env: &Environment) -> Resolution {
    if name.is_empty() {
        return Resolution::NotFound;
    }

    if name.contains('/') {
        let path = Path::new(name);
        return if !path.is_file() {
            Resolution::NotFound
        } else if is_executable(path) {
            Resolution::Found(path.to_path_buf())
        } else {
            Resolution::NotExecutable(path.to_path_buf())
        };
    }

    let search_paths = env.get_var("PATH").unwrap_or_default().to_string();
    let mut not_executable = None;
    for dir in std::env::split_paths(&search_paths) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            if is_executable(&candidate) {
                return Resolution::Found(candidate);
            }
            not_executable.get_or_insert(candidate);
        }
    }
    match not_executable {
        Some(path) => Resolution::NotExecutable(path),
        None => Resolution::NotFound,
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::fs::File;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn env_with_path(path: &str) -> Environment {
        let mut env = Environment::new("minishell");
        env.set_var("PATH", path);
        env
    }

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("external_tests_{}_{}", std::process::id(), tag));
        let _ = fs::remove_dir_all(&p);
        fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn touch_mode(path: &Path, mode: u32) {
        File::create(path).expect("create file");
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod");
    }

    #[test]
    fn absolute_existing_executable() {
        let env = env_with_path("/nowhere");
        assert_eq!(
            resolve("/bin/sh", &env),
            Resolution::Found(PathBuf::from("/bin/sh"))
        );
    }

    #[test]
    fn absolute_nonexisting() {
        let env = env_with_path("/bin");
        assert_eq!(resolve("/bin/nonexisting", &env), Resolution::NotFound);
    }

    #[test]
    fn single_component_found_in_path() {
        let env = env_with_path("/bin");
        match resolve("sh", &env) {
            Resolution::Found(path) => {
                assert!(path.starts_with("/bin"), "expected /bin, got {path:?}");
                assert!(path.ends_with("sh"));
            }
            other => panic!("expected to find 'sh' in /bin, got {other:?}"),
        }
    }

    #[test]
    fn single_component_not_found_in_path() {
        let env = env_with_path("/bin");
        assert_eq!(resolve("nonexisting_cmd_12345", &env), Resolution::NotFound);
    }

    #[test]
    fn non_executable_file_is_reported_as_such() {
        let tmp = make_unique_temp_dir("noexec");
        let file = tmp.join("plainfile");
        touch_mode(&file, 0o644);

        let env = env_with_path(&tmp.to_string_lossy());
        assert_eq!(
            resolve("plainfile", &env),
            Resolution::NotExecutable(file.clone())
        );

        let env = env_with_path("/nowhere");
        assert_eq!(
            resolve(&file.to_string_lossy(), &env),
            Resolution::NotExecutable(file)
        );

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    fn later_path_entry_can_shadow_a_non_executable_match() {
        let first = make_unique_temp_dir("shadow_a");
        let second = make_unique_temp_dir("shadow_b");
        touch_mode(&first.join("tool"), 0o644);
        touch_mode(&second.join("tool"), 0o755);

        let joined = format!("{}:{}", first.display(), second.display());
        let env = env_with_path(&joined);
        assert_eq!(
            resolve("tool", &env),
            Resolution::Found(second.join("tool"))
        );

        let _ = fs::remove_dir_all(first);
        let _ = fs::remove_dir_all(second);
    }

    #[test]
    fn directories_are_not_commands() {
        let tmp = make_unique_temp_dir("dir");
        fs::create_dir_all(tmp.join("subdir")).expect("mkdir");

        let env = env_with_path(&tmp.to_string_lossy());
        assert_eq!(resolve("subdir", &env), Resolution::NotFound);

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    fn empty_name_is_not_found() {
        let env = env_with_path("/bin");
        assert_eq!(resolve("", &env), Resolution::NotFound);
    }
}
