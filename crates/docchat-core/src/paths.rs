use std::env;
use std::path::PathBuf;

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<String, String> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Ok(home);
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Ok(profile);
        }
    }

    Err("Home directory not set".to_string())
}

/// Directory holding docchat's config file: `~/.config/docchat`.
///
/// `XDG_CONFIG_HOME` replaces `~/.config` when set.
pub fn config_dir() -> Result<PathBuf, String> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("docchat"));
        }
    }
    Ok(PathBuf::from(get_home_dir()?).join(".config").join("docchat"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn set_or_remove(key: &str, value: Option<&str>) {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }

    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        let previous: Vec<_> = vars
            .iter()
            .map(|(key, _)| (key.to_string(), env::var(key).ok()))
            .collect();

        for (key, value) in vars {
            set_or_remove(key, *value);
        }

        f();

        for (key, value) in previous {
            set_or_remove(&key, value.as_deref());
        }
    }

    #[test]
    fn get_home_dir_prefers_home() {
        with_env(
            &[("HOME", Some("/tmp/home")), ("USERPROFILE", Some("/tmp/profile"))],
            || assert_eq!(get_home_dir().unwrap(), "/tmp/home"),
        );
    }

    #[test]
    fn get_home_dir_falls_back_to_userprofile() {
        with_env(&[("HOME", None), ("USERPROFILE", Some("/tmp/profile"))], || {
            assert_eq!(get_home_dir().unwrap(), "/tmp/profile")
        });
    }

    #[test]
    fn config_dir_under_home() {
        with_env(
            &[("XDG_CONFIG_HOME", None), ("HOME", Some("/tmp/home"))],
            || {
                assert_eq!(
                    config_dir().unwrap(),
                    PathBuf::from("/tmp/home/.config/docchat")
                )
            },
        );
    }

    #[test]
    fn config_dir_honours_xdg() {
        with_env(&[("XDG_CONFIG_HOME", Some("/tmp/xdg"))], || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/tmp/xdg/docchat"))
        });
    }

    #[test]
    fn config_dir_without_home_fails() {
        with_env(
            &[("XDG_CONFIG_HOME", None), ("HOME", None), ("USERPROFILE", None)],
            || assert!(config_dir().is_err()),
        );
    }
}
