//! OS-aware shell and flag selection, isolated behind one function so tests
//! can override it.

/// Resolves the shell to invoke and the flag that makes it run a single
/// command string.
pub fn resolve_shell() -> (String, &'static str) {
    #[cfg(windows)]
    {
        if let Ok(comspec) = std::env::var("ComSpec") {
            if comspec.to_lowercase().contains("powershell") {
                return (comspec, "-Command");
            }
        }
        ("powershell.exe".to_string(), "-Command")
    }
    #[cfg(not(windows))]
    {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        (shell, "-c")
    }
}

/// Shell config file to source before an interactive command so aliases
/// resolve, or `None` on platforms where this step is skipped.
pub fn rc_file_for(shell: &str) -> Option<&'static str> {
    #[cfg(windows)]
    {
        let _ = shell;
        None
    }
    #[cfg(not(windows))]
    {
        if shell.ends_with("zsh") {
            Some("~/.zshrc")
        } else if shell.ends_with("bash") {
            Some("~/.bashrc")
        } else if shell.ends_with("fish") {
            Some("~/.config/fish/config.fish")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_shell_returns_posix_flag_on_unix() {
        #[cfg(not(windows))]
        {
            let (_, flag) = resolve_shell();
            assert_eq!(flag, "-c");
        }
    }

    #[test]
    fn rc_file_matches_shell_family() {
        #[cfg(not(windows))]
        {
            assert_eq!(rc_file_for("/bin/zsh"), Some("~/.zshrc"));
            assert_eq!(rc_file_for("/bin/bash"), Some("~/.bashrc"));
            assert_eq!(rc_file_for("/usr/bin/fish"), Some("~/.config/fish/config.fish"));
            assert_eq!(rc_file_for("/bin/dash"), None);
        }
    }
}
