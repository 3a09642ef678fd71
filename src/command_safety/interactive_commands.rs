//! Heuristic interactive/TUI command detection. Not
//! authoritative — the agent loop may still ask the user when ambiguous.

const INTERACTIVE_COMMANDS: &[&str] = &[
    "vim", "vi", "nvim", "emacs", "nano", "top", "htop", "less", "more", "man", "ssh", "mysql",
    "psql", "sqlite3", "redis-cli", "docker", "kubectl", "terraform", "npm", "python", "python3",
    "node", "irb", "ipython",
];

const INTERACTIVE_FLAGS: &[&str] = &["-i", "--interactive", "-t", "--tty", "-it"];

/// Returns true if `cmd` is likely to need a TTY (interactive program or
/// interactive flag on a known ambiguous command).
pub fn is_likely_interactive(cmd: &str) -> bool {
    let Ok(tokens) = shell_words::split(cmd) else {
        return false;
    };
    let Some(first) = tokens.first() else {
        return false;
    };
    let base = std::path::Path::new(first)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(first.as_str());

    if !INTERACTIVE_COMMANDS.contains(&base) {
        return false;
    }

    // docker/kubectl only need a TTY for specific subcommands/flags.
    match base {
        "docker" => tokens.iter().any(|t| t == "exec" || t == "run") && has_interactive_flag(&tokens),
        "kubectl" => tokens.iter().any(|t| t == "exec") && has_interactive_flag(&tokens),
        "npm" | "node" | "python" | "python3" => has_interactive_flag(&tokens) || tokens.len() == 1,
        _ => true,
    }
}

fn has_interactive_flag(tokens: &[String]) -> bool {
    tokens
        .iter()
        .any(|t| INTERACTIVE_FLAGS.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vim_is_interactive() {
        assert!(is_likely_interactive("vim file.txt"));
    }

    #[test]
    fn docker_exec_it_is_interactive() {
        assert!(is_likely_interactive("docker exec -it mycontainer bash"));
    }

    #[test]
    fn docker_ps_is_not_interactive() {
        assert!(!is_likely_interactive("docker ps"));
    }

    #[test]
    fn ls_is_not_interactive() {
        assert!(!is_likely_interactive("ls -la"));
    }

    #[test]
    fn kubectl_get_is_not_interactive() {
        assert!(!is_likely_interactive("kubectl get pods"));
    }

    #[test]
    fn kubectl_exec_it_is_interactive() {
        assert!(is_likely_interactive("kubectl exec -it pod -- bash"));
    }
}
