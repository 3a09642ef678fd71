//! Fixed, case-insensitive regex corpus for dangerous-command detection,
//! plus argv-aware helpers for the git subcommands that need flag-stacking
//! and global-option skipping handled directly rather than with regex.

use once_cell::sync::Lazy;
use regex::RegexSet;

/// Fixed dangerous-pattern corpus. Order does not matter;
/// `RegexSet` reports every match.
const DANGEROUS_PATTERNS: &[&str] = &[
    r"rm\s+-[a-z]*r[a-z]*f|rm\s+-[a-z]*f[a-z]*r",             // recursive root deletion
    r"\bdd\s+if=",                                             // disk wipe
    r"\bmkfs(\.\w+)?\b",
    r"\b(shutdown|reboot)\b",
    r"^\s*init\s+[0-6]\b",
    r"(curl|wget)\s+.*\|\s*(sh|bash|zsh)\b",                   // pipe to shell
    r"\bsudo\b",
    r"\bdrop\s+(table|database)\b",                            // SQL drop
    r"\buserdel\b|\bdeluser\b",
    r"chmod\s+777\s+/",
    r"base64\s+(-d|--decode).*\|\s*(sh|bash)\b",
    r"\bpython3?\s+-c\b|\bperl\s+-e\b|\bruby\s+-e\b|\bnode\s+-e\b|\bphp\s+-r\b",
    r"\beval\b",
    r"`[^`]*\b(curl|wget)\b[^`]*`",                            // backtick substitution
    r"\$\([^)]*\b(curl|wget)\b[^)]*\)",
    r">\s*/etc/|>\s*/proc/|>\s*/dev/sd",
    r"/dev/tcp/",                                              // reverse shell
    r"\bPATH\s*=.*:\s*\$PATH",
    r"\b(nc|ncat)\s+.*-(l|e)\b",                                // netcat listen/exec
    r"\bxargs\b.*\brm\b|find\s+.*-exec\s+rm\b",
    r"crontab\s+-r\b",
    r"iptables\s+-F\b",
    r"sysctl\s+-w\b",
    r"\bkillall\b|\bpkill\s+-9\b",
    r"\b(insmod|modprobe|rmmod)\b",
    r"umount\s+-[a-z]*(f|l)[a-z]*\b",                           // forced/lazy unmount
    r"\$\{IFS[;:]",                                             // dangerous variable expansion
    r"<\(|>\(",                                                 // process substitution
    r"^\s*\w+\s*=\s*\S+\s*;\s*(sh|bash|zsh)\b",                 // var assignment hides shell
    r"\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",                 // fork bomb
];

static DANGEROUS_SET: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new(
        DANGEROUS_PATTERNS
            .iter()
            .map(|p| format!("(?i){p}"))
            .collect::<Vec<_>>(),
    )
    .expect("static dangerous-pattern corpus must compile")
});

/// Returns true if `cmd` matches the fixed dangerous-pattern corpus,
/// respecting `allow_sudo`, plus any user-supplied denylist regexes.
pub fn is_dangerous(cmd: &str, allow_sudo: bool, extra_denylist: &[regex::Regex]) -> bool {
    if matches_fixed_corpus(cmd, allow_sudo) {
        return true;
    }
    extra_denylist.iter().any(|re| re.is_match(cmd))
}

fn matches_fixed_corpus(cmd: &str, allow_sudo: bool) -> bool {
    let matches = DANGEROUS_SET.matches(cmd);
    for idx in matches.iter() {
        if allow_sudo && DANGEROUS_PATTERNS[idx] == r"\bsudo\b" {
            continue;
        }
        return true;
    }
    if is_dangerous_git_argv(cmd) {
        return true;
    }
    false
}

/// Argv-aware git subcommand checks. Operates on whitespace-tokenized argv
/// rather than the raw regex corpus because `git push --force` style flags
/// stack and appear after positional global options.
fn is_dangerous_git_argv(cmd: &str) -> bool {
    let Ok(tokens) = shell_words::split(cmd) else {
        return false;
    };
    if tokens.is_empty() {
        return false;
    }
    let base = std::path::Path::new(&tokens[0])
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(&tokens[0]);
    if base != "git" {
        return false;
    }
    let Some((idx, subcommand)) = find_git_subcommand(&tokens, &["reset", "rm", "branch", "push", "clean"])
    else {
        return false;
    };
    let rest = &tokens[idx + 1..];
    match subcommand {
        "reset" | "rm" => true,
        "branch" => git_branch_is_delete(rest),
        "push" => git_push_is_dangerous(rest),
        "clean" => git_clean_is_force(rest),
        _ => false,
    }
}

fn is_git_global_option_with_value(arg: &str) -> bool {
    matches!(
        arg,
        "-C" | "-c" | "--config-env" | "--exec-path" | "--git-dir" | "--namespace"
            | "--super-prefix" | "--work-tree"
    )
}

fn is_git_global_option_with_inline_value(arg: &str) -> bool {
    arg.starts_with("--config-env=")
        || arg.starts_with("--exec-path=")
        || arg.starts_with("--git-dir=")
        || arg.starts_with("--namespace=")
        || arg.starts_with("--super-prefix=")
        || arg.starts_with("--work-tree=")
        || ((arg.starts_with("-C") || arg.starts_with("-c")) && arg.len() > 2)
}

fn find_git_subcommand<'a>(tokens: &'a [String], subcommands: &[&str]) -> Option<(usize, &'a str)> {
    let mut skip_next = false;
    for (idx, arg) in tokens.iter().enumerate().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        let arg = arg.as_str();
        if is_git_global_option_with_inline_value(arg) {
            continue;
        }
        if is_git_global_option_with_value(arg) {
            skip_next = true;
            continue;
        }
        if arg == "--" || arg.starts_with('-') {
            continue;
        }
        if subcommands.contains(&arg) {
            return Some((idx, arg));
        }
        return None;
    }
    None
}

fn short_flag_group_contains(arg: &str, target: char) -> bool {
    arg.starts_with('-') && !arg.starts_with("--") && arg.chars().skip(1).any(|c| c == target)
}

fn git_branch_is_delete(args: &[String]) -> bool {
    args.iter().map(String::as_str).any(|a| {
        matches!(a, "-d" | "-D" | "--delete")
            || a.starts_with("--delete=")
            || short_flag_group_contains(a, 'd')
            || short_flag_group_contains(a, 'D')
    })
}

fn git_push_is_dangerous(args: &[String]) -> bool {
    args.iter().map(String::as_str).any(|a| {
        matches!(
            a,
            "--force" | "--force-with-lease" | "--force-if-includes" | "--delete" | "-f" | "-d"
        ) || a.starts_with("--force-with-lease=")
            || a.starts_with("--force-if-includes=")
            || a.starts_with("--delete=")
            || short_flag_group_contains(a, 'f')
            || short_flag_group_contains(a, 'd')
            || ((a.starts_with('+') || a.starts_with(':')) && a.len() > 1)
    })
}

fn git_clean_is_force(args: &[String]) -> bool {
    args.iter().map(String::as_str).any(|a| {
        matches!(a, "--force" | "-f") || a.starts_with("--force=") || short_flag_group_contains(a, 'f')
    })
}
