//! Interactive menu command parsing: the TUI reads raw
//! keystrokes and hands the resulting line here; dispatch semantics live
//! in the agent loop, not in the TUI.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    RunBlock(usize),
    RunAll,
    EditAndRun(usize),
    DryRun(usize),
    ContinueFromOutput(usize),
    PreExecRefine(usize),
    PostExecInject(usize),
    Page(usize),
    Save(usize),
    TogglePlanView,
    Redraw,
    Quit,
}

/// Parses one line of interactive-menu input. Block indices are 1-based
/// in the UI and converted to 0-based here.
pub fn parse_menu_command(input: &str) -> Option<MenuCommand> {
    let trimmed = input.trim();
    match trimmed {
        "a" => return Some(MenuCommand::RunAll),
        "p" => return Some(MenuCommand::TogglePlanView),
        "r" => return Some(MenuCommand::Redraw),
        "q" => return Some(MenuCommand::Quit),
        _ => {}
    }

    if let Ok(n) = trimmed.parse::<usize>() {
        return n.checked_sub(1).map(MenuCommand::RunBlock);
    }

    let (prefix, rest) = split_alpha_prefix(trimmed);
    let n: usize = rest.parse().ok()?;
    let index = n.checked_sub(1)?;

    match prefix {
        "e" => Some(MenuCommand::EditAndRun(index)),
        "t" => Some(MenuCommand::DryRun(index)),
        "c" => Some(MenuCommand::ContinueFromOutput(index)),
        "pc" => Some(MenuCommand::PreExecRefine(index)),
        "ac" => Some(MenuCommand::PostExecInject(index)),
        "v" => Some(MenuCommand::Page(index)),
        "w" => Some(MenuCommand::Save(index)),
        _ => None,
    }
}

fn split_alpha_prefix(s: &str) -> (&str, &str) {
    let split_at = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(split_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_runs_that_block_zero_indexed() {
        assert_eq!(parse_menu_command("1"), Some(MenuCommand::RunBlock(0)));
        assert_eq!(parse_menu_command("3"), Some(MenuCommand::RunBlock(2)));
    }

    #[test]
    fn single_letter_commands() {
        assert_eq!(parse_menu_command("a"), Some(MenuCommand::RunAll));
        assert_eq!(parse_menu_command("p"), Some(MenuCommand::TogglePlanView));
        assert_eq!(parse_menu_command("r"), Some(MenuCommand::Redraw));
        assert_eq!(parse_menu_command("q"), Some(MenuCommand::Quit));
    }

    #[test]
    fn edit_dry_run_and_continuation_prefixes() {
        assert_eq!(parse_menu_command("e2"), Some(MenuCommand::EditAndRun(1)));
        assert_eq!(parse_menu_command("t1"), Some(MenuCommand::DryRun(0)));
        assert_eq!(parse_menu_command("c4"), Some(MenuCommand::ContinueFromOutput(3)));
    }

    #[test]
    fn two_letter_prefixes_for_refinement_and_injection() {
        assert_eq!(parse_menu_command("pc1"), Some(MenuCommand::PreExecRefine(0)));
        assert_eq!(parse_menu_command("ac2"), Some(MenuCommand::PostExecInject(1)));
    }

    #[test]
    fn pager_and_save_prefixes() {
        assert_eq!(parse_menu_command("v1"), Some(MenuCommand::Page(0)));
        assert_eq!(parse_menu_command("w2"), Some(MenuCommand::Save(1)));
    }

    #[test]
    fn unrecognized_input_is_none() {
        assert_eq!(parse_menu_command("zzz"), None);
        assert_eq!(parse_menu_command(""), None);
    }
}
