//! Session persistence: conversation history as an ordered
//! `{role, content}` array under `~/.chatcli/sessions/<name>.json`.

use crate::message::Message;
use std::io;
use std::path::Path;

pub fn save(path: &Path, history: &[Message]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(history)?;
    std::fs::write(path, json)
}

pub fn load(path: &Path) -> io::Result<Vec<Message>> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_history_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions").join("default.json");
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        save(&path, &history).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, history);
    }

    #[test]
    fn missing_session_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nope.json")).is_err());
    }
}
