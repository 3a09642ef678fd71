//! Task Tracker (C6): parses a numbered plan from model reasoning, tracks
//! status, and detects when the model's plan invalidated itself enough
//! that the loop must replan. `Task` follows the same serde-derive shape
//! used elsewhere in this crate for small persisted structs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Number of consecutive task failures that forces a replan.
pub const REPLAN_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: usize,
    pub description: String,
    pub status: TaskStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl Task {
    fn new(id: usize, description: String, status: TaskStatus) -> Self {
        Self {
            id,
            description,
            status,
            started_at: None,
            completed_at: None,
            attempts: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub tasks: Vec<Task>,
    pub current_task: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub failure_count: u32,
    pub needs_replan: bool,
    pub plan_signature: String,
}

impl TaskPlan {
    fn empty() -> Self {
        let now = chrono::Utc::now();
        Self {
            tasks: Vec::new(),
            current_task: 0,
            created_at: now,
            updated_at: now,
            failure_count: 0,
            needs_replan: false,
            plan_signature: String::new(),
        }
    }
}

static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(\d+)\.?\s+(.+)$").expect("static numbered-line pattern is valid")
});

static CHECKBOX_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[([x✓✔ >!])\]\s*").expect("static checkbox-prefix pattern is valid")
});

fn strip_checkbox(description: &str) -> (String, Option<TaskStatus>) {
    let trimmed = description.trim();
    if let Some(caps) = CHECKBOX_PREFIX.captures(trimmed) {
        let marker = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let rest = CHECKBOX_PREFIX.replace(trimmed, "").to_string();
        let status = match marker {
            "x" | "✓" | "✔" => Some(TaskStatus::Completed),
            ">" => Some(TaskStatus::InProgress),
            "!" => Some(TaskStatus::Failed),
            _ => None,
        };
        (rest, status)
    } else {
        (trimmed.to_string(), None)
    }
}

fn normalize_for_signature(description: &str) -> String {
    strip_checkbox(description).0.to_lowercase().trim().to_string()
}

/// Canonicalized, order-preserving signature used to detect replans.
pub fn plan_signature(descriptions: &[String]) -> String {
    descriptions
        .iter()
        .map(|d| normalize_for_signature(d))
        .collect::<Vec<_>>()
        .join("|")
}

/// Signature a fresh reasoning parse would produce, without installing
/// it as the current plan. The agent loop uses this to decide between a
/// full replan and an in-place checkbox status update.
pub fn reasoning_signature(text: &str) -> String {
    let descriptions: Vec<String> = parse_tasks(text).iter().map(|t| t.description.clone()).collect();
    plan_signature(&descriptions)
}

fn parse_tasks(text: &str) -> Vec<Task> {
    NUMBERED_LINE
        .captures_iter(text)
        .enumerate()
        .map(|(idx, caps)| {
            let raw_description = caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
            let (description, status) = strip_checkbox(&raw_description);
            Task::new(idx, description, status.unwrap_or(TaskStatus::Pending))
        })
        .collect()
}

/// Owns the current plan behind a single lock.
pub struct TaskTracker {
    plan: Mutex<TaskPlan>,
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTracker {
    pub fn new() -> Self {
        Self {
            plan: Mutex::new(TaskPlan::empty()),
        }
    }

    /// Parses a numbered plan out of model reasoning text.
    pub fn parse_reasoning(&self, text: &str) {
        let tasks = parse_tasks(text);
        let descriptions: Vec<String> = tasks.iter().map(|t| t.description.clone()).collect();
        let signature = plan_signature(&descriptions);

        let mut plan = self.plan.lock().expect("task tracker lock poisoned");
        if signature != plan.plan_signature {
            self.install_plan(&mut plan, tasks, signature, false);
        }
    }

    /// Replaces the plan with the reasoning's new plan, optionally
    /// preserving the completed-status of tasks with matching descriptions.
    pub fn reset_plan_from_reasoning(&self, text: &str, preserve_completed: bool) {
        let tasks = parse_tasks(text);
        let descriptions: Vec<String> = tasks.iter().map(|t| t.description.clone()).collect();
        let signature = plan_signature(&descriptions);

        let mut plan = self.plan.lock().expect("task tracker lock poisoned");
        self.install_plan(&mut plan, tasks, signature, preserve_completed);
    }

    fn install_plan(
        &self,
        plan: &mut TaskPlan,
        mut tasks: Vec<Task>,
        signature: String,
        preserve_completed: bool,
    ) {
        if preserve_completed {
            for task in tasks.iter_mut() {
                if plan
                    .tasks
                    .iter()
                    .any(|old| old.status == TaskStatus::Completed && old.description == task.description)
                {
                    task.status = TaskStatus::Completed;
                }
            }
        }
        plan.tasks = tasks;
        plan.current_task = 0;
        plan.plan_signature = signature;
        plan.failure_count = 0;
        plan.needs_replan = false;
        plan.updated_at = chrono::Utc::now();
    }

    /// Marks the task at the plan cursor with `status`, advancing the
    /// cursor on success and tracking the replan threshold on failure.
    pub fn mark_current_as(&self, status: TaskStatus, error_msg: Option<String>) {
        let mut plan = self.plan.lock().expect("task tracker lock poisoned");
        let cursor = plan.current_task;
        let now = chrono::Utc::now();
        if let Some(task) = plan.tasks.get_mut(cursor) {
            task.status = status;
            task.attempts += 1;
            task.error = error_msg;
            match status {
                TaskStatus::InProgress => task.started_at = Some(now),
                TaskStatus::Completed => {
                    task.completed_at = Some(now);
                    plan.failure_count = 0;
                    plan.current_task = (cursor + 1).min(plan.tasks.len());
                }
                TaskStatus::Failed => {
                    plan.failure_count += 1;
                    if plan.failure_count >= REPLAN_THRESHOLD {
                        plan.needs_replan = true;
                    }
                }
                TaskStatus::Pending => {}
            }
        }
        plan.updated_at = now;
    }

    /// Applies checkbox-derived statuses from a reasoning parse whose
    /// signature matches the current plan, without resetting the cursor
    /// or counters.
    pub fn update_statuses_from_reasoning(&self, text: &str) {
        let tasks = parse_tasks(text);
        let mut plan = self.plan.lock().expect("task tracker lock poisoned");
        for (idx, new_task) in tasks.iter().enumerate() {
            if let Some(existing) = plan.tasks.get_mut(idx) {
                if existing.status != new_task.status {
                    existing.status = new_task.status;
                    if new_task.status == TaskStatus::Completed {
                        existing.completed_at = Some(chrono::Utc::now());
                    }
                }
            }
        }
        plan.updated_at = chrono::Utc::now();
    }

    pub fn get_current_task(&self) -> Option<Task> {
        let plan = self.plan.lock().expect("task tracker lock poisoned");
        plan.tasks.get(plan.current_task).cloned()
    }

    pub fn get_plan(&self) -> TaskPlan {
        self.plan.lock().expect("task tracker lock poisoned").clone()
    }

    pub fn needs_replanning(&self) -> bool {
        self.plan.lock().expect("task tracker lock poisoned").needs_replan
    }

    /// Resets the plan entirely, clearing `needs_replan`.
    pub fn reset_plan(&self) {
        let mut plan = self.plan.lock().expect("task tracker lock poisoned");
        *plan = TaskPlan::empty();
    }

    pub fn format_progress(&self) -> String {
        let plan = self.plan.lock().expect("task tracker lock poisoned");
        if plan.tasks.is_empty() {
            return "No active plan.".to_string();
        }
        let mut out = String::new();
        for (idx, task) in plan.tasks.iter().enumerate() {
            let marker = match task.status {
                TaskStatus::Completed => "[x]",
                TaskStatus::InProgress => "[>]",
                TaskStatus::Failed => "[!]",
                TaskStatus::Pending => "[ ]",
            };
            let cursor = if idx == plan.current_task { "-> " } else { "   " };
            out.push_str(&format!("{cursor}{marker} {}. {}\n", idx + 1, task.description));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_k_numbered_lines_into_k_tasks_in_order() {
        let text = "1. First step\n2. Second step\n3. Third step\n";
        let tracker = TaskTracker::new();
        tracker.parse_reasoning(text);
        let plan = tracker.get_plan();
        assert_eq!(plan.tasks.len(), 3);
        assert_eq!(plan.tasks[0].description, "First step");
        assert_eq!(plan.tasks[2].description, "Third step");
    }

    #[test]
    fn strips_checkbox_markers_and_seeds_completed_status() {
        let text = "1. [x] Done already\n2. [ ] Not yet\n";
        let tracker = TaskTracker::new();
        tracker.parse_reasoning(text);
        let plan = tracker.get_plan();
        assert_eq!(plan.tasks[0].description, "Done already");
        assert_eq!(plan.tasks[0].status, TaskStatus::Completed);
        assert_eq!(plan.tasks[1].status, TaskStatus::Pending);
    }

    #[test]
    fn three_failures_flip_needs_replanning_then_reset_clears_it() {
        let tracker = TaskTracker::new();
        tracker.parse_reasoning("1. Do the thing\n");
        assert!(!tracker.needs_replanning());
        for _ in 0..3 {
            tracker.mark_current_as(TaskStatus::Failed, Some("boom".to_string()));
        }
        assert!(tracker.needs_replanning());
        tracker.reset_plan();
        assert!(!tracker.needs_replanning());
    }

    #[test]
    fn completed_task_advances_cursor() {
        let tracker = TaskTracker::new();
        tracker.parse_reasoning("1. One\n2. Two\n");
        tracker.mark_current_as(TaskStatus::Completed, None);
        let plan = tracker.get_plan();
        assert_eq!(plan.current_task, 1);
    }

    #[test]
    fn signature_changes_on_new_plan_even_without_threshold() {
        let tracker = TaskTracker::new();
        tracker.parse_reasoning("1. Alpha\n2. Beta\n");
        let first_signature = tracker.get_plan().plan_signature;
        tracker.parse_reasoning("1. Gamma\n2. Delta\n");
        let second_signature = tracker.get_plan().plan_signature;
        assert_ne!(first_signature, second_signature);
        assert_eq!(tracker.get_plan().tasks[0].description, "Gamma");
    }

    #[test]
    fn reset_plan_from_reasoning_preserves_completed_tasks() {
        let tracker = TaskTracker::new();
        tracker.parse_reasoning("1. Alpha\n2. Beta\n");
        tracker.mark_current_as(TaskStatus::Completed, None);
        tracker.reset_plan_from_reasoning("1. Alpha\n2. Beta\n3. Gamma\n", true);
        let plan = tracker.get_plan();
        assert_eq!(plan.tasks[0].status, TaskStatus::Completed);
    }

    #[test]
    fn same_signature_checkbox_update_does_not_reset_cursor() {
        let tracker = TaskTracker::new();
        tracker.parse_reasoning("1. Alpha\n2. Beta\n");
        tracker.mark_current_as(TaskStatus::Completed, None);
        assert_eq!(reasoning_signature("1. [x] Alpha\n2. [ ] Beta\n"), tracker.get_plan().plan_signature);
        tracker.update_statuses_from_reasoning("1. [x] Alpha\n2. [>] Beta\n");
        let plan = tracker.get_plan();
        assert_eq!(plan.current_task, 1);
        assert_eq!(plan.tasks[1].status, TaskStatus::InProgress);
    }

    #[test]
    fn plan_signature_is_deterministic_for_normalized_descriptions() {
        let a = plan_signature(&["Build Thing".to_string(), "Test Thing".to_string()]);
        let b = plan_signature(&["build thing".to_string(), "test thing".to_string()]);
        assert_eq!(a, b);
    }
}
