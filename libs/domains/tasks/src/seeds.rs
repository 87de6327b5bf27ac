//! Starter tasks every new user gets.

use crate::models::CreateTask;

/// Title and description of each starter task, in creation order.
pub const SEED_TASKS: [(&str, &str); 3] = [
    (
        "Welcome to Todo App!",
        "This is your first task. Click to mark it complete!",
    ),
    (
        "Explore the features",
        "Try creating, updating, and deleting tasks",
    ),
    (
        "Set up your profile",
        "Complete your profile information",
    ),
];

/// The starter tasks for `user_id`, all not completed.
pub fn seed_tasks_for(user_id: i64) -> Vec<CreateTask> {
    SEED_TASKS
        .iter()
        .map(|(title, description)| CreateTask::new(user_id, *title, *description))
        .collect()
}
