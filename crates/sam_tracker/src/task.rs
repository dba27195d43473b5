use std::{collections::HashMap, fmt};

use serde::{Serialize, Serializer};

/// The kind of work a queued task performs.
///
/// Parsing is case-insensitive and never fails: anything that isn't one of the known kinds is kept verbatim in
/// [`TaskKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaskKind {
    Install,
    Remove,
    Update,
    /// The service itself reported the task as unknown.
    Unknown,
    #[strum(default)]
    Other(String),
}

impl TaskKind {
    pub fn from_raw(raw: &str) -> Self {
        // unmatched input lands in the `#[strum(default)]` variant, so parsing can't fail
        raw.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Install => "install",
            TaskKind::Remove => "remove",
            TaskKind::Update => "update",
            TaskKind::Unknown => "unknown",
            TaskKind::Other(raw) => raw,
        }
    }

    /// Phrase shown for this kind of task, with `{}` standing in for the application name.
    fn phrase(&self) -> Option<&'static str> {
        match self {
            TaskKind::Install => Some("Installing {}"),
            TaskKind::Remove => Some("Removing {}"),
            TaskKind::Update => Some("Updating {}"),
            TaskKind::Unknown => Some("Unknown task involving {}"),
            TaskKind::Other(_) => None,
        }
    }
}

impl Default for TaskKind {
    fn default() -> Self {
        TaskKind::Other(String::new())
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One entry of the remote task queue, as far as we understand it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaskRecord {
    /// Identity of the unit of work within one package manager.
    pub package_id: String,
    pub app_name: String,
    /// Which package manager produced this task (flatpak, apt, ...).
    pub manager_id: String,
    pub task_kind: TaskKind,
    pub progress: u32,
    pub error: Option<String>,
    /// Background tasks are shown with low urgency.
    pub background: bool,
}

impl TaskRecord {
    /// Decode a record from a queue entry mapping.
    ///
    /// Decoding is best-effort: unknown keys are skipped and missing ones keep their defaults. When the service does
    /// not report an application name, the package id is shown instead.
    pub fn decode(entry: &HashMap<String, String>) -> Self {
        let mut record = TaskRecord::default();
        for (key, value) in entry {
            match key.as_str() {
                "package_id" => record.package_id = value.clone(),
                "app_name" => record.app_name = value.clone(),
                "manager_id" => record.manager_id = value.clone(),
                "task" => record.task_kind = TaskKind::from_raw(value),
                "error" if !value.is_empty() => record.error = Some(value.clone()),
                "error" => {}
                "background" => record.background = value == "True",
                _ => log::trace!("Ignoring unrecognized queue entry key {:?}", key),
            }
        }

        if record.app_name.is_empty() {
            record.app_name = record.package_id.clone();
        }
        if let Some(error) = &record.error {
            log::warn!("Task {} reports an error: {}", record.package_id, error);
        }
        record
    }

    /// Human readable description of what this task is doing. Empty for task kinds we don't know how to describe.
    pub fn status_line(&self) -> String {
        match self.task_kind.phrase() {
            Some(phrase) => phrase.replace("{}", &self.app_name),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::hashmap;
    use pretty_assertions::assert_eq;

    fn entry(pairs: HashMap<&str, &str>) -> HashMap<String, String> {
        pairs.into_iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect()
    }

    #[test]
    fn test_decode_known_keys() {
        let record = TaskRecord::decode(&entry(hashmap! {
            "package_id" => "org.gnome.Maps",
            "app_name" => "Maps",
            "manager_id" => "flatpak",
            "task" => "Install",
            "background" => "True",
            "running" => "True",
        }));
        assert_eq!(
            TaskRecord {
                package_id: "org.gnome.Maps".to_string(),
                app_name: "Maps".to_string(),
                manager_id: "flatpak".to_string(),
                task_kind: TaskKind::Install,
                progress: 0,
                error: None,
                background: true,
            },
            record
        );
    }

    #[test]
    fn test_decode_missing_keys_keep_defaults() {
        let record = TaskRecord::decode(&entry(hashmap! { "package_id" => "vim" }));
        assert_eq!("vim", record.app_name);
        assert_eq!("", record.manager_id);
        assert_eq!(TaskKind::Other(String::new()), record.task_kind);
        assert!(!record.background);
        assert_eq!(None, record.error);

        assert_eq!(TaskRecord::default(), TaskRecord::decode(&HashMap::new()));
    }

    #[test]
    fn test_background_only_for_canonical_true() {
        for value in ["true", "TRUE", "1", "yes", "False", ""] {
            let record = TaskRecord::decode(&entry(hashmap! { "background" => value }));
            assert!(!record.background, "{:?} should not count as background", value);
        }
    }

    #[test]
    fn test_decode_error() {
        let record = TaskRecord::decode(&entry(hashmap! { "error" => "disk full" }));
        assert_eq!(Some("disk full".to_string()), record.error);
        let record = TaskRecord::decode(&entry(hashmap! { "error" => "" }));
        assert_eq!(None, record.error);
    }

    #[test]
    fn test_task_kind_is_case_insensitive() {
        assert_eq!(TaskKind::Install, TaskKind::from_raw("INSTALL"));
        assert_eq!(TaskKind::Remove, TaskKind::from_raw("Remove"));
        assert_eq!(TaskKind::Update, TaskKind::from_raw("update"));
        assert_eq!(TaskKind::Unknown, TaskKind::from_raw("UnKnown"));
        assert_eq!(TaskKind::Other("Downgrade".to_string()), TaskKind::from_raw("Downgrade"));
    }

    #[test]
    fn test_status_line() {
        let record = |task: &str| TaskRecord { app_name: "Foo".to_string(), task_kind: TaskKind::from_raw(task), ..Default::default() };
        assert_eq!("Installing Foo", record("install").status_line());
        assert_eq!("Removing Foo", record("REMOVE").status_line());
        assert_eq!("Updating Foo", record("Update").status_line());
        assert_eq!("Unknown task involving Foo", record("unknown").status_line());
        assert_eq!("", record("repair").status_line());
    }
}
