use std::collections::HashMap;

use zbus::dbus_proxy;

pub const SAM_SERVICE_BUS: &str = "io.stillhq.SamService";
pub const SAM_SERVICE_OBJECT: &str = "/io/stillhq/SamService";

#[dbus_proxy(interface = "io.stillhq.SamService", default_service = "io.stillhq.SamService", default_path = "/io/stillhq/SamService")]
trait SamService {
    /// get_queue_actions_dict method
    ///
    /// Every element of the returned queue is a sequence wrapping the mapping of one task.
    #[dbus_proxy(name = "get_queue_actions_dict")]
    fn get_queue_actions_dict(&self) -> zbus::Result<Vec<Vec<HashMap<String, String>>>>;

    /// queue_changed signal
    #[dbus_proxy(signal, name = "queue_changed")]
    fn queue_changed(&self) -> zbus::Result<()>;

    /// progress_changed signal
    #[dbus_proxy(signal, name = "progress_changed")]
    fn progress_changed(&self, progress: i32) -> zbus::Result<()>;
}
