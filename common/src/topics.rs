pub const TOPIC_SENSOR_TEMP: &str = "fancontrol/sensor/temperature";
pub const TOPIC_SENSOR_STATUS: &str = "fancontrol/sensor/status";

pub const TOPIC_CONTROLLER_STATE: &str = "fancontrol/controller/state";
pub const TOPIC_CONTROLLER_STATUS_LINE: &str = "fancontrol/controller/status";

pub const TOPIC_CMD_LOOP: &str = "fancontrol/cmnd/loop";
pub const TOPIC_CMD_POLICY: &str = "fancontrol/cmnd/policy";
