mod task;
mod user;
mod work_area;

pub use task::{
    parse_timestamp, CreateTaskRequest, Location, Priority, Task, TaskFilter,
    TaskState, TaskStatus,
};
pub use user::{Role, User};
pub use work_area::{is_hex_color, AreaType, CreateWorkAreaRequest, WorkArea, DEFAULT_COLOR};
