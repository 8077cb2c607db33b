pub mod clock;
pub mod planner;
pub mod runtime;
pub mod window;

pub use clock::{Clock, SystemClock};
pub use planner::{ReminderPlan, ReminderPlanner, Replan};
pub use runtime::{Effect, EngineEvent, Runtime};
pub use window::{Window, WindowEngine, WindowPolicy};
