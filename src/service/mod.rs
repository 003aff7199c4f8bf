pub mod runtime;
pub mod switcher;

pub use runtime::{REFRESH_DEBOUNCE, ServiceCommand, ServiceHandle, run_service};
pub use switcher::{ActionError, RefreshSummary, SwitcherService};
