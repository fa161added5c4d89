//! Scan-cycle interpreter for IEC 61131-3 Structured Text
//!
//! Executes parsed POUs in the PLC scan-cycle model: the host writes
//! inputs into the tag store, calls [`run_scan`], and reads outputs
//! back from the same store. FB instance state (timers, counters, edge
//! detectors, bistables, user function blocks) persists in the store
//! across scans; call frames and FUNCTION locals live only inside one
//! scan.

pub mod builtins;
pub mod errors;
pub mod interpreter;
pub mod pou;
pub mod runtime;
pub mod scan;
pub mod store;
pub mod value;

pub use builtins::BuiltinRegistry;
pub use errors::{InterpreterError, InterpreterResult};
pub use interpreter::Interpreter;
pub use runtime::{ControlFlow, RuntimeState};
pub use scan::{create_runtime_state, initialize, run_scan, run_scan_budgeted};
pub use store::TagStore;
pub use value::{Value, ValueKind};
