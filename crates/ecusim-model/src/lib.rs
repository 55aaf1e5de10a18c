pub mod ecu;
pub mod message;
pub mod registry;
pub mod result;
pub mod rng;

pub use ecu::{Ecu, EcuStatus, EcuType};
pub use message::{DiagnosticMessage, Nrc, ServiceId, TestSequence};
pub use registry::{failure_probability_for, EcuRegistry, RegistryConfig};
pub use result::{FailureContext, TestResult, TestStatus};
