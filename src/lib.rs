//! PWR Heatup Simulator Library
//!
//! Primary-loop inventory and flow-control core of a pressurized-water-reactor
//! heatup trainer: CVCS charging/letdown control, the VCT/BRS closed loop and a
//! system-wide mass audit that holds across solid and two-phase operation.

pub mod audit;
pub mod authority;
pub mod brs;
pub mod config;
pub mod cvcs;
pub mod error;
pub mod host;
pub mod inventory;
pub mod orifice;
pub mod plant;
pub mod scenario;
pub mod vct;
pub mod water_props;

pub use config::SimConfig;
pub use error::{ConfigError, PropertyError, SimError};
pub use host::SimulatorHandle;
pub use inventory::PlantRegime;
pub use plant::{InitialConditions, PlantEngine, PlantSimulator, PlantSnapshot, StepInputs};
