//! Page objects and navigation steps for the self-service UI

pub mod myservice;
pub mod server;
pub mod steps;
pub mod views;
pub mod widgets;

pub use myservice::{MyService, ServiceUpdate, SsuiNavigator};
pub use server::{LoggedIn, SsuiServer};

use crate::browser::BrowserHandle;
use crate::error::NavResult;
use crate::navigator::StepRegistry;

/// Register every SSUI step
pub fn register_steps(registry: &mut StepRegistry<BrowserHandle>) -> NavResult<()> {
    registry
        .register("LoggedIn", LoggedIn)?
        .register("All", steps::All)?
        .register("Details", steps::Details)?
        .register("Edit", steps::Edit)?
        .register("VM Console", steps::VmConsole)?
        .register("SetOwnership", steps::SetOwnership)?
        .register("EditTagsFromDetails", steps::EditTagsFromDetails)?
        .register("Retire", steps::Retire)?
        .register("VMDetails", steps::VmDetails)?;
    Ok(())
}

/// A fresh registry holding the SSUI steps
pub fn registry() -> NavResult<StepRegistry<BrowserHandle>> {
    let mut registry = StepRegistry::new();
    register_steps(&mut registry)?;
    Ok(registry)
}
